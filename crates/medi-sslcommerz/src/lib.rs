//! # medi-sslcommerz
//!
//! SSLCommerz payment gateway for the MediTrust marketplace.
//!
//! SSLCommerz is a hosted checkout: the server registers a payment, gets back
//! a `GatewayPageURL`, and sends the buyer there. The outcome arrives later as
//! a POST to the success or fail URL that was registered with the payment.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use medi_sslcommerz::SslCommerzGateway;
//! use medi_core::PaymentGateway;
//!
//! // Create gateway from environment (sandbox unless SSLCOMMERZ_LIVE=true)
//! let gateway = SslCommerzGateway::from_env()?;
//!
//! let session = gateway.init(&payment_request).await?;
//!
//! // Redirect the buyer to session.redirect_url
//! ```

pub mod config;
pub mod gateway;

// Re-exports
pub use config::SslCommerzConfig;
pub use gateway::SslCommerzGateway;
