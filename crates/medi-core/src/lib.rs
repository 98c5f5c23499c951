//! # medi-core
//!
//! Core types, traits and services for the MediTrust medicine marketplace.
//!
//! This crate provides:
//! - `DocumentStore` trait, typed `Filter`/`Patch`, and an in-memory store
//! - `PaymentGateway` trait for hosted checkout providers
//! - `UserService`, `CatalogService`, `CartService` and `OrderService`
//! - `MarketError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use medi_core::{CallbackUrls, MemoryStore, OrderService, OrderPayload};
//!
//! let orders = OrderService::new(store, gateway, CallbackUrls::default());
//!
//! // Ask the gateway for a payment page
//! let checkout = orders.create_order(payload).await?;
//!
//! // Send checkout.url to the buyer, then record the pending order
//! orders.record_pending(&checkout.order).await?;
//! ```

pub mod cart;
pub mod catalog;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod order;
pub mod store;
pub mod user;

// Re-exports for convenience
pub use cart::{CartItem, CartService, QuantityChange};
pub use catalog::{CatalogSeed, CatalogService, Category, Medicine};
pub use error::{MarketError, MarketResult};
pub use gateway::{BoxedGateway, CallbackUrls, GatewaySession, PaymentGateway, PaymentRequest};
pub use memory::MemoryStore;
pub use order::{
    CallbackOutcome, Checkout, Order, OrderItem, OrderPayload, OrderService, PaymentStatus,
};
pub use store::{
    BoxedStore, Collection, DeleteOutcome, Document, DocumentStore, Filter, InsertOutcome, Patch,
    UpdateOutcome,
};
pub use user::{Registration, Role, User, UserService};
