//! # Marketplace Error Types
//!
//! Typed error handling for the MediTrust marketplace.
//! All store, gateway and service operations return `Result<T, MarketError>`.

use thiserror::Error;

/// Core error type for all marketplace operations
#[derive(Debug, Error)]
pub enum MarketError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The buyer already has this medicine in their cart
    #[error("This medicine is already in the cart.")]
    DuplicateCartItem {
        buyer_email: String,
        medicine_name: String,
    },

    /// Unknown direction, or a decrease at the quantity floor
    #[error("Invalid quantity update")]
    InvalidQuantityUpdate,

    /// Document not found by id
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Document store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Payment gateway rejected or failed the request
    #[error("Gateway error [{gateway}]: {message}")]
    Gateway { gateway: String, message: String },

    /// Network/HTTP error communicating with the gateway
    #[error("Network error: {0}")]
    Network(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MarketError {
    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MarketError::Network(_) | MarketError::Gateway { .. } | MarketError::Store(_)
        )
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            MarketError::Configuration(_) => 500,
            MarketError::InvalidRequest(_) => 400,
            MarketError::DuplicateCartItem { .. } => 400,
            MarketError::InvalidQuantityUpdate => 400,
            MarketError::NotFound { .. } => 404,
            MarketError::Store(_) => 500,
            MarketError::Gateway { .. } => 502,
            MarketError::Network(_) => 503,
            MarketError::Serialization(_) => 500,
            MarketError::Internal(_) => 500,
        }
    }
}

impl From<serde_json::Error> for MarketError {
    fn from(err: serde_json::Error) -> Self {
        MarketError::Serialization(err.to_string())
    }
}

/// Result type alias for marketplace operations
pub type MarketResult<T> = Result<T, MarketError>;
