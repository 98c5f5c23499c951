//! # SSLCommerz Configuration
//!
//! Configuration management for the SSLCommerz integration.
//! Store credentials are loaded from environment variables.

use medi_core::MarketError;
use std::env;

/// Sandbox API host
pub const SANDBOX_API_BASE_URL: &str = "https://sandbox.sslcommerz.com";

/// Live API host
pub const LIVE_API_BASE_URL: &str = "https://securepay.sslcommerz.com";

/// SSLCommerz store configuration
#[derive(Debug, Clone)]
pub struct SslCommerzConfig {
    /// Store id issued by SSLCommerz
    pub store_id: String,

    /// Store password issued by SSLCommerz
    pub store_password: String,

    /// Live mode (real charges) instead of sandbox
    pub is_live: bool,

    /// API base URL (for testing/mocking)
    pub api_base_url: String,
}

impl SslCommerzConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `SSLCOMMERZ_STORE_ID`
    /// - `SSLCOMMERZ_STORE_PASSWORD`
    ///
    /// Optional:
    /// - `SSLCOMMERZ_LIVE` (`true` for the live endpoint, default sandbox)
    pub fn from_env() -> Result<Self, MarketError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let store_id = required("SSLCOMMERZ_STORE_ID")?;
        let store_password = required("SSLCOMMERZ_STORE_PASSWORD")?;
        let is_live = env::var("SSLCOMMERZ_LIVE")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);

        Ok(Self::new(store_id, store_password, is_live))
    }

    /// Create config with explicit values
    pub fn new(store_id: impl Into<String>, store_password: impl Into<String>, is_live: bool) -> Self {
        Self {
            store_id: store_id.into(),
            store_password: store_password.into(),
            is_live,
            api_base_url: if is_live {
                LIVE_API_BASE_URL.to_string()
            } else {
                SANDBOX_API_BASE_URL.to_string()
            },
        }
    }

    /// Payment initiation endpoint
    pub fn init_url(&self) -> String {
        format!("{}/gwprocess/v4/api.php", self.api_base_url)
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

fn required(key: &str) -> Result<String, MarketError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(MarketError::Configuration(format!("{} not set", key))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sandbox_and_live_hosts() {
        let sandbox = SslCommerzConfig::new("store", "secret", false);
        assert_eq!(
            sandbox.init_url(),
            "https://sandbox.sslcommerz.com/gwprocess/v4/api.php"
        );

        let live = SslCommerzConfig::new("store", "secret", true);
        assert_eq!(
            live.init_url(),
            "https://securepay.sslcommerz.com/gwprocess/v4/api.php"
        );
    }

    #[test]
    fn test_custom_base_url() {
        let config =
            SslCommerzConfig::new("store", "secret", false).with_api_base_url("http://127.0.0.1:9000");
        assert_eq!(config.init_url(), "http://127.0.0.1:9000/gwprocess/v4/api.php");
    }

    #[test]
    fn test_from_env_missing_store_id() {
        env::remove_var("SSLCOMMERZ_STORE_ID");

        let result = SslCommerzConfig::from_env();
        assert!(matches!(result, Err(MarketError::Configuration(_))));
    }
}
