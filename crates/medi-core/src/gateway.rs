//! # Payment Gateway Trait
//!
//! Hosted-checkout gateways (SSLCommerz today) implement [`PaymentGateway`].
//! The only synchronous result of a payment is the redirect URL; the outcome
//! arrives later on the success/fail callback routes.

use crate::error::MarketResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Currency the marketplace charges in
pub const CURRENCY: &str = "BDT";

/// Payment initiation request, field names as the gateway expects them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub total_amount: f64,
    pub currency: String,
    pub tran_id: String,
    pub success_url: String,
    pub fail_url: String,
    pub cancel_url: String,
    pub ipn_url: String,
    pub shipping_method: String,
    pub product_name: String,
    pub product_category: String,
    pub product_profile: String,
    pub cus_name: String,
    pub cus_email: String,
    pub cus_add1: String,
    pub cus_add2: String,
    pub cus_city: String,
    pub cus_state: String,
    pub cus_postcode: String,
    pub cus_country: String,
    pub cus_phone: String,
    pub cus_fax: String,
    pub ship_name: String,
    pub ship_add1: String,
    pub ship_add2: String,
    pub ship_city: String,
    pub ship_state: String,
    pub ship_postcode: u32,
    pub ship_country: String,
}

/// What the gateway hands back from `init`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySession {
    /// Page to send the buyer to
    pub redirect_url: String,
    /// Gateway-side session key, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
}

impl GatewaySession {
    pub fn new(redirect_url: impl Into<String>) -> Self {
        Self {
            redirect_url: redirect_url.into(),
            session_key: None,
        }
    }
}

/// Hosted payment gateway client.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Register a payment and return the page the buyer is redirected to.
    async fn init(&self, request: &PaymentRequest) -> MarketResult<GatewaySession>;

    /// Gateway name (for logging)
    fn gateway_name(&self) -> &'static str;
}

/// Type alias for a shared gateway handle (dynamic dispatch)
pub type BoxedGateway = Arc<dyn PaymentGateway>;

/// Base URLs used to build gateway callbacks and buyer redirects
#[derive(Debug, Clone)]
pub struct CallbackUrls {
    /// Public base of this server (gateway posts back here)
    pub server_url: String,
    /// Base of the storefront (buyers land here after a callback)
    pub client_url: String,
    /// Gateway cancel URL
    pub cancel_url: String,
    /// Gateway IPN URL
    pub ipn_url: String,
}

impl CallbackUrls {
    pub fn new(server_url: impl Into<String>, client_url: impl Into<String>) -> Self {
        Self {
            server_url: trim_slash(server_url.into()),
            client_url: trim_slash(client_url.into()),
            cancel_url: "http://localhost:3030/cancel".to_string(),
            ipn_url: "http://localhost:3030/ipn".to_string(),
        }
    }

    /// Builder: gateway cancel/IPN URLs
    pub fn with_gateway_pages(
        mut self,
        cancel_url: impl Into<String>,
        ipn_url: impl Into<String>,
    ) -> Self {
        self.cancel_url = cancel_url.into();
        self.ipn_url = ipn_url.into();
        self
    }

    pub fn success_callback(&self, tran_id: &str) -> String {
        format!("{}/payment/success/{}", self.server_url, tran_id)
    }

    pub fn fail_callback(&self, tran_id: &str) -> String {
        format!("{}/payment/fail/{}", self.server_url, tran_id)
    }

    pub fn success_redirect(&self, tran_id: &str) -> String {
        format!("{}/payment/success/{}", self.client_url, tran_id)
    }

    pub fn fail_redirect(&self, tran_id: &str) -> String {
        format!("{}/payment/fail/{}", self.client_url, tran_id)
    }
}

impl Default for CallbackUrls {
    fn default() -> Self {
        Self::new("http://localhost:5000", "http://localhost:5173")
    }
}

fn trim_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_urls() {
        let urls = CallbackUrls::new("https://api.meditrust.example/", "https://meditrust.example");

        assert_eq!(
            urls.success_callback("t1"),
            "https://api.meditrust.example/payment/success/t1"
        );
        assert_eq!(
            urls.fail_callback("t1"),
            "https://api.meditrust.example/payment/fail/t1"
        );
        assert_eq!(
            urls.success_redirect("t1"),
            "https://meditrust.example/payment/success/t1"
        );
        assert_eq!(urls.fail_redirect("t1"), "https://meditrust.example/payment/fail/t1");
    }

    #[test]
    fn test_default_gateway_pages() {
        let urls = CallbackUrls::default();
        assert_eq!(urls.cancel_url, "http://localhost:3030/cancel");
        assert_eq!(urls.ipn_url, "http://localhost:3030/ipn");
    }
}
