//! # SSLCommerz Payment Initiation
//!
//! Implementation of the SSLCommerz hosted checkout (`gwprocess/v4`).
//! The buyer is redirected to `GatewayPageURL`; SSLCommerz later posts to the
//! success/fail URLs carried in the request.

use crate::config::SslCommerzConfig;
use async_trait::async_trait;
use medi_core::{GatewaySession, MarketError, MarketResult, PaymentGateway, PaymentRequest};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info, instrument};

const GATEWAY: &str = "sslcommerz";

/// SSLCommerz gateway client
pub struct SslCommerzGateway {
    config: SslCommerzConfig,
    client: Client,
}

impl SslCommerzGateway {
    /// Create a new SSLCommerz gateway client
    pub fn new(config: SslCommerzConfig) -> MarketResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| MarketError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> MarketResult<Self> {
        Self::new(SslCommerzConfig::from_env()?)
    }

    pub fn is_live(&self) -> bool {
        self.config.is_live
    }

    /// Form fields for the init call: store credentials, then the request
    fn form_params(&self, request: &PaymentRequest) -> Vec<(&'static str, String)> {
        vec![
            ("store_id", self.config.store_id.clone()),
            ("store_passwd", self.config.store_password.clone()),
            ("total_amount", request.total_amount.to_string()),
            ("currency", request.currency.clone()),
            ("tran_id", request.tran_id.clone()),
            ("success_url", request.success_url.clone()),
            ("fail_url", request.fail_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("ipn_url", request.ipn_url.clone()),
            ("shipping_method", request.shipping_method.clone()),
            ("product_name", request.product_name.clone()),
            ("product_category", request.product_category.clone()),
            ("product_profile", request.product_profile.clone()),
            ("cus_name", request.cus_name.clone()),
            ("cus_email", request.cus_email.clone()),
            ("cus_add1", request.cus_add1.clone()),
            ("cus_add2", request.cus_add2.clone()),
            ("cus_city", request.cus_city.clone()),
            ("cus_state", request.cus_state.clone()),
            ("cus_postcode", request.cus_postcode.clone()),
            ("cus_country", request.cus_country.clone()),
            ("cus_phone", request.cus_phone.clone()),
            ("cus_fax", request.cus_fax.clone()),
            ("ship_name", request.ship_name.clone()),
            ("ship_add1", request.ship_add1.clone()),
            ("ship_add2", request.ship_add2.clone()),
            ("ship_city", request.ship_city.clone()),
            ("ship_state", request.ship_state.clone()),
            ("ship_postcode", request.ship_postcode.to_string()),
            ("ship_country", request.ship_country.clone()),
        ]
    }
}

#[async_trait]
impl PaymentGateway for SslCommerzGateway {
    #[instrument(skip(self, request), fields(tran_id = %request.tran_id))]
    async fn init(&self, request: &PaymentRequest) -> MarketResult<GatewaySession> {
        let url = self.config.init_url();
        debug!(
            "Initiating SSLCommerz payment: amount={} {}, live={}",
            request.total_amount, request.currency, self.config.is_live
        );

        let response = self
            .client
            .post(&url)
            .form(&self.form_params(request))
            .send()
            .await
            .map_err(|e| MarketError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MarketError::Network(e.to_string()))?;

        if !status.is_success() {
            error!("SSLCommerz API error: status={}, body={}", status, body);
            return Err(gateway_error(format!("HTTP {}: {}", status, body)));
        }

        let init: InitResponse = serde_json::from_str(&body).map_err(|e| {
            MarketError::Serialization(format!("Failed to parse SSLCommerz response: {}", e))
        })?;

        if !init.status.eq_ignore_ascii_case("SUCCESS") {
            let reason = init
                .failed_reason
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| init.status.clone());
            error!("SSLCommerz rejected payment: {}", reason);
            return Err(gateway_error(reason));
        }

        let redirect_url = init
            .gateway_page_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| gateway_error("response has no GatewayPageURL"))?;

        info!("SSLCommerz session ready: url={}", redirect_url);

        Ok(GatewaySession {
            redirect_url,
            session_key: init.session_key,
        })
    }

    fn gateway_name(&self) -> &'static str {
        GATEWAY
    }
}

fn gateway_error(message: impl Into<String>) -> MarketError {
    MarketError::Gateway {
        gateway: GATEWAY.to_string(),
        message: message.into(),
    }
}

// =============================================================================
// SSLCommerz API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct InitResponse {
    status: String,
    #[serde(default, rename = "failedreason")]
    failed_reason: Option<String>,
    #[serde(default, rename = "sessionkey")]
    session_key: Option<String>,
    #[serde(default, rename = "GatewayPageURL")]
    gateway_page_url: Option<String>,
}
