//! Client for the payment processor's order API.
//!
//! The processor speaks the Razorpay REST dialect: orders are created with
//! `POST {base_url}/orders` under HTTP basic auth (`key_id:key_secret`) and
//! come back as JSON objects carrying at least an `id`.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::{config::AppConfig, errors::ServiceError};

pub const GATEWAY_ORDER_ERROR: &str = "Error creating payment order";

/// Order creation request in the processor's wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrderRequest {
    /// Minor currency units (paise for INR)
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
}

/// Opaque order handle returned by the processor. Fields beyond the common
/// ones are passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Seam between the payment flow and the processor; injected once at startup.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, request: GatewayOrderRequest) -> Result<GatewayOrder, ServiceError>;

    /// Public key id handed to browsers for checkout initialization.
    fn key_id(&self) -> String;
}

/// Connection settings for [`RazorpayGateway`]
#[derive(Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub key_id: String,
    pub key_secret: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("key_id", &self.key_id)
            .field("key_secret", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl From<&AppConfig> for GatewayConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            base_url: cfg.payment_gateway_base_url.clone(),
            key_id: cfg.payment_key_id.clone(),
            key_secret: cfg.payment_key_secret.clone(),
            timeout: Duration::from_secs(cfg.payment_gateway_timeout_secs),
        }
    }
}

/// HTTP client for the Razorpay-compatible orders API
pub struct RazorpayGateway {
    client: Client,
    config: GatewayConfig,
}

impl RazorpayGateway {
    /// Build a gateway using a reqwest client with the configured timeout.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to construct reqwest client for payment gateway")?;

        Ok(Self::with_client(config, client))
    }

    /// Build a gateway from an existing client (useful for testing).
    pub fn with_client(config: GatewayConfig, client: Client) -> Self {
        Self { client, config }
    }

    fn orders_url(&self) -> String {
        format!("{}/orders", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    async fn create_order(&self, request: GatewayOrderRequest) -> Result<GatewayOrder, ServiceError> {
        let url = self.orders_url();
        debug!(%url, amount = request.amount, receipt = %request.receipt, "creating gateway order");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "payment gateway request failed");
                ServiceError::GatewayError(GATEWAY_ORDER_ERROR.into())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                status = status.as_u16(),
                body = %body.chars().take(512).collect::<String>(),
                "payment gateway rejected order creation"
            );
            return Err(ServiceError::GatewayError(GATEWAY_ORDER_ERROR.into()));
        }

        let order: GatewayOrder = response.json().await.map_err(|e| {
            error!(error = %e, "payment gateway returned an unreadable order");
            ServiceError::GatewayError(GATEWAY_ORDER_ERROR.into())
        })?;

        if order.id.trim().is_empty() {
            error!("payment gateway returned an order without an id");
            return Err(ServiceError::GatewayError(GATEWAY_ORDER_ERROR.into()));
        }

        Ok(order)
    }

    fn key_id(&self) -> String {
        self.config.key_id.clone()
    }
}
