/*!
 * # Metrics Module
 *
 * Business counters for the storefront exported in Prometheus text format at
 * `/metrics`. Every counter is labelled by `outcome` so that rejections can be
 * told apart from successes without parsing logs.
 */

use crate::errors::ServiceError;
use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::warn;

lazy_static! {
    pub static ref COUPON_APPLICATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "storefront_coupon_applications_total",
            "Coupon application attempts by outcome"
        ),
        &["outcome"]
    )
    .expect("metric can be created");
    pub static ref PAYMENT_VERIFICATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "storefront_payment_verifications_total",
            "Payment verification attempts by outcome"
        ),
        &["outcome"]
    )
    .expect("metric can be created");
    pub static ref GATEWAY_ORDERS: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "storefront_gateway_orders_total",
            "Payment gateway order creations by outcome"
        ),
        &["outcome"]
    )
    .expect("metric can be created");
    static ref REGISTRY: Registry = build_registry();
}

fn build_registry() -> Registry {
    let registry = Registry::new();
    for counter in [
        &*COUPON_APPLICATIONS,
        &*PAYMENT_VERIFICATIONS,
        &*GATEWAY_ORDERS,
    ] {
        if let Err(e) = registry.register(Box::new(counter.clone())) {
            warn!(error = %e, "failed to register metric");
        }
    }
    registry
}

/// Classifies a service result into a low-cardinality `outcome` label.
pub fn outcome_label<T>(result: &Result<T, ServiceError>, success: &'static str) -> &'static str {
    match result {
        Ok(_) => success,
        Err(ServiceError::ValidationError(_)) => "invalid",
        Err(ServiceError::Conflict(_)) => "conflict",
        Err(ServiceError::NotFound(_)) => "not_found",
        Err(ServiceError::Inactive(_)) => "inactive",
        Err(ServiceError::Expired(_)) => "expired",
        Err(ServiceError::LimitReached(_)) => "limit_reached",
        Err(ServiceError::MinimumNotMet(_)) => "minimum_not_met",
        Err(ServiceError::SignatureMismatch(_)) => "signature_mismatch",
        Err(ServiceError::GatewayError(_)) => "gateway_error",
        Err(ServiceError::Unauthorized(_)) | Err(ServiceError::Forbidden(_)) => "denied",
        Err(ServiceError::DatabaseError(_)) | Err(ServiceError::InternalError(_)) => "error",
    }
}

/// Renders every registered metric in the Prometheus text exposition format.
pub fn render() -> Result<String, ServiceError> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| ServiceError::InternalError(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| ServiceError::InternalError(format!("Metrics are not valid UTF-8: {}", e)))
}

/// HTTP endpoint handler for metrics
pub async fn metrics_handler() -> Result<String, ServiceError> {
    render()
}
