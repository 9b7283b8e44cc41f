//! Storefront API Library
//!
//! Coupon engine, payment verification and the supporting order, wishlist
//! and sales reporting endpoints of the storefront backend.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod middleware_helpers;
pub mod migrator;
pub mod services;
pub mod tracing;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;

use crate::auth::AuthService;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
}

/// Success envelope. The payload's fields are inlined next to `success`, so a
/// payload `{coupon}` serializes as `{"success": true, "coupon": {...}, "meta": {...}}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub payload: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(payload: T) -> Self {
        Self {
            success: true,
            message: None,
            payload,
            meta: ResponseMeta::capture(),
        }
    }

    pub fn with_message(message: impl Into<String>, payload: T) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::success(payload)
        }
    }
}


/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Every versioned route; mounted under `/api/v1`.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/coupon", handlers::coupons::coupon_routes())
        .nest("/payment", handlers::payments::payment_routes())
        .nest("/wishlist", handlers::wishlist::wishlist_routes())
        .nest("/analytics", handlers::analytics::analytics_routes())
}

/// Full application router with the request-scoped layers every route needs.
/// Transport concerns (CORS, compression) are added by the binary.
pub fn app_router(state: AppState, auth_service: Arc<AuthService>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(api_status))
        .route("/metrics", get(metrics_endpoint))
        .nest("/api/v1", api_v1_routes())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        // Inject AuthService into request extensions for auth middleware
        .layer(axum::middleware::from_fn_with_state(
            auth_service,
            inject_auth_service,
        ))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

async fn inject_auth_service(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    request.extensions_mut().insert(auth);
    next.run(request).await
}

#[derive(Debug, Serialize)]
pub struct StatusPayload {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub environment: String,
}

async fn api_status(State(state): State<AppState>) -> ApiResult<StatusPayload> {
    Ok(Json(ApiResponse::success(StatusPayload {
        status: "ok",
        service: "storefront-api",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.clone(),
    })))
}

#[derive(Debug, Serialize)]
pub struct HealthPayload {
    pub status: &'static str,
    pub database: &'static str,
}

async fn health_check(State(state): State<AppState>) -> Response {
    let healthy = db::check_connection(&state.db).await.is_ok();
    if !healthy {
        ::tracing::warn!("health check failed: database unreachable");
    }
    health_response(healthy)
}

fn health_response(healthy: bool) -> Response {
    let (status, label) = if healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };
    let mut body = ApiResponse::success(HealthPayload {
        status: label,
        database: label,
    });
    body.success = healthy;
    (status, Json(body)).into_response()
}

async fn metrics_endpoint() -> Response {
    match metrics::metrics_handler().await {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(e) => e.into_response(),
    }
}
