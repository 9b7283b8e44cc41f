use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    auth::{AuthRouterExt, AuthUser},
    services::{
        payment_gateway::GatewayOrder,
        payments::{ConfirmedOrder, CreateOrderRequest, VerifyPaymentRequest},
    },
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Serialize)]
pub struct KeyPayload {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct OrderPayload {
    pub order: GatewayOrder,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedPaymentPayload {
    pub order_id: Uuid,
    pub order: ConfirmedOrder,
}

/// Checkout routes, nested under `/api/v1/payment`.
pub fn payment_routes() -> Router<AppState> {
    let checkout = Router::new()
        .route("/order", post(create_order))
        .route("/verify", post(verify_payment))
        .with_auth();

    Router::new().route("/key", get(get_key)).merge(checkout)
}

/// Public key id for initializing the client-side checkout widget.
pub async fn get_key(State(state): State<AppState>) -> ApiResult<KeyPayload> {
    Ok(Json(ApiResponse::success(KeyPayload {
        key: state.services.payments.public_key(),
    })))
}

pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> ApiResult<OrderPayload> {
    let Json(request) = payload?;
    let order = state.services.payments.create_order(request).await?;

    Ok(Json(ApiResponse::success(OrderPayload { order })))
}

/// Authenticates the gateway callback and records the order for the caller.
pub async fn verify_payment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<VerifyPaymentRequest>, JsonRejection>,
) -> ApiResult<VerifiedPaymentPayload> {
    let Json(request) = payload?;
    let order = state
        .services
        .payments
        .verify_and_record(request, &user.user_id)
        .await?;

    Ok(Json(ApiResponse::with_message(
        "Payment verified and order created successfully",
        VerifiedPaymentPayload {
            order_id: order.id,
            order,
        },
    )))
}
