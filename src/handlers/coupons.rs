use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use serde::Serialize;

use crate::{
    auth::{AuthRouterExt, ADMIN_ROLE},
    entities::coupon,
    errors::ServiceError,
    handlers::common::{created_response, parse_id, DataPayload, Empty},
    services::coupons::{
        ApplyCouponRequest, CouponApplication, CreateCouponRequest, UpdateCouponRequest,
    },
    ApiResponse, ApiResult, AppState,
};

const COUPON_NOT_FOUND: &str = "Coupon not found";

#[derive(Debug, Serialize)]
pub struct CouponPayload {
    pub coupon: coupon::Model,
}

#[derive(Debug, Serialize)]
pub struct CouponListPayload {
    pub count: usize,
    pub coupons: Vec<coupon::Model>,
}

/// Coupon routes, nested under `/api/v1/coupon`.
pub fn coupon_routes() -> Router<AppState> {
    let admin = Router::new()
        .route("/create", post(create_coupon))
        .route("/delete/:id", delete(delete_coupon))
        .route("/update/:id", put(update_coupon))
        .route("/toggle/:id", put(toggle_coupon))
        .with_role(ADMIN_ROLE);

    let customer = Router::new()
        .route("/apply", post(apply_coupon))
        .with_auth();

    Router::new()
        .route("/all", get(list_coupons))
        .merge(admin)
        .merge(customer)
}

pub async fn create_coupon(
    State(state): State<AppState>,
    payload: Result<Json<CreateCouponRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<CouponPayload>>), ServiceError> {
    let Json(request) = payload?;
    let coupon = state.services.coupons.create(request).await?;

    Ok(created_response(ApiResponse::with_message(
        "Coupon created successfully",
        CouponPayload { coupon },
    )))
}

pub async fn list_coupons(State(state): State<AppState>) -> ApiResult<CouponListPayload> {
    let coupons = state.services.coupons.list().await?;

    Ok(Json(ApiResponse::success(CouponListPayload {
        count: coupons.len(),
        coupons,
    })))
}

pub async fn apply_coupon(
    State(state): State<AppState>,
    payload: Result<Json<ApplyCouponRequest>, JsonRejection>,
) -> ApiResult<DataPayload<CouponApplication>> {
    let Json(request) = payload?;
    let data = state.services.coupons.apply(request).await?;

    Ok(Json(ApiResponse::with_message(
        "Coupon applied successfully",
        DataPayload { data },
    )))
}

pub async fn delete_coupon(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Empty> {
    let id = parse_id(&id, COUPON_NOT_FOUND)?;
    state.services.coupons.delete(id).await?;

    Ok(Json(ApiResponse::with_message("Coupon deleted successfully", Empty {})))
}

pub async fn update_coupon(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateCouponRequest>, JsonRejection>,
) -> ApiResult<CouponPayload> {
    let id = parse_id(&id, COUPON_NOT_FOUND)?;
    let Json(request) = payload?;
    let coupon = state.services.coupons.update(id, request).await?;

    Ok(Json(ApiResponse::with_message(
        "Coupon updated successfully",
        CouponPayload { coupon },
    )))
}

pub async fn toggle_coupon(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<CouponPayload> {
    let id = parse_id(&id, COUPON_NOT_FOUND)?;
    let coupon = state.services.coupons.toggle(id).await?;

    let message = if coupon.is_active {
        "Coupon activated successfully"
    } else {
        "Coupon deactivated successfully"
    };
    Ok(Json(ApiResponse::with_message(message, CouponPayload { coupon })))
}
