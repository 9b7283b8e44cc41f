use axum::{
    extract::{Path, State},
    response::Json,
    routing::{delete, get, post},
    Extension, Router,
};
use serde::Serialize;

use crate::{
    auth::{AuthRouterExt, AuthUser},
    handlers::common::{parse_id, CountPayload, Empty},
    services::wishlist::WishlistProduct,
    ApiResponse, ApiResult, AppState,
};

const PRODUCT_NOT_FOUND: &str = "Product not found";

#[derive(Debug, Serialize)]
pub struct WishlistPayload {
    pub wishlist: Vec<WishlistProduct>,
}

/// Per-user wishlist routes, nested under `/api/v1/wishlist`. All require a
/// signed-in user.
pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/add/:product_id", post(add_to_wishlist))
        .route("/remove/:product_id", delete(remove_from_wishlist))
        .route("/get", get(get_wishlist))
        .route("/count", get(wishlist_count))
        .with_auth()
}

pub async fn add_to_wishlist(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(product_id): Path<String>,
) -> ApiResult<Empty> {
    let product_id = parse_id(&product_id, PRODUCT_NOT_FOUND)?;
    state.services.wishlist.add(&user.user_id, product_id).await?;

    Ok(Json(ApiResponse::with_message("Product added to wishlist", Empty {})))
}

pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(product_id): Path<String>,
) -> ApiResult<Empty> {
    // An id that cannot exist is trivially not listed.
    if let Ok(product_id) = parse_id(&product_id, PRODUCT_NOT_FOUND) {
        state
            .services
            .wishlist
            .remove(&user.user_id, product_id)
            .await?;
    }

    Ok(Json(ApiResponse::with_message("Product removed from wishlist", Empty {})))
}

pub async fn get_wishlist(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<WishlistPayload> {
    let wishlist = state.services.wishlist.get(&user.user_id).await?;
    Ok(Json(ApiResponse::success(WishlistPayload { wishlist })))
}

pub async fn wishlist_count(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<CountPayload> {
    let count = state.services.wishlist.count(&user.user_id).await?;
    Ok(Json(ApiResponse::success(CountPayload { count })))
}
