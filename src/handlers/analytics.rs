use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::Json,
    routing::get,
    Router,
};

use crate::{
    auth::{AuthRouterExt, ADMIN_ROLE},
    handlers::common::DataPayload,
    services::analytics::{
        DailySales, DailySalesQuery, MonthlySales, MonthlySalesQuery, SalesOverview, TopProduct,
        TopProductsQuery,
    },
    ApiResponse, ApiResult, AppState,
};

/// Build the analytics Router scoped under `/api/v1/analytics`.
pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/overview", get(get_overview))
        .route("/daily-sales", get(get_daily_sales))
        .route("/monthly-sales", get(get_monthly_sales))
        .route("/top-products", get(get_top_products))
        .with_role(ADMIN_ROLE)
}

pub async fn get_overview(State(state): State<AppState>) -> ApiResult<DataPayload<SalesOverview>> {
    let data = state.services.analytics.overview().await?;
    Ok(Json(ApiResponse::success(DataPayload { data })))
}

/// Revenue and order counts per UTC day over the last `days` days (default 7)
pub async fn get_daily_sales(
    State(state): State<AppState>,
    query: Result<Query<DailySalesQuery>, QueryRejection>,
) -> ApiResult<DataPayload<Vec<DailySales>>> {
    let Query(query) = query?;
    let data = state.services.analytics.daily_sales(query).await?;
    Ok(Json(ApiResponse::success(DataPayload { data })))
}

pub async fn get_monthly_sales(
    State(state): State<AppState>,
    query: Result<Query<MonthlySalesQuery>, QueryRejection>,
) -> ApiResult<DataPayload<Vec<MonthlySales>>> {
    let Query(query) = query?;
    let data = state.services.analytics.monthly_sales(query).await?;
    Ok(Json(ApiResponse::success(DataPayload { data })))
}

/// Best sellers by number of order lines
pub async fn get_top_products(
    State(state): State<AppState>,
    query: Result<Query<TopProductsQuery>, QueryRejection>,
) -> ApiResult<DataPayload<Vec<TopProduct>>> {
    let Query(query) = query?;
    let data = state.services.analytics.top_products(query).await?;
    Ok(Json(ApiResponse::success(DataPayload { data })))
}
