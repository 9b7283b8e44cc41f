mod common;

use axum::http::{Method, StatusCode};
use chrono::Utc;
use common::{response_json, TestApp, KEY_SECRET};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::json;
use storefront_api::{
    entities::{
        order::{self, OrderStatus},
        order_product,
    },
    services::payments::sign_payment,
};
use uuid::Uuid;

/// Records an order through the payment endpoint and returns its id.
async fn place_order(app: &TestApp, reference: &str, products: &[Uuid]) -> Uuid {
    let payment = format!("pay_{reference}");
    let signature = sign_payment(KEY_SECRET, reference, &payment).unwrap();
    let response = app
        .as_user(
            Method::POST,
            "/api/v1/payment/verify",
            Some(json!({
                "orderReference": reference,
                "paymentReference": payment,
                "signature": signature,
                "cartItems": products.iter().map(Uuid::to_string).collect::<Vec<_>>(),
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    body["orderId"].as_str().unwrap().parse().unwrap()
}

async fn seeded_app() -> (TestApp, Uuid, Uuid) {
    let app = TestApp::new().await;
    let mug = app.seed_product("Mug", dec!(100)).await.id;
    let tee = app.seed_product("Tee", dec!(40)).await.id;
    app.seed_product("Poster", dec!(15)).await;

    place_order(&app, "order_1", &[mug, tee]).await;
    place_order(&app, "order_2", &[tee, tee]).await;
    let cancelled = place_order(&app, "order_3", &[mug]).await;

    let stored = order::Entity::find_by_id(cancelled)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    let mut active: order::ActiveModel = stored.into();
    active.status = Set(OrderStatus::Cancelled);
    active.updated_at = Set(Utc::now());
    active.update(&*app.state.db).await.unwrap();

    (app, mug, tee)
}

#[tokio::test]
async fn overview_ignores_cancelled_orders() {
    let (app, _, _) = seeded_app().await;

    let response = app.as_admin(Method::GET, "/api/v1/analytics/overview", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let data = response_json(response).await["data"].clone();
    assert_eq!(data["totalRevenue"], json!("220.00"));
    assert_eq!(data["totalOrders"], json!(2));
    assert_eq!(data["totalProducts"], json!(3));
    assert_eq!(data["pendingOrders"], json!(2));
}

#[tokio::test]
async fn daily_and_monthly_sales_bucket_todays_orders() {
    let (app, _, _) = seeded_app().await;
    let today = Utc::now();

    let body = response_json(
        app.as_admin(Method::GET, "/api/v1/analytics/daily-sales?days=1", None)
            .await,
    )
    .await;
    let days = body["data"].as_array().unwrap();
    assert_eq!(days.len(), 1);
    assert_eq!(days[0]["date"], json!(today.format("%Y-%m-%d").to_string()));
    assert_eq!(days[0]["sales"], json!("220.00"));
    assert_eq!(days[0]["orders"], json!(2));

    let body = response_json(
        app.as_admin(Method::GET, "/api/v1/analytics/monthly-sales", None)
            .await,
    )
    .await;
    let months = body["data"].as_array().unwrap();
    assert_eq!(months.len(), 1);
    assert_eq!(months[0]["month"], json!(today.format("%Y-%m").to_string()));
    assert_eq!(months[0]["orders"], json!(2));
}

#[tokio::test]
async fn top_products_rank_by_units_sold() {
    let (app, mug, tee) = seeded_app().await;

    let body = response_json(
        app.as_admin(Method::GET, "/api/v1/analytics/top-products?limit=5", None)
            .await,
    )
    .await;
    let top = body["data"].as_array().unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0]["productId"], json!(tee.to_string()));
    assert_eq!(top[0]["totalSold"], json!(3));
    assert_eq!(top[0]["revenue"], json!("120.00"));
    assert_eq!(top[1]["productId"], json!(mug.to_string()));
    assert_eq!(top[1]["totalSold"], json!(1));
}

/// Writes `count` single-line orders straight to the store, in batches small
/// enough for every backend's bind-parameter limit.
async fn bulk_orders(app: &TestApp, product: Uuid, count: usize) {
    let now = Utc::now();
    let ids: Vec<Uuid> = (0..count).map(|_| Uuid::new_v4()).collect();
    for chunk in ids.chunks(1_000) {
        let orders = chunk.iter().map(|id| order::ActiveModel {
            id: Set(*id),
            buyer_id: Set("bulk-buyer".into()),
            status: Set(OrderStatus::NotProcess),
            gateway_order_id: Set(format!("order_{id}")),
            gateway_payment_id: Set(format!("pay_{id}")),
            gateway_signature: Set("sig".into()),
            created_at: Set(now),
            updated_at: Set(now),
        });
        order::Entity::insert_many(orders)
            .exec(&*app.state.db)
            .await
            .unwrap();

        let lines = chunk.iter().map(|id| order_product::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(*id),
            product_id: Set(product),
            position: Set(0),
        });
        order_product::Entity::insert_many(lines)
            .exec(&*app.state.db)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn reports_scale_past_the_bind_parameter_limit() {
    let app = TestApp::new().await;
    let sticker = app.seed_product("Sticker", dec!(2)).await.id;
    bulk_orders(&app, sticker, 33_000).await;

    let response = app.as_admin(Method::GET, "/api/v1/analytics/overview", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let data = response_json(response).await["data"].clone();
    assert_eq!(data["totalOrders"], json!(33_000));
    assert_eq!(data["pendingOrders"], json!(33_000));
    assert_eq!(data["totalRevenue"], json!("66000.00"));

    let response = app
        .as_admin(Method::GET, "/api/v1/analytics/daily-sales?days=1", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let days = response_json(response).await["data"].clone();
    assert_eq!(days[0]["orders"], json!(33_000));
    assert_eq!(days[0]["sales"], json!("66000.00"));

    let response = app
        .as_admin(Method::GET, "/api/v1/analytics/top-products", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let top = response_json(response).await["data"].clone();
    assert_eq!(top[0]["productId"], json!(sticker.to_string()));
    assert_eq!(top[0]["totalSold"], json!(33_000));
}

#[tokio::test]
async fn query_ranges_and_roles_are_enforced() {
    let app = TestApp::new().await;

    let response = app
        .as_admin(Method::GET, "/api/v1/analytics/daily-sales?days=0", None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response_json(response).await["message"],
        json!("days must be between 1 and 365")
    );

    let response = app
        .as_admin(Method::GET, "/api/v1/analytics/top-products?limit=many", None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.as_user(Method::GET, "/api/v1/analytics/overview", None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
