//! Gateway order creation and payment verification over the HTTP router.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, StubGateway, TestApp, BUYER_ID, KEY_ID, KEY_SECRET};
use rust_decimal_macros::dec;
use serde_json::json;
use storefront_api::services::payments::sign_payment;

#[tokio::test]
async fn public_key_needs_no_token() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/payment/key", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["key"], json!(KEY_ID));
}

#[tokio::test]
async fn order_creation_forwards_amount_and_receipt() {
    let app = TestApp::new().await;

    let response = app
        .as_user(Method::POST, "/api/v1/payment/order", Some(json!({"amount": 49900})))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["order"]["id"], json!("order_stub_1"));
    assert_eq!(body["order"]["amount"], json!(49900));
    assert_eq!(body["order"]["currency"], json!("INR"));

    let sent = app.gateway.recorded();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].receipt.starts_with("receipt_"));
}

#[tokio::test]
async fn order_creation_validates_amount_and_surfaces_gateway_failures() {
    let app = TestApp::new().await;
    let response = app
        .as_user(Method::POST, "/api/v1/payment/order", Some(json!({"amount": 0})))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.gateway.recorded().is_empty());

    let app = TestApp::with_gateway(StubGateway::failing(), |_| {}).await;
    let response = app
        .as_user(Method::POST, "/api/v1/payment/order", Some(json!({"amount": 100})))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response_json(response).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!("Error creating payment order"));
}

#[tokio::test]
async fn signed_callback_records_order_for_caller() {
    let app = TestApp::new().await;
    let mug = app.seed_product("Mug", dec!(250)).await;
    let tee = app.seed_product("Tee", dec!(499)).await;
    let signature = sign_payment(KEY_SECRET, "order_abc", "pay_xyz").unwrap();

    let response = app
        .as_user(
            Method::POST,
            "/api/v1/payment/verify",
            Some(json!({
                "razorpay_order_id": "order_abc",
                "razorpay_payment_id": "pay_xyz",
                "razorpay_signature": signature,
                "cartItems": [{"productId": tee.id.to_string()}, {"_id": mug.id.to_string()}],
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(
        body["message"],
        json!("Payment verified and order created successfully")
    );
    assert_eq!(body["orderId"], body["order"]["id"]);
    assert_eq!(body["order"]["buyer"], json!(BUYER_ID));
    assert_eq!(body["order"]["status"], json!("Not Process"));
    assert_eq!(
        body["order"]["products"],
        json!([tee.id.to_string(), mug.id.to_string()])
    );
    assert_eq!(body["order"]["payment"]["orderReference"], json!("order_abc"));
    assert_eq!(body["order"]["payment"]["signature"], json!(signature));
}

#[tokio::test]
async fn tampered_signature_is_rejected() {
    let app = TestApp::new().await;
    let product = app.seed_product("Mug", dec!(250)).await;
    let mut signature = sign_payment(KEY_SECRET, "order_abc", "pay_xyz").unwrap();
    let last = if signature.ends_with('0') { "1" } else { "0" };
    signature.replace_range(signature.len() - 1.., last);

    let response = app
        .as_user(
            Method::POST,
            "/api/v1/payment/verify",
            Some(json!({
                "orderReference": "order_abc",
                "paymentReference": "pay_xyz",
                "signature": signature,
                "cartItems": [product.id.to_string()],
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response_json(response).await["message"],
        json!("Payment signature verification failed")
    );
}

#[tokio::test]
async fn missing_signature_depends_on_configuration() {
    let strict = TestApp::new().await;
    let product = strict.seed_product("Mug", dec!(250)).await;
    let payload = json!({
        "orderReference": "order_abc",
        "paymentReference": "pay_xyz",
        "cartItems": [product.id.to_string()],
    });

    let response = strict
        .as_user(Method::POST, "/api/v1/payment/verify", Some(payload.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response_json(response).await["message"],
        json!("Payment signature is required")
    );

    let lenient = TestApp::with_gateway(StubGateway::default(), |cfg| {
        cfg.require_payment_signature = false;
    })
    .await;
    let response = lenient
        .as_user(Method::POST, "/api/v1/payment/verify", Some(payload))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["order"]["payment"]["signature"], json!("not_provided"));
}

#[tokio::test]
async fn verify_requires_references_cart_and_token() {
    let app = TestApp::new().await;

    let response = app
        .as_user(
            Method::POST,
            "/api/v1/payment/verify",
            Some(json!({"paymentReference": "pay_xyz", "cartItems": []})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response_json(response).await["message"],
        json!("Order ID and Payment ID are required")
    );

    let signature = sign_payment(KEY_SECRET, "order_abc", "pay_xyz").unwrap();
    let response = app
        .as_user(
            Method::POST,
            "/api/v1/payment/verify",
            Some(json!({
                "orderReference": "order_abc",
                "paymentReference": "pay_xyz",
                "signature": signature,
                "cartItems": [],
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response_json(response).await["message"],
        json!("Cart items are required")
    );

    let response = app
        .request(Method::POST, "/api/v1/payment/verify", Some(json!({})), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
