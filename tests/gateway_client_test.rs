//! HTTP-level behaviour of the Razorpay-compatible gateway client.

use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;
use storefront_api::{
    errors::ServiceError,
    services::payment_gateway::{
        GatewayConfig, GatewayOrderRequest, PaymentGateway, RazorpayGateway,
    },
};
use wiremock::{
    matchers::{basic_auth, body_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn gateway(server: &MockServer) -> RazorpayGateway {
    RazorpayGateway::new(GatewayConfig {
        base_url: format!("{}/v1/", server.uri()),
        key_id: "rzp_test_key".into(),
        key_secret: "rzp_test_secret".into(),
        timeout: Duration::from_secs(2),
    })
    .expect("client builds")
}

fn request() -> GatewayOrderRequest {
    GatewayOrderRequest {
        amount: 49_900,
        currency: "INR".into(),
        receipt: "receipt_1700000000000".into(),
    }
}

#[tokio::test]
async fn creates_order_with_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .and(basic_auth("rzp_test_key", "rzp_test_secret"))
        .and(body_json(json!({
            "amount": 49_900,
            "currency": "INR",
            "receipt": "receipt_1700000000000",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "order_NZ8x",
            "entity": "order",
            "amount": 49_900,
            "currency": "INR",
            "receipt": "receipt_1700000000000",
            "status": "created",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let order = gateway(&server).create_order(request()).await.unwrap();
    assert_eq!(order.id, "order_NZ8x");
    assert_eq!(order.status.as_deref(), Some("created"));
    assert_eq!(order.extra.get("entity"), Some(&json!("order")));
}

#[tokio::test]
async fn rejected_requests_become_gateway_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"code": "BAD_REQUEST_ERROR", "description": "Authentication failed"}
        })))
        .mount(&server)
        .await;

    let err = gateway(&server).create_order(request()).await.unwrap_err();
    assert_matches!(err, ServiceError::GatewayError(m) if m == "Error creating payment order");
}

#[tokio::test]
async fn orders_without_an_id_are_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "", "amount": 1})))
        .mount(&server)
        .await;

    let err = gateway(&server).create_order(request()).await.unwrap_err();
    assert_matches!(err, ServiceError::GatewayError(_));
}

#[tokio::test]
async fn slow_gateways_time_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": "order_late"}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let err = gateway(&server).create_order(request()).await.unwrap_err();
    assert_matches!(err, ServiceError::GatewayError(_));
}

#[test]
fn key_id_is_exposed_but_secret_is_not_debug_printed() {
    let config = GatewayConfig {
        base_url: "https://api.razorpay.com/v1".into(),
        key_id: "rzp_live_public".into(),
        key_secret: "super-secret".into(),
        timeout: Duration::from_secs(10),
    };
    assert!(!format!("{config:?}").contains("super-secret"));

    let gateway = RazorpayGateway::new(config).unwrap();
    assert_eq!(gateway.key_id(), "rzp_live_public");
}
