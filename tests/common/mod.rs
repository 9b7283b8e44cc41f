#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{Map, Value};
use storefront_api::{
    app_router,
    auth::{AuthConfig, AuthService, ADMIN_ROLE},
    config::AppConfig,
    db,
    entities::product,
    errors::ServiceError,
    handlers::AppServices,
    services::payment_gateway::{
        GatewayOrder, GatewayOrderRequest, PaymentGateway, GATEWAY_ORDER_ERROR,
    },
    AppState,
};
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "k3y-for-integration-tests-5d1e8b7a90c4f26";
pub const KEY_ID: &str = "rzp_test_storefront";
pub const KEY_SECRET: &str = "rzp_secret_for_tests";
pub const BUYER_ID: &str = "buyer-0001";
pub const ADMIN_ID: &str = "admin-0001";

/// In-process payment gateway that records requests and answers with a canned order.
#[derive(Default)]
pub struct StubGateway {
    pub requests: Mutex<Vec<GatewayOrderRequest>>,
    pub fail: bool,
}

impl StubGateway {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn recorded(&self) -> Vec<GatewayOrderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_order(&self, request: GatewayOrderRequest) -> Result<GatewayOrder, ServiceError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(ServiceError::GatewayError(GATEWAY_ORDER_ERROR.into()));
        }
        Ok(GatewayOrder {
            id: format!("order_stub_{}", self.requests.lock().unwrap().len()),
            amount: request.amount,
            currency: request.currency,
            receipt: Some(request.receipt),
            status: Some("created".into()),
            extra: Map::new(),
        })
    }

    fn key_id(&self) -> String {
        KEY_ID.to_string()
    }
}

/// Application router over a fresh in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: Arc<StubGateway>,
    pub admin_token: String,
    pub user_token: String,
    auth_service: Arc<AuthService>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_gateway(StubGateway::default(), |_| {}).await
    }

    /// Build with a specific gateway and a hook to adjust configuration.
    pub async fn with_gateway(gateway: StubGateway, tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            JWT_SECRET.to_string(),
            KEY_ID.to_string(),
            KEY_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // A single connection keeps every query on the same in-memory database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        tweak(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let gateway = Arc::new(gateway);
        let services = AppServices::new(db_arc.clone(), gateway.clone(), &cfg);
        let state = AppState {
            db: db_arc,
            config: cfg.clone(),
            services,
        };

        let auth_service = Arc::new(AuthService::new(AuthConfig::new(
            cfg.jwt_secret.clone(),
            Duration::from_secs(3600),
        )));
        let admin_token = auth_service
            .generate_token(ADMIN_ID, &[ADMIN_ROLE])
            .expect("mint admin token");
        let user_token = auth_service
            .generate_token(BUYER_ID, &[])
            .expect("mint user token");

        let router = app_router(state.clone(), auth_service.clone());

        Self {
            router,
            state,
            gateway,
            admin_token,
            user_token,
            auth_service,
        }
    }

    pub fn token_for(&self, subject: &str) -> String {
        self.auth_service
            .generate_token(subject, &[])
            .expect("mint token")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Send a prebuilt request, for tests that need custom headers.
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn as_admin(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, body, Some(&self.admin_token)).await
    }

    pub async fn as_user(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, body, Some(&self.user_token)).await
    }

    pub async fn seed_product(&self, name: &str, price: Decimal) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            price: Set(price),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product for tests")
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
