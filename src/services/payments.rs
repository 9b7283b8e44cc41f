use std::sync::Arc;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::{
        order::{self, OrderStatus},
        order_product,
    },
    errors::ServiceError,
    metrics::{outcome_label, GATEWAY_ORDERS, PAYMENT_VERIFICATIONS},
    services::payment_gateway::{GatewayOrder, GatewayOrderRequest, PaymentGateway},
};

type HmacSha256 = Hmac<Sha256>;

/// Recorded in place of a signature when unsigned callbacks are accepted.
pub const SIGNATURE_NOT_PROVIDED: &str = "not_provided";

/// Keys that may carry a product id inside a cart entry, in preference order.
const PRODUCT_ID_KEYS: [&str; 3] = ["productId", "_id", "id"];

/// Hex length of an HMAC-SHA256 digest.
const SIGNATURE_HEX_LEN: usize = 64;

#[derive(Debug, Default, Clone, Deserialize)]
pub struct CreateOrderRequest {
    /// Minor currency units
    pub amount: Option<i64>,
}

/// Gateway callback fields plus the cart being paid for.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    #[serde(alias = "razorpay_order_id")]
    pub order_reference: Option<String>,
    #[serde(alias = "razorpay_payment_id")]
    pub payment_reference: Option<String>,
    #[serde(alias = "razorpay_signature")]
    pub signature: Option<String>,
    #[serde(alias = "cart")]
    pub cart_items: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub order_reference: String,
    pub payment_reference: String,
    pub signature: String,
}

/// Order persisted after a payment has been authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedOrder {
    pub id: Uuid,
    pub buyer: String,
    pub products: Vec<Uuid>,
    pub payment: PaymentDetails,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Creates gateway orders and turns authenticated payment callbacks into orders
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn PaymentGateway>,
    signing_secret: String,
    currency: String,
    require_signature: bool,
}

impl PaymentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn PaymentGateway>,
        signing_secret: String,
        currency: String,
        require_signature: bool,
    ) -> Self {
        Self {
            db,
            gateway,
            signing_secret,
            currency,
            require_signature,
        }
    }

    /// Public identifier for client-side checkout; never secret material.
    pub fn public_key(&self) -> String {
        self.gateway.key_id()
    }

    #[instrument(skip(self))]
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<GatewayOrder, ServiceError> {
        let amount = match request.amount {
            Some(amount) if amount > 0 => amount,
            _ => {
                return Err(ServiceError::ValidationError(
                    "Amount must be a positive integer in minor currency units".into(),
                ))
            }
        };

        let gateway_request = GatewayOrderRequest {
            amount,
            currency: self.currency.clone(),
            receipt: format!("receipt_{}", Utc::now().timestamp_millis()),
        };

        let result = self.gateway.create_order(gateway_request).await;
        GATEWAY_ORDERS
            .with_label_values(&[outcome_label(&result, "created")])
            .inc();

        let order = result?;
        info!(gateway_order_id = %order.id, amount, "gateway order created");
        Ok(order)
    }

    /// Authenticates the callback and records the order.
    #[instrument(skip(self, request))]
    pub async fn verify_and_record(
        &self,
        request: VerifyPaymentRequest,
        buyer_id: &str,
    ) -> Result<ConfirmedOrder, ServiceError> {
        let result = self.verify_and_record_inner(request, buyer_id).await;
        PAYMENT_VERIFICATIONS
            .with_label_values(&[outcome_label(&result, "verified")])
            .inc();
        result
    }

    async fn verify_and_record_inner(
        &self,
        request: VerifyPaymentRequest,
        buyer_id: &str,
    ) -> Result<ConfirmedOrder, ServiceError> {
        let payment = self.authenticate(&request)?;
        let products = normalize_cart(request.cart_items.as_deref().unwrap_or_default())?;
        self.record_order(buyer_id, payment, products).await
    }

    /// Checks references and signature; returns the payment metadata to store.
    fn authenticate(&self, request: &VerifyPaymentRequest) -> Result<PaymentDetails, ServiceError> {
        let (order_reference, payment_reference) = match (
            non_blank(request.order_reference.as_deref()),
            non_blank(request.payment_reference.as_deref()),
        ) {
            (Some(o), Some(p)) => (o.to_string(), p.to_string()),
            _ => {
                return Err(ServiceError::ValidationError(
                    "Order ID and Payment ID are required".into(),
                ))
            }
        };

        let signature = match request.signature.as_deref() {
            Some(signature) if !signature.trim().is_empty() => {
                if !verify_signature(
                    &self.signing_secret,
                    &order_reference,
                    &payment_reference,
                    signature,
                ) {
                    warn!(%order_reference, %payment_reference, "payment signature mismatch");
                    return Err(ServiceError::SignatureMismatch(
                        "Payment signature verification failed".into(),
                    ));
                }
                signature.to_string()
            }
            _ if self.require_signature => {
                warn!(%order_reference, "payment callback without signature rejected");
                return Err(ServiceError::ValidationError(
                    "Payment signature is required".into(),
                ));
            }
            _ => {
                warn!(%order_reference, "recording unsigned payment callback");
                SIGNATURE_NOT_PROVIDED.to_string()
            }
        };

        Ok(PaymentDetails {
            order_reference,
            payment_reference,
            signature,
        })
    }

    async fn record_order(
        &self,
        buyer_id: &str,
        payment: PaymentDetails,
        products: Vec<Uuid>,
    ) -> Result<ConfirmedOrder, ServiceError> {
        let order_id = Uuid::new_v4();
        let now = Utc::now();

        let txn = self.db.begin().await?;

        order::ActiveModel {
            id: Set(order_id),
            buyer_id: Set(buyer_id.to_string()),
            status: Set(OrderStatus::NotProcess),
            gateway_order_id: Set(payment.order_reference.clone()),
            gateway_payment_id: Set(payment.payment_reference.clone()),
            gateway_signature: Set(payment.signature.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let lines = products
            .iter()
            .enumerate()
            .map(|(position, product_id)| order_product::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(*product_id),
                position: Set(position as i32),
            });
        order_product::Entity::insert_many(lines).exec(&txn).await?;

        txn.commit().await.map_err(|e| {
            error!(%order_id, error = %e, "failed to commit order");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            %order_id,
            buyer_id,
            gateway_order_id = %payment.order_reference,
            items = products.len(),
            "payment verified and order recorded"
        );

        Ok(ConfirmedOrder {
            id: order_id,
            buyer: buyer_id.to_string(),
            products,
            payment,
            status: OrderStatus::NotProcess,
            created_at: now,
        })
    }
}

/// Hex-encoded `HMAC_SHA256(secret, "{order_reference}|{payment_reference}")`.
pub fn sign_payment(
    secret: &str,
    order_reference: &str,
    payment_reference: &str,
) -> Result<String, ServiceError> {
    let mac = payment_mac(secret, order_reference, payment_reference)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a signature against the expected MAC.
///
/// Only the exact lowercase hex digest produced by [`sign_payment`] is accepted.
pub fn verify_signature(
    secret: &str,
    order_reference: &str,
    payment_reference: &str,
    signature: &str,
) -> bool {
    if !is_lowercase_digest(signature) {
        return false;
    }
    let Ok(provided) = hex::decode(signature) else {
        return false;
    };
    payment_mac(secret, order_reference, payment_reference)
        .map(|mac| mac.verify_slice(&provided).is_ok())
        .unwrap_or(false)
}

fn is_lowercase_digest(signature: &str) -> bool {
    signature.len() == SIGNATURE_HEX_LEN
        && signature
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn payment_mac(
    secret: &str,
    order_reference: &str,
    payment_reference: &str,
) -> Result<HmacSha256, ServiceError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ServiceError::InternalError(format!("Invalid signing key: {}", e)))?;
    mac.update(order_reference.as_bytes());
    mac.update(b"|");
    mac.update(payment_reference.as_bytes());
    Ok(mac)
}

/// Resolves each cart entry to a product id, preserving cart order.
pub fn normalize_cart(items: &[Value]) -> Result<Vec<Uuid>, ServiceError> {
    if items.is_empty() {
        return Err(ServiceError::ValidationError("Cart items are required".into()));
    }

    items
        .iter()
        .map(|item| {
            product_id_of(item)
                .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
                .ok_or_else(|| {
                    ServiceError::ValidationError("Invalid product identifier in cart".into())
                })
        })
        .collect()
}

fn product_id_of(item: &Value) -> Option<&str> {
    match item {
        Value::String(id) => Some(id.as_str()),
        Value::Object(fields) => PRODUCT_ID_KEYS
            .iter()
            .filter_map(|key| fields.get(*key))
            .find_map(|value| match value {
                Value::String(id) => Some(id.as_str()),
                // a populated product document in place of its id
                Value::Object(_) => product_id_of(value),
                _ => None,
            }),
        _ => None,
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
