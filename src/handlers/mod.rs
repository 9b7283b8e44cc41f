pub mod analytics;
pub mod common;
pub mod coupons;
pub mod payments;
pub mod wishlist;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::DbPool,
    services::{
        analytics::AnalyticsService, coupons::CouponService, payment_gateway::PaymentGateway,
        payments::PaymentService, wishlist::WishlistService,
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub coupons: Arc<CouponService>,
    pub payments: Arc<PaymentService>,
    pub wishlist: Arc<WishlistService>,
    pub analytics: Arc<AnalyticsService>,
}

impl AppServices {
    /// The gateway client is built once at startup and shared by every request.
    pub fn new(db_pool: Arc<DbPool>, gateway: Arc<dyn PaymentGateway>, cfg: &AppConfig) -> Self {
        Self {
            coupons: Arc::new(CouponService::new(db_pool.clone())),
            payments: Arc::new(PaymentService::new(
                db_pool.clone(),
                gateway,
                cfg.payment_key_secret.clone(),
                cfg.payment_currency.clone(),
                cfg.require_payment_signature,
            )),
            wishlist: Arc::new(WishlistService::new(db_pool.clone())),
            analytics: Arc::new(AnalyticsService::new(db_pool)),
        }
    }
}
