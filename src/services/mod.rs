pub mod analytics;
pub mod coupons;
pub mod payment_gateway;
pub mod payments;
pub mod wishlist;
