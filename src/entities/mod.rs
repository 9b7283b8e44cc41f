//! Database entities backing the storefront.

pub mod coupon;
pub mod order;
pub mod order_product;
pub mod product;
pub mod wishlist_item;

use rust_decimal::Decimal;

/// Rounds to cents and fixes the scale at two places so amounts render as `"50.00"`.
pub fn to_money(value: Decimal) -> Decimal {
    let mut value = value.round_dp(2);
    value.rescale(2);
    value
}
