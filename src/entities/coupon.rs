use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::to_money;

/// How a coupon's `discount_value` is interpreted.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::EnumString,
    strum::AsRefStr,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DiscountType {
    /// `discount_value` percent of the order total, optionally capped by `max_discount`
    #[sea_orm(string_value = "percentage")]
    Percentage,
    /// `discount_value` currency units off the order total
    #[sea_orm(string_value = "fixed")]
    Fixed,
}

/// Coupon entity
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coupons")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Upper-cased, unique
    #[sea_orm(unique)]
    pub code: String,
    pub discount_type: DiscountType,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub discount_value: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub min_purchase: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub max_discount: Option<Decimal>,
    pub expiry_date: DateTime<Utc>,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Money columns come back from some backends with arbitrary scale; present them with cents.
    pub fn with_money_scale(mut self) -> Self {
        self.discount_value = to_money(self.discount_value);
        self.min_purchase = to_money(self.min_purchase);
        self.max_discount = self.max_discount.map(to_money);
        self
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry_date
    }

    pub fn has_uses_left(&self) -> bool {
        self.usage_limit
            .map(|limit| self.used_count < limit)
            .unwrap_or(true)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn discount_type_parses_case_insensitively() {
        assert_eq!(
            DiscountType::from_str("Percentage").unwrap(),
            DiscountType::Percentage
        );
        assert_eq!(DiscountType::from_str("FIXED").unwrap(), DiscountType::Fixed);
        assert!(DiscountType::from_str("bogo").is_err());
        assert_eq!(DiscountType::Fixed.as_ref(), "fixed");
    }
}
