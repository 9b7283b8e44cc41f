use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, Set, SqlErr,
};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        coupon::{self, DiscountType, Entity as Coupon},
        to_money,
    },
    errors::ServiceError,
    metrics::{outcome_label, COUPON_APPLICATIONS},
};

const REQUIRED_FIELDS_MESSAGE: &str = "Code, discount type, value, and expiry date are required";
const DUPLICATE_CODE_MESSAGE: &str = "Coupon code already exists";
const PERCENTAGE_CAP_MESSAGE: &str = "Percentage discount cannot exceed 100%";
const COUPON_NOT_FOUND_MESSAGE: &str = "Coupon not found";
const USAGE_LIMIT_MESSAGE: &str = "Usage limit must be at least 1";
const AMOUNT_TOO_LARGE_MESSAGE: &str = "Total amount is too large";

/// Payload for creating a coupon. Every field is optional at the wire level so
/// that missing values produce a single readable message.
#[derive(Debug, Default, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCouponRequest {
    #[validate(length(max = 64, message = "Coupon code must be at most 64 characters"))]
    pub code: Option<String>,
    pub discount_type: Option<String>,
    pub discount_value: Option<Decimal>,
    pub min_purchase: Option<Decimal>,
    pub max_discount: Option<Decimal>,
    pub expiry_date: Option<String>,
    #[validate(range(min = 1, message = "Usage limit must be at least 1"))]
    pub usage_limit: Option<i32>,
}

/// Partial update; absent fields keep their stored value. `maxDiscount` and
/// `usageLimit` are removed by an explicit `null`.
#[derive(Debug, Default, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCouponRequest {
    #[validate(length(max = 64, message = "Coupon code must be at most 64 characters"))]
    pub code: Option<String>,
    pub discount_type: Option<String>,
    pub discount_value: Option<Decimal>,
    pub min_purchase: Option<Decimal>,
    #[serde(default, deserialize_with = "present")]
    pub max_discount: Option<Option<Decimal>>,
    pub expiry_date: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub usage_limit: Option<Option<i32>>,
    pub is_active: Option<bool>,
}

/// Distinguishes a key sent as `null` (`Some(None)`) from an absent key (`None`).
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyCouponRequest {
    pub code: Option<String>,
    pub total_amount: Option<Decimal>,
}

/// Discount breakdown returned by a successful application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponApplication {
    pub original_amount: Decimal,
    pub discount_amount: Decimal,
    pub final_amount: Decimal,
    pub coupon_code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
}

/// Coupon lifecycle and application against order totals
#[derive(Clone)]
pub struct CouponService {
    db: Arc<DatabaseConnection>,
}

impl CouponService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request))]
    pub async fn create(&self, request: CreateCouponRequest) -> Result<coupon::Model, ServiceError> {
        let (code, discount_type, discount_value, expiry_date) = match (
            non_blank(request.code.as_deref()),
            non_blank(request.discount_type.as_deref()),
            request.discount_value,
            non_blank(request.expiry_date.as_deref()),
        ) {
            (Some(code), Some(kind), Some(value), Some(expiry)) => (code, kind, value, expiry),
            _ => return Err(ServiceError::ValidationError(REQUIRED_FIELDS_MESSAGE.into())),
        };
        request.validate()?;

        let code = normalize_code(code);
        let discount_type = parse_discount_type(discount_type)?;
        let expiry_date = parse_expiry(expiry_date)?;
        let min_purchase = request.min_purchase.unwrap_or(Decimal::ZERO);

        if self.find_by_code(&code).await?.is_some() {
            warn!(%code, "coupon code already exists");
            return Err(ServiceError::Conflict(DUPLICATE_CODE_MESSAGE.into()));
        }

        check_terms(
            discount_type,
            discount_value,
            min_purchase,
            request.max_discount,
        )?;

        let now = Utc::now();
        let model = coupon::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.clone()),
            discount_type: Set(discount_type),
            discount_value: Set(discount_value),
            min_purchase: Set(min_purchase),
            max_discount: Set(request.max_discount),
            expiry_date: Set(expiry_date),
            usage_limit: Set(request.usage_limit),
            used_count: Set(0),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = model.insert(&*self.db).await.map_err(duplicate_code_as_conflict)?;
        info!(coupon_id = %created.id, %code, "coupon created");
        Ok(created.with_money_scale())
    }

    /// Every coupon, newest first.
    pub async fn list(&self) -> Result<Vec<coupon::Model>, ServiceError> {
        let coupons = Coupon::find()
            .order_by_desc(coupon::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(coupons.into_iter().map(coupon::Model::with_money_scale).collect())
    }

    /// Validates the coupon against `total_amount`, computes the discount and
    /// records one use.
    #[instrument(skip(self, request))]
    pub async fn apply(&self, request: ApplyCouponRequest) -> Result<CouponApplication, ServiceError> {
        let result = self.apply_and_record(request).await;
        COUPON_APPLICATIONS
            .with_label_values(&[outcome_label(&result, "applied")])
            .inc();
        result
    }

    async fn apply_and_record(
        &self,
        request: ApplyCouponRequest,
    ) -> Result<CouponApplication, ServiceError> {
        let (code, total) = match (non_blank(request.code.as_deref()), request.total_amount) {
            (Some(code), Some(total)) if total > Decimal::ZERO => (normalize_code(code), total),
            _ => {
                return Err(ServiceError::ValidationError(
                    "Coupon code and total amount are required".into(),
                ))
            }
        };

        let coupon = self
            .find_by_code(&code)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Invalid coupon code".into()))?;

        self.redeem(&coupon, total).await
    }

    /// Applies a coupon read earlier. The stored usage count may have moved
    /// since the read, so the use is only recorded if the limit still allows it.
    async fn redeem(
        &self,
        coupon: &coupon::Model,
        total: Decimal,
    ) -> Result<CouponApplication, ServiceError> {
        let code = &coupon.code;
        if let Err(rejection) = check_eligibility(coupon, total, Utc::now()) {
            warn!(%code, reason = %rejection, "coupon rejected");
            return Err(rejection);
        }

        let application = calculate_discount(coupon, total).map_err(|e| {
            warn!(%code, total = %total, "discount computation overflowed");
            e
        })?;

        if !self.consume_use(coupon.id).await? {
            warn!(%code, "coupon usage limit reached while recording use");
            return Err(ServiceError::LimitReached("Coupon usage limit reached".into()));
        }

        if application.final_amount < Decimal::ZERO {
            warn!(
                %code,
                total = %total,
                discount = %application.discount_amount,
                "fixed discount exceeds order total; final amount is negative"
            );
        }

        info!(
            %code,
            discount = %application.discount_amount,
            final_amount = %application.final_amount,
            "coupon applied"
        );
        Ok(application)
    }

    /// Conditional increment of `used_count`; `false` when the limit was
    /// already reached at write time.
    async fn consume_use(&self, coupon_id: Uuid) -> Result<bool, ServiceError> {
        let result = Coupon::update_many()
            .col_expr(
                coupon::Column::UsedCount,
                Expr::col(coupon::Column::UsedCount).add(1),
            )
            .col_expr(coupon::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(coupon::Column::Id.eq(coupon_id))
            .filter(
                Condition::any()
                    .add(coupon::Column::UsageLimit.is_null())
                    .add(Expr::col(coupon::Column::UsedCount).lt(Expr::col(coupon::Column::UsageLimit))),
            )
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateCouponRequest,
    ) -> Result<coupon::Model, ServiceError> {
        request.validate()?;

        let existing = self.find_by_id(id).await?;

        let code = match request.code.as_deref() {
            Some(raw) => {
                let code = non_blank(Some(raw))
                    .map(normalize_code)
                    .ok_or_else(|| ServiceError::ValidationError("Coupon code cannot be empty".into()))?;
                if code != existing.code {
                    if let Some(other) = self.find_by_code(&code).await? {
                        if other.id != existing.id {
                            return Err(ServiceError::Conflict(DUPLICATE_CODE_MESSAGE.into()));
                        }
                    }
                }
                code
            }
            None => existing.code.clone(),
        };

        let discount_type = match request.discount_type.as_deref() {
            Some(raw) => parse_discount_type(raw)?,
            None => existing.discount_type,
        };
        let expiry_date = match request.expiry_date.as_deref() {
            Some(raw) => parse_expiry(raw)?,
            None => existing.expiry_date,
        };
        let discount_value = request.discount_value.unwrap_or(existing.discount_value);
        let min_purchase = request.min_purchase.unwrap_or(existing.min_purchase);
        let max_discount = request.max_discount.unwrap_or(existing.max_discount);
        let usage_limit = request.usage_limit.unwrap_or(existing.usage_limit);

        if matches!(usage_limit, Some(limit) if limit < 1) {
            return Err(ServiceError::ValidationError(USAGE_LIMIT_MESSAGE.into()));
        }

        check_terms(discount_type, discount_value, min_purchase, max_discount)?;

        if let Some(limit) = usage_limit {
            if limit < existing.used_count {
                return Err(ServiceError::ValidationError(
                    "Usage limit cannot be lower than the current usage count".into(),
                ));
            }
        }

        let is_active = request.is_active.unwrap_or(existing.is_active);
        let mut active: coupon::ActiveModel = existing.into();
        active.code = Set(code);
        active.discount_type = Set(discount_type);
        active.discount_value = Set(discount_value);
        active.min_purchase = Set(min_purchase);
        active.max_discount = Set(max_discount);
        active.expiry_date = Set(expiry_date);
        active.usage_limit = Set(usage_limit);
        active.is_active = Set(is_active);
        active.updated_at = Set(Utc::now());

        let updated = active.update(&*self.db).await.map_err(duplicate_code_as_conflict)?;
        info!(coupon_id = %updated.id, code = %updated.code, "coupon updated");
        Ok(updated.with_money_scale())
    }

    /// Permanently removes the coupon.
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = Coupon::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(COUPON_NOT_FOUND_MESSAGE.into()));
        }
        info!(coupon_id = %id, "coupon deleted");
        Ok(())
    }

    /// Flips `is_active` and returns the stored coupon.
    pub async fn toggle(&self, id: Uuid) -> Result<coupon::Model, ServiceError> {
        let existing = self.find_by_id(id).await?;
        let is_active = !existing.is_active;

        let mut active: coupon::ActiveModel = existing.into();
        active.is_active = Set(is_active);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        info!(coupon_id = %id, is_active, "coupon toggled");
        Ok(updated.with_money_scale())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<coupon::Model, ServiceError> {
        Coupon::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(COUPON_NOT_FOUND_MESSAGE.into()))
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<coupon::Model>, ServiceError> {
        Ok(Coupon::find()
            .filter(coupon::Column::Code.eq(code))
            .one(&*self.db)
            .await?)
    }
}

/// Business-rule checks run before a coupon is applied, in a fixed order; the
/// first failing rule decides the error.
pub fn check_eligibility(
    coupon: &coupon::Model,
    total: Decimal,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    if !coupon.is_active {
        return Err(ServiceError::Inactive("Coupon is not active".into()));
    }
    if coupon.is_expired_at(now) {
        return Err(ServiceError::Expired("Coupon has expired".into()));
    }
    if !coupon.has_uses_left() {
        return Err(ServiceError::LimitReached("Coupon usage limit reached".into()));
    }
    if total < coupon.min_purchase {
        return Err(ServiceError::MinimumNotMet(format!(
            "Minimum purchase amount is ₹{}",
            coupon.min_purchase.normalize()
        )));
    }
    Ok(())
}

/// Computes the discount for `total`. Percentage discounts are capped by
/// `max_discount`; fixed discounts are not clamped to the total.
///
/// Totals whose arithmetic would leave the decimal range are rejected.
pub fn calculate_discount(
    coupon: &coupon::Model,
    total: Decimal,
) -> Result<CouponApplication, ServiceError> {
    let too_large = || ServiceError::ValidationError(AMOUNT_TOO_LARGE_MESSAGE.into());

    let discount = match coupon.discount_type {
        DiscountType::Percentage => {
            let raw = total
                .checked_mul(coupon.discount_value)
                .and_then(|scaled| scaled.checked_div(dec!(100)))
                .ok_or_else(too_large)?;
            match coupon.max_discount {
                Some(cap) if raw > cap => cap,
                _ => raw,
            }
        }
        DiscountType::Fixed => coupon.discount_value,
    };
    let discount_amount = to_money(discount);
    let final_amount = total.checked_sub(discount_amount).ok_or_else(too_large)?;

    Ok(CouponApplication {
        original_amount: total,
        discount_amount,
        final_amount: to_money(final_amount),
        coupon_code: coupon.code.clone(),
        discount_type: coupon.discount_type,
        discount_value: to_money(coupon.discount_value),
    })
}

/// Value rules shared by create and update, evaluated on the effective terms.
pub fn check_terms(
    discount_type: DiscountType,
    discount_value: Decimal,
    min_purchase: Decimal,
    max_discount: Option<Decimal>,
) -> Result<(), ServiceError> {
    if discount_value <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Discount value must be greater than zero".into(),
        ));
    }
    if min_purchase < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Minimum purchase cannot be negative".into(),
        ));
    }
    if matches!(max_discount, Some(cap) if cap <= Decimal::ZERO) {
        return Err(ServiceError::ValidationError(
            "Maximum discount must be greater than zero".into(),
        ));
    }
    if discount_type == DiscountType::Percentage && discount_value > dec!(100) {
        return Err(ServiceError::ValidationError(PERCENTAGE_CAP_MESSAGE.into()));
    }
    Ok(())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn parse_discount_type(raw: &str) -> Result<DiscountType, ServiceError> {
    DiscountType::from_str(raw.trim()).map_err(|_| {
        ServiceError::ValidationError("Discount type must be 'percentage' or 'fixed'".into())
    })
}

/// Accepts RFC 3339 timestamps or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_expiry(raw: &str) -> Result<DateTime<Utc>, ServiceError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| {
            ServiceError::ValidationError(
                "Expiry date must be an RFC 3339 timestamp or a YYYY-MM-DD date".into(),
            )
        })
}

fn duplicate_code_as_conflict(err: DbErr) -> ServiceError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            ServiceError::Conflict(DUPLICATE_CODE_MESSAGE.into())
        }
        _ => ServiceError::DatabaseError(err),
    }
}
