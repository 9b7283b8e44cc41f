use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, SqlErr,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    entities::{product, to_money, wishlist_item},
    errors::ServiceError,
};

const ALREADY_LISTED_MESSAGE: &str = "Product already in wishlist";

/// Product as shown in a wishlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistProduct {
    pub id: Uuid,
    pub name: String,
    pub price: rust_decimal::Decimal,
}

impl From<product::Model> for WishlistProduct {
    fn from(model: product::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            price: to_money(model.price),
        }
    }
}

/// Per-user product wishlists
#[derive(Clone)]
pub struct WishlistService {
    db: Arc<DatabaseConnection>,
}

impl WishlistService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn add(&self, user_id: &str, product_id: Uuid) -> Result<(), ServiceError> {
        product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".into()))?;

        let existing = wishlist_item::Entity::find()
            .filter(wishlist_item::Column::UserId.eq(user_id))
            .filter(wishlist_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(ALREADY_LISTED_MESSAGE.into()));
        }

        wishlist_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id.to_string()),
            product_id: Set(product_id),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                ServiceError::Conflict(ALREADY_LISTED_MESSAGE.into())
            }
            _ => ServiceError::DatabaseError(e),
        })?;

        info!(user_id, %product_id, "product added to wishlist");
        Ok(())
    }

    /// Idempotent: removing an unlisted product succeeds.
    pub async fn remove(&self, user_id: &str, product_id: Uuid) -> Result<(), ServiceError> {
        let result = wishlist_item::Entity::delete_many()
            .filter(wishlist_item::Column::UserId.eq(user_id))
            .filter(wishlist_item::Column::ProductId.eq(product_id))
            .exec(&*self.db)
            .await?;

        info!(user_id, %product_id, removed = result.rows_affected, "wishlist entry removed");
        Ok(())
    }

    /// Listed products in the order they were added.
    pub async fn get(&self, user_id: &str) -> Result<Vec<WishlistProduct>, ServiceError> {
        let rows = wishlist_item::Entity::find()
            .filter(wishlist_item::Column::UserId.eq(user_id))
            .order_by_asc(wishlist_item::Column::CreatedAt)
            .find_also_related(product::Entity)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(_, product)| product.map(WishlistProduct::from))
            .collect())
    }

    pub async fn count(&self, user_id: &str) -> Result<u64, ServiceError> {
        Ok(wishlist_item::Entity::find()
            .filter(wishlist_item::Column::UserId.eq(user_id))
            .count(&*self.db)
            .await?)
    }
}
