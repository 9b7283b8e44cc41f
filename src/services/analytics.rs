use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Months, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, SimpleExpr},
    ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        order::{self, OrderStatus},
        order_product, product, to_money,
    },
    errors::ServiceError,
};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SalesOverview {
    pub total_revenue: Decimal,
    pub total_orders: u64,
    pub total_products: u64,
    pub pending_orders: u64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailySales {
    pub date: String,
    pub sales: Decimal,
    pub orders: u64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonthlySales {
    pub month: String,
    pub sales: Decimal,
    pub orders: u64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct {
    pub product_id: Uuid,
    pub name: String,
    pub total_sold: u64,
    pub revenue: Decimal,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct DailySalesQuery {
    #[validate(range(min = 1, max = 365, message = "days must be between 1 and 365"))]
    pub days: Option<i64>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct MonthlySalesQuery {
    #[validate(range(min = 1, max = 60, message = "months must be between 1 and 60"))]
    pub months: Option<u32>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct TopProductsQuery {
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: Option<u64>,
}

/// One product line of a non-cancelled order; product columns are empty when
/// the product has since been deleted.
#[derive(Debug, FromQueryResult)]
struct SaleLine {
    order_id: Uuid,
    ordered_at: DateTime<Utc>,
    price: Option<Decimal>,
}

/// Units sold per product across non-cancelled orders.
#[derive(Debug, FromQueryResult)]
struct ProductSales {
    product_id: Uuid,
    name: String,
    price: Decimal,
    total_sold: i64,
}

impl ProductSales {
    fn revenue(&self) -> Decimal {
        self.price * Decimal::from(self.total_sold)
    }
}

/// Sales reporting over recorded orders
#[derive(Clone)]
pub struct AnalyticsService {
    db: Arc<DatabaseConnection>,
}

impl AnalyticsService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn overview(&self) -> Result<SalesOverview, ServiceError> {
        let db = &*self.db;

        let total_orders = order::Entity::find()
            .filter(order::Column::Status.ne(OrderStatus::Cancelled))
            .count(db)
            .await?;
        let pending_orders = order::Entity::find()
            .filter(order::Column::Status.eq(OrderStatus::NotProcess))
            .count(db)
            .await?;
        let total_products = product::Entity::find().count(db).await?;

        let per_product = product_sales().into_model::<ProductSales>().all(db).await?;
        let total_revenue = per_product.iter().map(ProductSales::revenue).sum();

        info!(orders = total_orders, "generated sales overview");
        Ok(SalesOverview {
            total_revenue: to_money(total_revenue),
            total_orders,
            total_products,
            pending_orders,
        })
    }

    pub async fn daily_sales(&self, query: DailySalesQuery) -> Result<Vec<DailySales>, ServiceError> {
        query.validate()?;
        let days = query.days.unwrap_or(7);
        let since = Utc::now() - Duration::days(days);

        let lines = self.sales_since(since).await?;
        let buckets = bucket(&lines, |at| at.format("%Y-%m-%d").to_string());

        Ok(buckets
            .into_iter()
            .map(|(date, (sales, orders))| DailySales { date, sales, orders })
            .collect())
    }

    pub async fn monthly_sales(
        &self,
        query: MonthlySalesQuery,
    ) -> Result<Vec<MonthlySales>, ServiceError> {
        query.validate()?;
        let months = query.months.unwrap_or(6);
        let now = Utc::now();
        let since = now
            .checked_sub_months(Months::new(months))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let lines = self.sales_since(since).await?;
        let buckets = bucket(&lines, |at| at.format("%Y-%m").to_string());

        Ok(buckets
            .into_iter()
            .map(|(month, (sales, orders))| MonthlySales {
                month,
                sales,
                orders,
            })
            .collect())
    }

    pub async fn top_products(&self, query: TopProductsQuery) -> Result<Vec<TopProduct>, ServiceError> {
        query.validate()?;
        let limit = query.limit.unwrap_or(10);

        let ranked = product_sales()
            .order_by_desc(units_sold())
            .order_by_asc(product::Column::Name)
            .limit(limit)
            .into_model::<ProductSales>()
            .all(&*self.db)
            .await?;

        Ok(ranked
            .into_iter()
            .map(|row| TopProduct {
                revenue: to_money(row.revenue()),
                product_id: row.product_id,
                name: row.name,
                total_sold: u64::try_from(row.total_sold).unwrap_or_default(),
            })
            .collect())
    }

    /// Product lines of non-cancelled orders created at or after `since`.
    async fn sales_since(&self, since: DateTime<Utc>) -> Result<Vec<SaleLine>, ServiceError> {
        let lines = order_product::Entity::find()
            .select_only()
            .column(order_product::Column::OrderId)
            .column_as(order::Column::CreatedAt, "ordered_at")
            .column_as(product::Column::Price, "price")
            .inner_join(order::Entity)
            .left_join(product::Entity)
            .filter(order::Column::Status.ne(OrderStatus::Cancelled))
            .filter(order::Column::CreatedAt.gte(since))
            .into_model::<SaleLine>()
            .all(&*self.db)
            .await?;

        debug!(lines = lines.len(), %since, "loaded sales lines");
        Ok(lines)
    }
}

/// Lines of non-cancelled orders grouped per existing product.
fn product_sales() -> Select<order_product::Entity> {
    order_product::Entity::find()
        .select_only()
        .column_as(product::Column::Id, "product_id")
        .column_as(product::Column::Name, "name")
        .column_as(product::Column::Price, "price")
        .column_as(units_sold(), "total_sold")
        .inner_join(order::Entity)
        .inner_join(product::Entity)
        .filter(order::Column::Status.ne(OrderStatus::Cancelled))
        .group_by(product::Column::Id)
        .group_by(product::Column::Name)
        .group_by(product::Column::Price)
}

fn units_sold() -> SimpleExpr {
    Expr::col((order_product::Entity, order_product::Column::Id)).count()
}

/// Groups revenue and distinct order counts by the key derived from the
/// order timestamp. Keys sort lexicographically, which is chronological for
/// the zero-padded formats used here.
fn bucket<F>(lines: &[SaleLine], key_of: F) -> BTreeMap<String, (Decimal, u64)>
where
    F: Fn(&DateTime<Utc>) -> String,
{
    let mut buckets: BTreeMap<String, (Decimal, HashSet<Uuid>)> = BTreeMap::new();
    for line in lines {
        let (sales, orders) = buckets.entry(key_of(&line.ordered_at)).or_default();
        *sales += line.price.unwrap_or_default();
        orders.insert(line.order_id);
    }

    buckets
        .into_iter()
        .map(|(key, (sales, orders))| (key, (to_money(sales), orders.len() as u64)))
        .collect()
}
