use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Order, Product};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SalesRangeQuery {
    /// Inclusive start date; defaults to 30 days before `end_date`.
    pub start_date: Option<NaiveDate>,
    /// Inclusive end date; defaults to today.
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SalesReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_sales_cents: i64,
    pub order_count: i64,
    pub orders: Vec<Order>,
}

/// One point of a sales time series, shaped for chart consumption.
#[derive(Debug, PartialEq, Serialize, ToSchema)]
pub struct SalesBucket {
    pub label: String,
    pub total_sales: f64,
    pub order_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SalesSeries {
    pub buckets: Vec<SalesBucket>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MonthlySalesQuery {
    pub year: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InventorySubset {
    pub products: Vec<Product>,
    pub total_value_cents: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InventoryReport {
    /// Every product, ascending by stock.
    pub products: Vec<Product>,
    pub low_stock: InventorySubset,
    pub out_of_stock: InventorySubset,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProductPerformance {
    pub product_id: Uuid,
    pub name: String,
    pub category: String,
    pub total_sold: i64,
    pub total_revenue_cents: i64,
    pub stock: i32,
}

impl ProductPerformance {
    /// Revenue per unit sold; zero when nothing was sold.
    pub fn average_price_cents(&self) -> i64 {
        if self.total_sold > 0 {
            self.total_revenue_cents / self.total_sold
        } else {
            0
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PerformanceReport {
    pub products: Vec<ProductPerformance>,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceVariant {
    /// All products, highest revenue first.
    Performance,
    /// Top 10 by units sold.
    Top,
    /// Bottom 10 by revenue.
    Low,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PerformanceQuery {
    pub variant: Option<PerformanceVariant>,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InventoryExportKind {
    LowStock,
    OutOfStock,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InventoryExportQuery {
    #[serde(rename = "type")]
    pub kind: Option<InventoryExportKind>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PerformanceExportQuery {
    #[serde(rename = "type")]
    pub variant: Option<PerformanceVariant>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DailySalesReport {
    pub date: NaiveDate,
    pub total_sales_cents: i64,
    pub order_count: i64,
    pub orders: Vec<Order>,
}

/// Completed-order row used by the pure bucketing helpers.
#[derive(Debug, Clone)]
pub struct SaleRow {
    pub created_at: DateTime<Utc>,
    pub total_amount_cents: i64,
}
