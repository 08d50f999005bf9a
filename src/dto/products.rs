use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Category, Product};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    /// Leave empty (or non-numeric) to have a barcode assigned from the id.
    #[serde(default)]
    pub barcode: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category_id: Option<Uuid>,
    pub price_cents: i64,
    pub stock: i32,
    pub min_stock_level: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub barcode: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Option<Uuid>>,
    pub price_cents: Option<i64>,
    pub stock: Option<i32>,
    pub min_stock_level: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Serialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<Product>,
}

#[derive(Serialize, ToSchema)]
pub struct CategoryList {
    pub items: Vec<Category>,
}

/// Result of a barcode scan: the matched product plus its derived status.
#[derive(Serialize, ToSchema)]
pub struct BarcodeLookup {
    pub product: Product,
    pub stock_status: String,
}
