use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: String,
}

/// All money values are integer cents.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub barcode: String,
    pub name: String,
    pub description: String,
    pub category_id: Option<Uuid>,
    pub price_cents: i64,
    pub stock: i32,
    pub min_stock_level: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_out_of_stock(&self) -> bool {
        self.stock <= 0
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock < self.min_stock_level
    }

    pub fn stock_status(&self) -> &'static str {
        if self.is_out_of_stock() {
            "Out of Stock"
        } else if self.is_low_stock() {
            "Low Stock"
        } else {
            "In Stock"
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub customer_address: Option<String>,
    pub notes: String,
    pub created_by: Option<Uuid>,
    pub status: String,
    pub total_amount_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    /// Unit price captured when the item was added; later product price
    /// changes do not affect it.
    pub price_cents: i64,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
}

pub const ORDER_PENDING: &str = "pending";
pub const ORDER_COMPLETED: &str = "completed";
pub const ORDER_CANCELLED: &str = "cancelled";

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_STAFF: &str = "staff";

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: i32, min: i32) -> Product {
        Product {
            id: Uuid::new_v4(),
            barcode: "000000000000".into(),
            name: "Test".into(),
            description: String::new(),
            category_id: None,
            price_cents: 100,
            stock,
            min_stock_level: min,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn stock_status_boundaries() {
        assert!(product(0, 5).is_out_of_stock());
        assert!(!product(1, 5).is_out_of_stock());

        // stock == min_stock_level is not low
        assert!(!product(5, 5).is_low_stock());
        assert!(product(4, 5).is_low_stock());

        assert_eq!(product(0, 5).stock_status(), "Out of Stock");
        assert_eq!(product(3, 5).stock_status(), "Low Stock");
        assert_eq!(product(9, 5).stock_status(), "In Stock");
    }
}
