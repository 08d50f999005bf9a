use serde_json::Value;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult};

/// Every mutating back-office operation records exactly one of these.
/// The action knows which table it belongs to, so call sites cannot
/// file an order event under the wrong resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    UserRegister,
    StaffRegister,
    UserLogin,
    ProductCreate,
    ProductUpdate,
    ProductDelete,
    BarcodeGenerate,
    CategoryCreate,
    CategoryUpdate,
    CategoryDelete,
    OrderCreate,
    OrderItemAdd,
    OrderItemRemove,
    OrderComplete,
    OrderCancel,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::UserRegister => "user_register",
            AuditAction::StaffRegister => "staff_register",
            AuditAction::UserLogin => "user_login",
            AuditAction::ProductCreate => "product_create",
            AuditAction::ProductUpdate => "product_update",
            AuditAction::ProductDelete => "product_delete",
            AuditAction::BarcodeGenerate => "barcode_generate",
            AuditAction::CategoryCreate => "category_create",
            AuditAction::CategoryUpdate => "category_update",
            AuditAction::CategoryDelete => "category_delete",
            AuditAction::OrderCreate => "order_create",
            AuditAction::OrderItemAdd => "order_item_add",
            AuditAction::OrderItemRemove => "order_item_remove",
            AuditAction::OrderComplete => "order_complete",
            AuditAction::OrderCancel => "order_cancel",
        }
    }

    /// Table the action touches.
    pub fn resource(self) -> &'static str {
        match self {
            AuditAction::UserRegister | AuditAction::StaffRegister | AuditAction::UserLogin => {
                "users"
            }
            AuditAction::ProductCreate
            | AuditAction::ProductUpdate
            | AuditAction::ProductDelete
            | AuditAction::BarcodeGenerate => "products",
            AuditAction::CategoryCreate
            | AuditAction::CategoryUpdate
            | AuditAction::CategoryDelete => "categories",
            AuditAction::OrderCreate
            | AuditAction::OrderItemAdd
            | AuditAction::OrderItemRemove
            | AuditAction::OrderComplete
            | AuditAction::OrderCancel => "orders",
        }
    }
}

pub async fn log_audit(
    pool: &DbPool,
    user_id: Option<Uuid>,
    action: AuditAction,
    metadata: Option<Value>,
) -> AppResult<()> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, resource, metadata)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(action.as_str())
    .bind(action.resource())
    .bind(metadata)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_map_to_their_resource_table() {
        assert_eq!(AuditAction::OrderCancel.as_str(), "order_cancel");
        assert_eq!(AuditAction::OrderCancel.resource(), "orders");
        assert_eq!(AuditAction::BarcodeGenerate.resource(), "products");
        assert_eq!(AuditAction::CategoryDelete.resource(), "categories");
        assert_eq!(AuditAction::UserLogin.resource(), "users");
    }
}
