use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseTransaction, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::{AuditAction, log_audit},
    dto::orders::{AddItemRequest, CreateOrderRequest, OrderList, OrderWithItems},
    entity::{
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
        },
        products::{ActiveModel as ProductActive, Entity as Products},
    },
    error::{AppError, AppResult},
    export::{Cell, Sheet},
    middleware::auth::AuthUser,
    models::{ORDER_CANCELLED, ORDER_COMPLETED, ORDER_PENDING, Order, OrderItem},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

const ORDER_NUMBER_LEN: usize = 20;
const ORDER_NUMBER_ATTEMPTS: usize = 5;

fn new_order_number() -> String {
    Uuid::new_v4().simple().to_string()[..ORDER_NUMBER_LEN].to_uppercase()
}

pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    // The unique index is the backstop; the lookup keeps collisions from
    // surfacing as opaque constraint errors.
    let mut order_number = new_order_number();
    for attempt in 0.. {
        let taken = Orders::find()
            .filter(OrderCol::OrderNumber.eq(order_number.as_str()))
            .count(&state.orm)
            .await?;
        if taken == 0 {
            break;
        }
        if attempt + 1 >= ORDER_NUMBER_ATTEMPTS {
            return Err(AppError::Internal(anyhow::anyhow!(
                "could not allocate a unique order number"
            )));
        }
        order_number = new_order_number();
    }

    let active = OrderActive {
        id: Set(Uuid::new_v4()),
        order_number: Set(order_number),
        customer_name: Set(payload.customer_name),
        customer_phone: Set(payload.customer_phone),
        customer_email: Set(payload.customer_email),
        customer_address: Set(payload.customer_address),
        notes: Set(payload.notes),
        created_by: Set(Some(user.user_id)),
        status: Set(ORDER_PENDING.into()),
        total_amount_cents: Set(0),
        created_at: NotSet,
        updated_at: NotSet,
    };
    let order = active.insert(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::OrderCreate,
        Some(serde_json::json!({ "order_id": order.id, "order_number": order.order_number })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order created",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

/// Add an item to a pending order. Item insert, stock decrement and order
/// total recompute commit or roll back as one unit.
pub async fn add_item(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    payload: AddItemRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    if payload.quantity < 1 {
        return Err(AppError::Validation("Quantity must be at least 1".into()));
    }

    let txn = state.orm.begin().await?;

    let order = find_order_locked(&txn, order_id).await?;
    if order.status != ORDER_PENDING {
        return Err(AppError::Validation(
            "Items can only be added to a pending order".into(),
        ));
    }

    let product = Products::find_by_id(payload.product_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if payload.quantity > product.stock {
        return Err(AppError::Validation(format!(
            "Quantity {} exceeds available stock ({})",
            payload.quantity, product.stock
        )));
    }

    // Snapshot the unit price; later product price changes must not touch
    // this item.
    let price_cents = product.price_cents;
    let total_cents = price_cents * payload.quantity as i64;

    OrderItemActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        product_id: Set(product.id),
        quantity: Set(payload.quantity),
        price_cents: Set(price_cents),
        total_cents: Set(total_cents),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let new_stock = product.stock - payload.quantity;
    let mut product_active: ProductActive = product.into();
    product_active.stock = Set(new_stock);
    product_active.updated_at = Set(Utc::now().into());
    product_active.update(&txn).await?;

    let (order, items) = recompute_total(&txn, order).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::OrderItemAdd,
        Some(serde_json::json!({ "order_id": order.id, "product_id": payload.product_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Item added to order",
        OrderWithItems {
            order: order_from_entity(order),
            items: items.into_iter().map(order_item_from_entity).collect(),
        },
        Some(Meta::empty()),
    ))
}

/// Remove an item from a pending order, restoring its quantity to stock.
pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    item_id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;

    let order = find_order_locked(&txn, order_id).await?;
    if order.status != ORDER_PENDING {
        return Err(AppError::Validation(
            "Items can only be removed from a pending order".into(),
        ));
    }

    let item = OrderItems::find()
        .filter(
            Condition::all()
                .add(OrderItemCol::Id.eq(item_id))
                .add(OrderItemCol::OrderId.eq(order_id)),
        )
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    restore_stock(&txn, item.product_id, item.quantity).await?;
    let quantity = item.quantity;
    item.delete(&txn).await?;

    let (order, items) = recompute_total(&txn, order).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::OrderItemRemove,
        Some(serde_json::json!({ "order_id": order.id, "restored_quantity": quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order item removed",
        OrderWithItems {
            order: order_from_entity(order),
            items: items.into_iter().map(order_item_from_entity).collect(),
        },
        Some(Meta::empty()),
    ))
}

/// Mark a pending order completed. Empty orders and repeat completions are
/// rejected.
pub async fn complete_order(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let txn = state.orm.begin().await?;

    let order = find_order_locked(&txn, order_id).await?;
    if order.status != ORDER_PENDING {
        return Err(AppError::Validation(format!(
            "Only pending orders can be completed (order is {})",
            order.status
        )));
    }

    let item_count = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .count(&txn)
        .await?;
    if item_count == 0 {
        return Err(AppError::Validation("Cannot complete an empty order".into()));
    }

    let mut active: OrderActive = order.into();
    active.status = Set(ORDER_COMPLETED.into());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::OrderComplete,
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order marked as completed",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

/// Cancel an order, restoring stock for every item. A cancelled order
/// cannot be cancelled again, so stock is never double-restored.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let txn = state.orm.begin().await?;

    let order = find_order_locked(&txn, order_id).await?;
    if order.status == ORDER_CANCELLED {
        return Err(AppError::Validation("Order is already cancelled".into()));
    }

    let mut items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&txn)
        .await?;
    // Lock products in a stable order so two concurrent cancels that share
    // products cannot deadlock.
    items.sort_by_key(|item| item.product_id);
    for item in &items {
        restore_stock(&txn, item.product_id, item.quantity).await?;
    }

    let mut active: OrderActive = order.into();
    active.status = Set(ORDER_CANCELLED.into());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::OrderCancel,
        Some(serde_json::json!({ "order_id": order.id, "restored_items": items.len() })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order cancelled and stock restored",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(state: &AppState, id: Uuid) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Order",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Build the invoice document for an order and hand it to the configured
/// document renderer.
pub async fn invoice(state: &AppState, order_id: Uuid) -> AppResult<(String, Vec<u8>)> {
    let order = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .find_also_related(Products)
        .all(&state.orm)
        .await?;

    let mut sheet = Sheet::new(
        format!("Invoice {}", order.order_number),
        &["Product", "Quantity", "Unit Price", "Total"],
    );
    for (item, product) in &items {
        sheet.push_row(vec![
            Cell::Text(
                product
                    .as_ref()
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| item.product_id.to_string()),
            ),
            Cell::Number(item.quantity as f64),
            Cell::Currency(item.price_cents),
            Cell::Currency(item.total_cents),
        ]);
    }
    sheet.push_row(vec![
        Cell::Text("Total".into()),
        Cell::Text(String::new()),
        Cell::Text(String::new()),
        Cell::Currency(order.total_amount_cents),
    ]);

    let bytes = state.documents.render(&sheet)?;
    let filename = format!(
        "Invoice_{}.{}",
        order.order_number,
        state.documents.extension()
    );
    Ok((filename, bytes))
}

async fn find_order_locked(txn: &DatabaseTransaction, id: Uuid) -> AppResult<OrderModel> {
    Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or(AppError::NotFound)
}

async fn restore_stock(
    txn: &DatabaseTransaction,
    product_id: Uuid,
    quantity: i32,
) -> AppResult<()> {
    let product = Products::find_by_id(product_id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let new_stock = product.stock + quantity;
    let mut active: ProductActive = product.into();
    active.stock = Set(new_stock);
    active.updated_at = Set(Utc::now().into());
    active.update(txn).await?;
    Ok(())
}

/// Re-derive the order total from its items inside the same transaction.
async fn recompute_total(
    txn: &DatabaseTransaction,
    order: OrderModel,
) -> AppResult<(OrderModel, Vec<OrderItemModel>)> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(txn)
        .await?;
    let total: i64 = items.iter().map(|i| i.total_cents).sum();

    let mut active: OrderActive = order.into();
    active.total_amount_cents = Set(total);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(txn).await?;
    Ok((order, items))
}

pub(crate) fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        order_number: model.order_number,
        customer_name: model.customer_name,
        customer_phone: model.customer_phone,
        customer_email: model.customer_email,
        customer_address: model.customer_address,
        notes: model.notes,
        created_by: model.created_by,
        status: model.status,
        total_amount_cents: model.total_amount_cents,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        quantity: model.quantity,
        price_cents: model.price_cents,
        total_cents: model.total_cents,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_numbers_are_opaque_uppercase_tokens() {
        let a = new_order_number();
        let b = new_order_number();
        assert_eq!(a.len(), ORDER_NUMBER_LEN);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }
}
