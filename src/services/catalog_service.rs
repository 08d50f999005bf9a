use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::{AuditAction, log_audit},
    barcode::{fallback_barcode, is_numeric_barcode},
    dto::products::{
        BarcodeLookup, CategoryRequest, CreateProductRequest, ProductList, UpdateProductRequest,
    },
    entity::{
        categories::{
            ActiveModel as CategoryActive, Column as CategoryCol, Entity as Categories,
            Model as CategoryModel,
        },
        products::{
            ActiveModel as ProductActive, Column as ProductCol, Entity as Products,
            Model as ProductModel,
        },
    },
    error::{AppError, AppResult},
    export::csv_bytes,
    middleware::auth::AuthUser,
    models::{Category, Product},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};
use crate::dto::products::CategoryList;

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(ProductCol::Name).ilike(pattern.clone()))
                .add(Expr::col(ProductCol::Barcode).ilike(pattern)),
        );
    }

    if let Some(category_id) = query.category_id {
        condition = condition.add(ProductCol::CategoryId.eq(category_id));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => ProductCol::CreatedAt,
        ProductSortBy::Price => ProductCol::PriceCents,
        ProductSortBy::Name => ProductCol::Name,
        ProductSortBy::Stock => ProductCol::Stock,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(product_from_entity);
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };
    Ok(ApiResponse::success("Product", product, None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    validate_product_fields(
        payload.price_cents,
        payload.stock,
        payload.min_stock_level.unwrap_or(5),
    )?;

    let id = Uuid::new_v4();
    // A supplied barcode must be numeric; anything else gets the
    // deterministic fallback derived from the new id.
    let barcode = if is_numeric_barcode(&payload.barcode) {
        payload.barcode.clone()
    } else {
        fallback_barcode(id)
    };

    ensure_barcode_free(state, &barcode, None).await?;

    if let Some(category_id) = payload.category_id {
        ensure_category_exists(state, category_id).await?;
    }

    let active = ProductActive {
        id: Set(id),
        barcode: Set(barcode.clone()),
        name: Set(payload.name),
        description: Set(payload.description),
        category_id: Set(payload.category_id),
        price_cents: Set(payload.price_cents),
        stock: Set(payload.stock),
        min_stock_level: Set(payload.min_stock_level.unwrap_or(5)),
        created_at: NotSet,
        updated_at: NotSet,
    };
    let product = active.insert(&state.orm).await?;

    // Image generation is a side effect; its failure never unwinds the insert.
    let message = match write_barcode_image(state, &barcode).await {
        Ok(()) => "Product created".to_string(),
        Err(err) => {
            tracing::warn!(barcode = %barcode, error = %err, "barcode image generation failed");
            format!("Product created but barcode generation failed: {err}")
        }
    };

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::ProductCreate,
        Some(serde_json::json!({ "product_id": product.id, "barcode": barcode })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        message,
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let existing = Products::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    validate_product_fields(
        payload.price_cents.unwrap_or(existing.price_cents),
        payload.stock.unwrap_or(existing.stock),
        payload.min_stock_level.unwrap_or(existing.min_stock_level),
    )?;

    if let Some(barcode) = payload.barcode.as_ref() {
        if !is_numeric_barcode(barcode) {
            return Err(AppError::Validation("Barcode must be numeric".into()));
        }
        if *barcode != existing.barcode {
            ensure_barcode_free(state, barcode, Some(id)).await?;
        }
    }

    if let Some(Some(category_id)) = payload.category_id {
        ensure_category_exists(state, category_id).await?;
    }

    let mut active: ProductActive = existing.into();
    if let Some(barcode) = payload.barcode {
        active.barcode = Set(barcode);
    }
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    if let Some(category_id) = payload.category_id {
        active.category_id = Set(category_id);
    }
    if let Some(price_cents) = payload.price_cents {
        active.price_cents = Set(price_cents);
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(stock);
    }
    if let Some(min_stock_level) = payload.min_stock_level {
        active.min_stock_level = Set(min_stock_level);
    }
    active.updated_at = Set(Utc::now().into());

    let product = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::ProductUpdate,
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product updated",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = Products::delete_by_id(id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::ProductDelete,
        Some(serde_json::json!({ "product_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn lookup_by_barcode(
    state: &AppState,
    code: &str,
) -> AppResult<ApiResponse<BarcodeLookup>> {
    let product = Products::find()
        .filter(ProductCol::Barcode.eq(code))
        .one(&state.orm)
        .await?;
    let product = match product {
        Some(p) => product_from_entity(p),
        None => return Err(AppError::NotFound),
    };

    let stock_status = product.stock_status().to_string();
    Ok(ApiResponse::success(
        "Product found",
        BarcodeLookup {
            product,
            stock_status,
        },
        None,
    ))
}

/// Re-render and persist the barcode image for an existing product.
pub async fn regenerate_barcode_image(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Product>> {
    let product = Products::find_by_id(id).one(&state.orm).await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let message = match write_barcode_image(state, &product.barcode).await {
        Ok(()) => "Barcode image generated".to_string(),
        Err(err) => {
            tracing::warn!(barcode = %product.barcode, error = %err, "barcode image generation failed");
            format!("Barcode generation failed: {err}")
        }
    };

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::BarcodeGenerate,
        Some(serde_json::json!({ "product_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        message,
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    let items = Categories::find()
        .order_by_asc(CategoryCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(category_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Categories",
        CategoryList { items },
        Some(Meta::empty()),
    ))
}

pub async fn create_category(
    state: &AppState,
    user: &AuthUser,
    payload: CategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    let active = CategoryActive {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name),
        description: Set(payload.description),
    };
    let category = active.insert(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::CategoryCreate,
        Some(serde_json::json!({ "category_id": category.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Category created",
        category_from_entity(category),
        Some(Meta::empty()),
    ))
}

pub async fn update_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: CategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    let existing = Categories::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };

    let mut active: CategoryActive = existing.into();
    active.name = Set(payload.name);
    active.description = Set(payload.description);
    let category = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::CategoryUpdate,
        Some(serde_json::json!({ "category_id": category.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Category updated",
        category_from_entity(category),
        Some(Meta::empty()),
    ))
}

/// Deletion is blocked while any product references the category.
pub async fn delete_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let in_use = Products::find()
        .filter(ProductCol::CategoryId.eq(id))
        .count(&state.orm)
        .await?;
    if in_use > 0 {
        return Err(AppError::Conflict(
            "Cannot delete category with associated products".into(),
        ));
    }

    let result = Categories::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::CategoryDelete,
        Some(serde_json::json!({ "category_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Category deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Full catalog as CSV rows: barcode, name, category, price, stock,
/// min stock, derived status.
pub async fn export_catalog(state: &AppState) -> AppResult<(String, Vec<u8>)> {
    let rows = Products::find()
        .find_also_related(Categories)
        .order_by_asc(ProductCol::Name)
        .all(&state.orm)
        .await?;

    let records: Vec<Vec<String>> = rows
        .into_iter()
        .map(|(p, category)| {
            let product = product_from_entity(p);
            vec![
                product.barcode.clone(),
                product.name.clone(),
                category.map(|c| c.name).unwrap_or_default(),
                crate::export::format_cents(product.price_cents),
                product.stock.to_string(),
                product.min_stock_level.to_string(),
                product.stock_status().to_string(),
            ]
        })
        .collect();

    let bytes = csv_bytes(
        &["Barcode", "Name", "Category", "Price", "Stock", "Min Stock", "Status"],
        &records,
    )?;
    Ok(("products_export.csv".to_string(), bytes))
}

fn validate_product_fields(price_cents: i64, stock: i32, min_stock_level: i32) -> AppResult<()> {
    if price_cents <= 0 {
        return Err(AppError::Validation("Price must be greater than zero".into()));
    }
    if stock < 0 {
        return Err(AppError::Validation("Stock cannot be negative".into()));
    }
    if min_stock_level < 0 {
        return Err(AppError::Validation(
            "Minimum stock level cannot be negative".into(),
        ));
    }
    Ok(())
}

async fn ensure_barcode_free(
    state: &AppState,
    barcode: &str,
    exclude: Option<Uuid>,
) -> AppResult<()> {
    let mut condition = Condition::all().add(ProductCol::Barcode.eq(barcode));
    if let Some(id) = exclude {
        condition = condition.add(ProductCol::Id.ne(id));
    }
    let taken = Products::find().filter(condition).count(&state.orm).await?;
    if taken > 0 {
        return Err(AppError::Conflict(format!("Barcode {barcode} is already in use")));
    }
    Ok(())
}

async fn ensure_category_exists(state: &AppState, id: Uuid) -> AppResult<()> {
    if Categories::find_by_id(id).one(&state.orm).await?.is_none() {
        return Err(AppError::Validation("Unknown category".into()));
    }
    Ok(())
}

async fn write_barcode_image(state: &AppState, barcode: &str) -> anyhow::Result<()> {
    let bytes = state.barcodes.render(barcode)?;
    tokio::fs::create_dir_all(&state.media_dir).await?;
    let filename = format!("barcode_{barcode}.{}", state.barcodes.extension());
    tokio::fs::write(state.media_dir.join(filename), bytes).await?;
    Ok(())
}

pub(crate) fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        barcode: model.barcode,
        name: model.name,
        description: model.description,
        category_id: model.category_id,
        price_cents: model.price_cents,
        stock: model.stock,
        min_stock_level: model.min_stock_level,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn category_from_entity(model: CategoryModel) -> Category {
    Category {
        id: model.id,
        name: model.name,
        description: model.description,
    }
}
