use std::sync::Arc;

use grocery_backoffice_api::{
    barcode::SvgBarcodeRenderer,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{
        orders::{AddItemRequest, CreateOrderRequest},
        products::{CategoryRequest, CreateProductRequest},
        reports::PerformanceVariant,
    },
    entity::products,
    error::AppError,
    export::CsvDocumentRenderer,
    middleware::auth::AuthUser,
    models::{ORDER_CANCELLED, ORDER_COMPLETED},
    services::{catalog_service, order_service, report_service},
    state::AppState,
};
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, ConnectionTrait, Set, Statement};
use uuid::Uuid;

// Both flows truncate the same database, so they must not interleave.
static DB_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

// Full back-office flow: catalog setup, order entry with stock decrement,
// oversell rejection, item removal, state-machine guards, category delete
// conflict.
#[tokio::test]
async fn order_entry_and_stock_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let _guard = DB_LOCK.lock().await;
    let state = setup_state(&database_url).await?;
    let staff = create_user(&state, "staff", "staff@example.com").await?;

    // Catalog: category + product with stock 10, min 5, price $2.00
    let category = catalog_service::create_category(
        &state,
        &staff,
        CategoryRequest {
            name: "Produce".into(),
            description: String::new(),
        },
    )
    .await?
    .data
    .unwrap();

    let product = catalog_service::create_product(
        &state,
        &staff,
        CreateProductRequest {
            barcode: String::new(),
            name: "Apples 1kg".into(),
            description: String::new(),
            category_id: Some(category.id),
            price_cents: 200,
            stock: 10,
            min_stock_level: Some(5),
        },
    )
    .await?
    .data
    .unwrap();

    // Blank barcode gets the deterministic 12-digit fallback.
    assert_eq!(product.barcode.len(), 12);
    assert!(product.barcode.bytes().all(|b| b.is_ascii_digit()));

    // Category is now referenced, deleting it must conflict.
    let err = catalog_service::delete_category(&state, &staff, category.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Barcode lookup round-trips.
    let lookup = catalog_service::lookup_by_barcode(&state, &product.barcode)
        .await?
        .data
        .unwrap();
    assert_eq!(lookup.product.id, product.id);
    assert_eq!(lookup.stock_status, "In Stock");

    // Order entry.
    let order = order_service::create_order(
        &state,
        &staff,
        CreateOrderRequest {
            customer_name: "Jane Smith".into(),
            customer_phone: "555-0100".into(),
            customer_email: None,
            customer_address: None,
            notes: String::new(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(order.status, "pending");
    assert_eq!(order.total_amount_cents, 0);
    assert_eq!(order.order_number.len(), 20);

    // Completing an empty order fails.
    let err = order_service::complete_order(&state, &staff, order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // add 3 units: stock 10 -> 7, totals $6.00
    let with_items = order_service::add_item(
        &state,
        &staff,
        order.id,
        AddItemRequest {
            product_id: product.id,
            quantity: 3,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(with_items.items.len(), 1);
    assert_eq!(with_items.items[0].total_cents, 600);
    assert_eq!(with_items.order.total_amount_cents, 600);

    let p = catalog_service::get_product(&state, product.id).await?.data.unwrap();
    assert_eq!(p.stock, 7);

    // Items count toward product performance as soon as they are recorded,
    // even while the owning order is still pending.
    let perf = report_service::product_performance(&state, PerformanceVariant::Performance)
        .await?
        .data
        .unwrap();
    let row = perf
        .products
        .iter()
        .find(|r| r.product_id == product.id)
        .expect("performance row");
    assert_eq!(row.total_sold, 3);
    assert_eq!(row.total_revenue_cents, 600);

    // Oversell: only 7 left, 8 must fail and change nothing.
    let err = order_service::add_item(
        &state,
        &staff,
        order.id,
        AddItemRequest {
            product_id: product.id,
            quantity: 8,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    let p = catalog_service::get_product(&state, product.id).await?.data.unwrap();
    assert_eq!(p.stock, 7);
    let fetched = order_service::get_order(&state, order.id).await?.data.unwrap();
    assert_eq!(fetched.order.total_amount_cents, 600);

    // Remove the item: stock restored, total back to zero.
    let item_id = fetched.items[0].id;
    let after_remove = order_service::remove_item(&state, &staff, order.id, item_id)
        .await?
        .data
        .unwrap();
    assert!(after_remove.items.is_empty());
    assert_eq!(after_remove.order.total_amount_cents, 0);
    let p = catalog_service::get_product(&state, product.id).await?.data.unwrap();
    assert_eq!(p.stock, 10);

    // Cancel the now-empty order: status flips, stock untouched.
    let cancelled = order_service::cancel_order(&state, &staff, order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(cancelled.status, ORDER_CANCELLED);
    let p = catalog_service::get_product(&state, product.id).await?.data.unwrap();
    assert_eq!(p.stock, 10);

    // Cancelling twice is rejected, so stock can never double-restore.
    let err = order_service::cancel_order(&state, &staff, order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // Terminal orders refuse new items.
    let err = order_service::add_item(
        &state,
        &staff,
        order.id,
        AddItemRequest {
            product_id: product.id,
            quantity: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    Ok(())
}

#[tokio::test]
async fn completion_and_cancellation_guards() -> anyhow::Result<()> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let _guard = DB_LOCK.lock().await;
    let state = setup_state(&database_url).await?;
    let staff = create_user(&state, "staff", "staff2@example.com").await?;

    let product = catalog_service::create_product(
        &state,
        &staff,
        CreateProductRequest {
            barcode: "200000000001".into(),
            name: "Oat Milk 1L".into(),
            description: String::new(),
            category_id: None,
            price_cents: 350,
            stock: 5,
            min_stock_level: Some(2),
        },
    )
    .await?
    .data
    .unwrap();

    let second = catalog_service::create_product(
        &state,
        &staff,
        CreateProductRequest {
            barcode: "200000000002".into(),
            name: "Sourdough Loaf".into(),
            description: String::new(),
            category_id: None,
            price_cents: 450,
            stock: 4,
            min_stock_level: Some(2),
        },
    )
    .await?
    .data
    .unwrap();

    let order = order_service::create_order(
        &state,
        &staff,
        CreateOrderRequest {
            customer_name: "Sam Lee".into(),
            customer_phone: "555-0111".into(),
            customer_email: Some("sam@example.com".into()),
            customer_address: None,
            notes: String::new(),
        },
    )
    .await?
    .data
    .unwrap();

    order_service::add_item(
        &state,
        &staff,
        order.id,
        AddItemRequest {
            product_id: product.id,
            quantity: 2,
        },
    )
    .await?;
    order_service::add_item(
        &state,
        &staff,
        order.id,
        AddItemRequest {
            product_id: second.id,
            quantity: 3,
        },
    )
    .await?;

    let completed = order_service::complete_order(&state, &staff, order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(completed.status, ORDER_COMPLETED);

    // Re-completing is a caller error.
    let err = order_service::complete_order(&state, &staff, order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // Cancelling a completed order restores the sold units for every product.
    let p = catalog_service::get_product(&state, product.id).await?.data.unwrap();
    assert_eq!(p.stock, 3);
    let s = catalog_service::get_product(&state, second.id).await?.data.unwrap();
    assert_eq!(s.stock, 1);
    let cancelled = order_service::cancel_order(&state, &staff, order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(cancelled.status, ORDER_CANCELLED);
    let p = catalog_service::get_product(&state, product.id).await?.data.unwrap();
    assert_eq!(p.stock, 5);
    let s = catalog_service::get_product(&state, second.id).await?.data.unwrap();
    assert_eq!(s.stock, 4);

    Ok(())
}

// Uniqueness checks in the services race with concurrent writers; the
// database constraint is the backstop and its violation must surface as a
// conflict, not an internal error.
#[tokio::test]
async fn duplicate_keys_surface_as_conflicts() -> anyhow::Result<()> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let _guard = DB_LOCK.lock().await;
    let state = setup_state(&database_url).await?;
    let staff = create_user(&state, "staff", "staff3@example.com").await?;

    // Duplicate email past the lookup: the raw insert maps to Conflict.
    let err: AppError = sqlx::query(
        "INSERT INTO users (id, username, email, password_hash, role) \
         VALUES ($1, 'staff3', 'staff3@example.com', 'dummy', 'staff')",
    )
    .bind(Uuid::new_v4())
    .execute(&state.pool)
    .await
    .unwrap_err()
    .into();
    assert!(matches!(err, AppError::Conflict(_)));

    catalog_service::create_product(
        &state,
        &staff,
        CreateProductRequest {
            barcode: "300000000001".into(),
            name: "Olive Oil 500ml".into(),
            description: String::new(),
            category_id: None,
            price_cents: 899,
            stock: 6,
            min_stock_level: Some(2),
        },
    )
    .await?;

    // Duplicate barcode through the ORM maps to Conflict as well.
    let dup = products::ActiveModel {
        id: Set(Uuid::new_v4()),
        barcode: Set("300000000001".into()),
        name: Set("Olive Oil 1L".into()),
        description: Set(String::new()),
        category_id: Set(None),
        price_cents: Set(1499),
        stock: Set(3),
        min_stock_level: Set(2),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await;
    let err: AppError = dup.unwrap_err().into();
    assert!(matches!(err, AppError::Conflict(_)));

    Ok(())
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE order_items, orders, audit_logs, products, categories, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(AppState {
        pool,
        orm,
        barcodes: Arc::new(SvgBarcodeRenderer),
        documents: Arc::new(CsvDocumentRenderer),
        media_dir: std::env::temp_dir().join("grocery-backoffice-test-media"),
    })
}

async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<AuthUser> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO users (id, username, email, password_hash, role) VALUES ($1, $2, $3, 'dummy', $4)",
    )
    .bind(id)
    .bind(email.split('@').next().unwrap_or("user"))
    .bind(email)
    .bind(role)
    .execute(&state.pool)
    .await?;

    Ok(AuthUser {
        user_id: id,
        role: role.into(),
    })
}
