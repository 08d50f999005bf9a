use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use grocery_backoffice_api::{
    config::AppConfig,
    db::create_pool,
    models::{ROLE_ADMIN, ROLE_STAFF},
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id =
        ensure_user(&pool, "admin", "admin@example.com", "admin123", ROLE_ADMIN).await?;
    let staff_id =
        ensure_user(&pool, "staff", "staff@example.com", "staff123", ROLE_STAFF).await?;
    seed_catalog(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, Staff ID: {staff_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    username: &str,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    if let Some((id,)) = row {
        return Ok(id);
    }

    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO users (id, username, email, password_hash, role) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(id)
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .execute(pool)
    .await?;

    Ok(id)
}

async fn seed_catalog(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let existing: (i64,) = sqlx::query_as("SELECT count(*) FROM categories")
        .fetch_one(pool)
        .await?;
    if existing.0 > 0 {
        return Ok(());
    }

    let produce = Uuid::new_v4();
    let dairy = Uuid::new_v4();
    sqlx::query("INSERT INTO categories (id, name, description) VALUES ($1, 'Produce', 'Fruit and vegetables'), ($2, 'Dairy', 'Milk, cheese, eggs')")
        .bind(produce)
        .bind(dairy)
        .execute(pool)
        .await?;

    let products: [(&str, &str, Uuid, i64, i32); 3] = [
        ("100000000001", "Bananas 1kg", produce, 199, 120),
        ("100000000002", "Whole Milk 1L", dairy, 149, 40),
        ("100000000003", "Cheddar 500g", dairy, 699, 12),
    ];
    for (barcode, name, category, price_cents, stock) in products {
        sqlx::query(
            "INSERT INTO products (id, barcode, name, category_id, price_cents, stock, min_stock_level) \
             VALUES ($1, $2, $3, $4, $5, $6, 5)",
        )
        .bind(Uuid::new_v4())
        .bind(barcode)
        .bind(name)
        .bind(category)
        .bind(price_cents)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    Ok(())
}
