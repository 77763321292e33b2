use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum_storefront_api::{config::AppConfig, db::create_pool};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id =
        ensure_user(&pool, "admin@example.com", "Admin", "admin123", "admin").await?;
    let user_id = ensure_user(&pool, "user@example.com", "Shopper", "user123", "user").await?;
    seed_products(&pool, admin_id).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    name: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let row: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, name, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(name)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

async fn seed_products(pool: &sqlx::PgPool, owner_id: Uuid) -> anyhow::Result<()> {
    let demo: [(&str, &str, f64); 3] = [
        ("Notebook", "A5 dotted notebook", 8.50),
        ("Fountain Pen", "Medium nib, converter included", 24.00),
        ("Desk Mat", "Felt, 80x30cm", 19.99),
    ];

    for (title, description, price) in demo {
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE title = $1")
            .bind(title)
            .fetch_optional(pool)
            .await?;
        if exists.is_some() {
            continue;
        }
        sqlx::query(
            r#"
            INSERT INTO products (id, title, description, price, image_url, user_id)
            VALUES ($1, $2, $3, $4, NULL, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(description)
        .bind(price)
        .bind(owner_id)
        .execute(pool)
        .await?;
    }

    Ok(())
}
