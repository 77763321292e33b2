use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::{self, log_audit},
    dto::cart::{AddToCartRequest, CartList, ResolvedCartItem},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CartItem, Product},
    response::{ApiResponse, Meta},
    state::AppState,
};

#[derive(FromRow)]
struct CartProductRow {
    quantity: i32,
    product_id: Uuid,
    title: String,
    description: Option<String>,
    price: f64,
    image_url: Option<String>,
    owner_id: Uuid,
    product_created_at: DateTime<Utc>,
}

pub async fn list_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartList>> {
    let items = resolve_cart(state, user.user_id).await?;
    Ok(ApiResponse::success(
        "OK",
        CartList { items },
        Some(Meta::empty()),
    ))
}

/// Join cart entries to their live products. Entries whose product has
/// been deleted are dropped from the view; the rows themselves stay until
/// an explicit removal or the post-checkout clear.
pub async fn resolve_cart(state: &AppState, user_id: Uuid) -> AppResult<Vec<ResolvedCartItem>> {
    let rows = sqlx::query_as::<_, CartProductRow>(
        r#"
        SELECT ci.quantity,
               p.id AS product_id, p.title, p.description, p.price, p.image_url,
               p.user_id AS owner_id, p.created_at AS product_created_at
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.user_id = $1
        ORDER BY ci.created_at, ci.id
        "#,
    )
    .bind(user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| ResolvedCartItem {
            product: Product {
                id: row.product_id,
                title: row.title,
                description: row.description,
                price: row.price,
                image_url: row.image_url,
                user_id: row.owner_id,
                created_at: row.product_created_at,
            },
            quantity: row.quantity,
        })
        .collect())
}

/// Adding the same product again increments its quantity; the entry set
/// stays unique per product.
pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    let product_exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(payload.product_id)
        .fetch_optional(&state.pool)
        .await?;
    if product_exist.is_none() {
        return Err(AppError::Validation("product not found".to_string()));
    }

    let cart_item = sqlx::query_as::<_, CartItem>(
        r#"
        INSERT INTO cart_items (id, user_id, product_id, quantity)
        VALUES ($1, $2, $3, 1)
        ON CONFLICT (user_id, product_id)
        DO UPDATE SET quantity = cart_items.quantity + 1
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(payload.product_id)
    .fetch_one(&state.pool)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        audit::actions::CART_ADD,
        Some("cart_items"),
        Some(serde_json::json!({
            "product_id": payload.product_id,
            "quantity": cart_item.quantity,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("OK", cart_item, None))
}

/// Removing an absent product is a no-op, not an error.
pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM cart_items WHERE product_id = $1 AND user_id = $2")
        .bind(product_id)
        .bind(user.user_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() > 0
        && let Err(err) = log_audit(
            &state.pool,
            Some(user.user_id),
            audit::actions::CART_REMOVE,
            Some("cart_items"),
            Some(serde_json::json!({ "product_id": product_id })),
        )
        .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Called only after the charge has succeeded (or the total was zero).
pub async fn clear_cart(state: &AppState, user_id: Uuid) -> AppResult<()> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user_id)
        .execute(&state.pool)
        .await?;
    Ok(())
}
