use uuid::Uuid;

use crate::{
    audit::{self, log_audit},
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::CatalogPage,
    state::AppState,
};

/// Fixed storefront page size.
pub const PAGE_SIZE: i64 = 6;

/// Paginated catalog read, ordered by creation so listing is stable.
pub async fn list_products(
    state: &AppState,
    query: CatalogPage,
) -> AppResult<ApiResponse<ProductList>> {
    let page = query.page();
    let offset = (page - 1) * PAGE_SIZE;

    let items = sqlx::query_as::<_, Product>(
        "SELECT * FROM products ORDER BY created_at, id LIMIT $1 OFFSET $2",
    )
    .bind(PAGE_SIZE)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
        .fetch_one(&state.pool)
        .await?;

    let meta = Meta::new(page, PAGE_SIZE, total.0);
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let result = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?;
    let result = match result {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };
    Ok(ApiResponse::success("Product", result, None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    validate_price(payload.price)?;

    let product = sqlx::query_as::<_, Product>(
        r#"
        INSERT INTO products (id, title, description, price, image_url, user_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(payload.title)
    .bind(payload.description)
    .bind(payload.price)
    .bind(payload.image_url)
    .bind(user.user_id)
    .fetch_one(&state.pool)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        audit::actions::PRODUCT_CREATE,
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product created",
        product,
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let existing = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };
    ensure_owner(user, &existing)?;

    if let Some(price) = payload.price {
        validate_price(price)?;
    }

    let title = payload.title.unwrap_or(existing.title);
    let description = payload.description.or(existing.description);
    let price = payload.price.unwrap_or(existing.price);
    let image_url = payload.image_url.or(existing.image_url);

    let product = sqlx::query_as::<_, Product>(
        r#"
        UPDATE products
        SET title = $2, description = $3, price = $4, image_url = $5
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(title)
    .bind(description)
    .bind(price)
    .bind(image_url)
    .fetch_one(&state.pool)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        audit::actions::PRODUCT_UPDATE,
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Updated", product, Some(Meta::empty())))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let existing = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };
    ensure_owner(user, &existing)?;

    sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        audit::actions::PRODUCT_DELETE,
        Some("products"),
        Some(serde_json::json!({ "product_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Products may only be changed by their owning user (admins excepted).
fn ensure_owner(user: &AuthUser, product: &Product) -> AppResult<()> {
    if product.user_id != user.user_id && user.role != "admin" {
        return Err(AppError::PermissionDenied);
    }
    Ok(())
}

fn validate_price(price: f64) -> AppResult<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::Validation(
            "price must be a non-negative number".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_must_be_finite_and_non_negative() {
        assert!(validate_price(0.0).is_ok());
        assert!(validate_price(19.99).is_ok());
        assert!(validate_price(-0.01).is_err());
        assert!(validate_price(f64::NAN).is_err());
        assert!(validate_price(f64::INFINITY).is_err());
    }
}
