use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    audit::{self, log_audit},
    db::DbPool,
    dto::orders::{CheckoutRequest, OrderList, OrderWithItems},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, payment_status},
    payment::{ChargeRequest, to_minor_units},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::cart_service,
    state::AppState,
};

pub const CURRENCY: &str = "usd";

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = pagination.normalize();
    let orders = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(&state.pool)
        .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order =
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE user_id = $1 AND id = $2")
            .bind(user.user_id)
            .bind(id)
            .fetch_optional(&state.pool)
            .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT * FROM order_items WHERE order_id = $1 ORDER BY line_no",
    )
    .bind(order.id)
    .fetch_all(&state.pool)
    .await?;

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}

/// The checkout sequence: resolve cart, compute total, persist the order
/// with frozen snapshots, charge, clear the cart. The cart is cleared
/// only after the charge succeeds; a failed charge leaves both the cart
/// and the already-persisted order in place.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    // Entries whose product has been deleted are already dropped here;
    // a stale reference never aborts the whole checkout.
    let resolved = cart_service::resolve_cart(state, user.user_id).await?;

    let mut total = 0.0_f64;
    for entry in &resolved {
        total += entry.product.price * f64::from(entry.quantity);
    }

    let mut txn = state.pool.begin().await?;

    let order = sqlx::query_as::<_, Order>(
        r#"
        INSERT INTO orders (id, user_id, user_name, total)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(&user.name)
    .bind(total)
    .fetch_one(&mut *txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(resolved.len());
    for (line_no, entry) in resolved.iter().enumerate() {
        let item = sqlx::query_as::<_, OrderItem>(
            r#"
            INSERT INTO order_items
                (id, order_id, product_id, line_no, title, description, price, image_url, quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order.id)
        .bind(entry.product.id)
        .bind(line_no as i32)
        .bind(&entry.product.title)
        .bind(&entry.product.description)
        .bind(entry.product.price)
        .bind(&entry.product.image_url)
        .bind(entry.quantity)
        .fetch_one(&mut *txn)
        .await?;
        items.push(item);
    }

    txn.commit().await?;

    // Rounding to cents happens exactly once, here. A zero total never
    // reaches the gateway.
    let amount_minor = to_minor_units(total);
    if amount_minor > 0 {
        let request = ChargeRequest {
            amount_minor,
            currency: CURRENCY.to_string(),
            source: payload.payment_token,
            order_id: order.id,
        };
        if let Err(err) = state.payments.charge(request).await {
            // Consistency window: the order exists without a confirmed
            // charge. Flagged loudly, never rolled back.
            tracing::warn!(
                order_id = %order.id,
                error = %err,
                "charge failed after order persist; cart left intact"
            );
            if let Err(update_err) =
                mark_payment_status(&state.pool, order.id, payment_status::FAILED, None).await
            {
                tracing::warn!(order_id = %order.id, error = %update_err, "failed to flag order as payment_failed");
            }
            if let Err(audit_err) = log_audit(
                &state.pool,
                Some(user.user_id),
                audit::actions::CHECKOUT_PAYMENT_FAILED,
                Some("orders"),
                Some(serde_json::json!({ "order_id": order.id, "amount_minor": amount_minor })),
            )
            .await
            {
                tracing::warn!(error = %audit_err, "audit log failed");
            }
            return Err(AppError::Payment(err));
        }
    }

    let order = mark_payment_status(
        &state.pool,
        order.id,
        payment_status::PAID,
        Some(Utc::now()),
    )
    .await?;

    cart_service::clear_cart(state, user.user_id).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        audit::actions::CHECKOUT,
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "amount_minor": amount_minor })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Checkout success",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}

async fn mark_payment_status(
    pool: &DbPool,
    order_id: Uuid,
    status: &str,
    paid_at: Option<DateTime<Utc>>,
) -> AppResult<Order> {
    let order = sqlx::query_as::<_, Order>(
        "UPDATE orders SET payment_status = $2, paid_at = $3 WHERE id = $1 RETURNING *",
    )
    .bind(order_id)
    .bind(status)
    .bind(paid_at)
    .fetch_one(pool)
    .await?;
    Ok(order)
}
