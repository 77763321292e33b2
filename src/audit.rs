use serde_json::Value;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult};

/// Storefront event names, one constant per auditable action so call
/// sites cannot drift on spelling.
pub mod actions {
    pub const USER_REGISTER: &str = "user_register";
    pub const USER_LOGIN: &str = "user_login";
    pub const PRODUCT_CREATE: &str = "product_create";
    pub const PRODUCT_UPDATE: &str = "product_update";
    pub const PRODUCT_DELETE: &str = "product_delete";
    pub const CART_ADD: &str = "cart_add";
    pub const CART_REMOVE: &str = "cart_remove";
    pub const CHECKOUT: &str = "checkout";
    pub const CHECKOUT_PAYMENT_FAILED: &str = "checkout_payment_failed";
}

/// Append-only trail of the storefront's state changes. Failures are the
/// caller's to log; auditing never aborts the operation it records.
pub async fn log_audit(
    pool: &DbPool,
    user_id: Option<Uuid>,
    action: &str,
    resource: Option<&str>,
    metadata: Option<Value>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, resource, metadata)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(action)
    .bind(resource)
    .bind(metadata)
    .execute(pool)
    .await?;

    Ok(())
}
