use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub image_url: Option<String>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

/// Immutable once created; only `payment_status`/`paid_at` transition
/// (`pending_payment` to `paid` or `payment_failed`).
#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub total: f64,
    pub payment_status: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Frozen product snapshot taken at checkout. `product_id` is provenance
/// only; the product may be edited or deleted later without touching this.
/// `line_no` preserves the cart position the snapshot was taken from.
#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub line_no: i32,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub image_url: Option<String>,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

pub mod payment_status {
    pub const PENDING: &str = "pending_payment";
    pub const PAID: &str = "paid";
    pub const FAILED: &str = "payment_failed";
}
