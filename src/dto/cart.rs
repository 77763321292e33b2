use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Product;

/// Adding is always "+1 of this product"; repeated calls accumulate.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
}

/// A cart entry joined to its live product. Entries whose product no
/// longer exists never appear here.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResolvedCartItem {
    pub product: Product,
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct CartList {
    #[schema(value_type = Vec<ResolvedCartItem>)]
    pub items: Vec<ResolvedCartItem>,
}
