use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get},
};
use uuid::Uuid;

use crate::{
    dto::cart::{AddToCartRequest, CartList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::CartItem,
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(cart_list).post(add_to_cart))
        .route("/{product_id}", delete(remove_from_cart))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Resolved cart for the current user", body = ApiResponse<CartList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn cart_list(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartList>>> {
    let resp = cart_service::list_cart(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Add one of the product to the cart", body = ApiResponse<CartItem>),
        (status = 400, description = "Product does not exist"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartItem>>> {
    let resp = cart_service::add_to_cart(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Removed; absent entries are a silent no-op", body = ApiResponse<serde_json::Value>),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = cart_service::remove_from_cart(&state, &user, product_id).await?;
    Ok(Json(resp))
}
