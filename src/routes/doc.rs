use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::{CartList, ResolvedCartItem},
        orders::{OrderList, OrderWithItems},
        products,
    },
    models::{CartItem, Order, OrderItem, Product, User},
    response::{ApiResponse, Meta},
    routes::{auth, cart, health, orders, params, products as product_routes},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        cart::cart_list,
        cart::add_to_cart,
        cart::remove_from_cart,
        product_routes::list_products,
        product_routes::create_product,
        product_routes::get_product,
        product_routes::update_product,
        product_routes::delete_product,
        orders::list_orders,
        orders::checkout,
        orders::get_order,
        orders::get_invoice
    ),
    components(
        schemas(
            User,
            Product,
            CartItem,
            Order,
            OrderItem,
            CartList,
            ResolvedCartItem,
            OrderList,
            OrderWithItems,
            params::Pagination,
            params::CatalogPage,
            products::ProductList,
            Meta,
            ApiResponse<Product>,
            ApiResponse<products::ProductList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<CartList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order and invoice endpoints"),
        (name = "Auth", description = "Authentication endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
