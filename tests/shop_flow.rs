use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use axum_storefront_api::{
    audit,
    db::create_pool,
    dto::cart::AddToCartRequest,
    dto::orders::CheckoutRequest,
    dto::products::{CreateProductRequest, UpdateProductRequest},
    error::AppError,
    middleware::auth::AuthUser,
    models::payment_status,
    payment::{Charge, ChargeRequest, PaymentError, PaymentGateway},
    routes::params::{CatalogPage, Pagination},
    services::{cart_service, invoice_service, order_service, product_service},
    state::AppState,
};
use uuid::Uuid;

/// Gateway fake that records every charge request and can be told to
/// decline the next one.
struct RecordingGateway {
    charges: Mutex<Vec<ChargeRequest>>,
    decline_next: AtomicBool,
}

impl RecordingGateway {
    fn new() -> Self {
        Self {
            charges: Mutex::new(Vec::new()),
            decline_next: AtomicBool::new(false),
        }
    }

    fn recorded(&self) -> Vec<ChargeRequest> {
        self.charges.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn charge(&self, request: ChargeRequest) -> Result<Charge, PaymentError> {
        self.charges.lock().unwrap().push(request.clone());
        if self.decline_next.swap(false, Ordering::SeqCst) {
            return Err(PaymentError::Declined("card_declined".into()));
        }
        Ok(Charge {
            id: format!("ch_{}", Uuid::new_v4().simple()),
            status: "succeeded".into(),
        })
    }
}

// Integration flow: browse -> cart -> checkout (declined, then charged) -> invoice.
#[tokio::test]
async fn cart_checkout_invoice_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let pool = create_pool(&database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    // Clean tables between runs.
    sqlx::query(
        "TRUNCATE TABLE order_items, orders, cart_items, audit_logs, products, users RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await?;

    let gateway = Arc::new(RecordingGateway::new());
    let invoice_dir = tempfile::tempdir()?;
    let state = AppState {
        pool: pool.clone(),
        payments: gateway.clone(),
        invoice_dir: invoice_dir.path().to_path_buf(),
    };

    let merchant = create_user(&pool, "merchant@example.com", "Merchant").await?;
    let shopper = create_user(&pool, "shopper@example.com", "Shopper").await?;
    let stranger = create_user(&pool, "stranger@example.com", "Stranger").await?;

    // Seed the catalog: the two worked-example products, one that will go
    // stale in the cart, and filler to cross the 6-per-page boundary.
    let product_a = create_product(&state, &merchant, "ProductA", 10.0).await?;
    let product_b = create_product(&state, &merchant, "ProductB", 5.5).await?;
    let product_c = create_product(&state, &merchant, "Discontinued", 3.0).await?;
    for i in 0..4 {
        create_product(&state, &merchant, &format!("Filler {i}"), 1.0).await?;
    }

    // Catalog pagination: 7 products, fixed page size 6.
    let page1 = product_service::list_products(&state, CatalogPage { page: Some(1) }).await?;
    let meta = page1.meta.unwrap();
    assert_eq!(page1.data.unwrap().items.len(), 6);
    assert_eq!(meta.total, Some(7));
    assert_eq!(meta.has_next_page, Some(true));
    assert_eq!(meta.has_previous_page, Some(false));

    let page2 = product_service::list_products(&state, CatalogPage { page: Some(2) }).await?;
    let meta = page2.meta.unwrap();
    assert_eq!(page2.data.unwrap().items.len(), 1);
    assert_eq!(meta.has_next_page, Some(false));
    assert_eq!(meta.has_previous_page, Some(true));

    // Page numbers below 1 are clamped, not an error.
    let clamped = product_service::list_products(&state, CatalogPage { page: Some(-2) }).await?;
    assert_eq!(clamped.meta.unwrap().page, Some(1));

    // Cart: adding the same product twice accumulates into one entry.
    add_to_cart(&state, &shopper, product_a).await?;
    add_to_cart(&state, &shopper, product_a).await?;
    add_to_cart(&state, &shopper, product_b).await?;
    add_to_cart(&state, &shopper, product_c).await?;

    let resolved = cart_service::resolve_cart(&state, shopper.user_id).await?;
    assert_eq!(resolved.len(), 3);
    let entry_a = resolved
        .iter()
        .find(|e| e.product.id == product_a)
        .expect("ProductA entry");
    assert_eq!(entry_a.quantity, 2);

    // Removing a product that was never added is a silent no-op.
    cart_service::remove_from_cart(&state, &shopper, Uuid::new_v4()).await?;
    assert_eq!(cart_service::resolve_cart(&state, shopper.user_id).await?.len(), 3);

    // A deleted product leaves a dangling cart entry that resolution drops.
    product_service::delete_product(&state, &merchant, product_c).await?;
    let resolved = cart_service::resolve_cart(&state, shopper.user_id).await?;
    assert_eq!(resolved.len(), 2);

    // Only the owning user may edit a product.
    let err = product_service::update_product(
        &state,
        &shopper,
        product_a,
        UpdateProductRequest {
            title: None,
            description: None,
            price: Some(1.0),
            image_url: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied));

    // Declined charge: the order is persisted and flagged, the cart survives.
    gateway.decline_next.store(true, Ordering::SeqCst);
    let err = order_service::checkout(
        &state,
        &shopper,
        CheckoutRequest {
            payment_token: "tok_visa".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Payment(_)));
    assert_eq!(gateway.recorded().len(), 1);
    assert_eq!(cart_service::resolve_cart(&state, shopper.user_id).await?.len(), 2);
    let flagged: (String,) = sqlx::query_as(
        "SELECT payment_status FROM orders WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1",
    )
    .bind(shopper.user_id)
    .fetch_one(&pool)
    .await?;
    assert_eq!(flagged.0, payment_status::FAILED);

    // Successful checkout: worked example, A x2 at $10.00 + B x1 at $5.50.
    let cart_sequence: Vec<Uuid> = cart_service::resolve_cart(&state, shopper.user_id)
        .await?
        .iter()
        .map(|entry| entry.product.id)
        .collect();
    let resp = order_service::checkout(
        &state,
        &shopper,
        CheckoutRequest {
            payment_token: "tok_visa".into(),
        },
    )
    .await?;
    let checked_out = resp.data.unwrap();
    let order = checked_out.order;
    assert_eq!(order.total, 25.5);
    assert_eq!(order.payment_status, payment_status::PAID);
    assert_eq!(order.user_name, "Shopper");
    assert_eq!(checked_out.items.len(), 2);

    // Line items keep the cart sequence, not some storage-side ordering.
    let item_sequence: Vec<Uuid> = checked_out.items.iter().map(|i| i.product_id).collect();
    assert_eq!(item_sequence, cart_sequence);
    let line_nos: Vec<i32> = checked_out.items.iter().map(|i| i.line_no).collect();
    assert_eq!(line_nos, vec![0, 1]);

    let charges = gateway.recorded();
    assert_eq!(charges.len(), 2);
    let charge = &charges[1];
    assert_eq!(charge.amount_minor, 2550);
    assert_eq!(charge.currency, "usd");
    assert_eq!(charge.source, "tok_visa");
    assert_eq!(charge.order_id, order.id);

    // Cart is cleared only now, after the charge succeeded.
    assert!(cart_service::resolve_cart(&state, shopper.user_id).await?.is_empty());

    // Both checkout outcomes left an audit trail under their event names.
    let audited: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM audit_logs WHERE user_id = $1 AND action = ANY($2)",
    )
    .bind(shopper.user_id)
    .bind(vec![
        audit::actions::CHECKOUT,
        audit::actions::CHECKOUT_PAYMENT_FAILED,
    ])
    .fetch_one(&pool)
    .await?;
    assert_eq!(audited.0, 2);

    // Snapshots are frozen: a later price edit must not touch the order.
    product_service::update_product(
        &state,
        &merchant,
        product_a,
        UpdateProductRequest {
            title: Some("ProductA v2".into()),
            description: None,
            price: Some(99.0),
            image_url: None,
        },
    )
    .await?;
    let reread = order_service::get_order(&state, &shopper, order.id)
        .await?
        .data
        .unwrap();
    let reread_sequence: Vec<Uuid> = reread.items.iter().map(|i| i.product_id).collect();
    assert_eq!(reread_sequence, cart_sequence);
    let item_a = reread
        .items
        .iter()
        .find(|i| i.product_id == product_a)
        .expect("snapshot of ProductA");
    assert_eq!(item_a.title, "ProductA");
    assert_eq!(item_a.price, 10.0);
    assert_eq!(item_a.quantity, 2);

    // Empty-cart checkout: zero-line-item order, the gateway is never called.
    let resp = order_service::checkout(
        &state,
        &shopper,
        CheckoutRequest {
            payment_token: "tok_visa".into(),
        },
    )
    .await?;
    let empty_order = resp.data.unwrap();
    assert!(empty_order.items.is_empty());
    assert_eq!(empty_order.order.total, 0.0);
    assert_eq!(empty_order.order.payment_status, payment_status::PAID);
    assert_eq!(gateway.recorded().len(), 2);

    // Order history is user-scoped and newest-first.
    let history = order_service::list_orders(
        &state,
        &shopper,
        Pagination {
            page: None,
            per_page: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(history.items.len(), 3);
    assert_eq!(history.items[0].id, empty_order.order.id);

    // Invoice: same bytes to the response and to durable storage.
    let response = invoice_service::stream_invoice(&state, &shopper, order.id).await?;
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/pdf"
    );
    let disposition = response
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()?;
    assert_eq!(
        disposition,
        format!("inline; filename=\"invoice-{}.pdf\"", order.id)
    );

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    let rendered = String::from_utf8_lossy(&body);
    assert!(rendered.starts_with("%PDF-"));
    assert!(rendered.ends_with("%%EOF\n"));
    assert!(rendered.contains(&format!("Order Number: {}", order.id)));
    assert!(rendered.contains("ProductA - 2 X $10.00 = $20.00"));
    assert!(rendered.contains("ProductB - 1 X $5.50 = $5.50"));
    assert!(rendered.contains("Total Price: $25.50"));

    let stored = tokio::fs::read(
        invoice_dir
            .path()
            .join(format!("invoice-{}.pdf", order.id)),
    )
    .await?;
    assert_eq!(stored, body.to_vec());

    // Someone else's order: PermissionDenied, never masked as NotFound.
    let err = invoice_service::stream_invoice(&state, &stranger, order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied));

    // A missing order is NotFound.
    let err = invoice_service::stream_invoice(&state, &shopper, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    Ok(())
}

async fn create_user(pool: &sqlx::PgPool, email: &str, name: &str) -> anyhow::Result<AuthUser> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, email, name, password_hash) VALUES ($1, $2, $3, 'dummy')")
        .bind(id)
        .bind(email)
        .bind(name)
        .execute(pool)
        .await?;
    Ok(AuthUser {
        user_id: id,
        name: name.to_string(),
        role: "user".to_string(),
    })
}

async fn create_product(
    state: &AppState,
    owner: &AuthUser,
    title: &str,
    price: f64,
) -> anyhow::Result<Uuid> {
    let resp = product_service::create_product(
        state,
        owner,
        CreateProductRequest {
            title: title.to_string(),
            description: Some(format!("{title} description")),
            price,
            image_url: None,
        },
    )
    .await?;
    Ok(resp.data.unwrap().id)
}

async fn add_to_cart(state: &AppState, user: &AuthUser, product_id: Uuid) -> anyhow::Result<()> {
    cart_service::add_to_cart(state, user, AddToCartRequest { product_id }).await?;
    Ok(())
}
