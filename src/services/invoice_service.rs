use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::header;
use axum::response::Response;
use futures_util::stream;
use tokio::fs::File;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    invoice,
    invoice::sink::{ChannelSink, FanoutWriter, FileSink},
    middleware::auth::AuthUser,
    models::{Order, OrderItem},
    state::AppState,
};

const STORAGE_WRITE_TIMEOUT: Duration = Duration::from_secs(10);
const STREAM_BUFFER_CHUNKS: usize = 16;

/// Global lookup, then ownership check. A foreign order is reported as
/// PermissionDenied, never collapsed into NotFound.
pub async fn load_order_for_user(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<(Order, Vec<OrderItem>)> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_optional(&state.pool)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };
    if order.user_id != user.user_id {
        return Err(AppError::PermissionDenied);
    }

    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT * FROM order_items WHERE order_id = $1 ORDER BY line_no",
    )
    .bind(order.id)
    .fetch_all(&state.pool)
    .await?;

    Ok((order, items))
}

/// Render the invoice once, streaming the same bytes to durable storage
/// and the live response. The sinks fail independently: a disconnected
/// client stops only the response stream, the file still completes; a
/// partial file from a generation error is non-authoritative and gets
/// regenerated on the next request.
pub async fn stream_invoice(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<Response> {
    let (order, items) = load_order_for_user(state, user, order_id).await?;
    let document = invoice::build_document(&order, &items);

    tokio::fs::create_dir_all(&state.invoice_dir)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    let path = state.invoice_dir.join(invoice::file_name(order.id));

    let (tx, rx) = mpsc::channel::<Bytes>(STREAM_BUFFER_CHUNKS);
    tokio::spawn(async move {
        let mut out = FanoutWriter::new();
        out.push(Box::new(ChannelSink::new(tx)));
        match File::create(&path).await {
            Ok(file) => out.push(Box::new(FileSink::new(file, STORAGE_WRITE_TIMEOUT))),
            Err(err) => {
                tracing::warn!(error = %err, path = %path.display(), "invoice file sink unavailable");
            }
        }
        if let Err(err) = document.write_to(&mut out).await {
            tracing::warn!(order_id = %order_id, error = %err, "invoice generation aborted mid-stream");
        }
        for err in out.finish().await {
            tracing::warn!(order_id = %order_id, error = %err, "invoice sink failed");
        }
    });

    let body = Body::from_stream(stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|chunk| (Ok::<_, std::convert::Infallible>(chunk), rx))
    }));

    let response = Response::builder()
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"invoice-{order_id}.pdf\""),
        )
        .body(body)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    Ok(response)
}
