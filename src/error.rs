use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::payment::PaymentError;
use crate::response::{ApiResponse, Meta};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Storage error")]
    Storage(#[from] sqlx::Error),

    #[error("Payment failed: {0}")]
    Payment(#[from] PaymentError),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::PermissionDenied => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            AppError::Payment(_) => (StatusCode::PAYMENT_REQUIRED, self.to_string()),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = ApiResponse {
            message,
            data: Some(ErrorData {
                error: self.to_string(),
            }),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_error_taxonomy() {
        assert_eq!(
            AppError::NotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Validation("page".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::PermissionDenied.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Payment(PaymentError::Declined("card_declined".into()))
                .into_response()
                .status(),
            StatusCode::PAYMENT_REQUIRED
        );
    }
}
