use axum::{extract::FromRequestParts, http::header};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use crate::{dto::auth::Claims, error::AppError};

/// Identity supplied by the session collaborator. The core trusts it
/// without re-validating credentials; `name` is denormalized onto orders
/// at checkout.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub name: String,
    pub role: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;
    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::Validation("Missing Authorization header".into()))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::Validation("Invalid Authorization header".into()))?;

        if !auth_str.starts_with("Bearer ") {
            return Err(AppError::Validation("Invalid Authorization scheme".into()));
        }
        let token = auth_str.trim_start_matches("Bearer ").trim();

        let secret = std::env::var("JWT_SECRET")
            .map_err(|_| AppError::Internal(anyhow::anyhow!("JWT_SECRET is not set")))?;

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AppError::Validation("Invalid or expired token".into()))?;

        let user_id = Uuid::parse_str(&decoded.claims.sub)
            .map_err(|_| AppError::Validation("Invalid user id in token".into()))?;

        Ok(AuthUser {
            user_id,
            name: decoded.claims.name.clone(),
            role: decoded.claims.role.clone(),
        })
    }
}
