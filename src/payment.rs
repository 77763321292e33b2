use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

const STRIPE_CHARGES_URL: &str = "https://api.stripe.com/v1/charges";

/// A charge request in minor currency units (integer cents). Amounts are
/// converted from decimal dollars exactly once, at submission time.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub source: String,
    pub order_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Charge {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("charge declined: {0}")]
    Declined(String),

    #[error("payment gateway error: {0}")]
    Gateway(String),
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        PaymentError::Gateway(err.to_string())
    }
}

/// Seam to the external payment collaborator. Once a charge request is
/// sent it is never retried or cancelled here.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: ChargeRequest) -> Result<Charge, PaymentError>;
}

/// Stripe Charges API client.
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(secret_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn charge(&self, request: ChargeRequest) -> Result<Charge, PaymentError> {
        let order_id = request.order_id.to_string();
        let amount = request.amount_minor.to_string();
        let params = [
            ("amount", amount.as_str()),
            ("currency", request.currency.as_str()),
            ("source", request.source.as_str()),
            ("description", "Storefront order"),
            ("metadata[order_id]", order_id.as_str()),
        ];

        let response = self
            .client
            .post(STRIPE_CHARGES_URL)
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let client_error = response.status().is_client_error();
            let body: StripeErrorBody = response.json().await?;
            let message = body
                .error
                .message
                .or(body.error.kind)
                .unwrap_or_else(|| "unknown gateway error".to_string());
            return Err(if client_error {
                PaymentError::Declined(message)
            } else {
                PaymentError::Gateway(message)
            });
        }

        let charge: Charge = response.json().await?;
        Ok(charge)
    }
}

/// Decimal dollars to integer cents, rounded once at the boundary.
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_cents_only_at_the_boundary() {
        assert_eq!(to_minor_units(25.50), 2550);
        assert_eq!(to_minor_units(0.0), 0);
        // Binary float accumulation: 0.1 + 0.2 must still land on 30 cents.
        assert_eq!(to_minor_units(0.1 + 0.2), 30);
        assert_eq!(to_minor_units(10.004), 1000);
        assert_eq!(to_minor_units(10.005), 1001);
    }
}
