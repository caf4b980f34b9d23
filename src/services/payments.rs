use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment gateway unreachable: {0}")]
    Transport(String),

    #[error("Payment gateway returned HTTP {0}")]
    Status(u16),

    #[error("Malformed payment gateway response: {0}")]
    Decode(String),
}

/// Result of asking the gateway to authorize the send fee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAuthorization {
    pub authorized: bool,
    pub reason: Option<String>,
}

impl PaymentAuthorization {
    pub fn approved() -> Self {
        Self {
            authorized: true,
            reason: None,
        }
    }

    pub fn declined(reason: impl Into<String>) -> Self {
        Self {
            authorized: false,
            reason: Some(reason.into()),
        }
    }
}

/// External payment collaborator. Settlement is out of scope; this crate
/// only consumes authorization results and emits release signals.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Authorize the one-time send fee for an offer. `amount_cents` is the
    /// fee, never the offer amount.
    async fn authorize_send(
        &self,
        offer_id: Uuid,
        amount_cents: i64,
    ) -> Result<PaymentAuthorization, PaymentError>;

    /// Signal that an approved milestone's payout may be released.
    async fn release_milestone(
        &self,
        deal_id: Uuid,
        milestone_id: Uuid,
        amount_cents: i64,
    ) -> Result<(), PaymentError>;
}

#[derive(Serialize)]
struct AuthorizeRequest {
    offer_id: Uuid,
    amount_cents: i64,
}

#[derive(Serialize)]
struct ReleaseRequest {
    deal_id: Uuid,
    milestone_id: Uuid,
    amount_cents: i64,
}

/// JSON-over-HTTP gateway client.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpPaymentGateway {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, PaymentError> {
        let url = format!("{}{path}", self.base_url);
        debug!("POST {url}");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| PaymentError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PaymentError::Status(status.as_u16()));
        }
        Ok(response)
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn authorize_send(
        &self,
        offer_id: Uuid,
        amount_cents: i64,
    ) -> Result<PaymentAuthorization, PaymentError> {
        self.post(
            "/authorizations",
            &AuthorizeRequest {
                offer_id,
                amount_cents,
            },
        )
        .await?
        .json::<PaymentAuthorization>()
        .await
        .map_err(|e| PaymentError::Decode(e.to_string()))
    }

    async fn release_milestone(
        &self,
        deal_id: Uuid,
        milestone_id: Uuid,
        amount_cents: i64,
    ) -> Result<(), PaymentError> {
        self.post(
            "/releases",
            &ReleaseRequest {
                deal_id,
                milestone_id,
                amount_cents,
            },
        )
        .await?;
        Ok(())
    }
}
