//! Stripe payment gateway client.
//!
//! Talks to the REST API directly with `reqwest`: form-encoded requests,
//! bearer authentication with the secret key, JSON responses.

pub mod types;

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::instrument;

use crate::config::StripeConfig;

pub use types::{CheckoutSession, NewCheckoutSession, PaymentStatus, SessionLineItem, StripeCoupon};

const API_BASE: &str = "https://api.stripe.com/v1";

/// Errors from the payment gateway.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API rejected the request.
    #[error("Stripe API error ({status}): {message}")]
    Api {
        status: reqwest::StatusCode,
        message: String,
    },

    /// Response body was not the expected JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Client for the Stripe API.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

struct StripeClientInner {
    client: reqwest::Client,
    secret_key: SecretString,
    currency: String,
    api_base: String,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Http` if the HTTP client cannot be built.
    pub fn new(config: &StripeConfig) -> Result<Self, StripeError> {
        Self::with_api_base(config, API_BASE)
    }

    /// Create a client that talks to `api_base` instead of the live API.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Http` if the HTTP client cannot be built.
    pub fn with_api_base(config: &StripeConfig, api_base: &str) -> Result<Self, StripeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(StripeClientInner {
                client,
                secret_key: config.secret_key.clone(),
                currency: config.currency.clone(),
                api_base: api_base.trim_end_matches('/').to_string(),
            }),
        })
    }

    /// Create a single-use percentage coupon.
    ///
    /// # Errors
    ///
    /// Returns `StripeError` if the request fails or is rejected.
    #[instrument(skip(self))]
    pub async fn create_coupon(&self, percent_off: u8) -> Result<StripeCoupon, StripeError> {
        let form = [
            ("percent_off", percent_off.to_string()),
            ("duration", "once".to_string()),
        ];

        let response = self
            .inner
            .client
            .post(format!("{}/coupons", self.inner.api_base))
            .bearer_auth(self.inner.secret_key.expose_secret())
            .form(&form)
            .send()
            .await?;

        parse_response(response).await
    }

    /// Create a hosted checkout session.
    ///
    /// # Errors
    ///
    /// Returns `StripeError` if the request fails or is rejected.
    #[instrument(skip_all, fields(lines = session.line_items.len()))]
    pub async fn create_checkout_session(
        &self,
        session: &NewCheckoutSession,
    ) -> Result<CheckoutSession, StripeError> {
        let response = self
            .inner
            .client
            .post(format!("{}/checkout/sessions", self.inner.api_base))
            .bearer_auth(self.inner.secret_key.expose_secret())
            .form(&session.to_form(&self.inner.currency))
            .send()
            .await?;

        let created: CheckoutSession = parse_response(response).await?;
        tracing::info!(session_id = %created.id, "Checkout session created");
        Ok(created)
    }

    /// Retrieve a checkout session by ID.
    ///
    /// # Errors
    ///
    /// Returns `StripeError` if the request fails or is rejected.
    #[instrument(skip(self))]
    pub async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, StripeError> {
        let response = self
            .inner
            .client
            .get(format!("{}/checkout/sessions/{session_id}", self.inner.api_base))
            .bearer_auth(self.inner.secret_key.expose_secret())
            .send()
            .await?;

        parse_response(response).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, StripeError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<types::ApiErrorBody>(&body)
            .ok()
            .and_then(|parsed| parsed.error.message)
            .unwrap_or(body);
        tracing::warn!(%status, %message, "Stripe API error");
        return Err(StripeError::Api { status, message });
    }

    Ok(serde_json::from_str(&body)?)
}
