//! Cloudinary media store client.
//!
//! Product images arrive either as hosted URLs (stored as given) or as
//! `data:` URIs, which are uploaded here and replaced with the returned
//! `secure_url`. Requests are signed with the API secret as Cloudinary's
//! upload API requires.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::instrument;

use crate::config::CloudinaryConfig;

/// Folder that product images are uploaded into.
pub const PRODUCT_FOLDER: &str = "products";

/// Errors from the media store.
#[derive(Debug, Error)]
pub enum MediaError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API rejected the request.
    #[error("media API error ({status}): {message}")]
    Api {
        status: reqwest::StatusCode,
        message: String,
    },

    /// Response body was not the expected JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// An uploaded image.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedImage {
    pub secure_url: String,
    pub public_id: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Client for the Cloudinary upload API.
#[derive(Clone)]
pub struct MediaStore {
    inner: Arc<MediaStoreInner>,
}

struct MediaStoreInner {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    api_secret: SecretString,
}

impl MediaStore {
    /// Create a new media store client.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::Http` if the HTTP client cannot be built.
    pub fn new(config: &CloudinaryConfig) -> Result<Self, MediaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(MediaStoreInner {
                client,
                endpoint: format!(
                    "https://api.cloudinary.com/v1_1/{}/image",
                    config.cloud_name
                ),
                api_key: config.api_key.clone(),
                api_secret: config.api_secret.clone(),
            }),
        })
    }

    /// Upload a `data:` URI into [`PRODUCT_FOLDER`].
    ///
    /// # Errors
    ///
    /// Returns `MediaError` if the request fails or is rejected.
    #[instrument(skip(self, data_uri), fields(bytes = data_uri.len()))]
    pub async fn upload(&self, data_uri: &str) -> Result<UploadedImage, MediaError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signed = [("folder", PRODUCT_FOLDER), ("timestamp", timestamp.as_str())];
        let signature = self.sign(&signed);

        let form = [
            ("file", data_uri),
            ("folder", PRODUCT_FOLDER),
            ("timestamp", timestamp.as_str()),
            ("api_key", self.inner.api_key.as_str()),
            ("signature", signature.as_str()),
            ("signature_algorithm", "sha256"),
        ];

        let response = self
            .inner
            .client
            .post(format!("{}/upload", self.inner.endpoint))
            .form(&form)
            .send()
            .await?;

        let uploaded: UploadedImage = parse_response(response).await?;
        tracing::info!(public_id = %uploaded.public_id, "Image uploaded");
        Ok(uploaded)
    }

    /// Delete an uploaded image by public ID.
    ///
    /// # Errors
    ///
    /// Returns `MediaError` if the request fails or is rejected.
    #[instrument(skip(self))]
    pub async fn destroy(&self, public_id: &str) -> Result<(), MediaError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signed = [("public_id", public_id), ("timestamp", timestamp.as_str())];
        let signature = self.sign(&signed);

        let form = [
            ("public_id", public_id),
            ("timestamp", timestamp.as_str()),
            ("api_key", self.inner.api_key.as_str()),
            ("signature", signature.as_str()),
            ("signature_algorithm", "sha256"),
        ];

        let response = self
            .inner
            .client
            .post(format!("{}/destroy", self.inner.endpoint))
            .form(&form)
            .send()
            .await?;

        let _: serde_json::Value = parse_response(response).await?;
        Ok(())
    }

    fn sign(&self, params: &[(&str, &str)]) -> String {
        sign_params(params, self.inner.api_secret.expose_secret())
    }
}

/// Cloudinary request signature: parameters sorted by name, joined as
/// `k=v&k=v`, with the secret appended, hashed with SHA-256.
fn sign_params(params: &[(&str, &str)], secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_unstable_by_key(|(key, _)| *key);

    let joined = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    format!("{:x}", Sha256::digest(format!("{joined}{secret}").as_bytes()))
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, MediaError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map_or(body, |parsed| parsed.error.message);
        return Err(MediaError::Api { status, message });
    }

    Ok(serde_json::from_str(&body)?)
}

/// Whether an image field should be uploaded rather than stored as given.
#[must_use]
pub fn is_data_uri(image: &str) -> bool {
    image.starts_with("data:")
}

/// Derive the public ID of an image hosted in [`PRODUCT_FOLDER`] from its URL.
///
/// `https://res.cloudinary.com/demo/image/upload/v1/products/abc123.jpg`
/// yields `products/abc123`.
#[must_use]
pub fn public_id_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let file = path.rsplit('/').next()?;
    let stem = file.split('.').next()?;
    if stem.is_empty() {
        return None;
    }
    Some(format!("{PRODUCT_FOLDER}/{stem}"))
}
