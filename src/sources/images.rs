/// Picture downloads for imported recipes
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use std::time::Duration;

const FALLBACK_CONTENT_TYPE: &str = "image/jpeg";

/// Fetches a picture and returns it as a base64 `data:` URI
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch_data_uri(&self, url: &str) -> AppResult<String>;
}

/// Downloads pictures over HTTP with a bounded timeout
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch_data_uri(&self, url: &str) -> AppResult<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Download(e.to_string()))?
            .error_for_status()
            .map_err(|e| AppError::Download(e.to_string()))?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::Download(e.to_string()))?;

        Ok(encode_data_uri(content_type.as_deref(), &bytes))
    }
}

/// `data:<type>;base64,<payload>` using the standard alphabet
pub fn encode_data_uri(content_type: Option<&str>, bytes: &[u8]) -> String {
    let content_type = content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
        .filter(|ct| !ct.is_empty())
        .unwrap_or(FALLBACK_CONTENT_TYPE);

    format!("data:{};base64,{}", content_type, STANDARD.encode(bytes))
}
