//! Image generation backend
//!
//! Prefers an authenticated Hugging Face call when a token is configured and
//! degrades to the unauthenticated Pollinations URL otherwise. Only the
//! fallback tier retries: a primary failure always falls through instead,
//! since retrying an auth or availability failure wastes time.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::ImageGenerationError;

pub const DEFAULT_PRIMARY_URL: &str =
    "https://router.huggingface.co/hf-inference/models/black-forest-labs/FLUX.1-schnell";
pub const DEFAULT_FALLBACK_BASE: &str = "https://image.pollinations.ai";

/// Prompts are hard-truncated to this many characters before URL-encoding
/// to keep the fallback GET URL within sane limits.
const MAX_PROMPT_CHARS: usize = 800;
const RETRY_BACKOFF: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Seam for the relay: tests substitute a stub, production uses
/// [`ImageGenerator`].
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Turn a prompt into a `data:<mime>;base64,<payload>` URI.
    async fn generate(&self, prompt: &str, max_retries: u32)
        -> Result<String, ImageGenerationError>;
}

pub struct ImageGenerator {
    client: reqwest::Client,
    hf_token: Option<String>,
    primary_url: String,
    fallback_base: String,
    retry_backoff: Duration,
}

impl ImageGenerator {
    pub fn new(hf_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            hf_token,
            primary_url: DEFAULT_PRIMARY_URL.to_string(),
            fallback_base: DEFAULT_FALLBACK_BASE.to_string(),
            retry_backoff: RETRY_BACKOFF,
        }
    }

    /// Override provider endpoints (env-driven in production, local stub
    /// servers in integration tests).
    pub fn with_endpoints(
        mut self,
        primary_url: impl Into<String>,
        fallback_base: impl Into<String>,
    ) -> Self {
        self.primary_url = primary_url.into();
        self.fallback_base = fallback_base.into();
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    async fn try_primary(&self, prompt: &str, token: &str) -> Result<String, ImageGenerationError> {
        let response = self
            .client
            .post(&self.primary_url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "inputs": prompt }))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ImageGenerationError::Status(response.status().as_u16()));
        }

        read_as_data_uri(response).await
    }

    fn fallback_url(&self, prompt: &str) -> String {
        let safe: String = prompt.chars().take(MAX_PROMPT_CHARS).collect();
        format!(
            "{}/prompt/{}?width=512&height=512&nologo=true&model=turbo",
            self.fallback_base,
            urlencoding::encode(&safe)
        )
    }

    async fn try_fallback(&self, prompt: &str) -> Result<String, ImageGenerationError> {
        let response = self
            .client
            .get(self.fallback_url(prompt))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ImageGenerationError::Status(response.status().as_u16()));
        }

        read_as_data_uri(response).await
    }
}

#[async_trait]
impl ImageBackend for ImageGenerator {
    async fn generate(
        &self,
        prompt: &str,
        max_retries: u32,
    ) -> Result<String, ImageGenerationError> {
        if let Some(token) = &self.hf_token {
            match self.try_primary(prompt, token).await {
                Ok(uri) => {
                    info!("image generated via primary provider");
                    return Ok(uri);
                }
                Err(err) => {
                    warn!(error = %err, "primary image provider failed, falling back");
                }
            }
        }

        let mut attempt = 0u32;
        loop {
            match self.try_fallback(prompt).await {
                Ok(uri) => {
                    info!(attempt, "image generated via fallback provider");
                    return Ok(uri);
                }
                Err(ImageGenerationError::Status(code)) if attempt < max_retries => {
                    attempt += 1;
                    warn!(attempt, max_retries, status = code, "fallback image provider failed, retrying");
                    tokio::time::sleep(self.retry_backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Wrap a successful image response body as a data URI. Content type comes
/// from the response header, defaulting to `image/jpeg`.
async fn read_as_data_uri(response: reqwest::Response) -> Result<String, ImageGenerationError> {
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("image/jpeg")
        .to_string();
    let bytes = response.bytes().await?;
    Ok(to_data_uri(&content_type, &bytes))
}

pub fn to_data_uri(content_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", content_type, BASE64.encode(bytes))
}
