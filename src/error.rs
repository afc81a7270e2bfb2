// src/error.rs
// Error taxonomy shared across the relay: upstream LLM failures and
// image-pipeline failures are distinct types because their retry and
// surfacing policies differ.

/// Upstream LLM provider failure. Never retried by the client itself;
/// the HTTP layer maps it to a status code via the `is_*` probes.
#[derive(Debug, Clone, thiserror::Error)]
#[error("provider error: {message}")]
pub struct ProviderError {
    /// HTTP status from the upstream, when one was received.
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Upstream free-tier quota exhaustion. The upstream does not report
    /// this uniformly, so the message is string-matched as well.
    pub fn is_quota(&self) -> bool {
        self.status == Some(429) || self.message.contains("429")
    }

    /// Invalid or expired API key.
    pub fn is_invalid_key(&self) -> bool {
        self.status == Some(400)
            || self.message.contains("400")
            || self.message.contains("API key not valid")
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        Self {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

/// Image generation failure. Only `Status` errors on the fallback tier are
/// retried; transport errors propagate immediately.
#[derive(Debug, thiserror::Error)]
pub enum ImageGenerationError {
    #[error("image provider returned status {0}")]
    Status(u16),

    #[error("image request failed: {0}")]
    Network(#[from] reqwest::Error),
}
