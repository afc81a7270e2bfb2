//! Shared stubs for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::mpsc;

use monox::error::{ImageGenerationError, ProviderError};
use monox::image::ImageBackend;
use monox::provider::{ChatRequest, ChatResponse, Chunk, Provider, ToolCall};

/// Provider stub that replays a scripted chunk sequence (streaming) or a
/// fixed response (non-streaming), recording every request it is handed.
pub struct StubProvider {
    chunks: Vec<Result<Chunk, ProviderError>>,
    response: Option<Result<ChatResponse, ProviderError>>,
    fail_open: Option<ProviderError>,
    pub seen: Mutex<Vec<ChatRequest>>,
}

impl StubProvider {
    pub fn streaming(chunks: Vec<Result<Chunk, ProviderError>>) -> Self {
        Self {
            chunks,
            response: None,
            fail_open: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn completing(response: ChatResponse) -> Self {
        Self {
            chunks: Vec::new(),
            response: Some(Ok(response)),
            fail_open: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: ProviderError) -> Self {
        Self {
            chunks: Vec::new(),
            response: Some(Err(err.clone())),
            fail_open: Some(err),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn text_response(text: &str) -> Self {
        Self::completing(ChatResponse {
            text: text.to_string(),
            tool_call: None,
        })
    }

    pub fn tool_response(prompt: &str) -> Self {
        Self::completing(ChatResponse {
            text: String::new(),
            tool_call: Some(ToolCall {
                name: "generate_image".to_string(),
                args: serde_json::json!({ "prompt": prompt }),
            }),
        })
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for StubProvider {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.seen.lock().unwrap().push(request);
        self.response
            .clone()
            .unwrap_or_else(|| Err(ProviderError::new(None, "stub has no scripted response")))
    }

    async fn stream(
        &self,
        request: ChatRequest,
    ) -> Result<mpsc::Receiver<Result<Chunk, ProviderError>>, ProviderError> {
        self.seen.lock().unwrap().push(request);
        if let Some(err) = &self.fail_open {
            return Err(err.clone());
        }

        let (tx, rx) = mpsc::channel(16);
        let chunks = self.chunks.clone();
        tokio::spawn(async move {
            for chunk in chunks {
                if tx.send(chunk).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Image backend stub returning a fixed data URI or a fixed failure.
pub struct StubImage {
    result: Result<String, u16>,
    pub calls: Mutex<Vec<(String, u32)>>,
}

impl StubImage {
    pub fn ok(uri: &str) -> Self {
        Self {
            result: Ok(uri.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            result: Err(status),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageBackend for StubImage {
    async fn generate(
        &self,
        prompt: &str,
        max_retries: u32,
    ) -> Result<String, ImageGenerationError> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), max_retries));
        match &self.result {
            Ok(uri) => Ok(uri.clone()),
            Err(status) => Err(ImageGenerationError::Status(*status)),
        }
    }
}

pub fn text_chunk(text: &str) -> Result<Chunk, ProviderError> {
    Ok(Chunk::Text {
        text: text.to_string(),
    })
}

pub fn tool_chunk(name: &str, prompt: &str) -> Result<Chunk, ProviderError> {
    Ok(Chunk::ToolCall(ToolCall {
        name: name.to_string(),
        args: serde_json::json!({ "prompt": prompt }),
    }))
}
