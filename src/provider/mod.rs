//! Provider abstraction for the chat relay
//!
//! Gemini is the only concrete backend, but the relay and every test drive
//! the `Provider` trait so the orchestration never touches wire types.

mod gemini;

pub use gemini::GeminiClient;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::ProviderError;

/// Unified provider trait for LLM backends
#[async_trait]
pub trait Provider: Send + Sync {
    /// Create a non-streaming chat completion
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Create a streaming chat completion.
    ///
    /// The receiver yields chunks in provider arrival order; the sequence is
    /// finite and single-pass. Dropping the receiver abandons the stream
    /// without draining it.
    async fn stream(
        &self,
        request: ChatRequest,
    ) -> Result<mpsc::Receiver<Result<Chunk, ProviderError>>, ProviderError>;

    /// Get the provider name for logging
    fn name(&self) -> &'static str;
}

/// One chat invocation. Immutable once built.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<Message>,
    pub system: Option<String>,
    pub inline_image: Option<InlineImage>,
    pub tools: Vec<ToolDefinition>,
    pub tool_mode: ToolMode,
}

impl ChatRequest {
    /// Plain text request with no tools, history, or system override.
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
            system: None,
            inline_image: None,
            tools: Vec::new(),
            tool_mode: ToolMode::Auto,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
}

/// Base64 image payload attached to a vision request.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub data: String,
    pub mime_type: String,
}

/// Function-calling mode for one invocation.
///
/// `Any` constrains the model to the declared tools and forces it to call
/// one of them; the relay selects it when user intent is unambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolMode {
    #[default]
    Auto,
    Any,
}

#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// The single tool this service declares. The model fills `prompt` with an
/// enhanced description of the image to generate.
pub fn image_tool() -> ToolDefinition {
    ToolDefinition {
        name: "generate_image".to_string(),
        description: "Generate an image based on a text description. Use this when user asks \
                      to create, generate, draw, make, or visualize an image. Examples: \
                      'buatkan gambar kucing', 'generate a sunset', 'create an image of robot'."
            .to_string(),
        parameters: serde_json::json!({
            "type": "OBJECT",
            "properties": {
                "prompt": {
                    "type": "STRING",
                    "description": "Detailed and optimized description of the image to generate. \
                                    Enhance user's vague descriptions with artistic details. \
                                    ENGLISH is preferred for better results."
                }
            },
            "required": ["prompt"]
        }),
    }
}

/// A structured call the model emitted for one of the declared tools.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub args: Value,
}

/// One streamed unit, classified at the wire boundary so the relay's state
/// machine never inspects provider payloads.
///
/// A wire chunk carrying any function call classifies as `ToolCall` using
/// the first call only; later calls in the same chunk and any co-located
/// text are discarded. That first-call-wins policy mirrors the provider
/// contract of at most one relevant call per stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    Text { text: String },
    ToolCall(ToolCall),
    Empty,
}

/// Complete (non-streaming) provider response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub text: String,
    /// First function call in the response, when the model chose a tool.
    pub tool_call: Option<ToolCall>,
}
