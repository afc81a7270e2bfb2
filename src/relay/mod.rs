//! Stream relay orchestrator
//!
//! Pulls chunks from the provider stream and demultiplexes them into text
//! deltas or a single tool invocation. On tool invocation the provider
//! stream is abandoned (not drained), the image backend runs, and exactly
//! one image or error event is emitted. Every invocation terminates with
//! exactly one `Done`, whichever branch was taken.

mod intent;

pub use intent::{is_image_intent, IMAGE_INTENT_KEYWORDS};

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::ProviderError;
use crate::image::ImageBackend;
use crate::provider::{image_tool, ChatRequest, Chunk, InlineImage, Message, Provider, ToolCall, ToolMode};

/// Default system instruction; a per-request custom instruction replaces it.
pub const SYSTEM_INSTRUCTION: &str = "\
You are Monox AI, a smart assistant with the ability to Generate Images.
- When a user asks to CREATE, DRAW, or GENERATE an image, you MUST use the 'generate_image' tool.
- Do NOT refuse to generate images.
- If the user's prompt is simple (e.g., \"draw a cat\"), OPTIMIZE it to be descriptive (e.g., \"a cute fluffy persian cat sitting on a velvet sofa, warm lighting, realistic style\").
- Identify the user's language. If they ask in Indonesian, answer in Indonesian, but keep the image prompt in English for best quality.";

const GENERATE_IMAGE_TOOL: &str = "generate_image";

/// Retry budget for the non-streaming path.
pub const DEFAULT_IMAGE_RETRIES: u32 = 3;
/// The streaming path trades retries for latency the user is watching.
const STREAM_IMAGE_RETRIES: u32 = 1;

/// One relay invocation's input.
#[derive(Debug, Clone, Default)]
pub struct RelayRequest {
    pub message: String,
    pub history: Vec<Message>,
    pub inline_image: Option<InlineImage>,
    pub system_instruction: Option<String>,
}

/// Events emitted to the caller, in order. The caller accumulates `Text`
/// deltas into a running message; `Image` and `Error` are terminal for
/// their branch; `Done` always closes the sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    Text { text: String },
    Image { text: String, image_url: String },
    Error { message: String },
    Done,
}

/// Outcome of the non-streaming path.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    Text { text: String },
    Image { text: String, image_url: String },
    /// Image generation failed; surfaced as a conversational reply rather
    /// than a transport error so the client always renders something.
    ImageFailed { text: String },
}

fn build_provider_request(request: &RelayRequest, tool_mode: ToolMode) -> ChatRequest {
    ChatRequest {
        message: request.message.clone(),
        history: request.history.clone(),
        system: Some(
            request
                .system_instruction
                .clone()
                .unwrap_or_else(|| SYSTEM_INSTRUCTION.to_string()),
        ),
        inline_image: request.inline_image.clone(),
        tools: vec![image_tool()],
        tool_mode,
    }
}

fn tool_mode_for(message: &str) -> ToolMode {
    if is_image_intent(message) {
        ToolMode::Any
    } else {
        ToolMode::Auto
    }
}

pub fn image_caption(prompt: &str) -> String {
    format!("Here is your image of \"{prompt}\"")
}

fn prompt_of(call: &ToolCall) -> &str {
    call.args
        .get("prompt")
        .and_then(Value::as_str)
        .unwrap_or_default()
}

/// Run one streaming relay invocation.
///
/// Spawns the pump and returns the event receiver; the caller forwards
/// events to its transport. Dropping the receiver mid-stream stops the
/// pump at its next send.
pub fn run_stream(
    provider: Arc<dyn Provider>,
    images: Arc<dyn ImageBackend>,
    request: RelayRequest,
) -> mpsc::Receiver<RelayEvent> {
    let (tx, rx) = mpsc::channel(100);

    tokio::spawn(async move {
        pump(provider.as_ref(), images.as_ref(), request, &tx).await;
        // Always terminates the sequence, error branches included.
        let _ = tx.send(RelayEvent::Done).await;
    });

    rx
}

async fn pump(
    provider: &dyn Provider,
    images: &dyn ImageBackend,
    request: RelayRequest,
    tx: &mpsc::Sender<RelayEvent>,
) {
    let tool_mode = tool_mode_for(&request.message);
    info!(
        provider = provider.name(),
        forced = tool_mode == ToolMode::Any,
        "opening provider stream"
    );

    let mut chunks = match provider.stream(build_provider_request(&request, tool_mode)).await {
        Ok(chunks) => chunks,
        Err(err) => {
            let _ = tx
                .send(RelayEvent::Error {
                    message: err.to_string(),
                })
                .await;
            return;
        }
    };

    while let Some(item) = chunks.recv().await {
        match item {
            Ok(Chunk::ToolCall(call)) => {
                // Stop pulling: the rest of the provider stream is
                // abandoned, not drained. Dropping `chunks` on return lets
                // the provider's pump task exit at its next send.
                handle_tool_call(images, &call, tx).await;
                return;
            }
            Ok(Chunk::Text { text }) if !text.is_empty() => {
                let _ = tx.send(RelayEvent::Text { text }).await;
            }
            Ok(_) => {}
            Err(err) => {
                let _ = tx
                    .send(RelayEvent::Error {
                        message: err.to_string(),
                    })
                    .await;
                return;
            }
        }
    }
}

async fn handle_tool_call(
    images: &dyn ImageBackend,
    call: &ToolCall,
    tx: &mpsc::Sender<RelayEvent>,
) {
    if call.name != GENERATE_IMAGE_TOOL {
        warn!(tool = %call.name, "ignoring undeclared tool call");
        return;
    }

    let prompt = prompt_of(call);
    info!(prompt, "generating image for streamed tool call");

    match images.generate(prompt, STREAM_IMAGE_RETRIES).await {
        Ok(image_url) => {
            let _ = tx
                .send(RelayEvent::Image {
                    text: image_caption(prompt),
                    image_url,
                })
                .await;
        }
        Err(err) => {
            let _ = tx
                .send(RelayEvent::Error {
                    message: format!("Gagal membuat gambar: {err}"),
                })
                .await;
        }
    }
}

/// Run one non-streaming relay invocation.
///
/// Provider errors propagate to the transport for status mapping; image
/// failures downgrade to a conversational `ImageFailed` reply.
pub async fn run_complete(
    provider: &dyn Provider,
    images: &dyn ImageBackend,
    request: RelayRequest,
) -> Result<ChatOutcome, ProviderError> {
    let tool_mode = tool_mode_for(&request.message);
    let response = provider
        .complete(build_provider_request(&request, tool_mode))
        .await?;

    if let Some(call) = &response.tool_call {
        if call.name == GENERATE_IMAGE_TOOL {
            let prompt = prompt_of(call);
            info!(prompt, "generating image for tool call");

            return Ok(match images.generate(prompt, DEFAULT_IMAGE_RETRIES).await {
                Ok(image_url) => ChatOutcome::Image {
                    text: image_caption(prompt),
                    image_url,
                },
                Err(err) => ChatOutcome::ImageFailed {
                    text: format!("Maaf, saya gagal membuat gambar. Error: {err}"),
                },
            });
        }
        warn!(tool = %call.name, "ignoring undeclared tool call");
    }

    Ok(ChatOutcome::Text {
        text: response.text,
    })
}
