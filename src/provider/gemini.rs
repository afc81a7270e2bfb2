//! Gemini provider client
//!
//! Speaks the generateContent / streamGenerateContent REST API directly,
//! including function-calling declarations and the forced-tool
//! (`mode: "ANY"`) configuration.

use futures::StreamExt;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;

use async_trait::async_trait;

use super::{ChatRequest, ChatResponse, Chunk, MessageRole, Provider, ToolCall, ToolMode};
use crate::error::ProviderError;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Gemini client for the relay's `Provider` interface
pub struct GeminiClient {
    client: HttpClient,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: HttpClient::new(),
            api_key,
            model,
        }
    }

    fn url(&self, method: &str, sse: bool) -> String {
        let alt = if sse { "alt=sse&" } else { "" };
        format!(
            "{}/{}:{}?{}key={}",
            GEMINI_API_BASE, self.model, method, alt, self.api_key
        )
    }

    /// Build Gemini contents from a chat request
    fn build_contents(request: &ChatRequest) -> Vec<GeminiContent> {
        let mut contents = Vec::new();

        for msg in &request.history {
            let role = match msg.role {
                MessageRole::User => "user",
                MessageRole::Assistant => "model",
            };
            contents.push(GeminiContent {
                role: role.to_string(),
                parts: vec![GeminiPart::Text {
                    text: msg.content.clone(),
                }],
            });
        }

        // Current turn: message text plus the optional inline image
        let mut parts = vec![GeminiPart::Text {
            text: request.message.clone(),
        }];
        if let Some(image) = &request.inline_image {
            parts.push(GeminiPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: image.mime_type.clone(),
                    data: image.data.clone(),
                },
            });
        }
        contents.push(GeminiContent {
            role: "user".to_string(),
            parts,
        });

        contents
    }

    fn build_request(request: &ChatRequest) -> GeminiRequest {
        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(vec![GeminiTool {
                function_declarations: request
                    .tools
                    .iter()
                    .map(|t| GeminiFunctionDeclaration {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.parameters.clone(),
                    })
                    .collect(),
            }])
        };

        let tool_config = match request.tool_mode {
            ToolMode::Any => Some(GeminiToolConfig {
                function_calling_config: GeminiFunctionCallingConfig {
                    mode: "ANY".to_string(),
                    allowed_function_names: request.tools.iter().map(|t| t.name.clone()).collect(),
                },
            }),
            ToolMode::Auto => None,
        };

        GeminiRequest {
            contents: Self::build_contents(request),
            system_instruction: request.system.clone().map(|s| GeminiSystemInstruction {
                parts: vec![GeminiTextPart { text: s }],
            }),
            tools,
            tool_config,
        }
    }
}

#[async_trait]
impl Provider for GeminiClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let api_request = Self::build_request(&request);

        let response = self
            .client
            .post(self.url("generateContent", false))
            .json(&api_request)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(Some(status), body));
        }

        let api_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::new(None, e.to_string()))?;

        if let Some(error) = &api_response.error {
            return Err(ProviderError::new(error.code, error.message.clone()));
        }

        Ok(parse_response(&api_response))
    }

    async fn stream(
        &self,
        request: ChatRequest,
    ) -> Result<mpsc::Receiver<Result<Chunk, ProviderError>>, ProviderError> {
        let api_request = Self::build_request(&request);

        let response = self
            .client
            .post(self.url("streamGenerateContent", true))
            .json(&api_request)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(Some(status), body));
        }

        let (tx, rx) = mpsc::channel(100);

        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(bytes) = stream.next().await {
                match bytes {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));

                        // Parse SSE events line by line
                        while let Some(line_end) = buffer.find('\n') {
                            let line = buffer[..line_end].to_string();
                            buffer = buffer[line_end + 1..].to_string();

                            let Some(data) = line.strip_prefix("data: ") else {
                                continue;
                            };
                            if let Ok(response) = serde_json::from_str::<GeminiResponse>(data) {
                                if tx.send(Ok(classify_response(&response))).await.is_err() {
                                    // Receiver dropped: the relay stopped
                                    // consuming, abandon the rest.
                                    return;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(ProviderError::from(e))).await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }

    fn name(&self) -> &'static str {
        "Gemini"
    }
}

/// Classify one wire chunk into the relay's tagged union.
///
/// Any function call wins over text: only the first call is kept, later
/// calls and co-located text are discarded.
fn classify_response(response: &GeminiResponse) -> Chunk {
    let Some(candidate) = response
        .candidates
        .as_ref()
        .and_then(|c| c.first())
    else {
        return Chunk::Empty;
    };

    if let Some(fc) = candidate
        .content
        .parts
        .iter()
        .find_map(|p| p.function_call.as_ref())
    {
        return Chunk::ToolCall(ToolCall {
            name: fc.name.clone(),
            args: fc.args.clone(),
        });
    }

    let text: String = candidate
        .content
        .parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect();

    if text.is_empty() {
        Chunk::Empty
    } else {
        Chunk::Text { text }
    }
}

/// Parse a complete response: concatenated text plus the first function
/// call, when present.
fn parse_response(response: &GeminiResponse) -> ChatResponse {
    let mut text = String::new();
    let mut tool_call = None;

    if let Some(candidate) = response.candidates.as_ref().and_then(|c| c.first()) {
        for part in &candidate.content.parts {
            if let Some(t) = &part.text {
                text.push_str(t);
            }
            if let Some(fc) = &part.function_call {
                if tool_call.is_none() {
                    tool_call = Some(ToolCall {
                        name: fc.name.clone(),
                        args: fc.args.clone(),
                    });
                }
            }
        }
    }

    ChatResponse { text, tool_call }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
    #[serde(rename = "toolConfig", skip_serializing_if = "Option::is_none")]
    tool_config: Option<GeminiToolConfig>,
}

#[derive(Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiTextPart>,
}

#[derive(Serialize)]
struct GeminiTextPart {
    text: String,
}

#[derive(Serialize, Clone)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Clone)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Serialize, Clone)]
struct GeminiInlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GeminiTool {
    #[serde(rename = "functionDeclarations")]
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Serialize)]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Serialize)]
struct GeminiToolConfig {
    #[serde(rename = "functionCallingConfig")]
    function_calling_config: GeminiFunctionCallingConfig,
}

#[derive(Serialize)]
struct GeminiFunctionCallingConfig {
    mode: String,
    #[serde(rename = "allowedFunctionNames")]
    allowed_function_names: Vec<String>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContentResponse,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
struct GeminiPartResponse {
    text: Option<String>,
    #[serde(rename = "functionCall")]
    function_call: Option<GeminiFunctionCallResponse>,
}

#[derive(Deserialize)]
struct GeminiFunctionCallResponse {
    name: String,
    args: Value,
}

#[derive(Deserialize)]
struct GeminiError {
    code: Option<u16>,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{image_tool, InlineImage, Message};

    fn wire(json: &str) -> GeminiResponse {
        serde_json::from_str(json).expect("valid wire json")
    }

    #[test]
    fn classify_text_chunk() {
        let response = wire(r#"{"candidates":[{"content":{"parts":[{"text":"Hi"}]}}]}"#);
        assert_eq!(
            classify_response(&response),
            Chunk::Text { text: "Hi".into() }
        );
    }

    #[test]
    fn classify_concatenates_text_parts() {
        let response =
            wire(r#"{"candidates":[{"content":{"parts":[{"text":"Hi "},{"text":"there"}]}}]}"#);
        assert_eq!(
            classify_response(&response),
            Chunk::Text {
                text: "Hi there".into()
            }
        );
    }

    #[test]
    fn classify_tool_call_discards_text() {
        let response = wire(
            r#"{"candidates":[{"content":{"parts":[
                {"text":"Sure, generating"},
                {"functionCall":{"name":"generate_image","args":{"prompt":"a cat"}}}
            ]}}]}"#,
        );
        let Chunk::ToolCall(call) = classify_response(&response) else {
            panic!("expected tool call");
        };
        assert_eq!(call.name, "generate_image");
        assert_eq!(call.args["prompt"], "a cat");
    }

    #[test]
    fn classify_first_call_wins() {
        let response = wire(
            r#"{"candidates":[{"content":{"parts":[
                {"functionCall":{"name":"generate_image","args":{"prompt":"first"}}},
                {"functionCall":{"name":"generate_image","args":{"prompt":"second"}}}
            ]}}]}"#,
        );
        let Chunk::ToolCall(call) = classify_response(&response) else {
            panic!("expected tool call");
        };
        assert_eq!(call.args["prompt"], "first");
    }

    #[test]
    fn classify_empty_chunk() {
        assert_eq!(classify_response(&wire(r#"{}"#)), Chunk::Empty);
        assert_eq!(
            classify_response(&wire(r#"{"candidates":[{"content":{"parts":[]}}]}"#)),
            Chunk::Empty
        );
    }

    #[test]
    fn parse_response_takes_first_call() {
        let response = wire(
            r#"{"candidates":[{"content":{"parts":[
                {"text":"caption"},
                {"functionCall":{"name":"generate_image","args":{"prompt":"a dog"}}}
            ]}}]}"#,
        );
        let parsed = parse_response(&response);
        assert_eq!(parsed.text, "caption");
        assert_eq!(parsed.tool_call.unwrap().args["prompt"], "a dog");
    }

    #[test]
    fn build_contents_maps_history_and_image() {
        let request = ChatRequest {
            message: "What is this?".into(),
            history: vec![
                Message {
                    role: MessageRole::User,
                    content: "Hello".into(),
                },
                Message {
                    role: MessageRole::Assistant,
                    content: "Hi there!".into(),
                },
            ],
            system: None,
            inline_image: Some(InlineImage {
                data: "AAAA".into(),
                mime_type: "image/jpeg".into(),
            }),
            tools: vec![],
            tool_mode: ToolMode::Auto,
        };

        let contents = GeminiClient::build_contents(&request);
        assert_eq!(contents.len(), 3); // 2 history + 1 current
        assert_eq!(contents[0].role, "user");
        assert_eq!(contents[1].role, "model");
        assert_eq!(contents[2].role, "user");
        assert_eq!(contents[2].parts.len(), 2); // text + inline image
    }

    #[test]
    fn forced_mode_serializes_any_config() {
        let mut request = ChatRequest::text("buatkan gambar kucing");
        request.tools = vec![image_tool()];
        request.tool_mode = ToolMode::Any;

        let wire = GeminiClient::build_request(&request);
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["toolConfig"]["functionCallingConfig"]["mode"], "ANY");
        assert_eq!(
            json["toolConfig"]["functionCallingConfig"]["allowedFunctionNames"][0],
            "generate_image"
        );
        assert_eq!(
            json["tools"][0]["functionDeclarations"][0]["name"],
            "generate_image"
        );
    }

    #[test]
    fn auto_mode_omits_tool_config() {
        let mut request = ChatRequest::text("hello");
        request.tools = vec![image_tool()];

        let json = serde_json::to_value(GeminiClient::build_request(&request)).unwrap();
        assert!(json.get("toolConfig").is_none());
    }
}
