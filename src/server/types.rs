//! HTTP request/response types for the relay API

use serde::{Deserialize, Serialize};

use crate::provider::{Message, MessageRole};

/// Chat request body, shared by the one-shot and streaming endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatApiRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    pub model_id: Option<String>,
    pub conversation_id: Option<String>,
    pub topic: Option<String>,
    /// Data URI or raw base64 of an attached image.
    pub image_uri: Option<String>,
    pub system_instruction: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

impl HistoryEntry {
    /// Map to a provider message; unknown roles are dropped.
    pub fn to_message(&self) -> Option<Message> {
        let role = match self.role.as_str() {
            "user" => MessageRole::User,
            "assistant" | "model" => MessageRole::Assistant,
            _ => return None,
        };
        Some(Message {
            role,
            content: self.content.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatApiResponse {
    pub success: bool,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_image_generation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Manual digest trigger body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestApiRequest {
    pub user_id: String,
    pub topic: Option<String>,
    pub custom_prompt: Option<String>,
}
