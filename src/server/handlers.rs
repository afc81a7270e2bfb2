//! HTTP handlers for the chat relay endpoints

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
};
use chrono::Utc;
use futures::stream::Stream;
use serde_json::{json, Value};
use std::convert::Infallible;

use super::types::{ChatApiRequest, ChatApiResponse, DigestApiRequest, ErrorResponse};
use super::AppState;
use crate::digest::{self, UserSettings};
use crate::error::ProviderError;
use crate::provider::InlineImage;
use crate::relay::{self, ChatOutcome, RelayEvent, RelayRequest};

const QUOTA_MESSAGE: &str =
    "Semua model Gemini (Free Tier) telah mencapai batas. Silakan ganti API Key di file .env.";
const INVALID_KEY_MESSAGE: &str =
    "API Key tidak valid atau sudah expired. Mohon ganti di file .env.";

/// Health check endpoint
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Chat relay backend is running",
        "timestamp": Utc::now().to_rfc3339(),
        "model": state.model_id,
        "geminiConnected": true,
    }))
}

/// Strip a `data:image/...;base64,` prefix; raw base64 passes through.
fn inline_image_from_uri(uri: &str) -> InlineImage {
    let data = uri
        .split_once(";base64,")
        .map(|(_, data)| data)
        .unwrap_or(uri);
    InlineImage {
        data: data.to_string(),
        mime_type: "image/jpeg".to_string(),
    }
}

fn to_relay_request(request: &ChatApiRequest, vision_default: &str) -> RelayRequest {
    let message = match request.message.as_deref() {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => vision_default.to_string(),
    };
    RelayRequest {
        message,
        history: request
            .history
            .iter()
            .filter_map(|entry| entry.to_message())
            .collect(),
        inline_image: request.image_uri.as_deref().map(inline_image_from_uri),
        system_instruction: request.system_instruction.clone(),
    }
}

fn provider_error_response(err: ProviderError) -> Response {
    let (status, error, message) = if err.is_quota() {
        (
            StatusCode::TOO_MANY_REQUESTS,
            "Quota Exceeded",
            QUOTA_MESSAGE.to_string(),
        )
    } else if err.is_invalid_key() {
        (
            StatusCode::BAD_REQUEST,
            "Invalid API Key",
            INVALID_KEY_MESSAGE.to_string(),
        )
    } else {
        let message = if err.message.is_empty() {
            "Failed to process message".to_string()
        } else {
            err.message.clone()
        };
        (StatusCode::INTERNAL_SERVER_ERROR, "Server Error", message)
    };

    tracing::error!(status = %status, "provider call failed: {}", err.message);

    (
        status,
        Json(ErrorResponse {
            success: false,
            error: error.to_string(),
            message,
            details: Some(err.message),
        }),
    )
        .into_response()
}

/// Non-streaming chat endpoint
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatApiRequest>,
) -> Response {
    if request.message.as_deref().unwrap_or("").is_empty() && request.image_uri.is_none() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                success: false,
                error: "Bad Request".to_string(),
                message: "Message or image is required".to_string(),
                details: None,
            }),
        )
            .into_response();
    }

    let relay_request = to_relay_request(&request, "What do you see in this image?");

    match relay::run_complete(
        state.provider.as_ref(),
        state.images.as_ref(),
        relay_request,
    )
    .await
    {
        Ok(ChatOutcome::Text { text }) => Json(ChatApiResponse {
            success: true,
            response: text,
            image_url: None,
            is_image_generation: None,
            model_id: Some(state.model_id.clone()),
            timestamp: Utc::now().to_rfc3339(),
        })
        .into_response(),
        Ok(ChatOutcome::Image { text, image_url }) => Json(ChatApiResponse {
            success: true,
            response: text,
            image_url: Some(image_url),
            is_image_generation: Some(true),
            model_id: Some(state.model_id.clone()),
            timestamp: Utc::now().to_rfc3339(),
        })
        .into_response(),
        // Image failures stay conversational: a 200 with an apologetic
        // reply, not a transport error.
        Ok(ChatOutcome::ImageFailed { text }) => Json(ChatApiResponse {
            success: true,
            response: text,
            image_url: None,
            is_image_generation: None,
            model_id: None,
            timestamp: Utc::now().to_rfc3339(),
        })
        .into_response(),
        Err(err) => provider_error_response(err),
    }
}

/// SSE streaming chat endpoint
pub async fn chat_stream_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatApiRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let relay_request = to_relay_request(&request, "What is this?");
    let provider = state.provider.clone();
    let images = state.images.clone();

    let stream = async_stream::stream! {
        let mut events = relay::run_stream(provider, images, relay_request);
        while let Some(event) = events.recv().await {
            match event {
                RelayEvent::Text { text } => {
                    yield Ok(Event::default().data(json!({ "text": text }).to_string()));
                }
                RelayEvent::Image { text, image_url } => {
                    yield Ok(Event::default().data(
                        json!({
                            "text": text,
                            "imageUrl": image_url,
                            "isImageGeneration": true
                        })
                        .to_string(),
                    ));
                }
                RelayEvent::Error { message } => {
                    yield Ok(Event::default().data(json!({ "error": message }).to_string()));
                }
                RelayEvent::Done => {
                    yield Ok(Event::default().data("[DONE]"));
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Manual digest trigger; creates default settings for unknown users.
pub async fn digest_handler(
    State(state): State<AppState>,
    Json(request): Json<DigestApiRequest>,
) -> Response {
    let mut settings = state
        .digests
        .get_user(&request.user_id)
        .await
        .unwrap_or_else(|| UserSettings::new(&request.user_id));

    if let Some(topic) = request.topic {
        settings.topic = topic;
    }
    if let Some(prompt) = request.custom_prompt {
        settings.custom_prompt = Some(prompt);
    }
    state.digests.save_user(settings.clone()).await;

    match digest::generate_digest(
        state.provider.as_ref(),
        &settings.topic,
        settings.custom_prompt.as_deref(),
    )
    .await
    {
        Ok(digest) => {
            state.digests.save_digest(&request.user_id, digest.clone()).await;
            Json(digest).into_response()
        }
        Err(err) => provider_error_response(err),
    }
}
