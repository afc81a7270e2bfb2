//! Topic digest generation
//!
//! One non-streaming provider call per digest. Scheduling and the store
//! seam live in [`scheduler`].

mod scheduler;

pub use scheduler::{
    run_digest_cycle, spawn_digest_scheduler, DigestStore, InMemoryDigestStore, UserSettings,
};

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::error::ProviderError;
use crate::provider::{ChatRequest, Provider};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Digest {
    pub id: String,
    pub topic: String,
    pub content: String,
    pub generated_at: String,
    pub custom_prompt: Option<String>,
}

fn digest_prompt(topic: &str) -> String {
    format!(
        "Buatkan ringkasan berita terbaru tentang {topic} dalam bahasa Indonesia.\n\
         Berikan 3-5 berita penting dengan format:\n\n\
         🔹 **[Judul Berita]** - [Ringkasan 1-2 kalimat]\n\n\
         Tambahkan juga insight singkat tentang tren yang terlihat dari berita-berita tersebut.\n\n\
         Catatan: Gunakan informasi pengetahuan terkini untuk memberikan berita yang relevan."
    )
}

/// Generate one digest for a topic. A custom prompt replaces the default
/// template entirely.
pub async fn generate_digest(
    provider: &dyn Provider,
    topic: &str,
    custom_prompt: Option<&str>,
) -> Result<Digest, ProviderError> {
    let prompt = custom_prompt
        .map(str::to_string)
        .unwrap_or_else(|| digest_prompt(topic));

    tracing::info!(topic, "generating digest");
    let response = provider.complete(ChatRequest::text(prompt)).await?;
    tracing::info!(topic, chars = response.text.len(), "digest generated");

    Ok(Digest {
        id: format!("digest-{}", Uuid::new_v4()),
        topic: topic.to_string(),
        content: response.text,
        generated_at: Utc::now().to_rfc3339(),
        custom_prompt: custom_prompt.map(str::to_string),
    })
}
