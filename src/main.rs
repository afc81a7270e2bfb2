// src/main.rs

use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use monox::config::CONFIG;
use monox::digest::{spawn_digest_scheduler, DigestStore, InMemoryDigestStore};
use monox::image::{ImageBackend, ImageGenerator};
use monox::provider::{GeminiClient, Provider};
use monox::server::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting chat relay backend");
    info!("Model: {}", CONFIG.gemini_model);
    if CONFIG.google_api_key.is_empty() {
        warn!("GOOGLE_API_KEY is not set, provider calls will fail");
    }
    info!(
        "Image primary: {}",
        if CONFIG.huggingface_token.is_some() {
            "enabled"
        } else {
            "disabled (fallback only)"
        }
    );

    let provider: Arc<dyn Provider> = Arc::new(GeminiClient::new(
        CONFIG.google_api_key.clone(),
        CONFIG.gemini_model.clone(),
    ));
    let images: Arc<dyn ImageBackend> = Arc::new(
        ImageGenerator::new(CONFIG.huggingface_token.clone()).with_endpoints(
            CONFIG.image_primary_url.clone(),
            CONFIG.image_fallback_base.clone(),
        ),
    );
    let digests: Arc<dyn DigestStore> = Arc::new(InMemoryDigestStore::new());

    let state = AppState {
        provider: provider.clone(),
        images,
        digests: digests.clone(),
        model_id: CONFIG.gemini_model.clone(),
    };

    let server = server::run(state, &CONFIG.host, CONFIG.port);

    if CONFIG.digest_scheduler {
        let scheduler = spawn_digest_scheduler(provider, digests);
        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("Server error: {e}");
                }
            }
            _ = scheduler => {
                error!("Digest scheduler unexpectedly terminated");
            }
        }
    } else if let Err(e) = server.await {
        error!("Server error: {e}");
    }

    Ok(())
}
