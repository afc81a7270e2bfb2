// src/config.rs
// All values load from the environment (.env supported); defaults match the
// hosted deployment so a bare `cargo run` comes up on port 3003.

use once_cell::sync::Lazy;
use std::str::FromStr;

use crate::image::{DEFAULT_FALLBACK_BASE, DEFAULT_PRIMARY_URL};

#[derive(Debug, Clone)]
pub struct AppConfig {
    // ── Provider Configuration
    pub google_api_key: String,
    pub gemini_model: String,

    // ── Image Generation
    pub huggingface_token: Option<String>,
    pub image_primary_url: String,
    pub image_fallback_base: String,

    // ── Server Configuration
    pub host: String,
    pub port: u16,

    // ── Digest Scheduler
    pub digest_scheduler: bool,
}

/// Parse an env var, falling back to `default` when missing or unparsable.
fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => match val.trim().parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                eprintln!("Config: {} = '{}' (parse failed, using default)", key, val);
                default
            }
        },
        Err(_) => default,
    }
}

/// Optional string env var; empty values count as unset.
fn env_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AppConfig {
    pub fn from_env() -> Self {
        if dotenvy::dotenv().is_err() {
            eprintln!("Warning: .env file not found. Using environment variables and defaults.");
        }

        Self {
            google_api_key: env_var("GOOGLE_API_KEY").unwrap_or_default(),
            gemini_model: env_var_or("GEMINI_MODEL", "gemini-1.5-flash".to_string()),
            huggingface_token: env_var("HUGGINGFACE_TOKEN"),
            image_primary_url: env_var_or("IMAGE_PRIMARY_URL", DEFAULT_PRIMARY_URL.to_string()),
            image_fallback_base: env_var_or("IMAGE_FALLBACK_BASE", DEFAULT_FALLBACK_BASE.to_string()),
            host: env_var_or("HOST", "0.0.0.0".to_string()),
            port: env_var_or("PORT", 3003),
            digest_scheduler: env_var_or("DIGEST_SCHEDULER", true),
        }
    }
}

pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);
