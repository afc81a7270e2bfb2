//! Digest cycle behavior with scripted providers and the in-memory store

mod common;

use std::sync::Arc;

use common::StubProvider;
use monox::digest::{run_digest_cycle, DigestStore, InMemoryDigestStore, UserSettings};
use monox::error::ProviderError;

fn scheduled_user(user_id: &str, hour: u32, topic: &str) -> UserSettings {
    let mut settings = UserSettings::new(user_id);
    settings.digest_enabled = true;
    settings.digest_time_utc = hour;
    settings.topic = topic.to_string();
    settings
}

#[tokio::test]
async fn cycle_generates_for_users_scheduled_this_hour() {
    let provider = Arc::new(StubProvider::text_response("ringkasan berita"));
    let store = InMemoryDigestStore::new();

    store.save_user(scheduled_user("a", 8, "Teknologi")).await;
    store.save_user(scheduled_user("b", 8, "Bisnis")).await;
    store.save_user(scheduled_user("c", 14, "Olahraga")).await;

    let delivered = run_digest_cycle(provider.as_ref(), &store, 8).await;

    assert_eq!(delivered, 2);
    assert_eq!(store.digests_for("a").await.len(), 1);
    assert_eq!(store.digests_for("b").await.len(), 1);
    assert!(store.digests_for("c").await.is_empty());
    assert_eq!(store.digests_for("a").await[0].content, "ringkasan berita");
}

#[tokio::test]
async fn cycle_with_no_scheduled_users_makes_no_provider_calls() {
    let provider = Arc::new(StubProvider::text_response("unused"));
    let store = InMemoryDigestStore::new();
    store.save_user(UserSettings::new("idle")).await; // disabled by default

    let delivered = run_digest_cycle(provider.as_ref(), &store, 8).await;

    assert_eq!(delivered, 0);
    assert!(provider.requests().is_empty());
}

#[tokio::test]
async fn provider_failure_skips_user_without_stalling_cycle() {
    let provider = Arc::new(StubProvider::failing(ProviderError::new(
        Some(500),
        "boom",
    )));
    let store = InMemoryDigestStore::new();
    store.save_user(scheduled_user("a", 8, "Teknologi")).await;

    let delivered = run_digest_cycle(provider.as_ref(), &store, 8).await;

    assert_eq!(delivered, 0);
    assert!(store.digests_for("a").await.is_empty());
}

#[tokio::test]
async fn custom_prompt_reaches_the_provider() {
    let provider = Arc::new(StubProvider::text_response("ok"));
    let store = InMemoryDigestStore::new();

    let mut user = scheduled_user("a", 8, "Teknologi");
    user.custom_prompt = Some("Summarize rust news".to_string());
    store.save_user(user).await;

    run_digest_cycle(provider.as_ref(), &store, 8).await;

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].message, "Summarize rust news");
    assert!(requests[0].tools.is_empty());
}
