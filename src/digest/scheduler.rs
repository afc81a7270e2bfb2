//! Hourly digest scheduler
//!
//! Runs on an interval; each pass generates digests for every user
//! scheduled at the current UTC hour. Per-user failures are logged and
//! skipped so one bad topic never stalls the loop.

use async_trait::async_trait;
use chrono::{Timelike, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::{generate_digest, Digest};
use crate::provider::Provider;

/// Pause between users to stay under provider rate limits.
const PER_USER_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct UserSettings {
    pub user_id: String,
    pub topic: String,
    pub custom_prompt: Option<String>,
    pub digest_enabled: bool,
    /// Delivery hour in UTC (0-23).
    pub digest_time_utc: u32,
}

impl UserSettings {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            topic: "Teknologi".to_string(),
            custom_prompt: None,
            digest_enabled: false,
            digest_time_utc: 8,
        }
    }
}

/// Schedule lookup and digest persistence. Real storage is a collaborator
/// concern; the in-memory implementation backs tests and single-node runs.
#[async_trait]
pub trait DigestStore: Send + Sync {
    async fn users_for_hour(&self, hour: u32) -> Vec<UserSettings>;
    async fn get_user(&self, user_id: &str) -> Option<UserSettings>;
    async fn save_user(&self, settings: UserSettings);
    async fn save_digest(&self, user_id: &str, digest: Digest);
    async fn digests_for(&self, user_id: &str) -> Vec<Digest>;
}

#[derive(Default)]
pub struct InMemoryDigestStore {
    users: RwLock<HashMap<String, UserSettings>>,
    digests: RwLock<HashMap<String, Vec<Digest>>>,
}

impl InMemoryDigestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DigestStore for InMemoryDigestStore {
    async fn users_for_hour(&self, hour: u32) -> Vec<UserSettings> {
        self.users
            .read()
            .await
            .values()
            .filter(|u| u.digest_enabled && u.digest_time_utc == hour)
            .cloned()
            .collect()
    }

    async fn get_user(&self, user_id: &str) -> Option<UserSettings> {
        self.users.read().await.get(user_id).cloned()
    }

    async fn save_user(&self, settings: UserSettings) {
        self.users
            .write()
            .await
            .insert(settings.user_id.clone(), settings);
    }

    async fn save_digest(&self, user_id: &str, digest: Digest) {
        self.digests
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .push(digest);
    }

    async fn digests_for(&self, user_id: &str) -> Vec<Digest> {
        self.digests
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }
}

/// Seconds until the next top of the hour; passes run at :00 like the
/// original delivery schedule.
fn until_next_hour(now: chrono::DateTime<Utc>) -> Duration {
    let elapsed = u64::from(now.minute()) * 60 + u64::from(now.second());
    Duration::from_secs(3600 - elapsed.min(3599))
}

/// Spawn the background digest task.
pub fn spawn_digest_scheduler(
    provider: Arc<dyn Provider>,
    store: Arc<dyn DigestStore>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("digest scheduler started, checking every hour at :00");
        loop {
            tokio::time::sleep(until_next_hour(Utc::now())).await;
            let hour = Utc::now().hour();
            let delivered = run_digest_cycle(provider.as_ref(), store.as_ref(), hour).await;
            if delivered > 0 {
                info!(hour, delivered, "digest delivery complete");
            }
        }
    })
}

/// One scheduler pass for the given UTC hour. Returns how many digests
/// were generated and stored.
pub async fn run_digest_cycle(
    provider: &dyn Provider,
    store: &dyn DigestStore,
    hour: u32,
) -> usize {
    let users = store.users_for_hour(hour).await;
    if users.is_empty() {
        return 0;
    }
    info!(hour, users = users.len(), "hourly digest check");

    let mut delivered = 0;
    for user in &users {
        match generate_digest(provider, &user.topic, user.custom_prompt.as_deref()).await {
            Ok(digest) => {
                store.save_digest(&user.user_id, digest).await;
                delivered += 1;
            }
            Err(err) => {
                warn!(user = %user.user_id, error = %err, "failed to generate digest");
            }
        }
        tokio::time::sleep(PER_USER_PAUSE).await;
    }

    delivered
}
