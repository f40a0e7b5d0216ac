//! ==============================================================================
//! cache.rs - timed cache with background pre-warm
//! ==============================================================================
//!
//! purpose:
//!     keeps flattened api results around between http requests so every page
//!     of a data table doesn't re-walk the whole backend pagination.
//!
//! lifecycle of an entry (age measured from its last successful fetch):
//!
//!     0 ────────── timeout - window ────────── timeout ──────────►
//!        Fresh                    Refreshing              Expired
//!     (serve as-is)     (serve as-is, start one         (fetch inline)
//!                        background refresh)
//!
//!     every store sweeps out expired entries. past `max_entries` keys the
//!     oldest entry is dropped, so request-supplied keys can't grow the map
//!     without bound.
//!
//! relationships:
//!     - used by: server.rs (machine list + per-machine telemetry)
//!
//! ==============================================================================

use anyhow::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::config::CacheConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Refreshing,
    Expired,
}

#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub timeout: Duration,
    pub prewarm_window: Duration,
    pub max_entries: usize,
}

impl CachePolicy {
    pub fn classify(&self, age: Duration) -> Freshness {
        if age >= self.timeout {
            Freshness::Expired
        } else if age >= self.timeout.saturating_sub(self.prewarm_window) {
            Freshness::Refreshing
        } else {
            Freshness::Fresh
        }
    }
}

impl From<&CacheConfig> for CachePolicy {
    fn from(cfg: &CacheConfig) -> Self {
        Self {
            timeout: Duration::from_secs(cfg.timeout_seconds),
            prewarm_window: Duration::from_secs(cfg.prewarm_window_seconds),
            max_entries: cfg.max_entries,
        }
    }
}

struct CacheEntry<T> {
    data: T,
    fetched_at: Instant,
    /// a background refresh is in flight
    refreshing: bool,
}

pub struct TimedCache<T> {
    policy: CachePolicy,
    entries: RwLock<HashMap<String, CacheEntry<T>>>,
}

impl<T> TimedCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(policy: CachePolicy) -> Arc<Self> {
        Arc::new(Self { policy, entries: RwLock::new(HashMap::new()) })
    }

    /// serve `key` from cache, or run `fetch` when the entry is missing or
    /// expired. entries inside the pre-warm window are served immediately
    /// while `fetch` runs on a spawned task.
    pub async fn get_or_fetch<F, Fut>(self: &Arc<Self>, key: &str, fetch: F) -> Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        {
            let mut entries = self.entries.write().await;
            if let Some(entry) = entries.get_mut(key) {
                match self.policy.classify(entry.fetched_at.elapsed()) {
                    Freshness::Fresh => return Ok(entry.data.clone()),
                    Freshness::Refreshing => {
                        if !entry.refreshing {
                            entry.refreshing = true;
                            self.spawn_refresh(key.to_string(), fetch);
                        }
                        return Ok(entry.data.clone());
                    }
                    Freshness::Expired => {}
                }
            }
        }

        tracing::debug!("[CACHE] Miss for {}", key);
        let data = fetch().await?;
        self.store(key, data.clone()).await;
        Ok(data)
    }

    fn spawn_refresh<F, Fut>(self: &Arc<Self>, key: String, fetch: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        tracing::debug!("[CACHE] Pre-warming {}", key);
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            match fetch().await {
                Ok(data) => cache.store(&key, data).await,
                Err(e) => {
                    tracing::warn!("[CACHE] Background refresh of {} failed: {:#}", key, e);
                    if let Some(entry) = cache.entries.write().await.get_mut(&key) {
                        entry.refreshing = false;
                    }
                }
            }
        });
    }

    async fn store(&self, key: &str, data: T) {
        let mut entries = self.entries.write().await;

        let timeout = self.policy.timeout;
        let before = entries.len();
        entries.retain(|k, entry| k == key || entry.fetched_at.elapsed() < timeout);
        let expired = before - entries.len();
        if expired > 0 {
            tracing::debug!("[CACHE] Evicted {} expired entries", expired);
        }

        if !entries.contains_key(key) {
            while entries.len() >= self.policy.max_entries.max(1) {
                let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.fetched_at)
                    .map(|(k, _)| k.clone())
                else {
                    break;
                };
                tracing::debug!("[CACHE] Full, dropping {}", oldest);
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key.to_string(),
            CacheEntry { data, fetched_at: Instant::now(), refreshing: false },
        );
    }

    pub async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}
