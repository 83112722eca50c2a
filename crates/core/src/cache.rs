use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Debug)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// Time-bounded memo of generated affiliate links, keyed by the input URL.
///
/// One instance is shared by every resolution in the process. The lock is
/// only held for map operations, never across an await point.
#[derive(Debug)]
pub struct ResolutionCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ResolutionCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self { entries: Mutex::new(HashMap::new()), default_ttl }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let mut entries = self.lock();

        match entries.get(key) {
            Some(entry) if now < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Stores `value` under `key`. TTLs longer than [`MAX_TTL`] are capped.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) {
        let Some(expires_at) = Instant::now().checked_add(ttl.min(MAX_TTL)) else {
            debug!(event_name = "engine.cache.store_skipped", "cache expiry is not representable");
            return;
        };
        self.lock().insert(key.into(), CacheEntry { value: value.into(), expires_at });
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        before - entries.len()
    }

    /// Counts stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        // Entries are plain values, so a panic mid-insert cannot leave the map inconsistent.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs [`ResolutionCache::evict_expired`] on a fixed interval until the
/// returned handle is aborted. Intervals below [`MIN_SWEEP_INTERVAL`] are raised to it.
pub fn spawn_sweeper(cache: Arc<ResolutionCache>, interval: Duration) -> JoinHandle<()> {
    let interval = interval.max(MIN_SWEEP_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let evicted = cache.evict_expired();
            if evicted > 0 {
                debug!(
                    event_name = "engine.cache.swept",
                    evicted,
                    remaining = cache.len(),
                    "evicted expired resolution cache entries"
                );
            }
        }
    })
}
