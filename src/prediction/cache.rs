use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

struct CacheEntry<T> {
    stored_at: DateTime<Utc>,
    value: T,
}

/// In-memory prediction cache keyed by match id. Every prediction costs
/// several upstream calls plus a model completion, so results are reused
/// within a freshness window instead of re-fetched from scratch.
pub struct PredictionCache<T> {
    entries: RwLock<HashMap<String, CacheEntry<T>>>,
    max_age: Duration,
}

impl<T: Clone> PredictionCache<T> {
    pub fn new(max_age: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_age,
        }
    }

    /// Returns the cached value when it is still inside the freshness
    /// window; stale entries are left in place and overwritten by the next
    /// store.
    pub async fn fresh(&self, key: &str) -> Option<T> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if Utc::now() - entry.stored_at <= self.max_age {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    pub async fn store(&self, key: &str, value: T) {
        self.entries.write().await.insert(
            key.to_string(),
            CacheEntry {
                stored_at: Utc::now(),
                value,
            },
        );
    }

    pub async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}
