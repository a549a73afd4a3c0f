//! Keyed list cache with a stale time. Fresh entries are served from
//! memory; stale or missing ones are refetched.
use std::future::Future;
use std::time::Duration;

use dashmap::DashMap;
use metrics::counter;
use tokio::time::Instant;
use tracing::debug;

use crate::error::AppError;
use crate::metrics::{CATALOG_CACHE_HIT, CATALOG_CACHE_MISS};

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    fetched_at: Instant,
}

#[derive(Debug)]
pub struct QueryCache<T> {
    entries: DashMap<String, CacheEntry<T>>,
    stale_time: Duration,
}

impl<T: Clone> QueryCache<T> {
    pub fn new(stale_time: Duration) -> Self {
        Self { entries: DashMap::new(), stale_time }
    }

    /// Cached value for `key` if still fresh
    pub fn get_fresh(&self, key: &str) -> Option<T> {
        let entry = self.entries.get(key)?;
        (entry.fetched_at.elapsed() < self.stale_time).then(|| entry.value.clone())
    }

    /// Serve `key` from the cache, or run `fetch` and remember its result.
    /// Errors are not cached.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<T, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        if let Some(value) = self.get_fresh(key) {
            counter!(CATALOG_CACHE_HIT, "key" => key.to_string()).increment(1);
            return Ok(value);
        }
        counter!(CATALOG_CACHE_MISS, "key" => key.to_string()).increment(1);
        debug!(key, "catalog cache miss");

        let value = fetch().await?;
        self.entries.insert(
            key.to_string(),
            CacheEntry { value: value.clone(), fetched_at: Instant::now() },
        );
        Ok(value)
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn invalidate_all(&self) {
        self.entries.clear();
    }
}
