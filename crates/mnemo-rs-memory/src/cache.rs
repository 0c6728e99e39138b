//! In-process TTL cache store.
//!
//! Entries are ephemeral by contract: expiry or loss is never data loss, and
//! an expired key reads as absent rather than an error.

use crate::adapter::{BackendAdapter, BackendKind, Capability};
use crate::error::BackendError;
use crate::model::CacheEntry;
use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

/// Default adapter name for the in-process cache.
const DEFAULT_NAME: &str = "memory-cache";

/// Cache key under which a record is primed after a durable write.
pub fn record_cache_key(id: Uuid) -> String {
    format!("record:{id}")
}

/// TTL key-value store over an in-process map.
pub struct InMemoryCacheStore {
    name: String,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryCacheStore {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        if removed > 0 {
            debug!("purged {removed} expired cache entries");
        }
        removed
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendAdapter for InMemoryCacheStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Cache
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::CacheKv]
    }

    async fn cache_put(&self, key: &str, entry: CacheEntry) -> Result<(), BackendError> {
        self.entries.write().insert(key.to_string(), entry);
        Ok(())
    }

    async fn cache_get(&self, key: &str) -> Result<Option<CacheEntry>, BackendError> {
        let now = Utc::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Expired entries are dropped lazily on access.
        self.entries.write().remove(key);
        Ok(None)
    }

    async fn cache_delete(&self, key: &str) -> Result<(), BackendError> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn count(&self) -> Result<usize, BackendError> {
        let now = Utc::now();
        Ok(self
            .entries
            .read()
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryCacheStore;
    use crate::adapter::BackendAdapter;
    use crate::model::CacheEntry;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn put_get_round_trips() {
        let cache = InMemoryCacheStore::new();
        let entry = CacheEntry::new(json!({"k": "v"}), Duration::from_secs(60));
        cache.cache_put("session", entry.clone()).await.expect("put");

        let loaded = cache.cache_get("session").await.expect("get");
        assert_eq!(loaded, Some(entry));
        assert_eq!(cache.count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn expired_entry_reads_as_absent() {
        let cache = InMemoryCacheStore::new();
        let entry = CacheEntry::new(json!("stale"), Duration::ZERO);
        cache.cache_put("gone", entry).await.expect("put");

        assert_eq!(cache.cache_get("gone").await.expect("get"), None);
        assert_eq!(cache.count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn missing_key_is_not_an_error() {
        let cache = InMemoryCacheStore::new();
        assert_eq!(cache.cache_get("absent").await.expect("get"), None);
    }

    #[tokio::test]
    async fn purge_removes_only_expired() {
        let cache = InMemoryCacheStore::new();
        cache
            .cache_put("live", CacheEntry::new(json!(1), Duration::from_secs(60)))
            .await
            .expect("put");
        cache
            .cache_put("stale", CacheEntry::new(json!(2), Duration::ZERO))
            .await
            .expect("put");

        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.cache_get("live").await.expect("get").is_some());
    }

    #[tokio::test]
    async fn overwrite_replaces_entry() {
        let cache = InMemoryCacheStore::new();
        cache
            .cache_put("key", CacheEntry::new(json!("old"), Duration::from_secs(60)))
            .await
            .expect("put");
        cache
            .cache_put("key", CacheEntry::new(json!("new"), Duration::from_secs(60)))
            .await
            .expect("put");

        let entry = cache.cache_get("key").await.expect("get").expect("present");
        assert_eq!(entry.value, json!("new"));
    }
}
