//! Time-bounded response cache.
//!
//! Entries are keyed by logical resource identity (`repo:{owner}/{name}`,
//! `tree:{owner}/{name}@{ref}`, `content:{owner}/{name}@{ref}:{path}`) and
//! expire a fixed TTL after insertion. Values are stored as JSON so one
//! cache serves every response type.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// A cached value and the moment it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: serde_json::Value,
    pub inserted_at: Instant,
}

impl CacheEntry {
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() < ttl
    }
}

/// Process-local TTL cache shared by all calls of one client.
pub struct TtlCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// A fresh value for `key`, decoded as `T`. Expired entries are evicted.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        {
            let entries = self.entries.read().unwrap();
            match entries.get(key) {
                Some(entry) if entry.is_fresh(self.ttl) => {
                    return serde_json::from_value(entry.value.clone()).ok();
                }
                Some(_) => {}
                None => return None,
            }
        }
        self.evict_stale(key);
        None
    }

    /// Remove `key` only if it is still expired under the write lock; a
    /// value inserted since the read check stays.
    fn evict_stale(&self, key: &str) {
        let mut entries = self.entries.write().unwrap();
        if entries.get(key).is_some_and(|e| !e.is_fresh(self.ttl)) {
            entries.remove(key);
        }
    }

    pub fn insert<T: Serialize>(&self, key: impl Into<String>, value: &T) {
        let Ok(value) = serde_json::to_value(value) else {
            return;
        };
        self.entries.write().unwrap().insert(
            key.into(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }
}

pub fn repo_key(owner: &str, name: &str) -> String {
    format!("repo:{}/{}", owner, name)
}

pub fn tree_key(owner: &str, name: &str, git_ref: &str) -> String {
    format!("tree:{}/{}@{}", owner, name, git_ref)
}

pub fn content_key(owner: &str, name: &str, git_ref: &str, path: &str) -> String {
    format!("content:{}/{}@{}:{}", owner, name, git_ref, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_within_ttl() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert(repo_key("acme", "app"), &vec![1, 2, 3]);
        let hit: Option<Vec<i32>> = cache.get("repo:acme/app");
        assert_eq!(hit, Some(vec![1, 2, 3]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_entry_is_evicted() {
        let cache = TtlCache::new(Duration::from_millis(0));
        cache.insert("k", &"v");
        let miss: Option<String> = cache.get("k");
        assert!(miss.is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_eviction_spares_value_refreshed_after_read() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let stale_at = Instant::now()
            .checked_sub(Duration::from_secs(120))
            .unwrap();
        cache.entries.write().unwrap().insert(
            "k".to_string(),
            CacheEntry {
                value: serde_json::json!("old"),
                inserted_at: stale_at,
            },
        );
        // A concurrent writer refreshes the key between the read check and eviction
        cache.insert("k", &"new");
        cache.evict_stale("k");
        let hit: Option<String> = cache.get("k");
        assert_eq!(hit.as_deref(), Some("new"));

        cache.entries.write().unwrap().get_mut("k").unwrap().inserted_at = stale_at;
        cache.evict_stale("k");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_keys_encode_resource_identity() {
        assert_eq!(tree_key("acme", "app", "main"), "tree:acme/app@main");
        assert_eq!(
            content_key("acme", "app", "v1", "src/index.ts"),
            "content:acme/app@v1:src/index.ts"
        );
    }
}
