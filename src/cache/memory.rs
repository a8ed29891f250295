// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::cache::{CacheEntry, ModuleCache};
use crate::errors::{Error, Result};

struct StoredEntry {
    expires_at: Instant,
    entry: CacheEntry,
}

/// Process-local cache backend.
///
/// Useful for tests and single-process deployments; entries expire lazily on
/// lookup. A remote backend shared across hosts plugs in behind the same
/// [`ModuleCache`] trait.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, StoredEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries, for tests and diagnostics.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .map(|entries| {
                entries
                    .values()
                    .filter(|stored| stored.expires_at > now)
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ModuleCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| Error::CacheDegraded("cache lock poisoned".to_string()))?;
        match entries.get(key) {
            Some(stored) if stored.expires_at > Instant::now() => {
                Ok(Some(stored.entry.clone()))
            }
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, entry: CacheEntry, ttl: Duration) -> Result<()> {
        let stored = StoredEntry {
            expires_at: Instant::now() + ttl,
            entry,
        };
        self.entries
            .lock()
            .map_err(|_| Error::CacheDegraded("cache lock poisoned".to_string()))?
            .insert(key.to_string(), stored);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_returns_entry() {
        let cache = MemoryCache::new();
        let entry = CacheEntry::new("cafef00d", b"payload".to_vec());
        cache
            .put("wasm:abc", entry.clone(), Duration::from_secs(60))
            .await
            .unwrap();

        let got = cache.get("wasm:abc").await.unwrap().unwrap();
        assert_eq!(got, entry);
    }

    #[tokio::test]
    async fn missing_key_is_a_miss() {
        let cache = MemoryCache::new();
        assert!(cache.get("wasm:nothing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_entries_are_misses() {
        let cache = MemoryCache::new();
        cache
            .put(
                "js:short",
                CacheEntry::new("fp", b"src".to_vec()),
                Duration::from_millis(5),
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(cache.get("js:short").await.unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn last_writer_wins() {
        let cache = MemoryCache::new();
        cache
            .put(
                "wasm:k",
                CacheEntry::new("old", b"one".to_vec()),
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        cache
            .put(
                "wasm:k",
                CacheEntry::new("new", b"two".to_vec()),
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        let got = cache.get("wasm:k").await.unwrap().unwrap();
        assert_eq!(got.fingerprint, "new");
        assert_eq!(&got.payload[..], b"two");
    }
}
