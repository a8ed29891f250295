// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::errors::{Error, Result};

/// Immutable bag-of-bytes storage for artifacts, keyed by an opaque locator.
///
/// A failed or missing read surfaces as `ArtifactUnavailable`; the pipeline
/// aborts the invocation on it.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Bytes>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn exists(&self, key: &str) -> Result<bool>;
}

/// In-memory object store.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Bytes>>> {
        self.objects
            .lock()
            .map_err(|_| Error::artifact("<store>", "object store lock poisoned"))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<()> {
        self.lock()?.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        self.lock()?
            .get(key)
            .cloned()
            .ok_or_else(|| Error::artifact(key, "not found"))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.contains_key(key))
    }
}

/// Filesystem object store: one file per key under a root directory.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| Error::artifact(root.display().to_string(), e))?;
        Ok(Self { root })
    }

    fn object_path(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
            .collect();
        self.root.join(name)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<()> {
        tokio::fs::write(self.object_path(key), &bytes)
            .await
            .map_err(|e| Error::artifact(key, e))
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        tokio::fs::read(self.object_path(key))
            .await
            .map(Bytes::from)
            .map_err(|e| Error::artifact(key, e))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.object_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::artifact(key, e)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.object_path(key).exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn memory_store_round_trips() {
        let store = MemoryObjectStore::new();
        store
            .put("abc.wasm", Bytes::from_static(b"\0asm"))
            .await
            .unwrap();
        assert!(store.exists("abc.wasm").await.unwrap());
        assert_eq!(store.get("abc.wasm").await.unwrap(), Bytes::from_static(b"\0asm"));

        store.delete("abc.wasm").await.unwrap();
        assert!(!store.exists("abc.wasm").await.unwrap());
    }

    #[tokio::test]
    async fn memory_store_missing_key_is_artifact_unavailable() {
        let store = MemoryObjectStore::new();
        let err = store.get("ghost.js").await.unwrap_err();
        assert!(matches!(err, Error::ArtifactUnavailable { .. }));
    }

    #[tokio::test]
    async fn fs_store_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path()).unwrap();

        store
            .put("deploy-1.js", Bytes::from_static(b"respond(200)"))
            .await
            .unwrap();
        assert!(store.exists("deploy-1.js").await.unwrap());
        assert_eq!(
            store.get("deploy-1.js").await.unwrap(),
            Bytes::from_static(b"respond(200)")
        );

        store.delete("deploy-1.js").await.unwrap();
        assert!(!store.exists("deploy-1.js").await.unwrap());
        // Deleting an absent key is not an error.
        store.delete("deploy-1.js").await.unwrap();
    }

    #[tokio::test]
    async fn fs_store_missing_key_is_artifact_unavailable() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path()).unwrap();
        let err = store.get("nope.wasm").await.unwrap_err();
        assert!(matches!(err, Error::ArtifactUnavailable { .. }));
    }
}
