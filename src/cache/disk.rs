// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use prost::Message;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{CacheEntry, ModuleCache};
use crate::errors::{Error, Result};
use crate::proto::ModuleRecord;

/// Filesystem-backed cache.
///
/// Entries are stored as protobuf [`ModuleRecord`] files under one root
/// directory; expiry is enforced on lookup from the file's modification time
/// and the TTL recorded in the entry. Writes go through a temp file and a
/// rename so readers never observe a torn record.
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    /// Open (creating if needed) a cache rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| Error::CacheDegraded(format!("cache root unavailable: {e}")))?;
        Ok(Self { root })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        // Keys are flat ("wasm:<uuid>", "qjs-serialized"); keep them readable
        // on disk while staying filesystem-safe.
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
            .collect();
        self.root.join(format!("{name}.bin"))
    }

    fn degraded(op: &str, path: &Path, err: impl ToString) -> Error {
        Error::CacheDegraded(format!(
            "{op} {} failed: {}",
            path.display(),
            err.to_string()
        ))
    }
}

#[async_trait]
impl ModuleCache for DiskCache {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let path = self.entry_path(key);

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::degraded("stat", &path, e)),
        };

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::degraded("read", &path, e)),
        };

        let record = ModuleRecord::decode(&bytes[..])
            .map_err(|e| Self::degraded("decode", &path, e))?;

        let age = metadata
            .modified()
            .ok()
            .and_then(|mtime| mtime.elapsed().ok())
            .unwrap_or_default();
        if record.ttl_secs == 0 || age >= Duration::from_secs(record.ttl_secs) {
            let _ = tokio::fs::remove_file(&path).await;
            return Ok(None);
        }

        Ok(Some(CacheEntry::new(record.fingerprint, record.payload)))
    }

    async fn put(&self, key: &str, entry: CacheEntry, ttl: Duration) -> Result<()> {
        let path = self.entry_path(key);
        let record = ModuleRecord {
            fingerprint: entry.fingerprint,
            payload: entry.payload.to_vec(),
            ttl_secs: ttl.as_secs(),
        };

        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, record.encode_to_vec())
            .await
            .map_err(|e| Self::degraded("write", &tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| Self::degraded("rename", &path, e))?;
        Ok(())
    }
}
