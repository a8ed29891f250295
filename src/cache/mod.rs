// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Module cache: fingerprint-tagged payloads with a TTL.
//!
//! The cache amortises Wasm compilation across invocations and across
//! deployments. It is an opaque store and its operations may fail; callers
//! recover failures locally (a failed `get` degrades to a miss, a failed
//! `put` is logged and swallowed). Fingerprint validation is the caller's
//! responsibility: an entry is only usable when its stored fingerprint
//! matches the expected one, otherwise it is treated as a miss and the
//! payload is rebuilt.
//!
//! Three key namespaces coexist:
//! * `wasm:<id>` - serialized compiled module of a Wasm deployment
//! * `js:<id>` - raw JS source bytes of a JS deployment
//! * `qjs-serialized` - the serialized JS interpreter engine, one per host

pub mod disk;
pub mod memory;

pub use disk::DiskCache;
pub use memory::MemoryCache;

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use crate::errors::Result;

/// One cache value: a payload tagged with the fingerprint of the artifact
/// bytes it was derived from.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub payload: Bytes,
}

impl CacheEntry {
    pub fn new(fingerprint: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            payload: payload.into(),
        }
    }
}

/// Backend-agnostic cache operations.
///
/// Writes are last-writer-wins per key; duplicate producers under contention
/// are tolerated because they write identical payloads.
#[async_trait]
pub trait ModuleCache: Send + Sync {
    /// Look up an entry. `Ok(None)` is a miss; `Err` means the backend is
    /// degraded and the caller should also treat it as a miss.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Store an entry with the given TTL.
    async fn put(&self, key: &str, entry: CacheEntry, ttl: Duration) -> Result<()>;
}
