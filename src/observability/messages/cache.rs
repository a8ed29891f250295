// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for module cache events.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A cache lookup returned a payload with a matching fingerprint.
///
/// # Log Level
/// `debug!` - High-frequency operational event
pub struct CacheHit<'a> {
    pub key: &'a str,
}

impl Display for CacheHit<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Module cache hit: {}", self.key)
    }
}

impl StructuredLog for CacheHit<'_> {
    fn log(&self) {
        tracing::debug!(key = self.key, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(tracing::Level::DEBUG, "span_name", name = name, key = self.key)
    }
}

/// A cache lookup missed, or hit with a stale fingerprint.
///
/// # Log Level
/// `debug!` - High-frequency operational event
pub struct CacheMiss<'a> {
    pub key: &'a str,
    pub stale: bool,
}

impl Display for CacheMiss<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.stale {
            write!(f, "Module cache fingerprint mismatch, recompiling: {}", self.key)
        } else {
            write!(f, "Module cache miss: {}", self.key)
        }
    }
}

impl StructuredLog for CacheMiss<'_> {
    fn log(&self) {
        tracing::debug!(key = self.key, stale = self.stale, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::DEBUG,
            "span_name",
            name = name,
            key = self.key,
            stale = self.stale,
        )
    }
}

/// A cache backend operation failed and was recovered locally.
///
/// # Log Level
/// `warn!` - Degraded but recovered
pub struct CacheDegraded<'a> {
    pub key: &'a str,
    pub operation: &'a str,
    pub error: &'a str,
}

impl Display for CacheDegraded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Cache {} failed for {}, continuing without it: {}",
            self.operation, self.key, self.error
        )
    }
}

impl StructuredLog for CacheDegraded<'_> {
    fn log(&self) {
        tracing::warn!(
            key = self.key,
            operation = self.operation,
            error = self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::WARN,
            "span_name",
            name = name,
            key = self.key,
            operation = self.operation,
        )
    }
}
