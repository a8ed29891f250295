// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for session lifecycle and guest execution events.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A module was compiled and serialized for caching.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ModuleCompiled<'a> {
    pub key: &'a str,
    pub raw_bytes: usize,
    pub serialized_bytes: usize,
}

impl Display for ModuleCompiled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Compiled module {} ({} bytes raw, {} bytes serialized)",
            self.key, self.raw_bytes, self.serialized_bytes
        )
    }
}

impl StructuredLog for ModuleCompiled<'_> {
    fn log(&self) {
        tracing::info!(
            key = self.key,
            raw_bytes = self.raw_bytes,
            serialized_bytes = self.serialized_bytes,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::INFO,
            "span_name",
            name = name,
            key = self.key,
            raw_bytes = self.raw_bytes,
        )
    }
}

/// A guest finished executing.
///
/// # Log Level
/// `info!` - Important operational event
pub struct GuestCompleted<'a> {
    pub session_id: &'a str,
    pub stdout_bytes: usize,
    pub elapsed_ms: u64,
}

impl Display for GuestCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Guest {} completed in {}ms ({} bytes of output)",
            self.session_id, self.elapsed_ms, self.stdout_bytes
        )
    }
}

impl StructuredLog for GuestCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            session_id = self.session_id,
            stdout_bytes = self.stdout_bytes,
            elapsed_ms = self.elapsed_ms,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::INFO,
            "span_name",
            name = name,
            session_id = self.session_id,
        )
    }
}

/// A host-function call made on behalf of a guest failed.
///
/// # Log Level
/// `warn!` - Guest observes an opaque error, host keeps running
pub struct HostCallFailed<'a> {
    pub function: &'a str,
    pub reason: &'a str,
}

impl Display for HostCallFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}: {}", self.function, self.reason)
    }
}

impl StructuredLog for HostCallFailed<'_> {
    fn log(&self) {
        tracing::warn!(function = self.function, reason = self.reason, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::WARN,
            "span_name",
            name = name,
            function = self.function,
        )
    }
}
