// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Message types for diagnostic and operational logging follow a struct-based
//! pattern with a `Display` implementation plus the [`messages::StructuredLog`]
//! trait, so call sites emit both a human-readable line and machine-readable
//! fields without magic strings scattered through the codebase.
//!
//! Messages are organized by subsystem:
//! * `messages::cache` - module cache hits, misses, and degradations
//! * `messages::runtime` - session lifecycle and guest execution events

pub mod messages;

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber for binaries.
///
/// Filtering defaults to `info` and is overridable via `RUST_LOG`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
