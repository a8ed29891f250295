// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements:
//!
//! * `Display` - Human-readable output (supports future i18n)
//! * `StructuredLog` - Machine-readable fields + span creation
//!
//! # Usage
//!
//! ```rust
//! use emberhost::observability::messages::{StructuredLog, cache::CacheHit};
//!
//! CacheHit { key: "wasm:1234" }.log();
//! ```

pub mod cache;
pub mod runtime;

use tracing::Span;

/// Trait for messages that support structured logging and tracing.
///
/// `log` emits an event at the level appropriate to the message's semantic
/// meaning, carrying the message fields as structured attributes; `span`
/// creates a `tracing::Span` with the same fields for timing work.
pub trait StructuredLog {
    /// Emit a log event with structured fields.
    fn log(&self);

    /// Create a span with this message's fields as attributes.
    fn span(&self, name: &str) -> Span;
}
