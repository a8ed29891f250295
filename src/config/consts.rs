use std::time::Duration;

/// Default fuel budget per guest execution (2 billion instructions).
/// Large enough for the QuickJS interpreter to parse and run typical
/// handlers; exhaustion surfaces as a guest execution error.
pub const DEFAULT_FUEL_LIMIT: u64 = 2_000_000_000;

/// Maximum artifact size accepted for compilation (64 MiB).
pub const MAX_ARTIFACT_SIZE: usize = 64 * 1024 * 1024;

/// Capacity of the guest stdout capture buffer (64 MiB).
pub const MAX_GUEST_OUTPUT_SIZE: usize = 64 * 1024 * 1024;

/// TTL for compiled-module cache entries.
pub const MODULE_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// TTL for short-lived cache entries (raw JS source bytes).
pub const SOURCE_CACHE_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// Fixed cache key for the serialized JS interpreter engine.
pub const JS_ENGINE_CACHE_KEY: &str = "qjs-serialized";

/// First descriptor handed out by the host socket bridge.
pub const SOCKET_FD_BASE: i32 = 100;
