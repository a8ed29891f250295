// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod consts;

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::consts::DEFAULT_FUEL_LIMIT;

/// Host configuration, loaded from environment variables.
///
/// Every field has a documented default so a bare process comes up usable
/// for local development. The endpoints here describe collaborators the
/// core consumes (object store root, cache root) or advertises (listen
/// address for the external router); none of them change envelope or
/// sandbox semantics.
///
/// | Variable | Default |
/// |---|---|
/// | `EMBERHOST_DATA_DIR` | `./data` |
/// | `EMBERHOST_CACHE_DIR` | `./cache` |
/// | `EMBERHOST_JS_ENGINE` | `./qjs.wasm` |
/// | `EMBERHOST_JS_MODULES_DIR` | `./modules` |
/// | `EMBERHOST_LISTEN_ADDR` | `127.0.0.1:8080` |
/// | `EMBERHOST_HTTP_TIMEOUT_SECS` | `30` |
/// | `EMBERHOST_FUEL_LIMIT` | `2000000000` |
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory of the local object store.
    pub data_dir: PathBuf,
    /// Root directory of the on-disk module cache.
    pub cache_dir: PathBuf,
    /// Path to the QuickJS interpreter compiled to Wasm.
    pub js_engine_path: PathBuf,
    /// Host directory preopened for JS sessions.
    pub js_modules_dir: PathBuf,
    /// Address advertised to the external HTTP router.
    pub listen_addr: String,
    /// Timeout applied to outbound host-HTTP calls made on behalf of guests.
    pub http_timeout: Duration,
    /// Instruction budget per guest execution.
    pub fuel_limit: u64,
}

impl Config {
    /// Load configuration from the process environment, applying defaults
    /// for anything unset.
    pub fn from_env() -> Self {
        Self {
            data_dir: PathBuf::from(env_or("EMBERHOST_DATA_DIR", "./data")),
            cache_dir: PathBuf::from(env_or("EMBERHOST_CACHE_DIR", "./cache")),
            js_engine_path: PathBuf::from(env_or("EMBERHOST_JS_ENGINE", "./qjs.wasm")),
            js_modules_dir: PathBuf::from(env_or("EMBERHOST_JS_MODULES_DIR", "./modules")),
            listen_addr: env_or("EMBERHOST_LISTEN_ADDR", "127.0.0.1:8080"),
            http_timeout: Duration::from_secs(
                env_or("EMBERHOST_HTTP_TIMEOUT_SECS", "30")
                    .parse()
                    .unwrap_or(30),
            ),
            fuel_limit: env_or("EMBERHOST_FUEL_LIMIT", "2000000000")
                .parse()
                .unwrap_or(DEFAULT_FUEL_LIMIT),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            cache_dir: PathBuf::from("./cache"),
            js_engine_path: PathBuf::from("./qjs.wasm"),
            js_modules_dir: PathBuf::from("./modules"),
            listen_addr: "127.0.0.1:8080".to_string(),
            http_timeout: Duration::from_secs(30),
            fuel_limit: DEFAULT_FUEL_LIMIT,
        }
    }
}

/// Retrieve an environment variable or fall back to a default value.
fn env_or(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}
