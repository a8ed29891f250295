// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! JS deployment runtime.
//!
//! JavaScript workloads run inside the same sandbox as native Wasm: the
//! program is the QuickJS interpreter (itself a Wasm artifact, compiled once
//! per host and cached under a fixed key), and the user's source arrives as a
//! program argument. The interpreter reads the request envelope from stdin,
//! runs the user code, and writes the response envelope to stdout, so the
//! whole JS path inherits the capability model and host-function surface of
//! the Wasm path.

use std::path::PathBuf;
use std::time::Duration;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::errors::{Error, Result};
use crate::runtime::session::{create_engine, Session};
use crate::runtime::wasm::load_module;
use crate::runtime::ModuleSource;

/// Argument vector handed to the interpreter: `qjs -e <source>`.
fn interpreter_argv(source: &str) -> Vec<String> {
    vec!["qjs".to_string(), "-e".to_string(), source.to_string()]
}

/// Configuration of a JS deployment runtime.
///
/// Requires the interpreter module (raw or cache-serialized) and the user's
/// JS source; the preopened directory defaults to nothing, callers normally
/// point it at the host's modules directory.
pub struct JsRuntimeConfig {
    id: Uuid,
    engine_source: ModuleSource,
    source: Bytes,
    modules_dir: Option<PathBuf>,
    fuel_limit: Option<u64>,
    http_timeout: Option<Duration>,
}

impl JsRuntimeConfig {
    pub fn new(id: Uuid, engine_source: ModuleSource, source: Bytes) -> Result<Self> {
        if id.is_nil() {
            return Err(Error::InvalidConfig("nil deployment id".to_string()));
        }
        if engine_source.is_empty() {
            return Err(Error::InvalidConfig(
                "JS interpreter module not provided".to_string(),
            ));
        }
        if source.is_empty() {
            return Err(Error::InvalidConfig("no JS source provided".to_string()));
        }
        Ok(Self {
            id,
            engine_source,
            source,
            modules_dir: None,
            fuel_limit: None,
            http_timeout: None,
        })
    }

    pub fn with_modules_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.modules_dir = Some(dir.into());
        self
    }

    pub fn with_fuel_limit(mut self, fuel: u64) -> Self {
        self.fuel_limit = Some(fuel);
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    /// Finalize: revive the interpreter module and bind it to a session with
    /// the user's source as `argv[2]`.
    pub fn instantiate(self) -> Result<JsRuntime> {
        let source = std::str::from_utf8(&self.source).map_err(|e| {
            Error::CompilationFailed(format!("JS source is not valid UTF-8: {e}"))
        })?;

        let engine = create_engine()?;
        let module = load_module(&engine, &self.engine_source)?;

        let mut session = Session::new(
            self.id,
            engine,
            module,
            interpreter_argv(source),
            self.modules_dir,
        )?;
        if let Some(fuel) = self.fuel_limit {
            session.fuel_limit = fuel;
        }
        if let Some(timeout) = self.http_timeout {
            session.http_timeout = timeout;
        }

        Ok(JsRuntime { session })
    }
}

/// A JS deployment bound to an interpreter session.
#[derive(Debug)]
pub struct JsRuntime {
    session: Session,
}

impl JsRuntime {
    pub fn execute(&mut self, envelope: &[u8], cancel: &CancellationToken) -> Result<Vec<u8>> {
        self.session.execute_envelope(envelope, cancel)
    }

    pub fn close(self) -> Result<()> {
        self.session.cleanup()
    }

    #[cfg(test)]
    pub(crate) fn session(&self) -> &Session {
        &self.session
    }
}
