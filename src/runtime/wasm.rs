// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Wasm deployment runtime: binds a compiled module plus sandbox options
//! into an invokable deployment.

use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use wasmtime::{Engine, Module};

use crate::config::consts::MAX_ARTIFACT_SIZE;
use crate::errors::{Error, Result};
use crate::runtime::session::{create_engine, Session};
use crate::runtime::ModuleSource;

/// Configuration of a Wasm deployment runtime.
///
/// The required fields (`id`, the module bytes) are validated at
/// construction; optional fields default to sensible values and are set with
/// the `with_` methods. [`WasmRuntimeConfig::instantiate`] performs the heavy
/// initialization: engine creation, compile-or-deserialize, session setup.
#[derive(Debug)]
pub struct WasmRuntimeConfig {
    id: Uuid,
    source: ModuleSource,
    args: Vec<String>,
    preopened_dir: Option<PathBuf>,
    fuel_limit: Option<u64>,
    http_timeout: Option<Duration>,
}

impl WasmRuntimeConfig {
    pub fn new(id: Uuid, source: ModuleSource) -> Result<Self> {
        if id.is_nil() {
            return Err(Error::InvalidConfig("nil deployment id".to_string()));
        }
        if source.is_empty() {
            return Err(Error::InvalidConfig("wasm module not provided".to_string()));
        }
        Ok(Self {
            id,
            source,
            args: Vec::new(),
            preopened_dir: None,
            fuel_limit: None,
            http_timeout: None,
        })
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_preopened_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.preopened_dir = Some(dir.into());
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

    /// Finalize the configuration into a runnable deployment.
    pub fn instantiate(self) -> Result<WasmRuntime> {
        let engine = create_engine()?;
        let module = load_module(&engine, &self.source)?;

        let mut session = Session::new(self.id, engine, module, self.args, self.preopened_dir)?;
        if let Some(fuel) = self.fuel_limit {
            session.fuel_limit = fuel;
        }
        if let Some(timeout) = self.http_timeout {
            session.http_timeout = timeout;
        }

        Ok(WasmRuntime { session })
    }
}

/// Compile raw bytes, or revive a module serialized by a compatible engine.
pub(crate) fn load_module(engine: &Engine, source: &ModuleSource) -> Result<Module> {
    match source {
        ModuleSource::Raw(bytes) => {
            if bytes.len() > MAX_ARTIFACT_SIZE {
                return Err(Error::CompilationFailed(format!(
                    "artifact too large: {} bytes (max {})",
                    bytes.len(),
                    MAX_ARTIFACT_SIZE
                )));
            }
            Module::new(engine, bytes).map_err(|e| Error::CompilationFailed(e.to_string()))
        }
        ModuleSource::Serialized(bytes) => {
            // Serialized payloads come from our own cache namespace, written
            // by Module::serialize on this host.
            unsafe { Module::deserialize(engine, bytes) }
                .map_err(|e| Error::CompilationFailed(format!("deserialize: {e}")))
        }
    }
}

/// A Wasm deployment bound to a session and ready to execute envelopes.
#[derive(Debug)]
pub struct WasmRuntime {
    session: Session,
}

impl WasmRuntime {
    /// Execute one request envelope: reset stdin, write the envelope, build
    /// the store and linker, run, then read back the guest's stdout.
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testutil::ECHO_GUEST;
    use bytes::Bytes;

    fn raw_source(wat: &str) -> ModuleSource {
        ModuleSource::Raw(Bytes::from(wat::parse_str(wat).unwrap()))
    }

    #[test]
    fn echoes_envelope_bytes_through_the_sandbox() {
        let config = WasmRuntimeConfig::new(Uuid::new_v4(), raw_source(ECHO_GUEST)).unwrap();
        let mut runtime = config.instantiate().unwrap();

        let cancel = CancellationToken::new();
        let out = runtime.execute(b"envelope payload", &cancel).unwrap();
        assert_eq!(out, b"envelope payload");
        runtime.close().unwrap();
    }

    #[test]
    fn stdin_resets_between_executions() {
        let config = WasmRuntimeConfig::new(Uuid::new_v4(), raw_source(ECHO_GUEST)).unwrap();
        let mut runtime = config.instantiate().unwrap();
        let cancel = CancellationToken::new();

        let first = runtime.execute(b"first, longer payload", &cancel).unwrap();
        assert_eq!(first, b"first, longer payload");

        // A shorter second request must not see any residue of the first.
        let second = runtime.execute(b"tiny", &cancel).unwrap();
        assert_eq!(second, b"tiny");
        runtime.close().unwrap();
    }

    #[test]
    fn required_fields_are_rejected_at_construction() {
        let err =
            WasmRuntimeConfig::new(Uuid::nil(), raw_source(ECHO_GUEST)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));

        let err =
            WasmRuntimeConfig::new(Uuid::new_v4(), ModuleSource::Raw(Bytes::new())).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn garbage_bytes_fail_compilation() {
        let config = WasmRuntimeConfig::new(
            Uuid::new_v4(),
            ModuleSource::Raw(Bytes::from_static(b"not a wasm module")),
        )
        .unwrap();
        assert!(matches!(
            config.instantiate().unwrap_err(),
            Error::CompilationFailed(_)
        ));
    }

    #[test]
    fn serialized_round_trip_revives_the_module() {
        let engine = create_engine().unwrap();
        let wasm = wat::parse_str(ECHO_GUEST).unwrap();
        let module = Module::new(&engine, &wasm).unwrap();
        let serialized = module.serialize().unwrap();

        let config = WasmRuntimeConfig::new(
            Uuid::new_v4(),
            ModuleSource::Serialized(Bytes::from(serialized)),
        )
        .unwrap();
        let mut runtime = config.instantiate().unwrap();
        let out = runtime
            .execute(b"from cache", &CancellationToken::new())
            .unwrap();
        assert_eq!(out, b"from cache");
        runtime.close().unwrap();
    }

    #[test]
    fn session_carries_configured_options() {
        let config = WasmRuntimeConfig::new(Uuid::new_v4(), raw_source(ECHO_GUEST))
            .unwrap()
            .with_args(vec!["handler".to_string()])
            .with_fuel_limit(123_456)
            .with_http_timeout(Duration::from_secs(3));
        let runtime = config.instantiate().unwrap();

        assert_eq!(runtime.session().args, vec!["handler".to_string()]);
        assert_eq!(runtime.session().fuel_limit, 123_456);
        assert_eq!(runtime.session().http_timeout, Duration::from_secs(3));
        runtime.close().unwrap();
    }
}
