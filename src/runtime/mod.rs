// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Runtime backends: sessions, sandbox channels, host functions, and the
//! per-kind deployment runtimes.

pub mod channel;
pub mod host;
pub mod js;
pub mod session;
#[cfg(test)]
pub(crate) mod testutil;
pub mod wasm;

use bytes::Bytes;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;

use crate::errors::{Error, Result};
use crate::runtime::js::JsRuntime;
use crate::runtime::wasm::WasmRuntime;

/// The two workload kinds the host executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeKind {
    Wasm,
    Js,
}

impl RuntimeKind {
    /// File extension artifacts of this kind are stored under.
    pub fn extension(self) -> &'static str {
        match self {
            RuntimeKind::Wasm => "wasm",
            RuntimeKind::Js => "js",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeKind::Wasm => "wasm",
            RuntimeKind::Js => "js",
        }
    }
}

impl FromStr for RuntimeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "wasm" => Ok(RuntimeKind::Wasm),
            "js" => Ok(RuntimeKind::Js),
            other => Err(Error::InvalidRuntimeKind(other.to_string())),
        }
    }
}

/// Where a module's bytes come from.
///
/// `Raw` bytes are compiled; `Serialized` bytes were produced by
/// `Module::serialize` on this host architecture and are deserialized
/// instead, skipping compilation.
#[derive(Clone)]
#[derive(Debug)]
pub enum ModuleSource {
    Raw(Bytes),
    Serialized(Bytes),
}

impl ModuleSource {
    pub fn len(&self) -> usize {
        match self {
            ModuleSource::Raw(b) | ModuleSource::Serialized(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A deployment bound to a compiled module and ready to execute envelopes.
///
/// The closed set of runtime kinds dispatches statically.
pub enum DeploymentRuntime {
    Wasm(WasmRuntime),
    Js(JsRuntime),
}

impl DeploymentRuntime {
    /// Pass a request envelope through the guest and return the bytes it
    /// wrote as its response envelope.
    pub fn execute(&mut self, envelope: &[u8], cancel: &CancellationToken) -> Result<Vec<u8>> {
        match self {
            DeploymentRuntime::Wasm(rt) => rt.execute(envelope, cancel),
            DeploymentRuntime::Js(rt) => rt.execute(envelope, cancel),
        }
    }

    /// Tear the session down, releasing channels and engine resources.
    pub fn close(self) -> Result<()> {
        match self {
            DeploymentRuntime::Wasm(rt) => rt.close(),
            DeploymentRuntime::Js(rt) => rt.close(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_kind_parses_case_insensitively() {
        assert_eq!("wasm".parse::<RuntimeKind>().unwrap(), RuntimeKind::Wasm);
        assert_eq!("JS".parse::<RuntimeKind>().unwrap(), RuntimeKind::Js);
        assert_eq!("Wasm".parse::<RuntimeKind>().unwrap(), RuntimeKind::Wasm);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = "python".parse::<RuntimeKind>().unwrap_err();
        assert!(matches!(err, Error::InvalidRuntimeKind(k) if k == "python"));
    }

    #[test]
    fn extensions_match_kinds() {
        assert_eq!(RuntimeKind::Wasm.extension(), "wasm");
        assert_eq!(RuntimeKind::Js.extension(), "js");
    }
}
