// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Host-function shim: the capabilities guests can import beyond WASI.
//!
//! Two JSON-driven bridges live under the `env` namespace
//! (`host_http_request`, `host_socket_operation`), plus linkage-only stubs
//! under `wasi_snapshot_preview1` for legacy socket ABI symbols. Byte fields
//! cross the JSON boundary base64-encoded. A return value of `0` from either
//! bridge is an opaque shim-level failure; guests must not interpret it
//! further.

pub mod http;
pub mod socket;

use wasmtime::{Caller, Extern, Linker, Memory};

use crate::errors::{Error, Result};
use crate::runtime::session::GuestState;

/// Attach all host functions to the linker.
pub fn link(linker: &mut Linker<GuestState>) -> Result<()> {
    socket::define_legacy_wasi_sockets(linker)?;
    socket::link(linker)?;
    http::link(linker)
}

pub(crate) fn link_failed(name: &str, e: impl ToString) -> Error {
    Error::InstantiationFailed(format!("failed to define {name}: {}", e.to_string()))
}

/// The guest's exported linear memory, required by every bridge call.
pub(crate) fn guest_memory(caller: &mut Caller<'_, GuestState>) -> Option<Memory> {
    caller.get_export("memory").and_then(Extern::into_memory)
}

/// Copy `[ptr, ptr+len)` out of guest memory, bounds-checked.
pub(crate) fn read_guest_bytes(
    caller: &Caller<'_, GuestState>,
    memory: Memory,
    ptr: i32,
    len: i32,
) -> Option<Vec<u8>> {
    if ptr < 0 || len < 0 {
        return None;
    }
    let start = ptr as usize;
    let end = start.checked_add(len as usize)?;
    memory.data(caller).get(start..end).map(|s| s.to_vec())
}

/// Write `bytes` into `[ptr, ptr+cap)` of guest memory and return the number
/// of bytes written, or `None` when the buffer is missing or too small.
pub(crate) fn write_guest_bytes(
    caller: &mut Caller<'_, GuestState>,
    memory: Memory,
    ptr: i32,
    cap: i32,
    bytes: &[u8],
) -> Option<i32> {
    if ptr < 0 || cap < 0 || bytes.len() > cap as usize {
        return None;
    }
    let start = ptr as usize;
    let end = start.checked_add(bytes.len())?;
    let data = memory.data_mut(caller).get_mut(start..end)?;
    data.copy_from_slice(bytes);
    Some(bytes.len() as i32)
}

/// Base64 (de)serialization for byte fields on the JSON wire, matching how
/// the guest SDK marshals them.
pub(crate) mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Vec<u8>, D::Error> {
        let value: Option<String> = Option::deserialize(deserializer)?;
        match value {
            None => Ok(Vec::new()),
            Some(encoded) => STANDARD.decode(encoded).map_err(serde::de::Error::custom),
        }
    }

    pub mod opt {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine as _;
        use serde::Serializer;

        pub fn serialize<S: Serializer>(
            bytes: &Option<Vec<u8>>,
            serializer: S,
        ) -> std::result::Result<S::Ok, S::Error> {
            match bytes {
                Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
                None => serializer.serialize_none(),
            }
        }
    }
}
