// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Guest modules authored as WAT, shared by tests across the crate.

/// Copies stdin to stdout using a fixed 4 KiB buffer, then returns.
pub const ECHO_GUEST: &str = r#"
    (module
        (import "wasi_snapshot_preview1" "fd_read"
            (func $fd_read (param i32 i32 i32 i32) (result i32)))
        (import "wasi_snapshot_preview1" "fd_write"
            (func $fd_write (param i32 i32 i32 i32) (result i32)))
        (memory (export "memory") 2)
        (func (export "_start")
            (local $nread i32)
            (block $done
                (loop $pump
                    ;; iovec { base = 4096, len = 4096 } at offset 0
                    (i32.store (i32.const 0) (i32.const 4096))
                    (i32.store (i32.const 4) (i32.const 4096))
                    ;; fd_read(0, iovec, 1, nread_ptr = 8)
                    (br_if $done
                        (call $fd_read (i32.const 0) (i32.const 0) (i32.const 1) (i32.const 8)))
                    (local.set $nread (i32.load (i32.const 8)))
                    (br_if $done (i32.eqz (local.get $nread)))
                    ;; write back the chunk we just read
                    (i32.store (i32.const 4) (local.get $nread))
                    (drop (call $fd_write (i32.const 1) (i32.const 0) (i32.const 1) (i32.const 8)))
                    (br $pump)
                )
            )
        )
    )
"#;

/// A guest that ignores stdin and writes `payload` to stdout, then exits
/// with status 0 via `proc_exit`. Used to emit pre-encoded response
/// envelopes from inside the sandbox.
pub fn emitter_guest(payload: &[u8]) -> String {
    let escaped: String = payload
        .iter()
        .map(|b| format!("\\{b:02x}"))
        .collect();
    format!(
        r#"
        (module
            (import "wasi_snapshot_preview1" "fd_write"
                (func $fd_write (param i32 i32 i32 i32) (result i32)))
            (import "wasi_snapshot_preview1" "proc_exit"
                (func $proc_exit (param i32)))
            (memory (export "memory") 2)
            (data (i32.const 1024) "{escaped}")
            (func (export "_start")
                (i32.store (i32.const 0) (i32.const 1024))
                (i32.store (i32.const 4) (i32.const {len}))
                (drop (call $fd_write (i32.const 1) (i32.const 0) (i32.const 1) (i32.const 8)))
                (call $proc_exit (i32.const 0))
            )
        )
        "#,
        escaped = escaped,
        len = payload.len(),
    )
}

/// A guest that performs one `env.host_http_request` against `url` with a
/// response buffer of `resp_capacity` bytes, and writes the raw JSON
/// response buffer to stdout (nothing on a shim-level failure).
pub fn http_caller_guest(url: &str, resp_capacity: u32) -> String {
    let request = format!(r#"{{"method":"GET","url":"{url}","headers":{{}},"body":null}}"#);
    let escaped: String = request
        .bytes()
        .map(|b| format!("\\{b:02x}"))
        .collect();
    format!(
        r#"
        (module
            (import "env" "host_http_request"
                (func $host_http_request (param i32 i32 i32 i32) (result i32)))
            (import "wasi_snapshot_preview1" "fd_write"
                (func $fd_write (param i32 i32 i32 i32) (result i32)))
            (memory (export "memory") 4)
            (data (i32.const 1024) "{escaped}")
            (func (export "_start")
                (local $written i32)
                ;; response buffer at 65536
                (local.set $written
                    (call $host_http_request
                        (i32.const 1024) (i32.const {req_len})
                        (i32.const 65536) (i32.const {resp_capacity})))
                ;; write whatever came back (zero-length on failure)
                (i32.store (i32.const 0) (i32.const 65536))
                (i32.store (i32.const 4) (local.get $written))
                (drop (call $fd_write (i32.const 1) (i32.const 0) (i32.const 1) (i32.const 8)))
            )
        )
        "#,
        escaped = escaped,
        req_len = request.len(),
        resp_capacity = resp_capacity,
    )
}
