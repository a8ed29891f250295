// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Mutex;
use std::time::Duration;
use wasmtime::{Caller, Linker};

use crate::config::consts::SOCKET_FD_BASE;
use crate::errors::Result;
use crate::observability::messages::runtime::HostCallFailed;
use crate::observability::messages::StructuredLog;
use crate::runtime::host::{b64, guest_memory, link_failed, read_guest_bytes, write_guest_bytes};
use crate::runtime::session::GuestState;

const INVALID_FD: &str = "invalid file descriptor";
const SOCKET_IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Operation request received from the guest.
#[derive(Debug, Default, Deserialize)]
pub struct HostSocketRequest {
    /// "dial", "read", "write", or "close".
    #[serde(default)]
    pub operation: String,
    /// host:port, for dial.
    #[serde(default)]
    pub address: String,
    /// Descriptor, for read/write/close.
    #[serde(default)]
    pub fd: i32,
    /// Data to write.
    #[serde(default, with = "b64")]
    pub data: Vec<u8>,
    /// Size to read.
    #[serde(default)]
    pub size: usize,
    /// Network type; only "tcp" is supported.
    #[serde(default)]
    pub network: String,
}

/// Operation result sent back to the guest: a success payload or an error
/// message, never both.
#[derive(Debug, Default, Serialize)]
pub struct HostSocketResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fd: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "b64::opt::serialize")]
    pub data: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_read: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_sent: Option<usize>,
}

impl HostSocketResponse {
    fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Process-wide table of guest-opened connections.
///
/// Descriptors are unique for the process lifetime: a monotone counter
/// starting at 100, never reused.
struct ConnectionTable {
    conns: HashMap<i32, TcpStream>,
    next_fd: i32,
}

static CONNECTIONS: Lazy<Mutex<ConnectionTable>> = Lazy::new(|| {
    Mutex::new(ConnectionTable {
        conns: HashMap::new(),
        next_fd: SOCKET_FD_BASE,
    })
});

/// Dispatch one socket operation against the process-wide connection table.
pub fn dispatch(request: HostSocketRequest) -> HostSocketResponse {
    match request.operation.as_str() {
        "dial" => dial(&request),
        "read" => read(&request),
        "write" => write(&request),
        "close" => close(&request),
        _ => HostSocketResponse::error("unknown operation"),
    }
}

fn dial(request: &HostSocketRequest) -> HostSocketResponse {
    if !request.network.is_empty() && request.network != "tcp" {
        return HostSocketResponse::error(format!(
            "unsupported network: {}",
            request.network
        ));
    }

    let stream = match TcpStream::connect(&request.address) {
        Ok(stream) => stream,
        Err(e) => return HostSocketResponse::error(e.to_string()),
    };
    let _ = stream.set_read_timeout(Some(SOCKET_IO_TIMEOUT));
    let _ = stream.set_write_timeout(Some(SOCKET_IO_TIMEOUT));

    let Ok(mut table) = CONNECTIONS.lock() else {
        return HostSocketResponse::error("connection table unavailable");
    };
    let fd = table.next_fd;
    table.next_fd += 1;
    table.conns.insert(fd, stream);

    HostSocketResponse {
        fd: Some(fd),
        ..Default::default()
    }
}

/// Look up a descriptor and clone its handle so the table lock is not held
/// across blocking I/O.
fn stream_for(fd: i32) -> std::result::Result<TcpStream, HostSocketResponse> {
    let Ok(table) = CONNECTIONS.lock() else {
        return Err(HostSocketResponse::error("connection table unavailable"));
    };
    match table.conns.get(&fd) {
        Some(stream) => stream
            .try_clone()
            .map_err(|e| HostSocketResponse::error(e.to_string())),
        None => Err(HostSocketResponse::error(INVALID_FD)),
    }
}

fn read(request: &HostSocketRequest) -> HostSocketResponse {
    let mut stream = match stream_for(request.fd) {
        Ok(stream) => stream,
        Err(resp) => return resp,
    };

    let mut buffer = vec![0u8; request.size];
    match stream.read(&mut buffer) {
        // Short reads are legal; the guest sees exactly what arrived.
        Ok(n) => HostSocketResponse {
            data: Some(buffer[..n].to_vec()),
            bytes_read: Some(n),
            ..Default::default()
        },
        Err(e) => HostSocketResponse::error(e.to_string()),
    }
}

fn write(request: &HostSocketRequest) -> HostSocketResponse {
    let mut stream = match stream_for(request.fd) {
        Ok(stream) => stream,
        Err(resp) => return resp,
    };

    match stream.write(&request.data) {
        Ok(n) => HostSocketResponse {
            bytes_sent: Some(n),
            ..Default::default()
        },
        Err(e) => HostSocketResponse::error(e.to_string()),
    }
}

fn close(request: &HostSocketRequest) -> HostSocketResponse {
    let Ok(mut table) = CONNECTIONS.lock() else {
        return HostSocketResponse::error("connection table unavailable");
    };
    match table.conns.remove(&request.fd) {
        // Dropping the stream closes it; further operations on this fd fail.
        Some(_stream) => HostSocketResponse::default(),
        None => HostSocketResponse::error(INVALID_FD),
    }
}

/// Attach `env.host_socket_operation` to the linker.
///
/// Same memory contract as the HTTP bridge: JSON request in, JSON response
/// out, return value is bytes written, `0` is a shim-level failure (distinct
/// from a guest-visible `{error}` payload).
pub fn link(linker: &mut Linker<GuestState>) -> Result<()> {
    linker
        .func_wrap(
            "env",
            "host_socket_operation",
            |mut caller: Caller<'_, GuestState>,
             req_ptr: i32,
             req_len: i32,
             resp_ptr: i32,
             resp_len: i32|
             -> i32 {
                if caller.data().cancel.is_cancelled() {
                    HostCallFailed {
                        function: "host_socket_operation",
                        reason: "invocation cancelled",
                    }
                    .log();
                    return 0;
                }

                let Some(memory) = guest_memory(&mut caller) else {
                    HostCallFailed {
                        function: "host_socket_operation",
                        reason: "failed to get memory export",
                    }
                    .log();
                    return 0;
                };

                let Some(req_bytes) = read_guest_bytes(&caller, memory, req_ptr, req_len)
                else {
                    HostCallFailed {
                        function: "host_socket_operation",
                        reason: "request range out of bounds",
                    }
                    .log();
                    return 0;
                };

                let request: HostSocketRequest = match serde_json::from_slice(&req_bytes) {
                    Ok(request) => request,
                    Err(e) => {
                        HostCallFailed {
                            function: "host_socket_operation",
                            reason: &format!("failed to unmarshal request JSON: {e}"),
                        }
                        .log();
                        return 0;
                    }
                };

                let response = dispatch(request);
                let resp_bytes = match serde_json::to_vec(&response) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        HostCallFailed {
                            function: "host_socket_operation",
                            reason: &format!("failed to marshal response JSON: {e}"),
                        }
                        .log();
                        return 0;
                    }
                };

                match write_guest_bytes(&mut caller, memory, resp_ptr, resp_len, &resp_bytes) {
                    Some(written) => written,
                    None => {
                        HostCallFailed {
                            function: "host_socket_operation",
                            reason: &format!(
                                "result buffer too small: needed {}, have {}",
                                resp_bytes.len(),
                                resp_len
                            ),
                        }
                        .log();
                        0
                    }
                }
            },
        )
        .map_err(|e| link_failed("host_socket_operation", e))?;
    Ok(())
}

// WASI errno values used by the legacy stubs.
const EAI_NONAME: i32 = 8;
const ENOTSOCK: i32 = 58;

/// Define legacy WASI preview 1 socket symbols so guests compiled against
/// older socket ABIs link. These are linkage-only: option/bind/connect calls
/// succeed without side effects, address resolution reports "no addresses
/// found", and everything else reports ENOTSOCK. Real networking flows
/// through the `env` bridges.
pub fn define_legacy_wasi_sockets(linker: &mut Linker<GuestState>) -> Result<()> {
    const MODULE: &str = "wasi_snapshot_preview1";

    linker
        .func_wrap(
            MODULE,
            "sock_setsockopt",
            |_fd: i32, _level: i32, _optname: i32, _optval: i32, _optlen: i32| -> i32 { 0 },
        )
        .map_err(|e| link_failed("sock_setsockopt", e))?;

    linker
        .func_wrap(
            MODULE,
            "sock_getsockopt",
            |_fd: i32, _level: i32, _optname: i32, _optval: i32, _optlen: i32| -> i32 { 0 },
        )
        .map_err(|e| link_failed("sock_getsockopt", e))?;

    linker
        .func_wrap(MODULE, "sock_bind", |_fd: i32, _addr: i32, _addrlen: i32| -> i32 { 0 })
        .map_err(|e| link_failed("sock_bind", e))?;

    linker
        .func_wrap(
            MODULE,
            "sock_connect",
            |_fd: i32, _addr: i32, _addrlen: i32| -> i32 { 0 },
        )
        .map_err(|e| link_failed("sock_connect", e))?;

    linker
        .func_wrap(
            MODULE,
            "sock_getaddrinfo",
            |mut caller: Caller<'_, GuestState>,
             _node: i32,
             _service: i32,
             _hints: i32,
             addrinfo: i32,
             _maxaddrs: i32,
             _naddrs: i32,
             _flags: i32,
             _family: i32|
             -> i32 {
                // Null out the result pointer so the guest sees "no
                // addresses found" and can fall back gracefully.
                if let Some(memory) = guest_memory(&mut caller) {
                    let _ = write_guest_bytes(&mut caller, memory, addrinfo, 4, &[0, 0, 0, 0]);
                }
                EAI_NONAME
            },
        )
        .map_err(|e| link_failed("sock_getaddrinfo", e))?;

    linker
        .func_wrap(
            MODULE,
            "sock_open",
            |_domain: i32, _socket_type: i32, _protocol: i32| -> i32 { ENOTSOCK },
        )
        .map_err(|e| link_failed("sock_open", e))?;

    linker
        .func_wrap(MODULE, "sock_listen", |_fd: i32, _backlog: i32| -> i32 { ENOTSOCK })
        .map_err(|e| link_failed("sock_listen", e))?;

    linker
        .func_wrap(
            MODULE,
            "sock_getpeeraddr",
            |_fd: i32, _addr: i32, _addrlen: i32, _flags: i32| -> i32 { ENOTSOCK },
        )
        .map_err(|e| link_failed("sock_getpeeraddr", e))?;

    linker
        .func_wrap(
            MODULE,
            "sock_getlocaladdr",
            |_fd: i32, _addr: i32, _addrlen: i32, _flags: i32| -> i32 { ENOTSOCK },
        )
        .map_err(|e| link_failed("sock_getlocaladdr", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn echo_listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        (listener, address)
    }

    fn dial_request(address: &str) -> HostSocketRequest {
        HostSocketRequest {
            operation: "dial".to_string(),
            address: address.to_string(),
            network: "tcp".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn dial_write_read_close_round_trip() {
        let (listener, address) = echo_listener();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 16];
                if let Ok(n) = stream.read(&mut buf) {
                    let _ = stream.write_all(&buf[..n]);
                }
            }
        });

        let dialed = dispatch(dial_request(&address));
        assert!(dialed.error.is_none());
        let fd = dialed.fd.unwrap();

        let wrote = dispatch(HostSocketRequest {
            operation: "write".to_string(),
            fd,
            data: b"marco".to_vec(),
            ..Default::default()
        });
        assert_eq!(wrote.bytes_sent, Some(5));

        let got = dispatch(HostSocketRequest {
            operation: "read".to_string(),
            fd,
            size: 16,
            ..Default::default()
        });
        assert_eq!(got.bytes_read, Some(5));
        assert_eq!(got.data.unwrap(), b"marco");

        let closed = dispatch(HostSocketRequest {
            operation: "close".to_string(),
            fd,
            ..Default::default()
        });
        assert!(closed.error.is_none());
    }

    #[test]
    fn descriptors_are_never_reused() {
        let (listener_a, address_a) = echo_listener();
        let (listener_b, address_b) = echo_listener();
        std::thread::spawn(move || {
            let _ = listener_a.accept();
        });
        std::thread::spawn(move || {
            let _ = listener_b.accept();
        });

        let first = dispatch(dial_request(&address_a)).fd.unwrap();
        dispatch(HostSocketRequest {
            operation: "close".to_string(),
            fd: first,
            ..Default::default()
        });
        let second = dispatch(dial_request(&address_b)).fd.unwrap();

        assert!(second > first);
        assert!(first >= SOCKET_FD_BASE);
    }

    #[test]
    fn operations_on_unknown_fd_fail() {
        for operation in ["read", "write", "close"] {
            let response = dispatch(HostSocketRequest {
                operation: operation.to_string(),
                fd: 9_999_999,
                size: 1,
                ..Default::default()
            });
            assert_eq!(response.error.as_deref(), Some(INVALID_FD), "{operation}");
        }
    }

    #[test]
    fn second_close_reports_invalid_descriptor() {
        let (listener, address) = echo_listener();
        std::thread::spawn(move || {
            let _ = listener.accept();
        });

        let fd = dispatch(dial_request(&address)).fd.unwrap();
        let first = dispatch(HostSocketRequest {
            operation: "close".to_string(),
            fd,
            ..Default::default()
        });
        assert!(first.error.is_none());

        let second = dispatch(HostSocketRequest {
            operation: "close".to_string(),
            fd,
            ..Default::default()
        });
        assert_eq!(second.error.as_deref(), Some(INVALID_FD));
    }

    #[test]
    fn unknown_operation_is_rejected() {
        let response = dispatch(HostSocketRequest {
            operation: "sendfile".to_string(),
            ..Default::default()
        });
        assert_eq!(response.error.as_deref(), Some("unknown operation"));
    }

    #[test]
    fn dial_refuses_non_tcp_networks() {
        let response = dispatch(HostSocketRequest {
            operation: "dial".to_string(),
            address: "127.0.0.1:1".to_string(),
            network: "udp".to_string(),
            ..Default::default()
        });
        assert!(response.error.unwrap().contains("unsupported network"));
    }

    #[test]
    fn success_payloads_omit_empty_fields() {
        let json = serde_json::to_string(&HostSocketResponse {
            fd: Some(101),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(json, r#"{"fd":101}"#);
    }
}
