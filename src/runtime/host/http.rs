// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use wasmtime::{Caller, Linker};

use crate::errors::Result;
use crate::observability::messages::runtime::HostCallFailed;
use crate::observability::messages::StructuredLog;
use crate::runtime::host::{b64, guest_memory, link_failed, read_guest_bytes, write_guest_bytes};
use crate::runtime::session::GuestState;

/// Request structure received from the guest.
#[derive(Debug, Deserialize)]
pub struct HostHttpRequest {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, Vec<String>>,
    #[serde(default, with = "b64")]
    pub body: Vec<u8>,
}

/// Response structure written back into guest memory.
#[derive(Debug, Serialize)]
pub struct HostHttpResponse {
    pub status_code: u16,
    pub headers: HashMap<String, Vec<String>>,
    #[serde(with = "b64")]
    pub body: Vec<u8>,
}

/// Attach `env.host_http_request` to the linker.
///
/// The call contract: a JSON [`HostHttpRequest`] sits in guest memory at
/// `[req_ptr, req_ptr+req_len)`; the host performs the request with a fresh
/// transport, writes a JSON [`HostHttpResponse`] into
/// `[resp_ptr, resp_ptr+resp_len)`, and returns the number of bytes written.
/// `0` means failure of any kind: unmarshal, transport, cancellation, or an
/// output buffer too small for the response.
pub fn link(linker: &mut Linker<GuestState>) -> Result<()> {
    linker
        .func_wrap(
            "env",
            "host_http_request",
            |mut caller: Caller<'_, GuestState>,
             req_ptr: i32,
             req_len: i32,
             resp_ptr: i32,
             resp_len: i32|
             -> i32 {
                if caller.data().cancel.is_cancelled() {
                    HostCallFailed {
                        function: "host_http_request",
                        reason: "invocation cancelled",
                    }
                    .log();
                    return 0;
                }

                let Some(memory) = guest_memory(&mut caller) else {
                    HostCallFailed {
                        function: "host_http_request",
                        reason: "failed to get memory export",
                    }
                    .log();
                    return 0;
                };

                let Some(req_bytes) = read_guest_bytes(&caller, memory, req_ptr, req_len)
                else {
                    HostCallFailed {
                        function: "host_http_request",
                        reason: "request range out of bounds",
                    }
                    .log();
                    return 0;
                };

                let request: HostHttpRequest = match serde_json::from_slice(&req_bytes) {
                    Ok(request) => request,
                    Err(e) => {
                        HostCallFailed {
                            function: "host_http_request",
                            reason: &format!("failed to unmarshal request JSON: {e}"),
                        }
                        .log();
                        return 0;
                    }
                };

                let timeout = caller.data().http_timeout;
                let response = match perform(request, timeout) {
                    Ok(response) => response,
                    Err(reason) => {
                        HostCallFailed {
                            function: "host_http_request",
                            reason: &reason,
                        }
                        .log();
                        return 0;
                    }
                };

                let resp_bytes = match serde_json::to_vec(&response) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        HostCallFailed {
                            function: "host_http_request",
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
                            function: "host_http_request",
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
        .map_err(|e| link_failed("host_http_request", e))?;
    Ok(())
}

/// Perform the request host-side on a fresh, unpooled transport and read the
/// full response body.
pub fn perform(
    request: HostHttpRequest,
    timeout: Duration,
) -> std::result::Result<HostHttpResponse, String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| format!("failed to build client: {e}"))?;

    let method = reqwest::Method::from_bytes(request.method.as_bytes())
        .map_err(|e| format!("invalid method {:?}: {e}", request.method))?;

    let mut builder = client.request(method, &request.url);
    for (name, values) in &request.headers {
        for value in values {
            builder = builder.header(name.as_str(), value.as_str());
        }
    }

    let response = builder
        .body(request.body)
        .send()
        .map_err(|e| format!("failed to execute request: {e}"))?;

    let status_code = response.status().as_u16();
    let mut headers: HashMap<String, Vec<String>> = HashMap::new();
    for (name, value) in response.headers() {
        headers
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).to_string());
    }

    let body = response
        .bytes()
        .map_err(|e| format!("failed to read response body: {e}"))?
        .to_vec();

    Ok(HostHttpResponse {
        status_code,
        headers,
        body,
    })
}
