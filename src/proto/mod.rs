// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

// Module declaration for generated protobuf code
#[path = "envelope.v1.rs"]
pub mod envelope_v1;

// Re-export the types for easier access
pub use envelope_v1::{HeaderValues, ModuleRecord, RequestEnvelope, ResponseEnvelope};

use prost::Message;

use crate::errors::{Error, Result};

/// Encode a request envelope into the length-tagged binary form written to a
/// guest's stdin. Encoding is infallible for in-memory messages and
/// deterministic for a fixed field ordering (header maps are kept sorted).
pub fn encode_request(req: &RequestEnvelope) -> Vec<u8> {
    req.encode_to_vec()
}

/// Decode a guest's stdout bytes as a response envelope.
///
/// Unknown field IDs are skipped; a truncated buffer or a tag/length
/// mismatch is a `MalformedEnvelope` error.
pub fn decode_response(buf: &[u8]) -> Result<ResponseEnvelope> {
    ResponseEnvelope::decode(buf).map_err(Error::MalformedEnvelope)
}

/// Encode a response envelope. The redundant `length` field is forced to
/// `body.len()` on the way out; decoders ignore it.
pub fn encode_response(resp: &ResponseEnvelope) -> Vec<u8> {
    let mut resp = resp.clone();
    resp.length = resp.body.len() as i32;
    resp.encode_to_vec()
}

/// Decode a request envelope (used by tests and in-process guests).
pub fn decode_request(buf: &[u8]) -> Result<RequestEnvelope> {
    RequestEnvelope::decode(buf).map_err(Error::MalformedEnvelope)
}

impl ResponseEnvelope {
    /// Status code as the router surfaces it: an unset (zero) status is 200.
    pub fn effective_status(&self) -> u16 {
        if self.status_code == 0 {
            200
        } else {
            self.status_code as u16
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> RequestEnvelope {
        let mut req = RequestEnvelope {
            method: "POST".to_string(),
            body: b"ping".to_vec(),
            content_length: 4,
            host: "workloads.local".to_string(),
            remote_addr: "10.0.0.7:52114".to_string(),
            request_uri: "/echo".to_string(),
            pattern: "/api/v1/run/:uuid/*path".to_string(),
            header: Default::default(),
            transfer_encoding: vec![],
        };
        req.header.insert(
            "Accept".to_string(),
            HeaderValues {
                fields: vec!["text/plain".to_string(), "application/json".to_string()],
            },
        );
        req
    }

    #[test]
    fn request_round_trip() {
        let req = sample_request();
        let decoded = decode_request(&encode_request(&req)).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn response_round_trip() {
        let mut resp = ResponseEnvelope {
            status_code: 201,
            length: 0,
            body: b"created".to_vec(),
            header: Default::default(),
        };
        resp.header.insert(
            "Set-Cookie".to_string(),
            HeaderValues {
                fields: vec!["a=1".to_string(), "b=2".to_string()],
            },
        );

        let decoded = decode_response(&encode_response(&resp)).unwrap();
        assert_eq!(decoded.status_code, 201);
        assert_eq!(decoded.body, b"created");
        // Encode stamps length with the body size regardless of input.
        assert_eq!(decoded.length, 7);
        assert_eq!(
            decoded.header["Set-Cookie"].fields,
            vec!["a=1".to_string(), "b=2".to_string()]
        );
    }

    #[test]
    fn multi_valued_headers_preserve_order() {
        let mut req = sample_request();
        req.header.insert(
            "X-Forwarded-For".to_string(),
            HeaderValues {
                fields: vec!["1.1.1.1".into(), "2.2.2.2".into(), "3.3.3.3".into()],
            },
        );
        let decoded = decode_request(&encode_request(&req)).unwrap();
        assert_eq!(
            decoded.header["X-Forwarded-For"].fields,
            vec!["1.1.1.1", "2.2.2.2", "3.3.3.3"]
        );
    }

    #[test]
    fn empty_body_round_trips_empty() {
        let req = RequestEnvelope {
            method: "GET".to_string(),
            ..Default::default()
        };
        let decoded = decode_request(&encode_request(&req)).unwrap();
        assert!(decoded.body.is_empty());
    }

    #[test]
    fn truncated_response_is_malformed() {
        let resp = ResponseEnvelope {
            status_code: 200,
            length: 2,
            body: b"hello envelope".to_vec(),
            header: Default::default(),
        };
        let bytes = encode_response(&resp);
        let err = decode_response(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, Error::MalformedEnvelope(_)));
    }

    #[test]
    fn unknown_fields_are_ignored_on_decode() {
        let mut bytes = encode_response(&ResponseEnvelope {
            status_code: 204,
            ..Default::default()
        });
        // Append an unknown varint field (tag 15) to simulate a newer peer.
        bytes.extend_from_slice(&[0x78, 0x2a]);
        let decoded = decode_response(&bytes).unwrap();
        assert_eq!(decoded.status_code, 204);
    }

    #[test]
    fn zero_status_surfaces_as_ok() {
        let resp = ResponseEnvelope::default();
        assert_eq!(resp.effective_status(), 200);
        let resp = ResponseEnvelope {
            status_code: 404,
            ..Default::default()
        };
        assert_eq!(resp.effective_status(), 404);
    }

    #[test]
    fn encoding_is_deterministic() {
        let req = sample_request();
        assert_eq!(encode_request(&req), encode_request(&req.clone()));
    }
}
