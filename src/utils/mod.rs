// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use xxhash_rust::xxh64::xxh64;

/// Content fingerprint of an artifact: XXH64 of the exact bytes, rendered as
/// lower-case hex. The same bytes always produce the same string, and the
/// rendering base never varies across stores that compare fingerprints.
pub fn fingerprint(bytes: &[u8]) -> String {
    format!("{:x}", xxh64(bytes, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable() {
        let a = fingerprint(b"hello world");
        let b = fingerprint(b"hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_is_a_function_of_the_exact_bytes() {
        assert_ne!(fingerprint(b"hello world"), fingerprint(b"hello world!"));
        assert_ne!(fingerprint(b""), fingerprint(b"\0"));
    }

    #[test]
    fn fingerprint_renders_lowercase_hex() {
        let fp = fingerprint(b"abc");
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!fp.chars().any(|c| c.is_ascii_uppercase()));
    }
}
