//! Request canonicalization and fingerprints.
//!
//! A search is identified only by `(stage, query, top_k, top_m)`. The tuple is
//! encoded field by field in a fixed order with explicit lengths, then hashed
//! with BLAKE3.

use std::fmt;

use blake3::Hasher;
use serde::{Deserialize, Serialize};

use crate::constants::SEARCH_STAGE;

/// Canonical form of a search request.
///
/// Field order is fixed by [`CanonicalRequest::encode`]; nothing outside these
/// four fields contributes to the fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalRequest<'a> {
    pub stage: &'a str,
    pub query: &'a str,
    pub top_k: usize,
    pub top_m: usize,
}

impl<'a> CanonicalRequest<'a> {
    /// Builds the canonical tuple for a retrieval-stage search.
    pub fn search(query: &'a str, top_k: usize, top_m: usize) -> Self {
        Self {
            stage: SEARCH_STAGE,
            query,
            top_k,
            top_m,
        }
    }

    /// Stable byte encoding: each string is length-prefixed, integers are `u64` LE.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.stage.len() + 8 + self.query.len() + 16);
        push_str(&mut out, self.stage);
        push_str(&mut out, self.query);
        out.extend_from_slice(&(self.top_k as u64).to_le_bytes());
        out.extend_from_slice(&(self.top_m as u64).to_le_bytes());
        out
    }

    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = Hasher::new();
        hasher.update(&self.encode());
        Fingerprint(*hasher.finalize().as_bytes())
    }
}

fn push_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u64).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

/// 256-bit cache key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        blake3::Hash::from_bytes(self.0).to_hex().to_string()
    }

    /// Parses a 64-char hex string.
    pub fn from_hex(hex: &str) -> Option<Self> {
        blake3::Hash::from_hex(hex)
            .ok()
            .map(|h| Fingerprint(*h.as_bytes()))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Fingerprint({}..)", &hex[..12])
    }
}

impl From<[u8; 32]> for Fingerprint {
    fn from(bytes: [u8; 32]) -> Self {
        Fingerprint(bytes)
    }
}

/// Fingerprint of a retrieval-stage search.
#[inline]
pub fn fingerprint(query: &str, top_k: usize, top_m: usize) -> Fingerprint {
    CanonicalRequest::search(query, top_k, top_m).fingerprint()
}

/// BLAKE3 digest of arbitrary bytes (record checksums).
#[inline]
pub fn checksum(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Computes a 64-bit hash of the input data using BLAKE3, truncated from 256 bits.
///
/// Used for vector point ids, where the full document id is also stored in the
/// payload and checked on the way out.
#[inline]
pub fn hash_to_u64(data: &[u8]) -> u64 {
    let hash = blake3::hash(data);
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[0..8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_fingerprint_determinism() {
        let q = "women summer cotton midi dress under 2000 rupees";

        let f1 = fingerprint(q, 20, 3);
        let f2 = fingerprint(q, 20, 3);
        let f3 = CanonicalRequest::search(q, 20, 3).fingerprint();

        assert_eq!(f1, f2);
        assert_eq!(f2, f3);
    }

    #[test]
    fn test_fingerprint_sensitivity() {
        let q = "men running shoes";

        let base = fingerprint(q, 20, 3);
        assert_ne!(base, fingerprint(q, 20, 5));
        assert_ne!(base, fingerprint(q, 21, 3));
        assert_ne!(base, fingerprint("men running shoe", 20, 3));
        assert_ne!(base, fingerprint("men running shoes ", 20, 3));
        assert_ne!(base, fingerprint("Men running shoes", 20, 3));
    }

    #[test]
    fn test_fingerprint_stage_sensitivity() {
        let search = CanonicalRequest::search("q", 20, 3);
        let other = CanonicalRequest {
            stage: "answer",
            ..search
        };
        assert_ne!(search.fingerprint(), other.fingerprint());
    }

    #[test]
    fn test_encoding_prevents_ambiguity() {
        let a = CanonicalRequest {
            stage: "ab",
            query: "cd",
            top_k: 1,
            top_m: 1,
        };
        let b = CanonicalRequest {
            stage: "abc",
            query: "d",
            ..a
        };
        let c = CanonicalRequest {
            stage: "a",
            query: "bcd",
            ..a
        };

        let set: HashSet<_> = [a, b, c].iter().map(|r| r.fingerprint()).collect();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_swapped_counts_differ() {
        assert_ne!(fingerprint("q", 5, 3), fingerprint("q", 3, 5));
    }

    #[test]
    fn test_hex_roundtrip() {
        let fp = fingerprint("kids winter hoodie", 20, 3);
        let hex = fp.to_hex();

        assert_eq!(hex.len(), 64);
        assert_eq!(fp.to_string(), hex);
        assert_eq!(Fingerprint::from_hex(&hex), Some(fp));
        assert_eq!(Fingerprint::from_hex("not-hex"), None);
    }

    #[test]
    fn test_hash_to_u64_determinism() {
        let data = b"P000123";

        assert_eq!(hash_to_u64(data), hash_to_u64(data));
        assert_ne!(hash_to_u64(b"P000123"), hash_to_u64(b"P000124"));
    }

    #[test]
    fn test_checksum_size() {
        let sum = checksum(b"");
        assert_eq!(sum.len(), 32);
        assert!(!sum.iter().all(|&b| b == 0));
    }
}
