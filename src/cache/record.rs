//! On-disk record framing for the result log.
//!
//! ```text
//! +----------------+----------------------+------------------------------+
//! | body_len: u32  | checksum: [u8; 32]   | body: rkyv(CacheRecord)      |
//! |   (LE)         | BLAKE3(body)         |   body_len bytes             |
//! +----------------+----------------------+------------------------------+
//! ```

use rkyv::rancor::Error as RkyvError;
use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize};

use crate::hashing::{Fingerprint, checksum};

pub const LEN_BYTES: usize = 4;
pub const CHECKSUM_BYTES: usize = 32;
pub const HEADER_BYTES: usize = LEN_BYTES + CHECKSUM_BYTES;

/// One persisted cache entry. `value` is the JSON-encoded result set.
#[derive(Archive, Deserialize, Serialize, Debug, PartialEq, Clone)]
pub struct CacheRecord {
    pub fingerprint: [u8; 32],
    /// Unix milliseconds at write time.
    pub created_at: i64,
    pub value: Vec<u8>,
}

impl CacheRecord {
    pub fn new(fingerprint: Fingerprint, value: Vec<u8>) -> Self {
        Self {
            fingerprint: fingerprint.0,
            created_at: chrono::Utc::now().timestamp_millis(),
            value,
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint(self.fingerprint)
    }

    /// Header plus body, ready to append.
    pub fn encode(&self) -> Result<Vec<u8>, String> {
        let body = rkyv::to_bytes::<RkyvError>(self).map_err(|e| format!("{e:?}"))?;
        let body_len = u32::try_from(body.len())
            .map_err(|_| format!("record body of {} bytes is too large", body.len()))?;

        let mut frame = Vec::with_capacity(HEADER_BYTES + body.len());
        frame.extend_from_slice(&body_len.to_le_bytes());
        frame.extend_from_slice(&checksum(&body));
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    /// Verifies and decodes a full frame (header + body).
    pub fn decode(frame: &[u8]) -> Result<Self, String> {
        let (body_len, sum) = parse_header(frame).ok_or("truncated header")?;
        let body = frame
            .get(HEADER_BYTES..HEADER_BYTES + body_len)
            .ok_or("truncated body")?;
        Self::decode_body(body, &sum)
    }

    /// Verifies `body` against `sum` and deserializes it.
    pub fn decode_body(body: &[u8], sum: &[u8; 32]) -> Result<Self, String> {
        if &checksum(body) != sum {
            return Err("checksum mismatch".to_string());
        }

        // Frames sit at arbitrary offsets; rkyv needs an aligned buffer.
        let mut aligned = AlignedVec::<16>::with_capacity(body.len());
        aligned.extend_from_slice(body);
        rkyv::from_bytes::<CacheRecord, RkyvError>(&aligned).map_err(|e| format!("{e:?}"))
    }
}

/// Returns `(body_len, checksum)` if `buf` holds a full header.
pub fn parse_header(buf: &[u8]) -> Option<(usize, [u8; 32])> {
    let len_bytes: [u8; LEN_BYTES] = buf.get(..LEN_BYTES)?.try_into().ok()?;
    let sum: [u8; CHECKSUM_BYTES] = buf.get(LEN_BYTES..HEADER_BYTES)?.try_into().ok()?;
    Some((u32::from_le_bytes(len_bytes) as usize, sum))
}
