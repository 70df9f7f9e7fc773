//! Opaque pagination cursor codec
//!
//! A cursor is URL-safe base64 (no padding) over a small JSON envelope:
//!
//! ```json
//! {"v": 1, "q": "<query fingerprint>", "k": "<last sort key>", "c": "<checksum>"}
//! ```
//!
//! The fingerprint binds the token to one logical query (mode, farm, stage and, for
//! history, the year-month), so a cursor issued for one listing cannot be replayed
//! against another.
//!
//! The checksum is an unkeyed, truncated SHA-256. It catches corrupted or hand-edited
//! tokens, not a caller who recomputes it: such a caller can pick any position, but
//! only within the listing the request parameters already name, because the decoder
//! checks the fingerprint against the request rather than trusting the token.

use crate::domain::{FarmId, Result, SowtrackError, Stage};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Current envelope version
pub const CURSOR_VERSION: u8 = 1;

/// The logical query a cursor belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryScope {
    Active {
        farm_id: FarmId,
        stage: Stage,
    },
    History {
        farm_id: FarmId,
        stage: Stage,
        year: i32,
        month: u32,
    },
}

impl QueryScope {
    /// SHA-256 fingerprint of the query parameters, hex encoded
    pub fn fingerprint(&self) -> String {
        let canonical = match self {
            QueryScope::Active { farm_id, stage } => {
                format!("active\n{}\n{}", farm_id, stage.as_str())
            }
            QueryScope::History {
                farm_id,
                stage,
                year,
                month,
            } => format!(
                "history\n{}\n{}\n{year:04}-{month:02}",
                farm_id,
                stage.as_str()
            ),
        };
        sha256_hex(canonical.as_bytes())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    v: u8,
    q: String,
    k: String,
    c: String,
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    format!("{result:x}")
}

fn checksum(version: u8, fingerprint: &str, last_key: &str) -> String {
    let mut full = sha256_hex(format!("{version}\n{fingerprint}\n{last_key}").as_bytes());
    full.truncate(16);
    full
}

/// Encodes the last sort key of a page into a continuation token
pub fn encode(scope: &QueryScope, last_key: &str) -> Result<String> {
    let q = scope.fingerprint();
    let envelope = Envelope {
        v: CURSOR_VERSION,
        c: checksum(CURSOR_VERSION, &q, last_key),
        q,
        k: last_key.to_string(),
    };
    let json = serde_json::to_vec(&envelope)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decodes a token issued by [`encode`] for the same query
///
/// # Errors
///
/// Returns `InvalidCursor` when the token is malformed, tampered with, from another
/// version, or bound to a different query.
pub fn decode(scope: &QueryScope, token: &str) -> Result<String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|e| SowtrackError::InvalidCursor(format!("not base64: {e}")))?;
    let envelope: Envelope = serde_json::from_slice(&bytes)
        .map_err(|e| SowtrackError::InvalidCursor(format!("malformed envelope: {e}")))?;

    if envelope.v != CURSOR_VERSION {
        return Err(SowtrackError::InvalidCursor(format!(
            "unsupported cursor version {}",
            envelope.v
        )));
    }
    if envelope.c != checksum(envelope.v, &envelope.q, &envelope.k) {
        return Err(SowtrackError::InvalidCursor(
            "checksum mismatch".to_string(),
        ));
    }
    if envelope.q != scope.fingerprint() {
        return Err(SowtrackError::InvalidCursor(
            "cursor was issued for a different query".to_string(),
        ));
    }
    if envelope.k.is_empty() {
        return Err(SowtrackError::InvalidCursor("empty position".to_string()));
    }
    Ok(envelope.k)
}
