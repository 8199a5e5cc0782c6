//! 32-byte content digest

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;

use crate::error::AnchorError;

/// A 32-byte content hash as anchored on-chain.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest32(pub [u8; 32]);

impl Digest32 {
    /// Parse a hex string (optionally `0x`-prefixed) holding exactly 32 bytes.
    pub fn from_hex(s: &str) -> Result<Self, AnchorError> {
        let bytes = decode_hex(s)?;
        let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            AnchorError::Proof(format!("expected a 32-byte hash, got {} bytes", bytes.len()))
        })?;
        Ok(Self(arr))
    }

    /// SHA-256 of arbitrary bytes
    pub fn sha256(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Lowercase hex with `0x` prefix
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Digest32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest32({})", self.to_hex())
    }
}

impl fmt::Display for Digest32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Decode hex input, tolerating a `0x` prefix and surrounding whitespace.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, AnchorError> {
    let trimmed = s.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if body.is_empty() {
        return Err(AnchorError::Proof("empty hex string".to_string()));
    }
    hex::decode(body).map_err(|e| AnchorError::Proof(format!("invalid hex: {e}")))
}
