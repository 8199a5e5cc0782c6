//! Timestamp proof capability

use async_trait::async_trait;
use subtle::ConstantTimeEq;

use crate::digest::Digest32;
use crate::error::AnchorError;

/// Trait for timestamp proof clients
///
/// Proofs are opaque byte strings owned by the implementation.
#[async_trait]
pub trait TimestampClient: Send + Sync {
    /// Human-readable name of this client
    fn name(&self) -> &str;

    /// Create a proof that `digest` existed now
    async fn create(&self, digest: &[u8]) -> Result<Vec<u8>, AnchorError>;

    /// Check `proof` against `digest`
    async fn verify(&self, digest: &[u8], proof: &[u8]) -> Result<bool, AnchorError>;

    /// Complete a pending proof where possible; pending proofs come back unchanged
    async fn upgrade(&self, proof: &[u8]) -> Result<Vec<u8>, AnchorError>;
}

const MEMORY_MAGIC: &[u8; 8] = b"NTRYOTS\x01";
const MEMORY_PROOF_LEN: usize = MEMORY_MAGIC.len() + 1 + 32;

/// Offline timestamp client
///
/// Proof layout: magic (8) | complete flag (1) | sha256(digest) (32).
#[derive(Debug, Clone, Default)]
pub struct MemoryTimestamper;

impl MemoryTimestamper {
    pub fn new() -> Self {
        Self
    }

    fn parse(proof: &[u8]) -> Result<(bool, &[u8]), AnchorError> {
        if proof.len() != MEMORY_PROOF_LEN || !proof.starts_with(MEMORY_MAGIC) {
            return Err(AnchorError::Proof("not a memory timestamp proof".to_string()));
        }
        let complete = match proof[MEMORY_MAGIC.len()] {
            0 => false,
            1 => true,
            other => return Err(AnchorError::Proof(format!("invalid proof state {other}"))),
        };
        Ok((complete, &proof[MEMORY_MAGIC.len() + 1..]))
    }
}

#[async_trait]
impl TimestampClient for MemoryTimestamper {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create(&self, digest: &[u8]) -> Result<Vec<u8>, AnchorError> {
        if digest.is_empty() {
            return Err(AnchorError::Proof("empty digest".to_string()));
        }
        let mut proof = Vec::with_capacity(MEMORY_PROOF_LEN);
        proof.extend_from_slice(MEMORY_MAGIC);
        proof.push(0);
        proof.extend_from_slice(Digest32::sha256(digest).as_bytes());
        Ok(proof)
    }

    async fn verify(&self, digest: &[u8], proof: &[u8]) -> Result<bool, AnchorError> {
        let (_, commitment) = Self::parse(proof)?;
        let expected = Digest32::sha256(digest);
        Ok(commitment.ct_eq(expected.as_bytes()).into())
    }

    async fn upgrade(&self, proof: &[u8]) -> Result<Vec<u8>, AnchorError> {
        Self::parse(proof)?;
        let mut upgraded = proof.to_vec();
        upgraded[MEMORY_MAGIC.len()] = 1;
        Ok(upgraded)
    }
}
