//! OpenTimestamps calendar client
//!
//! Submits digests to the public OpenTimestamps calendar servers
//! (https://alice.btc.calendar.opentimestamps.org) and later fetches the
//! Bitcoin-anchored upgrade for the pending commitment.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::digest::decode_hex;
use crate::error::AnchorError;
use crate::timestamp::TimestampClient;

/// Public OTS calendar servers (tried in order)
pub const OTS_CALENDARS: &[&str] = &[
    "https://alice.btc.calendar.opentimestamps.org",
    "https://bob.btc.calendar.opentimestamps.org",
    "https://finney.calendar.eternitywall.com",
];

const PROOF_VERSION: u8 = 1;

// Timestamp operation tags
const OP_ATTESTATION: u8 = 0x00;
const OP_SHA256: u8 = 0x08;
const OP_APPEND: u8 = 0xf0;
const OP_PREPEND: u8 = 0xf1;
const OP_FORK: u8 = 0xff;

/// Serialized proof envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampProof {
    pub version: u8,
    /// Submitted digest (hex)
    pub digest: String,
    /// Calendar that acknowledged the digest
    pub calendar: String,
    /// Calendar reply to the submission (base64)
    pub attestation: String,
    /// Calendar reply to the upgrade request (base64), once available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade: Option<String>,
}

impl TimestampProof {
    pub fn to_bytes(&self) -> Result<Vec<u8>, AnchorError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AnchorError> {
        let proof: Self = serde_json::from_slice(bytes)
            .map_err(|e| AnchorError::Proof(format!("malformed timestamp proof: {e}")))?;
        if proof.version != PROOF_VERSION {
            return Err(AnchorError::Proof(format!(
                "unsupported proof version {}",
                proof.version
            )));
        }
        Ok(proof)
    }

    pub fn is_complete(&self) -> bool {
        self.upgrade.is_some()
    }

    fn attestation_bytes(&self) -> Result<Vec<u8>, AnchorError> {
        STANDARD
            .decode(&self.attestation)
            .map_err(|e| AnchorError::Proof(format!("invalid base64 attestation: {e}")))
    }
}

/// OpenTimestamps calendar client
#[derive(Debug, Clone)]
pub struct CalendarClient {
    calendars: Vec<String>,
    client: reqwest::Client,
}

impl CalendarClient {
    /// Client over the public calendar servers
    pub fn new() -> Result<Self, AnchorError> {
        Self::with_calendars(OTS_CALENDARS.iter().map(|c| c.to_string()).collect())
    }

    /// Client over a custom calendar list
    pub fn with_calendars(calendars: Vec<String>) -> Result<Self, AnchorError> {
        if calendars.is_empty() {
            return Err(AnchorError::Configuration(
                "no timestamp calendars configured".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(concat!("notary-anchor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AnchorError::Configuration(format!("failed to build OTS client: {e}")))?;
        Ok(Self {
            calendars: calendars
                .into_iter()
                .map(|c| c.trim_end_matches('/').to_string())
                .collect(),
            client,
        })
    }

    pub fn calendars(&self) -> &[String] {
        &self.calendars
    }
}

#[async_trait]
impl TimestampClient for CalendarClient {
    fn name(&self) -> &str {
        "opentimestamps"
    }

    async fn create(&self, digest: &[u8]) -> Result<Vec<u8>, AnchorError> {
        if digest.is_empty() {
            return Err(AnchorError::Proof("empty digest".to_string()));
        }

        let mut last_error = AnchorError::Network("No calendars configured".to_string());
        for calendar in &self.calendars {
            let url = format!("{}/digest", calendar);
            let response = self
                .client
                .post(&url)
                .header("Accept", "application/vnd.opentimestamps.v1")
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(digest.to_vec())
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let reply = resp
                        .bytes()
                        .await
                        .map_err(|e| AnchorError::Network(e.to_string()))?;

                    tracing::debug!(
                        calendar = %calendar,
                        bytes = reply.len(),
                        "Calendar accepted digest"
                    );

                    return TimestampProof {
                        version: PROOF_VERSION,
                        digest: hex::encode(digest),
                        calendar: calendar.clone(),
                        attestation: STANDARD.encode(&reply),
                        upgrade: None,
                    }
                    .to_bytes();
                }
                Ok(resp) => {
                    last_error = AnchorError::Network(format!(
                        "Calendar {} returned HTTP {}",
                        calendar,
                        resp.status()
                    ));
                }
                Err(e) => {
                    last_error =
                        AnchorError::Network(format!("Calendar {} unreachable: {}", calendar, e));
                }
            }
            tracing::warn!(calendar = %calendar, error = %last_error, "Calendar submission failed");
        }

        Err(last_error)
    }

    async fn verify(&self, digest: &[u8], proof: &[u8]) -> Result<bool, AnchorError> {
        let proof = TimestampProof::from_bytes(proof)?;
        let proven = decode_hex(&proof.digest)?;
        let attestation = proof.attestation_bytes()?;

        let digest_match: bool = proven.as_slice().ct_eq(digest).into();
        // Non-empty attestation means the calendar acknowledged the submission
        Ok(digest_match && !attestation.is_empty())
    }

    async fn upgrade(&self, proof_bytes: &[u8]) -> Result<Vec<u8>, AnchorError> {
        let mut proof = TimestampProof::from_bytes(proof_bytes)?;
        if proof.is_complete() {
            return Ok(proof_bytes.to_vec());
        }

        let digest = decode_hex(&proof.digest)?;
        let commitment = pending_commitment(&digest, &proof.attestation_bytes()?)?;
        let url = format!("{}/timestamp/{}", proof.calendar, hex::encode(&commitment));

        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.opentimestamps.v1")
            .send()
            .await
            .map_err(|e| {
                AnchorError::Network(format!("Calendar {} unreachable: {}", proof.calendar, e))
            })?;

        match resp.status() {
            s if s.is_success() => {
                let body = resp
                    .bytes()
                    .await
                    .map_err(|e| AnchorError::Network(e.to_string()))?;
                proof.upgrade = Some(STANDARD.encode(&body));
                tracing::info!(
                    calendar = %proof.calendar,
                    digest = %proof.digest,
                    "Timestamp upgraded"
                );
                proof.to_bytes()
            }
            s if s == reqwest::StatusCode::NOT_FOUND => {
                tracing::debug!(digest = %proof.digest, "Timestamp still pending");
                Ok(proof_bytes.to_vec())
            }
            s => Err(AnchorError::Network(format!(
                "Calendar {} returned HTTP {}",
                proof.calendar, s
            ))),
        }
    }
}

/// Apply the linear operation chain of a calendar reply to `digest`,
/// returning the message the pending attestation commits to.
pub(crate) fn pending_commitment(digest: &[u8], ops: &[u8]) -> Result<Vec<u8>, AnchorError> {
    let mut msg = digest.to_vec();
    let mut pos = 0;

    loop {
        let tag = *ops
            .get(pos)
            .ok_or_else(|| AnchorError::Proof("attestation ended before commitment".to_string()))?;
        pos += 1;

        match tag {
            OP_ATTESTATION => return Ok(msg),
            OP_SHA256 => msg = Sha256::digest(&msg).to_vec(),
            OP_APPEND | OP_PREPEND => {
                let (arg, used) = read_varbytes(&ops[pos..])?;
                pos += used;
                if tag == OP_APPEND {
                    msg.extend_from_slice(arg);
                } else {
                    let mut prefixed = arg.to_vec();
                    prefixed.extend_from_slice(&msg);
                    msg = prefixed;
                }
            }
            OP_FORK => {
                return Err(AnchorError::Proof(
                    "forked calendar replies are not supported".to_string(),
                ))
            }
            other => {
                return Err(AnchorError::Proof(format!(
                    "unsupported timestamp operation 0x{other:02x}"
                )))
            }
        }
    }
}

fn read_varuint(buf: &[u8]) -> Result<(usize, usize), AnchorError> {
    let mut value: usize = 0;
    for (i, byte) in buf.iter().enumerate().take(4) {
        value |= ((byte & 0x7f) as usize) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(AnchorError::Proof("truncated or oversized varuint".to_string()))
}

fn read_varbytes(buf: &[u8]) -> Result<(&[u8], usize), AnchorError> {
    let (len, used) = read_varuint(buf)?;
    let end = used
        .checked_add(len)
        .filter(|end| *end <= buf.len())
        .ok_or_else(|| AnchorError::Proof("truncated operation argument".to_string()))?;
    Ok((&buf[used..end], end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(digest: &[u8], attestation: &[u8]) -> Vec<u8> {
        TimestampProof {
            version: PROOF_VERSION,
            digest: hex::encode(digest),
            calendar: "https://calendar.invalid".to_string(),
            attestation: STANDARD.encode(attestation),
            upgrade: None,
        }
        .to_bytes()
        .unwrap()
    }

    #[test]
    fn test_ots_client_name() {
        let client = CalendarClient::new().unwrap();
        assert_eq!(client.name(), "opentimestamps");
        assert_eq!(client.calendars().len(), OTS_CALENDARS.len());
        assert!(CalendarClient::with_calendars(vec![]).is_err());
    }

    #[tokio::test]
    async fn test_verify_envelope() {
        let client = CalendarClient::new().unwrap();
        let digest = [7u8; 32];

        let proof = envelope(&digest, b"\xf0\x01\x00");
        assert!(client.verify(&digest, &proof).await.unwrap());
        assert!(!client.verify(&[8u8; 32], &proof).await.unwrap());

        let empty = envelope(&digest, b"");
        assert!(!client.verify(&digest, &empty).await.unwrap());

        assert!(matches!(
            client.verify(&digest, b"not json").await,
            Err(AnchorError::Proof(_))
        ));
    }

    #[tokio::test]
    async fn test_upgrade_of_complete_proof_is_noop() {
        let client = CalendarClient::new().unwrap();
        let mut proof = TimestampProof::from_bytes(&envelope(&[1u8; 32], b"\x00")).unwrap();
        proof.upgrade = Some(STANDARD.encode(b"bitcoin"));
        let bytes = proof.to_bytes().unwrap();

        assert_eq!(client.upgrade(&bytes).await.unwrap(), bytes);
    }

    #[test]
    fn test_pending_commitment_follows_ops() {
        let digest = [0xaau8; 32];
        let nonce = [0x11u8; 16];

        let mut ops = vec![OP_APPEND, 16];
        ops.extend_from_slice(&nonce);
        ops.push(OP_SHA256);
        ops.extend_from_slice(&[OP_PREPEND, 4, 1, 2, 3, 4]);
        ops.push(OP_ATTESTATION);
        ops.extend_from_slice(b"pending attestation payload");

        let mut expected = digest.to_vec();
        expected.extend_from_slice(&nonce);
        let hashed = Sha256::digest(&expected).to_vec();
        let mut expected = vec![1, 2, 3, 4];
        expected.extend_from_slice(&hashed);

        assert_eq!(pending_commitment(&digest, &ops).unwrap(), expected);
    }

    #[test]
    fn test_pending_commitment_rejects_malformed() {
        assert!(pending_commitment(b"d", &[OP_APPEND, 5, 1]).is_err());
        assert!(pending_commitment(b"d", &[OP_FORK]).is_err());
        assert!(pending_commitment(b"d", &[0x42]).is_err());
        assert!(pending_commitment(b"d", &[OP_SHA256]).is_err());
    }

    #[test]
    fn test_proof_version_checked() {
        let mut proof = TimestampProof::from_bytes(&envelope(&[1u8; 32], b"\x00")).unwrap();
        proof.version = 9;
        let bytes = serde_json::to_vec(&proof).unwrap();
        assert!(matches!(
            TimestampProof::from_bytes(&bytes),
            Err(AnchorError::Proof(_))
        ));
    }
}
