//! Error types for anchoring and timestamping operations

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during anchor, verify and proof operations
#[derive(Debug, Error)]
pub enum AnchorError {
    /// Chain client or signing account is not configured
    #[error("Chain not configured: {0}")]
    Configuration(String),

    /// Transaction build, signing, broadcast or confirmation failed
    #[error("Anchor submission failed: {0}")]
    Submission(String),

    /// The ledger did not confirm the transaction within the bound.
    ///
    /// `tx_id` is set when the transaction was broadcast before the bound hit;
    /// it may still be mined later.
    #[error("Confirmation timed out after {timeout:?}{}", pending_tx(.tx_id))]
    ConfirmationTimeout {
        timeout: Duration,
        tx_id: Option<String>,
    },

    /// Event log query failed
    #[error("Verification query failed: {0}")]
    VerificationQuery(String),

    /// Malformed hash/proof input or proof rejected by the timestamp client
    #[error("Proof error: {0}")]
    Proof(String),

    /// Transport or RPC level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AnchorError {
    /// Fold a ledger failure into the submission error kind.
    ///
    /// Configuration and timeout errors keep their own kind.
    pub(crate) fn into_submission(self) -> Self {
        match self {
            e @ (AnchorError::Configuration(_)
            | AnchorError::Submission(_)
            | AnchorError::ConfirmationTimeout { .. }) => e,
            other => AnchorError::Submission(other.to_string()),
        }
    }

    /// Fold a ledger failure into the verification query error kind.
    pub(crate) fn into_verification(self) -> Self {
        match self {
            e @ (AnchorError::Configuration(_) | AnchorError::VerificationQuery(_)) => e,
            other => AnchorError::VerificationQuery(other.to_string()),
        }
    }
}

fn pending_tx(tx_id: &Option<String>) -> String {
    match tx_id {
        Some(tx) => format!(" (transaction {tx} still pending)"),
        None => String::new(),
    }
}
