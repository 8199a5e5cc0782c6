//! Ledger client capability
//!
//! The router never talks to a chain directly. Everything that touches the
//! ledger (nonce lookup, fee estimation, signing, broadcast, receipt polling,
//! log filtering) lives behind [`LedgerClient`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::digest::Digest32;
use crate::error::AnchorError;
use crate::mode::{AnchorEvent, AnchorFunction};

/// A state-changing contract call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub function: AnchorFunction,
    pub hash: Digest32,
    pub reference: String,
}

/// One decoded anchor event as found in the ledger's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Transaction that emitted the event
    pub tx_id: String,
    /// Block the transaction was included in
    pub block_number: u64,
    /// Anchored hash
    pub hash: Digest32,
    /// Reference string passed to the contract
    pub reference: String,
    /// Address that submitted the anchor
    pub submitter: String,
    /// Block timestamp as recorded by the contract
    pub block_timestamp: u64,
}

/// Trait for ledger backends
///
/// Implementations should be:
/// - Append-only (events are never rewritten)
/// - Ordered (`filter_logs` returns entries oldest first)
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Human-readable name of this backend
    fn name(&self) -> &str;

    /// Whether a signing account is available for `submit`
    fn can_sign(&self) -> bool;

    /// Build, sign and broadcast the call.
    ///
    /// Returns the transaction id as soon as the ledger accepted it.
    async fn broadcast(&self, call: &ContractCall) -> Result<String, AnchorError>;

    /// Wait until `tx_id` is included. A reverted transaction is a
    /// [`AnchorError::Submission`].
    async fn confirm(&self, tx_id: &str) -> Result<(), AnchorError>;

    /// Broadcast the call and wait for inclusion
    async fn submit(&self, call: &ContractCall) -> Result<String, AnchorError> {
        let tx_id = self.broadcast(call).await?;
        self.confirm(&tx_id).await?;
        Ok(tx_id)
    }

    /// All events of `event` whose hash equals `hash`, from genesis to head,
    /// in chain order.
    async fn filter_logs(
        &self,
        event: AnchorEvent,
        hash: &Digest32,
    ) -> Result<Vec<LogEntry>, AnchorError>;

    /// Check if the backend is reachable
    async fn is_healthy(&self) -> bool;
}
