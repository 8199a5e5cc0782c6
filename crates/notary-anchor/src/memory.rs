//! In-process ledger backend
//!
//! Keeps emitted events in an append-only vector. Suitable for development,
//! testing, and single-node demos where no chain is available.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::digest::Digest32;
use crate::error::AnchorError;
use crate::ledger::{ContractCall, LedgerClient, LogEntry};
use crate::mode::AnchorEvent;

const MEMORY_SUBMITTER: &str = "0x000000000000000000000000000000000000dEaD";

#[derive(Debug, Clone)]
struct StoredEvent {
    event: AnchorEvent,
    entry: LogEntry,
}

/// In-memory ledger backend
#[derive(Debug)]
pub struct MemoryLedger {
    events: RwLock<Vec<StoredEvent>>,
    pending: RwLock<HashMap<String, StoredEvent>>,
    submissions: AtomicU64,
    signer: bool,
    confirmation_delay: Option<Duration>,
}

impl MemoryLedger {
    /// Ledger with a signing account
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            pending: RwLock::new(HashMap::new()),
            submissions: AtomicU64::new(0),
            signer: true,
            confirmation_delay: None,
        }
    }

    /// Ledger that can be read but not written
    pub fn read_only() -> Self {
        Self {
            signer: false,
            ..Self::new()
        }
    }

    /// Delay every confirmation, to exercise confirmation bounds
    pub fn with_confirmation_delay(mut self, delay: Duration) -> Self {
        self.confirmation_delay = Some(delay);
        self
    }

    /// Number of broadcasts that reached this ledger
    pub fn submissions(&self) -> u64 {
        self.submissions.load(Ordering::SeqCst)
    }

    /// Number of confirmed events
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }

    /// Number of broadcast transactions still waiting for confirmation
    pub async fn pending(&self) -> usize {
        self.pending.read().await.len()
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    fn name(&self) -> &str {
        "memory"
    }

    fn can_sign(&self) -> bool {
        self.signer
    }

    async fn broadcast(&self, call: &ContractCall) -> Result<String, AnchorError> {
        let seq = self.submissions.fetch_add(1, Ordering::SeqCst);
        if !self.signer {
            return Err(AnchorError::Configuration(
                "memory ledger opened read-only".to_string(),
            ));
        }

        let mut preimage = Vec::with_capacity(40);
        preimage.extend_from_slice(&seq.to_be_bytes());
        preimage.extend_from_slice(call.hash.as_bytes());
        let tx_id = Digest32::sha256(&preimage).to_hex();

        self.pending.write().await.insert(
            tx_id.clone(),
            StoredEvent {
                event: call.function.emits(),
                entry: LogEntry {
                    tx_id: tx_id.clone(),
                    block_number: 0,
                    hash: call.hash,
                    reference: call.reference.clone(),
                    submitter: MEMORY_SUBMITTER.to_string(),
                    block_timestamp: 0,
                },
            },
        );

        Ok(tx_id)
    }

    async fn confirm(&self, tx_id: &str) -> Result<(), AnchorError> {
        if let Some(delay) = self.confirmation_delay {
            tokio::time::sleep(delay).await;
        }

        let mut stored = self
            .pending
            .write()
            .await
            .remove(tx_id)
            .ok_or_else(|| AnchorError::Submission(format!("unknown transaction {tx_id}")))?;

        let mut events = self.events.write().await;
        stored.entry.block_number = events.len() as u64 + 1;
        stored.entry.block_timestamp = Utc::now().timestamp().max(0) as u64;
        events.push(stored);
        Ok(())
    }

    async fn filter_logs(
        &self,
        event: AnchorEvent,
        hash: &Digest32,
    ) -> Result<Vec<LogEntry>, AnchorError> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|stored| stored.event == event && stored.entry.hash == *hash)
            .map(|stored| stored.entry.clone())
            .collect())
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::AnchorFunction;

    #[tokio::test]
    async fn test_memory_ledger_orders_events() {
        let ledger = MemoryLedger::new();
        let hash = Digest32::sha256(b"doc");

        for reference in ["first", "second"] {
            let call = ContractCall {
                function: AnchorFunction::Record,
                hash,
                reference: reference.to_string(),
            };
            ledger.submit(&call).await.unwrap();
        }

        let logs = ledger
            .filter_logs(AnchorEvent::Recorded, &hash)
            .await
            .unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].reference, "first");
        assert_eq!(logs[1].reference, "second");
        assert!(logs[0].block_number < logs[1].block_number);
        assert_ne!(logs[0].tx_id, logs[1].tx_id);

        let other = ledger.filter_logs(AnchorEvent::Stored, &hash).await.unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn test_read_only_ledger_rejects_submit() {
        let ledger = MemoryLedger::read_only();
        let call = ContractCall {
            function: AnchorFunction::Store,
            hash: Digest32::sha256(b"x"),
            reference: String::new(),
        };
        assert!(!ledger.can_sign());
        assert!(matches!(
            ledger.submit(&call).await,
            Err(AnchorError::Configuration(_))
        ));
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn test_broadcast_is_invisible_until_confirmed() {
        let ledger = MemoryLedger::new();
        let hash = Digest32::sha256(b"doc");
        let call = ContractCall {
            function: AnchorFunction::Record,
            hash,
            reference: "doc-1".to_string(),
        };

        let tx_id = ledger.broadcast(&call).await.unwrap();
        assert_eq!(ledger.pending().await, 1);
        let logs = ledger
            .filter_logs(AnchorEvent::Recorded, &hash)
            .await
            .unwrap();
        assert!(logs.is_empty());

        ledger.confirm(&tx_id).await.unwrap();
        assert_eq!(ledger.pending().await, 0);
        let logs = ledger
            .filter_logs(AnchorEvent::Recorded, &hash)
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].tx_id, tx_id);
        assert_eq!(logs[0].block_number, 1);

        assert!(matches!(
            ledger.confirm("0xunknown").await,
            Err(AnchorError::Submission(_))
        ));
    }
}
