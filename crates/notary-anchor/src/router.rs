//! Anchor router
//!
//! Maps `anchor`/`verify_anchor` onto the contract function/event pair chosen
//! by the deployment's [`AnchorMode`], and reconstructs anchors from the
//! ledger's event history.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::ChainConfig;
use crate::digest::Digest32;
use crate::error::AnchorError;
use crate::ledger::{ContractCall, LedgerClient};
use crate::mode::AnchorMode;

/// Receipt returned after a confirmed anchor transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorReceipt {
    /// Transaction id on the ledger
    pub tx_id: String,
    /// Contract the hash was recorded on
    pub contract_address: String,
    /// Display name of the chain
    pub chain_name: String,
    /// Link to the transaction on a block explorer, if one is configured
    pub explorer_url: Option<String>,
    /// Mode the anchor was written under
    pub mode: AnchorMode,
}

/// Result of scanning the ledger for a hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorVerification {
    pub found: bool,
    /// Transaction id of the most recent matching event
    pub tx_id: Option<String>,
}

impl AnchorVerification {
    fn not_found() -> Self {
        Self {
            found: false,
            tx_id: None,
        }
    }
}

/// Routes anchor and verify calls to the configured ledger
#[derive(Clone)]
pub struct AnchorRouter {
    ledger: Option<Arc<dyn LedgerClient>>,
    mode: AnchorMode,
    contract_address: Option<String>,
    chain_name: String,
    explorer_url: Option<String>,
    confirm_timeout: Duration,
}

impl std::fmt::Debug for AnchorRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnchorRouter")
            .field("ledger", &self.ledger.as_ref().map(|l| l.name().to_string()))
            .field("mode", &self.mode)
            .field("contract_address", &self.contract_address)
            .field("chain_name", &self.chain_name)
            .finish()
    }
}

impl AnchorRouter {
    /// Create a router over an already connected ledger (or none)
    pub fn new(config: &ChainConfig, ledger: Option<Arc<dyn LedgerClient>>) -> Self {
        Self {
            ledger,
            mode: config.mode,
            contract_address: config.contract_address.clone(),
            chain_name: config.chain_name.clone(),
            explorer_url: config.explorer_url.clone(),
            confirm_timeout: config.confirm_timeout,
        }
    }

    /// Connect the ledger described by `config` and build the router
    pub fn from_config(config: &ChainConfig) -> Result<Self, AnchorError> {
        let ledger = config.connect_ledger()?;
        Ok(Self::new(config, ledger))
    }

    pub fn mode(&self) -> AnchorMode {
        self.mode
    }

    pub fn chain_name(&self) -> &str {
        &self.chain_name
    }

    /// Whether `verify_anchor` can run
    pub fn is_configured(&self) -> bool {
        self.ledger.is_some()
    }

    /// Whether `anchor` can run
    pub fn can_anchor(&self) -> bool {
        self.ledger.as_ref().is_some_and(|l| l.can_sign())
    }

    /// Ledger health, `None` when no ledger is configured
    pub async fn ledger_healthy(&self) -> Option<bool> {
        match &self.ledger {
            Some(ledger) => Some(ledger.is_healthy().await),
            None => None,
        }
    }

    /// Record `hash` with `reference` on the ledger.
    ///
    /// Blocks until the transaction is confirmed or the confirmation bound
    /// expires.
    pub async fn anchor(
        &self,
        hash: &Digest32,
        reference: &str,
    ) -> Result<AnchorReceipt, AnchorError> {
        let ledger = self.ledger.as_ref().ok_or_else(|| {
            AnchorError::Configuration(
                "set NOTARY_RPC_URL and NOTARY_CONTRACT_ADDRESS to enable anchoring".to_string(),
            )
        })?;
        if !ledger.can_sign() {
            return Err(AnchorError::Configuration(
                "set NOTARY_PRIVATE_KEY to enable anchoring".to_string(),
            ));
        }

        let call = ContractCall {
            function: self.mode.function(),
            hash: *hash,
            reference: reference.to_string(),
        };

        tracing::info!(
            operation = "anchor",
            hash = %hash,
            mode = %self.mode,
            ledger = ledger.name(),
            "Submitting anchor transaction"
        );

        // Broadcast and confirmation share one bound
        let deadline = Instant::now() + self.confirm_timeout;

        let tx_id = match tokio::time::timeout_at(deadline, ledger.broadcast(&call)).await {
            Ok(Ok(tx_id)) => tx_id,
            Ok(Err(e)) => return Err(self.submission_failed(hash, None, e)),
            Err(_) => return Err(self.confirmation_timed_out(hash, None)),
        };

        tracing::info!(
            operation = "anchor",
            hash = %hash,
            tx = %tx_id,
            "Anchor transaction broadcast"
        );

        match tokio::time::timeout_at(deadline, ledger.confirm(&tx_id)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(self.submission_failed(hash, Some(&tx_id), e)),
            Err(_) => return Err(self.confirmation_timed_out(hash, Some(tx_id))),
        }

        tracing::info!(operation = "anchor", hash = %hash, tx = %tx_id, "Anchor confirmed");

        Ok(AnchorReceipt {
            explorer_url: self
                .explorer_url
                .as_ref()
                .map(|base| format!("{base}/tx/{tx_id}")),
            tx_id,
            contract_address: self
                .contract_address
                .clone()
                .unwrap_or_else(|| ledger.name().to_string()),
            chain_name: self.chain_name.clone(),
            mode: self.mode,
        })
    }

    fn submission_failed(
        &self,
        hash: &Digest32,
        tx_id: Option<&str>,
        e: AnchorError,
    ) -> AnchorError {
        let err = e.into_submission();
        tracing::error!(
            operation = "anchor",
            hash = %hash,
            tx = tx_id.unwrap_or("none"),
            error = %err,
            "Anchor failed"
        );
        err
    }

    fn confirmation_timed_out(&self, hash: &Digest32, tx_id: Option<String>) -> AnchorError {
        tracing::error!(
            operation = "anchor",
            hash = %hash,
            tx = tx_id.as_deref().unwrap_or("none"),
            timeout = ?self.confirm_timeout,
            "Anchor confirmation timed out"
        );
        AnchorError::ConfirmationTimeout {
            timeout: self.confirm_timeout,
            tx_id,
        }
    }

    /// Look `hash` up in the ledger's event history.
    ///
    /// When the hash was anchored more than once, the latest anchor wins.
    pub async fn verify_anchor(&self, hash: &Digest32) -> Result<AnchorVerification, AnchorError> {
        let ledger = self.ledger.as_ref().ok_or_else(|| {
            AnchorError::Configuration(
                "set NOTARY_RPC_URL and NOTARY_CONTRACT_ADDRESS to enable verification"
                    .to_string(),
            )
        })?;

        let event = self.mode.event();
        let logs = ledger.filter_logs(event, hash).await.map_err(|e| {
            let err = e.into_verification();
            tracing::error!(operation = "verify", hash = %hash, error = %err, "Log query failed");
            err
        })?;

        let Some(latest) = logs.last() else {
            tracing::debug!(
                operation = "verify",
                hash = %hash,
                mode = %self.mode,
                "No anchor found"
            );
            return Ok(AnchorVerification::not_found());
        };

        tracing::debug!(
            operation = "verify",
            hash = %hash,
            matches = logs.len(),
            tx = %latest.tx_id,
            "Anchor found"
        );

        Ok(AnchorVerification {
            found: true,
            tx_id: Some(latest.tx_id.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLedger;

    fn config(mode: AnchorMode) -> ChainConfig {
        ChainConfig {
            mode,
            contract_address: Some("0x5FbDB2315678afecb367f032d93F642f64180aa3".to_string()),
            chain_name: "testnet".to_string(),
            explorer_url: Some("https://explorer.test".to_string()),
            ..ChainConfig::default()
        }
    }

    fn router(mode: AnchorMode, ledger: Arc<MemoryLedger>) -> AnchorRouter {
        AnchorRouter::new(&config(mode), Some(ledger as Arc<dyn LedgerClient>))
    }

    fn abc_hash() -> Digest32 {
        Digest32::from_hex(&format!("0x{}", "abc0".repeat(16))).unwrap()
    }

    #[tokio::test]
    async fn test_anchor_then_verify_lite() {
        let ledger = Arc::new(MemoryLedger::new());
        let router = router(AnchorMode::Lite, ledger.clone());
        let hash = abc_hash();

        let receipt = router.anchor(&hash, "doc-1").await.unwrap();
        assert!(!receipt.tx_id.is_empty());
        assert_eq!(receipt.chain_name, "testnet");
        assert_eq!(receipt.mode, AnchorMode::Lite);
        assert_eq!(
            receipt.explorer_url,
            Some(format!("https://explorer.test/tx/{}", receipt.tx_id))
        );

        let verification = router.verify_anchor(&hash).await.unwrap();
        assert!(verification.found);
        assert_eq!(verification.tx_id, Some(receipt.tx_id));
    }

    #[tokio::test]
    async fn test_verify_unknown_hash() {
        let router = router(AnchorMode::Full, Arc::new(MemoryLedger::new()));
        let verification = router
            .verify_anchor(&Digest32::sha256(b"never anchored"))
            .await
            .unwrap();
        assert!(!verification.found);
        assert!(verification.tx_id.is_none());
    }

    #[tokio::test]
    async fn test_latest_anchor_wins() {
        let router = router(AnchorMode::Full, Arc::new(MemoryLedger::new()));
        let hash = abc_hash();

        let first = router.anchor(&hash, "doc-1").await.unwrap();
        let second = router.anchor(&hash, "doc-1-rev").await.unwrap();
        assert_ne!(first.tx_id, second.tx_id);

        let verification = router.verify_anchor(&hash).await.unwrap();
        assert_eq!(verification.tx_id, Some(second.tx_id));
    }

    #[tokio::test]
    async fn test_mode_isolation() {
        let ledger = Arc::new(MemoryLedger::new());
        let lite = router(AnchorMode::Lite, ledger.clone());
        let full = router(AnchorMode::Full, ledger.clone());

        let lite_hash = Digest32::sha256(b"lite");
        let full_hash = Digest32::sha256(b"full");
        lite.anchor(&lite_hash, "a").await.unwrap();
        full.anchor(&full_hash, "b").await.unwrap();

        assert!(lite.verify_anchor(&lite_hash).await.unwrap().found);
        assert!(!full.verify_anchor(&lite_hash).await.unwrap().found);
        assert!(full.verify_anchor(&full_hash).await.unwrap().found);
        assert!(!lite.verify_anchor(&full_hash).await.unwrap().found);
    }

    #[tokio::test]
    async fn test_anchor_without_ledger_is_configuration_error() {
        let router = AnchorRouter::new(&ChainConfig::default(), None);
        assert!(!router.is_configured());

        let err = router.anchor(&abc_hash(), "doc-1").await.unwrap_err();
        assert!(matches!(err, AnchorError::Configuration(_)));

        let err = router.verify_anchor(&abc_hash()).await.unwrap_err();
        assert!(matches!(err, AnchorError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_anchor_without_signer_makes_no_ledger_call() {
        let ledger = Arc::new(MemoryLedger::read_only());
        let router = router(AnchorMode::Lite, ledger.clone());
        assert!(router.is_configured());
        assert!(!router.can_anchor());

        let err = router.anchor(&abc_hash(), "doc-1").await.unwrap_err();
        assert!(matches!(err, AnchorError::Configuration(_)));
        assert_eq!(ledger.submissions(), 0);

        // Read-only verification still works
        assert!(!router.verify_anchor(&abc_hash()).await.unwrap().found);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_confirmation_times_out() {
        let ledger =
            Arc::new(MemoryLedger::new().with_confirmation_delay(Duration::from_secs(600)));
        let mut cfg = config(AnchorMode::Lite);
        cfg.confirm_timeout = Duration::from_secs(5);
        let router = AnchorRouter::new(&cfg, Some(ledger.clone() as Arc<dyn LedgerClient>));

        let err = router.anchor(&abc_hash(), "doc-1").await.unwrap_err();
        match err {
            AnchorError::ConfirmationTimeout { timeout, tx_id } => {
                assert_eq!(timeout, Duration::from_secs(5));
                // The broadcast went through, so the pending tx is reported
                assert!(tx_id.is_some_and(|tx| tx.starts_with("0x")));
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
        assert!(ledger.is_empty().await);
        assert_eq!(ledger.pending().await, 1);
    }

    /// Ledger whose broadcast never returns
    struct StalledLedger;

    #[async_trait::async_trait]
    impl LedgerClient for StalledLedger {
        fn name(&self) -> &str {
            "stalled"
        }

        fn can_sign(&self) -> bool {
            true
        }

        async fn broadcast(&self, _call: &ContractCall) -> Result<String, AnchorError> {
            std::future::pending().await
        }

        async fn confirm(&self, _tx_id: &str) -> Result<(), AnchorError> {
            Ok(())
        }

        async fn filter_logs(
            &self,
            _event: crate::mode::AnchorEvent,
            _hash: &Digest32,
        ) -> Result<Vec<crate::ledger::LogEntry>, AnchorError> {
            Ok(Vec::new())
        }

        async fn is_healthy(&self) -> bool {
            true
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_broadcast_times_out_without_tx() {
        let mut cfg = config(AnchorMode::Full);
        cfg.confirm_timeout = Duration::from_millis(750);
        let ledger: Arc<dyn LedgerClient> = Arc::new(StalledLedger);
        let router = AnchorRouter::new(&cfg, Some(ledger));

        let err = router.anchor(&abc_hash(), "doc-1").await.unwrap_err();
        assert!(matches!(
            err,
            AnchorError::ConfirmationTimeout { timeout, tx_id: None }
                if timeout == Duration::from_millis(750)
        ));
    }
}
