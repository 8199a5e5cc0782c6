//! # Notary Anchor
//!
//! Records content hashes on an EVM contract and answers "was this hash
//! recorded?" by replaying the contract's events, plus an OpenTimestamps
//! client for chain-independent timestamp proofs.
//!
//! ## Backends
//!
//! - **EvmLedger**: JSON-RPC ledger with local transaction signing
//! - **MemoryLedger**: in-process event log (development, tests)
//! - **CalendarClient**: OpenTimestamps calendar proofs
//! - **MemoryTimestamper**: offline deterministic proofs
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use notary_anchor::{AnchorRouter, ChainConfig, Digest32, LedgerClient, MemoryLedger};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ChainConfig::default();
//!     let ledger: Arc<dyn LedgerClient> = Arc::new(MemoryLedger::new());
//!     let router = AnchorRouter::new(&config, Some(ledger));
//!
//!     let hash = Digest32::sha256(b"document");
//!     let receipt = router.anchor(&hash, "doc-1").await?;
//!     let verification = router.verify_anchor(&hash).await?;
//!     assert_eq!(verification.tx_id, Some(receipt.tx_id));
//!
//!     Ok(())
//! }
//! ```

mod config;
mod digest;
mod error;
mod ledger;
mod memory;
mod mode;
mod router;
mod timestamp;

#[cfg(feature = "ethereum")]
mod ethereum;

#[cfg(feature = "opentimestamps")]
mod opentimestamps;

pub use config::{ChainConfig, LedgerKind, TimestampConfig, TimestampKind};
pub use digest::{decode_hex, Digest32};
pub use error::AnchorError;
pub use ledger::{ContractCall, LedgerClient, LogEntry};
pub use memory::MemoryLedger;
pub use mode::{AnchorEvent, AnchorFunction, AnchorMode};
pub use router::{AnchorReceipt, AnchorRouter, AnchorVerification};
pub use timestamp::{MemoryTimestamper, TimestampClient};

#[cfg(feature = "ethereum")]
pub use ethereum::{EvmConfig, EvmLedger};

#[cfg(feature = "opentimestamps")]
pub use opentimestamps::{CalendarClient, TimestampProof, OTS_CALENDARS};
