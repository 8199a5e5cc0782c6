//! Chain configuration, read once at start

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::digest::decode_hex;
use crate::error::AnchorError;
use crate::ledger::LedgerClient;
use crate::memory::MemoryLedger;
use crate::mode::AnchorMode;
use crate::timestamp::{MemoryTimestamper, TimestampClient};

/// Default bound on how long `anchor` waits for inclusion
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(90);
/// Default receipt polling interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Which ledger backend to connect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedgerKind {
    #[default]
    Evm,
    Memory,
}

impl FromStr for LedgerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "evm" | "ethereum" => Ok(LedgerKind::Evm),
            "memory" => Ok(LedgerKind::Memory),
            other => Err(format!("unknown ledger '{other}', expected 'evm' or 'memory'")),
        }
    }
}

/// Immutable chain configuration
///
/// Every field is optional at the environment level: a missing RPC endpoint,
/// contract or key disables the anchor routes with a configuration error
/// instead of failing startup.
#[derive(Clone)]
pub struct ChainConfig {
    pub ledger: LedgerKind,
    pub rpc_url: Option<String>,
    pub private_key: Option<String>,
    pub contract_address: Option<String>,
    pub chain_name: String,
    pub explorer_url: Option<String>,
    pub chain_id: Option<u64>,
    pub mode: AnchorMode,
    pub confirm_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerKind::Evm,
            rpc_url: None,
            private_key: None,
            contract_address: None,
            chain_name: "evm".to_string(),
            explorer_url: None,
            chain_id: None,
            mode: AnchorMode::Lite,
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

// The signing key must never reach the logs.
impl fmt::Debug for ChainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainConfig")
            .field("ledger", &self.ledger)
            .field("rpc_url", &self.rpc_url)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("contract_address", &self.contract_address)
            .field("chain_name", &self.chain_name)
            .field("explorer_url", &self.explorer_url)
            .field("chain_id", &self.chain_id)
            .field("mode", &self.mode)
            .field("confirm_timeout", &self.confirm_timeout)
            .finish()
    }
}

impl ChainConfig {
    /// Create from `NOTARY_*` environment variables
    pub fn from_env() -> Result<Self, AnchorError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AnchorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let ledger = match get("NOTARY_LEDGER") {
            Some(v) => v.parse().map_err(AnchorError::Configuration)?,
            None => defaults.ledger,
        };
        let mode = match get("NOTARY_ANCHOR_MODE") {
            Some(v) => v.parse().map_err(AnchorError::Configuration)?,
            None => defaults.mode,
        };
        let chain_id = match get("NOTARY_CHAIN_ID") {
            Some(v) => Some(v.parse::<u64>().map_err(|e| {
                AnchorError::Configuration(format!("invalid NOTARY_CHAIN_ID '{v}': {e}"))
            })?),
            None => None,
        };
        let confirm_timeout = match get("NOTARY_CONFIRM_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(v.parse::<u64>().map_err(|e| {
                AnchorError::Configuration(format!(
                    "invalid NOTARY_CONFIRM_TIMEOUT_SECS '{v}': {e}"
                ))
            })?),
            None => defaults.confirm_timeout,
        };

        // Checked even when the ledger stays disabled, so a typo fails startup
        let private_key = get("NOTARY_PRIVATE_KEY");
        if let Some(key) = &private_key {
            check_private_key(key)?;
        }

        Ok(Self {
            ledger,
            rpc_url: get("NOTARY_RPC_URL"),
            private_key,
            contract_address: get("NOTARY_CONTRACT_ADDRESS"),
            chain_name: get("NOTARY_CHAIN_NAME").unwrap_or(defaults.chain_name),
            explorer_url: get("NOTARY_EXPLORER_URL").map(|u| u.trim_end_matches('/').to_string()),
            chain_id,
            mode,
            confirm_timeout,
            poll_interval: defaults.poll_interval,
        })
    }

    /// Connect the configured ledger backend.
    ///
    /// Returns `Ok(None)` when the EVM backend lacks an endpoint or contract.
    pub fn connect_ledger(&self) -> Result<Option<Arc<dyn LedgerClient>>, AnchorError> {
        match self.ledger {
            LedgerKind::Memory => {
                tracing::warn!("Using in-memory ledger - anchors are lost on restart");
                Ok(Some(Arc::new(MemoryLedger::new())))
            }
            LedgerKind::Evm => self.connect_evm(),
        }
    }

    #[cfg(feature = "ethereum")]
    fn connect_evm(&self) -> Result<Option<Arc<dyn LedgerClient>>, AnchorError> {
        use crate::ethereum::{EvmConfig, EvmLedger};

        let (Some(rpc_url), Some(contract)) = (&self.rpc_url, &self.contract_address) else {
            tracing::warn!(
                "NOTARY_RPC_URL or NOTARY_CONTRACT_ADDRESS not set, anchor routes disabled"
            );
            return Ok(None);
        };
        if self.private_key.is_none() {
            tracing::warn!("NOTARY_PRIVATE_KEY not set, ledger opened read-only");
        }

        let ledger = EvmLedger::new(EvmConfig {
            rpc_url: rpc_url.clone(),
            contract_address: contract.clone(),
            private_key: self.private_key.clone(),
            chain_id: self.chain_id,
            poll_interval: self.poll_interval,
        })?;
        Ok(Some(Arc::new(ledger)))
    }

    #[cfg(not(feature = "ethereum"))]
    fn connect_evm(&self) -> Result<Option<Arc<dyn LedgerClient>>, AnchorError> {
        tracing::warn!("Built without the `ethereum` feature, anchor routes disabled");
        Ok(None)
    }
}

/// A signing key is 32 bytes of hex, optionally `0x`-prefixed, and not zero.
///
/// The error never echoes the key.
fn check_private_key(key: &str) -> Result<(), AnchorError> {
    match decode_hex(key) {
        Ok(bytes) if bytes.len() == 32 && bytes.iter().any(|b| *b != 0) => Ok(()),
        Ok(bytes) => Err(AnchorError::Configuration(format!(
            "NOTARY_PRIVATE_KEY must be a non-zero 32-byte hex key, got {} bytes",
            bytes.len()
        ))),
        Err(_) => Err(AnchorError::Configuration(
            "NOTARY_PRIVATE_KEY is not valid hex".to_string(),
        )),
    }
}

/// Which timestamp client to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampKind {
    #[default]
    Calendar,
    Memory,
}

impl FromStr for TimestampKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "calendar" | "opentimestamps" => Ok(TimestampKind::Calendar),
            "memory" => Ok(TimestampKind::Memory),
            other => Err(format!(
                "unknown timestamp backend '{other}', expected 'calendar' or 'memory'"
            )),
        }
    }
}

/// Timestamp client configuration
#[derive(Debug, Clone, Default)]
pub struct TimestampConfig {
    pub kind: TimestampKind,
    /// Calendar URLs; empty means the public calendars
    pub calendars: Vec<String>,
}

impl TimestampConfig {
    /// Create from `NOTARY_OTS_*` environment variables
    pub fn from_env() -> Result<Self, AnchorError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AnchorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let kind = match lookup("NOTARY_OTS_BACKEND").filter(|v| !v.trim().is_empty()) {
            Some(v) => v.parse().map_err(AnchorError::Configuration)?,
            None => TimestampKind::default(),
        };
        let calendars = lookup("NOTARY_OTS_CALENDARS")
            .map(|v| {
                v.split(',')
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self { kind, calendars })
    }

    /// Build the configured timestamp client
    pub fn build_client(&self) -> Result<Arc<dyn TimestampClient>, AnchorError> {
        match self.kind {
            TimestampKind::Memory => {
                tracing::warn!("Using in-memory timestamp client - proofs are not anchored");
                Ok(Arc::new(MemoryTimestamper::new()))
            }
            TimestampKind::Calendar => self.build_calendar(),
        }
    }

    #[cfg(feature = "opentimestamps")]
    fn build_calendar(&self) -> Result<Arc<dyn TimestampClient>, AnchorError> {
        use crate::opentimestamps::CalendarClient;

        let client = if self.calendars.is_empty() {
            CalendarClient::new()?
        } else {
            CalendarClient::with_calendars(self.calendars.clone())?
        };
        Ok(Arc::new(client))
    }

    #[cfg(not(feature = "opentimestamps"))]
    fn build_calendar(&self) -> Result<Arc<dyn TimestampClient>, AnchorError> {
        Err(AnchorError::Configuration(
            "built without the `opentimestamps` feature".to_string(),
        ))
    }
}
