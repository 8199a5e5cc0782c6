//! Contract calling convention selected at deployment time

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which contract function/event pair the router targets.
///
/// `Lite` writes through `record(hash, ref)` and emits `Recorded`;
/// `Full` writes through `store(hash, ref)` and emits `Stored`. The two event
/// types are disjoint, so a hash is only found again under the mode that
/// anchored it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorMode {
    #[default]
    Lite,
    Full,
}

impl AnchorMode {
    /// Write operation used by `anchor`
    pub fn function(self) -> AnchorFunction {
        match self {
            AnchorMode::Lite => AnchorFunction::Record,
            AnchorMode::Full => AnchorFunction::Store,
        }
    }

    /// Event scanned by `verify_anchor`
    pub fn event(self) -> AnchorEvent {
        match self {
            AnchorMode::Lite => AnchorEvent::Recorded,
            AnchorMode::Full => AnchorEvent::Stored,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AnchorMode::Lite => "lite",
            AnchorMode::Full => "full",
        }
    }
}

impl fmt::Display for AnchorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnchorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lite" => Ok(AnchorMode::Lite),
            "full" => Ok(AnchorMode::Full),
            other => Err(format!("unknown anchor mode '{other}', expected 'lite' or 'full'")),
        }
    }
}

/// State-changing contract function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnchorFunction {
    Record,
    Store,
}

/// Contract event carrying an anchored hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnchorEvent {
    Recorded,
    Stored,
}

impl AnchorFunction {
    /// Event emitted when this function succeeds
    pub fn emits(self) -> AnchorEvent {
        match self {
            AnchorFunction::Record => AnchorEvent::Recorded,
            AnchorFunction::Store => AnchorEvent::Stored,
        }
    }
}
