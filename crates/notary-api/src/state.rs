//! Application State
//!
//! Shared, immutable after start: the anchor router, the timestamp client
//! and the user/todo store.

use std::sync::Arc;

use notary_anchor::{AnchorRouter, ChainConfig, TimestampClient, TimestampConfig};
use notary_persist::{SqliteBackend, StorageBackend};

use crate::error::ApiError;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    anchor: Arc<AnchorRouter>,
    timestamps: Arc<dyn TimestampClient>,
    db: Arc<dyn StorageBackend>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        anchor: AnchorRouter,
        timestamps: Arc<dyn TimestampClient>,
        db: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            anchor: Arc::new(anchor),
            timestamps,
            db,
        }
    }

    /// Build every component from its configuration
    pub async fn connect(
        chain: &ChainConfig,
        timestamps: &TimestampConfig,
        database_url: &str,
    ) -> Result<Self, ApiError> {
        let anchor = AnchorRouter::from_config(chain)?;
        if anchor.is_configured() {
            tracing::info!(
                chain = anchor.chain_name(),
                mode = %anchor.mode(),
                signer = anchor.can_anchor(),
                "Anchor router ready"
            );
        } else {
            tracing::warn!("No ledger configured, /evm routes will answer 503");
        }

        let timestamps = timestamps.build_client()?;

        let db = SqliteBackend::new(database_url)
            .await
            .map_err(|e| ApiError::Internal(format!("DB Init failed: {}", e)))?;

        Ok(Self::new(anchor, timestamps, Arc::new(db)))
    }

    /// Get the anchor router
    pub fn anchor(&self) -> &AnchorRouter {
        &self.anchor
    }

    /// Get timestamp client (cloned Arc for sharing)
    pub fn timestamps(&self) -> Arc<dyn TimestampClient> {
        self.timestamps.clone()
    }

    /// Get database backend (cloned Arc for sharing)
    pub fn db(&self) -> Arc<dyn StorageBackend> {
        self.db.clone()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("anchor", &self.anchor)
            .field("timestamps", &self.timestamps.name())
            .field("db", &self.db.name())
            .finish()
    }
}
