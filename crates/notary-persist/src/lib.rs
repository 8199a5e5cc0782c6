//! # Notary Persistence
//!
//! User and todo storage, plus the per-user failure ledger.
//!
//! Supports:
//! - SQLite (file or in-memory)

pub mod backend;
pub mod models;
pub mod password;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod stats;

pub use backend::{StorageBackend, StorageError};
pub use models::{Todo, TodoStatus};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteBackend, SqliteConfig};
pub use stats::{rank_title, DayTally, FailureEvent, FailureStats};
