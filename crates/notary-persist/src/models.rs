//! Stored records

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Version tag mixed into canonical todo digests
pub const CANONICAL_VERSION: u32 = 1;

/// A todo item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(feature = "sqlite", derive(sqlx::FromRow))]
pub struct Todo {
    pub id: i64,
    pub user_id: i64,
    pub text: String,
    pub done: bool,
    pub created: DateTime<Utc>,
    /// Deadline; an open todo past it expires
    pub expires_at: Option<DateTime<Utc>>,
    /// Set once the deadline passed while the todo was still open
    pub expired: bool,
}

/// Where a todo stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TodoStatus {
    Open,
    Done,
    Expired,
}

// Field order is the canonical key order.
#[derive(Serialize)]
struct CanonicalTodo<'a> {
    created: String,
    done: bool,
    expires_at: Option<String>,
    id: i64,
    status: TodoStatus,
    text: &'a str,
    user_id: i64,
    version: u32,
}

fn canonical_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl Todo {
    pub fn status(&self) -> TodoStatus {
        if self.expired {
            TodoStatus::Expired
        } else if self.done {
            TodoStatus::Done
        } else {
            TodoStatus::Open
        }
    }

    /// Open, past its deadline, and not yet marked expired
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.done && !self.expired && self.expires_at.is_some_and(|deadline| deadline <= now)
    }

    /// Expired todos are frozen: they can be neither completed nor deleted
    pub fn is_frozen(&self, now: DateTime<Utc>) -> bool {
        self.expired || self.is_overdue(now)
    }

    /// Canonical JSON form used for hashing
    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        let canonical = CanonicalTodo {
            created: canonical_time(&self.created),
            done: self.done,
            expires_at: self.expires_at.as_ref().map(canonical_time),
            id: self.id,
            status: self.status(),
            text: &self.text,
            user_id: self.user_id,
            version: CANONICAL_VERSION,
        };
        serde_json::to_string(&canonical)
    }

    /// SHA-256 of the canonical JSON
    pub fn digest(&self) -> Result<[u8; 32], serde_json::Error> {
        Ok(Sha256::digest(self.canonical_json()?.as_bytes()).into())
    }
}
