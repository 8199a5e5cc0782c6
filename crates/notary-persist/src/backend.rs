//! Storage backend trait and error types

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt::Debug;

use crate::models::Todo;
use crate::stats::FailureStats;

/// Storage error types
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The record exists but its state forbids the change
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Storage backend for users and their todos (Object Safe)
#[async_trait]
pub trait StorageBackend: Send + Sync + Debug {
    /// Get the backend name
    fn name(&self) -> &str;

    /// Check if backend is healthy
    async fn is_healthy(&self) -> bool;

    /// Register a user, returning its id.
    ///
    /// Fails with `AlreadyExists` when the username is taken.
    async fn create_user(&self, username: &str, password: &str) -> Result<i64, StorageError>;

    /// Check a username/password pair, returning the user id
    async fn authenticate(&self, username: &str, password: &str) -> Result<i64, StorageError>;

    /// Add a todo for `user_id`, returning its id
    async fn add_todo(
        &self,
        user_id: i64,
        text: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<i64, StorageError>;

    /// Get a single todo
    async fn get_todo(&self, id: i64) -> Result<Option<Todo>, StorageError>;

    /// All todos of a user, oldest first
    async fn list_todos(&self, user_id: i64) -> Result<Vec<Todo>, StorageError>;

    /// Mark a todo done or not done.
    ///
    /// Completing an open todo counts toward the owner's failure ledger.
    /// Expired todos are frozen and fail with `Conflict`.
    async fn set_todo_done(&self, id: i64, done: bool) -> Result<(), StorageError>;

    /// Delete a todo, returning whether it existed.
    ///
    /// Deleting an unfinished todo counts as abandoning it. Expired todos
    /// are frozen and fail with `Conflict`.
    async fn delete_todo(&self, id: i64) -> Result<bool, StorageError>;

    /// Delete every todo of a user except expired ones, returning how many
    /// went. Unfinished ones count as abandoned.
    async fn purge_todos(&self, user_id: i64) -> Result<u64, StorageError>;

    /// Mark the user's open todos whose deadline is at or before `now` as
    /// expired, returning their ids
    async fn expire_overdue(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<i64>, StorageError>;

    /// The user's failure ledger, rolled over to `today`.
    ///
    /// Fails with `NotFound` for an unknown user.
    async fn failure_stats(
        &self,
        user_id: i64,
        today: NaiveDate,
    ) -> Result<FailureStats, StorageError>;
}
