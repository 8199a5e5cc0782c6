//! SQLite backend implementation

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

use crate::backend::{StorageBackend, StorageError};
use crate::models::Todo;
use crate::password::{hash_password, verify_password};
use crate::stats::{DayTally, FailureEvent, FailureStats};

const TODO_COLUMNS: &str = "id, user_id, text, done, created, expires_at, expired";

/// SQLite configuration options
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database URL (e.g., "sqlite:notary.db?mode=rwc" or "sqlite::memory:")
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Enable WAL journal mode for better concurrency
    pub wal_mode: bool,
    /// Enable foreign key enforcement
    pub foreign_keys: bool,
    /// Busy timeout in seconds
    pub busy_timeout_secs: u32,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:notary.db?mode=rwc".to_string(),
            max_connections: 5,
            wal_mode: true,
            foreign_keys: true,
            busy_timeout_secs: 30,
        }
    }
}

impl SqliteConfig {
    /// Create config for in-memory database (testing)
    ///
    /// A single connection: every in-memory connection is its own database.
    pub fn memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            wal_mode: false,
            foreign_keys: true,
            busy_timeout_secs: 5,
        }
    }

    /// Config for `url`, in-memory aware
    pub fn for_url(url: &str) -> Self {
        if url.contains(":memory:") {
            Self {
                url: url.to_string(),
                ..Self::memory()
            }
        } else {
            Self {
                url: url.to_string(),
                ..Self::default()
            }
        }
    }
}

/// SQLite storage backend
#[derive(Debug)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

fn query_error(e: sqlx::Error) -> StorageError {
    StorageError::Query(e.to_string())
}

fn frozen(id: i64) -> StorageError {
    StorageError::Conflict(format!("todo {} has expired", id))
}

fn to_count(v: i64) -> u64 {
    u64::try_from(v).unwrap_or(0)
}

fn to_column(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

async fn fetch_todo(conn: &mut SqliteConnection, id: i64) -> Result<Option<Todo>, StorageError> {
    sqlx::query_as::<_, Todo>(&format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(query_error)
}

async fn load_stats(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<FailureStats, StorageError> {
    let row: Option<(i64, i64, i64, i64, Option<NaiveDate>)> = sqlx::query_as(
        "SELECT total_expired, total_deleted_unfinished, streak_days, shame_points, last_date \
         FROM failure_stats WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(query_error)?;

    let days: Vec<(NaiveDate, i64, i64, i64)> = sqlx::query_as(
        "SELECT day, expired, deleted, completed FROM failure_history WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(query_error)?;

    let mut stats = FailureStats::default();
    if let Some((expired, deleted, streak, points, last_date)) = row {
        stats.total_expired = to_count(expired);
        stats.total_deleted_unfinished = to_count(deleted);
        stats.streak_days = to_count(streak);
        stats.shame_points = to_count(points);
        stats.last_date = last_date;
    }
    stats.history = days
        .into_iter()
        .map(|(day, expired, deleted, completed)| {
            let tally = DayTally {
                expired: to_count(expired),
                deleted: to_count(deleted),
                completed: to_count(completed),
            };
            (day, tally)
        })
        .collect();
    Ok(stats)
}

async fn save_stats(
    conn: &mut SqliteConnection,
    user_id: i64,
    stats: &FailureStats,
) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT INTO failure_stats \
         (user_id, total_expired, total_deleted_unfinished, streak_days, shame_points, last_date) \
         VALUES (?, ?, ?, ?, ?, ?) \
         ON CONFLICT(user_id) DO UPDATE SET \
         total_expired = excluded.total_expired, \
         total_deleted_unfinished = excluded.total_deleted_unfinished, \
         streak_days = excluded.streak_days, \
         shame_points = excluded.shame_points, \
         last_date = excluded.last_date",
    )
    .bind(user_id)
    .bind(to_column(stats.total_expired))
    .bind(to_column(stats.total_deleted_unfinished))
    .bind(to_column(stats.streak_days))
    .bind(to_column(stats.shame_points))
    .bind(stats.last_date)
    .execute(&mut *conn)
    .await
    .map_err(query_error)?;

    for (day, tally) in &stats.history {
        sqlx::query(
            "INSERT INTO failure_history (user_id, day, expired, deleted, completed) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(user_id, day) DO UPDATE SET \
             expired = excluded.expired, \
             deleted = excluded.deleted, \
             completed = excluded.completed",
        )
        .bind(user_id)
        .bind(day)
        .bind(to_column(tally.expired))
        .bind(to_column(tally.deleted))
        .bind(to_column(tally.completed))
        .execute(&mut *conn)
        .await
        .map_err(query_error)?;
    }
    Ok(())
}

/// Count `events` against the user's ledger for `today`
async fn record_failures(
    conn: &mut SqliteConnection,
    user_id: i64,
    events: &[FailureEvent],
    today: NaiveDate,
) -> Result<(), StorageError> {
    if events.is_empty() {
        return Ok(());
    }
    let mut stats = load_stats(conn, user_id).await?;
    for event in events {
        stats.record(*event, today);
    }
    save_stats(conn, user_id, &stats).await?;
    debug!(user_id, events = events.len(), "Failure ledger updated");
    Ok(())
}

impl SqliteBackend {
    /// Create a new SQLite backend for `url`
    pub async fn new(url: &str) -> Result<Self, StorageError> {
        Self::new_with_config(SqliteConfig::for_url(url)).await
    }

    /// Create a new SQLite backend with full configuration
    pub async fn new_with_config(config: SqliteConfig) -> Result<Self, StorageError> {
        let mut options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        if config.foreign_keys {
            options = options.pragma("foreign_keys", "ON");
        }
        options = options.pragma("busy_timeout", (config.busy_timeout_secs * 1000).to_string());

        if config.wal_mode {
            options = options.pragma("journal_mode", "WAL");
        }

        let mut pool_options = SqlitePoolOptions::new().max_connections(config.max_connections);
        if config.max_connections == 1 {
            // Keep the in-memory database alive for the life of the pool
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        info!(url = %config.url, wal = config.wal_mode, "Connected to SQLite");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StorageError::Internal(format!("Migration failed: {}", e)))?;

        Ok(Self { pool })
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn is_healthy(&self) -> bool {
        if self.pool.is_closed() {
            return false;
        }
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn create_user(&self, username: &str, password: &str) -> Result<i64, StorageError> {
        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))??;

        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, created) VALUES (?, ?, ?)",
        )
        .bind(username)
        .bind(password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => {
                let id = done.last_insert_rowid();
                debug!(user_id = id, "User registered");
                Ok(id)
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                StorageError::AlreadyExists(format!("username '{}' is taken", username)),
            ),
            Err(e) => Err(query_error(e)),
        }
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<i64, StorageError> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, password_hash FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.pool)
                .await
                .map_err(query_error)?;

        let Some((id, phc)) = row else {
            return Err(StorageError::InvalidCredentials);
        };

        let password = password.to_string();
        let valid = tokio::task::spawn_blocking(move || verify_password(&password, &phc))
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))??;

        if valid {
            Ok(id)
        } else {
            Err(StorageError::InvalidCredentials)
        }
    }

    async fn add_todo(
        &self,
        user_id: i64,
        text: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<i64, StorageError> {
        let result = sqlx::query(
            "INSERT INTO todos (user_id, text, done, created, expires_at) VALUES (?, ?, 0, ?, ?)",
        )
        .bind(user_id)
        .bind(text)
        .bind(Utc::now())
        .bind(expires_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                Err(StorageError::NotFound(format!("user {}", user_id)))
            }
            Err(e) => Err(query_error(e)),
        }
    }

    async fn get_todo(&self, id: i64) -> Result<Option<Todo>, StorageError> {
        sqlx::query_as::<_, Todo>(&format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)
    }

    async fn list_todos(&self, user_id: i64) -> Result<Vec<Todo>, StorageError> {
        sqlx::query_as::<_, Todo>(&format!(
            "SELECT {TODO_COLUMNS} FROM todos WHERE user_id = ? ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)
    }

    async fn set_todo_done(&self, id: i64, done: bool) -> Result<(), StorageError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(query_error)?;

        let todo = fetch_todo(&mut tx, id)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("todo {}", id)))?;
        if todo.is_frozen(now) {
            return Err(frozen(id));
        }

        sqlx::query("UPDATE todos SET done = ? WHERE id = ?")
            .bind(done)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;

        if done && !todo.done {
            let today = now.date_naive();
            record_failures(&mut tx, todo.user_id, &[FailureEvent::Completed], today).await?;
        }

        tx.commit().await.map_err(query_error)
    }

    async fn delete_todo(&self, id: i64) -> Result<bool, StorageError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(query_error)?;

        let Some(todo) = fetch_todo(&mut tx, id).await? else {
            return Ok(false);
        };
        if todo.is_frozen(now) {
            return Err(frozen(id));
        }

        sqlx::query("DELETE FROM todos WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;

        if !todo.done {
            let today = now.date_naive();
            record_failures(&mut tx, todo.user_id, &[FailureEvent::Deleted], today).await?;
        }

        tx.commit().await.map_err(query_error)?;
        Ok(true)
    }

    async fn purge_todos(&self, user_id: i64) -> Result<u64, StorageError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(query_error)?;

        let todos = sqlx::query_as::<_, Todo>(&format!(
            "SELECT {TODO_COLUMNS} FROM todos WHERE user_id = ?"
        ))
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(query_error)?;

        let mut abandoned = Vec::new();
        let mut purged = 0u64;
        for todo in todos.iter().filter(|t| !t.is_frozen(now)) {
            sqlx::query("DELETE FROM todos WHERE id = ?")
                .bind(todo.id)
                .execute(&mut *tx)
                .await
                .map_err(query_error)?;
            purged += 1;
            if !todo.done {
                abandoned.push(FailureEvent::Deleted);
            }
        }

        record_failures(&mut tx, user_id, &abandoned, now.date_naive()).await?;
        tx.commit().await.map_err(query_error)?;

        info!(user_id, purged, spared = todos.len() as u64 - purged, "Todos purged");
        Ok(purged)
    }

    async fn expire_overdue(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<i64>, StorageError> {
        let mut tx = self.pool.begin().await.map_err(query_error)?;

        let candidates = sqlx::query_as::<_, Todo>(&format!(
            "SELECT {TODO_COLUMNS} FROM todos \
             WHERE user_id = ? AND done = 0 AND expired = 0 AND expires_at IS NOT NULL"
        ))
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(query_error)?;

        // Deadlines are compared as timestamps, not as stored text
        let overdue: Vec<i64> = candidates
            .iter()
            .filter(|t| t.is_overdue(now))
            .map(|t| t.id)
            .collect();
        if overdue.is_empty() {
            return Ok(overdue);
        }

        for id in &overdue {
            sqlx::query("UPDATE todos SET expired = 1 WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(query_error)?;
        }

        let events = vec![FailureEvent::Expired; overdue.len()];
        record_failures(&mut tx, user_id, &events, now.date_naive()).await?;
        tx.commit().await.map_err(query_error)?;

        info!(user_id, count = overdue.len(), "Todos expired");
        Ok(overdue)
    }

    async fn failure_stats(
        &self,
        user_id: i64,
        today: NaiveDate,
    ) -> Result<FailureStats, StorageError> {
        let mut tx = self.pool.begin().await.map_err(query_error)?;

        let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_error)?;
        if exists.is_none() {
            return Err(StorageError::NotFound(format!("user {}", user_id)));
        }

        let mut stats = load_stats(&mut tx, user_id).await?;
        stats.roll_over(today);
        save_stats(&mut tx, user_id, &stats).await?;
        tx.commit().await.map_err(query_error)?;
        Ok(stats)
    }
}
