//! Local SQLite store for the session token and the message history.
//!
//! The database is opened lazily on first use and the pool is cached for the
//! lifetime of the store. Reads degrade to empty defaults; writes surface
//! [`StoreError`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::errors::StoreError;
use crate::message::{ChatMessage, Turn};

/// Schema for the chat database. Safe to run on every open.
const SCHEMA: &str = r#"
-- Single-slot key-value map (session token)
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Append-only message log; AUTOINCREMENT keeps ids from being reused after a clear
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    turn TEXT NOT NULL,
    content TEXT NOT NULL,
    is_final INTEGER NOT NULL
);
"#;

const SESSION_ID_KEY: &str = "session_id";

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: i64,
    turn: String,
    content: String,
    is_final: bool,
}

/// Durable session/message store backed by one SQLite file.
#[derive(Debug)]
pub struct ChatStore {
    path: PathBuf,
    pool: OnceCell<SqlitePool>,
}

impl ChatStore {
    /// Creates a store for `path`. Nothing touches the disk until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pool: OnceCell::new(),
        }
    }

    /// Get the database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true once the database has been opened.
    pub fn is_open(&self) -> bool {
        self.pool.initialized()
    }

    async fn pool(&self) -> Result<&SqlitePool, StoreError> {
        self.pool.get_or_try_init(|| open_pool(&self.path)).await
    }

    /// Replaces the cached session token.
    pub async fn save_session_id(&self, session_id: &str) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        sqlx::query(
            r#"
            INSERT INTO kv (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(SESSION_ID_KEY)
        .bind(session_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Returns the cached session token, or an empty string when unset or
    /// unreadable.
    pub async fn get_session_id(&self) -> String {
        match self.try_get_session_id().await {
            Ok(value) => value.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "reading session id failed");
                String::new()
            }
        }
    }

    async fn try_get_session_id(&self) -> Result<Option<String>, StoreError> {
        let pool = self.pool().await?;
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv WHERE key = ?")
            .bind(SESSION_ID_KEY)
            .fetch_optional(pool)
            .await?;
        Ok(value)
    }

    /// Appends a message to the log and returns its auto-assigned key.
    pub async fn append_message(&self, message: &ChatMessage) -> Result<i64, StoreError> {
        let pool = self.pool().await?;
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO messages (turn, content, is_final)
            VALUES (?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(message.turn.as_str())
        .bind(&message.content)
        .bind(message.is_final)
        .fetch_one(pool)
        .await?;
        debug!(id, turn = %message.turn, is_final = message.is_final, "message appended");
        Ok(id)
    }

    /// Returns the full history in insertion order, or nothing when
    /// unreadable.
    pub async fn get_all_messages(&self) -> Vec<ChatMessage> {
        match self.try_get_all_messages().await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "reading message history failed");
                Vec::new()
            }
        }
    }

    async fn try_get_all_messages(&self) -> Result<Vec<ChatMessage>, StoreError> {
        let pool = self.pool().await?;
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT id, turn, content, is_final FROM messages ORDER BY id ASC",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match row.turn.parse::<Turn>() {
                Ok(turn) => Some(ChatMessage {
                    turn,
                    content: row.content,
                    is_final: row.is_final,
                }),
                Err(e) => {
                    warn!(id = row.id, error = %e, "skipping stored message");
                    None
                }
            })
            .collect())
    }

    /// Empties both the key-value map and the message log in one
    /// transaction.
    pub async fn clear_all(&self) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM kv").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM messages").execute(&mut *tx).await?;
        tx.commit().await?;
        debug!(path = %self.path.display(), "store cleared");
        Ok(())
    }

    /// Close the database connection if it was opened.
    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
        }
    }
}

async fn open_pool(path: &Path) -> Result<SqlitePool, StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(3)
        .connect_with(options)
        .await?;
    sqlx::raw_sql(SCHEMA).execute(&pool).await?;
    debug!(path = %path.display(), "chat store opened");
    Ok(pool)
}
