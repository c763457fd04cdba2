//! SQLite persistence layer for the support bot.
//!
//! Users, conversation history, long-term summaries, subscriptions and
//! payments, stored with SQLx on SQLite.
//!
//! Query functions accept any [`sqlx::SqliteExecutor`], so they run the same
//! against the pool or inside a transaction:
//!
//! ```no_run
//! use chrono::Utc;
//! use database::{message, user, Database, MessageRole};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("sqlite:support.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     let now = Utc::now();
//!     user::ensure_user(db.pool(), 42, now).await?;
//!
//!     let mut tx = db.pool().begin().await?;
//!     message::append_message(&mut *tx, 42, MessageRole::User, "hello", now).await?;
//!     tx.commit().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod chat_summary;
pub mod error;
pub mod message;
pub mod models;
pub mod payment;
pub mod subscription;
pub mod user;

pub use error::{DatabaseError, Result};
pub use models::{ChatSummary, Message, MessageRole, Payment, PaymentStatus, Subscription, User};
pub use payment::{NewPayment, StatusChange};
pub use subscription::{NewSubscription, ReminderKind};
pub use user::UserProfile;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::str::FromStr;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size shared by the chat path and the background loops.
    const DEFAULT_POOL_SIZE: u32 = 10;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(url, pool_size, "Connected to database");

        Ok(Self { pool })
    }

    /// Migrated in-memory database on a single connection, for tests.
    ///
    /// Concurrent callers queue on the one connection, so racing writers
    /// observe each other's committed state.
    pub async fn connect_in_memory() -> Result<Self> {
        let db = Self::connect_with_pool_size("sqlite::memory:", 1).await?;
        db.migrate().await?;
        Ok(db)
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Begin a transaction that holds the write lock from its first statement.
    ///
    /// A deferred transaction that reads before it writes cannot wait for a
    /// concurrent writer: SQLite fails the lock upgrade with `SQLITE_BUSY`
    /// at once. `BEGIN IMMEDIATE` queues on the busy timeout instead, so
    /// read-check-write sequences serialize cleanly.
    pub async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Build a SQLite URL from a filesystem path, creating the file if missing.
pub fn sqlite_url_from_path(path: &str) -> String {
    if path.starts_with("sqlite:") {
        path.to_string()
    } else {
        format!("sqlite:{path}?mode=rwc")
    }
}
