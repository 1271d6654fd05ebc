//! # Database
//!
//! Opens the SQLite database behind the document store and brings its
//! schema up to date.
//!
//! ```text
//!  LedgerConfig::db_config()              DbConfig::in_memory()
//!           │                                      │
//!           ▼                                      ▼
//!   DbLocation::File(path)                 DbLocation::Memory
//!     WAL journal, NORMAL sync               one connection, never
//!     busy_timeout for writers               reaped (each `:memory:`
//!           │                                connection is its own db)
//!           └──────────────┬───────────────────────┘
//!                          ▼
//!              Database::new ──► migrations::apply
//!                          │
//!                          ▼
//!              Database::store() ──► Arc<dyn DocumentStore>
//! ```
//!
//! WAL lets readers continue while a single writer holds the
//! `BEGIN IMMEDIATE` transaction of a document mutation.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations::{self, SchemaStatus};
use crate::store::{DocumentStore, SqliteDocumentStore};

// =============================================================================
// Configuration
// =============================================================================

/// Where the ledger's documents live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    File(PathBuf),
    /// Private to the pool's single connection; gone when the pool closes.
    Memory,
}

impl fmt::Display for DbLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbLocation::File(path) => write!(f, "{}", path.display()),
            DbLocation::Memory => f.write_str(":memory:"),
        }
    }
}

/// Pool settings.
///
/// ```rust,ignore
/// let config = DbConfig::new("./bizledger.db")
///     .max_connections(8)
///     .busy_timeout(Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub location: DbLocation,
    /// Default: 5
    pub max_connections: u32,
    /// Default: 1
    pub min_connections: u32,
    /// How long `acquire` waits for a free connection. Default: 30 seconds
    pub connect_timeout: Duration,
    /// How long a writer waits on a locked database. Default: 5 seconds
    pub busy_timeout: Duration,
    /// Apply pending migrations on open. Default: true
    pub migrate: bool,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            location: DbLocation::File(path.into()),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            migrate: true,
        }
    }

    /// A throwaway database for tests and demos.
    pub fn in_memory() -> Self {
        DbConfig {
            location: DbLocation::Memory,
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
            migrate: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Opens the database without touching its schema.
    pub fn skip_migrations(mut self) -> Self {
        self.migrate = false;
        self
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = match &self.location {
            DbLocation::File(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal),
            DbLocation::Memory => SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?,
        };
        Ok(options.busy_timeout(self.busy_timeout))
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        let options = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.connect_timeout);
        match self.location {
            DbLocation::File(_) => options.idle_timeout(Duration::from_secs(600)),
            DbLocation::Memory => options.idle_timeout(None).max_lifetime(None),
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Owns the pool and the document store built on it.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    store: Arc<SqliteDocumentStore>,
}

impl Database {
    /// Connects and, unless disabled, applies pending migrations.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(location = %config.location, "Opening ledger database");

        let pool = config
            .pool_options()
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| DbError::ConnectionFailed(format!("{}: {e}", config.location)))?;
        debug!(max_connections = config.max_connections, "Connection pool ready");

        if config.migrate {
            migrations::apply(&pool).await?;
        }

        Ok(Database {
            store: Arc::new(SqliteDocumentStore::new(pool.clone())),
            pool,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The document store over this pool. Every call shares one store.
    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    pub async fn schema_status(&self) -> DbResult<SchemaStatus> {
        migrations::status(&self.pool).await
    }

    /// Number of stored documents per collection, by collection name.
    pub async fn document_counts(&self) -> DbResult<Vec<(String, i64)>> {
        let counts = sqlx::query_as::<_, (String, i64)>(
            "SELECT collection, COUNT(*) FROM documents GROUP BY collection ORDER BY collection",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }

    pub async fn close(&self) {
        info!("Closing ledger database");
        self.pool.close().await;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
