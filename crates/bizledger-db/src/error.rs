//! # Error Types
//!
//! Storage errors ([`DbError`]) and engine errors ([`LedgerError`]).
//!
//! ## Error Flow
//! ```text
//!  sqlx::Error            CoreError (stock, batch, validation)
//!       │                    │              │
//!       ▼                    │ mutator      │ boundary checks
//!  DbError ◄── Rejected ─────┘ closures     │
//!       │                                   │
//!       ├── outside a saga ─► From ─────────┤
//!       │                                   ▼
//!       └── in a saga step ─► ReconciliationWriteFailure { operation, step }
//!                                   │
//!                                   ▼
//!                  LedgerError::code() / status() for the HTTP layer
//! ```

use bizledger_core::CoreError;
use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;

// =============================================================================
// Storage Errors
// =============================================================================

/// Document store failures.
#[derive(Debug, Error)]
pub enum DbError {
    /// No document at `collection/id`.
    ///
    /// ## When This Occurs
    /// - `update` or `modify` of a document that was never written or was deleted
    /// - A reconciler increments the balance of an unknown client or supplier
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// `insert` hit an id its collection already holds.
    #[error("{collection}/{id} already exists")]
    UniqueViolation { collection: String, id: String },

    /// The database could not be opened or the pool is closed.
    ///
    /// ## When This Occurs
    /// - The configured file's directory is not writable
    /// - A store call after `Database::close`
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// SQLite rejected a statement.
    ///
    /// ## When This Occurs
    /// - Disk full or I/O errors mid-write
    /// - Injected failures in tests (`FaultyStore`)
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// `BEGIN IMMEDIATE` or `COMMIT` failed, usually a busy database.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// A body could not be encoded to or decoded from JSON.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Stored document has the wrong shape for the requested operation.
    ///
    /// ## When This Occurs
    /// - Incrementing a field that holds a non-number
    /// - A body that does not deserialize into its entity type
    #[error("Invalid document {collection}/{id}: {reason}")]
    InvalidDocument {
        collection: String,
        id: String,
        reason: String,
    },

    /// A document mutator refused the change with a domain error.
    ///
    /// The transaction is rolled back; nothing was written.
    #[error(transparent)]
    Rejected(#[from] CoreError),

    /// Every pooled connection stayed busy past the acquire timeout.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(collection: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn invalid(
        collection: impl Into<String>,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        DbError::InvalidDocument {
            collection: collection.into(),
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// ```text
/// Database(primary key / unique)  → UniqueViolation (store fills in collection/id)
/// Database(other)                 → QueryFailed
/// Decode / ColumnDecode           → Serialization
/// PoolTimedOut                    → PoolExhausted
/// PoolClosed                      → ConnectionFailed
/// anything else                   → Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DbError::duplicate("documents", db_err.message())
            }
            sqlx::Error::Database(db_err) => DbError::QueryFailed(db_err.message().to_string()),
            sqlx::Error::Decode(_) | sqlx::Error::ColumnDecode { .. } => DbError::Serialization(err.to_string()),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Engine Errors
// =============================================================================

/// Errors surfaced by the lifecycle coordinator and services.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Referenced order, party, employee or item does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Order id (invoice or challan number) already taken.
    #[error("{collection} already contains '{id}'")]
    DuplicateIdentifier { collection: String, id: String },

    /// Domain rule violated (stock, batch, validation, transition).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A downstream write failed while reconciling.
    ///
    /// ## When This Occurs
    /// - A counter, balance or stock write fails mid-saga. Applied steps have
    ///   been compensated by the time this is returned.
    #[error("{operation} failed at step '{step}': {source}")]
    ReconciliationWriteFailure {
        operation: String,
        step: String,
        #[source]
        source: DbError,
    },

    /// Storage failure outside a saga.
    #[error(transparent)]
    Store(DbError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl LedgerError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn write_failure(
        operation: impl Into<String>,
        step: impl Into<String>,
        source: DbError,
    ) -> Self {
        LedgerError::ReconciliationWriteFailure {
            operation: operation.into(),
            step: step.into(),
            source,
        }
    }

    /// Machine-readable code for the external HTTP layer.
    pub fn code(&self) -> ErrorCode {
        match self {
            LedgerError::NotFound { .. } => ErrorCode::NotFound,
            LedgerError::DuplicateIdentifier { .. } => ErrorCode::DuplicateIdentifier,
            LedgerError::Core(err) if err.is_stock_error() => ErrorCode::InsufficientStock,
            LedgerError::Core(_) => ErrorCode::ValidationError,
            LedgerError::ReconciliationWriteFailure { .. } => ErrorCode::ReconciliationFailure,
            LedgerError::Store(_) | LedgerError::Config(_) => ErrorCode::DatabaseError,
        }
    }

    /// HTTP-equivalent status.
    pub fn status(&self) -> u16 {
        self.code().status()
    }
}

/// Maps store errors into engine errors outside a saga step.
///
/// ```text
/// Rejected(core)    → Core
/// NotFound          → NotFound
/// UniqueViolation   → DuplicateIdentifier
/// other             → Store
/// ```
impl From<DbError> for LedgerError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Rejected(core) => LedgerError::Core(core),
            DbError::NotFound { entity, id } => LedgerError::NotFound { entity, id },
            DbError::UniqueViolation { collection, id } => LedgerError::DuplicateIdentifier { collection, id },
            other => LedgerError::Store(other),
        }
    }
}

/// Result type for engine operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Error codes for the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Order id already used (400)
    DuplicateIdentifier,

    /// Stock or batch shortfall (400)
    InsufficientStock,

    /// Input validation failed (400)
    ValidationError,

    /// Counter / balance propagation failed (500)
    ReconciliationFailure,

    /// Database operation failed (500)
    DatabaseError,
}

impl ErrorCode {
    pub fn status(self) -> u16 {
        match self {
            ErrorCode::NotFound => 404,
            ErrorCode::DuplicateIdentifier
            | ErrorCode::InsufficientStock
            | ErrorCode::ValidationError => 400,
            ErrorCode::ReconciliationFailure | ErrorCode::DatabaseError => 500,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_core_error_maps_back() {
        let core = CoreError::BatchNotFound {
            item_id: "I0001".to_string(),
            batch_number: "B9".to_string(),
        };
        let err: LedgerError = DbError::from(core.clone()).into();
        assert!(matches!(err, LedgerError::Core(ref c) if *c == core));
        assert_eq!(err.code(), ErrorCode::InsufficientStock);
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(LedgerError::not_found("Order", "INV-1").status(), 404);
        let dup: LedgerError = DbError::duplicate("Orders", "INV-1").into();
        assert_eq!(dup.code(), ErrorCode::DuplicateIdentifier);
        assert_eq!(dup.status(), 400);

        let failure = LedgerError::write_failure(
            "create_order",
            "counterparty_due",
            DbError::QueryFailed("disk I/O error".to_string()),
        );
        assert_eq!(failure.status(), 500);
        assert_eq!(
            failure.to_string(),
            "create_order failed at step 'counterparty_due': Query failed: disk I/O error"
        );
    }

    #[test]
    fn test_error_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::ReconciliationFailure).unwrap();
        assert_eq!(json, "\"RECONCILIATION_FAILURE\"");
    }
}
