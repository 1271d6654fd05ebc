//! # Schema Migrations
//!
//! The document store needs one table and a few JSON1 expression indexes.
//! The SQL lives in the workspace `migrations/sqlite` directory and is
//! compiled into the binary.
//!
//! ```text
//! migrations/sqlite/
//! ├── 001_documents.sql          documents(collection, id, body JSON, stamps)
//! └── 002_document_indexes.sql   $.name, $.created_at, $.state indexes
//! ```
//!
//! sqlx records applied versions in `_sqlx_migrations`. A schema change is
//! a new numbered file; applied files are never edited.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Embedded vs. applied migration counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaStatus {
    pub embedded: usize,
    pub applied: usize,
}

impl SchemaStatus {
    pub fn is_current(&self) -> bool {
        self.applied >= self.embedded
    }
}

/// Applies every pending migration.
pub async fn apply(pool: &SqlitePool) -> DbResult<()> {
    let before = status(pool).await?;
    if before.is_current() {
        debug!(version = before.applied, "Schema up to date");
        return Ok(());
    }

    MIGRATOR.run(pool).await?;
    info!(
        from = before.applied,
        to = before.embedded,
        "Applied schema migrations"
    );
    Ok(())
}

pub async fn status(pool: &SqlitePool) -> DbResult<SchemaStatus> {
    // The bookkeeping table only exists after the first run.
    let tracked: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;

    let applied: i64 = if tracked == 0 {
        0
    } else {
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?
    };

    Ok(SchemaStatus {
        embedded: MIGRATOR.migrations.len(),
        applied: applied as usize,
    })
}
