//! # Entity Store
//!
//! A document key-value store: JSON bodies addressed by `(collection, id)`,
//! with atomic per-document field updates.
//!
//! ## Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Operation           Missing document        Atomicity                  │
//! │  ─────────────────────────────────────────────────────────────────────  │
//! │  get                 Ok(None)                read                       │
//! │  set                 created                 single write               │
//! │  insert              created                 fails UniqueViolation if   │
//! │                                              the id exists              │
//! │  update              Err(NotFound)           read-modify-write in one   │
//! │                                              IMMEDIATE transaction      │
//! │  merge               created from {}         same as update             │
//! │  modify              Ok(None)                same as update; mutator    │
//! │                                              may reject (rollback)      │
//! │  delete              Ok(None)                single transaction         │
//! │  query               -                       read                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing spans two documents. Cross-document consistency is the saga's job
//! (see [`crate::saga`]).

use std::collections::BTreeMap;

use async_trait::async_trait;
use bizledger_core::FieldUpdate;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{DbError, DbResult};

pub mod patch;
pub mod sqlite;
#[cfg(test)]
pub mod testing;

pub use sqlite::SqliteDocumentStore;

/// Field updates keyed by dotted path.
pub type FieldUpdates = BTreeMap<String, FieldUpdate>;

/// Document body before and after a successful [`DocumentStore::modify`].
#[derive(Debug, Clone, PartialEq)]
pub struct Modified {
    pub before: Value,
    pub after: Value,
}

// =============================================================================
// Queries
// =============================================================================

/// Comparison used by a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    /// String prefix. Case folding covers ASCII letters only (SQLite `LIKE`).
    Prefix,
}

impl FilterOp {
    pub(crate) fn sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "!=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Prefix => "LIKE",
        }
    }
}

/// `field op value` on a document body.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

/// Filtered, ordered, paginated collection scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Eq, value)
    }

    pub fn order_by(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            descending,
        });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Bounds a timestamp field, inclusive at both ends.
    ///
    /// Timestamps are stored as RFC 3339 text and compared as text, which
    /// orders them correctly to the second.
    pub fn within(mut self, field: &str, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        if let Some(from) = from {
            self = self.filter(field, FilterOp::Gte, timestamp(from));
        }
        if let Some(to) = to {
            self = self.filter(field, FilterOp::Lte, timestamp(to));
        }
        self
    }
}

/// A timestamp as serde writes it into a document.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Checks a dotted field path (`party.client.id`) before it is embedded in a
/// JSON path expression.
pub(crate) fn validate_field_path(field: &str) -> DbResult<()> {
    let valid = !field.is_empty()
        && field.split('.').all(|segment| {
            let mut chars = segment.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if valid {
        Ok(())
    } else {
        Err(DbError::QueryFailed(format!("invalid field path '{field}'")))
    }
}

// =============================================================================
// Store Trait
// =============================================================================

/// Document store used by every repository, reconciler and the coordinator.
///
/// Object safe; shared as `Arc<dyn DocumentStore>`.
#[async_trait]
pub trait DocumentStore: Send + Sync + std::fmt::Debug {
    async fn get(&self, collection: &str, id: &str) -> DbResult<Option<Value>>;

    /// Creates or replaces a document.
    async fn set(&self, collection: &str, id: &str, document: Value) -> DbResult<()>;

    /// Creates a document; fails with `UniqueViolation` when the id is taken.
    async fn insert(&self, collection: &str, id: &str, document: Value) -> DbResult<()>;

    /// Applies field updates to an existing document and returns the new body.
    async fn update(&self, collection: &str, id: &str, fields: &FieldUpdates) -> DbResult<Value>;

    /// Like `update`, but a missing document starts as `{}`. Increments on
    /// missing fields become their literal initial values.
    async fn merge(&self, collection: &str, id: &str, fields: &FieldUpdates) -> DbResult<Value>;

    /// Removes a document, returning its last body.
    async fn delete(&self, collection: &str, id: &str) -> DbResult<Option<Value>>;

    async fn query(&self, collection: &str, query: &Query) -> DbResult<Vec<Value>>;

    /// Runs `mutator` against the current body inside one transaction.
    /// Returns `None` without writing when the document does not exist; an
    /// error from the mutator rolls back and is returned unchanged.
    async fn modify(
        &self,
        collection: &str,
        id: &str,
        mutator: &(dyn for<'m> Fn(&'m mut Value) -> DbResult<()> + Send + Sync),
    ) -> DbResult<Option<Modified>>;
}

// =============================================================================
// Typed Helpers
// =============================================================================

pub fn to_document<T: Serialize>(value: &T) -> DbResult<Value> {
    Ok(serde_json::to_value(value)?)
}

pub fn from_document<T: DeserializeOwned>(collection: &str, id: &str, body: Value) -> DbResult<T> {
    serde_json::from_value(body).map_err(|e| DbError::invalid(collection, id, e.to_string()))
}

/// Reads and deserializes one document.
pub async fn get_typed<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
) -> DbResult<Option<T>> {
    store
        .get(collection, id)
        .await?
        .map(|body| from_document(collection, id, body))
        .transpose()
}

/// Runs a query and deserializes every result.
pub async fn query_typed<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    query: &Query,
) -> DbResult<Vec<T>> {
    store
        .query(collection, query)
        .await?
        .into_iter()
        .map(|body| {
            let id = body.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
            from_document(collection, &id, body)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_field_path_validation() {
        assert!(validate_field_path("name").is_ok());
        assert!(validate_field_path("party.client.id").is_ok());
        assert!(validate_field_path("_x1").is_ok());
        assert!(validate_field_path("").is_err());
        assert!(validate_field_path("a..b").is_err());
        assert!(validate_field_path("1abc").is_err());
        assert!(validate_field_path("name') OR 1=1 --").is_err());
    }

    #[test]
    fn test_query_builder() {
        let q = Query::new()
            .eq("draft", false)
            .filter("total_amount", FilterOp::Gt, 100.0)
            .order_by("created_at", true)
            .limit(20)
            .offset(40);
        assert_eq!(q.filters.len(), 2);
        assert_eq!(q.filters[1].op.sql(), ">");
        assert_eq!(q.limit, Some(20));
        assert!(q.order_by.unwrap().descending);
    }

    #[test]
    fn test_within_matches_serialized_timestamps() {
        let from = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let q = Query::new().within("date", Some(from), None);
        assert_eq!(q.filters.len(), 1);
        assert_eq!(q.filters[0].op, FilterOp::Gte);
        assert_eq!(q.filters[0].value, serde_json::to_value(from).unwrap());

        assert!(Query::new().within("date", None, None).filters.is_empty());
    }
}
