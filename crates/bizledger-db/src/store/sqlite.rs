//! # SQLite Document Store
//!
//! [`DocumentStore`] over a single `documents` table.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  update / merge / modify / delete                                       │
//! │                                                                         │
//! │  acquire connection                                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN IMMEDIATE  ← takes the write lock up front (no upgrade races)   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SELECT body ──► apply field updates / mutator ──► UPSERT body         │
//! │       │                                                                 │
//! │       ├── Ok  ──► tx.commit()                                          │
//! │       └── Err / dropped ──► Transaction drop rolls back                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The transaction is an RAII [`sqlx::Transaction`]: a call cancelled
//! between BEGIN and commit never returns an open transaction to the pool.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqliteConnection;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use super::patch::apply_updates;
use super::{validate_field_path, DocumentStore, FieldUpdates, FilterOp, Modified, Query};
use crate::error::{DbError, DbResult};

/// Row shape of the `documents` table.
#[derive(Debug, FromRow)]
struct DocumentRow {
    id: String,
    body: String,
}

impl DocumentRow {
    fn into_value(self, collection: &str) -> DbResult<Value> {
        serde_json::from_str(&self.body)
            .map_err(|e| DbError::invalid(collection, self.id, e.to_string()))
    }
}

/// What a read-modify-write does when the document is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnMissing {
    /// Return `None` without writing.
    Skip,
    /// Fail with `NotFound`.
    Fail,
    /// Start from an empty object.
    Create,
}

/// SQLite-backed document store.
#[derive(Debug, Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_in(conn: &mut SqliteConnection, collection: &str, id: &str) -> DbResult<Option<Value>> {
        let row: Option<DocumentRow> =
            sqlx::query_as("SELECT id, body FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
        row.map(|r| r.into_value(collection)).transpose()
    }

    async fn upsert_in(conn: &mut SqliteConnection, collection: &str, id: &str, body: &Value) -> DbResult<()> {
        let body = serde_json::to_string(body)?;
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, body)
            VALUES (?, ?, ?)
            ON CONFLICT (collection, id) DO UPDATE SET
                body = excluded.body,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(body)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn read_modify_write_in<F>(
        conn: &mut SqliteConnection,
        collection: &str,
        id: &str,
        on_missing: OnMissing,
        mutate: F,
    ) -> DbResult<Option<Modified>>
    where
        F: FnOnce(&mut Value) -> DbResult<()> + Send,
    {
        let before = match (Self::fetch_in(conn, collection, id).await?, on_missing) {
            (Some(body), _) => body,
            (None, OnMissing::Skip) => return Ok(None),
            (None, OnMissing::Fail) => return Err(DbError::not_found(collection, id)),
            (None, OnMissing::Create) => Value::Object(Default::default()),
        };

        let mut after = before.clone();
        mutate(&mut after)?;
        Self::upsert_in(conn, collection, id, &after).await?;
        Ok(Some(Modified { before, after }))
    }

    /// Runs one read-modify-write inside `BEGIN IMMEDIATE … COMMIT`.
    async fn read_modify_write<F>(
        &self,
        collection: &str,
        id: &str,
        on_missing: OnMissing,
        mutate: F,
    ) -> DbResult<Option<Modified>>
    where
        F: FnOnce(&mut Value) -> DbResult<()> + Send,
    {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        let modified = Self::read_modify_write_in(&mut tx, collection, id, on_missing, mutate).await?;
        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        Ok(modified)
    }

    fn apply_fields(collection: &str, id: &str, fields: &FieldUpdates) -> impl FnOnce(&mut Value) -> DbResult<()> + Send {
        let collection = collection.to_string();
        let id = id.to_string();
        let fields = fields.clone();
        move |body: &mut Value| {
            apply_updates(body, &fields).map_err(|reason| DbError::invalid(collection, id, reason))
        }
    }
}

fn bind_value<'a>(builder: &mut QueryBuilder<'a, Sqlite>, value: &Value) {
    match value {
        Value::Bool(b) => builder.push_bind(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => builder.push_bind(i),
            None => builder.push_bind(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => builder.push_bind(s.clone()),
        other => builder.push_bind(other.to_string()),
    };
}

fn escape_like(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> DbResult<Option<Value>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_in(&mut conn, collection, id).await
    }

    async fn set(&self, collection: &str, id: &str, document: Value) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        Self::upsert_in(&mut conn, collection, id, &document).await
    }

    async fn insert(&self, collection: &str, id: &str, document: Value) -> DbResult<()> {
        let body = serde_json::to_string(&document)?;
        let result = sqlx::query("INSERT INTO documents (collection, id, body) VALUES (?, ?, ?)")
            .bind(collection)
            .bind(id)
            .bind(body)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => match DbError::from(err) {
                DbError::UniqueViolation { .. } => Err(DbError::duplicate(collection, id)),
                other => Err(other),
            },
        }
    }

    async fn update(&self, collection: &str, id: &str, fields: &FieldUpdates) -> DbResult<Value> {
        let mutate = Self::apply_fields(collection, id, fields);
        self.read_modify_write(collection, id, OnMissing::Fail, mutate)
            .await?
            .map(|m| m.after)
            .ok_or_else(|| DbError::not_found(collection, id))
    }

    async fn merge(&self, collection: &str, id: &str, fields: &FieldUpdates) -> DbResult<Value> {
        let mutate = Self::apply_fields(collection, id, fields);
        self.read_modify_write(collection, id, OnMissing::Create, mutate)
            .await?
            .map(|m| m.after)
            .ok_or_else(|| DbError::Internal(format!("upsert of {collection}/{id} wrote nothing")))
    }

    async fn delete(&self, collection: &str, id: &str) -> DbResult<Option<Value>> {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        let existing = Self::fetch_in(&mut tx, collection, id).await?;
        if existing.is_some() {
            sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        Ok(existing)
    }

    async fn query(&self, collection: &str, query: &Query) -> DbResult<Vec<Value>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, body FROM documents WHERE collection = ");
        builder.push_bind(collection.to_string());

        for filter in &query.filters {
            validate_field_path(&filter.field)?;
            builder.push(format!(" AND json_extract(body, '$.{}') ", filter.field));

            match (filter.op, &filter.value) {
                (FilterOp::Eq, Value::Null) => {
                    builder.push("IS NULL");
                }
                (FilterOp::Ne, Value::Null) => {
                    builder.push("IS NOT NULL");
                }
                (FilterOp::Prefix, value) => {
                    let prefix = value.as_str().unwrap_or_default();
                    builder.push("LIKE ");
                    builder.push_bind(escape_like(prefix));
                    builder.push(" ESCAPE '\\'");
                }
                (op, value) => {
                    builder.push(op.sql()).push(" ");
                    bind_value(&mut builder, value);
                }
            }
        }

        match &query.order_by {
            Some(order) => {
                validate_field_path(&order.field)?;
                builder.push(format!(
                    " ORDER BY json_extract(body, '$.{}') {}, id {}",
                    order.field,
                    if order.descending { "DESC" } else { "ASC" },
                    if order.descending { "DESC" } else { "ASC" },
                ));
            }
            None => {
                builder.push(" ORDER BY id ASC");
            }
        }

        if query.limit.is_some() || query.offset.is_some() {
            builder.push(" LIMIT ");
            builder.push_bind(query.limit.map_or(-1, i64::from));
            builder.push(" OFFSET ");
            builder.push_bind(i64::from(query.offset.unwrap_or(0)));
        }

        debug!(collection, filters = query.filters.len(), "Document query");

        let rows: Vec<DocumentRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(|r| r.into_value(collection)).collect()
    }

    async fn modify(
        &self,
        collection: &str,
        id: &str,
        mutator: &(dyn for<'m> Fn(&'m mut Value) -> DbResult<()> + Send + Sync),
    ) -> DbResult<Option<Modified>> {
        self.read_modify_write(collection, id, OnMissing::Skip, |body: &mut Value| mutator(body))
            .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use bizledger_core::{CoreError, FieldUpdate};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    async fn store() -> SqliteDocumentStore {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        SqliteDocumentStore::new(db.pool().clone())
    }

    fn inc(field: &str, by: f64) -> FieldUpdates {
        let mut fields = FieldUpdates::new();
        fields.insert(field.to_string(), FieldUpdate::Increment(by));
        fields
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = store().await;
        store.set("Clients", "C0001", json!({"id": "C0001", "name": "Acme"})).await.unwrap();

        let doc = store.get("Clients", "C0001").await.unwrap().unwrap();
        assert_eq!(doc["name"], "Acme");

        let removed = store.delete("Clients", "C0001").await.unwrap();
        assert_eq!(removed.unwrap()["id"], "C0001");
        assert!(store.get("Clients", "C0001").await.unwrap().is_none());
        assert!(store.delete("Clients", "C0001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_id() {
        let store = store().await;
        store.insert("Orders", "INV-1", json!({"id": "INV-1"})).await.unwrap();
        let err = store.insert("Orders", "INV-1", json!({"id": "INV-1"})).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref collection, ref id } if collection == "Orders" && id == "INV-1"));

        // Same id in another collection is fine
        store.insert("Clients", "INV-1", json!({})).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_requires_document() {
        let store = store().await;
        let err = store.update("Clients", "C0404", &inc("due_amount", 5.0)).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_merge_initializes_counters() {
        let store = store().await;
        let after = store.merge("AggregateCounters", "orders", &inc("total_sales.count", 1.0)).await.unwrap();
        assert_eq!(after["total_sales"]["count"], 1.0);

        let after = store.merge("AggregateCounters", "orders", &inc("total_sales.count", 2.0)).await.unwrap();
        assert_eq!(after["total_sales"]["count"], 3.0);
    }

    #[tokio::test]
    async fn test_modify_rejection_rolls_back() {
        let store = store().await;
        store.set("InventoryItems", "I0001", json!({"stock_quantity": 5.0})).await.unwrap();

        let err = store
            .modify("InventoryItems", "I0001", &|body: &mut Value| {
                body["stock_quantity"] = json!(0.0);
                Err(DbError::Rejected(CoreError::InsufficientStock {
                    item_id: "I0001".to_string(),
                    available: 5.0,
                    requested: 6.0,
                }))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rejected(_)));

        let doc = store.get("InventoryItems", "I0001").await.unwrap().unwrap();
        assert_eq!(doc["stock_quantity"], 5.0);

        let missing = store.modify("InventoryItems", "I0404", &|_: &mut Value| Ok(())).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_query_filters_order_and_paging() {
        let store = store().await;
        for (id, name, total, draft) in [
            ("INV-1", "Acme", 100.0, false),
            ("INV-2", "Apex", 250.0, true),
            ("INV-3", "Birch", 400.0, false),
        ] {
            store
                .set("Orders", id, json!({"id": id, "name": name, "total": total, "draft": draft}))
                .await
                .unwrap();
        }

        let active = store.query("Orders", &Query::new().eq("draft", false)).await.unwrap();
        assert_eq!(active.len(), 2);

        let big = store
            .query("Orders", &Query::new().filter("total", FilterOp::Gte, 250.0).order_by("total", true))
            .await
            .unwrap();
        assert_eq!(big[0]["id"], "INV-3");
        assert_eq!(big[1]["id"], "INV-2");

        let prefixed = store
            .query("Orders", &Query::new().filter("name", FilterOp::Prefix, "a"))
            .await
            .unwrap();
        assert_eq!(prefixed.len(), 2);

        let page = store
            .query("Orders", &Query::new().order_by("total", false).limit(1).offset(1))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0]["id"], "INV-2");

        let err = store.query("Orders", &Query::new().eq("x'y", 1)).await.unwrap_err();
        assert!(matches!(err, DbError::QueryFailed(_)));
    }

    #[tokio::test]
    async fn test_cancelled_writes_leave_store_usable() {
        let store = store().await;
        store.set("Clients", "C0001", json!({"due_amount": 0.0})).await.unwrap();

        let mut completed = 0.0;
        for _ in 0..200 {
            let fields = inc("due_amount", 1.0);
            let write = store.update("Clients", "C0001", &fields);
            if let Ok(result) = tokio::time::timeout(Duration::from_micros(50), write).await {
                result.unwrap();
                completed += 1.0;
            }
        }

        // A write cancelled after its commit still counts, so only a lower bound holds
        let after = store.update("Clients", "C0001", &inc("due_amount", 1.0)).await.unwrap();
        let due = after["due_amount"].as_f64().unwrap();
        assert!(due >= completed + 1.0 && due <= 201.0);
        store.delete("Clients", "C0001").await.unwrap();
        assert!(store.get("Clients", "C0001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(store().await);
        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.merge("AggregateCounters", "clients", &inc("total", 1.0)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        let doc = store.get("AggregateCounters", "clients").await.unwrap().unwrap();
        assert_eq!(doc["total"], 20.0);
    }
}
