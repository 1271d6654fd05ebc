//! # Identifier Generator
//!
//! Sequential, human-readable ids (`C0001`, `S0007`, `E0012`, `I0003`,
//! `X0004`, `P0002`, `SP0001`).
//!
//! ```text
//! next_id("Clients")
//!      │
//!      ▼
//! one transaction on AggregateCounters/clients:
//!   sequence += 1, last_id = "C" + zero-pad(sequence, width)
//!      │
//!      ▼
//! Clients/<last_id> already exists? ──yes──► issue the next one
//!      │ no
//!      ▼
//!   last_id
//! ```
//!
//! The sequence only ever grows, so ids are never reused after deletes.
//! Documents created under a caller-chosen id (inventory items added by a
//! purchase) are stepped over rather than collided with.

use std::sync::Arc;

use bizledger_core::collection;
use bizledger_core::counters::collection_scope;
use bizledger_core::FieldUpdate;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::store::patch::get_number;
use crate::store::{DocumentStore, FieldUpdates};

/// Counter field holding the last issued sequence number.
pub const SEQUENCE_FIELD: &str = "sequence";

/// Id prefix for a collection: its initial, except where that would clash
/// with another collection (expenses vs. employees, supplier payments vs.
/// suppliers).
pub fn id_prefix(collection_name: &str) -> Option<String> {
    match collection_name {
        collection::EXPENSES => Some("X".to_string()),
        collection::SUPPLIER_PAYMENTS => Some("SP".to_string()),
        other => other.chars().next().map(|c| c.to_ascii_uppercase().to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct IdGenerator {
    store: Arc<dyn DocumentStore>,
    width: usize,
}

impl IdGenerator {
    pub fn new(store: Arc<dyn DocumentStore>, width: usize) -> Self {
        Self { store, width }
    }

    /// Issues the next unused id for `collection_name`.
    pub async fn next_id(&self, collection_name: &str) -> DbResult<String> {
        let prefix = id_prefix(collection_name)
            .ok_or_else(|| DbError::Internal("empty collection name".to_string()))?;
        let scope = collection_scope(collection_name);

        loop {
            let id = self.advance(&scope, &prefix).await?;
            if self.store.get(collection_name, &id).await?.is_none() {
                debug!(collection = collection_name, id = %id, "Issued id");
                return Ok(id);
            }
            debug!(collection = collection_name, id = %id, "Id already taken, skipping");
        }
    }

    /// Bumps the sequence and records `last_id` in the same write.
    async fn advance(&self, scope: &str, prefix: &str) -> DbResult<String> {
        let width = self.width;
        let bump = move |body: &mut Value| {
            let n = get_number(body, SEQUENCE_FIELD).round() as u64 + 1;
            let id = format!("{prefix}{n:0width$}");
            match body.as_object_mut() {
                Some(map) => {
                    map.insert(SEQUENCE_FIELD.to_string(), json!(n as f64));
                    map.insert("last_id".to_string(), Value::String(id));
                    Ok(())
                }
                None => Err(DbError::invalid(collection::AGGREGATE_COUNTERS, scope, "counter is not an object")),
            }
        };

        let modified = match self.store.modify(collection::AGGREGATE_COUNTERS, scope, &bump).await? {
            Some(modified) => modified,
            None => {
                // First id for this collection: create the counter, then bump it.
                let mut fields = FieldUpdates::new();
                fields.insert(SEQUENCE_FIELD.to_string(), FieldUpdate::Increment(0.0));
                self.store
                    .merge(collection::AGGREGATE_COUNTERS, scope, &fields)
                    .await?;
                self.store
                    .modify(collection::AGGREGATE_COUNTERS, scope, &bump)
                    .await?
                    .ok_or_else(|| DbError::not_found(collection::AGGREGATE_COUNTERS, scope))?
            }
        };

        modified
            .after
            .get("last_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DbError::Internal(format!("counter {scope} has no last_id")))
    }
}
