//! # Saga Log
//!
//! Compensation journal for operations that write several documents.
//!
//! ## Saga Pattern Implementation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Saga Pattern Implementation                          │
//! │                                                                         │
//! │  Saga::begin(operation, order_id, planned steps)                       │
//! │       │   INSERT SagaLog/{uuid} { state: pending, planned: [...] }     │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  for each step:                                                 │   │
//! │  │    saga.enter("inventory")                                      │   │
//! │  │    reconciler writes ──► journal.record(compensation)           │   │
//! │  │    saga.commit_step() ──► SagaLog.completed += step,            │   │
//! │  │                           SagaLog.compensations += journal      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ├── all steps ok ──► saga.complete()   state: completed          │
//! │       │                                                                 │
//! │       └── step failed  ──► saga.abort(err)                             │
//! │                              run compensations in reverse order        │
//! │                              state: compensated (or failed, keeping    │
//! │                              the compensations that did not apply)     │
//! │                                                                         │
//! │  Crash mid-saga? SagaLog keeps state: pending with every committed     │
//! │  step's compensations ──► Coordinator::recover_incomplete()            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use bizledger_core::{collection, CounterDeltas, FieldUpdate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{DbError, DbResult, LedgerError};
use crate::reconcile::inventory::change_stock;
use crate::store::{to_document, DocumentStore, FieldUpdates};

// =============================================================================
// Compensations
// =============================================================================

/// The inverse of one applied write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Compensation {
    /// Increments that were applied; undone by applying their negation.
    Increment {
        collection: String,
        id: String,
        deltas: BTreeMap<String, f64>,
    },
    /// Document body before the write; `None` means the write created it.
    Restore {
        collection: String,
        id: String,
        previous: Option<Value>,
    },
    /// Field values before a `Set`; undone by setting them back.
    Fields {
        collection: String,
        id: String,
        previous: BTreeMap<String, Value>,
    },
    /// Stock change that was applied to an inventory item.
    Stock {
        item_id: String,
        batch_number: Option<String>,
        expiry: Option<String>,
        delta: f64,
    },
}

impl Compensation {
    pub fn increment(collection: &str, id: &str, deltas: &CounterDeltas) -> Self {
        Compensation::Increment {
            collection: collection.to_string(),
            id: id.to_string(),
            deltas: deltas.increments(),
        }
    }

    pub fn restore(collection: &str, id: &str, previous: Option<Value>) -> Self {
        Compensation::Restore {
            collection: collection.to_string(),
            id: id.to_string(),
            previous,
        }
    }

    /// `collection/id` the compensation touches.
    pub fn target(&self) -> String {
        match self {
            Compensation::Increment { collection, id, .. }
            | Compensation::Restore { collection, id, .. }
            | Compensation::Fields { collection, id, .. } => format!("{collection}/{id}"),
            Compensation::Stock { item_id, .. } => format!("{}/{item_id}", collection::INVENTORY_ITEMS),
        }
    }

    /// Applies the inverse write.
    pub async fn undo(&self, store: &dyn DocumentStore) -> DbResult<()> {
        match self {
            Compensation::Increment { collection: coll, id, deltas } => {
                let fields: FieldUpdates = deltas
                    .iter()
                    .filter(|(_, by)| **by != 0.0)
                    .map(|(field, by)| (field.clone(), FieldUpdate::Increment(-by)))
                    .collect();
                if fields.is_empty() {
                    return Ok(());
                }
                if coll == collection::AGGREGATE_COUNTERS {
                    store.merge(coll, id, &fields).await?;
                    return Ok(());
                }
                match store.update(coll, id, &fields).await {
                    Ok(_) => Ok(()),
                    Err(DbError::NotFound { .. }) => {
                        warn!(target = %self.target(), "Compensation target no longer exists");
                        Ok(())
                    }
                    Err(err) => Err(err),
                }
            }
            Compensation::Restore { collection: coll, id, previous } => {
                match previous {
                    Some(body) => store.set(coll, id, body.clone()).await?,
                    None => {
                        store.delete(coll, id).await?;
                    }
                }
                Ok(())
            }
            Compensation::Fields { collection: coll, id, previous } => {
                let fields: FieldUpdates = previous
                    .iter()
                    .map(|(field, value)| (field.clone(), FieldUpdate::Set(value.clone())))
                    .collect();
                match store.update(coll, id, &fields).await {
                    Ok(_) => Ok(()),
                    Err(DbError::NotFound { .. }) => {
                        warn!(target = %self.target(), "Compensation target no longer exists");
                        Ok(())
                    }
                    Err(err) => Err(err),
                }
            }
            Compensation::Stock {
                item_id,
                batch_number,
                expiry,
                delta,
            } => {
                let undone =
                    change_stock(store, item_id, batch_number.as_deref(), expiry.as_deref(), -delta, None).await?;
                if undone.is_none() {
                    warn!(item_id = %item_id, "Stock compensation skipped, item no longer exists");
                }
                Ok(())
            }
        }
    }
}

/// Runs compensations newest-first. Returns the ones that failed, oldest
/// first.
pub async fn run_compensations(store: &dyn DocumentStore, compensations: &[Compensation]) -> Vec<Compensation> {
    let mut failed = Vec::new();
    for compensation in compensations.iter().rev() {
        if let Err(err) = compensation.undo(store).await {
            error!(target = %compensation.target(), error = %err, "Compensation failed");
            failed.push(compensation.clone());
        }
    }
    failed.reverse();
    failed
}

// =============================================================================
// Journal
// =============================================================================

/// Compensations recorded by the reconcilers for the current step.
#[derive(Debug, Default)]
pub struct Journal {
    entries: Vec<Compensation>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, compensation: Compensation) {
        debug!(target = %compensation.target(), "Journaled compensation");
        self.entries.push(compensation);
    }

    pub fn entries(&self) -> &[Compensation] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn take(&mut self) -> Vec<Compensation> {
        std::mem::take(&mut self.entries)
    }
}

// =============================================================================
// Saga Record
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaState {
    Pending,
    Completed,
    Compensated,
    /// Some compensations could not be applied; they remain in the record.
    Failed,
}

impl SagaState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::Pending => "pending",
            SagaState::Completed => "completed",
            SagaState::Compensated => "compensated",
            SagaState::Failed => "failed",
        }
    }

    /// True while compensations may still need to run.
    pub fn is_open(&self) -> bool {
        matches!(self, SagaState::Pending | SagaState::Failed)
    }
}

/// Persisted progress of one saga (`SagaLog/{id}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaRecord {
    pub id: String,
    pub operation: String,
    pub order_id: String,
    pub state: SagaState,
    pub planned: Vec<String>,
    #[serde(default)]
    pub completed: Vec<String>,
    #[serde(default)]
    pub compensations: Vec<Compensation>,
    #[serde(default)]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Saga
// =============================================================================

/// A running saga. Consumed by [`Saga::complete`] or [`Saga::abort`].
#[derive(Debug)]
pub struct Saga {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    record: SagaRecord,
    current: Option<String>,
    journal: Journal,
}

impl Saga {
    /// Persists a pending saga with its planned steps.
    pub async fn begin(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        operation: &str,
        order_id: &str,
        planned: &[&str],
    ) -> DbResult<Saga> {
        let now = clock.now();
        let record = SagaRecord {
            id: Uuid::new_v4().to_string(),
            operation: operation.to_string(),
            order_id: order_id.to_string(),
            state: SagaState::Pending,
            planned: planned.iter().map(|s| s.to_string()).collect(),
            completed: Vec::new(),
            compensations: Vec::new(),
            error: None,
            started_at: now,
            updated_at: now,
        };
        store
            .insert(collection::SAGA_LOG, &record.id, to_document(&record)?)
            .await?;

        debug!(saga_id = %record.id, operation, order_id, "Saga started");
        Ok(Saga {
            store,
            clock,
            record,
            current: None,
            journal: Journal::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    /// Marks `step` as the one now executing.
    pub fn enter(&mut self, step: &str) {
        self.current = Some(step.to_string());
    }

    pub fn journal(&mut self) -> &mut Journal {
        &mut self.journal
    }

    async fn persist(&mut self) -> DbResult<()> {
        self.record.updated_at = self.clock.now();
        self.store
            .set(collection::SAGA_LOG, &self.record.id, to_document(&self.record)?)
            .await
    }

    /// Moves the current step's compensations into the persisted record.
    pub async fn commit_step(&mut self) -> DbResult<()> {
        let entries = self.journal.take();
        self.record.compensations.extend(entries);
        if let Some(step) = &self.current {
            self.record.completed.push(step.clone());
        }
        self.persist().await?;
        self.current = None;
        Ok(())
    }

    /// Marks the saga completed.
    pub async fn complete(mut self) {
        let entries = self.journal.take();
        self.record.compensations.extend(entries);
        if let Some(step) = self.current.take() {
            self.record.completed.push(step);
        }
        self.record.state = SagaState::Completed;
        if let Err(err) = self.persist().await {
            error!(saga_id = %self.record.id, error = %err, "Failed to mark saga completed");
        }
    }

    /// Undoes every applied write (committed steps and the step in flight)
    /// and returns the error to surface.
    ///
    /// Store failures are wrapped as `ReconciliationWriteFailure` naming the
    /// step; domain errors pass through unchanged.
    pub async fn abort(mut self, err: LedgerError) -> LedgerError {
        let step = self.current.take().unwrap_or_else(|| "unknown".to_string());
        let mut applied = std::mem::take(&mut self.record.compensations);
        applied.extend(self.journal.take());

        warn!(
            saga_id = %self.record.id,
            operation = %self.record.operation,
            order_id = %self.record.order_id,
            step = %step,
            compensations = applied.len(),
            error = %err,
            "Saga aborted, compensating"
        );

        let failed = run_compensations(self.store.as_ref(), &applied).await;
        self.record.state = if failed.is_empty() {
            SagaState::Compensated
        } else {
            SagaState::Failed
        };
        self.record.compensations = failed;
        self.record.error = Some(format!("{step}: {err}"));
        if let Err(persist_err) = self.persist().await {
            error!(saga_id = %self.record.id, error = %persist_err, "Failed to record saga abort");
        }

        match err {
            LedgerError::Store(source) => LedgerError::write_failure(self.record.operation.clone(), step, source),
            other => other,
        }
    }
}

/// Runs the remaining compensations of an open saga record and updates it.
pub async fn compensate_record(
    store: &dyn DocumentStore,
    clock: &dyn Clock,
    mut record: SagaRecord,
) -> DbResult<SagaRecord> {
    info!(
        saga_id = %record.id,
        operation = %record.operation,
        order_id = %record.order_id,
        compensations = record.compensations.len(),
        "Recovering incomplete saga"
    );

    let failed = run_compensations(store, &record.compensations).await;
    record.state = if failed.is_empty() {
        SagaState::Compensated
    } else {
        SagaState::Failed
    };
    record.compensations = failed;
    record.updated_at = clock.now();
    store
        .set(collection::SAGA_LOG, &record.id, to_document(&record)?)
        .await?;
    Ok(record)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::pool::{Database, DbConfig};
    use crate::store::get_typed;
    use serde_json::json;

    async fn setup() -> (Arc<dyn DocumentStore>, Arc<dyn Clock>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        (db.store(), Arc::new(FixedClock::new(Utc::now())))
    }

    #[tokio::test]
    async fn test_abort_undoes_committed_and_in_flight_steps() {
        let (store, clock) = setup().await;
        store.set("Clients", "C0001", json!({"id": "C0001", "due_amount": 0.0})).await.unwrap();

        let mut saga = Saga::begin(store.clone(), clock, "create_order", "INV-1", &["due", "counters"])
            .await
            .unwrap();

        saga.enter("due");
        let deltas = CounterDeltas::new().increment("due_amount", 700.0);
        store.update("Clients", "C0001", &deltas.clone().into_fields()).await.unwrap();
        saga.journal().record(Compensation::increment("Clients", "C0001", &deltas));
        saga.commit_step().await.unwrap();

        saga.enter("counters");
        let counters = CounterDeltas::new().increment("total_due", 700.0);
        store
            .merge(collection::AGGREGATE_COUNTERS, "clients", &counters.clone().into_fields())
            .await
            .unwrap();
        saga.journal()
            .record(Compensation::increment(collection::AGGREGATE_COUNTERS, "clients", &counters));
        let saga_id = saga.id().to_string();

        let err = saga
            .abort(LedgerError::Store(DbError::QueryFailed("boom".to_string())))
            .await;
        assert!(matches!(
            err,
            LedgerError::ReconciliationWriteFailure { ref step, .. } if step == "counters"
        ));

        let client = store.get("Clients", "C0001").await.unwrap().unwrap();
        assert_eq!(client["due_amount"], 0.0);
        let counter = store.get(collection::AGGREGATE_COUNTERS, "clients").await.unwrap().unwrap();
        assert_eq!(counter["total_due"], 0.0);

        let record: SagaRecord = get_typed(store.as_ref(), collection::SAGA_LOG, &saga_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.state, SagaState::Compensated);
        assert_eq!(record.completed, vec!["due".to_string()]);
        assert!(record.compensations.is_empty());
    }

    #[tokio::test]
    async fn test_restore_none_deletes_created_document() {
        let (store, _) = setup().await;
        store.set("Orders", "INV-9", json!({"id": "INV-9"})).await.unwrap();
        Compensation::restore("Orders", "INV-9", None)
            .undo(store.as_ref())
            .await
            .unwrap();
        assert!(store.get("Orders", "INV-9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_domain_errors_pass_through_abort() {
        let (store, clock) = setup().await;
        let saga = Saga::begin(store, clock, "create_order", "INV-2", &["inventory"]).await.unwrap();
        let err = saga
            .abort(LedgerError::not_found("Client", "C0404"))
            .await;
        assert!(matches!(err, LedgerError::NotFound { .. }));
    }

    #[test]
    fn test_compensation_serializes_with_kind_tag() {
        let c = Compensation::Stock {
            item_id: "I0001".to_string(),
            batch_number: Some("B1".to_string()),
            expiry: None,
            delta: -4.0,
        };
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["kind"], "stock");
        let back: Compensation = serde_json::from_value(json).unwrap();
        assert_eq!(back, c);
    }
}
