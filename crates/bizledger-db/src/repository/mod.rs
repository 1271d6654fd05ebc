//! # Repository Module
//!
//! Typed access to the collections the engine reads and writes.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Ledger facade                                                          │
//! │       │                                                                 │
//! │       │  ledger.clients().create(client)                               │
//! │       ▼                                                                 │
//! │  EntityRepository<T: Entity>                                            │
//! │  ├── create   ──► IdGenerator ──► INSERT ──► {scope}.total += 1        │
//! │  ├── get / require / list / search (name prefix)                       │
//! │  ├── update   ──► modify (balances preserved)                          │
//! │  └── delete   ──► {scope}.total -= 1, balance totals -= balance        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DocumentStore (JSON documents)                                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ClientRepository`], [`SupplierRepository`] - counterparties
//! - [`EmployeeRepository`] - staff
//! - [`InventoryRepository`] - stock items and the low-stock report
//! - [`OrderRepository`] - order documents and listing
//! - [`SagaRepository`] - saga log and recovery queue

pub mod employee;
pub mod inventory;
pub mod order;
pub mod party;
pub mod saga;

pub use employee::EmployeeRepository;
pub use inventory::{ExpiringStock, InventoryRepository};
pub use order::{OrderQuery, OrderRepository};
pub use party::{ClientRepository, SupplierRepository};
pub use saga::SagaRepository;

use std::marker::PhantomData;
use std::sync::Arc;

use bizledger_core::counters::collection_scope;
use bizledger_core::CounterDeltas;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::{DbError, DbResult};
use crate::ids::IdGenerator;
use crate::reconcile::bump_counter;
use crate::saga::Journal;
use crate::store::{from_document, get_typed, query_typed, to_document, DocumentStore, FilterOp, Query};

// =============================================================================
// Entity Trait
// =============================================================================

/// A document type with a generated id and engine-maintained balances.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection the entity lives in.
    const COLLECTION: &'static str;
    /// Name used in `NotFound` errors.
    const ENTITY: &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn stamp(&mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>);

    /// Contribution of this record's balances to its scope counter.
    fn balance_deltas(&self) -> CounterDeltas {
        CounterDeltas::new()
    }

    /// Copies engine-maintained balances from `stored` onto `self`.
    fn keep_balances(&mut self, _stored: &Self) {}
}

// =============================================================================
// Entity Repository
// =============================================================================

/// CRUD for one [`Entity`] collection.
#[derive(Debug)]
pub struct EntityRepository<T: Entity> {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    ids: IdGenerator,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Clone for EntityRepository<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
            ids: self.ids.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> EntityRepository<T> {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, ids: IdGenerator) -> Self {
        Self {
            store,
            clock,
            ids,
            _entity: PhantomData,
        }
    }

    fn scope(&self) -> String {
        collection_scope(T::COLLECTION)
    }

    /// Entity writes touch one document; the journal only feeds the counter
    /// helper and is dropped.
    async fn bump(&self, deltas: CounterDeltas) -> DbResult<()> {
        let mut journal = Journal::new();
        bump_counter(self.store.as_ref(), self.clock.as_ref(), &mut journal, &self.scope(), deltas).await
    }

    /// Assigns the next id, stamps timestamps and inserts the record.
    pub async fn create(&self, mut entity: T) -> DbResult<T> {
        let id = self.ids.next_id(T::COLLECTION).await?;
        let now = self.clock.now();
        entity.set_id(id.clone());
        entity.stamp(now, now);

        self.store
            .insert(T::COLLECTION, &id, to_document(&entity)?)
            .await?;
        self.bump(entity.balance_deltas().increment("total", 1.0)).await?;

        info!(collection = T::COLLECTION, id = %id, "Created");
        Ok(entity)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<T>> {
        get_typed(self.store.as_ref(), T::COLLECTION, id).await
    }

    /// Like [`EntityRepository::get`], failing with `NotFound`.
    pub async fn require(&self, id: &str) -> DbResult<T> {
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found(T::ENTITY, id))
    }

    /// Lists records by name.
    pub async fn list(&self, limit: u32, offset: u32) -> DbResult<Vec<T>> {
        let query = Query::new().order_by("name", false).limit(limit).offset(offset);
        query_typed(self.store.as_ref(), T::COLLECTION, &query).await
    }

    /// Records whose name starts with `prefix`, ignoring ASCII case.
    pub async fn search(&self, prefix: &str, limit: u32) -> DbResult<Vec<T>> {
        let prefix = prefix.trim();
        debug!(collection = T::COLLECTION, prefix, limit, "Searching");
        if prefix.is_empty() {
            return self.list(limit, 0).await;
        }
        let query = Query::new()
            .filter("name", FilterOp::Prefix, prefix)
            .order_by("name", false)
            .limit(limit);
        query_typed(self.store.as_ref(), T::COLLECTION, &query).await
    }

    /// Applies `edit` to the stored record. Balances keep their stored values.
    pub async fn update(&self, id: &str, edit: impl Fn(&mut T) + Send + Sync) -> DbResult<T> {
        let now = self.clock.now();
        let mutator = |doc: &mut Value| -> DbResult<()> {
            let stored: T = from_document(T::COLLECTION, id, doc.clone())?;
            let mut next = stored.clone();
            edit(&mut next);
            next.set_id(stored.id().to_string());
            next.keep_balances(&stored);
            *doc = to_document(&next)?;
            if let Some(body) = doc.as_object_mut() {
                body.insert("updated_at".to_string(), to_document(&now)?);
            }
            Ok(())
        };

        let modified = self
            .store
            .modify(T::COLLECTION, id, &mutator)
            .await?
            .ok_or_else(|| DbError::not_found(T::ENTITY, id))?;
        from_document(T::COLLECTION, id, modified.after)
    }

    /// Removes the record and takes its balances out of the scope counter.
    pub async fn delete(&self, id: &str) -> DbResult<T> {
        let body = self
            .store
            .delete(T::COLLECTION, id)
            .await?
            .ok_or_else(|| DbError::not_found(T::ENTITY, id))?;
        let entity: T = from_document(T::COLLECTION, id, body)?;
        self.bump(entity.balance_deltas().negated().increment("total", -1.0))
            .await?;

        info!(collection = T::COLLECTION, id, "Deleted");
        Ok(entity)
    }
}
