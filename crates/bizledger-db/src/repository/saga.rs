//! # Saga Repository
//!
//! Reads the saga log. Sagas still `pending` (process stopped mid-operation)
//! or `failed` (some compensation could not be applied) form the recovery
//! queue.

use std::sync::Arc;

use bizledger_core::collection;

use crate::error::DbResult;
use crate::saga::{SagaRecord, SagaState};
use crate::store::{get_typed, query_typed, DocumentStore, FilterOp, Query};

#[derive(Debug, Clone)]
pub struct SagaRepository {
    store: Arc<dyn DocumentStore>,
}

impl SagaRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<SagaRecord>> {
        get_typed(self.store.as_ref(), collection::SAGA_LOG, id).await
    }

    /// Sagas with compensations still to run, oldest first.
    pub async fn incomplete(&self) -> DbResult<Vec<SagaRecord>> {
        let query = Query::new()
            .filter("state", FilterOp::Ne, SagaState::Completed.as_str())
            .filter("state", FilterOp::Ne, SagaState::Compensated.as_str())
            .order_by("started_at", false);
        query_typed(self.store.as_ref(), collection::SAGA_LOG, &query).await
    }

    /// Every saga recorded for one order, oldest first.
    pub async fn for_order(&self, order_id: &str) -> DbResult<Vec<SagaRecord>> {
        let query = Query::new().eq("order_id", order_id).order_by("started_at", false);
        query_typed(self.store.as_ref(), collection::SAGA_LOG, &query).await
    }
}
