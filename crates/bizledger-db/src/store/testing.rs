//! Failure injection for store tests.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use super::{DocumentStore, FieldUpdates, Modified, Query};
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
struct Fault {
    collection: String,
    id: Option<String>,
    /// Matching writes to let through before failing.
    skip: usize,
}

/// Wraps a store and fails writes to chosen documents.
#[derive(Debug)]
pub struct FaultyStore {
    inner: Arc<dyn DocumentStore>,
    faults: Mutex<Vec<Fault>>,
}

impl FaultyStore {
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner,
            faults: Mutex::new(Vec::new()),
        }
    }

    /// Fails every write to `collection` (or to one document when `id` is
    /// given) until [`FaultyStore::clear`].
    pub fn fail_writes(&self, collection: &str, id: Option<&str>) {
        self.fail_writes_after(collection, id, 0);
    }

    /// Like [`FaultyStore::fail_writes`], but lets `skip` matching writes
    /// succeed first.
    pub fn fail_writes_after(&self, collection: &str, id: Option<&str>, skip: usize) {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner).push(Fault {
            collection: collection.to_string(),
            id: id.map(str::to_string),
            skip,
        });
    }

    pub fn clear(&self) {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn check(&self, collection: &str, id: &str) -> DbResult<()> {
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        for fault in faults.iter_mut() {
            let matches = fault.collection == collection && fault.id.as_deref().map_or(true, |f| f == id);
            if !matches {
                continue;
            }
            if fault.skip > 0 {
                fault.skip -= 1;
                return Ok(());
            }
            return Err(DbError::QueryFailed(format!("injected fault writing {collection}/{id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FaultyStore {
    async fn get(&self, collection: &str, id: &str) -> DbResult<Option<Value>> {
        self.inner.get(collection, id).await
    }

    async fn set(&self, collection: &str, id: &str, document: Value) -> DbResult<()> {
        self.check(collection, id)?;
        self.inner.set(collection, id, document).await
    }

    async fn insert(&self, collection: &str, id: &str, document: Value) -> DbResult<()> {
        self.check(collection, id)?;
        self.inner.insert(collection, id, document).await
    }

    async fn update(&self, collection: &str, id: &str, fields: &FieldUpdates) -> DbResult<Value> {
        self.check(collection, id)?;
        self.inner.update(collection, id, fields).await
    }

    async fn merge(&self, collection: &str, id: &str, fields: &FieldUpdates) -> DbResult<Value> {
        self.check(collection, id)?;
        self.inner.merge(collection, id, fields).await
    }

    async fn delete(&self, collection: &str, id: &str) -> DbResult<Option<Value>> {
        self.check(collection, id)?;
        self.inner.delete(collection, id).await
    }

    async fn query(&self, collection: &str, query: &Query) -> DbResult<Vec<Value>> {
        self.inner.query(collection, query).await
    }

    async fn modify(
        &self,
        collection: &str,
        id: &str,
        mutator: &(dyn for<'m> Fn(&'m mut Value) -> DbResult<()> + Send + Sync),
    ) -> DbResult<Option<Modified>> {
        self.check(collection, id)?;
        self.inner.modify(collection, id, mutator).await
    }
}
