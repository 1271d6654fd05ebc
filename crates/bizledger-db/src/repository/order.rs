//! # Order Repository
//!
//! Order documents keyed by invoice or challan number.
//!
//! ## Listing
//! ```text
//! OrderQuery { order_type: Some(Sale), client_id: Some("C0001"),
//!              from: Some(2025-03-01T00:00:00Z), limit: 20 }
//!      │
//!      ▼
//! WHERE json_extract(body, '$.party.order_type') = 'sale'
//!   AND json_extract(body, '$.party.client.id')  = 'C0001'
//!   AND json_extract(body, '$.order_date')      >= '2025-03-01T00:00:00Z'
//! ORDER BY json_extract(body, '$.created_at') DESC, id
//! LIMIT 20
//! ```
//!
//! Date bounds apply to the business `order_date`, inclusive at both ends.

use std::sync::Arc;

use bizledger_core::{collection, Order, OrderType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DbResult;
use crate::store::{get_typed, query_typed, to_document, DocumentStore, Query};

/// Filters for [`OrderRepository::list`]. Results are newest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderQuery {
    #[serde(default)]
    pub order_type: Option<OrderType>,
    #[serde(default)]
    pub draft: Option<bool>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub supplier_id: Option<String>,
    /// Earliest `order_date`.
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    /// Latest `order_date`.
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

impl OrderQuery {
    fn to_query(&self) -> Query {
        let mut query = Query::new().order_by("created_at", true);
        if let Some(order_type) = self.order_type {
            query = query.eq("party.order_type", order_type.as_str());
        }
        if let Some(draft) = self.draft {
            query = query.eq("draft", draft);
        }
        if let Some(client_id) = &self.client_id {
            query = query.eq("party.client.id", client_id.as_str());
        }
        if let Some(supplier_id) = &self.supplier_id {
            query = query.eq("party.supplier.id", supplier_id.as_str());
        }
        query = query.within("order_date", self.from, self.to);
        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }
        if let Some(offset) = self.offset {
            query = query.offset(offset);
        }
        query
    }
}

#[derive(Debug, Clone)]
pub struct OrderRepository {
    store: Arc<dyn DocumentStore>,
}

impl OrderRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Order>> {
        get_typed(self.store.as_ref(), collection::ORDERS, id).await
    }

    /// Raw document, for compensations that restore it verbatim.
    pub async fn get_raw(&self, id: &str) -> DbResult<Option<Value>> {
        self.store.get(collection::ORDERS, id).await
    }

    pub async fn exists(&self, id: &str) -> DbResult<bool> {
        Ok(self.get_raw(id).await?.is_some())
    }

    /// Inserts a new order. Fails with `UniqueViolation` when the id is taken.
    pub async fn insert(&self, order: &Order) -> DbResult<()> {
        self.store
            .insert(collection::ORDERS, &order.id, to_document(order)?)
            .await
    }

    /// Overwrites an order document.
    pub async fn save(&self, order: &Order) -> DbResult<()> {
        self.store
            .set(collection::ORDERS, &order.id, to_document(order)?)
            .await
    }

    pub async fn delete(&self, id: &str) -> DbResult<Option<Value>> {
        self.store.delete(collection::ORDERS, id).await
    }

    pub async fn list(&self, filter: &OrderQuery) -> DbResult<Vec<Order>> {
        query_typed(self.store.as_ref(), collection::ORDERS, &filter.to_query()).await
    }

    /// Sum of `total_amount` over the orders `filter` matches.
    pub async fn total_amount(&self, filter: &OrderQuery) -> DbResult<f64> {
        let orders = self.list(filter).await?;
        Ok(orders.iter().map(|o| o.total_amount).sum())
    }
}
