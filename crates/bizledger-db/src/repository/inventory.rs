//! # Inventory Repository
//!
//! Stock items, the low-stock report, the expiry report and category
//! listings. Stock levels move through the inventory reconciler; `update`
//! here edits name, category, price and threshold only.

use bizledger_core::{collection, CounterDeltas, InventoryItem};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Entity, EntityRepository};
use crate::error::DbResult;
use crate::store::{query_typed, Query};

pub type InventoryRepository = EntityRepository<InventoryItem>;

impl Entity for InventoryItem {
    const COLLECTION: &'static str = collection::INVENTORY_ITEMS;
    const ENTITY: &'static str = "InventoryItem";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn stamp(&mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) {
        self.created_at = created_at;
        self.updated_at = updated_at;
    }

    fn balance_deltas(&self) -> CounterDeltas {
        CounterDeltas::new().increment("total_stock", self.stock_quantity)
    }

    fn keep_balances(&mut self, stored: &Self) {
        self.stock_quantity = stored.stock_quantity;
        self.batches = stored.batches.clone();
    }
}

/// One batch in the expiry report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiringStock {
    pub item_id: String,
    pub item_name: String,
    pub batch_number: String,
    pub expiry: NaiveDate,
    pub quantity: f64,
}

impl InventoryRepository {
    /// Items with `stock_quantity <= low_stock_threshold`, lowest stock first.
    pub async fn low_stock(&self) -> DbResult<Vec<InventoryItem>> {
        let query = Query::new().order_by("stock_quantity", false);
        let items: Vec<InventoryItem> =
            query_typed(self.store.as_ref(), collection::INVENTORY_ITEMS, &query).await?;
        let low: Vec<InventoryItem> = items.into_iter().filter(InventoryItem::is_low_stock).collect();

        debug!(count = low.len(), "Low-stock report");
        Ok(low)
    }

    /// Batches with stock left that expire within `days` of today
    /// (already expired ones included), soonest first.
    pub async fn expiring_within(&self, days: u32) -> DbResult<Vec<ExpiringStock>> {
        let cutoff = (self.clock.now() + Duration::days(i64::from(days))).date_naive();
        let items: Vec<InventoryItem> =
            query_typed(self.store.as_ref(), collection::INVENTORY_ITEMS, &Query::new()).await?;

        let mut report: Vec<ExpiringStock> = items
            .iter()
            .flat_map(|item| {
                item.batches_expiring_by(cutoff)
                    .into_iter()
                    .map(|(batch, expiry)| ExpiringStock {
                        item_id: item.id.clone(),
                        item_name: item.name.clone(),
                        batch_number: batch.batch_number.clone(),
                        expiry,
                        quantity: batch.quantity,
                    })
            })
            .collect();
        report.sort_by(|a, b| a.expiry.cmp(&b.expiry).then_with(|| a.item_id.cmp(&b.item_id)));

        debug!(days, %cutoff, count = report.len(), "Expiry report");
        Ok(report)
    }

    /// Items in `category`, by name.
    pub async fn by_category(&self, category: &str) -> DbResult<Vec<InventoryItem>> {
        let query = Query::new().eq("category", category.trim()).order_by("name", false);
        query_typed(self.store.as_ref(), collection::INVENTORY_ITEMS, &query).await
    }
}
