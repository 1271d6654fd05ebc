//! # Inventory Reconciler
//!
//! Moves stock for order lines and keeps `AggregateCounters/items` in step.
//!
//! ## Flow (sale)
//! ```text
//! apply_sale_deduction(items)
//!      │
//!      ▼
//! check_sale_availability ── any line short? ──► Err (nothing written)
//!      │
//!      ▼
//! for each (item_id, batch) line:
//!     modify InventoryItems/{id}: deduct  ──► journal: Stock { delta }
//!      │
//!      ▼
//! AggregateCounters/items.total_stock += Σ applied
//! ```
//!
//! Missing items are skipped with a warning on every path. Reversals clamp at
//! zero and never raise stock errors.

use std::sync::Arc;

use bizledger_core::counters::scope;
use bizledger_core::delta::{diff_items, group_lines, stock_delta_for_items, LineQuantity, StockDelta, StockDirection};
use bizledger_core::{collection, CounterDeltas, InventoryItem, OrderItem, OrderType};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::bump_counter;
use crate::clock::Clock;
use crate::config::LedgerSettings;
use crate::error::{DbError, DbResult};
use crate::saga::{Compensation, Journal};
use crate::store::patch::get_number;
use crate::store::{from_document, get_typed, to_document, DocumentStore, Modified};

// =============================================================================
// Stock Primitive
// =============================================================================

fn stock_change(modified: &Modified) -> f64 {
    get_number(&modified.after, "stock_quantity") - get_number(&modified.before, "stock_quantity")
}

fn warn_if_low(item_id: &str, modified: &Modified) {
    let stock = get_number(&modified.after, "stock_quantity");
    let threshold = get_number(&modified.after, "low_stock_threshold");
    if stock <= threshold {
        warn!(item_id, stock, threshold, "Item at or below low-stock threshold");
    }
}

/// Applies a signed stock change to one item (clamping removals at zero).
///
/// Returns the change actually applied to `stock_quantity`, or `None` when
/// the item does not exist. `stamp` sets `updated_at` when given.
pub async fn change_stock(
    store: &dyn DocumentStore,
    item_id: &str,
    batch_number: Option<&str>,
    expiry: Option<&str>,
    delta: f64,
    stamp: Option<DateTime<Utc>>,
) -> DbResult<Option<f64>> {
    let mutator = |doc: &mut Value| -> DbResult<()> {
        let mut item: InventoryItem = from_document(collection::INVENTORY_ITEMS, item_id, doc.clone())?;
        item.apply_change(batch_number, expiry, delta);
        if let Some(now) = stamp {
            item.updated_at = now;
        }
        *doc = to_document(&item)?;
        Ok(())
    };

    let modified = store
        .modify(collection::INVENTORY_ITEMS, item_id, &mutator)
        .await?;
    Ok(modified.as_ref().map(stock_change))
}

fn stock_compensation(line: &StockDelta, applied: f64) -> Compensation {
    Compensation::Stock {
        item_id: line.item_id.clone(),
        batch_number: line.batch_number.clone(),
        expiry: line.expiry.clone(),
        delta: applied,
    }
}

// =============================================================================
// Reconciler
// =============================================================================

#[derive(Debug, Clone)]
pub struct InventoryReconciler {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    settings: LedgerSettings,
}

impl InventoryReconciler {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, settings: LedgerSettings) -> Self {
        Self { store, clock, settings }
    }

    /// Verifies every line can be deducted. Reads only.
    pub async fn check_sale_availability(&self, items: &[OrderItem]) -> DbResult<()> {
        for line in group_lines(items).values() {
            let item: Option<InventoryItem> =
                get_typed(self.store.as_ref(), collection::INVENTORY_ITEMS, &line.item_id).await?;
            if let Some(item) = item {
                item.check_deduction(line.batch_number.as_deref(), line.quantity)?;
            }
        }
        Ok(())
    }

    /// Deducts stock for a sale or delivery challan. All lines are checked
    /// before the first write.
    pub async fn apply_sale_deduction(
        &self,
        items: &[OrderItem],
        order_id: &str,
        journal: &mut Journal,
    ) -> DbResult<()> {
        self.check_sale_availability(items).await?;
        let lines: Vec<LineQuantity> = group_lines(items).into_values().collect();
        let total = self.deduct_lines(&lines, order_id, journal).await?;
        self.bump_items(total, 0, journal).await
    }

    /// Adds stock for a purchase, creating items that do not exist yet.
    pub async fn apply_purchase_addition(
        &self,
        items: &[OrderItem],
        order_id: &str,
        journal: &mut Journal,
    ) -> DbResult<()> {
        let lines: Vec<LineQuantity> = group_lines(items).into_values().collect();
        let (total, created) = self.add_lines(&lines, items, order_id, journal).await?;
        self.bump_items(total, created, journal).await
    }

    /// Undoes an order's stock effect. Sales give stock back (never creating
    /// missing items); purchases take it away with clamping.
    pub async fn revert_on_delete(
        &self,
        items: &[OrderItem],
        order_type: OrderType,
        order_id: &str,
        journal: &mut Journal,
    ) -> DbResult<()> {
        let deltas = stock_delta_for_items(items, order_type, StockDirection::Revert);
        let total = self.shift_lines(&deltas, order_id, journal).await?;
        self.bump_items(total, 0, journal).await
    }

    /// Reconciles stock for an item list change on an active order.
    ///
    /// ```text
    /// old: I1×5, I2×2        diff: I1 +3 (changed), I2 −2 (removed), I3 +1 (added)
    /// new: I1×8, I3×1
    /// ```
    /// For sales the extra demand is checked before any write; shrinking or
    /// removed lines are reversed and never fail.
    pub async fn reconcile_on_update(
        &self,
        old_items: &[OrderItem],
        new_items: &[OrderItem],
        order_type: OrderType,
        order_id: &str,
        journal: &mut Journal,
    ) -> DbResult<()> {
        let diff = diff_items(old_items, new_items);
        if diff.is_empty() {
            return Ok(());
        }
        let increases = diff.increases();
        let decreases = stock_delta_for_items(&diff.decreases(), order_type, StockDirection::Revert);

        debug!(
            order_id,
            added = diff.added.len(),
            removed = diff.removed.len(),
            changed = diff.changed.len(),
            "Reconciling item changes"
        );

        let grown: Vec<LineQuantity> = group_lines(&increases).into_values().collect();
        let (total, created) = if order_type.is_outbound() {
            self.check_sale_availability(&increases).await?;
            let returned = self.shift_lines(&decreases, order_id, journal).await?;
            let taken = self.deduct_lines(&grown, order_id, journal).await?;
            (returned + taken, 0)
        } else {
            let removed = self.shift_lines(&decreases, order_id, journal).await?;
            let (added, created) = self.add_lines(&grown, new_items, order_id, journal).await?;
            (removed + added, created)
        };
        self.bump_items(total, created, journal).await
    }

    // -------------------------------------------------------------------------
    // Line primitives
    // -------------------------------------------------------------------------

    async fn deduct_lines(&self, lines: &[LineQuantity], order_id: &str, journal: &mut Journal) -> DbResult<f64> {
        let now = self.clock.now();
        let mut total = 0.0;

        for line in lines {
            let batch = line.batch_number.as_deref();
            let mutator = |doc: &mut Value| -> DbResult<()> {
                let mut item: InventoryItem =
                    from_document(collection::INVENTORY_ITEMS, &line.item_id, doc.clone())?;
                item.deduct(batch, line.quantity)?;
                item.updated_at = now;
                *doc = to_document(&item)?;
                Ok(())
            };

            match self
                .store
                .modify(collection::INVENTORY_ITEMS, &line.item_id, &mutator)
                .await?
            {
                Some(modified) => {
                    let applied = stock_change(&modified);
                    journal.record(Compensation::Stock {
                        item_id: line.item_id.clone(),
                        batch_number: line.batch_number.clone(),
                        expiry: line.expiry.clone(),
                        delta: applied,
                    });
                    warn_if_low(&line.item_id, &modified);
                    total += applied;
                }
                None => warn!(order_id, item_id = %line.item_id, "Inventory item not found, skipping deduction"),
            }
        }
        Ok(total)
    }

    /// Adds each line, creating missing items. `source` supplies the price
    /// and category of new items.
    async fn add_lines(
        &self,
        lines: &[LineQuantity],
        source: &[OrderItem],
        order_id: &str,
        journal: &mut Journal,
    ) -> DbResult<(f64, usize)> {
        let now = self.clock.now();
        let mut total = 0.0;
        let mut created = 0;

        for line in lines {
            let delta = StockDelta {
                item_id: line.item_id.clone(),
                batch_number: line.batch_number.clone(),
                expiry: line.expiry.clone(),
                delta: line.quantity,
            };
            if let Some(applied) = self.shift_one(&delta, now).await? {
                journal.record(stock_compensation(&delta, applied));
                total += applied;
                continue;
            }

            let mut template = source
                .iter()
                .find(|item| item.item_id == line.item_id)
                .cloned()
                .unwrap_or_else(|| line.to_item(line.quantity));
            template.quantity = line.quantity;
            template.batch_number = line.batch_number.clone();
            template.expiry = line.expiry.clone();
            let item = InventoryItem::from_purchase_line(
                &template,
                &self.settings.default_category,
                self.settings.low_stock_threshold,
                now,
            );

            match self
                .store
                .insert(collection::INVENTORY_ITEMS, &item.id, to_document(&item)?)
                .await
            {
                Ok(()) => {
                    info!(order_id, item_id = %item.id, category = %item.category, "Created inventory item from purchase");
                    journal.record(Compensation::restore(collection::INVENTORY_ITEMS, &item.id, None));
                    total += line.quantity;
                    created += 1;
                }
                Err(DbError::UniqueViolation { .. }) => {
                    // Created concurrently; add to it instead.
                    if let Some(applied) = self.shift_one(&delta, now).await? {
                        journal.record(stock_compensation(&delta, applied));
                        total += applied;
                    }
                }
                Err(err) => return Err(err),
            }
        }
        Ok((total, created))
    }

    /// Applies signed deltas that cannot fail on stock; missing items are
    /// skipped.
    async fn shift_lines(&self, deltas: &[StockDelta], order_id: &str, journal: &mut Journal) -> DbResult<f64> {
        let now = self.clock.now();
        let mut total = 0.0;
        for delta in deltas {
            match self.shift_one(delta, now).await? {
                Some(applied) => {
                    journal.record(stock_compensation(delta, applied));
                    total += applied;
                }
                None => warn!(order_id, item_id = %delta.item_id, "Inventory item not found, skipping stock reversal"),
            }
        }
        Ok(total)
    }

    async fn shift_one(&self, delta: &StockDelta, now: DateTime<Utc>) -> DbResult<Option<f64>> {
        change_stock(
            self.store.as_ref(),
            &delta.item_id,
            delta.batch_number.as_deref(),
            delta.expiry.as_deref(),
            delta.delta,
            Some(now),
        )
        .await
    }

    async fn bump_items(&self, total_stock: f64, created: usize, journal: &mut Journal) -> DbResult<()> {
        let deltas = CounterDeltas::new()
            .increment("total_stock", total_stock)
            .increment("total", created as f64);
        bump_counter(self.store.as_ref(), self.clock.as_ref(), journal, scope::ITEMS, deltas).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
