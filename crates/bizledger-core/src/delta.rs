//! # Delta Calculator
//!
//! Pure functions computing the signed deltas implied by a transition between
//! two order states. No I/O.
//!
//! ## Transitions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Transition         old          new          Effect                    │
//! │  ─────────────────────────────────────────────────────────────────────  │
//! │  create             None         Some(o)      full contribution         │
//! │  update             Some(a)      Some(b)      difference b − a          │
//! │  delete             Some(o)      None         full reversal             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Sign Conventions
//! - `due_delta` is positive when the remaining due shrinks; balances move by
//!   its negation.
//! - Stock deltas are negative for goods leaving stock.

use std::collections::BTreeMap;

use crate::order::Order;
use crate::types::{OrderItem, OrderType};

// =============================================================================
// Financial Deltas
// =============================================================================

/// Change in an order's money fields between two states.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FinancialDelta {
    pub total_amount_delta: f64,
    pub amount_paid_delta: f64,
}

impl FinancialDelta {
    pub fn is_zero(&self) -> bool {
        self.total_amount_delta == 0.0 && self.amount_paid_delta == 0.0
    }
}

fn amounts(order: Option<&Order>) -> (f64, f64) {
    order.map_or((0.0, 0.0), |o| (o.total_amount, o.amount_paid))
}

/// `new − old` for `total_amount` and `amount_paid`. An absent side counts as
/// zero.
pub fn financial_delta(old: Option<&Order>, new: Option<&Order>) -> FinancialDelta {
    let (old_total, old_paid) = amounts(old);
    let (new_total, new_paid) = amounts(new);
    FinancialDelta {
        total_amount_delta: new_total - old_total,
        amount_paid_delta: new_paid - old_paid,
    }
}

/// Change in remaining due: `(old.total − old.paid) − (new.total − new.paid)`.
///
/// Positive when the due shrinks. The counterparty balance moves by
/// `-due_delta(..)`.
pub fn due_delta(old: Option<&Order>, new: Option<&Order>) -> f64 {
    let (old_total, old_paid) = amounts(old);
    let (new_total, new_paid) = amounts(new);
    (old_total - old_paid) - (new_total - new_paid)
}

/// Change in `total_quantity` between two states.
pub fn quantity_delta(old: Option<&Order>, new: Option<&Order>) -> f64 {
    let old_qty = old.map_or(0.0, |o| o.total_quantity);
    let new_qty = new.map_or(0.0, |o| o.total_quantity);
    new_qty - old_qty
}

// =============================================================================
// Stock Deltas
// =============================================================================

/// Whether an order's stock effect is being applied or undone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDirection {
    Apply,
    Revert,
}

/// Signed quantity change for one inventory item (and optional batch).
#[derive(Debug, Clone, PartialEq)]
pub struct StockDelta {
    pub item_id: String,
    pub batch_number: Option<String>,
    pub expiry: Option<String>,
    pub delta: f64,
}

/// Per-line stock deltas for an order.
///
/// | order type              | Apply | Revert |
/// |-------------------------|-------|--------|
/// | sale / delivery challan | −qty  | +qty   |
/// | purchase                | +qty  | −qty   |
pub fn stock_delta_for_items(
    items: &[OrderItem],
    order_type: OrderType,
    direction: StockDirection,
) -> Vec<StockDelta> {
    let outbound = if order_type.is_outbound() { -1.0 } else { 1.0 };
    let sign = match direction {
        StockDirection::Apply => outbound,
        StockDirection::Revert => -outbound,
    };

    items
        .iter()
        .map(|item| StockDelta {
            item_id: item.item_id.clone(),
            batch_number: item.batch().map(str::to_string),
            expiry: item.expiry.clone(),
            delta: sign * item.quantity,
        })
        .collect()
}

// =============================================================================
// Item Diff
// =============================================================================

/// Identity of a stock line: item plus optional batch.
pub type LineKey = (String, Option<String>);

/// A line's aggregated quantity within one order.
#[derive(Debug, Clone, PartialEq)]
pub struct LineQuantity {
    pub item_id: String,
    pub batch_number: Option<String>,
    pub expiry: Option<String>,
    pub item_name: String,
    pub category: Option<String>,
    pub quantity: f64,
}

impl LineQuantity {
    /// An order item carrying this line's identity and `quantity`.
    pub fn to_item(&self, quantity: f64) -> OrderItem {
        OrderItem {
            item_id: self.item_id.clone(),
            item_name: self.item_name.clone(),
            batch_number: self.batch_number.clone(),
            expiry: self.expiry.clone(),
            quantity,
            price: 0.0,
            tax: 0.0,
            discount: 0.0,
            category: self.category.clone(),
        }
    }
}

/// A line present in both states whose quantity changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangedLine {
    pub line: LineQuantity,
    /// `new − old`, in order quantity (not stock direction).
    pub quantity_delta: f64,
}

/// Difference between two item lists, keyed by `(item_id, batch_number)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemDiff {
    pub removed: Vec<LineQuantity>,
    pub added: Vec<LineQuantity>,
    pub changed: Vec<ChangedLine>,
}

impl ItemDiff {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty() && self.changed.is_empty()
    }

    /// Lines whose order quantity grew (added lines and positive changes),
    /// as items carrying only the growth.
    pub fn increases(&self) -> Vec<OrderItem> {
        let added = self.added.iter().map(|l| l.to_item(l.quantity));
        let grown = self
            .changed
            .iter()
            .filter(|c| c.quantity_delta > 0.0)
            .map(|c| c.line.to_item(c.quantity_delta));
        added.chain(grown).collect()
    }

    /// Lines whose order quantity shrank (removed lines and negative changes),
    /// as items carrying only the reduction.
    pub fn decreases(&self) -> Vec<OrderItem> {
        let removed = self.removed.iter().map(|l| l.to_item(l.quantity));
        let shrunk = self
            .changed
            .iter()
            .filter(|c| c.quantity_delta < 0.0)
            .map(|c| c.line.to_item(-c.quantity_delta));
        removed.chain(shrunk).collect()
    }
}

/// Sums quantities per `(item_id, batch_number)`.
pub fn group_lines(items: &[OrderItem]) -> BTreeMap<LineKey, LineQuantity> {
    let mut lines: BTreeMap<LineKey, LineQuantity> = BTreeMap::new();
    for item in items {
        let batch = item.batch().map(str::to_string);
        let key = (item.item_id.clone(), batch.clone());
        lines
            .entry(key)
            .and_modify(|line| line.quantity += item.quantity)
            .or_insert_with(|| LineQuantity {
                item_id: item.item_id.clone(),
                batch_number: batch,
                expiry: item.expiry.clone(),
                item_name: item.item_name.clone(),
                category: item.category.clone(),
                quantity: item.quantity,
            });
    }
    lines
}

/// Full diff between the old and new item lists. Duplicate keys within one
/// list are summed before comparing.
pub fn diff_items(old_items: &[OrderItem], new_items: &[OrderItem]) -> ItemDiff {
    let old = group_lines(old_items);
    let mut new = group_lines(new_items);
    let mut diff = ItemDiff::default();

    for (key, old_line) in old {
        match new.remove(&key) {
            None => diff.removed.push(old_line),
            Some(new_line) => {
                let quantity_delta = new_line.quantity - old_line.quantity;
                if quantity_delta != 0.0 {
                    diff.changed.push(ChangedLine {
                        line: new_line,
                        quantity_delta,
                    });
                }
            }
        }
    }
    diff.added = new.into_values().collect();
    diff
}

// =============================================================================
// Unit Tests
// =============================================================================
