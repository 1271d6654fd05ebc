//! # Aggregate Counters
//!
//! Scope names, field names and the counter deltas an order contributes.
//!
//! ## Counter Documents
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  AggregateCounters/{scope}                                              │
//! │                                                                         │
//! │  orders             total, total_sales.{count,amount},                  │
//! │                     total_purchase.{count,amount},                      │
//! │                     delivery_challan.{count,amount},                    │
//! │                     total_revenue, last_id                              │
//! │  clients            total, total_due, total_orders                      │
//! │  suppliers          total, total_due, total_orders                      │
//! │  employees          total, total_collected, total_paid                  │
//! │  items              total, total_stock                                  │
//! │  expenses           total, total_amount                                 │
//! │  financial_summary  total_income, total_expense                         │
//! │  YYYY-MM            sales_orders_{count,amount,paid},                   │
//! │                     purchase_orders_{count,amount,paid},                │
//! │                     delivery_challan_{count,amount,paid},               │
//! │                     expenses_{count,amount}                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each active order contributes `+1` to its counts, `total_amount` to its
//! amounts and `amount_paid` to its cash fields. Creating applies the
//! contribution, deleting applies its negation, updating applies the
//! difference. That keeps every counter equal to the sum over active orders.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::delta::financial_delta;
use crate::order::Order;
use crate::types::{OrderType, PartyKind};

// =============================================================================
// Scopes
// =============================================================================

/// Well-known counter scopes (document ids in `AggregateCounters`).
pub mod scope {
    pub const ORDERS: &str = "orders";
    pub const CLIENTS: &str = "clients";
    pub const SUPPLIERS: &str = "suppliers";
    pub const EMPLOYEES: &str = "employees";
    pub const ITEMS: &str = "items";
    pub const EXPENSES: &str = "expenses";
    pub const PAYMENTS: &str = "payments";
    pub const SUPPLIER_PAYMENTS: &str = "supplier_payments";
    pub const FINANCIAL_SUMMARY: &str = "financial_summary";
}

/// Counter scope for a party kind.
pub fn party_scope(kind: PartyKind) -> &'static str {
    match kind {
        PartyKind::Client => scope::CLIENTS,
        PartyKind::Supplier => scope::SUPPLIERS,
    }
}

/// Counter scope for an entity collection (`InventoryItems` → `items`).
pub fn collection_scope(collection: &str) -> String {
    match collection {
        "InventoryItems" => scope::ITEMS.to_string(),
        "SupplierPayments" => scope::SUPPLIER_PAYMENTS.to_string(),
        other => other.to_lowercase(),
    }
}

/// Formats the `YYYY-MM` month key for a timestamp.
pub fn month_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}

/// True for keys shaped like `YYYY-MM` with a month between 01 and 12.
pub fn is_month_key(key: &str) -> bool {
    let bytes = key.as_bytes();
    if bytes.len() != 7 || bytes[4] != b'-' {
        return false;
    }
    let digits = bytes[..4].iter().chain(&bytes[5..]);
    if !digits.clone().all(u8::is_ascii_digit) {
        return false;
    }
    matches!(key[5..].parse::<u8>(), Ok(1..=12))
}

// =============================================================================
// Field Updates
// =============================================================================

/// A single field change applied by the entity store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum FieldUpdate {
    /// Overwrite the field.
    Set(Value),
    /// Atomically add to a numeric field (missing fields start at zero).
    Increment(f64),
}

/// A map of dotted field paths to updates for one counter document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CounterDeltas {
    fields: BTreeMap<String, FieldUpdate>,
}

impl CounterDeltas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an increment. Zero increments are dropped; repeated fields sum.
    pub fn increment(mut self, field: impl Into<String>, by: f64) -> Self {
        if by == 0.0 {
            return self;
        }
        let field = field.into();
        let next = match self.fields.get(&field) {
            Some(FieldUpdate::Increment(current)) => current + by,
            _ => by,
        };
        self.fields.insert(field, FieldUpdate::Increment(next));
        self
    }

    /// Sets a non-numeric field (e.g. `last_id`).
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), FieldUpdate::Set(value.into()));
        self
    }

    /// True when no increment is present (set-only deltas do not count).
    pub fn is_empty(&self) -> bool {
        !self
            .fields
            .values()
            .any(|u| matches!(u, FieldUpdate::Increment(_)))
    }

    /// Returns only the increments, negated. Set fields are dropped.
    pub fn negated(&self) -> Self {
        let fields = self
            .fields
            .iter()
            .filter_map(|(k, u)| match u {
                FieldUpdate::Increment(by) => Some((k.clone(), FieldUpdate::Increment(-by))),
                FieldUpdate::Set(_) => None,
            })
            .collect();
        CounterDeltas { fields }
    }

    /// The increments as plain numbers.
    pub fn increments(&self) -> BTreeMap<String, f64> {
        self.fields
            .iter()
            .filter_map(|(k, u)| match u {
                FieldUpdate::Increment(by) => Some((k.clone(), *by)),
                FieldUpdate::Set(_) => None,
            })
            .collect()
    }

    /// Looks up the increment for one field (0 when absent).
    pub fn get(&self, field: &str) -> f64 {
        match self.fields.get(field) {
            Some(FieldUpdate::Increment(by)) => *by,
            _ => 0.0,
        }
    }

    pub fn into_fields(self) -> BTreeMap<String, FieldUpdate> {
        self.fields
    }
}

// =============================================================================
// Order Contributions
// =============================================================================

/// Field name of the per-type map in the `orders` counter.
pub fn order_type_key(order_type: OrderType) -> &'static str {
    match order_type {
        OrderType::Sale => "total_sales",
        OrderType::Purchase => "total_purchase",
        OrderType::DeliveryChallan => "delivery_challan",
    }
}

/// Field prefix in monthly counters.
pub fn monthly_prefix(order_type: OrderType) -> &'static str {
    match order_type {
        OrderType::Sale => "sales_orders",
        OrderType::Purchase => "purchase_orders",
        OrderType::DeliveryChallan => "delivery_challan",
    }
}

/// Sign of an order's cash effect on `financial_summary.total_income`:
/// money in for sales and challans, money out for purchases.
pub fn income_sign(order_type: OrderType) -> f64 {
    if order_type.is_outbound() {
        1.0
    } else {
        -1.0
    }
}

/// Counter deltas produced by one order mutation, grouped by document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderCounterDeltas {
    /// `AggregateCounters/orders`
    pub orders: CounterDeltas,
    /// `AggregateCounters/clients` or `/suppliers`
    pub party: CounterDeltas,
    /// `AggregateCounters/financial_summary`
    pub financial: CounterDeltas,
    /// `AggregateCounters/{YYYY-MM}`
    pub monthly: CounterDeltas,
}

/// Whether an order's contribution is added or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contribution {
    Apply,
    Revert,
}

impl Contribution {
    fn sign(self) -> f64 {
        match self {
            Contribution::Apply => 1.0,
            Contribution::Revert => -1.0,
        }
    }
}

/// The full counter contribution of one active order.
pub fn order_counter_deltas(order: &Order, contribution: Contribution) -> OrderCounterDeltas {
    let sign = contribution.sign();
    let order_type = order.order_type();
    let type_key = order_type_key(order_type);
    let prefix = monthly_prefix(order_type);

    let mut orders = CounterDeltas::new()
        .increment("total", sign)
        .increment(format!("{type_key}.count"), sign)
        .increment(format!("{type_key}.amount"), sign * order.total_amount);
    if order_type.is_outbound() {
        orders = orders.increment("total_revenue", sign * order.amount_paid);
    }

    OrderCounterDeltas {
        orders,
        party: CounterDeltas::new().increment("total_orders", sign),
        financial: CounterDeltas::new().increment(
            "total_income",
            sign * income_sign(order_type) * order.amount_paid,
        ),
        monthly: CounterDeltas::new()
            .increment(format!("{prefix}_count"), sign)
            .increment(format!("{prefix}_amount"), sign * order.total_amount)
            .increment(format!("{prefix}_paid"), sign * order.amount_paid),
    }
}

/// Counter deltas for an in-place change of an active order. Counts do not
/// move; amounts move by the financial delta.
pub fn order_change_deltas(old: &Order, new: &Order) -> OrderCounterDeltas {
    let delta = financial_delta(Some(old), Some(new));
    let order_type = new.order_type();
    let type_key = order_type_key(order_type);
    let prefix = monthly_prefix(order_type);

    let mut orders =
        CounterDeltas::new().increment(format!("{type_key}.amount"), delta.total_amount_delta);
    if order_type.is_outbound() {
        orders = orders.increment("total_revenue", delta.amount_paid_delta);
    }

    OrderCounterDeltas {
        orders,
        party: CounterDeltas::new(),
        financial: CounterDeltas::new().increment(
            "total_income",
            income_sign(order_type) * delta.amount_paid_delta,
        ),
        monthly: CounterDeltas::new()
            .increment(format!("{prefix}_amount"), delta.total_amount_delta)
            .increment(format!("{prefix}_paid"), delta.amount_paid_delta),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
