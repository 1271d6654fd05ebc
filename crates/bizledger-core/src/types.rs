//! # Domain Types
//!
//! Core domain types used throughout BizLedger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Order       │   │  InventoryItem  │   │   Client        │       │
//! │  │  (order.rs)     │   │  ─────────────  │   │  Supplier       │       │
//! │  │  party: Party ──┼──►│  stock_quantity │   │  Employee       │       │
//! │  │  items          │   │  batches[]      │   │  (balances)     │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   OrderType     │   │  PaymentStatus  │   │  OrderStatus    │       │
//! │  │  Sale           │   │  Pending        │   │  Pending        │       │
//! │  │  Purchase       │   │  Partial        │   │  Processing     │       │
//! │  │  DeliveryChallan│   │  Paid           │   │  Completed      │       │
//! │  └─────────────────┘   └─────────────────┘   │  Cancelled      │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Amounts
//! Monetary values and quantities are `f64`, matching the documents the
//! engine reconciles. Rounding drift over many transactions is accepted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// Collections
// =============================================================================

/// Collection names in the entity store.
pub mod collection {
    pub const ORDERS: &str = "Orders";
    pub const INVENTORY_ITEMS: &str = "InventoryItems";
    pub const CLIENTS: &str = "Clients";
    pub const SUPPLIERS: &str = "Suppliers";
    pub const EMPLOYEES: &str = "Employees";
    pub const EXPENSES: &str = "Expenses";
    pub const PAYMENTS: &str = "Payments";
    pub const SUPPLIER_PAYMENTS: &str = "SupplierPayments";
    pub const AGGREGATE_COUNTERS: &str = "AggregateCounters";
    pub const SAGA_LOG: &str = "SagaLog";
}

// =============================================================================
// Order Enums
// =============================================================================

/// The kind of order. Determines which counterparty it touches and the
/// direction of its stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Goods leave stock; the client owes the business.
    Sale,
    /// Goods enter stock; the business owes the supplier.
    Purchase,
    /// Goods leave stock against a challan; an employee may collect payment.
    DeliveryChallan,
}

impl OrderType {
    /// True for order types that take goods out of stock.
    pub fn is_outbound(&self) -> bool {
        matches!(self, OrderType::Sale | OrderType::DeliveryChallan)
    }

    /// The counterparty kind this order type references.
    pub fn party_kind(&self) -> PartyKind {
        match self {
            OrderType::Sale | OrderType::DeliveryChallan => PartyKind::Client,
            OrderType::Purchase => PartyKind::Supplier,
        }
    }

    /// Wire name (`sale`, `purchase`, `delivery_challan`).
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Sale => "sale",
            OrderType::Purchase => "purchase",
            OrderType::DeliveryChallan => "delivery_challan",
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Partial,
    Paid,
}

/// Fulfilment state of an order. Informational; reconciliation ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Cancelled,
}

/// How the order-level discount is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `discount` is a percentage of the taxed total.
    #[default]
    Percentage,
    /// `discount` is an absolute amount.
    Fixed,
}

// =============================================================================
// Counterparty
// =============================================================================

/// Which balance ledger a counterparty lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PartyKind {
    Client,
    Supplier,
}

impl PartyKind {
    /// Collection holding standalone payments for this party kind.
    pub fn payments_collection(&self) -> &'static str {
        match self {
            PartyKind::Client => collection::PAYMENTS,
            PartyKind::Supplier => collection::SUPPLIER_PAYMENTS,
        }
    }
}

/// Reference to a client or supplier as stored on an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PartyRef {
    pub id: String,
    pub name: String,
}

impl PartyRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        PartyRef {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// The order variant together with its counterparty.
///
/// A sale or delivery challan always names a client, a purchase always names
/// a supplier, so "exactly one of client/supplier" holds by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "order_type", rename_all = "snake_case")]
pub enum Party {
    Sale {
        client: PartyRef,
    },
    Purchase {
        supplier: PartyRef,
    },
    DeliveryChallan {
        client: PartyRef,
        /// Employee name who collected the payment on the business's behalf.
        #[serde(default)]
        amount_collected_by: Option<String>,
        #[serde(default)]
        link: Option<String>,
    },
}

impl Party {
    pub fn order_type(&self) -> OrderType {
        match self {
            Party::Sale { .. } => OrderType::Sale,
            Party::Purchase { .. } => OrderType::Purchase,
            Party::DeliveryChallan { .. } => OrderType::DeliveryChallan,
        }
    }

    /// The client or supplier reference.
    pub fn party_ref(&self) -> &PartyRef {
        match self {
            Party::Sale { client } | Party::DeliveryChallan { client, .. } => client,
            Party::Purchase { supplier } => supplier,
        }
    }

    pub fn party_ref_mut(&mut self) -> &mut PartyRef {
        match self {
            Party::Sale { client } | Party::DeliveryChallan { client, .. } => client,
            Party::Purchase { supplier } => supplier,
        }
    }

    pub fn kind(&self) -> PartyKind {
        self.order_type().party_kind()
    }

    /// Collector name for delivery challans, ignoring blank values.
    pub fn collector(&self) -> Option<&str> {
        match self {
            Party::DeliveryChallan {
                amount_collected_by: Some(name),
                ..
            } if !name.trim().is_empty() => Some(name.as_str()),
            _ => None,
        }
    }
}

// =============================================================================
// Order Item
// =============================================================================

/// A line on an order. Owned by its order, never referenced elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderItem {
    pub item_id: String,
    pub item_name: String,
    #[serde(default)]
    pub batch_number: Option<String>,
    #[serde(default)]
    pub expiry: Option<String>,
    pub quantity: f64,
    pub price: f64,
    /// Tax percentage (0 to 100).
    #[serde(default)]
    pub tax: f64,
    /// Absolute discount on the line.
    #[serde(default)]
    pub discount: f64,
    /// Category used when a purchase creates a new inventory item.
    #[serde(default)]
    pub category: Option<String>,
}

impl OrderItem {
    /// Batch number with blank strings treated as absent.
    pub fn batch(&self) -> Option<&str> {
        self.batch_number
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
    }
}

// =============================================================================
// Inventory
// =============================================================================

/// A batch of stock on an inventory item, unique by `batch_number`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Batch {
    pub batch_number: String,
    #[serde(default)]
    pub expiry: Option<String>,
    pub quantity: f64,
}

/// A stocked product. Stock arithmetic lives in [`crate::inventory`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryItem {
    pub id: String,
    pub name: String,
    pub category: String,
    /// Semantic total. Equals the batch sum when batches are tracked.
    pub stock_quantity: f64,
    pub low_stock_threshold: f64,
    #[serde(default)]
    pub batches: Vec<Batch>,
    #[serde(default)]
    pub price: Option<f64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// True when stock is at or below the low-stock threshold.
    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.low_stock_threshold
    }
}

// =============================================================================
// Parties & Employees
// =============================================================================

/// A customer. `due_amount` is the signed receivable balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Client {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub pan: Option<String>,
    #[serde(default)]
    pub gst: Option<String>,
    #[serde(default)]
    pub poc_name: Option<String>,
    #[serde(default)]
    pub poc_contact: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub due_amount: f64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A vendor. `due` is the signed payable balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub due: f64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A staff member. Both balances are running sums.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Employee {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// Delivery-challan payments received on the business's behalf.
    #[serde(default)]
    pub collected: f64,
    /// Expenses disbursed through this employee.
    #[serde(default)]
    pub paid: f64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Expense
// =============================================================================

/// A business expense, optionally paid out through an employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Expense {
    pub id: String,
    pub description: String,
    pub amount: f64,
    #[serde(default)]
    pub category: Option<String>,
    /// Employee id (`E…`) or name.
    #[serde(default)]
    pub employee: Option<String>,
    #[ts(as = "String")]
    pub expense_date: DateTime<Utc>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Payments
// =============================================================================

/// Money settled outside an order: received from a client or paid to a
/// supplier. Lowers the party's outstanding balance by `amount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub party_kind: PartyKind,
    pub party_id: String,
    pub amount: f64,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    pub added_by: String,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
