//! # bizledger-core: Pure Reconciliation Logic for BizLedger
//!
//! This crate holds the order, inventory and ledger rules of BizLedger as
//! pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        BizLedger Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 HTTP layer (external collaborator)              │   │
//! │  │    create / update / activate / pay / delete order             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ in-process calls                       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │         bizledger-db (coordinator, reconcilers, store)          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ bizledger-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   order   │  │   delta   │  │ counters  │  │ inventory │  │   │
//! │  │   │   Order   │  │ Financial │  │ Counter   │  │  deduct   │  │   │
//! │  │   │   Patch   │  │ ItemDiff  │  │  Deltas   │  │ add_stock │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Party, OrderItem, InventoryItem, Client, ...)
//! - [`order`] - Order, OrderDraft, OrderPatch
//! - [`totals`] - Line and order totals
//! - [`delta`] - Financial, due, stock and item-diff deltas
//! - [`counters`] - Aggregate counter scopes and order contributions
//! - [`inventory`] - Batch-aware stock arithmetic
//! - [`validation`] - Boundary validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use bizledger_core::counters::CounterDeltas;
//!
//! let deltas = CounterDeltas::new()
//!     .increment("total", 1.0)
//!     .increment("total", 2.0)
//!     .increment("ignored", 0.0);
//!
//! assert_eq!(deltas.get("total"), 3.0);
//! assert_eq!(deltas.negated().get("total"), -3.0);
//! assert_eq!(deltas.increments().len(), 1);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod counters;
pub mod delta;
pub mod error;
pub mod inventory;
pub mod order;
pub mod totals;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use counters::{CounterDeltas, FieldUpdate};
pub use error::{CoreError, CoreResult, ValidationError};
pub use order::{Order, OrderDraft, OrderPatch};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed on a single order.
pub const MAX_ORDER_ITEMS: usize = 200;

/// Category given to inventory items a purchase creates without one.
pub const DEFAULT_ITEM_CATEGORY: &str = "General";

/// Low-stock threshold given to inventory items a purchase creates.
pub const DEFAULT_LOW_STOCK_THRESHOLD: f64 = 10.0;
