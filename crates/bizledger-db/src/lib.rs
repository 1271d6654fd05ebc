//! # bizledger-db: Entity Store & Reconciliation Engine for BizLedger
//!
//! Everything that reads or writes business state: the SQLite document
//! store, the inventory and ledger reconcilers, the saga log and the order
//! lifecycle coordinator.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        BizLedger Data Flow                              │
//! │                                                                         │
//! │  HTTP handler (POST /orders)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   bizledger-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐   │   │
//! │  │   │ Coordinator  │──►│ Reconcilers  │──►│  DocumentStore   │   │   │
//! │  │   │ (saga per    │   │ inventory    │   │  (store/)        │   │   │
//! │  │   │  mutation)   │   │ ledger       │   │                  │   │   │
//! │  │   └──────┬───────┘   └──────────────┘   │  one documents   │   │   │
//! │  │          │                              │  table, JSON1    │   │   │
//! │  │          ▼                              └────────┬─────────┘   │   │
//! │  │   ┌──────────────┐   ┌──────────────┐            │             │   │
//! │  │   │   SagaLog    │   │ Repositories │────────────┘             │   │
//! │  │   │ (saga.rs)    │   │ Expenses     │                          │   │
//! │  │   └──────────────┘   │ Stats        │                          │   │
//! │  │                      │ Payments     │                          │   │
//! │  │                      └──────────────┘                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   ~/.local/share/bizledger/bizledger.db                         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`ledger`] - The facade wiring every service together
//! - [`coordinator`] - Order create / update / activate / payment / delete
//! - [`reconcile`] - Inventory and ledger (dues, collections, counters)
//! - [`saga`] - Compensation journal and saga log
//! - [`repository`] - Clients, suppliers, employees, items, orders, sagas
//! - [`expenses`] - Expense ledger
//! - [`payments`] - Client and supplier payments outside orders
//! - [`stats`] - Dashboard statistics over the counters
//! - [`store`] - Document store trait and SQLite implementation
//! - [`ids`] - Sequential identifier generation
//! - [`pool`] / [`migrations`] - Connection pool and embedded schema
//! - [`config`] - `bizledger.toml` and environment overrides
//! - [`error`] - Store and engine error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bizledger_db::{Ledger, LedgerConfig};
//!
//! let config = LedgerConfig::load(None)?;
//! let ledger = Ledger::open(&config).await?;
//!
//! let order = ledger.coordinator().create(draft, "admin").await?;
//! let stats = ledger.stats().monthly_stats("2025-03").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod expenses;
pub mod ids;
pub mod ledger;
pub mod migrations;
pub mod payments;
pub mod pool;
pub mod reconcile;
pub mod repository;
pub mod saga;
pub mod stats;
pub mod store;

#[cfg(test)]
mod fixtures;

// =============================================================================
// Re-exports
// =============================================================================

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{LedgerConfig, LedgerSettings};
pub use coordinator::{Coordinator, DeleteReport};
pub use error::{DbError, DbResult, ErrorCode, LedgerError, LedgerResult};
pub use expenses::{ExpenseDraft, ExpensePatch, ExpenseService};
pub use ids::IdGenerator;
pub use ledger::Ledger;
pub use migrations::SchemaStatus;
pub use payments::{PaymentDraft, PaymentQuery, PaymentService};
pub use pool::{Database, DbConfig, DbLocation};
pub use saga::{SagaRecord, SagaState};
pub use stats::{FinancialSummary, MonthlyStats, OverallStats, StatsService};
pub use store::{DocumentStore, SqliteDocumentStore};

// Repository re-exports for convenience
pub use repository::{
    ClientRepository, EmployeeRepository, ExpiringStock, InventoryRepository, OrderQuery, OrderRepository,
    SagaRepository, SupplierRepository,
};
