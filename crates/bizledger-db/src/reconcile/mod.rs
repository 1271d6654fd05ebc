//! # Reconcilers
//!
//! Apply the side effects of an order mutation to the documents it touches.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Coordinator                                                            │
//! │       │                                                                 │
//! │       ├──► InventoryReconciler  ──► InventoryItems/{id}                 │
//! │       │                             AggregateCounters/items             │
//! │       │                                                                 │
//! │       └──► LedgerReconciler     ──► Clients / Suppliers / Employees     │
//! │                                     AggregateCounters/{scope}           │
//! │                                     AggregateCounters/{YYYY-MM}         │
//! │                                                                         │
//! │  Every write records its inverse in the saga Journal passed in.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod inventory;
pub mod ledger;

pub use inventory::InventoryReconciler;
pub use ledger::LedgerReconciler;

use bizledger_core::{collection, CounterDeltas};
use tracing::debug;

use crate::clock::Clock;
use crate::error::DbResult;
use crate::saga::{Compensation, Journal};
use crate::store::{to_document, DocumentStore};

/// Upserts counter deltas into `AggregateCounters/{scope}` and stamps
/// `updated_at`. Nothing is written when there are no non-zero increments.
pub(crate) async fn bump_counter(
    store: &dyn DocumentStore,
    clock: &dyn Clock,
    journal: &mut Journal,
    scope: &str,
    deltas: CounterDeltas,
) -> DbResult<()> {
    if deltas.is_empty() {
        return Ok(());
    }
    let compensation = Compensation::increment(collection::AGGREGATE_COUNTERS, scope, &deltas);
    let fields = deltas
        .set("updated_at", to_document(&clock.now())?)
        .into_fields();

    store
        .merge(collection::AGGREGATE_COUNTERS, scope, &fields)
        .await?;
    journal.record(compensation);

    debug!(scope, "Counter updated");
    Ok(())
}
