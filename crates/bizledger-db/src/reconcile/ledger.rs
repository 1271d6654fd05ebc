//! # Ledger Reconciler
//!
//! Counterparty balances, employee balances and aggregate counters.
//!
//! ## Balance Updates
//! ```text
//! Operation                      Document field          Counter field
//! ─────────────────────────────────────────────────────────────────────────────
//! update_client_due(id, Δ)       Clients.due_amount      clients.total_due
//! update_supplier_due(id, Δ)     Suppliers.due           suppliers.total_due
//! update_employee_collection     Employees.collected     employees.total_collected
//! update_employee_paid           Employees.paid          employees.total_paid
//! ```
//!
//! Every balance change is an atomic increment in the store, never a
//! read-then-write.

use std::collections::BTreeMap;
use std::sync::Arc;

use bizledger_core::counters::{is_month_key, party_scope, scope, OrderCounterDeltas};
use bizledger_core::{collection, CounterDeltas, PartyKind, ValidationError};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::bump_counter;
use crate::clock::Clock;
use crate::error::{DbError, DbResult};
use crate::saga::{Compensation, Journal};
use crate::store::{to_document, DocumentStore, Query};

/// Where a party kind keeps its balance.
struct PartyLedger {
    collection: &'static str,
    entity: &'static str,
    due_field: &'static str,
}

fn party_ledger(kind: PartyKind) -> PartyLedger {
    match kind {
        PartyKind::Client => PartyLedger {
            collection: collection::CLIENTS,
            entity: "Client",
            due_field: "due_amount",
        },
        PartyKind::Supplier => PartyLedger {
            collection: collection::SUPPLIERS,
            entity: "Supplier",
            due_field: "due",
        },
    }
}

#[derive(Debug, Clone)]
pub struct LedgerReconciler {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl LedgerReconciler {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn stamp(&self) -> DbResult<Value> {
        to_document(&self.clock.now())
    }

    /// Increments fields on an existing document. Missing → `NotFound`.
    async fn increment_document(
        &self,
        collection: &str,
        entity: &str,
        id: &str,
        deltas: CounterDeltas,
        journal: &mut Journal,
    ) -> DbResult<()> {
        let compensation = Compensation::increment(collection, id, &deltas);
        let fields = deltas.set("updated_at", self.stamp()?).into_fields();
        match self.store.update(collection, id, &fields).await {
            Ok(_) => {
                journal.record(compensation);
                Ok(())
            }
            Err(DbError::NotFound { .. }) => Err(DbError::not_found(entity, id)),
            Err(err) => Err(err),
        }
    }

    // =========================================================================
    // Counterparty Dues
    // =========================================================================

    /// Adds `delta` to a client's or supplier's balance and to the kind's
    /// `total_due`.
    pub async fn update_party_due(
        &self,
        kind: PartyKind,
        party_id: &str,
        delta: f64,
        journal: &mut Journal,
    ) -> DbResult<()> {
        if delta == 0.0 {
            return Ok(());
        }
        let ledger = party_ledger(kind);
        self.increment_document(
            ledger.collection,
            ledger.entity,
            party_id,
            CounterDeltas::new().increment(ledger.due_field, delta),
            journal,
        )
        .await?;
        self.update_aggregate_counters(
            party_scope(kind),
            CounterDeltas::new().increment("total_due", delta),
            journal,
        )
        .await?;

        debug!(party_id, delta, kind = ?kind, "Party due updated");
        Ok(())
    }

    pub async fn update_client_due(&self, client_id: &str, delta: f64, journal: &mut Journal) -> DbResult<()> {
        self.update_party_due(PartyKind::Client, client_id, delta, journal).await
    }

    pub async fn update_supplier_due(&self, supplier_id: &str, delta: f64, journal: &mut Journal) -> DbResult<()> {
        self.update_party_due(PartyKind::Supplier, supplier_id, delta, journal).await
    }

    /// Propagates a changed client or supplier name to the party record.
    pub async fn rename_party(
        &self,
        kind: PartyKind,
        party_id: &str,
        new_name: &str,
        journal: &mut Journal,
    ) -> DbResult<()> {
        let ledger = party_ledger(kind);
        let current = self
            .store
            .get(ledger.collection, party_id)
            .await?
            .ok_or_else(|| DbError::not_found(ledger.entity, party_id))?;
        let previous_name = current.get("name").cloned().unwrap_or(Value::Null);
        if previous_name.as_str() == Some(new_name) {
            return Ok(());
        }

        let fields = CounterDeltas::new().set("name", new_name).set("updated_at", self.stamp()?);
        let mut previous = BTreeMap::new();
        previous.insert("name".to_string(), previous_name);
        if let Some(updated_at) = current.get("updated_at") {
            previous.insert("updated_at".to_string(), updated_at.clone());
        }

        self.store
            .update(ledger.collection, party_id, &fields.into_fields())
            .await?;
        journal.record(Compensation::Fields {
            collection: ledger.collection.to_string(),
            id: party_id.to_string(),
            previous,
        });

        info!(party_id, new_name, "Party renamed");
        Ok(())
    }

    // =========================================================================
    // Employees
    // =========================================================================

    async fn find_employee_id(&self, name: &str) -> DbResult<Option<String>> {
        let query = Query::new().eq("name", name).order_by("id", false).limit(1);
        let found = self.store.query(collection::EMPLOYEES, &query).await?;
        Ok(found
            .first()
            .and_then(|doc| doc.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    /// Resolves `reference` as an employee id when it looks like one (`E…`),
    /// otherwise as a name.
    async fn resolve_employee(&self, reference: &str) -> DbResult<Option<String>> {
        if reference.starts_with('E') && self.store.get(collection::EMPLOYEES, reference).await?.is_some() {
            return Ok(Some(reference.to_string()));
        }
        self.find_employee_id(reference).await
    }

    /// Adds `delta` to the `collected` balance of the employee named
    /// `employee_name`. Returns `false` without writing when nobody matches.
    pub async fn update_employee_collection(
        &self,
        employee_name: &str,
        delta: f64,
        journal: &mut Journal,
    ) -> DbResult<bool> {
        let Some(employee_id) = self.find_employee_id(employee_name).await? else {
            warn!(employee = employee_name, delta, "Collector not found, collection not recorded");
            return Ok(false);
        };
        if delta == 0.0 {
            return Ok(true);
        }

        self.increment_document(
            collection::EMPLOYEES,
            "Employee",
            &employee_id,
            CounterDeltas::new().increment("collected", delta),
            journal,
        )
        .await?;
        self.update_aggregate_counters(
            scope::EMPLOYEES,
            CounterDeltas::new().increment("total_collected", delta),
            journal,
        )
        .await?;
        Ok(true)
    }

    /// Adds `delta` to the `paid` balance of an employee given by id or name.
    pub async fn update_employee_paid(
        &self,
        employee_ref: &str,
        delta: f64,
        journal: &mut Journal,
    ) -> DbResult<bool> {
        let Some(employee_id) = self.resolve_employee(employee_ref).await? else {
            warn!(employee = employee_ref, delta, "Employee not found, payout not recorded");
            return Ok(false);
        };
        if delta == 0.0 {
            return Ok(true);
        }

        self.increment_document(
            collection::EMPLOYEES,
            "Employee",
            &employee_id,
            CounterDeltas::new().increment("paid", delta),
            journal,
        )
        .await?;
        self.update_aggregate_counters(
            scope::EMPLOYEES,
            CounterDeltas::new().increment("total_paid", delta),
            journal,
        )
        .await?;
        Ok(true)
    }

    // =========================================================================
    // Aggregate Counters
    // =========================================================================

    /// Upserts `deltas` into `AggregateCounters/{scope}`.
    pub async fn update_aggregate_counters(
        &self,
        scope: &str,
        deltas: CounterDeltas,
        journal: &mut Journal,
    ) -> DbResult<()> {
        bump_counter(self.store.as_ref(), self.clock.as_ref(), journal, scope, deltas).await
    }

    /// Upserts `deltas` into the `YYYY-MM` counter. The document also
    /// records its own key in `month`.
    pub async fn update_monthly_counters(
        &self,
        month_key: &str,
        deltas: CounterDeltas,
        journal: &mut Journal,
    ) -> DbResult<()> {
        if !is_month_key(month_key) {
            return Err(DbError::Rejected(
                ValidationError::InvalidFormat {
                    field: "month".to_string(),
                    reason: format!("'{month_key}' is not YYYY-MM"),
                }
                .into(),
            ));
        }
        self.update_aggregate_counters(month_key, deltas.set("month", month_key), journal)
            .await
    }

    /// Writes an order's counter deltas to the orders, party, financial
    /// summary and monthly documents, in that order.
    pub async fn apply_order_counters(
        &self,
        kind: PartyKind,
        month_key: &str,
        deltas: OrderCounterDeltas,
        journal: &mut Journal,
    ) -> DbResult<()> {
        self.update_aggregate_counters(scope::ORDERS, deltas.orders, journal)
            .await?;
        self.update_aggregate_counters(party_scope(kind), deltas.party, journal)
            .await?;
        self.update_aggregate_counters(scope::FINANCIAL_SUMMARY, deltas.financial, journal)
            .await?;
        self.update_monthly_counters(month_key, deltas.monthly, journal)
            .await
    }

    /// Points `orders.last_id` at a newly activated order.
    ///
    /// The previous value is journaled so an aborted create restores it.
    /// Deletes leave it alone: it names the most recent order to go live,
    /// which may since have been deleted.
    pub async fn record_last_order(&self, order_id: &str, journal: &mut Journal) -> DbResult<()> {
        let previous = self
            .store
            .get(collection::AGGREGATE_COUNTERS, scope::ORDERS)
            .await?
            .and_then(|counter| counter.get("last_id").cloned())
            .unwrap_or(Value::Null);

        let fields = CounterDeltas::new().set("last_id", order_id).into_fields();
        self.store
            .merge(collection::AGGREGATE_COUNTERS, scope::ORDERS, &fields)
            .await?;
        journal.record(Compensation::Fields {
            collection: collection::AGGREGATE_COUNTERS.to_string(),
            id: scope::ORDERS.to_string(),
            previous: BTreeMap::from([("last_id".to_string(), previous)]),
        });
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
