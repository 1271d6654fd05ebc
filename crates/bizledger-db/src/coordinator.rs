//! # Order Lifecycle Coordinator
//!
//! Sequences the reconcilers for every order mutation and wraps each one in
//! a saga.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  non-existent ──create(draft)──► draft ──activate──► active             │
//! │       │                            │                  │ ▲               │
//! │       └──────create────────────────┼─────────────────►│ │ update /      │
//! │                                    │                  │ │ payment       │
//! │                                    ▼                  ▼ │               │
//! │                                 deleted ◄──────────── delete            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Create (active)
//! ```text
//! validate ─► duplicate? ─► stock check ─► Saga::begin
//!    │
//!    ├─ inventory            sale deduction / purchase addition
//!    ├─ counterparty_due     due += total − paid
//!    ├─ employee_collection  challan collector += paid
//!    ├─ counters             orders, party, financial_summary, YYYY-MM
//!    └─ order_document       INSERT (written last)
//!    │
//!    ▼
//! complete ── or on failure ──► compensate in reverse
//! ```
//!
//! Updates write the order document first and then propagate deltas. Delete
//! is best-effort: reversal failures are logged and reported, and the
//! document is removed regardless.

use std::sync::Arc;

use bizledger_core::counters::{order_change_deltas, order_counter_deltas, Contribution};
use bizledger_core::delta::{diff_items, due_delta};
use bizledger_core::{collection, CoreError, Order, OrderDraft, OrderPatch, OrderType, PaymentStatus};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::LedgerSettings;
use crate::error::{DbError, LedgerError, LedgerResult};
use crate::reconcile::{InventoryReconciler, LedgerReconciler};
use crate::repository::{OrderQuery, OrderRepository, SagaRepository};
use crate::saga::{compensate_record, Compensation, Journal, Saga, SagaRecord, SagaState};
use crate::store::{to_document, DocumentStore};

/// Saga operation names.
pub mod operation {
    pub const CREATE: &str = "create_order";
    pub const UPDATE: &str = "update_order";
    pub const ACTIVATE: &str = "activate_order";
    pub const PAYMENT: &str = "update_payment_status";
    pub const DELETE: &str = "delete_order";
}

/// Saga step names.
pub mod step {
    pub const INVENTORY: &str = "inventory";
    pub const DUE: &str = "counterparty_due";
    pub const COLLECTION: &str = "employee_collection";
    pub const COUNTERS: &str = "counters";
    pub const PARTY_NAME: &str = "party_name";
    pub const ORDER: &str = "order_document";
}

const CREATE_STEPS: &[&str] = &[step::INVENTORY, step::DUE, step::COLLECTION, step::COUNTERS, step::ORDER];
const UPDATE_STEPS: &[&str] = &[
    step::ORDER,
    step::COUNTERS,
    step::DUE,
    step::COLLECTION,
    step::PARTY_NAME,
    step::INVENTORY,
];
const PAYMENT_STEPS: &[&str] = &[step::ORDER, step::DUE, step::COLLECTION, step::COUNTERS];

/// Outcome of a delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteReport {
    pub order_id: String,
    /// True when the order was active and its contributions were reversed.
    pub reversed: bool,
    /// Reversal steps that failed and were skipped.
    pub failed_steps: Vec<String>,
}

impl DeleteReport {
    pub fn is_clean(&self) -> bool {
        self.failed_steps.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Coordinator {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    orders: OrderRepository,
    sagas: SagaRepository,
    inventory: InventoryReconciler,
    ledger: LedgerReconciler,
}

impl Coordinator {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, settings: LedgerSettings) -> Self {
        Self {
            orders: OrderRepository::new(store.clone()),
            sagas: SagaRepository::new(store.clone()),
            inventory: InventoryReconciler::new(store.clone(), clock.clone(), settings),
            ledger: LedgerReconciler::new(store.clone(), clock.clone()),
            store,
            clock,
        }
    }

    async fn begin(&self, operation: &str, order_id: &str, planned: &[&str]) -> LedgerResult<Saga> {
        Ok(Saga::begin(self.store.clone(), self.clock.clone(), operation, order_id, planned).await?)
    }

    async fn finish<T>(&self, saga: Saga, result: LedgerResult<()>, value: T) -> LedgerResult<T> {
        match result {
            Ok(()) => {
                saga.complete().await;
                Ok(value)
            }
            Err(err) => Err(saga.abort(err).await),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get(&self, order_id: &str) -> LedgerResult<Order> {
        self.orders
            .get(order_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Order", order_id))
    }

    pub async fn list(&self, query: &OrderQuery) -> LedgerResult<Vec<Order>> {
        Ok(self.orders.list(query).await?)
    }

    /// Order value over a filter, typically a date range:
    /// `OrderQuery { order_type: Some(Sale), draft: Some(false), from, to, .. }`.
    pub async fn period_total(&self, query: &OrderQuery) -> LedgerResult<f64> {
        Ok(self.orders.total_amount(query).await?)
    }

    // =========================================================================
    // Create / Activate
    // =========================================================================

    /// Creates an order. Active orders are reconciled before the document is
    /// written; drafts are stored as-is.
    pub async fn create(&self, draft: OrderDraft, actor: &str) -> LedgerResult<Order> {
        draft.validate()?;
        let order = draft.into_order(self.clock.now(), actor)?;

        if self.orders.exists(&order.id).await? {
            return Err(LedgerError::DuplicateIdentifier {
                collection: collection::ORDERS.to_string(),
                id: order.id,
            });
        }

        if !order.is_active() {
            self.orders.insert(&order).await?;
            info!(order_id = %order.id, order_type = %order.order_type(), "Draft order created");
            return Ok(order);
        }

        if order.order_type().is_outbound() {
            self.inventory.check_sale_availability(&order.items).await?;
        }

        let mut saga = self.begin(operation::CREATE, &order.id, CREATE_STEPS).await?;
        let result = self.run_create(&mut saga, &order).await;
        let order = self.finish(saga, result, order).await?;

        info!(
            order_id = %order.id,
            order_type = %order.order_type(),
            total = order.total_amount,
            paid = order.amount_paid,
            "Order created"
        );
        Ok(order)
    }

    async fn run_create(&self, saga: &mut Saga, order: &Order) -> LedgerResult<()> {
        self.apply_contribution(saga, order).await?;

        saga.enter(step::ORDER);
        self.orders.insert(order).await?;
        Ok(())
    }

    /// Turns a draft into an active order, running the full create
    /// reconciliation for its current contents.
    pub async fn activate(&self, order_id: &str, actor: &str) -> LedgerResult<Order> {
        let current = self.get(order_id).await?;
        if current.is_active() {
            return Err(CoreError::InvalidTransition {
                order_id: order_id.to_string(),
                reason: "order is already active".to_string(),
            }
            .into());
        }

        let mut next = current.clone();
        next.draft = false;
        next.updated_at = self.clock.now();
        next.updated_by = actor.to_string();

        if next.order_type().is_outbound() {
            self.inventory.check_sale_availability(&next.items).await?;
        }

        let mut saga = self.begin(operation::ACTIVATE, order_id, CREATE_STEPS).await?;
        let result = self.run_activate(&mut saga, &current, &next).await;
        let next = self.finish(saga, result, next).await?;

        info!(order_id, "Order activated");
        Ok(next)
    }

    async fn run_activate(&self, saga: &mut Saga, current: &Order, next: &Order) -> LedgerResult<()> {
        self.apply_contribution(saga, next).await?;
        self.save_order(saga, current, next).await
    }

    /// Steps 1 to 4 of create: inventory, due, collection, counters.
    async fn apply_contribution(&self, saga: &mut Saga, order: &Order) -> LedgerResult<()> {
        saga.enter(step::INVENTORY);
        match order.order_type() {
            OrderType::Purchase => {
                self.inventory
                    .apply_purchase_addition(&order.items, &order.id, saga.journal())
                    .await?
            }
            OrderType::Sale | OrderType::DeliveryChallan => {
                self.inventory
                    .apply_sale_deduction(&order.items, &order.id, saga.journal())
                    .await?
            }
        }
        saga.commit_step().await?;

        saga.enter(step::DUE);
        self.ledger
            .update_party_due(order.party_kind(), &order.party_ref().id, order.outstanding(), saga.journal())
            .await?;
        saga.commit_step().await?;

        if let Some(collector) = order.party.collector() {
            if order.amount_paid != 0.0 {
                saga.enter(step::COLLECTION);
                self.ledger
                    .update_employee_collection(collector, order.amount_paid, saga.journal())
                    .await?;
                saga.commit_step().await?;
            }
        }

        saga.enter(step::COUNTERS);
        self.ledger
            .apply_order_counters(
                order.party_kind(),
                &order.month_key(),
                order_counter_deltas(order, Contribution::Apply),
                saga.journal(),
            )
            .await?;
        self.ledger.record_last_order(&order.id, saga.journal()).await?;
        saga.commit_step().await?;
        Ok(())
    }

    /// Overwrites the order document, journaling the previous body.
    async fn save_order(&self, saga: &mut Saga, current: &Order, next: &Order) -> LedgerResult<()> {
        saga.enter(step::ORDER);
        let previous = to_document(current)?;
        self.orders.save(next).await?;
        saga.journal()
            .record(Compensation::restore(collection::ORDERS, &next.id, Some(previous)));
        saga.commit_step().await?;
        Ok(())
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Applies a patch. Active orders propagate the difference to stock,
    /// balances and counters.
    pub async fn update(&self, order_id: &str, patch: OrderPatch, actor: &str) -> LedgerResult<Order> {
        let current = self.get(order_id).await?;
        let next = current.patched(patch, self.clock.now(), actor)?;

        if !current.is_active() {
            self.orders.save(&next).await?;
            debug!(order_id, "Draft order updated");
            return Ok(next);
        }

        if next.order_type().is_outbound() && next.items != current.items {
            let extra = diff_items(&current.items, &next.items).increases();
            self.inventory.check_sale_availability(&extra).await?;
        }

        let mut saga = self.begin(operation::UPDATE, order_id, UPDATE_STEPS).await?;
        let result = self.run_update(&mut saga, &current, &next).await;
        let next = self.finish(saga, result, next).await?;

        info!(
            order_id,
            total = next.total_amount,
            paid = next.amount_paid,
            "Order updated"
        );
        Ok(next)
    }

    async fn run_update(&self, saga: &mut Saga, current: &Order, next: &Order) -> LedgerResult<()> {
        let kind = next.party_kind();
        self.save_order(saga, current, next).await?;

        saga.enter(step::COUNTERS);
        self.ledger
            .apply_order_counters(kind, &current.month_key(), order_change_deltas(current, next), saga.journal())
            .await?;
        saga.commit_step().await?;

        saga.enter(step::DUE);
        let old_party = &current.party_ref().id;
        let new_party = &next.party_ref().id;
        if old_party == new_party {
            self.ledger
                .update_party_due(kind, new_party, -due_delta(Some(current), Some(next)), saga.journal())
                .await?;
        } else {
            self.ledger
                .update_party_due(kind, old_party, -current.outstanding(), saga.journal())
                .await?;
            self.ledger
                .update_party_due(kind, new_party, next.outstanding(), saga.journal())
                .await?;
        }
        saga.commit_step().await?;

        saga.enter(step::COLLECTION);
        match (current.party.collector(), next.party.collector()) {
            (Some(old), Some(new)) if old == new => {
                let delta = next.amount_paid - current.amount_paid;
                if delta != 0.0 {
                    self.ledger
                        .update_employee_collection(new, delta, saga.journal())
                        .await?;
                }
            }
            (old, new) => {
                if let Some(old) = old.filter(|_| current.amount_paid != 0.0) {
                    self.ledger
                        .update_employee_collection(old, -current.amount_paid, saga.journal())
                        .await?;
                }
                if let Some(new) = new.filter(|_| next.amount_paid != 0.0) {
                    self.ledger
                        .update_employee_collection(new, next.amount_paid, saga.journal())
                        .await?;
                }
            }
        }
        saga.commit_step().await?;

        if old_party == new_party && current.party_ref().name != next.party_ref().name {
            saga.enter(step::PARTY_NAME);
            self.ledger
                .rename_party(kind, new_party, &next.party_ref().name, saga.journal())
                .await?;
            saga.commit_step().await?;
        }

        if current.items != next.items {
            saga.enter(step::INVENTORY);
            self.inventory
                .reconcile_on_update(&current.items, &next.items, next.order_type(), &next.id, saga.journal())
                .await?;
            saga.commit_step().await?;
        }
        Ok(())
    }

    // =========================================================================
    // Payment Status
    // =========================================================================

    /// Sets the payment status, deriving `amount_paid` from it.
    pub async fn update_payment_status(
        &self,
        order_id: &str,
        status: PaymentStatus,
        amount_paid: Option<f64>,
        actor: &str,
    ) -> LedgerResult<Order> {
        let current = self.get(order_id).await?;
        let paid = current.resolve_payment(status, amount_paid)?;
        let delta = paid - current.amount_paid;

        if status == current.payment_status && delta == 0.0 {
            debug!(order_id, "Payment status unchanged");
            return Ok(current);
        }

        let mut next = current.clone();
        next.payment_status = status;
        next.amount_paid = paid;
        next.updated_at = self.clock.now();
        next.updated_by = actor.to_string();

        if !current.is_active() {
            self.orders.save(&next).await?;
            return Ok(next);
        }

        let mut saga = self.begin(operation::PAYMENT, order_id, PAYMENT_STEPS).await?;
        let result = self.run_payment(&mut saga, &current, &next, delta).await;
        let next = self.finish(saga, result, next).await?;

        info!(order_id, status = ?status, paid, delta, "Payment status updated");
        Ok(next)
    }

    async fn run_payment(&self, saga: &mut Saga, current: &Order, next: &Order, delta: f64) -> LedgerResult<()> {
        self.save_order(saga, current, next).await?;

        saga.enter(step::DUE);
        self.ledger
            .update_party_due(next.party_kind(), &next.party_ref().id, -delta, saga.journal())
            .await?;
        saga.commit_step().await?;

        if let Some(collector) = next.party.collector() {
            saga.enter(step::COLLECTION);
            self.ledger
                .update_employee_collection(collector, delta, saga.journal())
                .await?;
            saga.commit_step().await?;
        }

        saga.enter(step::COUNTERS);
        self.ledger
            .apply_order_counters(
                next.party_kind(),
                &next.month_key(),
                order_change_deltas(current, next),
                saga.journal(),
            )
            .await?;
        saga.commit_step().await?;
        Ok(())
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Deletes an order, reversing every contribution of an active one.
    ///
    /// Reversal steps are independent: a failure is logged, recorded in the
    /// report and does not stop the document from being deleted.
    pub async fn delete(&self, order_id: &str) -> LedgerResult<DeleteReport> {
        let order = self.get(order_id).await?;
        let mut report = DeleteReport {
            order_id: order_id.to_string(),
            reversed: order.is_active(),
            failed_steps: Vec::new(),
        };

        if order.is_active() {
            self.reverse_contribution(&order, &mut report).await;
        }

        self.orders.delete(order_id).await?;

        if report.is_clean() {
            info!(order_id, reversed = report.reversed, "Order deleted");
        } else {
            warn!(order_id, failed = ?report.failed_steps, "Order deleted with reversal failures");
        }
        Ok(report)
    }

    async fn reverse_contribution(&self, order: &Order, report: &mut DeleteReport) {
        // Best-effort: nothing here is compensated.
        let mut journal = Journal::new();
        let kind = order.party_kind();

        let inventory = self
            .inventory
            .revert_on_delete(&order.items, order.order_type(), &order.id, &mut journal)
            .await;
        note_reversal(report, step::INVENTORY, inventory.map(|_| ()));

        let due = self
            .ledger
            .update_party_due(kind, &order.party_ref().id, -order.outstanding(), &mut journal)
            .await;
        note_reversal(report, step::DUE, due);

        if let Some(collector) = order.party.collector() {
            if order.amount_paid > 0.0 {
                let collection = self
                    .ledger
                    .update_employee_collection(collector, -order.amount_paid, &mut journal)
                    .await;
                note_reversal(report, step::COLLECTION, collection.map(|_| ()));
            }
        }

        let counters = self
            .ledger
            .apply_order_counters(
                kind,
                &order.month_key(),
                order_counter_deltas(order, Contribution::Revert),
                &mut journal,
            )
            .await;
        note_reversal(report, step::COUNTERS, counters);
    }

    // =========================================================================
    // Recovery
    // =========================================================================

    /// Runs the recorded compensations of sagas a stopped process left open.
    ///
    /// Call at startup, before serving requests: a saga still running in
    /// this process also looks incomplete.
    pub async fn recover_incomplete(&self) -> LedgerResult<Vec<SagaRecord>> {
        let open = self.sagas.incomplete().await?;
        let mut recovered = Vec::with_capacity(open.len());

        for record in open {
            let saga_id = record.id.clone();
            match compensate_record(self.store.as_ref(), self.clock.as_ref(), record).await {
                Ok(record) => {
                    if record.state == SagaState::Failed {
                        warn!(saga_id = %saga_id, remaining = record.compensations.len(), "Saga still has failed compensations");
                    }
                    recovered.push(record);
                }
                Err(err) => error!(saga_id = %saga_id, error = %err, "Saga recovery failed"),
            }
        }

        info!(count = recovered.len(), "Saga recovery finished");
        Ok(recovered)
    }
}

fn note_reversal(report: &mut DeleteReport, step: &str, result: Result<(), DbError>) {
    if let Err(err) = result {
        let err = LedgerError::write_failure(operation::DELETE, step, err);
        warn!(order_id = %report.order_id, step, error = %err, "Reversal step failed, continuing delete");
        report.failed_steps.push(step.to_string());
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::fixtures::{self, num};
    use crate::store::testing::FaultyStore;
    use bizledger_core::counters::scope;
    use bizledger_core::{DiscountType, InventoryItem, OrderItem, OrderStatus, Party, PartyRef};
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::Value;

    struct Harness {
        store: Arc<dyn DocumentStore>,
        clock: Arc<FixedClock>,
        coordinator: Coordinator,
    }

    async fn seeded(store: Arc<dyn DocumentStore>) -> Harness {
        fixtures::seed(&store, collection::CLIENTS, "C0001", &fixtures::client("C0001", "Acme Traders")).await;
        fixtures::seed(&store, collection::CLIENTS, "C0002", &fixtures::client("C0002", "Bharat Stores")).await;
        fixtures::seed(&store, collection::SUPPLIERS, "S0001", &fixtures::supplier("S0001", "Medico")).await;
        fixtures::seed(&store, collection::EMPLOYEES, "E0001", &fixtures::employee("E0001", "Ravi")).await;
        fixtures::seed_item(&store, fixtures::item("I0001", 100.0, &[])).await;
        fixtures::seed_item(&store, fixtures::item("I0002", 50.0, &[("B1", 30.0), ("B2", 20.0)])).await;

        let clock = fixtures::clock();
        let coordinator = Coordinator::new(store.clone(), clock.clone(), LedgerSettings::default());
        Harness { store, clock, coordinator }
    }

    async fn harness() -> Harness {
        seeded(fixtures::memory_store().await).await
    }

    fn draft(id: &str, party: Party, items: Vec<OrderItem>, total: f64, paid: f64) -> OrderDraft {
        OrderDraft {
            id: id.to_string(),
            party,
            items,
            discount: 0.0,
            discount_type: DiscountType::Fixed,
            total_amount: Some(total),
            amount_paid: paid,
            payment_status: if paid == 0.0 {
                PaymentStatus::Pending
            } else {
                PaymentStatus::Partial
            },
            payment_method: None,
            status: OrderStatus::Pending,
            draft: false,
            order_date: None,
            remarks: None,
        }
    }

    fn sale(id: &str, total: f64, paid: f64) -> OrderDraft {
        draft(
            id,
            Party::Sale {
                client: PartyRef::new("C0001", "Acme Traders"),
            },
            vec![fixtures::line("I0001", None, 5.0, total / 5.0)],
            total,
            paid,
        )
    }

    fn challan(id: &str, total: f64, paid: f64, collector: &str) -> OrderDraft {
        draft(
            id,
            Party::DeliveryChallan {
                client: PartyRef::new("C0001", "Acme Traders"),
                amount_collected_by: Some(collector.to_string()),
                link: None,
            },
            vec![fixtures::line("I0001", None, 2.0, total / 2.0)],
            total,
            paid,
        )
    }

    impl Harness {
        async fn doc(&self, collection: &str, id: &str) -> Value {
            fixtures::doc(&self.store, collection, id).await
        }

        async fn counter(&self, scope: &str) -> Value {
            fixtures::counter(&self.store, scope).await
        }

        async fn stock(&self, id: &str) -> InventoryItem {
            serde_json::from_value(self.doc(collection::INVENTORY_ITEMS, id).await).unwrap()
        }

        async fn client_due(&self, id: &str) -> f64 {
            num(&self.doc(collection::CLIENTS, id).await, "due_amount")
        }

        /// Counter and balance fields that must return to their starting
        /// values after a delete.
        async fn ledger_snapshot(&self) -> Vec<f64> {
            let orders = self.counter(scope::ORDERS).await;
            let clients = self.counter(scope::CLIENTS).await;
            let financial = self.counter(scope::FINANCIAL_SUMMARY).await;
            let month = self.counter("2025-03").await;
            let items = self.counter(scope::ITEMS).await;
            vec![
                num(&orders, "total"),
                num(&orders, "total_sales.count"),
                num(&orders, "total_sales.amount"),
                num(&orders, "total_revenue"),
                num(&clients, "total_due"),
                num(&clients, "total_orders"),
                num(&financial, "total_income"),
                num(&month, "sales_orders_count"),
                num(&month, "sales_orders_amount"),
                num(&month, "sales_orders_paid"),
                num(&items, "total_stock"),
                self.client_due("C0001").await,
                self.stock("I0001").await.stock_quantity,
            ]
        }
    }

    // -------------------------------------------------------------------------
    // Create
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_create_sale_reconciles_everything() {
        let h = harness().await;
        let order = h.coordinator.create(sale("INV-001", 1000.0, 300.0), "admin").await.unwrap();
        assert_eq!(order.total_quantity, 5.0);

        assert_eq!(h.client_due("C0001").await, 700.0);
        assert_eq!(h.stock("I0001").await.stock_quantity, 95.0);

        let orders = h.counter(scope::ORDERS).await;
        assert_eq!(num(&orders, "total"), 1.0);
        assert_eq!(num(&orders, "total_sales.count"), 1.0);
        assert_eq!(num(&orders, "total_sales.amount"), 1000.0);
        assert_eq!(num(&orders, "total_revenue"), 300.0);
        assert_eq!(orders["last_id"], "INV-001");

        let clients = h.counter(scope::CLIENTS).await;
        assert_eq!(num(&clients, "total_due"), 700.0);
        assert_eq!(num(&clients, "total_orders"), 1.0);
        assert_eq!(num(&h.counter(scope::FINANCIAL_SUMMARY).await, "total_income"), 300.0);

        let month = h.counter("2025-03").await;
        assert_eq!(num(&month, "sales_orders_count"), 1.0);
        assert_eq!(num(&month, "sales_orders_paid"), 300.0);

        let saved = h.coordinator.get("INV-001").await.unwrap();
        assert_eq!(saved, order);
        let sagas = h.coordinator.sagas.for_order("INV-001").await.unwrap();
        assert_eq!(sagas.len(), 1);
        assert_eq!(sagas[0].state, SagaState::Completed);
    }

    #[tokio::test]
    async fn test_purchase_reduces_income_and_adds_stock() {
        let h = harness().await;
        let purchase = draft(
            "PO-001",
            Party::Purchase {
                supplier: PartyRef::new("S0001", "Medico"),
            },
            vec![fixtures::line("I0002", Some("B1"), 10.0, 20.0)],
            200.0,
            150.0,
        );
        h.coordinator.create(purchase, "admin").await.unwrap();

        let item = h.stock("I0002").await;
        assert_eq!(item.stock_quantity, 60.0);
        assert_eq!(item.batches[0].quantity, 40.0);
        assert_eq!(num(&h.doc(collection::SUPPLIERS, "S0001").await, "due"), 50.0);
        assert_eq!(num(&h.counter(scope::SUPPLIERS).await, "total_due"), 50.0);
        assert_eq!(num(&h.counter(scope::FINANCIAL_SUMMARY).await, "total_income"), -150.0);
        assert_eq!(num(&h.counter(scope::ORDERS).await, "total_purchase.amount"), 200.0);
        assert_eq!(num(&h.counter("2025-03").await, "purchase_orders_paid"), 150.0);
    }

    #[tokio::test]
    async fn test_duplicate_order_id_is_rejected() {
        let h = harness().await;
        h.coordinator.create(sale("INV-001", 500.0, 0.0), "admin").await.unwrap();
        let err = h.coordinator.create(sale("INV-001", 500.0, 0.0), "admin").await.unwrap_err();

        assert!(matches!(err, LedgerError::DuplicateIdentifier { .. }));
        assert_eq!(h.stock("I0001").await.stock_quantity, 95.0);
        assert_eq!(h.client_due("C0001").await, 500.0);
    }

    #[tokio::test]
    async fn test_missing_client_has_no_side_effects() {
        let h = harness().await;
        let mut draft = sale("INV-001", 500.0, 0.0);
        draft.party = Party::Sale {
            client: PartyRef::new("", ""),
        };
        let err = h.coordinator.create(draft, "admin").await.unwrap_err();

        assert!(matches!(
            err,
            LedgerError::Core(CoreError::MissingRequiredAssociation { .. })
        ));
        assert_eq!(h.stock("I0001").await.stock_quantity, 100.0);
        assert!(h.store.get(collection::ORDERS, "INV-001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insufficient_batch_stock_leaves_stock_unchanged() {
        let h = harness().await;
        let mut draft = sale("INV-001", 500.0, 0.0);
        draft.items = vec![
            fixtures::line("I0001", None, 5.0, 50.0),
            fixtures::line("I0002", Some("B2"), 25.0, 10.0),
        ];
        let err = h.coordinator.create(draft, "admin").await.unwrap_err();

        assert!(matches!(err, LedgerError::Core(CoreError::InsufficientBatchStock { .. })));
        assert_eq!(err.code().status(), 400);
        assert_eq!(h.stock("I0001").await.stock_quantity, 100.0);
        let item = h.stock("I0002").await;
        assert_eq!(item.stock_quantity, 50.0);
        assert_eq!(item.batches[1].quantity, 20.0);
        assert_eq!(h.client_due("C0001").await, 0.0);
    }

    #[tokio::test]
    async fn test_unknown_client_is_compensated() {
        let h = harness().await;
        let mut draft = sale("INV-001", 500.0, 0.0);
        draft.party = Party::Sale {
            client: PartyRef::new("C0404", "Ghost"),
        };
        let err = h.coordinator.create(draft, "admin").await.unwrap_err();

        assert!(matches!(err, LedgerError::NotFound { ref entity, .. } if entity == "Client"));
        assert_eq!(h.stock("I0001").await.stock_quantity, 100.0);
        assert_eq!(num(&h.counter(scope::ITEMS).await, "total_stock"), 0.0);
        assert!(h.store.get(collection::ORDERS, "INV-001").await.unwrap().is_none());
    }

    // -------------------------------------------------------------------------
    // Drafts
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_draft_is_isolated_until_activated() {
        let h = harness().await;
        let mut draft = sale("INV-001", 1000.0, 300.0);
        draft.draft = true;
        h.coordinator.create(draft, "admin").await.unwrap();

        assert_eq!(h.stock("I0001").await.stock_quantity, 100.0);
        assert_eq!(h.client_due("C0001").await, 0.0);
        assert!(h.store.get(collection::AGGREGATE_COUNTERS, scope::ORDERS).await.unwrap().is_none());

        h.coordinator
            .update(
                "INV-001",
                OrderPatch {
                    amount_paid: Some(400.0),
                    ..Default::default()
                },
                "admin",
            )
            .await
            .unwrap();
        assert_eq!(h.client_due("C0001").await, 0.0);

        let active = h.coordinator.activate("INV-001", "manager").await.unwrap();
        assert!(active.is_active());
        assert_eq!(active.updated_by, "manager");
        assert_eq!(h.stock("I0001").await.stock_quantity, 95.0);
        assert_eq!(h.client_due("C0001").await, 600.0);
        assert_eq!(num(&h.counter(scope::ORDERS).await, "total"), 1.0);

        let err = h.coordinator.activate("INV-001", "manager").await.unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_deleting_draft_touches_nothing_else() {
        let h = harness().await;
        let mut draft = sale("INV-001", 1000.0, 300.0);
        draft.draft = true;
        h.coordinator.create(draft, "admin").await.unwrap();

        let report = h.coordinator.delete("INV-001").await.unwrap();
        assert!(!report.reversed);
        assert_eq!(h.stock("I0001").await.stock_quantity, 100.0);
        assert!(h.store.get(collection::AGGREGATE_COUNTERS, scope::ORDERS).await.unwrap().is_none());
    }

    // -------------------------------------------------------------------------
    // Payments
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_payment_round_trip() {
        let h = harness().await;
        h.coordinator.create(sale("INV-001", 1000.0, 300.0), "admin").await.unwrap();
        assert_eq!(h.client_due("C0001").await, 700.0);

        let paid = h
            .coordinator
            .update_payment_status("INV-001", PaymentStatus::Paid, None, "admin")
            .await
            .unwrap();
        assert_eq!(paid.amount_paid, 1000.0);
        assert_eq!(h.client_due("C0001").await, 0.0);
        assert_eq!(num(&h.counter(scope::ORDERS).await, "total_revenue"), 1000.0);
        assert_eq!(num(&h.counter(scope::FINANCIAL_SUMMARY).await, "total_income"), 1000.0);
        let month = h.counter("2025-03").await;
        assert_eq!(num(&month, "sales_orders_paid"), 1000.0);
        assert_eq!(num(&month, "sales_orders_amount"), 1000.0);

        h.coordinator
            .update_payment_status("INV-001", PaymentStatus::Pending, None, "admin")
            .await
            .unwrap();
        assert_eq!(h.client_due("C0001").await, 1000.0);

        let back = h
            .coordinator
            .update_payment_status("INV-001", PaymentStatus::Paid, None, "admin")
            .await
            .unwrap();
        assert_eq!(back.amount_paid, back.total_amount);
        assert_eq!(h.client_due("C0001").await, 0.0);
        assert_eq!(num(&h.counter(scope::CLIENTS).await, "total_due"), 0.0);
    }

    #[tokio::test]
    async fn test_partial_payment_requires_amount() {
        let h = harness().await;
        h.coordinator.create(sale("INV-001", 1000.0, 0.0), "admin").await.unwrap();

        let err = h
            .coordinator
            .update_payment_status("INV-001", PaymentStatus::Partial, None, "admin")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::MissingRequiredAssociation { .. })));

        h.coordinator
            .update_payment_status("INV-001", PaymentStatus::Partial, Some(250.0), "admin")
            .await
            .unwrap();
        assert_eq!(h.client_due("C0001").await, 750.0);
    }

    #[tokio::test]
    async fn test_challan_collection_follows_payment() {
        let h = harness().await;
        h.coordinator
            .create(challan("DC-001", 800.0, 200.0, "Ravi"), "admin")
            .await
            .unwrap();
        let ravi = h.doc(collection::EMPLOYEES, "E0001").await;
        assert_eq!(num(&ravi, "collected"), 200.0);

        h.coordinator
            .update_payment_status("DC-001", PaymentStatus::Paid, None, "admin")
            .await
            .unwrap();
        let ravi = h.doc(collection::EMPLOYEES, "E0001").await;
        assert_eq!(num(&ravi, "collected"), 800.0);
        assert_eq!(num(&h.counter(scope::EMPLOYEES).await, "total_collected"), 800.0);
        assert_eq!(num(&h.counter("2025-03").await, "delivery_challan_paid"), 800.0);
    }

    #[tokio::test]
    async fn test_unknown_collector_is_not_fatal() {
        let h = harness().await;
        let order = h
            .coordinator
            .create(challan("DC-001", 800.0, 200.0, "Nobody"), "admin")
            .await
            .unwrap();

        assert_eq!(order.amount_paid, 200.0);
        assert_eq!(h.client_due("C0001").await, 600.0);
        assert!(h.store.get(collection::AGGREGATE_COUNTERS, scope::EMPLOYEES).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_moves_collection_to_new_collector() {
        let h = harness().await;
        fixtures::seed(&h.store, collection::EMPLOYEES, "E0002", &fixtures::employee("E0002", "Meena")).await;
        h.coordinator
            .create(challan("DC-001", 800.0, 200.0, "Ravi"), "admin")
            .await
            .unwrap();

        let updated = h
            .coordinator
            .update(
                "DC-001",
                OrderPatch {
                    amount_collected_by: Some("Meena".to_string()),
                    ..Default::default()
                },
                "admin",
            )
            .await
            .unwrap();
        assert_eq!(updated.party.collector(), Some("Meena"));

        assert_eq!(num(&h.doc(collection::EMPLOYEES, "E0001").await, "collected"), 0.0);
        assert_eq!(num(&h.doc(collection::EMPLOYEES, "E0002").await, "collected"), 200.0);
        assert_eq!(num(&h.counter(scope::EMPLOYEES).await, "total_collected"), 200.0);
        assert_eq!(h.client_due("C0001").await, 600.0);
    }

    // -------------------------------------------------------------------------
    // Update
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_update_moves_due_and_counters_by_delta() {
        let h = harness().await;
        h.coordinator.create(sale("INV-001", 1000.0, 300.0), "admin").await.unwrap();

        let updated = h
            .coordinator
            .update(
                "INV-001",
                OrderPatch {
                    total_amount: Some(1200.0),
                    amount_paid: Some(500.0),
                    ..Default::default()
                },
                "clerk",
            )
            .await
            .unwrap();
        assert_eq!(updated.updated_by, "clerk");

        assert_eq!(h.client_due("C0001").await, 700.0);
        let orders = h.counter(scope::ORDERS).await;
        assert_eq!(num(&orders, "total"), 1.0);
        assert_eq!(num(&orders, "total_sales.amount"), 1200.0);
        assert_eq!(num(&orders, "total_revenue"), 500.0);
        let month = h.counter("2025-03").await;
        assert_eq!(num(&month, "sales_orders_count"), 1.0);
        assert_eq!(num(&month, "sales_orders_amount"), 1200.0);
    }

    #[tokio::test]
    async fn test_update_switches_client() {
        let h = harness().await;
        h.coordinator.create(sale("INV-001", 1000.0, 300.0), "admin").await.unwrap();

        h.coordinator
            .update(
                "INV-001",
                OrderPatch {
                    party: Some(PartyRef::new("C0002", "Bharat Stores")),
                    ..Default::default()
                },
                "admin",
            )
            .await
            .unwrap();

        assert_eq!(h.client_due("C0001").await, 0.0);
        assert_eq!(h.client_due("C0002").await, 700.0);
        assert_eq!(num(&h.counter(scope::CLIENTS).await, "total_due"), 700.0);
    }

    #[tokio::test]
    async fn test_update_propagates_party_name() {
        let h = harness().await;
        h.coordinator.create(sale("INV-001", 1000.0, 300.0), "admin").await.unwrap();

        h.coordinator
            .update(
                "INV-001",
                OrderPatch {
                    party: Some(PartyRef::new("C0001", "Acme Traders Pvt Ltd")),
                    ..Default::default()
                },
                "admin",
            )
            .await
            .unwrap();
        assert_eq!(h.doc(collection::CLIENTS, "C0001").await["name"], "Acme Traders Pvt Ltd");
        assert_eq!(h.client_due("C0001").await, 700.0);
    }

    #[tokio::test]
    async fn test_item_quantity_change_deltas_stock_exactly() {
        let h = harness().await;
        h.coordinator.create(sale("INV-001", 1000.0, 0.0), "admin").await.unwrap();
        assert_eq!(h.stock("I0001").await.stock_quantity, 95.0);

        h.coordinator
            .update(
                "INV-001",
                OrderPatch {
                    items: Some(vec![
                        fixtures::line("I0001", None, 8.0, 125.0),
                        fixtures::line("I0002", Some("B1"), 4.0, 10.0),
                    ]),
                    ..Default::default()
                },
                "admin",
            )
            .await
            .unwrap();

        assert_eq!(h.stock("I0001").await.stock_quantity, 92.0);
        let item = h.stock("I0002").await;
        assert_eq!(item.stock_quantity, 46.0);
        assert_eq!(item.batches[0].quantity, 26.0);

        let order = h.coordinator.get("INV-001").await.unwrap();
        assert_eq!(order.total_quantity, 12.0);
        assert_eq!(order.total_amount, 1040.0);
        assert_eq!(h.client_due("C0001").await, 1040.0);
    }

    #[tokio::test]
    async fn test_update_beyond_stock_is_rejected_before_writes() {
        let h = harness().await;
        h.coordinator.create(sale("INV-001", 1000.0, 0.0), "admin").await.unwrap();

        let err = h
            .coordinator
            .update(
                "INV-001",
                OrderPatch {
                    items: Some(vec![fixtures::line("I0001", None, 500.0, 2.0)]),
                    ..Default::default()
                },
                "admin",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::Core(CoreError::InsufficientStock { .. })));
        assert_eq!(h.stock("I0001").await.stock_quantity, 95.0);
        assert_eq!(h.coordinator.get("INV-001").await.unwrap().total_amount, 1000.0);
    }

    #[tokio::test]
    async fn test_purchase_item_change_moves_stock_between_items() {
        let h = harness().await;
        let purchase = draft(
            "PO-001",
            Party::Purchase {
                supplier: PartyRef::new("S0001", "Medico"),
            },
            vec![fixtures::line("I0002", Some("B1"), 10.0, 20.0)],
            200.0,
            0.0,
        );
        h.coordinator.create(purchase, "admin").await.unwrap();
        assert_eq!(h.stock("I0002").await.stock_quantity, 60.0);

        h.coordinator
            .update(
                "PO-001",
                OrderPatch {
                    items: Some(vec![fixtures::line("I0001", None, 5.0, 40.0)]),
                    ..Default::default()
                },
                "admin",
            )
            .await
            .unwrap();

        let removed = h.stock("I0002").await;
        assert_eq!(removed.stock_quantity, 50.0);
        assert_eq!(removed.batches[0].quantity, 30.0);
        assert_eq!(h.stock("I0001").await.stock_quantity, 105.0);
        assert_eq!(num(&h.counter(scope::ITEMS).await, "total_stock"), 5.0);
    }

    // -------------------------------------------------------------------------
    // Delete
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_delete_then_recreate_restores_ledger() {
        let h = harness().await;
        let before = h.ledger_snapshot().await;

        h.coordinator.create(sale("INV-001", 1000.0, 300.0), "admin").await.unwrap();
        let after_create = h.ledger_snapshot().await;

        let report = h.coordinator.delete("INV-001").await.unwrap();
        assert!(report.reversed);
        assert!(report.is_clean());
        assert_eq!(h.ledger_snapshot().await, before);
        assert!(matches!(
            h.coordinator.get("INV-001").await,
            Err(LedgerError::NotFound { .. })
        ));

        h.coordinator.create(sale("INV-001", 1000.0, 300.0), "admin").await.unwrap();
        assert_eq!(h.ledger_snapshot().await, after_create);
    }

    #[tokio::test]
    async fn test_delete_missing_order_is_not_found() {
        let h = harness().await;
        let err = h.coordinator.delete("INV-404").await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));
        assert_eq!(err.status(), 404);
    }

    #[tokio::test]
    async fn test_delete_continues_past_failed_reversal() {
        let faulty = Arc::new(FaultyStore::new(fixtures::memory_store().await));
        let h = seeded(faulty.clone()).await;
        h.coordinator.create(sale("INV-001", 1000.0, 300.0), "admin").await.unwrap();

        faulty.fail_writes(collection::CLIENTS, Some("C0001"));
        let report = h.coordinator.delete("INV-001").await.unwrap();
        faulty.clear();

        assert_eq!(report.failed_steps, vec![step::DUE.to_string()]);
        assert!(h.store.get(collection::ORDERS, "INV-001").await.unwrap().is_none());
        assert_eq!(h.stock("I0001").await.stock_quantity, 100.0);
        assert_eq!(num(&h.counter(scope::ORDERS).await, "total"), 0.0);
        assert_eq!(h.client_due("C0001").await, 700.0);
    }

    #[tokio::test]
    async fn test_delete_challan_reverses_collection() {
        let h = harness().await;
        h.coordinator
            .create(challan("DC-001", 800.0, 200.0, "Ravi"), "admin")
            .await
            .unwrap();
        assert_eq!(num(&h.counter(scope::EMPLOYEES).await, "total_collected"), 200.0);

        let report = h.coordinator.delete("DC-001").await.unwrap();
        assert!(report.is_clean());
        assert_eq!(num(&h.doc(collection::EMPLOYEES, "E0001").await, "collected"), 0.0);
        assert_eq!(num(&h.counter(scope::EMPLOYEES).await, "total_collected"), 0.0);
        assert_eq!(h.client_due("C0001").await, 0.0);
        assert_eq!(h.stock("I0001").await.stock_quantity, 100.0);
    }

    #[tokio::test]
    async fn test_delete_keeps_last_order_id() {
        let h = harness().await;
        h.coordinator.create(sale("INV-001", 100.0, 0.0), "admin").await.unwrap();
        h.coordinator.create(sale("INV-002", 100.0, 0.0), "admin").await.unwrap();
        h.coordinator.delete("INV-002").await.unwrap();

        let orders = h.counter(scope::ORDERS).await;
        assert_eq!(num(&orders, "total"), 1.0);
        assert_eq!(orders["last_id"], "INV-002");
    }

    // -------------------------------------------------------------------------
    // Monthly aggregation
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_monthly_counters_follow_creation_month() {
        let h = harness().await;
        for (i, total) in [100.0, 200.0, 300.0].into_iter().enumerate() {
            h.coordinator
                .create(sale(&format!("INV-{i}"), total, 0.0), "admin")
                .await
                .unwrap();
        }
        h.clock.set(Utc.with_ymd_and_hms(2025, 4, 2, 9, 0, 0).unwrap());
        h.coordinator.create(sale("INV-APR", 50.0, 0.0), "admin").await.unwrap();

        let march = h.counter("2025-03").await;
        assert_eq!(num(&march, "sales_orders_count"), 3.0);
        assert_eq!(num(&march, "sales_orders_amount"), 600.0);
        assert_eq!(num(&h.counter("2025-04").await, "sales_orders_amount"), 50.0);

        // Deleting a March order in April still decrements March.
        h.clock.advance(Duration::days(1));
        h.coordinator.delete("INV-0").await.unwrap();
        assert_eq!(num(&h.counter("2025-03").await, "sales_orders_amount"), 500.0);
    }

    // -------------------------------------------------------------------------
    // Failure injection & recovery
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_store_failure_mid_create_is_compensated() {
        let faulty = Arc::new(FaultyStore::new(fixtures::memory_store().await));
        let h = seeded(faulty.clone()).await;
        faulty.fail_writes(collection::AGGREGATE_COUNTERS, Some(scope::FINANCIAL_SUMMARY));

        let err = h
            .coordinator
            .create(sale("INV-001", 1000.0, 300.0), "admin")
            .await
            .unwrap_err();
        faulty.clear();

        match &err {
            LedgerError::ReconciliationWriteFailure {
                operation: failed_op,
                step: failed_step,
                ..
            } => {
                assert_eq!(failed_op, operation::CREATE);
                assert_eq!(failed_step, step::COUNTERS);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.status(), 500);

        assert!(h.store.get(collection::ORDERS, "INV-001").await.unwrap().is_none());
        assert_eq!(h.stock("I0001").await.stock_quantity, 100.0);
        assert_eq!(h.client_due("C0001").await, 0.0);
        assert_eq!(num(&h.counter(scope::ORDERS).await, "total"), 0.0);
        assert_eq!(num(&h.counter(scope::CLIENTS).await, "total_due"), 0.0);
        assert_eq!(num(&h.counter(scope::ITEMS).await, "total_stock"), 0.0);

        let sagas = h.coordinator.sagas.for_order("INV-001").await.unwrap();
        assert_eq!(sagas[0].state, SagaState::Compensated);
        assert!(h.coordinator.sagas.incomplete().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_writing_order_document_is_compensated() {
        let faulty = Arc::new(FaultyStore::new(fixtures::memory_store().await));
        let h = seeded(faulty.clone()).await;
        faulty.fail_writes(collection::ORDERS, None);

        let err = h
            .coordinator
            .create(sale("INV-001", 1000.0, 300.0), "admin")
            .await
            .unwrap_err();
        faulty.clear();

        assert!(matches!(err, LedgerError::ReconciliationWriteFailure { step: ref failed_step, .. } if failed_step == step::ORDER));
        assert_eq!(h.ledger_snapshot().await, vec![0.0; 12].into_iter().chain([100.0]).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_aborted_create_restores_last_order_id() {
        let faulty = Arc::new(FaultyStore::new(fixtures::memory_store().await));
        let h = seeded(faulty.clone()).await;

        faulty.fail_writes(collection::ORDERS, Some("INV-001"));
        h.coordinator
            .create(sale("INV-001", 100.0, 0.0), "admin")
            .await
            .unwrap_err();
        faulty.clear();
        assert!(h.counter(scope::ORDERS).await["last_id"].is_null());

        h.coordinator.create(sale("INV-001", 100.0, 0.0), "admin").await.unwrap();
        faulty.fail_writes(collection::ORDERS, Some("INV-002"));
        h.coordinator
            .create(sale("INV-002", 100.0, 0.0), "admin")
            .await
            .unwrap_err();
        faulty.clear();

        let orders = h.counter(scope::ORDERS).await;
        assert_eq!(orders["last_id"], "INV-001");
        assert_eq!(num(&orders, "total"), 1.0);
    }

    #[tokio::test]
    async fn test_recover_incomplete_runs_recorded_compensations() {
        let h = harness().await;

        // A saga that committed its due step and then stopped.
        let mut saga = Saga::begin(h.store.clone(), h.clock.clone(), operation::CREATE, "INV-009", CREATE_STEPS)
            .await
            .unwrap();
        saga.enter(step::DUE);
        h.coordinator
            .ledger
            .update_client_due("C0001", 450.0, saga.journal())
            .await
            .unwrap();
        saga.commit_step().await.unwrap();
        drop(saga);
        assert_eq!(h.client_due("C0001").await, 450.0);

        let recovered = h.coordinator.recover_incomplete().await.unwrap();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].state, SagaState::Compensated);
        assert_eq!(h.client_due("C0001").await, 0.0);
        assert_eq!(num(&h.counter(scope::CLIENTS).await, "total_due"), 0.0);
        assert!(h.coordinator.recover_incomplete().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_filters_and_orders_newest_first() {
        let h = harness().await;
        h.coordinator.create(sale("INV-001", 100.0, 0.0), "admin").await.unwrap();
        h.clock.advance(Duration::minutes(5));
        h.coordinator
            .create(challan("DC-001", 200.0, 0.0, "Ravi"), "admin")
            .await
            .unwrap();
        h.clock.advance(Duration::minutes(5));
        let mut draft = sale("INV-002", 300.0, 0.0);
        draft.draft = true;
        h.coordinator.create(draft, "admin").await.unwrap();

        let all = h.coordinator.list(&OrderQuery::default()).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["INV-002", "DC-001", "INV-001"]);

        let sales = h
            .coordinator
            .list(&OrderQuery {
                order_type: Some(OrderType::Sale),
                draft: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].id, "INV-001");

        let for_client = h
            .coordinator
            .list(&OrderQuery {
                client_id: Some("C0001".to_string()),
                limit: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(for_client.len(), 2);
    }

    #[tokio::test]
    async fn test_list_and_total_within_date_range() {
        let h = harness().await;
        for (id, total, day) in [("INV-001", 100.0, 1), ("INV-002", 250.0, 10), ("INV-003", 400.0, 20)] {
            let mut order = sale(id, total, 0.0);
            order.order_date = Some(Utc.with_ymd_and_hms(2025, 3, day, 9, 0, 0).unwrap());
            h.coordinator.create(order, "admin").await.unwrap();
            h.clock.advance(Duration::minutes(1));
        }

        let range = OrderQuery {
            from: Some(Utc.with_ymd_and_hms(2025, 3, 5, 0, 0, 0).unwrap()),
            to: Some(Utc.with_ymd_and_hms(2025, 3, 20, 9, 0, 0).unwrap()),
            ..Default::default()
        };
        let within = h.coordinator.list(&range).await.unwrap();
        let ids: Vec<&str> = within.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["INV-003", "INV-002"]);
        assert_eq!(h.coordinator.period_total(&range).await.unwrap(), 650.0);

        let since = OrderQuery {
            from: Some(Utc.with_ymd_and_hms(2025, 3, 15, 0, 0, 0).unwrap()),
            ..Default::default()
        };
        assert_eq!(h.coordinator.period_total(&since).await.unwrap(), 400.0);
    }
}
