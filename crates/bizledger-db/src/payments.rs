//! # Payments
//!
//! Settlements made outside any order: a client paying down its balance, or
//! the business paying a supplier.
//!
//! ```text
//! record(kind, draft)
//!    │
//!    ├─ counterparty_due   Clients.due_amount / Suppliers.due   -= amount
//!    │                     clients / suppliers.total_due        -= amount
//!    ├─ counters           payments / supplier_payments.total   += 1
//!    │                                                .total_amount += amount
//!    └─ payment_document   INSERT into Payments / SupplierPayments
//! ```
//!
//! Each record is a saga, so a failed counter or document write puts the
//! balance back. A payment larger than the due leaves a negative balance
//! (an advance), the same way an overpaid order does.

use std::sync::Arc;

use bizledger_core::counters::collection_scope;
use bizledger_core::validation::{validate_name, validate_positive, validate_remarks};
use bizledger_core::{collection, CoreResult, CounterDeltas, PartyKind, Payment};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::{LedgerError, LedgerResult};
use crate::ids::IdGenerator;
use crate::reconcile::LedgerReconciler;
use crate::saga::Saga;
use crate::store::{get_typed, query_typed, to_document, DocumentStore, Query};

pub mod operation {
    pub const CLIENT_PAYMENT: &str = "record_client_payment";
    pub const SUPPLIER_PAYMENT: &str = "record_supplier_payment";
}

pub mod step {
    pub const DUE: &str = "counterparty_due";
    pub const COUNTERS: &str = "counters";
    pub const DOCUMENT: &str = "payment_document";
}

const RECORD_STEPS: &[&str] = &[step::DUE, step::COUNTERS, step::DOCUMENT];

/// Input for a new payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentDraft {
    /// Client id for client payments, supplier id for supplier payments.
    pub party_id: String,
    pub amount: f64,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    /// Defaults to now.
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

/// Filters for [`PaymentService::list`]. Results are newest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentQuery {
    #[serde(default)]
    pub party_id: Option<String>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

impl PaymentQuery {
    pub fn for_party(party_id: impl Into<String>) -> Self {
        PaymentQuery {
            party_id: Some(party_id.into()),
            ..Default::default()
        }
    }

    fn to_query(&self) -> Query {
        let mut query = Query::new()
            .order_by("date", true)
            .within("date", self.from, self.to);
        if let Some(party_id) = &self.party_id {
            query = query.eq("party_id", party_id.as_str());
        }
        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }
        if let Some(offset) = self.offset {
            query = query.offset(offset);
        }
        query
    }
}

fn validate_payment(payment: &Payment) -> CoreResult<()> {
    validate_name("party_id", &payment.party_id)?;
    validate_positive("amount", payment.amount)?;
    if let Some(reference) = &payment.reference {
        validate_remarks(reference)?;
    }
    Ok(())
}

fn party_collection(kind: PartyKind) -> (&'static str, &'static str) {
    match kind {
        PartyKind::Client => (collection::CLIENTS, "Client"),
        PartyKind::Supplier => (collection::SUPPLIERS, "Supplier"),
    }
}

#[derive(Debug, Clone)]
pub struct PaymentService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    ids: IdGenerator,
    ledger: LedgerReconciler,
}

impl PaymentService {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, ids: IdGenerator) -> Self {
        Self {
            ledger: LedgerReconciler::new(store.clone(), clock.clone()),
            store,
            clock,
            ids,
        }
    }

    /// Records money received from a client.
    pub async fn record_client_payment(&self, draft: PaymentDraft, actor: &str) -> LedgerResult<Payment> {
        self.record(PartyKind::Client, draft, actor).await
    }

    /// Records money paid to a supplier.
    pub async fn record_supplier_payment(&self, draft: PaymentDraft, actor: &str) -> LedgerResult<Payment> {
        self.record(PartyKind::Supplier, draft, actor).await
    }

    pub async fn record(&self, kind: PartyKind, draft: PaymentDraft, actor: &str) -> LedgerResult<Payment> {
        let now = self.clock.now();
        let mut payment = Payment {
            id: String::new(),
            party_kind: kind,
            party_id: draft.party_id.trim().to_string(),
            amount: draft.amount,
            method: draft.method.filter(|m| !m.trim().is_empty()),
            reference: draft.reference.filter(|r| !r.trim().is_empty()),
            added_by: actor.to_string(),
            date: draft.date.unwrap_or(now),
            created_at: now,
        };
        validate_payment(&payment)?;

        let (party_collection, entity) = party_collection(kind);
        if self.store.get(party_collection, &payment.party_id).await?.is_none() {
            return Err(LedgerError::not_found(entity, &payment.party_id));
        }

        let payments_collection = kind.payments_collection();
        payment.id = self.ids.next_id(payments_collection).await?;

        let operation = match kind {
            PartyKind::Client => operation::CLIENT_PAYMENT,
            PartyKind::Supplier => operation::SUPPLIER_PAYMENT,
        };
        let mut saga =
            Saga::begin(self.store.clone(), self.clock.clone(), operation, &payment.id, RECORD_STEPS).await?;
        let result = self.run_record(&mut saga, &payment).await;
        if let Err(err) = result {
            return Err(saga.abort(err).await);
        }
        saga.complete().await;

        info!(
            payment_id = %payment.id,
            party_id = %payment.party_id,
            kind = ?kind,
            amount = payment.amount,
            "Payment recorded"
        );
        Ok(payment)
    }

    async fn run_record(&self, saga: &mut Saga, payment: &Payment) -> LedgerResult<()> {
        saga.enter(step::DUE);
        self.ledger
            .update_party_due(payment.party_kind, &payment.party_id, -payment.amount, saga.journal())
            .await?;
        saga.commit_step().await?;

        saga.enter(step::COUNTERS);
        let payments_collection = payment.party_kind.payments_collection();
        self.ledger
            .update_aggregate_counters(
                &collection_scope(payments_collection),
                CounterDeltas::new()
                    .increment("total", 1.0)
                    .increment("total_amount", payment.amount),
                saga.journal(),
            )
            .await?;
        saga.commit_step().await?;

        saga.enter(step::DOCUMENT);
        self.store
            .insert(payments_collection, &payment.id, to_document(payment)?)
            .await?;
        Ok(())
    }

    pub async fn get(&self, kind: PartyKind, id: &str) -> LedgerResult<Payment> {
        get_typed::<Payment>(self.store.as_ref(), kind.payments_collection(), id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Payment", id))
    }

    pub async fn list(&self, kind: PartyKind, filter: &PaymentQuery) -> LedgerResult<Vec<Payment>> {
        let payments = query_typed(self.store.as_ref(), kind.payments_collection(), &filter.to_query()).await?;
        debug!(kind = ?kind, count = payments.len(), "Listed payments");
        Ok(payments)
    }

    /// Sum of the amounts `filter` matches.
    pub async fn total(&self, kind: PartyKind, filter: &PaymentQuery) -> LedgerResult<f64> {
        let payments = self.list(kind, filter).await?;
        Ok(payments.iter().map(|p| p.amount).sum())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
