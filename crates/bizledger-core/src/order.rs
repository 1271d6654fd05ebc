//! # Orders
//!
//! The persisted [`Order`], the [`OrderDraft`] accepted at creation, and the
//! [`OrderPatch`] accepted by the generic update.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   non-existent ──create(draft=true)──► draft ──activate──► active      │
//! │        │                                 │                   │  ▲      │
//! │        └──────create(draft=false)────────┼──────────────────►│  │      │
//! │                                          │                   │  │      │
//! │                                       update              update /     │
//! │                                   (no reconciliation)    payment       │
//! │                                          │                   │         │
//! │                                          ▼                   ▼         │
//! │                                       deleted ◄──────────  delete      │
//! │                                                                         │
//! │   Only active orders contribute to stock, balances and counters.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::counters::month_key;
use crate::error::{CoreError, CoreResult};
use crate::totals::{calculate_order_totals, OrderTotals};
use crate::types::{
    DiscountType, OrderItem, OrderStatus, OrderType, Party, PartyKind, PartyRef, PaymentStatus,
};
use crate::validation;

// =============================================================================
// Order
// =============================================================================

/// A sale, purchase or delivery challan.
///
/// `id` is the business identifier (invoice or challan number) and also the
/// primary key in the `Orders` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub party: Party,
    pub items: Vec<OrderItem>,
    pub subtotal: f64,
    pub total_tax: f64,
    pub total_quantity: f64,
    #[serde(default)]
    pub discount: f64,
    #[serde(default)]
    pub discount_type: DiscountType,
    pub total_amount: f64,
    pub amount_paid: f64,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub payment_method: Option<String>,
    pub status: OrderStatus,
    pub draft: bool,
    #[ts(as = "String")]
    pub order_date: DateTime<Utc>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_by: String,
}

impl Order {
    #[inline]
    pub fn order_type(&self) -> OrderType {
        self.party.order_type()
    }

    #[inline]
    pub fn party_kind(&self) -> PartyKind {
        self.party.kind()
    }

    #[inline]
    pub fn party_ref(&self) -> &PartyRef {
        self.party.party_ref()
    }

    /// Outstanding amount this order contributes to its counterparty.
    /// Negative when over-paid.
    #[inline]
    pub fn outstanding(&self) -> f64 {
        self.total_amount - self.amount_paid
    }

    /// Month bucket (`YYYY-MM`) the order's counters live in.
    pub fn month_key(&self) -> String {
        month_key(self.created_at)
    }

    /// True when the order contributes to stock, balances and counters.
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.draft
    }

    fn apply_totals(&mut self, totals: &OrderTotals) {
        self.subtotal = totals.subtotal;
        self.total_tax = totals.total_tax;
        self.total_quantity = totals.total_quantity;
    }
}

// =============================================================================
// Order Draft (create input)
// =============================================================================

/// Input for order creation, validated at the boundary before any side effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderDraft {
    /// Invoice number (sale, purchase) or challan number (delivery challan).
    pub id: String,
    pub party: Party,
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub discount: f64,
    #[serde(default)]
    pub discount_type: DiscountType,
    /// Explicit total. Computed from the items when absent.
    #[serde(default)]
    pub total_amount: Option<f64>,
    #[serde(default)]
    pub amount_paid: f64,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub draft: bool,
    #[ts(as = "Option<String>")]
    #[serde(default)]
    pub order_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl OrderDraft {
    /// Checks the draft against every boundary rule.
    pub fn validate(&self) -> CoreResult<()> {
        validation::validate_order_id(&self.id)?;
        validation::validate_party(&self.party, "create")?;
        validation::validate_items(&self.items)?;
        validation::validate_non_negative("discount", self.discount)?;
        validation::validate_non_negative("amount_paid", self.amount_paid)?;
        if let Some(total) = self.total_amount {
            validation::validate_non_negative("total_amount", total)?;
        }
        if let Some(remarks) = &self.remarks {
            validation::validate_remarks(remarks)?;
        }
        Ok(())
    }

    /// Builds the order of record, stamping timestamps and actor.
    pub fn into_order(self, now: DateTime<Utc>, actor: &str) -> CoreResult<Order> {
        self.validate()?;

        let totals = calculate_order_totals(&self.items);
        let total_amount = self
            .total_amount
            .unwrap_or_else(|| totals.total_after_discount(self.discount, self.discount_type));

        let mut order = Order {
            id: self.id.trim().to_string(),
            party: self.party,
            items: self.items,
            subtotal: 0.0,
            total_tax: 0.0,
            total_quantity: 0.0,
            discount: self.discount,
            discount_type: self.discount_type,
            total_amount,
            amount_paid: self.amount_paid,
            payment_status: self.payment_status,
            payment_method: self.payment_method,
            status: self.status,
            draft: self.draft,
            order_date: self.order_date.unwrap_or(now),
            remarks: self.remarks,
            created_at: now,
            updated_at: now,
            created_by: actor.to_string(),
            updated_by: actor.to_string(),
        };
        order.apply_totals(&totals);
        Ok(order)
    }
}

// =============================================================================
// Order Patch (update input)
// =============================================================================

/// Partial update of an order. Absent fields keep their current value.
///
/// The patch cannot change the order type or the draft flag; use the
/// dedicated activation operation for `draft → active`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderPatch {
    #[serde(default)]
    pub items: Option<Vec<OrderItem>>,
    #[serde(default)]
    pub total_amount: Option<f64>,
    #[serde(default)]
    pub amount_paid: Option<f64>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub discount: Option<f64>,
    #[serde(default)]
    pub discount_type: Option<DiscountType>,
    /// New client (sale, delivery challan) or supplier (purchase).
    #[serde(default)]
    pub party: Option<PartyRef>,
    /// Delivery challans only.
    #[serde(default)]
    pub amount_collected_by: Option<String>,
    /// Delivery challans only.
    #[serde(default)]
    pub link: Option<String>,
    #[ts(as = "Option<String>")]
    #[serde(default)]
    pub order_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl OrderPatch {
    /// True when the patch replaces the item list.
    pub fn changes_items(&self) -> bool {
        self.items.is_some()
    }
}

impl Order {
    /// Returns the order with `patch` applied, recomputing totals when items
    /// or the discount change. The current order is left untouched.
    pub fn patched(&self, patch: OrderPatch, now: DateTime<Utc>, actor: &str) -> CoreResult<Order> {
        const OP: &str = "update";

        let mut next = self.clone();

        if let Some(items) = patch.items {
            validation::validate_items(&items)?;
            next.items = items;
        }
        if let Some(discount) = patch.discount {
            validation::validate_non_negative("discount", discount)?;
            next.discount = discount;
        }
        if let Some(discount_type) = patch.discount_type {
            next.discount_type = discount_type;
        }
        if let Some(party) = patch.party {
            if party.id.trim().is_empty() || party.name.trim().is_empty() {
                return Err(CoreError::missing(OP, party_field(self.party_kind())));
            }
            *next.party.party_ref_mut() = party;
        }
        match &mut next.party {
            Party::DeliveryChallan {
                amount_collected_by,
                link,
                ..
            } => {
                if let Some(collector) = patch.amount_collected_by {
                    *amount_collected_by = Some(collector);
                }
                if let Some(new_link) = patch.link {
                    *link = Some(new_link);
                }
            }
            _ => {
                if patch.amount_collected_by.is_some() {
                    return Err(CoreError::InvalidTransition {
                        order_id: self.id.clone(),
                        reason: format!(
                            "amount_collected_by only applies to delivery challans, not {}",
                            self.order_type()
                        ),
                    });
                }
            }
        }

        let recompute = next.items != self.items
            || next.discount != self.discount
            || next.discount_type != self.discount_type;
        let totals = calculate_order_totals(&next.items);
        next.apply_totals(&totals);

        if let Some(total) = patch.total_amount {
            validation::validate_non_negative("total_amount", total)?;
            next.total_amount = total;
        } else if recompute {
            next.total_amount = totals.total_after_discount(next.discount, next.discount_type);
        }

        if let Some(paid) = patch.amount_paid {
            validation::validate_non_negative("amount_paid", paid)?;
            next.amount_paid = paid;
        }
        if let Some(payment_status) = patch.payment_status {
            next.payment_status = payment_status;
        }
        if let Some(method) = patch.payment_method {
            next.payment_method = Some(method);
        }
        if let Some(status) = patch.status {
            next.status = status;
        }
        if let Some(order_date) = patch.order_date {
            next.order_date = order_date;
        }
        if let Some(remarks) = patch.remarks {
            validation::validate_remarks(&remarks)?;
            next.remarks = Some(remarks);
        }

        next.updated_at = now;
        next.updated_by = actor.to_string();
        Ok(next)
    }

    /// Resolves the amount paid implied by a payment-status change.
    ///
    /// - `paid` → `total_amount`
    /// - `pending` → 0
    /// - `partial` → the explicit amount, which is required
    pub fn resolve_payment(&self, status: PaymentStatus, amount: Option<f64>) -> CoreResult<f64> {
        match status {
            PaymentStatus::Paid => Ok(self.total_amount),
            PaymentStatus::Pending => Ok(0.0),
            PaymentStatus::Partial => {
                let amount =
                    amount.ok_or_else(|| CoreError::missing("update_payment_status", "amount_paid"))?;
                validation::validate_non_negative("amount_paid", amount)?;
                Ok(amount)
            }
        }
    }
}

fn party_field(kind: PartyKind) -> &'static str {
    match kind {
        PartyKind::Client => "client",
        PartyKind::Supplier => "supplier",
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
