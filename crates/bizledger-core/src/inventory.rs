//! # Inventory Arithmetic
//!
//! Batch-aware stock changes on a single [`InventoryItem`].
//!
//! ## Stock Movements
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Movement              Batch given?   Effect                            │
//! │  ─────────────────────────────────────────────────────────────────────  │
//! │  deduct (sale)         yes            batch -= q, stock -= q            │
//! │                                       BatchNotFound / InsufficientBatch │
//! │                        no             stock -= q, InsufficientStock     │
//! │                                                                         │
//! │  add_stock (purchase,  yes            batch += q (or new batch),        │
//! │   sale reversal)                      stock += q                        │
//! │                        no             stock += q                        │
//! │                                                                         │
//! │  remove_clamped        yes            batch = max(0, batch - q)         │
//! │   (purchase reversal)                 stock = max(0, stock - q)         │
//! │                        no             stock = max(0, stock - q)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Deductions check first and clamp anyway; reversals never fail.
//!
//! Batch expiries are free text from purchase lines. `YYYY-MM-DD` and
//! RFC 3339 timestamps name a day; `YYYY-MM` means the last day of that
//! month.

use chrono::{DateTime, Months, NaiveDate, Utc};

use crate::error::{CoreError, CoreResult};
use crate::types::{Batch, InventoryItem, OrderItem};

impl InventoryItem {
    /// Creates the inventory record a purchase line implies when the item does
    /// not exist yet.
    pub fn from_purchase_line(
        line: &OrderItem,
        default_category: &str,
        low_stock_threshold: f64,
        now: DateTime<Utc>,
    ) -> Self {
        let batches = line
            .batch()
            .map(|batch_number| {
                vec![Batch {
                    batch_number: batch_number.to_string(),
                    expiry: line.expiry.clone(),
                    quantity: line.quantity,
                }]
            })
            .unwrap_or_default();

        InventoryItem {
            id: line.item_id.clone(),
            name: line.item_name.clone(),
            category: line
                .category
                .clone()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| default_category.to_string()),
            stock_quantity: line.quantity,
            low_stock_threshold,
            batches,
            price: Some(line.price),
            created_at: now,
            updated_at: now,
        }
    }

    /// Sum of all batch quantities.
    pub fn batch_total(&self) -> f64 {
        self.batches.iter().map(|b| b.quantity).sum()
    }

    fn batch_mut(&mut self, batch_number: &str) -> Option<&mut Batch> {
        self.batches
            .iter_mut()
            .find(|b| b.batch_number == batch_number)
    }

    /// Checks that `quantity` can be taken from the item (or the named batch).
    pub fn check_deduction(&self, batch_number: Option<&str>, quantity: f64) -> CoreResult<()> {
        match batch_number {
            Some(number) => {
                let batch = self
                    .batches
                    .iter()
                    .find(|b| b.batch_number == number)
                    .ok_or_else(|| CoreError::BatchNotFound {
                        item_id: self.id.clone(),
                        batch_number: number.to_string(),
                    })?;
                if batch.quantity < quantity {
                    return Err(CoreError::InsufficientBatchStock {
                        item_id: self.id.clone(),
                        batch_number: number.to_string(),
                        available: batch.quantity,
                        requested: quantity,
                    });
                }
            }
            None => {
                if self.stock_quantity < quantity {
                    return Err(CoreError::InsufficientStock {
                        item_id: self.id.clone(),
                        available: self.stock_quantity,
                        requested: quantity,
                    });
                }
            }
        }
        Ok(())
    }

    /// Takes `quantity` out of stock for a sale or delivery challan.
    pub fn deduct(&mut self, batch_number: Option<&str>, quantity: f64) -> CoreResult<()> {
        self.check_deduction(batch_number, quantity)?;

        if let Some(batch) = batch_number.and_then(|n| self.batch_mut(n)) {
            batch.quantity = (batch.quantity - quantity).max(0.0);
        }
        self.stock_quantity = (self.stock_quantity - quantity).max(0.0);
        Ok(())
    }

    /// Adds `quantity` to stock. A named batch that does not exist yet is
    /// appended; a given expiry replaces the batch's expiry.
    pub fn add_stock(&mut self, batch_number: Option<&str>, expiry: Option<&str>, quantity: f64) {
        if let Some(number) = batch_number {
            match self.batch_mut(number) {
                Some(batch) => {
                    batch.quantity += quantity;
                    if let Some(expiry) = expiry {
                        batch.expiry = Some(expiry.to_string());
                    }
                }
                None => self.batches.push(Batch {
                    batch_number: number.to_string(),
                    expiry: expiry.map(str::to_string),
                    quantity,
                }),
            }
        }
        self.stock_quantity += quantity;
    }

    /// Removes `quantity` without ever failing, clamping batch and stock at
    /// zero. Returns the amount actually removed from `stock_quantity`.
    pub fn remove_clamped(&mut self, batch_number: Option<&str>, quantity: f64) -> f64 {
        if let Some(batch) = batch_number.and_then(|n| self.batch_mut(n)) {
            batch.quantity = (batch.quantity - quantity).max(0.0);
        }
        let before = self.stock_quantity;
        self.stock_quantity = (before - quantity).max(0.0);
        before - self.stock_quantity
    }

    /// Applies a signed change: positive adds, negative removes with clamping.
    pub fn apply_change(&mut self, batch_number: Option<&str>, expiry: Option<&str>, delta: f64) {
        if delta >= 0.0 {
            self.add_stock(batch_number, expiry, delta);
        } else {
            self.remove_clamped(batch_number, -delta);
        }
    }
}

impl Batch {
    /// The day this batch expires, when its expiry text is recognised.
    pub fn expiry_date(&self) -> Option<NaiveDate> {
        let text = self.expiry.as_deref()?.trim();
        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            return Some(date);
        }
        if let Ok(at) = DateTime::parse_from_rfc3339(text) {
            return Some(at.date_naive());
        }
        let first = NaiveDate::parse_from_str(&format!("{text}-01"), "%Y-%m-%d").ok()?;
        first.checked_add_months(Months::new(1))?.pred_opt()
    }
}

impl InventoryItem {
    /// Batches still holding stock that expire on or before `cutoff`.
    pub fn batches_expiring_by(&self, cutoff: NaiveDate) -> Vec<(&Batch, NaiveDate)> {
        self.batches
            .iter()
            .filter(|b| b.quantity > 0.0)
            .filter_map(|b| b.expiry_date().map(|date| (b, date)))
            .filter(|(_, date)| *date <= cutoff)
            .collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
