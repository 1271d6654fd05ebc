//! # Order Totals
//!
//! Line and order totals derived from an order's items.
//!
//! ```text
//! line_gross     = quantity × price
//! line_net       = line_gross − line discount
//! line_tax       = line_net × tax% / 100
//!
//! subtotal       = Σ line_net
//! total_tax      = Σ line_tax
//! gross_total    = subtotal + total_tax
//! total_amount   = gross_total − order discount
//!                  (percentage: gross_total × discount / 100, fixed: discount)
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{DiscountType, OrderItem};

/// Totals computed from an order's items.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderTotals {
    pub subtotal: f64,
    pub total_tax: f64,
    pub total_quantity: f64,
    /// `subtotal + total_tax`, before the order-level discount.
    pub gross_total: f64,
}

impl OrderTotals {
    /// Total after the order-level discount, never below zero.
    pub fn total_after_discount(&self, discount: f64, discount_type: DiscountType) -> f64 {
        let reduction = match discount_type {
            DiscountType::Percentage => self.gross_total * discount / 100.0,
            DiscountType::Fixed => discount,
        };
        (self.gross_total - reduction).max(0.0)
    }
}

/// Computes totals for a list of order items.
pub fn calculate_order_totals(items: &[OrderItem]) -> OrderTotals {
    let mut totals = OrderTotals::default();

    for item in items {
        let line_net = item.quantity * item.price - item.discount;
        let line_tax = line_net * item.tax / 100.0;

        totals.subtotal += line_net;
        totals.total_tax += line_tax;
        totals.total_quantity += item.quantity;
    }

    totals.gross_total = totals.subtotal + totals.total_tax;
    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: f64, price: f64, tax: f64, discount: f64) -> OrderItem {
        OrderItem {
            item_id: "I0001".to_string(),
            item_name: "Widget".to_string(),
            batch_number: None,
            expiry: None,
            quantity,
            price,
            tax,
            discount,
            category: None,
        }
    }

    #[test]
    fn test_totals_apply_line_discount_before_tax() {
        let totals = calculate_order_totals(&[line(2.0, 100.0, 18.0, 20.0), line(1.0, 50.0, 0.0, 0.0)]);
        assert_eq!(totals.subtotal, 230.0);
        assert!((totals.total_tax - 32.4).abs() < 1e-9);
        assert_eq!(totals.total_quantity, 3.0);
        assert!((totals.gross_total - 262.4).abs() < 1e-9);
    }

    #[test]
    fn test_order_discount_types() {
        let totals = calculate_order_totals(&[line(10.0, 10.0, 0.0, 0.0)]);
        assert_eq!(totals.total_after_discount(10.0, DiscountType::Percentage), 90.0);
        assert_eq!(totals.total_after_discount(15.0, DiscountType::Fixed), 85.0);
        assert_eq!(totals.total_after_discount(500.0, DiscountType::Fixed), 0.0);
    }

    #[test]
    fn test_empty_items_produce_zero_totals() {
        assert_eq!(calculate_order_totals(&[]), OrderTotals::default());
    }
}
