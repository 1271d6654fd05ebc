//! # Validation Module
//!
//! Boundary validation for BizLedger inputs.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP layer (external)                                        │
//! │  └── Deserialization into OrderDraft / OrderPatch                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Required associations (client / supplier)                         │
//! │  ├── Item rules (quantity > 0, price > 0, tax 0-100, discount ≥ 0)     │
//! │  └── Runs before ANY side effect                                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Reconcilers                                                  │
//! │  └── Stock and batch availability                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{OrderItem, Party};
use crate::MAX_ORDER_ITEMS;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an invoice or challan number.
///
/// ## Rules
/// - Must not be empty
/// - At most 64 characters
/// - No `/` (it is a document key)
pub fn validate_order_id(id: &str) -> ValidationResult<()> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::Required {
            field: "order id".to_string(),
        });
    }

    if id.len() > 64 {
        return Err(ValidationError::TooLong {
            field: "order id".to_string(),
            max: 64,
        });
    }

    if id.contains('/') {
        return Err(ValidationError::InvalidFormat {
            field: "order id".to_string(),
            reason: "must not contain '/'".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (client, supplier, employee, item).
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates free-form remarks (at most 500 characters).
pub fn validate_remarks(remarks: &str) -> ValidationResult<()> {
    if remarks.len() > 500 {
        return Err(ValidationError::TooLong {
            field: "remarks".to_string(),
            max: 500,
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

fn validate_finite(field: &str, value: f64) -> ValidationResult<()> {
    if !value.is_finite() {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must be a finite number".to_string(),
        });
    }
    Ok(())
}

/// Validates a strictly positive amount or quantity.
pub fn validate_positive(field: &str, value: f64) -> ValidationResult<()> {
    validate_finite(field, value)?;
    if value <= 0.0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates an amount that may be zero but not negative.
pub fn validate_non_negative(field: &str, value: f64) -> ValidationResult<()> {
    validate_finite(field, value)?;
    if value < 0.0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a tax percentage (0 to 100).
pub fn validate_tax_percent(tax: f64) -> ValidationResult<()> {
    validate_finite("tax", tax)?;
    if !(0.0..=100.0).contains(&tax) {
        return Err(ValidationError::OutOfRange {
            field: "tax".to_string(),
            min: 0.0,
            max: 100.0,
        });
    }
    Ok(())
}

// =============================================================================
// Order Validators
// =============================================================================

/// Validates a single order line.
pub fn validate_item(item: &OrderItem) -> ValidationResult<()> {
    if item.item_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "item_id".to_string(),
        });
    }
    validate_name("item_name", &item.item_name)?;
    validate_positive("quantity", item.quantity)?;
    validate_positive("price", item.price)?;
    validate_tax_percent(item.tax)?;
    validate_non_negative("discount", item.discount)?;
    Ok(())
}

/// Validates an order's item list (at least one, at most [`MAX_ORDER_ITEMS`]).
pub fn validate_items(items: &[OrderItem]) -> ValidationResult<()> {
    if items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }
    if items.len() > MAX_ORDER_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1.0,
            max: MAX_ORDER_ITEMS as f64,
        });
    }
    items.iter().try_for_each(validate_item)
}

/// Checks that the order's counterparty carries both an id and a name.
pub fn validate_party(party: &Party, operation: &str) -> CoreResult<()> {
    let party_ref = party.party_ref();
    let field = match party {
        Party::Purchase { .. } => ("supplier_id", "supplier_name"),
        _ => ("client_id", "client_name"),
    };

    if party_ref.id.trim().is_empty() {
        return Err(CoreError::missing(operation, field.0));
    }
    if party_ref.name.trim().is_empty() {
        return Err(CoreError::missing(operation, field.1));
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
