//! # Error Types
//!
//! Domain-specific error types for bizledger-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bizledger-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations (stock, transitions)  │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  bizledger-db errors (separate crate)                                  │
//! │  ├── DbError          - Entity store failures                          │
//! │  └── LedgerError      - What the HTTP layer sees (code + status)       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError → HTTP response       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every message names the offending identifier (order, item, batch) so an
//! operator can correct the input without reading logs.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by pure domain logic.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Not enough stock on an item tracked without batches.
    ///
    /// ## When This Occurs
    /// - Sale or delivery challan requests more than `stock_quantity`
    /// - Raised before any write, so stock is left unchanged
    #[error("Insufficient stock for item {item_id}: available {available}, requested {requested}")]
    InsufficientStock {
        item_id: String,
        available: f64,
        requested: f64,
    },

    /// Not enough stock in the named batch.
    ///
    /// ## User Workflow
    /// ```text
    /// Sale line: item I0001, batch B-07, qty 5
    ///      │
    ///      ▼
    /// Batch B-07 holds 3
    ///      │
    ///      ▼
    /// InsufficientBatchStock { item_id: "I0001", batch_number: "B-07", available: 3, requested: 5 }
    /// ```
    #[error(
        "Insufficient stock in batch {batch_number} of item {item_id}: available {available}, requested {requested}"
    )]
    InsufficientBatchStock {
        item_id: String,
        batch_number: String,
        available: f64,
        requested: f64,
    },

    /// The order line names a batch the inventory item does not have.
    #[error("Batch {batch_number} not found on item {item_id}")]
    BatchNotFound {
        item_id: String,
        batch_number: String,
    },

    /// A required association is missing for the requested operation.
    ///
    /// ## When This Occurs
    /// - `partial` payment status without an explicit amount
    /// - Sale or delivery challan without a client id and name
    /// - Purchase without a supplier id and name
    #[error("{operation}: missing required {field}")]
    MissingRequiredAssociation { operation: String, field: String },

    /// The order is not in a state that allows the transition.
    #[error("Order {order_id} cannot transition: {reason}")]
    InvalidTransition { order_id: String, reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a MissingRequiredAssociation error.
    pub fn missing(operation: impl Into<String>, field: impl Into<String>) -> Self {
        CoreError::MissingRequiredAssociation {
            operation: operation.into(),
            field: field.into(),
        }
    }

    /// True for the stock and batch errors raised on the sale path.
    pub fn is_stock_error(&self) -> bool {
        matches!(
            self,
            CoreError::InsufficientStock { .. }
                | CoreError::InsufficientBatchStock { .. }
                | CoreError::BatchNotFound { .. }
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised at the boundary, before any side effect.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: f64, max: f64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g. month key, non-finite number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
