//! # Expense Ledger
//!
//! Business expenses, optionally paid out through an employee.
//!
//! ```text
//! create(draft)
//!    │
//!    ├─ employee_paid     Employees/{id}.paid += amount, employees.total_paid
//!    ├─ counters          expenses.total / total_amount
//!    │                    financial_summary.total_expense
//!    │                    {YYYY-MM}.expenses_count / expenses_amount
//!    └─ expense_document  INSERT
//! ```
//!
//! Updates and deletes run the same steps as deltas or reversals. Each
//! operation is a saga, so a failed write leaves balances as they were.
//! The monthly counter is keyed by the expense date.

use std::sync::Arc;

use bizledger_core::counters::{month_key, scope, Contribution};
use bizledger_core::validation::{validate_name, validate_positive, validate_remarks};
use bizledger_core::{collection, CoreResult, CounterDeltas, Expense};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::clock::Clock;
use crate::error::{LedgerError, LedgerResult};
use crate::ids::IdGenerator;
use crate::reconcile::LedgerReconciler;
use crate::saga::{Compensation, Saga};
use crate::store::{get_typed, query_typed, to_document, DocumentStore, Query};

pub mod operation {
    pub const CREATE: &str = "create_expense";
    pub const UPDATE: &str = "update_expense";
    pub const DELETE: &str = "delete_expense";
}

pub mod step {
    pub const EMPLOYEE: &str = "employee_paid";
    pub const COUNTERS: &str = "counters";
    pub const DOCUMENT: &str = "expense_document";
}

const CREATE_STEPS: &[&str] = &[step::EMPLOYEE, step::COUNTERS, step::DOCUMENT];
const UPDATE_STEPS: &[&str] = &[step::DOCUMENT, step::EMPLOYEE, step::COUNTERS];
const DELETE_STEPS: &[&str] = &[step::DOCUMENT, step::EMPLOYEE, step::COUNTERS];

// =============================================================================
// Inputs
// =============================================================================

/// Input for a new expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseDraft {
    pub description: String,
    pub amount: f64,
    #[serde(default)]
    pub category: Option<String>,
    /// Employee id (`E…`) or name.
    #[serde(default)]
    pub employee: Option<String>,
    /// Defaults to now.
    #[serde(default)]
    pub expense_date: Option<DateTime<Utc>>,
}

/// Partial update of an expense. `employee: Some("")` clears the employee.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpensePatch {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub employee: Option<String>,
    #[serde(default)]
    pub expense_date: Option<DateTime<Utc>>,
}

fn validate_expense(expense: &Expense) -> CoreResult<()> {
    validate_name("description", &expense.description)?;
    validate_positive("amount", expense.amount)?;
    if let Some(category) = &expense.category {
        validate_remarks(category)?;
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Contribution of one expense to the counters, as
/// `(expenses scope, financial_summary, month)`.
fn expense_counter_deltas(expense: &Expense, contribution: Contribution) -> [CounterDeltas; 3] {
    let sign = match contribution {
        Contribution::Apply => 1.0,
        Contribution::Revert => -1.0,
    };
    let amount = sign * expense.amount;
    [
        CounterDeltas::new()
            .increment("total", sign)
            .increment("total_amount", amount),
        CounterDeltas::new().increment("total_expense", amount),
        CounterDeltas::new()
            .increment("expenses_count", sign)
            .increment("expenses_amount", amount),
    ]
}

// =============================================================================
// Expense Service
// =============================================================================

#[derive(Debug, Clone)]
pub struct ExpenseService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    ids: IdGenerator,
    ledger: LedgerReconciler,
}

impl ExpenseService {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, ids: IdGenerator) -> Self {
        Self {
            ledger: LedgerReconciler::new(store.clone(), clock.clone()),
            store,
            clock,
            ids,
        }
    }

    async fn begin(&self, operation: &str, expense_id: &str, planned: &[&str]) -> LedgerResult<Saga> {
        Ok(Saga::begin(self.store.clone(), self.clock.clone(), operation, expense_id, planned).await?)
    }

    pub async fn get(&self, id: &str) -> LedgerResult<Expense> {
        get_typed::<Expense>(self.store.as_ref(), collection::EXPENSES, id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Expense", id))
    }

    /// Expenses, newest expense date first.
    pub async fn list(&self, limit: u32, offset: u32) -> LedgerResult<Vec<Expense>> {
        let query = Query::new()
            .order_by("expense_date", true)
            .limit(limit)
            .offset(offset);
        Ok(query_typed(self.store.as_ref(), collection::EXPENSES, &query).await?)
    }

    pub async fn create(&self, draft: ExpenseDraft) -> LedgerResult<Expense> {
        let now = self.clock.now();
        let mut expense = Expense {
            id: String::new(),
            description: draft.description.trim().to_string(),
            amount: draft.amount,
            category: non_blank(draft.category),
            employee: non_blank(draft.employee),
            expense_date: draft.expense_date.unwrap_or(now),
            created_at: now,
            updated_at: now,
        };
        validate_expense(&expense)?;
        expense.id = self.ids.next_id(collection::EXPENSES).await?;

        let mut saga = self.begin(operation::CREATE, &expense.id, CREATE_STEPS).await?;
        let result = self.run_create(&mut saga, &expense).await;
        if let Err(err) = result {
            return Err(saga.abort(err).await);
        }
        saga.complete().await;

        info!(expense_id = %expense.id, amount = expense.amount, employee = ?expense.employee, "Expense recorded");
        Ok(expense)
    }

    async fn run_create(&self, saga: &mut Saga, expense: &Expense) -> LedgerResult<()> {
        self.employee_paid(saga, expense.employee.as_deref(), expense.amount).await?;
        self.counters(saga, expense, Contribution::Apply).await?;

        saga.enter(step::DOCUMENT);
        self.store
            .insert(collection::EXPENSES, &expense.id, to_document(expense)?)
            .await?;
        Ok(())
    }

    pub async fn update(&self, id: &str, patch: ExpensePatch) -> LedgerResult<Expense> {
        let current = self.get(id).await?;
        let mut next = current.clone();
        if let Some(description) = patch.description {
            next.description = description.trim().to_string();
        }
        if let Some(amount) = patch.amount {
            next.amount = amount;
        }
        if let Some(category) = patch.category {
            next.category = non_blank(Some(category));
        }
        if let Some(employee) = patch.employee {
            next.employee = non_blank(Some(employee));
        }
        if let Some(expense_date) = patch.expense_date {
            next.expense_date = expense_date;
        }
        next.updated_at = self.clock.now();
        validate_expense(&next)?;

        let mut saga = self.begin(operation::UPDATE, id, UPDATE_STEPS).await?;
        let result = self.run_update(&mut saga, &current, &next).await;
        if let Err(err) = result {
            return Err(saga.abort(err).await);
        }
        saga.complete().await;

        info!(expense_id = id, amount = next.amount, "Expense updated");
        Ok(next)
    }

    async fn run_update(&self, saga: &mut Saga, current: &Expense, next: &Expense) -> LedgerResult<()> {
        saga.enter(step::DOCUMENT);
        let previous = to_document(current)?;
        self.store
            .set(collection::EXPENSES, &next.id, to_document(next)?)
            .await?;
        saga.journal()
            .record(Compensation::restore(collection::EXPENSES, &next.id, Some(previous)));
        saga.commit_step().await?;

        if current.employee == next.employee {
            self.employee_paid(saga, next.employee.as_deref(), next.amount - current.amount)
                .await?;
        } else {
            self.employee_paid(saga, current.employee.as_deref(), -current.amount)
                .await?;
            self.employee_paid(saga, next.employee.as_deref(), next.amount).await?;
        }

        // Revert-then-apply keeps the month buckets right when the date moves.
        self.counters(saga, current, Contribution::Revert).await?;
        self.counters(saga, next, Contribution::Apply).await?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> LedgerResult<Expense> {
        let expense = self.get(id).await?;

        let mut saga = self.begin(operation::DELETE, id, DELETE_STEPS).await?;
        let result = self.run_delete(&mut saga, &expense).await;
        if let Err(err) = result {
            return Err(saga.abort(err).await);
        }
        saga.complete().await;

        info!(expense_id = id, "Expense deleted");
        Ok(expense)
    }

    async fn run_delete(&self, saga: &mut Saga, expense: &Expense) -> LedgerResult<()> {
        saga.enter(step::DOCUMENT);
        let previous = self.store.delete(collection::EXPENSES, &expense.id).await?;
        saga.journal()
            .record(Compensation::restore(collection::EXPENSES, &expense.id, previous));
        saga.commit_step().await?;

        self.employee_paid(saga, expense.employee.as_deref(), -expense.amount)
            .await?;
        self.counters(saga, expense, Contribution::Revert).await
    }

    async fn employee_paid(&self, saga: &mut Saga, employee: Option<&str>, delta: f64) -> LedgerResult<()> {
        let Some(employee) = employee else {
            return Ok(());
        };
        if delta == 0.0 {
            return Ok(());
        }
        saga.enter(step::EMPLOYEE);
        self.ledger
            .update_employee_paid(employee, delta, saga.journal())
            .await?;
        saga.commit_step().await?;
        Ok(())
    }

    async fn counters(&self, saga: &mut Saga, expense: &Expense, contribution: Contribution) -> LedgerResult<()> {
        let [expenses, financial, monthly] = expense_counter_deltas(expense, contribution);
        saga.enter(step::COUNTERS);
        self.ledger
            .update_aggregate_counters(scope::EXPENSES, expenses, saga.journal())
            .await?;
        self.ledger
            .update_aggregate_counters(scope::FINANCIAL_SUMMARY, financial, saga.journal())
            .await?;
        self.ledger
            .update_monthly_counters(&month_key(expense.expense_date), monthly, saga.journal())
            .await?;
        saga.commit_step().await?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, num};
    use crate::store::testing::FaultyStore;
    use bizledger_core::CoreError;
    use chrono::TimeZone;

    async fn service_on(store: Arc<dyn DocumentStore>) -> ExpenseService {
        fixtures::seed(&store, collection::EMPLOYEES, "E0001", &fixtures::employee("E0001", "Ravi")).await;
        fixtures::seed(&store, collection::EMPLOYEES, "E0002", &fixtures::employee("E0002", "Meena")).await;
        let clock = fixtures::clock();
        ExpenseService::new(store.clone(), clock, IdGenerator::new(store, 4))
    }

    fn fuel(amount: f64, employee: Option<&str>) -> ExpenseDraft {
        ExpenseDraft {
            description: "Fuel".to_string(),
            amount,
            category: Some("Transport".to_string()),
            employee: employee.map(str::to_string),
            expense_date: None,
        }
    }

    #[tokio::test]
    async fn test_create_updates_employee_and_counters() {
        let store = fixtures::memory_store().await;
        let service = service_on(store.clone()).await;

        let expense = service.create(fuel(250.0, Some("Ravi"))).await.unwrap();
        assert_eq!(expense.id, "X0001");
        assert_eq!(service.get("X0001").await.unwrap(), expense);

        assert_eq!(num(&fixtures::doc(&store, collection::EMPLOYEES, "E0001").await, "paid"), 250.0);
        assert_eq!(num(&fixtures::counter(&store, scope::EMPLOYEES).await, "total_paid"), 250.0);
        let expenses = fixtures::counter(&store, scope::EXPENSES).await;
        assert_eq!(num(&expenses, "total"), 1.0);
        assert_eq!(num(&expenses, "total_amount"), 250.0);
        assert_eq!(expenses["last_id"], "X0001");
        assert_eq!(
            num(&fixtures::counter(&store, scope::FINANCIAL_SUMMARY).await, "total_expense"),
            250.0
        );
        let march = fixtures::counter(&store, "2025-03").await;
        assert_eq!(num(&march, "expenses_count"), 1.0);
        assert_eq!(num(&march, "expenses_amount"), 250.0);
    }

    #[tokio::test]
    async fn test_non_positive_amount_is_rejected() {
        let store = fixtures::memory_store().await;
        let service = service_on(store.clone()).await;

        let err = service.create(fuel(0.0, None)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::Validation(_))));
        assert!(store.get(collection::AGGREGATE_COUNTERS, scope::EXPENSES).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_changing_employee_moves_paid_balance() {
        let store = fixtures::memory_store().await;
        let service = service_on(store.clone()).await;
        let expense = service.create(fuel(250.0, Some("E0001"))).await.unwrap();

        service
            .update(
                &expense.id,
                ExpensePatch {
                    amount: Some(300.0),
                    employee: Some("Meena".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(num(&fixtures::doc(&store, collection::EMPLOYEES, "E0001").await, "paid"), 0.0);
        assert_eq!(num(&fixtures::doc(&store, collection::EMPLOYEES, "E0002").await, "paid"), 300.0);
        assert_eq!(num(&fixtures::counter(&store, scope::EMPLOYEES).await, "total_paid"), 300.0);
        let expenses = fixtures::counter(&store, scope::EXPENSES).await;
        assert_eq!(num(&expenses, "total"), 1.0);
        assert_eq!(num(&expenses, "total_amount"), 300.0);
        assert_eq!(num(&fixtures::counter(&store, "2025-03").await, "expenses_count"), 1.0);
    }

    #[tokio::test]
    async fn test_moving_expense_date_moves_month_bucket() {
        let store = fixtures::memory_store().await;
        let service = service_on(store.clone()).await;
        let expense = service.create(fuel(120.0, None)).await.unwrap();

        service
            .update(
                &expense.id,
                ExpensePatch {
                    expense_date: Some(Utc.with_ymd_and_hms(2025, 2, 27, 0, 0, 0).unwrap()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let march = fixtures::counter(&store, "2025-03").await;
        assert_eq!(num(&march, "expenses_count"), 0.0);
        assert_eq!(num(&march, "expenses_amount"), 0.0);
        let february = fixtures::counter(&store, "2025-02").await;
        assert_eq!(num(&february, "expenses_count"), 1.0);
        assert_eq!(num(&february, "expenses_amount"), 120.0);
    }

    #[tokio::test]
    async fn test_delete_reverses_everything() {
        let store = fixtures::memory_store().await;
        let service = service_on(store.clone()).await;
        let expense = service.create(fuel(250.0, Some("Ravi"))).await.unwrap();

        service.delete(&expense.id).await.unwrap();

        assert!(matches!(service.get(&expense.id).await, Err(LedgerError::NotFound { .. })));
        assert_eq!(num(&fixtures::doc(&store, collection::EMPLOYEES, "E0001").await, "paid"), 0.0);
        assert_eq!(num(&fixtures::counter(&store, scope::EXPENSES).await, "total"), 0.0);
        assert_eq!(
            num(&fixtures::counter(&store, scope::FINANCIAL_SUMMARY).await, "total_expense"),
            0.0
        );

        let next = service.create(fuel(10.0, None)).await.unwrap();
        assert_eq!(next.id, "X0002");
    }

    #[tokio::test]
    async fn test_failed_counter_write_rolls_back_employee() {
        let faulty = Arc::new(FaultyStore::new(fixtures::memory_store().await));
        let store: Arc<dyn DocumentStore> = faulty.clone();
        let service = service_on(store.clone()).await;
        faulty.fail_writes(collection::AGGREGATE_COUNTERS, Some(scope::FINANCIAL_SUMMARY));

        let err = service.create(fuel(250.0, Some("Ravi"))).await.unwrap_err();
        faulty.clear();

        assert!(matches!(
            err,
            LedgerError::ReconciliationWriteFailure { ref step, .. } if step == "counters"
        ));
        assert_eq!(num(&fixtures::doc(&store, collection::EMPLOYEES, "E0001").await, "paid"), 0.0);
        assert_eq!(num(&fixtures::counter(&store, scope::EXPENSES).await, "total_amount"), 0.0);
        assert!(store.get(collection::EXPENSES, "X0001").await.unwrap().is_none());
    }
}
