//! # Dashboard Statistics
//!
//! Read-only views over `AggregateCounters`. Counter documents are the
//! source of truth: nothing here scans orders or expenses.
//!
//! ```text
//! AggregateCounters/orders             ─┐
//! AggregateCounters/clients|suppliers   │
//! AggregateCounters/employees|items     ├──► OverallStats
//! AggregateCounters/expenses            │
//! AggregateCounters/financial_summary  ─┘──► FinancialSummary
//! AggregateCounters/{YYYY-MM}          ────► MonthlyStats, available_months
//! ```
//!
//! Counters that were never written read as zero.

use std::sync::Arc;

use bizledger_core::collection;
use bizledger_core::counters::{is_month_key, scope};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::error::{LedgerError, LedgerResult};
use crate::store::{get_typed, DocumentStore, Query};

// =============================================================================
// Views
// =============================================================================

/// Count and amount of one order type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct TypeTotals {
    pub count: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct OrderStats {
    pub total: f64,
    pub total_sales: TypeTotals,
    pub total_purchase: TypeTotals,
    pub delivery_challan: TypeTotals,
    /// Amount received on sales and delivery challans.
    pub total_revenue: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct PartyStats {
    pub total: f64,
    pub total_due: f64,
    pub total_orders: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct EmployeeStats {
    pub total: f64,
    pub total_collected: f64,
    pub total_paid: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct ItemStats {
    pub total: f64,
    pub total_stock: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct ExpenseStats {
    pub total: f64,
    pub total_amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct FinancialSummary {
    pub total_income: f64,
    pub total_expense: f64,
}

impl FinancialSummary {
    pub fn net(&self) -> f64 {
        self.total_income - self.total_expense
    }
}

/// Everything on the dashboard's overview page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OverallStats {
    pub orders: OrderStats,
    pub clients: PartyStats,
    pub suppliers: PartyStats,
    pub employees: EmployeeStats,
    pub items: ItemStats,
    pub expenses: ExpenseStats,
    pub financial: FinancialSummary,
}

/// One `YYYY-MM` counter document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct MonthlyStats {
    pub month: String,
    pub sales_orders_count: f64,
    pub sales_orders_amount: f64,
    pub sales_orders_paid: f64,
    pub purchase_orders_count: f64,
    pub purchase_orders_amount: f64,
    pub purchase_orders_paid: f64,
    pub delivery_challan_count: f64,
    pub delivery_challan_amount: f64,
    pub delivery_challan_paid: f64,
    pub expenses_count: f64,
    pub expenses_amount: f64,
}

// =============================================================================
// Stats Service
// =============================================================================

#[derive(Debug, Clone)]
pub struct StatsService {
    store: Arc<dyn DocumentStore>,
}

impl StatsService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn counter<T: DeserializeOwned + Default>(&self, scope: &str) -> LedgerResult<T> {
        Ok(get_typed(self.store.as_ref(), collection::AGGREGATE_COUNTERS, scope)
            .await?
            .unwrap_or_default())
    }

    /// Counters for one month. A month with no activity is `NotFound`.
    pub async fn monthly_stats(&self, month: &str) -> LedgerResult<MonthlyStats> {
        if !is_month_key(month) {
            return Err(LedgerError::not_found("MonthlyStats", month));
        }
        let mut stats: MonthlyStats = get_typed(self.store.as_ref(), collection::AGGREGATE_COUNTERS, month)
            .await?
            .ok_or_else(|| LedgerError::not_found("MonthlyStats", month))?;
        stats.month = month.to_string();
        Ok(stats)
    }

    pub async fn overall_stats(&self) -> LedgerResult<OverallStats> {
        Ok(OverallStats {
            orders: self.counter(scope::ORDERS).await?,
            clients: self.counter(scope::CLIENTS).await?,
            suppliers: self.counter(scope::SUPPLIERS).await?,
            employees: self.counter(scope::EMPLOYEES).await?,
            items: self.counter(scope::ITEMS).await?,
            expenses: self.counter(scope::EXPENSES).await?,
            financial: self.financial_summary().await?,
        })
    }

    pub async fn financial_summary(&self) -> LedgerResult<FinancialSummary> {
        self.counter(scope::FINANCIAL_SUMMARY).await
    }

    /// Months with a counter document, newest first.
    pub async fn available_months(&self) -> LedgerResult<Vec<String>> {
        let query = Query::new().order_by("month", true);
        let counters = self
            .store
            .query(collection::AGGREGATE_COUNTERS, &query)
            .await?;

        Ok(counters
            .iter()
            .filter_map(|doc| doc.get("month").and_then(Value::as_str))
            .filter(|key| is_month_key(key))
            .map(str::to_string)
            .collect())
    }
}
