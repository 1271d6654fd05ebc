//! Employee repository. `collected` and `paid` are maintained by the ledger
//! reconciler.

use bizledger_core::{collection, CounterDeltas, Employee};
use chrono::{DateTime, Utc};

use super::{Entity, EntityRepository};

pub type EmployeeRepository = EntityRepository<Employee>;

impl Entity for Employee {
    const COLLECTION: &'static str = collection::EMPLOYEES;
    const ENTITY: &'static str = "Employee";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn stamp(&mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) {
        self.created_at = created_at;
        self.updated_at = updated_at;
    }

    fn balance_deltas(&self) -> CounterDeltas {
        CounterDeltas::new()
            .increment("total_collected", self.collected)
            .increment("total_paid", self.paid)
    }

    fn keep_balances(&mut self, stored: &Self) {
        self.collected = stored.collected;
        self.paid = stored.paid;
    }
}
