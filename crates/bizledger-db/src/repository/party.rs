//! # Party Repositories
//!
//! Clients and suppliers. Their due balances are owned by the ledger
//! reconciler; the repository only edits contact details.

use bizledger_core::{collection, Client, CounterDeltas, Supplier};
use chrono::{DateTime, Utc};

use super::{Entity, EntityRepository};

pub type ClientRepository = EntityRepository<Client>;
pub type SupplierRepository = EntityRepository<Supplier>;

impl Entity for Client {
    const COLLECTION: &'static str = collection::CLIENTS;
    const ENTITY: &'static str = "Client";

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
        CounterDeltas::new().increment("total_due", self.due_amount)
    }

    fn keep_balances(&mut self, stored: &Self) {
        self.due_amount = stored.due_amount;
    }
}

impl Entity for Supplier {
    const COLLECTION: &'static str = collection::SUPPLIERS;
    const ENTITY: &'static str = "Supplier";

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
        CounterDeltas::new().increment("total_due", self.due)
    }

    fn keep_balances(&mut self, stored: &Self) {
        self.due = stored.due;
    }
}
