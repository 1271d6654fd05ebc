//! # Ledger
//!
//! Wires the store, clock and settings into every service the engine
//! exposes. The external HTTP layer holds one `Ledger` and calls into it.
//!
//! ```text
//! LedgerConfig ──► Database ──► Arc<dyn DocumentStore> ─┐
//!                                SystemClock ────────────┤
//!                                LedgerSettings ─────────┤
//!                                                        ▼
//!                                                     Ledger
//!        ┌──────────────┬──────────────┬───────────────┼──────────────┬─────────────┐
//!        ▼              ▼              ▼               ▼              ▼             ▼
//!   coordinator()   clients()     employees()     inventory()    expenses()     stats()
//!                   suppliers()                                   payments()
//! ```

use std::sync::Arc;

use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{LedgerConfig, LedgerSettings};
use crate::coordinator::Coordinator;
use crate::error::LedgerResult;
use crate::expenses::ExpenseService;
use crate::ids::IdGenerator;
use crate::payments::PaymentService;
use crate::pool::{Database, DbConfig};
use crate::repository::{
    ClientRepository, EmployeeRepository, InventoryRepository, SagaRepository, SupplierRepository,
};
use crate::stats::StatsService;
use crate::store::DocumentStore;

#[derive(Debug, Clone)]
pub struct Ledger {
    database: Option<Database>,
    store: Arc<dyn DocumentStore>,
    settings: LedgerSettings,
    coordinator: Coordinator,
    clients: ClientRepository,
    suppliers: SupplierRepository,
    employees: EmployeeRepository,
    inventory: InventoryRepository,
    expenses: ExpenseService,
    payments: PaymentService,
    sagas: SagaRepository,
    stats: StatsService,
}

impl Ledger {
    /// Builds the services over an existing store.
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, settings: LedgerSettings) -> Self {
        let ids = IdGenerator::new(store.clone(), settings.id_width);
        Self {
            database: None,
            coordinator: Coordinator::new(store.clone(), clock.clone(), settings.clone()),
            clients: ClientRepository::new(store.clone(), clock.clone(), ids.clone()),
            suppliers: SupplierRepository::new(store.clone(), clock.clone(), ids.clone()),
            employees: EmployeeRepository::new(store.clone(), clock.clone(), ids.clone()),
            inventory: InventoryRepository::new(store.clone(), clock.clone(), ids.clone()),
            expenses: ExpenseService::new(store.clone(), clock.clone(), ids.clone()),
            payments: PaymentService::new(store.clone(), clock, ids),
            sagas: SagaRepository::new(store.clone()),
            stats: StatsService::new(store.clone()),
            store,
            settings,
        }
    }

    /// Opens the configured database and rolls back sagas a previous
    /// process left open.
    pub async fn open(config: &LedgerConfig) -> LedgerResult<Self> {
        config.validate()?;
        Self::open_with(config.db_config()?, config.settings()).await
    }

    /// A fresh in-memory ledger with default settings.
    pub async fn in_memory() -> LedgerResult<Self> {
        Self::open_with(DbConfig::in_memory(), LedgerSettings::default()).await
    }

    async fn open_with(db_config: DbConfig, settings: LedgerSettings) -> LedgerResult<Self> {
        let database = Database::new(db_config).await?;
        let mut ledger = Self::new(database.store(), Arc::new(SystemClock), settings);
        ledger.database = Some(database);

        let recovered = ledger.coordinator.recover_incomplete().await?;
        if !recovered.is_empty() {
            warn!(count = recovered.len(), "Rolled back incomplete sagas from a previous run");
        }
        info!("Ledger ready");
        Ok(ledger)
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn clients(&self) -> &ClientRepository {
        &self.clients
    }

    pub fn suppliers(&self) -> &SupplierRepository {
        &self.suppliers
    }

    pub fn employees(&self) -> &EmployeeRepository {
        &self.employees
    }

    pub fn inventory(&self) -> &InventoryRepository {
        &self.inventory
    }

    pub fn expenses(&self) -> &ExpenseService {
        &self.expenses
    }

    pub fn payments(&self) -> &PaymentService {
        &self.payments
    }

    pub fn sagas(&self) -> &SagaRepository {
        &self.sagas
    }

    pub fn stats(&self) -> &StatsService {
        &self.stats
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    /// The database when this ledger opened one itself.
    pub fn database(&self) -> Option<&Database> {
        self.database.as_ref()
    }

    /// Closes the pool when the ledger owns one.
    pub async fn close(&self) {
        if let Some(database) = &self.database {
            database.close().await;
        }
    }
}
