//! Shared test fixtures: in-memory store, fixed clock and seed documents.

use std::sync::Arc;

use bizledger_core::{collection, Batch, Client, Employee, InventoryItem, OrderItem, Supplier};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::clock::FixedClock;
use crate::pool::{Database, DbConfig};
use crate::store::patch::get_number;
use crate::store::{to_document, DocumentStore};

pub async fn memory_store() -> Arc<dyn DocumentStore> {
    Database::new(DbConfig::in_memory())
        .await
        .expect("in-memory database")
        .store()
}

pub fn march_15() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 15, 10, 30, 0).unwrap()
}

pub fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(march_15()))
}

pub fn item(id: &str, stock: f64, batches: &[(&str, f64)]) -> InventoryItem {
    InventoryItem {
        id: id.to_string(),
        name: format!("Item {id}"),
        category: "General".to_string(),
        stock_quantity: stock,
        low_stock_threshold: 10.0,
        batches: batches
            .iter()
            .map(|(number, quantity)| Batch {
                batch_number: number.to_string(),
                expiry: Some("2027-01".to_string()),
                quantity: *quantity,
            })
            .collect(),
        price: Some(10.0),
        created_at: march_15(),
        updated_at: march_15(),
    }
}

pub fn line(item_id: &str, batch: Option<&str>, quantity: f64, price: f64) -> OrderItem {
    OrderItem {
        item_id: item_id.to_string(),
        item_name: format!("Item {item_id}"),
        batch_number: batch.map(str::to_string),
        expiry: None,
        quantity,
        price,
        tax: 0.0,
        discount: 0.0,
        category: None,
    }
}

pub fn client(id: &str, name: &str) -> Client {
    Client {
        id: id.to_string(),
        name: name.to_string(),
        pan: None,
        gst: None,
        poc_name: None,
        poc_contact: None,
        address: None,
        due_amount: 0.0,
        created_at: march_15(),
        updated_at: march_15(),
    }
}

pub fn supplier(id: &str, name: &str) -> Supplier {
    Supplier {
        id: id.to_string(),
        name: name.to_string(),
        contact: None,
        address: None,
        due: 0.0,
        created_at: march_15(),
        updated_at: march_15(),
    }
}

pub fn employee(id: &str, name: &str) -> Employee {
    Employee {
        id: id.to_string(),
        name: name.to_string(),
        phone: None,
        collected: 0.0,
        paid: 0.0,
        created_at: march_15(),
        updated_at: march_15(),
    }
}

pub async fn seed<T: Serialize>(store: &Arc<dyn DocumentStore>, collection: &str, id: &str, value: &T) {
    store
        .set(collection, id, to_document(value).unwrap())
        .await
        .unwrap();
}

pub async fn seed_item(store: &Arc<dyn DocumentStore>, item: InventoryItem) {
    let id = item.id.clone();
    seed(store, collection::INVENTORY_ITEMS, &id, &item).await;
}

/// Counter document for `scope`, or `{}` when it was never written.
pub async fn counter(store: &Arc<dyn DocumentStore>, scope: &str) -> Value {
    store
        .get(collection::AGGREGATE_COUNTERS, scope)
        .await
        .unwrap()
        .unwrap_or_else(|| json!({}))
}

pub async fn doc(store: &Arc<dyn DocumentStore>, collection: &str, id: &str) -> Value {
    store
        .get(collection, id)
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("{collection}/{id} missing"))
}

pub fn num(doc: &Value, path: &str) -> f64 {
    get_number(doc, path)
}
