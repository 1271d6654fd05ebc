//! # Seed Data Generator
//!
//! Populates a ledger with demo parties, stock, orders and expenses.
//!
//! ## Usage
//! ```bash
//! # 50 sales orders (default)
//! cargo run -p bizledger-db --bin seed
//!
//! # Custom amount and database path
//! cargo run -p bizledger-db --bin seed -- --orders 500 --db ./data/bizledger.db
//!
//! # More logging
//! RUST_LOG=debug cargo run -p bizledger-db --bin seed
//! ```
//!
//! ## Generated Data
//! - Clients, suppliers and employees from fixed name lists
//! - One inventory item per product, stocked by an opening purchase
//! - Sales orders cycling through clients, products and payment states
//! - A delivery challan per employee, collected by that employee
//! - A few expenses paid out through employees

use std::env;

use bizledger_core::{
    Batch, Client, DiscountType, Employee, InventoryItem, OrderDraft, OrderItem, OrderStatus,
    Party, PartyRef, PaymentStatus, Supplier,
};
use bizledger_db::{ExpenseDraft, Ledger, LedgerConfig, PaymentDraft};
use chrono::Utc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CLIENTS: &[&str] = &[
    "Acme Traders",
    "Bharat Stores",
    "City Pharmacy",
    "Deccan Wholesale",
    "Eastern Medicals",
];

const SUPPLIERS: &[&str] = &["Medico Distributors", "Prime Pharma"];

const EMPLOYEES: &[&str] = &["Ravi", "Meena", "Arjun"];

/// (name, category, unit price)
const PRODUCTS: &[(&str, &str, f64)] = &[
    ("Paracetamol 500mg", "Tablets", 12.5),
    ("Amoxicillin 250mg", "Capsules", 48.0),
    ("Cough Syrup 100ml", "Syrups", 85.0),
    ("Vitamin C 500mg", "Tablets", 30.0),
    ("Antiseptic Liquid 500ml", "Liquids", 120.0),
    ("Bandage Roll", "Surgical", 25.0),
];

const OPENING_STOCK: f64 = 500.0;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,bizledger=debug,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut orders: usize = 50;
    let mut db_path = String::from("./bizledger_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--orders" | "-n" => {
                if i + 1 < args.len() {
                    orders = args[i + 1].parse().unwrap_or(50);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("BizLedger Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -n, --orders <N>   Number of sales orders to generate (default: 50)");
                println!("  -d, --db <PATH>    Database file path (default: ./bizledger_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = LedgerConfig::default();
    config.database.path = Some(db_path.into());
    let ledger = Ledger::open(&config).await?;

    if !ledger.clients().list(1, 0).await?.is_empty() {
        warn!("Ledger already has clients, skipping seed (delete the database file to regenerate)");
        return Ok(());
    }

    let start = std::time::Instant::now();

    // Parties
    let mut clients = Vec::new();
    for name in CLIENTS {
        clients.push(ledger.clients().create(client(name)).await?);
    }
    let mut suppliers = Vec::new();
    for name in SUPPLIERS {
        suppliers.push(ledger.suppliers().create(supplier(name)).await?);
    }
    for name in EMPLOYEES {
        ledger.employees().create(employee(name)).await?;
    }
    info!(clients = clients.len(), suppliers = suppliers.len(), employees = EMPLOYEES.len(), "Parties created");

    // Items, stocked by one opening purchase per supplier
    let mut items = Vec::new();
    for (name, category, price) in PRODUCTS {
        items.push(ledger.inventory().create(item(name, category, *price)).await?);
    }
    for (index, supplier) in suppliers.iter().enumerate() {
        let lines = items
            .iter()
            .skip(index)
            .step_by(suppliers.len())
            .map(|item| line(item, Some(&batch_number(&item.id)), OPENING_STOCK, item.price.unwrap_or(1.0) * 0.6))
            .collect();
        let purchase = draft(
            format!("PO-{:03}", index + 1),
            Party::Purchase {
                supplier: PartyRef::new(&supplier.id, &supplier.name),
            },
            lines,
            PaymentStatus::Partial,
            0.0,
        );
        ledger.coordinator().create(purchase, "seed").await?;
    }

    // Sales
    let mut created = 0;
    for n in 0..orders {
        let client = &clients[n % clients.len()];
        let item = &items[n % items.len()];
        let quantity = (1 + n % 7) as f64;
        let total = quantity * item.price.unwrap_or(1.0);
        let (status, paid) = match n % 3 {
            0 => (PaymentStatus::Paid, total),
            1 => (PaymentStatus::Partial, (total / 2.0).round()),
            _ => (PaymentStatus::Pending, 0.0),
        };
        let sale = draft(
            format!("INV-{:05}", n + 1),
            Party::Sale {
                client: PartyRef::new(&client.id, &client.name),
            },
            vec![line(item, Some(&batch_number(&item.id)), quantity, item.price.unwrap_or(1.0))],
            status,
            paid,
        );
        if let Err(e) = ledger.coordinator().create(sale, "seed").await {
            warn!(order = n + 1, error = %e, "Failed to create sale");
            continue;
        }
        created += 1;
    }

    // Delivery challans, one per employee
    for (index, collector) in EMPLOYEES.iter().enumerate() {
        let client = &clients[index % clients.len()];
        let item = &items[index % items.len()];
        let total = 10.0 * item.price.unwrap_or(1.0);
        let challan = draft(
            format!("DC-{:03}", index + 1),
            Party::DeliveryChallan {
                client: PartyRef::new(&client.id, &client.name),
                amount_collected_by: Some(collector.to_string()),
                link: None,
            },
            vec![line(item, Some(&batch_number(&item.id)), 10.0, item.price.unwrap_or(1.0))],
            PaymentStatus::Paid,
            total,
        );
        ledger.coordinator().create(challan, "seed").await?;
    }

    // Expenses
    for (index, (description, amount)) in [("Fuel", 1500.0), ("Courier", 420.0), ("Office rent", 18000.0)]
        .into_iter()
        .enumerate()
    {
        ledger
            .expenses()
            .create(ExpenseDraft {
                description: description.to_string(),
                amount,
                category: None,
                employee: Some(EMPLOYEES[index % EMPLOYEES.len()].to_string()),
                expense_date: None,
            })
            .await?;
    }

    // Settlements: half of each supplier's opening balance, a quarter of each client's
    for supplier in &suppliers {
        let amount = (ledger.suppliers().require(&supplier.id).await?.due / 2.0).round();
        if amount > 0.0 {
            ledger
                .payments()
                .record_supplier_payment(settlement(&supplier.id, amount), "seed")
                .await?;
        }
    }
    for client in &clients {
        let amount = (ledger.clients().require(&client.id).await?.due_amount / 4.0).round();
        if amount > 0.0 {
            ledger
                .payments()
                .record_client_payment(settlement(&client.id, amount), "seed")
                .await?;
        }
    }

    let stats = ledger.stats().overall_stats().await?;
    info!(
        sales = created,
        elapsed = ?start.elapsed(),
        revenue = stats.orders.total_revenue,
        client_due = stats.clients.total_due,
        supplier_due = stats.suppliers.total_due,
        stock = stats.items.total_stock,
        net = stats.financial.net(),
        "Seed complete"
    );
    for month in ledger.stats().available_months().await? {
        let monthly = ledger.stats().monthly_stats(&month).await?;
        info!(
            month = %month,
            sales = monthly.sales_orders_count,
            sales_amount = monthly.sales_orders_amount,
            expenses = monthly.expenses_amount,
            "Monthly totals"
        );
    }

    if let Some(database) = ledger.database() {
        for (collection, count) in database.document_counts().await? {
            info!(collection = %collection, count, "Stored documents");
        }
    }

    ledger.close().await;
    Ok(())
}

fn batch_number(item_id: &str) -> String {
    format!("B-{item_id}")
}

fn client(name: &str) -> Client {
    let now = Utc::now();
    Client {
        id: String::new(),
        name: name.to_string(),
        pan: None,
        gst: None,
        poc_name: None,
        poc_contact: None,
        address: None,
        due_amount: 0.0,
        created_at: now,
        updated_at: now,
    }
}

fn supplier(name: &str) -> Supplier {
    let now = Utc::now();
    Supplier {
        id: String::new(),
        name: name.to_string(),
        contact: None,
        address: None,
        due: 0.0,
        created_at: now,
        updated_at: now,
    }
}

fn employee(name: &str) -> Employee {
    let now = Utc::now();
    Employee {
        id: String::new(),
        name: name.to_string(),
        phone: None,
        collected: 0.0,
        paid: 0.0,
        created_at: now,
        updated_at: now,
    }
}

/// An empty item; the opening purchase brings the stock in.
fn item(name: &str, category: &str, price: f64) -> InventoryItem {
    let now = Utc::now();
    InventoryItem {
        id: String::new(),
        name: name.to_string(),
        category: category.to_string(),
        stock_quantity: 0.0,
        low_stock_threshold: 20.0,
        batches: Vec::<Batch>::new(),
        price: Some(price),
        created_at: now,
        updated_at: now,
    }
}

fn line(item: &InventoryItem, batch: Option<&str>, quantity: f64, price: f64) -> OrderItem {
    OrderItem {
        item_id: item.id.clone(),
        item_name: item.name.clone(),
        batch_number: batch.map(str::to_string),
        expiry: Some("2027-12".to_string()),
        quantity,
        price,
        tax: 0.0,
        discount: 0.0,
        category: Some(item.category.clone()),
    }
}

fn draft(id: String, party: Party, items: Vec<OrderItem>, payment_status: PaymentStatus, amount_paid: f64) -> OrderDraft {
    OrderDraft {
        id,
        party,
        items,
        discount: 0.0,
        discount_type: DiscountType::Fixed,
        total_amount: None,
        amount_paid,
        payment_status,
        payment_method: Some("cash".to_string()),
        status: OrderStatus::Completed,
        draft: false,
        order_date: None,
        remarks: None,
    }
}

fn settlement(party_id: &str, amount: f64) -> PaymentDraft {
    PaymentDraft {
        party_id: party_id.to_string(),
        amount,
        method: Some("bank transfer".to_string()),
        reference: None,
        date: None,
    }
}
