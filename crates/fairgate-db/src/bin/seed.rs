//! # Seed Data Generator
//!
//! Populates the database with demo data for development.
//!
//! ## Usage
//! ```bash
//! cargo run -p fairgate-db --bin seed
//!
//! # Specify database path and HMAC secret
//! FAIRGATE_DB=./data/fairgate.db FAIRGATE_POS_SECRET=dev-secret \
//!     cargo run -p fairgate-db --bin seed
//! ```
//!
//! ## Generated Data
//! - One demo terminal with a freshly generated Ed25519 keypair
//!   (the private key is printed once so a dev client can sign handshakes)
//! - Two employees with known PINs (1000001/1234, 1000002/5678)
//! - A small event-stall catalogue with stock
//! - Two coupons (percentage with cap, fixed with minimum purchase)

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use std::env;
use uuid::Uuid;

use fairgate_core::{
    crypto, Coupon, DiscountType, Employee, StockItem, Terminal, TerminalStatus,
};
use fairgate_db::{Database, DbConfig, DbError};

const STOCK: &[(&str, &str, i64, i64)] = &[
    // (name, category, unit_price, quantity)
    ("Anthology Vol.1", "books", 800, 50),
    ("Anthology Vol.2", "books", 800, 50),
    ("Art Collection 2026", "books", 1500, 30),
    ("Acrylic Keychain", "goods", 600, 120),
    ("Holographic Sticker Set", "goods", 400, 200),
    ("B2 Tapestry", "goods", 2500, 15),
    ("Original Soundtrack CD", "music", 1200, 40),
];

#[tokio::main]
async fn main() -> Result<(), DbError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let db_path = env::var("FAIRGATE_DB").unwrap_or_else(|_| "./fairgate.db".to_string());
    let secret =
        env::var("FAIRGATE_POS_SECRET").unwrap_or_else(|_| "dev-secret-change-me".to_string());

    println!("Seeding {db_path}");

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let now = Utc::now();

    // Demo terminal with a throwaway keypair.
    let signing_key = SigningKey::generate(&mut OsRng);
    let terminal_id = Uuid::new_v4().to_string();
    db.terminals()
        .insert(&Terminal {
            terminal_id: terminal_id.clone(),
            public_key: BASE64.encode(signing_key.verifying_key().to_bytes()),
            device_name: "Dev Register".to_string(),
            os_type: "linux".to_string(),
            status: TerminalStatus::Active,
            registered_by: "seed".to_string(),
            registered_at: now,
            revoked_at: None,
            last_seen_at: None,
        })
        .await?;

    println!("  terminal_id:  {terminal_id}");
    println!(
        "  private key:  {} (dev only - sign \"{{terminal_id}}:{{timestamp}}\")",
        BASE64.encode(signing_key.to_bytes())
    );

    // Employees with known PINs.
    for (number, name, pin) in [
        ("1000001", "Dev Cashier", "1234"),
        ("1000002", "Dev Supervisor", "5678"),
    ] {
        db.employees()
            .insert(&Employee {
                employee_number: number.to_string(),
                display_name: name.to_string(),
                pin_hash: crypto::hash_pin(&secret, number, pin),
                publisher_id: None,
                event_id: None,
                active: true,
                created_at: now,
            })
            .await?;
        println!("  employee:     {number} (PIN {pin})");
    }

    // Catalogue.
    for (index, (name, category, unit_price, quantity)) in STOCK.iter().enumerate() {
        db.stock()
            .insert(&StockItem {
                product_id: format!("prod-{:03}", index + 1),
                product_name: name.to_string(),
                category: category.to_string(),
                unit_price: *unit_price,
                stock_quantity: *quantity,
                updated_at: now,
            })
            .await?;
    }
    println!("  stock items:  {}", STOCK.len());

    // Coupons.
    db.coupons()
        .insert(&Coupon {
            coupon_id: Uuid::new_v4().to_string(),
            code: "OPENING10".to_string(),
            name: "Opening day 10% off".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: 10,
            usage_limit: Some(100),
            usage_count: 0,
            min_purchase_amount: None,
            max_discount_amount: Some(500),
            valid_from: None,
            valid_until: None,
            publisher_id: None,
            event_id: None,
            filter_json: None,
            active: true,
            created_at: now,
            updated_at: now,
        })
        .await?;
    db.coupons()
        .insert(&Coupon {
            coupon_id: Uuid::new_v4().to_string(),
            code: "BOOKS300".to_string(),
            name: "300 off book purchases over 1500".to_string(),
            discount_type: DiscountType::Fixed,
            discount_value: 300,
            usage_limit: None,
            usage_count: 0,
            min_purchase_amount: Some(1500),
            max_discount_amount: None,
            valid_from: None,
            valid_until: None,
            publisher_id: None,
            event_id: None,
            filter_json: Some(r#"{"categories":["books"]}"#.to_string()),
            active: true,
            created_at: now,
            updated_at: now,
        })
        .await?;
    println!("  coupons:      OPENING10, BOOKS300");

    db.close().await;
    println!("Done.");
    Ok(())
}
