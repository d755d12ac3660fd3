//! # Seed Data Generator
//!
//! Populates the database with a demo organisation for development.
//!
//! ## Usage
//! ```bash
//! # Seed the default database file
//! cargo run -p merca-db --bin seed
//!
//! # Specify database path
//! cargo run -p merca-db --bin seed -- --db ./var/merca.db
//! ```
//!
//! ## Generated Data
//! - One organisation ("Acme Wholesale", 21% tax, €5.00 shipping)
//! - Three wholesale customers
//! - A small product catalog (flour, sugar, yeast, oil, salt)
//! - One discount rule of every family:
//!   - a product sale on flour (10% off from 5 bags)
//!   - a fixed special price for one customer on flour
//!   - a stackable customer tier discount (5%)
//!   - two order tiers (2% over €250, 5% over €500)
//! - A placed demo order showing the pricing waterfall

use chrono::{NaiveDate, Utc};
use std::env;
use uuid::Uuid;

use merca_core::{
    Currency, Customer, CustomerDiscount, CustomerProductDiscount, DiscountTerms, DiscountValue,
    Money, OrderDiscount, Organisation, Product, ProductDiscount, Rate, ValidityWindow,
};
use merca_db::{Database, DbConfig};

/// Catalog entries: (sku, name, price in cents, minimum order quantity)
const PRODUCTS: &[(&str, &str, i64, i64)] = &[
    ("FLOUR-25", "Wheat Flour 25kg", 1850, 5),
    ("SUGAR-25", "Granulated Sugar 25kg", 2200, 5),
    ("YEAST-01", "Fresh Yeast 1kg", 450, 1),
    ("OIL-10", "Sunflower Oil 10L", 2950, 1),
    ("SALT-25", "Sea Salt 25kg", 980, 1),
];

const CUSTOMERS: &[&str] = &["Bakkerij Jansen", "Restaurant De Gouden Leeuw", "Hotel Zeezicht"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./merca_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Merca Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./merca_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Merca Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!();

    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let catalog = db.catalog();
    let now = Utc::now();

    let organisation = Organisation {
        id: Uuid::new_v4().to_string(),
        name: "Acme Wholesale".to_string(),
        slug: "acme".to_string(),
        currency: Currency::Eur,
        tax_rate_bps: 2100,
        shipping_cost_cents: 500,
        created_at: now,
        updated_at: now,
    };
    catalog.insert_organisation(&organisation).await?;
    println!("✓ Organisation: {} ({})", organisation.name, organisation.slug);

    let mut customers = Vec::new();
    for company_name in CUSTOMERS {
        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            organisation_id: organisation.id.clone(),
            company_name: company_name.to_string(),
            active: true,
            created_at: now,
            updated_at: now,
        };
        catalog.insert_customer(&customer).await?;
        customers.push(customer);
    }
    println!("✓ Customers: {}", customers.len());

    let mut products = Vec::new();
    for (sku, name, price_cents, min_order_quantity) in PRODUCTS {
        let product = Product {
            id: Uuid::new_v4().to_string(),
            organisation_id: organisation.id.clone(),
            sku: sku.to_string(),
            name: name.to_string(),
            description: None,
            price_cents: *price_cents,
            currency: organisation.currency,
            min_order_quantity: *min_order_quantity,
            active: true,
            created_at: now,
            updated_at: now,
        };
        catalog.insert_product(&product).await?;
        products.push(product);
    }
    println!("✓ Products: {}", products.len());

    let rules = db.rules();
    let flour = &products[0];
    let bakery = &customers[0];
    let season_end = NaiveDate::from_ymd_opt(2026, 12, 31).ok_or("bad date")?;

    rules
        .create_product_discount(&ProductDiscount {
            id: Uuid::new_v4().to_string(),
            organisation_id: organisation.id.clone(),
            product_id: flour.id.clone(),
            min_quantity: 5,
            terms: DiscountTerms {
                value: DiscountValue::Percentage(Rate::from_bps(1000)),
                window: ValidityWindow::new(None, Some(season_end)),
                stackable: false,
                active: true,
            },
            created_at: now,
            updated_at: now,
        })
        .await?;

    rules
        .create_customer_product_discount(
            &CustomerProductDiscount {
                id: Uuid::new_v4().to_string(),
                organisation_id: organisation.id.clone(),
                customer_id: bakery.id.clone(),
                product_id: flour.id.clone(),
                terms: DiscountTerms {
                    value: DiscountValue::Fixed(Money::eur(200)),
                    window: ValidityWindow::new(None, Some(season_end)),
                    stackable: false,
                    active: true,
                },
                created_at: now,
                updated_at: now,
            },
            Utc::now().date_naive(),
        )
        .await?;

    rules
        .create_customer_discount(&CustomerDiscount {
            id: Uuid::new_v4().to_string(),
            organisation_id: organisation.id.clone(),
            customer_id: bakery.id.clone(),
            terms: DiscountTerms {
                value: DiscountValue::Percentage(Rate::from_bps(500)),
                window: ValidityWindow::perpetual(),
                stackable: true,
                active: true,
            },
            created_at: now,
            updated_at: now,
        })
        .await?;

    for (min_cents, bps) in [(25_000_i64, 200_u32), (50_000, 500)] {
        rules
            .create_order_discount(&OrderDiscount {
                id: Uuid::new_v4().to_string(),
                organisation_id: organisation.id.clone(),
                min_order_amount: Money::eur(min_cents),
                terms: DiscountTerms {
                    value: DiscountValue::Percentage(Rate::from_bps(bps)),
                    window: ValidityWindow::perpetual(),
                    stackable: false,
                    active: true,
                },
                created_at: now,
                updated_at: now,
            })
            .await?;
    }
    println!("✓ Discount rules: 5 (product, customer-product, customer, 2 order tiers)");

    // Build and place a demo order for the bakery
    let orders = db.orders();
    let today = Utc::now().date_naive();

    let cart = orders.current_cart(&organisation.id, &bakery.id).await?;
    orders.add_item(&cart.id, &flour.id, 10, today).await?;
    orders.add_item(&cart.id, &products[1].id, 5, today).await?;
    let placed = orders.place(&cart.id, today).await?;

    println!();
    println!("✓ Demo order {} placed", placed.order_number);
    println!("  Subtotal: {}", placed.subtotal);
    if let Some(auto) = &placed.auto_discount {
        println!("  Order discount: -{}", auto.amount);
    }
    println!("  Tax:      {}", placed.tax_amount);
    println!("  Shipping: {}", placed.shipping_amount);
    println!("  Total:    {}", placed.total);

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
