use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use serde_json::json;
use time::{Date, Duration, macros::date, macros::format_description};

use salesboard_rs::{
    PasswordHash, ValidatedPassword, initialize_db,
    transaction::{TransactionRecord, insert_transaction},
    user::{DEFAULT_ROLE, NewUser, create_user},
};

/// The password of the seeded test user.
const TEST_PASSWORD: &str = "test123";

const PRODUCTS: [(&str, f64); 5] = [
    ("Premium Plan", 1200.0),
    ("Basic Plan", 300.0),
    ("Add-on Storage", 150.0),
    ("Consulting Hour", 800.0),
    ("Gift Card", 500.0),
];

const STATUSES: [&str; 4] = ["VALID", "VALID", "FAILED", "PENDING"];

const GATEWAYS: [&str; 3] = ["visa", "bkash", "nagad"];

/// A utility for creating a test database for the reporting API of salesboard_rs.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,

    /// The number of sample transactions to create.
    #[arg(long, default_value_t = 200)]
    transactions: u32,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        Some(extension) if !extension.is_empty() => {}
        _ => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let mut conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating test user...");

    let password_hash = PasswordHash::new(
        ValidatedPassword::new(TEST_PASSWORD)?,
        PasswordHash::DEFAULT_COST,
    )?;

    create_user(
        NewUser {
            name: "Test User".to_owned(),
            email: "test@example.com".to_owned(),
            phone: "01700000000".to_owned(),
            company: "Example Ltd".to_owned(),
            role: DEFAULT_ROLE.to_owned(),
            comment: None,
            password_hash,
        },
        &conn,
    )?;

    println!("Log in with phone 01700000000 and password {TEST_PASSWORD}");

    println!("Creating {} sample transactions...", args.transactions);

    let transaction = conn.transaction()?;
    for index in 0..args.transactions {
        insert_transaction(&sample_transaction(index, date!(2024 - 01 - 01))?, &transaction)?;
    }
    transaction.commit()?;

    println!("Success!");

    Ok(())
}

fn sample_transaction(index: u32, first_day: Date) -> Result<TransactionRecord, Box<dyn Error>> {
    let index_usize = index as usize;
    let (product, price) = PRODUCTS[index_usize % PRODUCTS.len()];
    let day = first_day + Duration::days(i64::from(index / 4));
    let hour = 8 + index % 12;

    let tran_date = format!(
        "{} {hour:02}:{:02}:00",
        day.format(format_description!("[year]-[month]-[day]"))?,
        (index * 7) % 60
    );

    let document = json!({
        "tran_id": format!("TXN{index:06}"),
        "tran_date": tran_date,
        "status": STATUSES[index_usize % STATUSES.len()],
        "currency_amount": price,
        "store_amount": price * 0.97,
        "ProductName": product,
        "Name": format!("Customer {}", index % 17),
        "Email": format!("customer{}@example.com", index % 17),
        "gw": GATEWAYS[index_usize % GATEWAYS.len()],
        "Approval": index % 5 != 0,
    });

    Ok(TransactionRecord::from_value(document)?)
}
