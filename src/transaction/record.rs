//! The transaction document and its table.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Error;

/// The unique identifier of a transaction document.
pub const ID_FIELD: &str = "tran_id";
/// The free-text state of a transaction.
pub const STATUS_FIELD: &str = "status";
/// The amount summed by every report.
pub const AMOUNT_FIELD: &str = "currency_amount";
/// The field products are grouped by.
pub const PRODUCT_FIELD: &str = "ProductName";
/// The date every date filter and time series uses, formatted `YYYY-MM-DD HH:MM:SS`.
pub const DATE_FIELD: &str = "tran_date";
/// The status of a completed sale.
pub const SALE_STATUS: &str = "VALID";
/// The statuses matched by `isValidated`.
pub const VALIDATED_STATUSES: [&str; 2] = ["valid", "validated"];

/// A transaction as stored: an opaque JSON object with a string `tran_id`.
///
/// Apart from the fields named by the constants in this module, the contents are never
/// interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct TransactionRecord {
    tran_id: String,
    document: Map<String, Value>,
}

impl TransactionRecord {
    /// Wrap a JSON object as a transaction record.
    ///
    /// # Errors
    /// Returns [Error::InvalidField] if the object has no non-empty string `tran_id`.
    pub fn new(document: Map<String, Value>) -> Result<Self, Error> {
        let tran_id = match document.get(ID_FIELD) {
            Some(Value::String(tran_id)) if !tran_id.is_empty() => tran_id.clone(),
            _ => {
                return Err(Error::InvalidField(format!(
                    "transaction documents need a non-empty string \"{ID_FIELD}\""
                )));
            }
        };

        Ok(Self { tran_id, document })
    }

    /// Wrap any JSON value, failing if it is not an object with a `tran_id`.
    pub fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Object(document) => Self::new(document),
            other => Err(Error::InvalidField(format!(
                "transaction documents must be JSON objects, got {other}"
            ))),
        }
    }

    /// The unique identifier.
    pub fn tran_id(&self) -> &str {
        &self.tran_id
    }

    /// The top-level fields in document order.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.document
    }

    /// The value of a top-level field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.document.get(field)
    }
}

impl TryFrom<Map<String, Value>> for TransactionRecord {
    type Error = Error;

    fn try_from(value: Map<String, Value>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TransactionRecord> for Map<String, Value> {
    fn from(value: TransactionRecord) -> Self {
        value.document
    }
}

/// Create the transaction table and its indices.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY,
                tran_id TEXT NOT NULL UNIQUE,
                document TEXT NOT NULL CHECK (json_valid(document))
                );
        CREATE INDEX IF NOT EXISTS idx_transaction_tran_date
            ON \"transaction\"(json_extract(document, '$.tran_date'));
        CREATE INDEX IF NOT EXISTS idx_transaction_status
            ON \"transaction\"(json_extract(document, '$.status'));",
    )
}

/// Insert a transaction document.
///
/// Documents are written by the payment collaborator in production; this is used for seeding
/// databases and in tests.
///
/// # Errors
///
/// Returns a [Error::SqlError] if the `tran_id` already exists or another SQL error occurred.
pub fn insert_transaction(record: &TransactionRecord, connection: &Connection) -> Result<(), Error> {
    let document = serde_json::to_string(record.fields())?;

    connection.execute(
        "INSERT INTO \"transaction\" (tran_id, document) VALUES (?1, ?2)",
        (record.tran_id(), document),
    )?;

    Ok(())
}
