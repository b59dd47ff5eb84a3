#![allow(missing_docs)]

use rusqlite::Connection;
use serde_json::Value;

use crate::{
    db::initialize,
    transaction::{TransactionRecord, insert_transaction},
};

#[track_caller]
pub(crate) fn get_test_connection() -> Connection {
    let connection =
        Connection::open_in_memory().expect("Could not open in-memory SQLite database");
    initialize(&connection).expect("Could not initialize database");

    connection
}

#[track_caller]
pub(crate) fn insert_documents(connection: &Connection, documents: &[Value]) {
    for document in documents {
        let record = TransactionRecord::from_value(document.clone())
            .expect("Test documents need a tran_id");
        insert_transaction(&record, connection).expect("Could not insert test document");
    }
}
