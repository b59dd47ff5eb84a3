//! Transaction records and the queries that read them.
//!
//! This module contains everything related to transactions:
//! - The [TransactionRecord] document wrapper and its table
//! - The rendering of predicates to SQL
//! - The queries used by the listing, report and export endpoints

mod record;
pub(crate) mod sql;
pub(crate) mod store;

pub use record::{
    AMOUNT_FIELD, DATE_FIELD, ID_FIELD, PRODUCT_FIELD, SALE_STATUS, STATUS_FIELD,
    TransactionRecord, VALIDATED_STATUSES, create_transaction_table, insert_transaction,
};
