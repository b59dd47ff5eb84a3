//! Creates the application's database schema.

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};

use crate::{
    Error,
    transaction::{create_transaction_table, sql::register_functions},
    user::create_user_table,
};

/// Create the tables and indices for the domain models if they do not exist yet, and register
/// the SQL functions that transaction queries use on `connection`.
///
/// # Errors
/// Returns an error if any table could not be created, in which case no table is created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_transaction_table(&transaction)?;

    transaction.commit()?;

    register_functions(connection)?;

    Ok(())
}
