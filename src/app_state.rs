//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{Error, db::initialize, pagination::PaginationConfig};

/// The config for streaming exports.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// The number of records read from the database per batch.
    pub batch_size: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { batch_size: 1000 }
    }
}

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The config that controls how to page listings.
    pub pagination_config: PaginationConfig,

    /// The config that controls how exports read the database.
    pub export_config: ExportConfig,

    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(
        db_connection: Connection,
        pagination_config: PaginationConfig,
        export_config: ExportConfig,
    ) -> Result<Self, Error> {
        initialize(&db_connection)?;

        Ok(Self {
            pagination_config,
            export_config,
            db_connection: Arc::new(Mutex::new(db_connection)),
        })
    }
}
