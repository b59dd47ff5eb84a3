//! Aggregation reports over transaction records.
//!
//! Provides totals, zero-filled time series and product rankings, and the JSON endpoints that
//! serve them for dashboard charts and tables.

mod handlers;
mod products;
mod series;

pub use handlers::{
    get_filtered_transactions, get_sales_facets, get_sales_report, get_sales_stats,
    get_top_products,
};

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use rusqlite::Connection;
use serde::Serialize;

use crate::{AppState, PaginationConfig};

/// The number of top-ranked products listed before the rest are rolled up.
pub const TOP_PRODUCT_COUNT: usize = 3;

/// The label of the row that sums every product outside the top ranks.
pub const OTHER_PRODUCTS_LABEL: &str = "Other";

/// The number of records and their summed `currency_amount`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct Totals {
    /// The number of records.
    pub count: u64,
    /// The sum of the numeric amounts.
    pub amount: f64,
}

/// The totals of one date bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketTotals {
    /// The bucket key, `YYYY-MM-DD` or `YYYY-MM`.
    pub date: String,
    /// The number of records in the bucket.
    pub count: u64,
    /// The summed amount of the records in the bucket.
    pub amount: f64,
}

/// The totals of one product.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductTotals {
    /// The product name.
    pub name: String,
    /// The number of records for the product.
    pub count: u64,
    /// The summed amount of the records for the product.
    pub amount: f64,
}

/// The state needed by the report endpoints.
#[derive(Debug, Clone)]
pub struct ReportState {
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// Defaults and limits for paged listings.
    pub pagination_config: PaginationConfig,
}

impl FromRef<AppState> for ReportState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            pagination_config: state.pagination_config.clone(),
        }
    }
}

/// Round to two decimal places.
fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
