//! The API endpoint URIs. Every route is mounted under `/api/v1`.

/// The route for checking a user's phone number and password.
pub const AUTH: &str = "/api/v1/auth";
/// The route for registering a new user.
pub const CREATE_USER: &str = "/api/v1/create-user";
/// The route for a filtered, paged listing of transactions.
pub const FILTER: &str = "/api/v1/filter";
/// The route for the sales summary and daily sales.
pub const SALES: &str = "/api/v1/sales";
/// The route for per-bucket totals of all records and of sales.
pub const SALES_STATS: &str = "/api/v1/sales-stats";
/// The route for every report at once.
pub const SALES_FACETS: &str = "/api/v1/sales/stats";
/// The route for the top products chart data.
pub const TOP_PRODUCTS: &str = "/api/v1/top-products";
/// The route for downloading transactions as CSV.
pub const EXPORT_CSV: &str = "/api/v1/export-csv";
