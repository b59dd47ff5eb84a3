//! Read-only queries and aggregations over the transaction documents.

use rusqlite::{Connection, params_from_iter, types::Value as SqlValue};

use crate::{
    Error,
    pagination::PageWindow,
    query::{BucketSize, DateRange, Predicate, SortOrder, SortSpec, date_range::parse_date},
    report::{BucketTotals, ProductTotals, Totals},
};

use super::{
    record::TransactionRecord,
    sql::{SqlFilter, json_path, render_predicate},
};

/// The `currency_amount` of a document, or NULL if it is not a number.
const AMOUNT_SQL: &str = "CASE WHEN json_type(document, '$.currency_amount') IN ('integer', 'real') \
    THEN json_extract(document, '$.currency_amount') END";

/// The `tran_date` of a document.
const DATE_SQL: &str = "json_extract(document, '$.tran_date')";

/// A `GLOB` pattern for the `YYYY-MM-DD` prefix of a date.
const DAY_PATTERN: &str = "[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]";

/// The label used for records without a product name.
pub const UNKNOWN_PRODUCT: &str = "Unknown";

/// Count the records matching `predicate`.
///
/// # Errors
/// Returns [Error::SqlError] if the query fails.
pub fn count_matching(predicate: &Predicate, connection: &Connection) -> Result<u64, Error> {
    let filter = render_predicate(predicate);
    let query = format!(
        "SELECT COUNT(*) FROM \"transaction\" WHERE {}",
        filter.clause
    );

    let count: i64 =
        connection.query_row(&query, params_from_iter(filter.params.iter()), |row| row.get(0))?;

    Ok(count as u64)
}

/// Count and sum the amounts of the records matching `predicate`.
///
/// An empty match is `Totals { count: 0, amount: 0.0 }`.
///
/// # Errors
/// Returns [Error::SqlError] if the query fails.
pub fn sum_matching(predicate: &Predicate, connection: &Connection) -> Result<Totals, Error> {
    let filter = render_predicate(predicate);
    let query = format!(
        "SELECT COUNT(*), TOTAL({AMOUNT_SQL}) FROM \"transaction\" WHERE {}",
        filter.clause
    );

    connection
        .query_row(&query, params_from_iter(filter.params.iter()), |row| {
            Ok(Totals {
                count: row.get::<_, i64>(0)? as u64,
                amount: row.get(1)?,
            })
        })
        .map_err(Error::from)
}

/// Get one page of the records matching `predicate`.
///
/// Records that compare equal on the sort field keep their insertion order, as do all records
/// when the sort field cannot be addressed.
///
/// # Errors
/// Returns [Error::SqlError] if the query fails, or [Error::JSONSerializationError] if a stored
/// document is not a valid transaction.
pub fn find_page(
    predicate: &Predicate,
    sort: &SortSpec,
    window: PageWindow,
    connection: &Connection,
) -> Result<Vec<TransactionRecord>, Error> {
    let filter = render_predicate(predicate);
    let direction = match sort.order {
        SortOrder::Ascending => "ASC",
        SortOrder::Descending => "DESC",
    };
    let mut params = filter.params;
    let sort_key = match json_path(&sort.field) {
        Some(path) => {
            params.push(SqlValue::Text(path));
            format!("json_extract(document, ?) {direction}, ")
        }
        None => String::new(),
    };
    let query = format!(
        "SELECT document FROM \"transaction\" WHERE {} \
        ORDER BY {sort_key}id ASC LIMIT ? OFFSET ?",
        filter.clause
    );

    params.extend([
        SqlValue::Integer(to_sql_integer(window.limit)),
        SqlValue::Integer(to_sql_integer(window.skip())),
    ]);

    query_documents(&query, &params, connection)
}

/// Count and sum the records matching `predicate` per date bucket.
///
/// Only buckets with at least one record are returned, sorted by key.
///
/// # Errors
/// Returns [Error::SqlError] if the query fails.
pub fn bucket_totals(
    predicate: &Predicate,
    size: BucketSize,
    connection: &Connection,
) -> Result<Vec<BucketTotals>, Error> {
    let filter = dated(render_predicate(predicate));
    let query = format!(
        "SELECT substr({DATE_SQL}, 1, {}) AS bucket, COUNT(*), TOTAL({AMOUNT_SQL}) \
        FROM \"transaction\" WHERE {} GROUP BY bucket ORDER BY bucket ASC",
        size.key_length(),
        filter.clause
    );

    connection
        .prepare(&query)?
        .query_map(params_from_iter(filter.params.iter()), |row| {
            Ok(BucketTotals {
                date: row.get(0)?,
                count: row.get::<_, i64>(1)? as u64,
                amount: row.get(2)?,
            })
        })?
        .map(|row| row.map_err(Error::from))
        .collect()
}

/// Get the first and last day on which a record matching `predicate` was made.
///
/// Records whose date does not start with a `YYYY-MM-DD` day are ignored. Returns `None` if
/// nothing else matches or the stored days are not calendar days.
///
/// # Errors
/// Returns [Error::SqlError] if the query fails.
pub fn matching_day_bounds(
    predicate: &Predicate,
    connection: &Connection,
) -> Result<Option<DateRange>, Error> {
    let filter = dated(render_predicate(predicate)).and(
        &format!("substr({DATE_SQL}, 1, 10) GLOB '{DAY_PATTERN}'"),
        [],
    );
    let query = format!(
        "SELECT MIN(substr({DATE_SQL}, 1, 10)), MAX(substr({DATE_SQL}, 1, 10)) \
        FROM \"transaction\" WHERE {}",
        filter.clause
    );

    let (min_day, max_day): (Option<String>, Option<String>) = connection.query_row(
        &query,
        params_from_iter(filter.params.iter()),
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let (Some(min_day), Some(max_day)) = (min_day, max_day) else {
        return Ok(None);
    };

    match (parse_date(&min_day), parse_date(&max_day)) {
        (Ok(start), Ok(end)) => Ok(Some(DateRange { start, end })),
        (start, end) => {
            tracing::warn!(
                "could not read stored transaction dates as days: {:?}, {:?}",
                start,
                end
            );
            Ok(None)
        }
    }
}

/// Count and sum the records matching `predicate` per product name.
///
/// Records without a product name are grouped under [UNKNOWN_PRODUCT]. The rows are not
/// ranked.
///
/// # Errors
/// Returns [Error::SqlError] if the query fails.
pub fn product_totals(
    predicate: &Predicate,
    connection: &Connection,
) -> Result<Vec<ProductTotals>, Error> {
    let filter = render_predicate(predicate);
    let query = format!(
        "SELECT CAST(COALESCE(json_extract(document, '$.ProductName'), ?) AS TEXT) AS product, \
        COUNT(*), TOTAL({AMOUNT_SQL}) \
        FROM \"transaction\" WHERE {} GROUP BY product",
        filter.clause
    );

    let mut params = vec![SqlValue::Text(UNKNOWN_PRODUCT.to_owned())];
    params.extend(filter.params);

    connection
        .prepare(&query)?
        .query_map(params_from_iter(params.iter()), |row| {
            Ok(ProductTotals {
                name: row.get(0)?,
                count: row.get::<_, i64>(1)? as u64,
                amount: row.get(2)?,
            })
        })?
        .map(|row| row.map_err(Error::from))
        .collect()
}

/// Get up to `batch_size` records matching `predicate` whose `tran_id` sorts after `after`,
/// in ascending `tran_id` order.
///
/// Passing the last `tran_id` of one batch as `after` for the next walks every matching record
/// exactly once, as long as records are only ever appended.
///
/// # Errors
/// Returns [Error::SqlError] if the query fails, or [Error::JSONSerializationError] if a stored
/// document is not a valid transaction.
pub fn fetch_batch_after(
    predicate: &Predicate,
    after: Option<&str>,
    batch_size: u64,
    connection: &Connection,
) -> Result<Vec<TransactionRecord>, Error> {
    let mut filter = render_predicate(predicate);

    if let Some(after) = after {
        filter = filter.and("tran_id > ?", [SqlValue::Text(after.to_owned())]);
    }

    let query = format!(
        "SELECT document FROM \"transaction\" WHERE {} ORDER BY tran_id ASC LIMIT ?",
        filter.clause
    );

    let mut params = filter.params;
    params.push(SqlValue::Integer(to_sql_integer(batch_size)));

    query_documents(&query, &params, connection)
}

/// Restrict `filter` to records whose date is a string.
fn dated(filter: SqlFilter) -> SqlFilter {
    filter.and("json_type(document, '$.tran_date') = 'text'", [])
}

fn to_sql_integer(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn query_documents(
    query: &str,
    params: &[SqlValue],
    connection: &Connection,
) -> Result<Vec<TransactionRecord>, Error> {
    let documents = connection
        .prepare(query)?
        .query_map(params_from_iter(params.iter()), |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<String>, rusqlite::Error>>()?;

    documents
        .iter()
        .map(|document| serde_json::from_str(document).map_err(Error::from))
        .collect()
}
