//! Streams every transaction matching a query as CSV.
//!
//! The export walks the matching records in `tran_id` order, one batch per poll of the
//! response body, so neither the server nor the database holds the whole result set.
//! The columns are the fields of the first record; later records are projected onto them.

use std::{
    convert::Infallible,
    sync::{Arc, Mutex},
};

use axum::{
    body::{Body, Bytes},
    extract::{FromRef, RawQuery, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use futures::Stream;
use rusqlite::Connection;
use serde_json::{Map, Value};
use time::{
    OffsetDateTime, UtcOffset,
    format_description::{BorrowedFormatItem, well_known::Rfc3339},
    macros::format_description,
};

use crate::{
    AppState, Error, ExportConfig, PaginationConfig,
    query::{Predicate, params_from_query, resolve_query},
    transaction::{
        TransactionRecord,
        store::{count_matching, fetch_batch_after},
    },
};

/// The file name suggested to clients.
const EXPORT_FILE_NAME: &str = "transactions.csv";

const TIMESTAMP_FORMAT: &[BorrowedFormatItem] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
);

/// The state needed to export transactions.
#[derive(Debug, Clone)]
pub struct ExportState {
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// How many records to read per batch.
    pub export_config: ExportConfig,
}

impl FromRef<AppState> for ExportState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            export_config: state.export_config.clone(),
        }
    }
}

/// Download every transaction matching the query string as a CSV file.
///
/// Query errors and a store that cannot be read are reported before the download starts.
/// A failure part way through ends the file with an `ERROR:` line.
pub async fn export_csv(
    State(state): State<ExportState>,
    RawQuery(raw_query): RawQuery,
) -> Result<Response, Error> {
    let params = params_from_query(raw_query.as_deref())?;
    let predicate = resolve_query(&params, &PaginationConfig::default())?.predicate;

    {
        let connection = lock_connection(&state.db_connection)?;
        let count = count_matching(&predicate, &connection)?;
        tracing::info!("exporting {count} transactions");
    }

    let export = CsvExport::new(
        store_fetcher(state.db_connection, predicate),
        state.export_config.batch_size,
    );

    Ok((
        [
            (CONTENT_TYPE, "text/csv".to_owned()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename={EXPORT_FILE_NAME}"),
            ),
        ],
        Body::from_stream(chunk_stream(export)),
    )
        .into_response())
}

fn lock_connection(
    connection: &Mutex<Connection>,
) -> Result<std::sync::MutexGuard<'_, Connection>, Error> {
    connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::StoreUnavailable)
}

/// Yield the chunks of `export`, reading the next batch only when the body is polled again.
///
/// Dropping the stream, e.g. when the client disconnects, stops the export.
fn chunk_stream<F>(export: CsvExport<F>) -> impl Stream<Item = Result<Bytes, Infallible>>
where
    F: FnMut(Option<&str>, u64) -> Result<Vec<TransactionRecord>, Error>,
{
    futures::stream::unfold(export, |mut export| async move {
        export.next_chunk().map(|chunk| (Ok(chunk), export))
    })
}

/// Read batches from the database. The lock is only held while a batch is read.
fn store_fetcher(
    connection: Arc<Mutex<Connection>>,
    predicate: Predicate,
) -> impl FnMut(Option<&str>, u64) -> Result<Vec<TransactionRecord>, Error> {
    move |after, batch_size| {
        let connection = lock_connection(&connection)?;
        fetch_batch_after(&predicate, after, batch_size, &connection)
    }
}

/// Where the export is up to.
#[derive(Debug, PartialEq)]
enum ExportStep {
    /// The next batch should be read from after `cursor`.
    Fetching {
        cursor: Option<String>,
        columns: Option<Vec<String>>,
    },
    /// `chunk` is ready to be sent, then the export continues with `next`.
    Flushing {
        chunk: Bytes,
        next: Box<ExportStep>,
    },
    /// Every record has been sent.
    Done,
    /// The export was aborted after an error.
    Failed,
}

/// A CSV export driven by a batch fetcher.
///
/// `fetch` is called with the `tran_id` of the last exported record (`None` at the start) and
/// the batch size, and must return the next records in ascending `tran_id` order.
struct CsvExport<F> {
    fetch: F,
    batch_size: u64,
    step: ExportStep,
}

impl<F> CsvExport<F>
where
    F: FnMut(Option<&str>, u64) -> Result<Vec<TransactionRecord>, Error>,
{
    fn new(fetch: F, batch_size: u64) -> Self {
        Self {
            fetch,
            batch_size: batch_size.max(1),
            step: ExportStep::Fetching {
                cursor: None,
                columns: None,
            },
        }
    }

    /// Run the export until the next chunk of CSV is ready, or `None` once it has ended.
    fn next_chunk(&mut self) -> Option<Bytes> {
        loop {
            match std::mem::replace(&mut self.step, ExportStep::Done) {
                ExportStep::Fetching { cursor, columns } => {
                    self.step = self.fetch_batch(cursor, columns);
                }
                ExportStep::Flushing { chunk, next } => {
                    self.step = *next;
                    return Some(chunk);
                }
                ExportStep::Done => return None,
                ExportStep::Failed => {
                    self.step = ExportStep::Failed;
                    return None;
                }
            }
        }
    }

    fn fetch_batch(&mut self, cursor: Option<String>, columns: Option<Vec<String>>) -> ExportStep {
        let batch = match (self.fetch)(cursor.as_deref(), self.batch_size) {
            Ok(batch) => batch,
            Err(error) => return abort(&error.to_string()),
        };

        let Some(last) = batch.last() else {
            return ExportStep::Done;
        };

        let is_first_batch = columns.is_none();
        let columns = columns.unwrap_or_else(|| batch[0].fields().keys().cloned().collect());

        let chunk = match encode_batch(&batch, &columns, is_first_batch) {
            Ok(chunk) => chunk,
            Err(error) => return abort(&error.to_string()),
        };

        let next = if (batch.len() as u64) < self.batch_size {
            ExportStep::Done
        } else {
            ExportStep::Fetching {
                cursor: Some(last.tran_id().to_owned()),
                columns: Some(columns),
            }
        };

        ExportStep::Flushing {
            chunk: Bytes::from(chunk),
            next: Box::new(next),
        }
    }
}

fn abort(reason: &str) -> ExportStep {
    tracing::error!("export aborted: {reason}");

    ExportStep::Flushing {
        chunk: Bytes::from(format!("ERROR: export aborted: {reason}\n")),
        next: Box::new(ExportStep::Failed),
    }
}

fn encode_batch(
    batch: &[TransactionRecord],
    columns: &[String],
    write_header: bool,
) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    if write_header {
        writer.write_record(columns)?;
    }

    for record in batch {
        writer.write_record(columns.iter().map(|column| cell(record.get(column))))?;
    }

    writer
        .into_inner()
        .map_err(|error| csv::Error::from(error.into_error()))
}

/// The CSV text of a field value.
///
/// Extended JSON identifiers and dates are unwrapped, other structured values are written as
/// compact JSON and missing or null values are empty.
fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        Some(Value::Object(object)) => extended_json_cell(object).unwrap_or_else(|| compact(value)),
        Some(Value::Array(_)) => compact(value),
    }
}

fn compact(value: Option<&Value>) -> String {
    value.map(Value::to_string).unwrap_or_default()
}

fn extended_json_cell(object: &Map<String, Value>) -> Option<String> {
    if object.len() != 1 {
        return None;
    }

    match object.iter().next()? {
        (key, Value::String(id)) if key == "$oid" => Some(id.clone()),
        (key, date) if key == "$date" => format_extended_date(date),
        _ => None,
    }
}

/// Format a `$date` value, either an RFC 3339 string or milliseconds since the Unix epoch,
/// as an RFC 3339 UTC timestamp with millisecond precision.
fn format_extended_date(date: &Value) -> Option<String> {
    let timestamp = match date {
        Value::String(text) => OffsetDateTime::parse(text, &Rfc3339).ok()?,
        Value::Number(millis) => from_unix_millis(millis.as_i64()?)?,
        Value::Object(long) => match long.get("$numberLong") {
            Some(Value::String(millis)) => from_unix_millis(millis.parse().ok()?)?,
            _ => return None,
        },
        _ => return None,
    };

    timestamp.to_offset(UtcOffset::UTC).format(TIMESTAMP_FORMAT).ok()
}

fn from_unix_millis(millis: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
}
