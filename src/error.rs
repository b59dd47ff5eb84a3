//! Defines the app level error type and its conversion to JSON error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use time::Date;

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// One or more required fields were missing from the request body.
    ///
    /// The string is shown to the client as-is.
    #[error("{0}")]
    MissingFields(String),

    /// A field was present but its value is not acceptable, e.g. a name that is too long.
    #[error("{0}")]
    InvalidField(String),

    /// A `startDate` or `endDate` query parameter could not be parsed as a calendar date.
    #[error("invalid date \"{0}\", expected a date in the format YYYY-MM-DD")]
    InvalidDate(String),

    /// The end of a date range falls before its start.
    #[error("endDate {end} is before startDate {start}")]
    InvalidDateRange {
        /// The first day of the requested range.
        start: Date,
        /// The last day of the requested range.
        end: Date,
    },

    /// No user is registered with the given phone number.
    #[error("User not found")]
    UserNotFound,

    /// The password did not match the stored hash.
    #[error("Invalid password")]
    InvalidCredentials,

    /// A user with the same email or phone number already exists.
    #[error("User with this email or phone already exists")]
    DuplicateUser,

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock, the record store cannot be used.
    #[error("the record store is unavailable")]
    StoreUnavailable,

    /// A stored document could not be read or written as JSON.
    #[error("could not (de)serialize JSON: {0}")]
    JSONSerializationError(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067
                    && (desc.ends_with("user.email") || desc.ends_with("user.phone")) =>
            {
                Error::DuplicateUser
            }
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::JSONSerializationError(value.to_string())
    }
}

impl Error {
    /// The HTTP status code the error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::MissingFields(_)
            | Error::InvalidField(_)
            | Error::InvalidDate(_)
            | Error::InvalidDateRange { .. }
            | Error::DuplicateUser => StatusCode::BAD_REQUEST,
            Error::UserNotFound => StatusCode::NOT_FOUND,
            Error::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Error::HashingError(_)
            | Error::SqlError(_)
            | Error::StoreUnavailable
            | Error::JSONSerializationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status != StatusCode::INTERNAL_SERVER_ERROR {
            return (
                status,
                Json(json!({ "success": false, "message": self.to_string() })),
            )
                .into_response();
        }

        // Server errors are not intended to be shown to the client outside of debug builds.
        tracing::error!("An unexpected error occurred: {}", self);

        let body = if cfg!(debug_assertions) {
            json!({ "success": false, "message": "Server error", "error": self.to_string() })
        } else {
            json!({ "success": false, "message": "Server error" })
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, response::IntoResponse};
    use time::macros::date;

    use super::Error;

    async fn body_json(error: Error) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn validation_errors_are_bad_requests() {
        let (status, body) = body_json(Error::InvalidDateRange {
            start: date!(2024 - 01 - 03),
            end: date!(2024 - 01 - 01),
        })
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(
            body["message"],
            "endDate 2024-01-01 is before startDate 2024-01-03"
        );
    }

    #[tokio::test]
    async fn auth_errors_map_to_expected_statuses() {
        assert_eq!(body_json(Error::UserNotFound).await.0, StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(Error::InvalidCredentials).await.0,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            body_json(Error::DuplicateUser).await.0,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn store_errors_hide_details_behind_generic_message() {
        let (status, body) = body_json(Error::StoreUnavailable).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Server error");
    }

    #[test]
    fn unique_email_violation_maps_to_duplicate_user() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE user (email TEXT UNIQUE)", ())
            .unwrap();
        conn.execute("INSERT INTO user (email) VALUES ('a@b.c')", ())
            .unwrap();

        let error: Error = conn
            .execute("INSERT INTO user (email) VALUES ('a@b.c')", ())
            .unwrap_err()
            .into();

        assert_eq!(error, Error::DuplicateUser);
    }
}
