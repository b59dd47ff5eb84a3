//! Handles log-in requests by checking a phone number and password against the user table.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State, rejection::JsonRejection},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    user::{UserID, get_user_by_phone},
};

/// The state needed to authenticate a user.
#[derive(Debug, Clone)]
pub struct AuthState {
    /// The database connection for reading users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The credentials sent by a client.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AuthRequest {
    /// The phone number the user registered with.
    #[serde(default)]
    pub phone: Option<String>,
    /// The user's password.
    #[serde(default)]
    pub password: Option<String>,
}

/// The public details of an authenticated user.
#[derive(Debug, Serialize)]
pub struct AuthenticatedUser {
    phone: String,
    #[serde(rename = "_id")]
    id: UserID,
}

/// The response to a successful log-in.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    message: &'static str,
    user: AuthenticatedUser,
}

/// Check a user's phone number and password.
///
/// Responds with the user's phone and ID on success. Unknown phone numbers get a 404 and wrong
/// passwords a 401.
pub async fn post_auth(
    State(state): State<AuthState>,
    payload: Result<Json<AuthRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, Error> {
    let Json(request) = payload.map_err(|rejection| Error::InvalidField(rejection.body_text()))?;

    let (Some(phone), Some(password)) = (
        non_empty(request.phone.as_deref()),
        non_empty(request.password.as_deref()),
    ) else {
        return Err(Error::MissingFields(
            "Phone and password are required".to_owned(),
        ));
    };

    let user = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::StoreUnavailable)?;

        get_user_by_phone(phone.trim(), &connection)?
    };

    let is_password_valid = user
        .password_hash
        .verify(password)
        .map_err(|error| Error::HashingError(error.to_string()))?;

    if !is_password_valid {
        tracing::info!("rejected log-in for user {}: wrong password", user.id);
        return Err(Error::InvalidCredentials);
    }

    tracing::info!("user {} logged in", user.id);

    Ok(Json(AuthResponse {
        message: "Authentication successful",
        user: AuthenticatedUser {
            phone: user.phone,
            id: user.id,
        },
    }))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}
