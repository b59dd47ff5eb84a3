//! Registers new users of the reporting API.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State, rejection::JsonRejection},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error, PasswordHash,
    password::ValidatedPassword,
    user::{DEFAULT_ROLE, NewUser, User, UserID, create_user},
};

const NAME_MIN_LENGTH: usize = 2;
const NAME_MAX_LENGTH: usize = 50;
const COMPANY_MAX_LENGTH: usize = 100;
const COMMENT_MAX_LENGTH: usize = 500;

/// The state needed for creating a new user.
#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// The database connection for storing users.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The bcrypt cost used to hash new passwords.
    pub password_cost: u32,
}

impl FromRef<AppState> for RegistrationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            password_cost: PasswordHash::DEFAULT_COST,
        }
    }
}

/// The details of a user to register.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateUserRequest {
    /// The user's display name.
    #[serde(default)]
    pub name: Option<String>,
    /// The user's email address.
    #[serde(default)]
    pub email: Option<String>,
    /// The phone number the user will log in with.
    #[serde(default)]
    pub phone: Option<String>,
    /// The company the user works for.
    #[serde(default)]
    pub company: Option<String>,
    /// The user's password. A random one is generated if this is missing.
    #[serde(default)]
    pub password: Option<String>,
    /// The user's role, "user" if missing.
    #[serde(default)]
    pub role: Option<String>,
    /// A free-form note about the user.
    #[serde(default)]
    pub comment: Option<String>,
}

/// The public details of a registered user.
#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    #[serde(rename = "_id")]
    id: UserID,
    name: String,
    email: String,
    phone: String,
    company: String,
    role: String,
}

impl From<User> for RegisteredUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            company: user.company,
            role: user.role,
        }
    }
}

/// The response to a successful registration.
#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    message: &'static str,
    user: RegisteredUser,
}

/// Register a new user.
///
/// The password is optional: users registered without one get a random password, which is
/// hashed and never returned.
pub async fn create_user_endpoint(
    State(state): State<RegistrationState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateUserResponse>), Error> {
    let Json(request) = payload.map_err(|rejection| Error::InvalidField(rejection.body_text()))?;

    let validated = validate_request(request)?;
    let password_hash = PasswordHash::new(validated.password, state.password_cost)?;

    let new_user = NewUser {
        name: validated.name,
        email: validated.email,
        phone: validated.phone,
        company: validated.company,
        role: validated.role,
        comment: validated.comment,
        password_hash,
    };

    let user = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::StoreUnavailable)?;

        create_user(new_user, &connection)?
    };

    tracing::info!("registered user {} with role {}", user.id, user.role);

    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            message: "User created successfully",
            user: user.into(),
        }),
    ))
}

/// A registration request that passed validation.
#[derive(Debug)]
struct ValidatedRequest {
    name: String,
    email: String,
    phone: String,
    company: String,
    password: ValidatedPassword,
    role: String,
    comment: Option<String>,
}

fn validate_request(request: CreateUserRequest) -> Result<ValidatedRequest, Error> {
    let (Some(name), Some(email), Some(phone), Some(company)) = (
        trimmed(request.name),
        trimmed(request.email),
        trimmed(request.phone),
        trimmed(request.company),
    ) else {
        return Err(Error::MissingFields("All fields are required".to_owned()));
    };

    let name_length = name.chars().count();
    if name_length < NAME_MIN_LENGTH {
        return Err(Error::InvalidField(format!(
            "Name must be at least {NAME_MIN_LENGTH} characters long"
        )));
    }
    if name_length > NAME_MAX_LENGTH {
        return Err(Error::InvalidField(format!(
            "Name cannot be more than {NAME_MAX_LENGTH} characters"
        )));
    }

    if company.chars().count() > COMPANY_MAX_LENGTH {
        return Err(Error::InvalidField(format!(
            "Company name cannot be more than {COMPANY_MAX_LENGTH} characters"
        )));
    }

    let comment = trimmed(request.comment);
    if comment
        .as_ref()
        .is_some_and(|comment| comment.chars().count() > COMMENT_MAX_LENGTH)
    {
        return Err(Error::InvalidField(format!(
            "Comment cannot be more than {COMMENT_MAX_LENGTH} characters"
        )));
    }

    let password = match request.password.filter(|password| !password.is_empty()) {
        Some(password) => ValidatedPassword::new(&password)?,
        None => ValidatedPassword::generate(),
    };

    Ok(ValidatedRequest {
        name,
        email: email.to_lowercase(),
        phone,
        company,
        password,
        role: trimmed(request.role).unwrap_or_else(|| DEFAULT_ROLE.to_owned()),
        comment,
    })
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
