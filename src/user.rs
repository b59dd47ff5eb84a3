//! Code for creating the user table and fetching users from the database.

use std::fmt::Display;

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{Error, PasswordHash};

/// The role given to users registered without one.
pub const DEFAULT_ROLE: &str = "user";

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered user of the reporting API.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The user's display name.
    pub name: String,
    /// The user's email address, lowercased.
    pub email: String,
    /// The phone number the user logs in with.
    pub phone: String,
    /// The company the user works for.
    pub company: String,
    /// The user's role, e.g. "user" or "admin".
    pub role: String,
    /// A free-form note about the user.
    pub comment: Option<String>,
    /// The user's password hash.
    pub password_hash: PasswordHash,
}

/// The fields of a user that is yet to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    /// The user's display name.
    pub name: String,
    /// The user's email address, lowercased.
    pub email: String,
    /// The phone number the user logs in with.
    pub phone: String,
    /// The company the user works for.
    pub company: String,
    /// The user's role.
    pub role: String,
    /// A free-form note about the user.
    pub comment: Option<String>,
    /// The user's password hash.
    pub password_hash: PasswordHash,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                phone TEXT NOT NULL UNIQUE,
                company TEXT NOT NULL,
                role TEXT NOT NULL,
                comment TEXT,
                password TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// # Errors
///
/// Returns a [Error::DuplicateUser] if the email or phone number is already registered, or a
/// [Error::SqlError] if another SQL related error occurred.
pub fn create_user(new_user: NewUser, connection: &Connection) -> Result<User, Error> {
    connection.execute(
        "INSERT INTO user (name, email, phone, company, role, comment, password)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        (
            &new_user.name,
            &new_user.email,
            &new_user.phone,
            &new_user.company,
            &new_user.role,
            &new_user.comment,
            new_user.password_hash.as_ref(),
        ),
    )?;

    let id = UserID::new(connection.last_insert_rowid());

    Ok(User {
        id,
        name: new_user.name,
        email: new_user.email,
        phone: new_user.phone,
        company: new_user.company,
        role: new_user.role,
        comment: new_user.comment,
        password_hash: new_user.password_hash,
    })
}

/// Get the user registered with `phone`.
///
/// # Errors
///
/// This function will return an error if:
/// - `phone` does not belong to a registered user, [Error::UserNotFound].
/// - there was an error trying to access the store.
pub fn get_user_by_phone(phone: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(
            "SELECT id, name, email, phone, company, role, comment, password
             FROM user WHERE phone = :phone",
        )?
        .query_row(&[(":phone", &phone)], map_user_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::UserNotFound,
            error => error.into(),
        })
}

/// Replace the password hash of the user with `user_id`.
///
/// # Errors
///
/// Returns [Error::UserNotFound] if no user has the ID, or [Error::SqlError] if an SQL related
/// error occurred.
pub fn update_password(
    user_id: UserID,
    password_hash: &PasswordHash,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET password = ?1 WHERE id = ?2",
        (password_hash.as_ref(), user_id.as_i64()),
    )?;

    match rows_affected {
        0 => Err(Error::UserNotFound),
        _ => Ok(()),
    }
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_password_hash: String = row.get(7)?;

    Ok(User {
        id: UserID::new(row.get(0)?),
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        company: row.get(4)?,
        role: row.get(5)?,
        comment: row.get(6)?,
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
    })
}

#[cfg(test)]
mod user_tests {
    use rusqlite::Connection;

    use crate::{
        Error, PasswordHash,
        user::{NewUser, UserID, create_user, get_user_by_phone, update_password},
    };

    use super::create_user_table;

    fn get_db_connection() -> Connection {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        create_user_table(&conn).expect("Could not create user table");

        conn
    }

    fn new_user(email: &str, phone: &str) -> NewUser {
        NewUser {
            name: "Rahim Uddin".to_owned(),
            email: email.to_owned(),
            phone: phone.to_owned(),
            company: "Acme".to_owned(),
            role: "user".to_owned(),
            comment: None,
            password_hash: PasswordHash::new_unchecked("hunter2"),
        }
    }

    #[test]
    fn insert_user_succeeds() {
        let db_connection = get_db_connection();

        let inserted_user =
            create_user(new_user("rahim@example.com", "01700000000"), &db_connection).unwrap();

        assert!(inserted_user.id.as_i64() > 0);
        assert_eq!(inserted_user.role, "user");
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let db_connection = get_db_connection();
        create_user(new_user("rahim@example.com", "01700000000"), &db_connection).unwrap();

        let result = create_user(new_user("rahim@example.com", "01800000000"), &db_connection);

        assert_eq!(result, Err(Error::DuplicateUser));
    }

    #[test]
    fn duplicate_phone_is_rejected() {
        let db_connection = get_db_connection();
        create_user(new_user("rahim@example.com", "01700000000"), &db_connection).unwrap();

        let result = create_user(new_user("karim@example.com", "01700000000"), &db_connection);

        assert_eq!(result, Err(Error::DuplicateUser));
    }

    #[test]
    fn get_user_by_phone_succeeds() {
        let db_connection = get_db_connection();
        let inserted_user =
            create_user(new_user("rahim@example.com", "01700000000"), &db_connection).unwrap();

        let selected_user = get_user_by_phone("01700000000", &db_connection);

        assert_eq!(Ok(inserted_user), selected_user);
    }

    #[test]
    fn get_user_fails_with_unknown_phone() {
        let db_connection = get_db_connection();

        let selected_user = get_user_by_phone("01999999999", &db_connection);

        assert_eq!(selected_user, Err(Error::UserNotFound));
    }

    #[test]
    fn update_password_replaces_hash() {
        let db_connection = get_db_connection();
        let user =
            create_user(new_user("rahim@example.com", "01700000000"), &db_connection).unwrap();
        let new_hash = PasswordHash::new_unchecked("hunter3");

        update_password(user.id, &new_hash, &db_connection).unwrap();

        let updated_user = get_user_by_phone("01700000000", &db_connection).unwrap();
        assert_eq!(updated_user.password_hash, new_hash);
        assert_eq!(
            update_password(UserID::new(user.id.as_i64() + 1), &new_hash, &db_connection),
            Err(Error::UserNotFound)
        );
    }
}
