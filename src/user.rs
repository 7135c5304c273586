//! Code for creating the user table and fetching users from the database.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, PasswordHash};

/// A user of the application and the owner of zero or more accounts.
///
/// Accounts reference their owner by [User::username].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The unique name used to log in and to own accounts.
    pub username: String,
    /// The user's password hash.
    pub hashed_password: PasswordHash,
    /// The user's full name.
    pub full_name: String,
    /// The user's email address, unique across users.
    pub email: String,
    /// When the password was last changed, `None` if it never was.
    #[serde(with = "time::serde::rfc3339::option")]
    pub password_changed_at: Option<OffsetDateTime>,
    /// When the user was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The fields needed to create a [User].
#[derive(Debug, Clone, PartialEq)]
pub struct CreateUserParams {
    /// The unique username.
    pub username: String,
    /// The already hashed password.
    pub hashed_password: PasswordHash,
    /// The user's full name.
    pub full_name: String,
    /// The user's email address.
    pub email: String,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY,
                hashed_password TEXT NOT NULL,
                full_name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password_changed_at TEXT,
                created_at TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// # Errors
///
/// This function will return a:
/// - [Error::DuplicateUsername] if the username is taken,
/// - [Error::DuplicateEmail] if the email is already registered,
/// - or [Error::SqlError] if some other SQL related error occurred.
pub fn create_user(params: CreateUserParams, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(
            "INSERT INTO users (username, hashed_password, full_name, email, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING username, hashed_password, full_name, email, password_changed_at, created_at",
        )?
        .query_row(
            (
                params.username,
                params.hashed_password.as_ref(),
                params.full_name,
                params.email,
                OffsetDateTime::now_utc(),
            ),
            map_user_row,
        )
        .map_err(Error::from)
}

/// Get the user from the database with the name `username`.
///
/// # Errors
///
/// This function will return an error if:
/// - `username` does not belong to a registered user ([Error::NotFound]),
/// - or there was some other SQL error.
pub fn get_user(username: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(
            "SELECT username, hashed_password, full_name, email, password_changed_at, created_at
             FROM users WHERE username = :username",
        )?
        .query_row(&[(":username", username)], map_user_row)
        .map_err(Error::from)
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_password_hash: String = row.get(1)?;

    Ok(User {
        username: row.get(0)?,
        hashed_password: PasswordHash::new_unchecked(&raw_password_hash),
        full_name: row.get(2)?,
        email: row.get(3)?,
        password_changed_at: row.get(4)?,
        created_at: row.get(5)?,
    })
}
