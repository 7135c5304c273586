//! Defines the ledger entry model and its database queries.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::{AccountId, EntryId},
    pagination::ListParams,
};

/// A single signed balance movement on one account.
///
/// Positive amounts are credits and negative amounts are debits. Every
/// transfer writes exactly two entries: a debit on the source account and a
/// credit on the destination account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// The ID of the entry.
    pub id: EntryId,
    /// The account whose balance moved.
    pub account_id: AccountId,
    /// The signed amount.
    pub amount: i64,
    /// When the entry was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The fields needed to record an [Entry].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreateEntryParams {
    /// The account whose balance moved.
    pub account_id: AccountId,
    /// The signed amount.
    pub amount: i64,
}

/// Correct the amount of an existing [Entry].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateEntryParams {
    /// The entry to correct.
    pub id: EntryId,
    /// The corrected amount.
    pub amount: i64,
}

/// Create the entry table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_entry_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER NOT NULL,
                amount INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY(account_id) REFERENCES accounts(id)
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_entries_account_id ON entries(account_id);",
        (),
    )?;

    Ok(())
}

/// Map a database row to an [Entry].
pub fn map_entry_row(row: &Row) -> Result<Entry, rusqlite::Error> {
    Ok(Entry {
        id: row.get(0)?,
        account_id: row.get(1)?,
        amount: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Record a new entry.
///
/// This does not touch the account balance, the caller is responsible for
/// applying the same amount to the account in the same transaction.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidForeignKey] if `account_id` does not refer to a valid account,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_entry(params: CreateEntryParams, connection: &Connection) -> Result<Entry, Error> {
    connection
        .prepare(
            "INSERT INTO entries (account_id, amount, created_at) VALUES (?1, ?2, ?3)
             RETURNING id, account_id, amount, created_at",
        )?
        .query_row(
            (params.account_id, params.amount, OffsetDateTime::now_utc()),
            map_entry_row,
        )
        .map_err(Error::from)
}

/// Retrieve an entry by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid entry,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_entry(id: EntryId, connection: &Connection) -> Result<Entry, Error> {
    connection
        .prepare("SELECT id, account_id, amount, created_at FROM entries WHERE id = :id")?
        .query_row(&[(":id", &id)], map_entry_row)
        .map_err(Error::from)
}

/// Correct the amount of an entry. For administrative use, transfers never
/// modify their entries.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid entry,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_entry(params: UpdateEntryParams, connection: &Connection) -> Result<Entry, Error> {
    connection
        .prepare(
            "UPDATE entries SET amount = ?1 WHERE id = ?2
             RETURNING id, account_id, amount, created_at",
        )?
        .query_row((params.amount, params.id), map_entry_row)
        .map_err(Error::from)
}

/// Delete an entry.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid entry,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_entry(id: EntryId, connection: &Connection) -> Result<(), Error> {
    match connection.execute("DELETE FROM entries WHERE id = :id", &[(":id", &id)])? {
        0 => Err(Error::NotFound),
        _ => Ok(()),
    }
}

/// List all entries ordered by ID.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn list_entries(params: ListParams, connection: &Connection) -> Result<Vec<Entry>, Error> {
    connection
        .prepare(
            "SELECT id, account_id, amount, created_at FROM entries
             ORDER BY id LIMIT ?1 OFFSET ?2",
        )?
        .query_map((params.limit, params.offset), map_entry_row)?
        .map(|maybe_entry| maybe_entry.map_err(Error::from))
        .collect()
}

/// List the entries of one account ordered by ID.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn list_entries_from_account(
    account_id: AccountId,
    params: ListParams,
    connection: &Connection,
) -> Result<Vec<Entry>, Error> {
    connection
        .prepare(
            "SELECT id, account_id, amount, created_at FROM entries
             WHERE account_id = ?1 ORDER BY id LIMIT ?2 OFFSET ?3",
        )?
        .query_map((account_id, params.limit, params.offset), map_entry_row)?
        .map(|maybe_entry| maybe_entry.map_err(Error::from))
        .collect()
}
