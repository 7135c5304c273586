//! Defines the transfer model and its database queries.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::{AccountId, TransferId},
    pagination::ListParams,
};

// ============================================================================
// MODELS
// ============================================================================

/// The record of an amount moved from one account to another.
///
/// A committed transfer is always backed by two entries, see
/// [transfer_tx](crate::Store::transfer_tx).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    /// The ID of the transfer.
    pub id: TransferId,
    /// The account the money was taken from.
    pub from_account_id: AccountId,
    /// The account the money was given to.
    pub to_account_id: AccountId,
    /// The positive amount that was moved.
    pub amount: i64,
    /// When the transfer happened.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The fields needed to record a [Transfer].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreateTransferParams {
    /// The account the money is taken from.
    pub from_account_id: AccountId,
    /// The account the money is given to.
    pub to_account_id: AccountId,
    /// The amount to move.
    pub amount: i64,
}

/// Correct the amount of an existing [Transfer].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateTransferParams {
    /// The transfer to correct.
    pub id: TransferId,
    /// The corrected amount.
    pub amount: i64,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the transfer table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transfer_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS transfers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                from_account_id INTEGER NOT NULL,
                to_account_id INTEGER NOT NULL,
                amount INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY(from_account_id) REFERENCES accounts(id),
                FOREIGN KEY(to_account_id) REFERENCES accounts(id)
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transfers_from ON transfers(from_account_id);",
        (),
    )?;
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transfers_to ON transfers(to_account_id);",
        (),
    )?;
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transfers_from_to ON transfers(from_account_id, to_account_id);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a [Transfer].
pub fn map_transfer_row(row: &Row) -> Result<Transfer, rusqlite::Error> {
    Ok(Transfer {
        id: row.get(0)?,
        from_account_id: row.get(1)?,
        to_account_id: row.get(2)?,
        amount: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Record a new transfer.
///
/// Only the transfer row is written. Use [transfer_tx](crate::Store::transfer_tx)
/// to move money.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidForeignKey] if either account ID does not refer to a valid account,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transfer(
    params: CreateTransferParams,
    connection: &Connection,
) -> Result<Transfer, Error> {
    connection
        .prepare(
            "INSERT INTO transfers (from_account_id, to_account_id, amount, created_at)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id, from_account_id, to_account_id, amount, created_at",
        )?
        .query_row(
            (
                params.from_account_id,
                params.to_account_id,
                params.amount,
                OffsetDateTime::now_utc(),
            ),
            map_transfer_row,
        )
        .map_err(Error::from)
}

/// Retrieve a transfer by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transfer,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_transfer(id: TransferId, connection: &Connection) -> Result<Transfer, Error> {
    connection
        .prepare(
            "SELECT id, from_account_id, to_account_id, amount, created_at
             FROM transfers WHERE id = :id",
        )?
        .query_row(&[(":id", &id)], map_transfer_row)
        .map_err(Error::from)
}

/// Correct the amount of a transfer. For administrative use only.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transfer,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_transfer(
    params: UpdateTransferParams,
    connection: &Connection,
) -> Result<Transfer, Error> {
    connection
        .prepare(
            "UPDATE transfers SET amount = ?1 WHERE id = ?2
             RETURNING id, from_account_id, to_account_id, amount, created_at",
        )?
        .query_row((params.amount, params.id), map_transfer_row)
        .map_err(Error::from)
}

/// Delete a transfer.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transfer,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_transfer(id: TransferId, connection: &Connection) -> Result<(), Error> {
    match connection.execute("DELETE FROM transfers WHERE id = :id", &[(":id", &id)])? {
        0 => Err(Error::NotFound),
        _ => Ok(()),
    }
}

/// List all transfers ordered by ID.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn list_transfers(params: ListParams, connection: &Connection) -> Result<Vec<Transfer>, Error> {
    connection
        .prepare(
            "SELECT id, from_account_id, to_account_id, amount, created_at FROM transfers
             ORDER BY id LIMIT ?1 OFFSET ?2",
        )?
        .query_map((params.limit, params.offset), map_transfer_row)?
        .map(|maybe_transfer| maybe_transfer.map_err(Error::from))
        .collect()
}

/// List the transfers that took money from `from_account_id`, ordered by ID.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn list_transfers_from(
    from_account_id: AccountId,
    params: ListParams,
    connection: &Connection,
) -> Result<Vec<Transfer>, Error> {
    connection
        .prepare(
            "SELECT id, from_account_id, to_account_id, amount, created_at FROM transfers
             WHERE from_account_id = ?1 ORDER BY id LIMIT ?2 OFFSET ?3",
        )?
        .query_map(
            (from_account_id, params.limit, params.offset),
            map_transfer_row,
        )?
        .map(|maybe_transfer| maybe_transfer.map_err(Error::from))
        .collect()
}

/// List the transfers that gave money to `to_account_id`, ordered by ID.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn list_transfers_to(
    to_account_id: AccountId,
    params: ListParams,
    connection: &Connection,
) -> Result<Vec<Transfer>, Error> {
    connection
        .prepare(
            "SELECT id, from_account_id, to_account_id, amount, created_at FROM transfers
             WHERE to_account_id = ?1 ORDER BY id LIMIT ?2 OFFSET ?3",
        )?
        .query_map((to_account_id, params.limit, params.offset), map_transfer_row)?
        .map(|maybe_transfer| maybe_transfer.map_err(Error::from))
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
