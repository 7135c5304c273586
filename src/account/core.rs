//! Defines the account model and its database queries.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, database_id::AccountId, pagination::ListParams};

// ============================================================================
// MODELS
// ============================================================================

/// The currencies accounts can be opened in.
pub const SUPPORTED_CURRENCIES: [&str; 3] = ["USD", "EUR", "CAD"];

/// Check that `currency` is one of [SUPPORTED_CURRENCIES].
///
/// # Errors
/// Returns [Error::UnsupportedCurrency] otherwise.
pub fn validate_currency(currency: &str) -> Result<(), Error> {
    if SUPPORTED_CURRENCIES.contains(&currency) {
        Ok(())
    } else {
        Err(Error::UnsupportedCurrency(currency.to_owned()))
    }
}

/// A named holder of funds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// The id for the account.
    pub id: AccountId,
    /// The username of the user that owns the account.
    pub owner: String,
    /// The balance in the smallest unit of the currency, e.g. cents.
    pub balance: i64,
    /// The three letter currency code, e.g. "USD".
    pub currency: String,
    /// When the account was opened.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The fields needed to open an [Account].
#[derive(Debug, Clone, PartialEq)]
pub struct CreateAccountParams {
    /// The username of the owner.
    pub owner: String,
    /// The opening balance.
    pub balance: i64,
    /// The three letter currency code.
    pub currency: String,
}

/// Overwrite the balance of an account.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateAccountParams {
    /// The account to update.
    pub id: AccountId,
    /// The new balance.
    pub balance: i64,
}

/// Add a signed amount to the balance of an account.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AddAccountBalanceParams {
    /// The account to update.
    pub id: AccountId,
    /// The signed delta, negative for debits.
    pub amount: i64,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the account table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    // SQLite turns an overflowing integer sum into a REAL, which the check rejects.
    connection.execute(
        "CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner TEXT NOT NULL,
            balance INTEGER NOT NULL CONSTRAINT balance_is_integer CHECK (typeof(balance) = 'integer'),
            currency TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(owner, currency),
            FOREIGN KEY(owner) REFERENCES users(username) ON UPDATE CASCADE
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_accounts_owner ON accounts(owner);",
        (),
    )?;

    Ok(())
}

/// Map a database row to an [Account].
pub fn map_row_to_account(row: &Row) -> Result<Account, rusqlite::Error> {
    Ok(Account {
        id: row.get(0)?,
        owner: row.get(1)?,
        balance: row.get(2)?,
        currency: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Open a new account.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidForeignKey] if `owner` is not a registered user,
/// - [Error::DuplicateAccountCurrency] if the owner already has an account in `currency`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_account(
    params: CreateAccountParams,
    connection: &Connection,
) -> Result<Account, Error> {
    connection
        .prepare(
            "INSERT INTO accounts (owner, balance, currency, created_at)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id, owner, balance, currency, created_at",
        )?
        .query_row(
            (
                params.owner,
                params.balance,
                params.currency,
                OffsetDateTime::now_utc(),
            ),
            map_row_to_account,
        )
        .map_err(Error::from)
}

/// Retrieve an account by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid account,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_account(id: AccountId, connection: &Connection) -> Result<Account, Error> {
    connection
        .prepare("SELECT id, owner, balance, currency, created_at FROM accounts WHERE id = :id")?
        .query_row(&[(":id", &id)], map_row_to_account)
        .map_err(Error::from)
}

/// Overwrite the balance of an account.
///
/// Administrative corrections only. Transfers must use [add_account_balance],
/// otherwise two concurrent transfers can overwrite each other's update.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid account,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_account(
    params: UpdateAccountParams,
    connection: &Connection,
) -> Result<Account, Error> {
    connection
        .prepare(
            "UPDATE accounts SET balance = ?1 WHERE id = ?2
             RETURNING id, owner, balance, currency, created_at",
        )?
        .query_row((params.balance, params.id), map_row_to_account)
        .map_err(Error::from)
}

/// Add `params.amount` to the balance of an account and return the updated account.
///
/// The increment and the read of the new balance happen in a single
/// statement, so there is no window for another writer between them.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid account,
/// - [Error::BalanceOutOfRange] if the new balance does not fit in an `i64`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn add_account_balance(
    params: AddAccountBalanceParams,
    connection: &Connection,
) -> Result<Account, Error> {
    connection
        .prepare(
            "UPDATE accounts SET balance = balance + ?1 WHERE id = ?2
             RETURNING id, owner, balance, currency, created_at",
        )?
        .query_row((params.amount, params.id), map_row_to_account)
        .map_err(Error::from)
}

/// Delete an account.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid account,
/// - [Error::AccountInUse] if entries or transfers still reference the account,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_account(id: AccountId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection
        .execute("DELETE FROM accounts WHERE id = :id", &[(":id", &id)])
        .map_err(|error| match Error::from(error) {
            Error::InvalidForeignKey => Error::AccountInUse(id),
            error => error,
        })?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// List accounts ordered by ID.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn list_accounts(params: ListParams, connection: &Connection) -> Result<Vec<Account>, Error> {
    connection
        .prepare(
            "SELECT id, owner, balance, currency, created_at FROM accounts
             ORDER BY id LIMIT ?1 OFFSET ?2",
        )?
        .query_map((params.limit, params.offset), map_row_to_account)?
        .map(|maybe_account| maybe_account.map_err(Error::from))
        .collect()
}

/// List the accounts of `owner` ordered by ID.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn list_accounts_by_owner(
    owner: &str,
    params: ListParams,
    connection: &Connection,
) -> Result<Vec<Account>, Error> {
    connection
        .prepare(
            "SELECT id, owner, balance, currency, created_at FROM accounts
             WHERE owner = ?1 ORDER BY id LIMIT ?2 OFFSET ?3",
        )?
        .query_map((owner, params.limit, params.offset), map_row_to_account)?
        .map(|maybe_account| maybe_account.map_err(Error::from))
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
