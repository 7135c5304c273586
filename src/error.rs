//! Defines the crate level error type and its conversion to JSON error responses.
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::ffi;
use serde_json::json;

use crate::database_id::AccountId;

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The requested row was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// A write referenced a row that does not exist, e.g. an entry for an
    /// unknown account or an account for an unknown user.
    #[error("a referenced user or account does not exist")]
    InvalidForeignKey,

    /// The username is already taken.
    #[error("the username is already taken")]
    DuplicateUsername,

    /// The email is already registered to another user.
    #[error("the email is already in use")]
    DuplicateEmail,

    /// The owner already holds an account in the requested currency.
    #[error("the owner already has an account in this currency")]
    DuplicateAccountCurrency,

    /// The account still has entries or transfers and cannot be deleted.
    #[error("account {0} has entries or transfers and cannot be deleted")]
    AccountInUse(AccountId),

    /// Applying a balance change would leave the range of a 64 bit integer.
    #[error("the account balance would overflow")]
    BalanceOutOfRange,

    /// The source and destination of a transfer are the same account.
    #[error("cannot transfer money from an account to itself")]
    SameAccountTransfer,

    /// Transfers must move a strictly positive amount.
    #[error("the transfer amount must be positive, got {0}")]
    InvalidTransferAmount(i64),

    /// The account does not hold funds in the currency of the request.
    #[error("account {account_id} uses {account_currency}, not {currency}")]
    CurrencyMismatch {
        /// The account that was checked.
        account_id: AccountId,
        /// The currency of the account.
        account_currency: String,
        /// The currency given in the request.
        currency: String,
    },

    /// The currency code is not one of the supported currencies.
    #[error("unsupported currency \"{0}\"")]
    UnsupportedCurrency(String),

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The caller's deadline expired before the transaction could commit.
    ///
    /// Nothing from the transaction was committed.
    #[error("the deadline for the database transaction expired")]
    DeadlineExceeded,

    /// The unit of work failed and the rollback that followed failed too.
    ///
    /// The state of the database is unknown, unlike any other error returned
    /// from a transaction which implies a clean rollback.
    #[error("tx err: {source}, rb err: {rollback}")]
    RollbackFailed {
        /// The error that aborted the transaction.
        source: Box<Error>,
        /// The error returned by the rollback.
        rollback: rusqlite::Error,
    },

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// The request body is larger than the server accepts.
    #[error("the request body is larger than the limit of {0} bytes")]
    PayloadTooLarge(usize),

    /// A request or response body could not be read.
    #[error("could not read the HTTP body: {0}")]
    BodyReadError(String),

    /// A blocking database task panicked or was cancelled.
    #[error("the database task failed: {0}")]
    TaskFailed(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(sql_error, _)
                if sql_error.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
            {
                Error::InvalidForeignKey
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == ffi::SQLITE_CONSTRAINT_CHECK
                    && desc.contains("balance") =>
            {
                Error::BalanceOutOfRange
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if (sql_error.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    || sql_error.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
                    && desc.ends_with("users.username") =>
            {
                Error::DuplicateUsername
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    && desc.ends_with("users.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    && desc.ends_with("accounts.currency") =>
            {
                Error::DuplicateAccountCurrency
            }
            // Only the deadline progress handler interrupts statements.
            rusqlite::Error::SqliteFailure(sql_error, _)
                if sql_error.code == rusqlite::ErrorCode::OperationInterrupted =>
            {
                Error::DeadlineExceeded
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    /// The HTTP status code that best describes the error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound | Error::InvalidForeignKey => StatusCode::NOT_FOUND,
            Error::DuplicateUsername
            | Error::DuplicateEmail
            | Error::DuplicateAccountCurrency
            | Error::AccountInUse(_) => StatusCode::CONFLICT,
            Error::BalanceOutOfRange
            | Error::SameAccountTransfer
            | Error::InvalidTransferAmount(_)
            | Error::CurrencyMismatch { .. }
            | Error::UnsupportedCurrency(_)
            | Error::TooWeak(_) => StatusCode::BAD_REQUEST,
            Error::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Error::DeadlineExceeded => StatusCode::SERVICE_UNAVAILABLE,
            Error::HashingError(_)
            | Error::RollbackFailed { .. }
            | Error::DatabaseLockError
            | Error::BodyReadError(_)
            | Error::TaskFailed(_)
            | Error::SqlError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code = self.status_code();

        let message = if status_code == StatusCode::INTERNAL_SERVER_ERROR {
            // Any errors that are not handled above are not intended to be shown to the client.
            tracing::error!("An unexpected error occurred: {}", self);
            "An unexpected error occurred, check the server logs for more details.".to_owned()
        } else {
            self.to_string()
        };

        (status_code, Json(json!({ "error": message }))).into_response()
    }
}
