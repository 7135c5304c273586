//! Simple Bank moves money between accounts stored in a SQLite database.
//!
//! Every transfer is recorded with double-entry bookkeeping: a transfer row,
//! a debit entry on the source account, a credit entry on the destination
//! account and the two balance updates are committed together or not at all.
//! An account's balance always equals its opening balance plus the sum of
//! its entries.
//!
//! The crate is organised in three layers:
//! - plain query functions for users, accounts, entries and transfers that
//!   run against any [rusqlite::Connection], including an open transaction,
//! - the [Store], which runs a unit of work inside one database transaction
//!   ([Store::exec_tx]),
//! - [Store::transfer_tx], which performs a complete transfer and is safe to
//!   call concurrently from many threads.
//!
//! A JSON REST API on top of these is provided by [build_router].

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use tokio::signal;

mod account;
mod app_state;
mod database_id;
mod db;
mod endpoints;
mod entry;
mod error;
mod logging;
mod pagination;
mod password;
mod register_user;
mod routing;
mod store;
mod transfer;
mod user;

#[cfg(test)]
mod test_utils;

pub use account::{
    Account, AddAccountBalanceParams, CreateAccountParams, SUPPORTED_CURRENCIES,
    UpdateAccountParams, add_account_balance, create_account, delete_account, get_account,
    list_accounts, list_accounts_by_owner, update_account, validate_currency,
};
pub use app_state::AppState;
pub use database_id::{AccountId, EntryId, TransferId};
pub use db::initialize as initialize_db;
pub use entry::{
    CreateEntryParams, Entry, UpdateEntryParams, create_entry, delete_entry, get_entry,
    list_entries, list_entries_from_account, update_entry,
};
pub use error::Error;
pub use logging::{LOG_BODY_LENGTH_LIMIT, MAX_BODY_SIZE, logging_middleware};
pub use pagination::{ListParams, PaginationConfig};
pub use password::{PasswordHash, ValidatedPassword};
pub use routing::build_router;
pub use store::Store;
pub use transfer::{
    CreateTransferParams, Transfer, TransferTxParams, TransferTxResult, UpdateTransferParams,
    create_transfer, delete_transfer, get_transfer, list_transfers, list_transfers_from,
    list_transfers_to, update_transfer,
};
pub use user::{CreateUserParams, User, create_user, get_user};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!("failed to install signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}
