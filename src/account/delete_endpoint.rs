//! Defines the endpoint for deleting an account.

use axum::{
    extract::{Path, State},
    http::StatusCode,
};

use crate::{Error, Store, account::delete_account, database_id::AccountId};

/// A route handler for deleting an account, responds with `204 No Content`.
///
/// Accounts that still have entries or transfers cannot be deleted.
pub async fn delete_account_endpoint(
    State(store): State<Store>,
    Path(account_id): Path<AccountId>,
) -> Result<StatusCode, Error> {
    store
        .run_blocking(move |store| store.exec(|conn| delete_account(account_id, conn)))
        .await
        .inspect_err(|error| tracing::warn!("Could not delete account {account_id}: {error}"))?;

    tracing::info!(account_id, "deleted account");

    Ok(StatusCode::NO_CONTENT)
}
