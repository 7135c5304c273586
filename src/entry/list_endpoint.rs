//! Defines the endpoint for listing the ledger entries of an account.

use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    Error,
    account::get_account,
    database_id::AccountId,
    entry::{Entry, list_entries_from_account},
    pagination::{ListQuery, ListState},
};

/// A route handler for listing a page of an account's entries ordered by ID.
///
/// Responds with `404 Not Found` if the account does not exist.
pub async fn list_account_entries_endpoint(
    State(state): State<ListState>,
    Path(account_id): Path<AccountId>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Entry>>, Error> {
    let params = state.pagination_config.list_params(&query);

    state
        .store
        .run_blocking(move |store| {
            store.exec(|conn| {
                get_account(account_id, conn)?;
                list_entries_from_account(account_id, params, conn)
            })
        })
        .await
        .map(Json)
}
