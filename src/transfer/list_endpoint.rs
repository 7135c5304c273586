//! Defines the endpoint for listing the outgoing transfers of an account.

use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    Error,
    account::get_account,
    database_id::AccountId,
    pagination::{ListQuery, ListState},
    transfer::{Transfer, list_transfers_from},
};

/// A route handler for listing a page of the transfers that took money from
/// an account, ordered by ID.
///
/// Responds with `404 Not Found` if the account does not exist.
pub async fn list_account_transfers_endpoint(
    State(state): State<ListState>,
    Path(account_id): Path<AccountId>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Transfer>>, Error> {
    let params = state.pagination_config.list_params(&query);

    state
        .store
        .run_blocking(move |store| {
            store.exec(|conn| {
                get_account(account_id, conn)?;
                list_transfers_from(account_id, params, conn)
            })
        })
        .await
        .map(Json)
}
