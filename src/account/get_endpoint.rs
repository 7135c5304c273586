//! Defines the endpoints for reading accounts.

use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    Error, Store,
    account::{Account, get_account, list_accounts},
    database_id::AccountId,
    pagination::{ListQuery, ListState},
};

/// A route handler for getting a single account.
pub async fn get_account_endpoint(
    State(store): State<Store>,
    Path(account_id): Path<AccountId>,
) -> Result<Json<Account>, Error> {
    store
        .run_blocking(move |store| store.exec(|conn| get_account(account_id, conn)))
        .await
        .map(Json)
}

/// A route handler for listing a page of accounts ordered by ID.
pub async fn list_accounts_endpoint(
    State(state): State<ListState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Account>>, Error> {
    let params = state.pagination_config.list_params(&query);

    state
        .store
        .run_blocking(move |store| store.exec(|conn| list_accounts(params, conn)))
        .await
        .map(Json)
}
