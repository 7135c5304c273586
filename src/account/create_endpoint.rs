//! Defines the endpoint for opening a new account.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::{
    Error, Store,
    account::{Account, CreateAccountParams, create_account, validate_currency},
};

/// The JSON body for opening an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    /// The username of the account holder.
    pub owner: String,
    /// One of the supported currency codes, e.g. "USD".
    pub currency: String,
}

/// A route handler for opening a new account with a zero balance.
///
/// Responds with `201 Created` and the new account.
pub async fn create_account_endpoint(
    State(store): State<Store>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<Account>), Error> {
    validate_currency(&request.currency)?;

    let params = CreateAccountParams {
        owner: request.owner,
        balance: 0,
        currency: request.currency,
    };

    let account = store
        .run_blocking(move |store| store.exec(|conn| create_account(params, conn)))
        .await?;

    tracing::info!(
        account_id = account.id,
        owner = %account.owner,
        currency = %account.currency,
        "opened account"
    );

    Ok((StatusCode::CREATED, Json(account)))
}
