//! Defines the endpoint for moving money between accounts.

use axum::{Json, extract::State, http::StatusCode};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    Error, Store,
    account::get_account,
    database_id::AccountId,
    transfer::{TransferTxParams, TransferTxResult},
};

/// The JSON body for a transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransferRequest {
    /// The account the money is taken from.
    pub from_account_id: AccountId,
    /// The account the money is given to.
    pub to_account_id: AccountId,
    /// The amount to move, must be positive.
    pub amount: i64,
    /// The currency the client expects both accounts to hold.
    pub currency: String,
}

/// A route handler for transferring money between two accounts.
///
/// Both accounts must exist and hold `currency`. Responds with
/// `201 Created` and every row the transfer wrote.
pub async fn create_transfer_endpoint(
    State(store): State<Store>,
    Json(request): Json<CreateTransferRequest>,
) -> Result<(StatusCode, Json<TransferTxResult>), Error> {
    let params = TransferTxParams {
        from_account_id: request.from_account_id,
        to_account_id: request.to_account_id,
        amount: request.amount,
    };
    params.validate()?;

    let currency = request.currency;
    let result = store
        .run_blocking(move |store| {
            store.exec(|conn| {
                check_account_currency(params.from_account_id, &currency, conn)?;
                check_account_currency(params.to_account_id, &currency, conn)
            })?;

            store.transfer_tx(params)
        })
        .await?;

    Ok((StatusCode::CREATED, Json(result)))
}

fn check_account_currency(
    account_id: AccountId,
    currency: &str,
    connection: &Connection,
) -> Result<(), Error> {
    let account = get_account(account_id, connection)?;

    if account.currency != currency {
        return Err(Error::CurrencyMismatch {
            account_id,
            account_currency: account.currency,
            currency: currency.to_owned(),
        });
    }

    Ok(())
}
