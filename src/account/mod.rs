mod core;
mod create_endpoint;
mod delete_endpoint;
mod get_endpoint;

pub use core::{
    Account, AddAccountBalanceParams, CreateAccountParams, SUPPORTED_CURRENCIES,
    UpdateAccountParams, add_account_balance, create_account, create_account_table,
    delete_account, get_account, list_accounts, list_accounts_by_owner, update_account,
    validate_currency,
};
pub use create_endpoint::create_account_endpoint;
pub use delete_endpoint::delete_account_endpoint;
pub use get_endpoint::{get_account_endpoint, list_accounts_endpoint};
