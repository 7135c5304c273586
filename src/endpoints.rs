//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/accounts/{account_id}', use [format_endpoint].

/// The route to create users.
pub const USERS: &str = "/api/users";
/// The route to create and list accounts.
pub const ACCOUNTS: &str = "/api/accounts";
/// The route to get or delete a single account.
pub const ACCOUNT: &str = "/api/accounts/{account_id}";
/// The route to list the ledger entries of an account.
pub const ACCOUNT_ENTRIES: &str = "/api/accounts/{account_id}/entries";
/// The route to list the outgoing transfers of an account.
pub const ACCOUNT_TRANSFERS: &str = "/api/accounts/{account_id}/transfers";
/// The route to move money between accounts.
pub const TRANSFERS: &str = "/api/transfers";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/users/{user_id}', '{user_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_string();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|end| param_start + end + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
