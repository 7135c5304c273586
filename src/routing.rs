//! Application router configuration.

use axum::{
    Json, Router,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;

use crate::{
    AppState,
    account::{
        create_account_endpoint, delete_account_endpoint, get_account_endpoint,
        list_accounts_endpoint,
    },
    endpoints,
    entry::list_account_entries_endpoint,
    logging::logging_middleware,
    register_user::register_user,
    transfer::{create_transfer_endpoint, list_account_transfers_endpoint},
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::USERS, post(register_user))
        .route(
            endpoints::ACCOUNTS,
            post(create_account_endpoint).get(list_accounts_endpoint),
        )
        .route(
            endpoints::ACCOUNT,
            get(get_account_endpoint).delete(delete_account_endpoint),
        )
        .route(endpoints::ACCOUNT_ENTRIES, get(list_account_entries_endpoint))
        .route(
            endpoints::ACCOUNT_TRANSFERS,
            get(list_account_transfers_endpoint),
        )
        .route(endpoints::TRANSFERS, post(create_transfer_endpoint))
        .fallback(get_404_not_found)
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

async fn get_404_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "no route matches the requested path" })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::json;

    use crate::{
        AppState,
        account::Account,
        endpoints::{self, format_endpoint},
        entry::Entry,
        pagination::PaginationConfig,
        transfer::{Transfer, TransferTxResult},
    };

    use super::build_router;

    fn get_test_server() -> TestServer {
        let connection =
            Connection::open_in_memory().expect("Could not open in-memory SQLite database");
        let state = AppState::new(connection, PaginationConfig::default())
            .expect("Could not create app state");

        TestServer::new(build_router(state)).expect("Could not create test server.")
    }

    async fn register(server: &TestServer, username: &str) {
        server
            .post(endpoints::USERS)
            .json(&json!({
                "username": username,
                "password": "correct horse battery staple",
                "full_name": "Test User",
                "email": format!("{username}@example.com"),
            }))
            .await
            .assert_status(StatusCode::CREATED);
    }

    async fn open_account(server: &TestServer, owner: &str) -> Account {
        let response = server
            .post(endpoints::ACCOUNTS)
            .json(&json!({ "owner": owner, "currency": "USD" }))
            .await;
        response.assert_status(StatusCode::CREATED);

        response.json::<Account>()
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let server = get_test_server();

        let response = server.get("/api/nope").await;

        response.assert_status_not_found();
    }

    #[tokio::test]
    async fn one_account_per_owner_and_currency() {
        let server = get_test_server();
        register(&server, "alice").await;
        open_account(&server, "alice").await;

        let response = server
            .post(endpoints::ACCOUNTS)
            .json(&json!({ "owner": "alice", "currency": "USD" }))
            .await;

        response.assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn transfer_round_trip() {
        let server = get_test_server();
        register(&server, "alice").await;
        register(&server, "bob").await;
        let alice = open_account(&server, "alice").await;
        let bob = open_account(&server, "bob").await;

        let response = server
            .post(endpoints::TRANSFERS)
            .json(&json!({
                "from_account_id": alice.id,
                "to_account_id": bob.id,
                "amount": 25,
                "currency": "USD",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let result = response.json::<TransferTxResult>();
        assert_eq!(result.from_account.balance, -25);
        assert_eq!(result.to_account.balance, 25);

        let bob_after = server
            .get(&format_endpoint(endpoints::ACCOUNT, bob.id))
            .await
            .json::<Account>();
        assert_eq!(bob_after, result.to_account);

        let entries = server
            .get(&format_endpoint(endpoints::ACCOUNT_ENTRIES, alice.id))
            .await
            .json::<Vec<Entry>>();
        assert_eq!(entries, vec![result.from_entry]);

        let transfers = server
            .get(&format_endpoint(endpoints::ACCOUNT_TRANSFERS, alice.id))
            .await
            .json::<Vec<Transfer>>();
        assert_eq!(transfers, vec![result.transfer]);
    }

    #[tokio::test]
    async fn accounts_with_history_cannot_be_deleted() {
        let server = get_test_server();
        register(&server, "alice").await;
        register(&server, "bob").await;
        let alice = open_account(&server, "alice").await;
        let bob = open_account(&server, "bob").await;
        server
            .post(endpoints::TRANSFERS)
            .json(&json!({
                "from_account_id": alice.id,
                "to_account_id": bob.id,
                "amount": 1,
                "currency": "USD",
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .delete(&format_endpoint(endpoints::ACCOUNT, alice.id))
            .await;

        response.assert_status(StatusCode::CONFLICT);
        server
            .get(&format_endpoint(endpoints::ACCOUNT, alice.id))
            .await
            .assert_status_ok();
    }
}
