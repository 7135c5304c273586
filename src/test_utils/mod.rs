#![allow(missing_docs)]

//! Random test data and database fixtures shared by the unit tests.

use rand::{Rng, seq::SliceRandom};
use rusqlite::Connection;

use crate::{
    PasswordHash, Store,
    account::{Account, CreateAccountParams, SUPPORTED_CURRENCIES, create_account},
    db::initialize,
    user::{CreateUserParams, User, create_user},
};

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// A random integer in `min..=max`.
pub(crate) fn random_int(min: i64, max: i64) -> i64 {
    rand::thread_rng().gen_range(min..=max)
}

/// A random string of `n` lowercase letters.
pub(crate) fn random_string(n: usize) -> String {
    let mut rng = rand::thread_rng();

    (0..n)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

pub(crate) fn random_owner() -> String {
    random_string(12)
}

pub(crate) fn random_money() -> i64 {
    random_int(0, 10_000)
}

pub(crate) fn random_currency() -> String {
    SUPPORTED_CURRENCIES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("USD")
        .to_owned()
}

pub(crate) fn random_email() -> String {
    format!("{}@email.com", random_string(6))
}

/// An in-memory database with the schema in place.
pub(crate) fn get_test_connection() -> Connection {
    let conn = Connection::open_in_memory().expect("Could not open in-memory SQLite database");
    initialize(&conn).expect("Could not initialize database");
    conn
}

/// A store backed by an in-memory database.
pub(crate) fn get_test_store() -> Store {
    let conn = Connection::open_in_memory().expect("Could not open in-memory SQLite database");
    Store::new(conn).expect("Could not create store")
}

#[track_caller]
pub(crate) fn create_random_user(connection: &Connection) -> User {
    create_user(
        CreateUserParams {
            username: random_owner(),
            hashed_password: PasswordHash::new_unchecked(&random_string(32)),
            full_name: random_owner(),
            email: random_email(),
        },
        connection,
    )
    .expect("Could not create user")
}

#[track_caller]
pub(crate) fn create_random_account(connection: &Connection) -> Account {
    create_account_with_balance(connection, random_money())
}

#[track_caller]
pub(crate) fn create_account_with_balance(connection: &Connection, balance: i64) -> Account {
    let user = create_random_user(connection);

    create_account(
        CreateAccountParams {
            owner: user.username,
            balance,
            currency: random_currency(),
        },
        connection,
    )
    .expect("Could not create account")
}
