//! The endpoint for registering a new user who can then hold accounts.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error, PasswordHash, Store, ValidatedPassword,
    user::{CreateUserParams, User, create_user},
};

/// The JSON body for registering a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// The unique login name, also used as the owner of accounts.
    pub username: String,
    /// The plain text password, never stored.
    pub password: String,
    /// The user's full name.
    pub full_name: String,
    /// The unique email address.
    pub email: String,
}

/// A user as shown to clients, without the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    /// The unique login name.
    pub username: String,
    /// The user's full name.
    pub full_name: String,
    /// The unique email address.
    pub email: String,
    /// When the password was last changed, if ever.
    #[serde(with = "time::serde::rfc3339::option")]
    pub password_changed_at: Option<OffsetDateTime>,
    /// When the user registered.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            full_name: user.full_name,
            email: user.email,
            password_changed_at: user.password_changed_at,
            created_at: user.created_at,
        }
    }
}

/// A route handler for registering a user.
///
/// The password must pass the strength check and is stored as a bcrypt hash.
/// Responds with `201 Created` and the new user.
pub async fn register_user(
    State(store): State<Store>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), Error> {
    let user = store
        .run_blocking(move |store| {
            let validated_password = ValidatedPassword::new(
                &request.password,
                &[
                    request.username.as_str(),
                    request.full_name.as_str(),
                    request.email.as_str(),
                ],
            )?;

            let hashed_password =
                PasswordHash::new(validated_password, PasswordHash::DEFAULT_COST)
                    .inspect_err(|error| {
                        tracing::error!("an error occurred while hashing a password: {error}")
                    })?;

            store.exec(|conn| {
                create_user(
                    CreateUserParams {
                        username: request.username,
                        hashed_password,
                        full_name: request.full_name,
                        email: request.email,
                    },
                    conn,
                )
            })
        })
        .await?;

    tracing::info!(username = %user.username, "registered user");

    Ok((StatusCode::CREATED, Json(user.into())))
}
