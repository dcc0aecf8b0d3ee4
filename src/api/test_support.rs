//! Shared fixtures for the HTTP handler tests.

use axum_test::TestServer;
use sqlx::{postgres::PgPoolOptions, PgPool};

use super::{router, AppState};
use crate::{
    auth::{password, token::JwtKeys, Identity},
    blynk::{stub, BlynkClient},
    config::VirtualPins,
    db::models::{User, UserRole},
    users::service::{NewUser, UserService},
};

pub const PASSWORD: &str = "correct-horse-battery";

pub fn keys() -> JwtKeys {
    JwtKeys::new("handler-test-secret", 300, 3600)
}

pub fn state(pool: PgPool, relay_base: &str) -> AppState {
    AppState {
        pool,
        keys: keys(),
        blynk: BlynkClient::new(relay_base, stub::TOKEN, VirtualPins::default()).unwrap(),
    }
}

/// Server whose relay is unreachable.
pub fn test_server(pool: PgPool) -> TestServer {
    TestServer::new(router(state(pool, stub::UNREACHABLE))).unwrap()
}

pub fn test_server_with_relay(pool: PgPool, relay_base: &str) -> TestServer {
    TestServer::new(router(state(pool, relay_base))).unwrap()
}

/// A pool that never connects; for paths rejected before any query runs.
pub fn lazy_pool() -> PgPool {
    PgPoolOptions::new()
        .connect_lazy("postgres://nobody@127.0.0.1:1/unused")
        .unwrap()
}

pub async fn create_user(pool: &PgPool, username: &str) -> User {
    UserService::new(pool.clone())
        .create(NewUser {
            username: username.to_owned(),
            password_hash: password::hash(PASSWORD).unwrap(),
            email: format!("{username}@example.com"),
            first_name: String::new(),
            last_name: String::new(),
            address: None,
            phone_number: None,
            role: UserRole::Default,
        })
        .await
        .unwrap()
}

/// A valid access token for `user`.
pub fn access_token(user: &User) -> String {
    keys()
        .issue(&Identity::from(user), crate::auth::token::TokenKind::Access)
        .unwrap()
}
