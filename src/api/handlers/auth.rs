use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use sqlx::PgPool;
use tracing::info;

use super::found;
use crate::{
    api::{
        dto::{AccessTokenDto, LoginRequest, RefreshRequest, TokenPairDto, UserDto},
        errors::AppError,
    },
    auth::{
        token::{JwtKeys, TokenKind},
        Caller, Identity,
    },
    users::UserService,
};

/// Exchange a username and password for an access/refresh token pair.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair", body = TokenPairDto),
        (status = 400, description = "Malformed body"),
        (status = 401, description = "Bad credentials or inactive account"),
    ),
    tag = "auth"
)]
pub async fn login(
    State(pool): State<PgPool>,
    State(keys): State<JwtKeys>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenPairDto>, AppError> {
    let Json(body) = payload?;

    let user = UserService::new(pool)
        .authenticate(&body.username, &body.password)
        .await?
        .ok_or_else(|| {
            AppError::Unauthorized("no active account found with the given credentials".to_owned())
        })?;

    let pair = keys.issue_pair(&Identity::from(&user))?;
    info!(user_id = %user.id, username = %user.username, "User logged in");

    Ok(Json(TokenPairDto {
        access: pair.access,
        refresh: pair.refresh,
    }))
}

/// Issue a fresh access token from a refresh token.
#[utoipa::path(
    post,
    path = "/api/auth/login/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = AccessTokenDto),
        (status = 401, description = "Invalid or expired refresh token"),
    ),
    tag = "auth"
)]
pub async fn refresh(
    State(pool): State<PgPool>,
    State(keys): State<JwtKeys>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<AccessTokenDto>, AppError> {
    let Json(body) = payload?;

    let claims = keys
        .verify(&body.refresh, TokenKind::Refresh)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;

    // The account may have been deactivated since the refresh token was issued.
    let user = UserService::new(pool)
        .find_active(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("user not found or inactive".to_owned()))?;

    let access = keys.issue(&Identity::from(&user), TokenKind::Access)?;
    Ok(Json(AccessTokenDto { access }))
}

/// The account behind the presented access token.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserDto),
        (status = 401, description = "Not authenticated"),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn me(State(pool): State<PgPool>, caller: Caller) -> Result<Json<UserDto>, AppError> {
    let identity = caller.require()?;
    let user = found(UserService::new(pool).get(identity.id).await?, "user")?;
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{json, Value};
    use sqlx::PgPool;

    use crate::api::test_support::{create_user, lazy_pool, test_server, PASSWORD};

    #[sqlx::test(migrations = "./migrations")]
    async fn login_refresh_and_me(pool: PgPool) {
        let alice = create_user(&pool, "alice").await;
        let server = test_server(pool);

        let resp = server
            .post("/api/auth/login")
            .json(&json!({ "username": "alice", "password": PASSWORD }))
            .await;
        resp.assert_status_ok();
        let pair: Value = resp.json();
        let access = pair["access"].as_str().unwrap().to_owned();
        let refresh = pair["refresh"].as_str().unwrap().to_owned();

        let me: Value = server
            .get("/api/auth/me")
            .authorization_bearer(&access)
            .await
            .json();
        assert_eq!(me["id"], alice.id.to_string());
        assert_eq!(me["username"], "alice");
        assert!(me.get("password_hash").is_none());

        let resp = server
            .post("/api/auth/login/refresh")
            .json(&json!({ "refresh": refresh }))
            .await;
        resp.assert_status_ok();
        let fresh: Value = resp.json();
        server
            .get("/api/auth/me")
            .authorization_bearer(fresh["access"].as_str().unwrap())
            .await
            .assert_status_ok();
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn wrong_password_and_unknown_user_look_the_same(pool: PgPool) {
        create_user(&pool, "alice").await;
        let server = test_server(pool);

        let wrong = server
            .post("/api/auth/login")
            .json(&json!({ "username": "alice", "password": "not-the-password" }))
            .await;
        let unknown = server
            .post("/api/auth/login")
            .json(&json!({ "username": "mallory", "password": PASSWORD }))
            .await;

        wrong.assert_status(StatusCode::UNAUTHORIZED);
        unknown.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.json::<Value>(), unknown.json::<Value>());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn access_token_is_not_a_refresh_token(pool: PgPool) {
        create_user(&pool, "alice").await;
        let server = test_server(pool);

        let pair: Value = server
            .post("/api/auth/login")
            .json(&json!({ "username": "alice", "password": PASSWORD }))
            .await
            .json();

        server
            .post("/api/auth/login/refresh")
            .json(&json!({ "refresh": pair["access"] }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn deactivated_user_cannot_log_in(pool: PgPool) {
        create_user(&pool, "alice").await;
        sqlx::query("UPDATE users SET is_active = false WHERE username = 'alice'")
            .execute(&pool)
            .await
            .unwrap();
        let server = test_server(pool);

        server
            .post("/api/auth/login")
            .json(&json!({ "username": "alice", "password": PASSWORD }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn me_requires_authentication() {
        let server = test_server(lazy_pool());
        let resp = server.get("/api/auth/me").await;
        resp.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(resp.json::<Value>()["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn garbage_refresh_token_is_unauthorized() {
        let server = test_server(lazy_pool());
        server
            .post("/api/auth/login/refresh")
            .json(&json!({ "refresh": "not.a.jwt" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}
