use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use sqlx::PgPool;
use uuid::Uuid;

use super::found;
use crate::{
    api::{
        dto::{RegisterUserRequest, UpdateUserRequest, UserDto},
        errors::AppError,
    },
    auth::{password, Caller},
    db::models::UserRole,
    users::{service::NewUser, UserService},
};

/// Register a new account. Open to anonymous callers.
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Account created", body = UserDto),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Username already taken"),
    ),
    tag = "users"
)]
pub async fn register_user(
    State(pool): State<PgPool>,
    payload: Result<Json<RegisterUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserDto>), AppError> {
    let Json(body) = payload?;
    body.validate()?;

    let user = UserService::new(pool)
        .create(NewUser {
            password_hash: password::hash_blocking(body.password).await?,
            username: body.username,
            email: body.email,
            first_name: body.first_name,
            last_name: body.last_name,
            address: body.address,
            phone_number: body.phone_number,
            role: UserRole::Default,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All accounts", body = Vec<UserDto>),
        (status = 401, description = "Not authenticated"),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn list_users(
    State(pool): State<PgPool>,
    caller: Caller,
) -> Result<Json<Vec<UserDto>>, AppError> {
    caller.require()?;
    let users = UserService::new(pool).list().await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Account", body = UserDto),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No such account"),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn get_user(
    State(pool): State<PgPool>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<UserDto>, AppError> {
    caller.require()?;
    let Path(id) = path?;
    let user = found(UserService::new(pool).get(id).await?, "user")?;
    Ok(Json(user.into()))
}

/// Username is immutable, so a full replacement accepts the same fields as a patch.
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated account", body = UserDto),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No such account"),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn replace_user(
    state: State<PgPool>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserDto>, AppError> {
    update_user(state, caller, path, payload).await
}

#[utoipa::path(
    patch,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated account", body = UserDto),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No such account"),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn patch_user(
    state: State<PgPool>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserDto>, AppError> {
    update_user(state, caller, path, payload).await
}

async fn update_user(
    State(pool): State<PgPool>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserDto>, AppError> {
    caller.require()?;
    let Path(id) = path?;
    let Json(mut body) = payload?;
    body.validate()?;

    let password_hash = match body.password.take() {
        Some(plain) => Some(password::hash_blocking(plain).await?),
        None => None,
    };

    let user = UserService::new(pool)
        .update(id, |current| body.apply(current, password_hash))
        .await?;

    Ok(Json(found(user, "user")?.into()))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No such account"),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn delete_user(
    State(pool): State<PgPool>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    caller.require()?;
    let Path(id) = path?;
    if !UserService::new(pool).delete(id).await? {
        return Err(AppError::not_found("user"));
    }
    Ok(StatusCode::NO_CONTENT)
}
