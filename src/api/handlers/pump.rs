use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use sqlx::PgPool;
use uuid::Uuid;

use super::found;
use crate::{
    api::{
        dto::{DeviceFilter, PumpControlDto, PumpControlPatch, PumpControlRequest},
        errors::AppError,
    },
    auth::Caller,
    policy::{self, Channel, Operation, Resource},
    pump::{service::CommandFields, PumpControlService},
};

const WHAT: &str = "pump control";

fn authorize(channel: Channel, caller: &Caller, operation: Operation) -> Result<(), AppError> {
    policy::authorize(Resource::PumpControl, channel, operation, caller.identity())?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Shared by the web and device tiers
// ---------------------------------------------------------------------------

pub(super) async fn list_in(
    channel: Channel,
    pool: PgPool,
    caller: &Caller,
    filter: DeviceFilter,
) -> Result<Json<Vec<PumpControlDto>>, AppError> {
    authorize(channel, caller, Operation::List)?;
    let commands = PumpControlService::new(pool)
        .list(filter.device_id.as_deref())
        .await?;
    Ok(Json(commands.into_iter().map(Into::into).collect()))
}

/// Store a command. The actor depends on the tier: the web tier credits an
/// authenticated caller, the device tier never credits anyone.
pub(super) async fn create_in(
    channel: Channel,
    pool: PgPool,
    caller: &Caller,
    payload: Result<Json<PumpControlRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PumpControlDto>), AppError> {
    authorize(channel, caller, Operation::Create)?;
    let controlled_by =
        policy::attribute(Resource::PumpControl, channel, caller.identity())?.actor();

    let Json(body) = payload?;
    body.validate()?;

    let command = PumpControlService::new(pool)
        .create(controlled_by, body.into())
        .await?;
    Ok((StatusCode::CREATED, Json(command.into())))
}

pub(super) async fn get_in(
    channel: Channel,
    pool: PgPool,
    caller: &Caller,
    id: Uuid,
) -> Result<Json<PumpControlDto>, AppError> {
    authorize(channel, caller, Operation::Retrieve)?;
    let command = found(PumpControlService::new(pool).get(id).await?, WHAT)?;
    Ok(Json(command.into()))
}

async fn store_update<F>(
    pool: PgPool,
    id: Uuid,
    merge: F,
) -> Result<Json<PumpControlDto>, AppError>
where
    F: FnOnce(CommandFields) -> CommandFields,
{
    let command = PumpControlService::new(pool).update(id, merge).await?;
    Ok(Json(found(command, WHAT)?.into()))
}

pub(super) async fn replace_in(
    channel: Channel,
    pool: PgPool,
    caller: &Caller,
    id: Uuid,
    payload: Result<Json<PumpControlRequest>, JsonRejection>,
) -> Result<Json<PumpControlDto>, AppError> {
    authorize(channel, caller, Operation::Update)?;
    let Json(body) = payload?;
    body.validate()?;
    store_update(pool, id, |_| body.into()).await
}

pub(super) async fn patch_in(
    channel: Channel,
    pool: PgPool,
    caller: &Caller,
    id: Uuid,
    payload: Result<Json<PumpControlPatch>, JsonRejection>,
) -> Result<Json<PumpControlDto>, AppError> {
    authorize(channel, caller, Operation::Update)?;
    let Json(body) = payload?;
    body.validate()?;
    store_update(pool, id, |current| body.apply(current)).await
}

pub(super) async fn delete_in(
    channel: Channel,
    pool: PgPool,
    caller: &Caller,
    id: Uuid,
) -> Result<StatusCode, AppError> {
    authorize(channel, caller, Operation::Delete)?;
    if !PumpControlService::new(pool).delete(id).await? {
        return Err(AppError::not_found(WHAT));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Web tier
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/devices/pump-control",
    params(DeviceFilter),
    responses(
        (status = 200, description = "Commands, newest first", body = Vec<PumpControlDto>),
        (status = 401, description = "Not authenticated"),
    ),
    security(("bearer" = [])),
    tag = "pump-control"
)]
pub async fn list_commands(
    State(pool): State<PgPool>,
    caller: Caller,
    query: Result<Query<DeviceFilter>, QueryRejection>,
) -> Result<Json<Vec<PumpControlDto>>, AppError> {
    let Query(filter) = query?;
    list_in(Channel::Web, pool, &caller, filter).await
}

/// Issue a pump command. Anonymous commands are accepted and stored without an actor.
#[utoipa::path(
    post,
    path = "/api/devices/pump-control",
    request_body = PumpControlRequest,
    responses(
        (status = 201, description = "Command stored", body = PumpControlDto),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Invalid credential"),
    ),
    security((), ("bearer" = [])),
    tag = "pump-control"
)]
pub async fn create_command(
    State(pool): State<PgPool>,
    caller: Caller,
    payload: Result<Json<PumpControlRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PumpControlDto>), AppError> {
    create_in(Channel::Web, pool, &caller, payload).await
}

#[utoipa::path(
    get,
    path = "/api/devices/pump-control/{id}",
    params(("id" = Uuid, Path, description = "Command id")),
    responses(
        (status = 200, description = "Command", body = PumpControlDto),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No such command"),
    ),
    security(("bearer" = [])),
    tag = "pump-control"
)]
pub async fn get_command(
    State(pool): State<PgPool>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<PumpControlDto>, AppError> {
    let Path(id) = path?;
    get_in(Channel::Web, pool, &caller, id).await
}

#[utoipa::path(
    put,
    path = "/api/devices/pump-control/{id}",
    params(("id" = Uuid, Path, description = "Command id")),
    request_body = PumpControlRequest,
    responses(
        (status = 200, description = "Updated command", body = PumpControlDto),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No such command"),
    ),
    security(("bearer" = [])),
    tag = "pump-control"
)]
pub async fn replace_command(
    State(pool): State<PgPool>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<PumpControlRequest>, JsonRejection>,
) -> Result<Json<PumpControlDto>, AppError> {
    let Path(id) = path?;
    replace_in(Channel::Web, pool, &caller, id, payload).await
}

#[utoipa::path(
    patch,
    path = "/api/devices/pump-control/{id}",
    params(("id" = Uuid, Path, description = "Command id")),
    request_body = PumpControlPatch,
    responses(
        (status = 200, description = "Updated command", body = PumpControlDto),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No such command"),
    ),
    security(("bearer" = [])),
    tag = "pump-control"
)]
pub async fn patch_command(
    State(pool): State<PgPool>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<PumpControlPatch>, JsonRejection>,
) -> Result<Json<PumpControlDto>, AppError> {
    let Path(id) = path?;
    patch_in(Channel::Web, pool, &caller, id, payload).await
}

#[utoipa::path(
    delete,
    path = "/api/devices/pump-control/{id}",
    params(("id" = Uuid, Path, description = "Command id")),
    responses(
        (status = 204, description = "Command deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No such command"),
    ),
    security(("bearer" = [])),
    tag = "pump-control"
)]
pub async fn delete_command(
    State(pool): State<PgPool>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = path?;
    delete_in(Channel::Web, pool, &caller, id).await
}
