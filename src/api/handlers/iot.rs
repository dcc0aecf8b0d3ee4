//! Routes polled by field devices. Devices hold no account, so nothing
//! created here is ever credited to a user.

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

use super::{pump, readings};
use crate::{
    api::{
        dto::{
            DeviceFilter, DeviceReadingDto, DeviceReadingRequest, PumpControlDto,
            PumpControlPatch, PumpControlRequest,
        },
        errors::AppError,
    },
    auth::Caller,
    policy::{self, Channel, Operation, Resource},
    pump::PumpControlService,
};

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/iot/readings",
    params(DeviceFilter),
    responses((status = 200, description = "Readings, newest first", body = Vec<DeviceReadingDto>)),
    tag = "iot"
)]
pub async fn list_readings(
    State(pool): State<PgPool>,
    caller: Caller,
    query: Result<Query<DeviceFilter>, QueryRejection>,
) -> Result<Json<Vec<DeviceReadingDto>>, AppError> {
    let Query(filter) = query?;
    readings::list_in(Channel::Iot, pool, &caller, filter).await
}

#[utoipa::path(
    post,
    path = "/api/iot/readings",
    request_body = DeviceReadingRequest,
    responses(
        (status = 201, description = "Reading stored", body = DeviceReadingDto),
        (status = 400, description = "Validation failed"),
    ),
    tag = "iot"
)]
pub async fn create_reading(
    State(pool): State<PgPool>,
    caller: Caller,
    payload: Result<Json<DeviceReadingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DeviceReadingDto>), AppError> {
    readings::create_in(Channel::Iot, pool, &caller, payload).await
}

// ---------------------------------------------------------------------------
// Pump control
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/iot/pump-control",
    params(DeviceFilter),
    responses((status = 200, description = "Commands, newest first", body = Vec<PumpControlDto>)),
    tag = "iot"
)]
pub async fn list_commands(
    State(pool): State<PgPool>,
    caller: Caller,
    query: Result<Query<DeviceFilter>, QueryRejection>,
) -> Result<Json<Vec<PumpControlDto>>, AppError> {
    let Query(filter) = query?;
    pump::list_in(Channel::Iot, pool, &caller, filter).await
}

/// Store a command relayed by a device. Always stored without an actor.
#[utoipa::path(
    post,
    path = "/api/iot/pump-control",
    request_body = PumpControlRequest,
    responses(
        (status = 201, description = "Command stored", body = PumpControlDto),
        (status = 400, description = "Validation failed"),
    ),
    tag = "iot"
)]
pub async fn create_command(
    State(pool): State<PgPool>,
    caller: Caller,
    payload: Result<Json<PumpControlRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PumpControlDto>), AppError> {
    pump::create_in(Channel::Iot, pool, &caller, payload).await
}

/// The command a device should currently obey.
#[utoipa::path(
    get,
    path = "/api/iot/pump-control/latest",
    params(DeviceFilter),
    responses(
        (status = 200, description = "Most recent command", body = PumpControlDto),
        (status = 404, description = "No command issued yet"),
    ),
    tag = "iot"
)]
pub async fn latest_command(
    State(pool): State<PgPool>,
    caller: Caller,
    query: Result<Query<DeviceFilter>, QueryRejection>,
) -> Result<Json<PumpControlDto>, AppError> {
    let Query(filter) = query?;
    policy::authorize(
        Resource::PumpControl,
        Channel::Iot,
        Operation::Retrieve,
        caller.identity(),
    )?;
    let command = PumpControlService::new(pool)
        .latest(filter.device_id.as_deref())
        .await?
        .ok_or_else(|| AppError::not_found("pump control"))?;
    Ok(Json(command.into()))
}

#[utoipa::path(
    get,
    path = "/api/iot/pump-control/{id}",
    params(("id" = Uuid, Path, description = "Command id")),
    responses(
        (status = 200, description = "Command", body = PumpControlDto),
        (status = 404, description = "No such command"),
    ),
    tag = "iot"
)]
pub async fn get_command(
    State(pool): State<PgPool>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<PumpControlDto>, AppError> {
    let Path(id) = path?;
    pump::get_in(Channel::Iot, pool, &caller, id).await
}

#[utoipa::path(
    put,
    path = "/api/iot/pump-control/{id}",
    params(("id" = Uuid, Path, description = "Command id")),
    request_body = PumpControlRequest,
    responses(
        (status = 200, description = "Updated command", body = PumpControlDto),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No such command"),
    ),
    security(("bearer" = [])),
    tag = "iot"
)]
pub async fn replace_command(
    State(pool): State<PgPool>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<PumpControlRequest>, JsonRejection>,
) -> Result<Json<PumpControlDto>, AppError> {
    let Path(id) = path?;
    pump::replace_in(Channel::Iot, pool, &caller, id, payload).await
}

#[utoipa::path(
    patch,
    path = "/api/iot/pump-control/{id}",
    params(("id" = Uuid, Path, description = "Command id")),
    request_body = PumpControlPatch,
    responses(
        (status = 200, description = "Updated command", body = PumpControlDto),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No such command"),
    ),
    security(("bearer" = [])),
    tag = "iot"
)]
pub async fn patch_command(
    State(pool): State<PgPool>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<PumpControlPatch>, JsonRejection>,
) -> Result<Json<PumpControlDto>, AppError> {
    let Path(id) = path?;
    pump::patch_in(Channel::Iot, pool, &caller, id, payload).await
}

#[utoipa::path(
    delete,
    path = "/api/iot/pump-control/{id}",
    params(("id" = Uuid, Path, description = "Command id")),
    responses(
        (status = 204, description = "Command deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No such command"),
    ),
    security(("bearer" = [])),
    tag = "iot"
)]
pub async fn delete_command(
    State(pool): State<PgPool>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = path?;
    pump::delete_in(Channel::Iot, pool, &caller, id).await
}
