use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use super::found;
use crate::{
    api::{
        dto::{IrrigationEventDto, IrrigationEventPatch, IrrigationEventRequest},
        errors::AppError,
    },
    auth::Caller,
    irrigation::IrrigationService,
    policy::{self, Channel, Operation, Resource},
};

const WHAT: &str = "irrigation event";

fn authorize(caller: &Caller, operation: Operation) -> Result<(), AppError> {
    policy::authorize(
        Resource::IrrigationEvent,
        Channel::Web,
        operation,
        caller.identity(),
    )?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/devices/irrigation-events",
    responses(
        (status = 200, description = "Events, most recently recorded first", body = Vec<IrrigationEventDto>),
        (status = 401, description = "Not authenticated"),
    ),
    security(("bearer" = [])),
    tag = "irrigation"
)]
pub async fn list_events(
    State(pool): State<PgPool>,
    caller: Caller,
) -> Result<Json<Vec<IrrigationEventDto>>, AppError> {
    authorize(&caller, Operation::List)?;
    let events = IrrigationService::new(pool).list().await?;
    Ok(Json(events.into_iter().map(Into::into).collect()))
}

/// Record an irrigation event, credited to the caller.
#[utoipa::path(
    post,
    path = "/api/devices/irrigation-events",
    request_body = IrrigationEventRequest,
    responses(
        (status = 201, description = "Event recorded", body = IrrigationEventDto),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Not authenticated"),
    ),
    security(("bearer" = [])),
    tag = "irrigation"
)]
pub async fn create_event(
    State(pool): State<PgPool>,
    caller: Caller,
    payload: Result<Json<IrrigationEventRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IrrigationEventDto>), AppError> {
    authorize(&caller, Operation::Create)?;
    let created_by = policy::attribute(Resource::IrrigationEvent, Channel::Web, caller.identity())?
        .actor()
        .ok_or_else(AppError::not_authenticated)?;

    let Json(body) = payload?;
    body.validate()?;

    let event = IrrigationService::new(pool)
        .create(created_by, body.into_fields(Utc::now()))
        .await?;
    Ok((StatusCode::CREATED, Json(event.into())))
}

#[utoipa::path(
    get,
    path = "/api/devices/irrigation-events/{id}",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "Event", body = IrrigationEventDto),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No such event"),
    ),
    security(("bearer" = [])),
    tag = "irrigation"
)]
pub async fn get_event(
    State(pool): State<PgPool>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<IrrigationEventDto>, AppError> {
    authorize(&caller, Operation::Retrieve)?;
    let Path(id) = path?;
    let event = found(IrrigationService::new(pool).get(id).await?, WHAT)?;
    Ok(Json(event.into()))
}

/// Replace every editable field. An omitted `start_time` keeps the stored one.
#[utoipa::path(
    put,
    path = "/api/devices/irrigation-events/{id}",
    params(("id" = Uuid, Path, description = "Event id")),
    request_body = IrrigationEventRequest,
    responses(
        (status = 200, description = "Updated event", body = IrrigationEventDto),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No such event"),
    ),
    security(("bearer" = [])),
    tag = "irrigation"
)]
pub async fn replace_event(
    State(pool): State<PgPool>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<IrrigationEventRequest>, JsonRejection>,
) -> Result<Json<IrrigationEventDto>, AppError> {
    authorize(&caller, Operation::Update)?;
    let Path(id) = path?;
    let Json(body) = payload?;
    body.validate()?;

    let event = IrrigationService::new(pool)
        .update(id, |current| body.into_fields(current.start_time))
        .await?;
    Ok(Json(found(event, WHAT)?.into()))
}

#[utoipa::path(
    patch,
    path = "/api/devices/irrigation-events/{id}",
    params(("id" = Uuid, Path, description = "Event id")),
    request_body = IrrigationEventPatch,
    responses(
        (status = 200, description = "Updated event", body = IrrigationEventDto),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No such event"),
    ),
    security(("bearer" = [])),
    tag = "irrigation"
)]
pub async fn patch_event(
    State(pool): State<PgPool>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<IrrigationEventPatch>, JsonRejection>,
) -> Result<Json<IrrigationEventDto>, AppError> {
    authorize(&caller, Operation::Update)?;
    let Path(id) = path?;
    let Json(body) = payload?;
    body.validate()?;

    let event = IrrigationService::new(pool)
        .update(id, |current| body.apply(current))
        .await?;
    Ok(Json(found(event, WHAT)?.into()))
}

#[utoipa::path(
    delete,
    path = "/api/devices/irrigation-events/{id}",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 204, description = "Event deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No such event"),
    ),
    security(("bearer" = [])),
    tag = "irrigation"
)]
pub async fn delete_event(
    State(pool): State<PgPool>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    authorize(&caller, Operation::Delete)?;
    let Path(id) = path?;
    if !IrrigationService::new(pool).delete(id).await? {
        return Err(AppError::not_found(WHAT));
    }
    Ok(StatusCode::NO_CONTENT)
}
