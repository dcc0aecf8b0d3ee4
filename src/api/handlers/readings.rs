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
        dto::{DeviceFilter, DeviceReadingDto, DeviceReadingPatch, DeviceReadingRequest},
        errors::AppError,
    },
    auth::Caller,
    policy::{self, Channel, Operation, Resource},
    readings::ReadingService,
};

const WHAT: &str = "device reading";

fn authorize(channel: Channel, caller: &Caller, operation: Operation) -> Result<(), AppError> {
    policy::authorize(Resource::DeviceReading, channel, operation, caller.identity())?;
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
) -> Result<Json<Vec<DeviceReadingDto>>, AppError> {
    authorize(channel, caller, Operation::List)?;
    let readings = ReadingService::new(pool)
        .list(filter.device_id.as_deref())
        .await?;
    Ok(Json(readings.into_iter().map(Into::into).collect()))
}

pub(super) async fn create_in(
    channel: Channel,
    pool: PgPool,
    caller: &Caller,
    payload: Result<Json<DeviceReadingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DeviceReadingDto>), AppError> {
    authorize(channel, caller, Operation::Create)?;
    let Json(body) = payload?;
    body.validate()?;

    let reading = ReadingService::new(pool).create(body.into()).await?;
    Ok((StatusCode::CREATED, Json(reading.into())))
}

// ---------------------------------------------------------------------------
// Web tier
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/devices/readings",
    params(DeviceFilter),
    responses(
        (status = 200, description = "Readings, newest first", body = Vec<DeviceReadingDto>),
    ),
    tag = "readings"
)]
pub async fn list_readings(
    State(pool): State<PgPool>,
    caller: Caller,
    query: Result<Query<DeviceFilter>, QueryRejection>,
) -> Result<Json<Vec<DeviceReadingDto>>, AppError> {
    let Query(filter) = query?;
    list_in(Channel::Web, pool, &caller, filter).await
}

/// Store a sensor reading. Open to anonymous callers.
#[utoipa::path(
    post,
    path = "/api/devices/readings",
    request_body = DeviceReadingRequest,
    responses(
        (status = 201, description = "Reading stored", body = DeviceReadingDto),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Invalid credential"),
    ),
    tag = "readings"
)]
pub async fn create_reading(
    State(pool): State<PgPool>,
    caller: Caller,
    payload: Result<Json<DeviceReadingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DeviceReadingDto>), AppError> {
    create_in(Channel::Web, pool, &caller, payload).await
}

#[utoipa::path(
    get,
    path = "/api/devices/readings/{id}",
    params(("id" = Uuid, Path, description = "Reading id")),
    responses(
        (status = 200, description = "Reading", body = DeviceReadingDto),
        (status = 404, description = "No such reading"),
    ),
    tag = "readings"
)]
pub async fn get_reading(
    State(pool): State<PgPool>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<DeviceReadingDto>, AppError> {
    let Path(id) = path?;
    authorize(Channel::Web, &caller, Operation::Retrieve)?;
    let reading = found(ReadingService::new(pool).get(id).await?, WHAT)?;
    Ok(Json(reading.into()))
}

#[utoipa::path(
    put,
    path = "/api/devices/readings/{id}",
    params(("id" = Uuid, Path, description = "Reading id")),
    request_body = DeviceReadingRequest,
    responses(
        (status = 200, description = "Updated reading", body = DeviceReadingDto),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No such reading"),
    ),
    security(("bearer" = [])),
    tag = "readings"
)]
pub async fn replace_reading(
    State(pool): State<PgPool>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<DeviceReadingRequest>, JsonRejection>,
) -> Result<Json<DeviceReadingDto>, AppError> {
    let Path(id) = path?;
    authorize(Channel::Web, &caller, Operation::Update)?;
    let Json(body) = payload?;
    body.validate()?;

    let reading = ReadingService::new(pool)
        .update(id, |_| body.into())
        .await?;
    Ok(Json(found(reading, WHAT)?.into()))
}

#[utoipa::path(
    patch,
    path = "/api/devices/readings/{id}",
    params(("id" = Uuid, Path, description = "Reading id")),
    request_body = DeviceReadingPatch,
    responses(
        (status = 200, description = "Updated reading", body = DeviceReadingDto),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No such reading"),
    ),
    security(("bearer" = [])),
    tag = "readings"
)]
pub async fn patch_reading(
    State(pool): State<PgPool>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<DeviceReadingPatch>, JsonRejection>,
) -> Result<Json<DeviceReadingDto>, AppError> {
    let Path(id) = path?;
    authorize(Channel::Web, &caller, Operation::Update)?;
    let Json(body) = payload?;
    body.validate()?;

    let reading = ReadingService::new(pool)
        .update(id, |current| body.apply(current))
        .await?;
    Ok(Json(found(reading, WHAT)?.into()))
}

#[utoipa::path(
    delete,
    path = "/api/devices/readings/{id}",
    params(("id" = Uuid, Path, description = "Reading id")),
    responses(
        (status = 204, description = "Reading deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No such reading"),
    ),
    security(("bearer" = [])),
    tag = "readings"
)]
pub async fn delete_reading(
    State(pool): State<PgPool>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = path?;
    authorize(Channel::Web, &caller, Operation::Delete)?;
    if !ReadingService::new(pool).delete(id).await? {
        return Err(AppError::not_found(WHAT));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{json, Value};
    use sqlx::PgPool;

    use crate::api::test_support::{access_token, create_user, lazy_pool, test_server};

    #[sqlx::test(migrations = "./migrations")]
    async fn anonymous_reading_is_stored_without_actor(pool: PgPool) {
        let server = test_server(pool);
        let resp = server
            .post("/api/devices/readings")
            .json(&json!({ "temperature": 23.5, "soil_moisture": 40 }))
            .await;
        resp.assert_status(StatusCode::CREATED);

        let body: Value = resp.json();
        assert_eq!(body["temperature"], 23.5);
        assert_eq!(body["soil_moisture"], 40);
        assert!(body["timestamp"].is_string());
        let fields = body.as_object().unwrap();
        assert!(!fields.contains_key("created_by"));
        assert!(!fields.contains_key("controlled_by"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn authenticated_reading_still_has_no_actor(pool: PgPool) {
        let alice = create_user(&pool, "alice").await;
        let server = test_server(pool);
        let body: Value = server
            .post("/api/devices/readings")
            .authorization_bearer(access_token(&alice))
            .json(&json!({ "temperature": 19.0, "soil_moisture": 55, "device_id": "esp32-a" }))
            .await
            .json();
        assert_eq!(body["device_id"], "esp32-a");
        assert!(body.get("created_by").is_none());
    }

    #[tokio::test]
    async fn out_of_range_moisture_is_a_validation_error() {
        let server = test_server(lazy_pool());
        let resp = server
            .post("/api/devices/readings")
            .json(&json!({ "temperature": 20.0, "soil_moisture": 150 }))
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);

        let body: Value = resp.json();
        assert_eq!(body["code"], "VALIDATION_FAILED");
        assert!(body["field_errors"]["soil_moisture"].is_string());
    }

    #[tokio::test]
    async fn wrong_field_type_is_a_validation_error() {
        let server = test_server(lazy_pool());
        let resp = server
            .post("/api/devices/readings")
            .json(&json!({ "temperature": "warm", "soil_moisture": 40 }))
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(resp.json::<Value>()["code"], "VALIDATION_FAILED");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn list_is_newest_first_and_filters_by_device(pool: PgPool) {
        let server = test_server(pool);
        for (device, moisture) in [("esp32-a", 10), ("esp32-b", 20), ("esp32-a", 30)] {
            server
                .post("/api/devices/readings")
                .json(&json!({ "temperature": 20.0, "soil_moisture": moisture, "device_id": device }))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let all: Vec<Value> = server.get("/api/devices/readings").await.json();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0]["soil_moisture"], 30);

        let only_a: Vec<Value> = server
            .get("/api/devices/readings")
            .add_query_param("device_id", "esp32-a")
            .await
            .json();
        let moistures: Vec<_> = only_a.iter().map(|r| r["soil_moisture"].clone()).collect();
        assert_eq!(moistures, vec![json!(30), json!(10)]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn identical_readings_are_stored_separately(pool: PgPool) {
        let server = test_server(pool);
        let payload = json!({ "temperature": 22.0, "soil_moisture": 40, "device_id": "esp32-a" });

        let first: Value = server.post("/api/devices/readings").json(&payload).await.json();
        let second: Value = server.post("/api/devices/readings").json(&payload).await.json();
        assert_ne!(first["id"], second["id"]);

        let readings: Vec<Value> = server.get("/api/devices/readings").await.json();
        assert_eq!(readings.len(), 2);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn patch_null_clears_device_id(pool: PgPool) {
        let alice = create_user(&pool, "alice").await;
        let server = test_server(pool);
        let created: Value = server
            .post("/api/devices/readings")
            .json(&json!({ "temperature": 20.0, "soil_moisture": 35, "device_id": "esp32-a" }))
            .await
            .json();

        let resp = server
            .patch(&format!("/api/devices/readings/{}", created["id"].as_str().unwrap()))
            .authorization_bearer(access_token(&alice))
            .json(&json!({ "device_id": null }))
            .await;
        resp.assert_status_ok();
        let patched: Value = resp.json();
        assert_eq!(patched["device_id"], Value::Null);
        assert_eq!(patched["soil_moisture"], 35);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn edits_require_authentication(pool: PgPool) {
        let alice = create_user(&pool, "alice").await;
        let server = test_server(pool);
        let created: Value = server
            .post("/api/devices/readings")
            .json(&json!({ "temperature": 20.0, "soil_moisture": 35 }))
            .await
            .json();
        let path = format!("/api/devices/readings/{}", created["id"].as_str().unwrap());

        server
            .patch(&path)
            .json(&json!({ "soil_moisture": 36 }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server.delete(&path).await.assert_status(StatusCode::UNAUTHORIZED);

        let patched: Value = server
            .patch(&path)
            .authorization_bearer(access_token(&alice))
            .json(&json!({ "soil_moisture": 36 }))
            .await
            .json();
        assert_eq!(patched["soil_moisture"], 36);
        assert_eq!(patched["temperature"], 20.0);

        server
            .delete(&path)
            .authorization_bearer(access_token(&alice))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server.get(&path).await.assert_status(StatusCode::NOT_FOUND);
    }
}
