use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::Utc;
use tracing::{info, warn};

use crate::{
    api::{
        dto::{
            DashboardDto, PumpStatusDto, SetPumpStatusDto, SetPumpStatusRequest, SoilMoistureDto,
            TemperatureDto,
        },
        errors::AppError,
    },
    auth::Caller,
    blynk::{models::encode_switch, BlynkClient},
};

/// Log the relay failure in full; the client only learns that the relay is unavailable.
fn unavailable(message: &'static str) -> impl FnOnce(anyhow::Error) -> AppError {
    move |err| {
        warn!(error = %format!("{err:#}"), reason = message, "Blynk call failed");
        AppError::UpstreamUnavailable(message.to_owned())
    }
}

const READ_FAILED: &str = "failed to retrieve data from Blynk";
const WRITE_FAILED: &str = "failed to update pump status on Blynk";

#[utoipa::path(
    get,
    path = "/api/blynk/temperature",
    responses(
        (status = 200, description = "Current temperature", body = TemperatureDto),
        (status = 503, description = "Relay unavailable"),
    ),
    tag = "blynk"
)]
pub async fn temperature(
    State(blynk): State<BlynkClient>,
) -> Result<Json<TemperatureDto>, AppError> {
    let temperature = blynk.temperature().await.map_err(unavailable(READ_FAILED))?;
    Ok(Json(TemperatureDto {
        temperature,
        timestamp: Utc::now(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/blynk/soil-moisture",
    responses(
        (status = 200, description = "Current soil moisture", body = SoilMoistureDto),
        (status = 503, description = "Relay unavailable"),
    ),
    tag = "blynk"
)]
pub async fn soil_moisture(
    State(blynk): State<BlynkClient>,
) -> Result<Json<SoilMoistureDto>, AppError> {
    let soil_moisture = blynk
        .soil_moisture()
        .await
        .map_err(unavailable(READ_FAILED))?;
    Ok(Json(SoilMoistureDto {
        soil_moisture,
        timestamp: Utc::now(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/blynk/pump-status",
    responses(
        (status = 200, description = "Current pump relay state", body = PumpStatusDto),
        (status = 503, description = "Relay unavailable"),
    ),
    tag = "blynk"
)]
pub async fn pump_status(
    State(blynk): State<BlynkClient>,
) -> Result<Json<PumpStatusDto>, AppError> {
    let is_on = blynk.pump_on().await.map_err(unavailable(READ_FAILED))?;
    Ok(Json(PumpStatusDto {
        pump_status: encode_switch(is_on),
        is_on,
        timestamp: Utc::now(),
    }))
}

/// Switch the pump relay. Requires authentication because it actuates hardware.
#[utoipa::path(
    post,
    path = "/api/blynk/pump-status",
    request_body = SetPumpStatusRequest,
    responses(
        (status = 200, description = "Relay switched", body = SetPumpStatusDto),
        (status = 400, description = "Missing status"),
        (status = 401, description = "Not authenticated"),
        (status = 503, description = "Relay unavailable"),
    ),
    security(("bearer" = [])),
    tag = "blynk"
)]
pub async fn set_pump_status(
    State(blynk): State<BlynkClient>,
    caller: Caller,
    payload: Result<Json<SetPumpStatusRequest>, JsonRejection>,
) -> Result<Json<SetPumpStatusDto>, AppError> {
    let identity = caller.require()?;
    let Json(body) = payload?;
    let on = body.required_status()?;

    blynk.set_pump(on).await.map_err(unavailable(WRITE_FAILED))?;
    info!(user_id = %identity.id, on, "Pump relay switched");

    Ok(Json(SetPumpStatusDto {
        success: true,
        pump_status: encode_switch(on),
        timestamp: Utc::now(),
    }))
}

/// Every live value in one response. Fails as a whole if any read fails.
#[utoipa::path(
    get,
    path = "/api/blynk/dashboard-data",
    responses(
        (status = 200, description = "Live values", body = DashboardDto),
        (status = 503, description = "Relay unavailable"),
    ),
    tag = "blynk"
)]
pub async fn dashboard(State(blynk): State<BlynkClient>) -> Result<Json<DashboardDto>, AppError> {
    let (temperature, soil_moisture, is_pump_on) =
        tokio::try_join!(blynk.temperature(), blynk.soil_moisture(), blynk.pump_on())
            .map_err(unavailable(READ_FAILED))?;

    Ok(Json(DashboardDto {
        temperature,
        soil_moisture,
        pump_status: encode_switch(is_pump_on),
        is_pump_on,
        timestamp: Utc::now(),
    }))
}
