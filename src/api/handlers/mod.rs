pub mod auth;
pub mod blynk;
pub mod iot;
pub mod irrigation;
pub mod pump;
pub mod readings;
pub mod system;
pub mod users;

use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use super::{dto::*, errors::AppError};
use crate::db::models::{ControlType, PumpStatus, UserRole};

/// `Ok(record)` or `NotFound` naming `what`.
fn found<T>(record: Option<T>, what: &str) -> Result<T, AppError> {
    record.ok_or_else(|| AppError::not_found(what))
}

// ---------------------------------------------------------------------------
// OpenAPI document
// ---------------------------------------------------------------------------

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        system::health,
        users::list_users,
        users::register_user,
        users::get_user,
        users::replace_user,
        users::patch_user,
        users::delete_user,
        auth::login,
        auth::refresh,
        auth::me,
        irrigation::list_events,
        irrigation::create_event,
        irrigation::get_event,
        irrigation::replace_event,
        irrigation::patch_event,
        irrigation::delete_event,
        readings::list_readings,
        readings::create_reading,
        readings::get_reading,
        readings::replace_reading,
        readings::patch_reading,
        readings::delete_reading,
        pump::list_commands,
        pump::create_command,
        pump::get_command,
        pump::replace_command,
        pump::patch_command,
        pump::delete_command,
        iot::list_readings,
        iot::create_reading,
        iot::list_commands,
        iot::create_command,
        iot::latest_command,
        iot::get_command,
        iot::replace_command,
        iot::patch_command,
        iot::delete_command,
        blynk::temperature,
        blynk::soil_moisture,
        blynk::pump_status,
        blynk::set_pump_status,
        blynk::dashboard,
    ),
    components(schemas(
        UserRole,
        PumpStatus,
        ControlType,
        UserDto,
        RegisterUserRequest,
        UpdateUserRequest,
        LoginRequest,
        TokenPairDto,
        RefreshRequest,
        AccessTokenDto,
        IrrigationEventDto,
        IrrigationEventRequest,
        IrrigationEventPatch,
        DeviceReadingDto,
        DeviceReadingRequest,
        DeviceReadingPatch,
        PumpControlDto,
        PumpControlRequest,
        PumpControlPatch,
        TemperatureDto,
        SoilMoistureDto,
        PumpStatusDto,
        SetPumpStatusRequest,
        SetPumpStatusDto,
        DashboardDto,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "system", description = "Liveness"),
        (name = "users", description = "Account management"),
        (name = "auth", description = "Token issue and refresh"),
        (name = "irrigation", description = "Irrigation events (authenticated)"),
        (name = "readings", description = "Device sensor readings"),
        (name = "pump-control", description = "Pump commands from the web tier"),
        (name = "iot", description = "Endpoints polled by field devices"),
        (name = "blynk", description = "Live values relayed through Blynk"),
    ),
    info(
        title = "Smart Irrigation API",
        version = "0.1.0",
        description = "REST API for irrigation records, soil sensor readings and pump control"
    )
)]
pub struct ApiDoc;
