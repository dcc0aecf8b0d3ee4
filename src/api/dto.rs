use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::errors::{AppError, FieldErrors};
use crate::{
    db::models::{ControlType, DeviceReading, IrrigationEvent, PumpControl, PumpStatus, User, UserRole},
    irrigation::service::EventFields,
    pump::service::CommandFields,
    readings::service::ReadingFields,
    users::service::UserChanges,
};

const MAX_USERNAME_LEN: usize = 150;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_DEVICE_ID_LEN: usize = 255;
const MAX_ZONE_NAME_LEN: usize = 100;

/// PATCH field that can be cleared: an absent key stays `None` (keep the stored
/// value), an explicit `null` becomes `Some(None)` (clear it).
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn merge<T>(patch: Option<Option<T>>, current: Option<T>) -> Option<T> {
    match patch {
        Some(value) => value,
        None => current,
    }
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeviceFilter {
    /// Only return records submitted by this device.
    pub device_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Users & auth
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserDto {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub role: UserRole,
    pub date_joined: DateTime<Utc>,
    pub is_active: bool,
}

impl From<User> for UserDto {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            address: u.address,
            phone_number: u.phone_number,
            role: u.role,
            date_joined: u.date_joined,
            is_active: u.is_active,
        }
    }
}

/// Request body for `POST /api/users`. New accounts always get the `default` role.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub address: Option<String>,
    pub phone_number: Option<String>,
}

impl RegisterUserRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        check_username(&mut errors, &self.username);
        check_password(&mut errors, &self.password);
        check_email(&mut errors, &self.email);
        errors.into_result()
    }
}

/// Request body for `PUT|PATCH /api/users/{id}`. Absent fields are kept;
/// `null` clears `address` and `phone_number`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub phone_number: Option<Option<String>>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

impl UpdateUserRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        if let Some(email) = &self.email {
            check_email(&mut errors, email);
        }
        if let Some(password) = &self.password {
            check_password(&mut errors, password);
        }
        errors.into_result()
    }

    /// Merge into the stored profile. The password is handled separately.
    pub fn apply(self, current: &User, password_hash: Option<String>) -> UserChanges {
        UserChanges {
            email: self.email.unwrap_or_else(|| current.email.clone()),
            first_name: self.first_name.unwrap_or_else(|| current.first_name.clone()),
            last_name: self.last_name.unwrap_or_else(|| current.last_name.clone()),
            address: merge(self.address, current.address.clone()),
            phone_number: merge(self.phone_number, current.phone_number.clone()),
            role: self.role.unwrap_or(current.role),
            is_active: self.is_active.unwrap_or(current.is_active),
            password_hash,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenPairDto {
    /// Short-lived access token, sent as `Authorization: Bearer <access>`.
    pub access: String,
    /// Long-lived token exchanged for new access tokens.
    pub refresh: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccessTokenDto {
    pub access: String,
}

fn check_username(errors: &mut FieldErrors, username: &str) {
    errors.check(username.trim().is_empty(), "username", "must not be empty");
    errors.check(
        username.chars().count() > MAX_USERNAME_LEN,
        "username",
        "must be at most 150 characters",
    );
    errors.check(
        !username
            .chars()
            .all(|c| c.is_alphanumeric() || "@.+-_".contains(c)),
        "username",
        "may contain only letters, digits and @.+-_",
    );
}

fn check_password(errors: &mut FieldErrors, password: &str) {
    errors.check(
        password.chars().count() < MIN_PASSWORD_LEN,
        "password",
        "must be at least 8 characters",
    );
}

fn check_email(errors: &mut FieldErrors, email: &str) {
    errors.check(
        !email.is_empty() && !email.contains('@'),
        "email",
        "must be a valid email address",
    );
}

// ---------------------------------------------------------------------------
// Irrigation events
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IrrigationEventDto {
    pub id: Uuid,
    pub zone_name: Option<String>,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub water_consumed_liters: Option<f64>,
    /// Soil moisture percentage before irrigation.
    pub moisture_level_before: Option<i32>,
    /// Soil moisture percentage after irrigation.
    pub moisture_level_after: Option<i32>,
    pub notes: Option<String>,
    /// Account that recorded the event.
    pub created_by: Uuid,
    pub created_by_username: String,
    pub created_by_email: String,
    pub created_at: DateTime<Utc>,
}

impl From<IrrigationEvent> for IrrigationEventDto {
    fn from(e: IrrigationEvent) -> Self {
        Self {
            id: e.id,
            zone_name: e.zone_name,
            start_time: e.start_time,
            duration_minutes: e.duration_minutes,
            water_consumed_liters: e.water_consumed_liters,
            moisture_level_before: e.moisture_level_before,
            moisture_level_after: e.moisture_level_after,
            notes: e.notes,
            created_by: e.created_by,
            created_by_username: e.created_by_username,
            created_by_email: e.created_by_email,
            created_at: e.created_at,
        }
    }
}

/// Request body for `POST|PUT /api/devices/irrigation-events`.
///
/// Carries no `created_by`. Unknown keys are ignored and the actor is always
/// the authenticated caller.
#[derive(Debug, Deserialize, ToSchema)]
pub struct IrrigationEventRequest {
    pub zone_name: Option<String>,
    /// Defaults to the time of submission.
    pub start_time: Option<DateTime<Utc>>,
    pub duration_minutes: i32,
    pub water_consumed_liters: Option<f64>,
    pub moisture_level_before: Option<i32>,
    pub moisture_level_after: Option<i32>,
    pub notes: Option<String>,
}

impl IrrigationEventRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        check_event(
            &mut errors,
            self.zone_name.as_deref(),
            Some(self.duration_minutes),
            self.water_consumed_liters,
            self.moisture_level_before,
            self.moisture_level_after,
        );
        errors.into_result()
    }

    /// Fields for a new event; `start_time` falls back to `default_start`.
    pub fn into_fields(self, default_start: DateTime<Utc>) -> EventFields {
        EventFields {
            zone_name: self.zone_name,
            start_time: self.start_time.unwrap_or(default_start),
            duration_minutes: self.duration_minutes,
            water_consumed_liters: self.water_consumed_liters,
            moisture_level_before: self.moisture_level_before,
            moisture_level_after: self.moisture_level_after,
            notes: self.notes,
        }
    }
}

/// Request body for `PATCH /api/devices/irrigation-events/{id}`. Absent fields
/// are kept; `null` clears an optional field.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct IrrigationEventPatch {
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub zone_name: Option<Option<String>>,
    pub start_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<f64>)]
    pub water_consumed_liters: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<i32>)]
    pub moisture_level_before: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<i32>)]
    pub moisture_level_after: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub notes: Option<Option<String>>,
}

impl IrrigationEventPatch {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        check_event(
            &mut errors,
            self.zone_name.as_ref().and_then(Option::as_deref),
            self.duration_minutes,
            self.water_consumed_liters.flatten(),
            self.moisture_level_before.flatten(),
            self.moisture_level_after.flatten(),
        );
        errors.into_result()
    }

    pub fn apply(self, current: EventFields) -> EventFields {
        EventFields {
            zone_name: merge(self.zone_name, current.zone_name),
            start_time: self.start_time.unwrap_or(current.start_time),
            duration_minutes: self.duration_minutes.unwrap_or(current.duration_minutes),
            water_consumed_liters: merge(self.water_consumed_liters, current.water_consumed_liters),
            moisture_level_before: merge(self.moisture_level_before, current.moisture_level_before),
            moisture_level_after: merge(self.moisture_level_after, current.moisture_level_after),
            notes: merge(self.notes, current.notes),
        }
    }
}

fn check_event(
    errors: &mut FieldErrors,
    zone_name: Option<&str>,
    duration_minutes: Option<i32>,
    water_consumed_liters: Option<f64>,
    moisture_level_before: Option<i32>,
    moisture_level_after: Option<i32>,
) {
    if let Some(zone) = zone_name {
        errors.check(
            zone.chars().count() > MAX_ZONE_NAME_LEN,
            "zone_name",
            "must be at most 100 characters",
        );
    }
    if let Some(minutes) = duration_minutes {
        errors.check(minutes <= 0, "duration_minutes", "must be greater than 0");
    }
    if let Some(liters) = water_consumed_liters {
        errors.check(
            !liters.is_finite() || liters < 0.0,
            "water_consumed_liters",
            "must be a non-negative number",
        );
    }
    check_percent(errors, "moisture_level_before", moisture_level_before);
    check_percent(errors, "moisture_level_after", moisture_level_after);
}

fn check_percent(errors: &mut FieldErrors, field: &str, value: Option<i32>) {
    if let Some(v) = value {
        errors.check(!(0..=100).contains(&v), field, "must be between 0 and 100");
    }
}

// ---------------------------------------------------------------------------
// Device readings
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeviceReadingDto {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Degrees Celsius
    pub temperature: f64,
    /// Soil moisture percentage (0-100).
    pub soil_moisture: i32,
    pub device_id: Option<String>,
}

impl From<DeviceReading> for DeviceReadingDto {
    fn from(r: DeviceReading) -> Self {
        Self {
            id: r.id,
            timestamp: r.recorded_at,
            temperature: r.temperature,
            soil_moisture: r.soil_moisture,
            device_id: r.device_id,
        }
    }
}

/// Request body for `POST|PUT .../readings`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DeviceReadingRequest {
    /// Degrees Celsius
    pub temperature: f64,
    /// Soil moisture percentage (0-100).
    pub soil_moisture: i32,
    pub device_id: Option<String>,
}

impl DeviceReadingRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        check_reading(
            &mut errors,
            Some(self.temperature),
            Some(self.soil_moisture),
            self.device_id.as_deref(),
        );
        errors.into_result()
    }
}

impl From<DeviceReadingRequest> for ReadingFields {
    fn from(r: DeviceReadingRequest) -> Self {
        Self {
            temperature: r.temperature,
            soil_moisture: r.soil_moisture,
            device_id: r.device_id,
        }
    }
}

/// Request body for `PATCH .../readings/{id}`. Absent fields are kept;
/// `null` clears `device_id`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DeviceReadingPatch {
    pub temperature: Option<f64>,
    pub soil_moisture: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub device_id: Option<Option<String>>,
}

impl DeviceReadingPatch {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        check_reading(
            &mut errors,
            self.temperature,
            self.soil_moisture,
            self.device_id.as_ref().and_then(Option::as_deref),
        );
        errors.into_result()
    }

    pub fn apply(self, current: ReadingFields) -> ReadingFields {
        ReadingFields {
            temperature: self.temperature.unwrap_or(current.temperature),
            soil_moisture: self.soil_moisture.unwrap_or(current.soil_moisture),
            device_id: merge(self.device_id, current.device_id),
        }
    }
}

fn check_reading(
    errors: &mut FieldErrors,
    temperature: Option<f64>,
    soil_moisture: Option<i32>,
    device_id: Option<&str>,
) {
    if let Some(t) = temperature {
        errors.check(!t.is_finite(), "temperature", "must be a finite number");
    }
    check_percent(errors, "soil_moisture", soil_moisture);
    check_device_id(errors, device_id);
}

fn check_device_id(errors: &mut FieldErrors, device_id: Option<&str>) {
    if let Some(id) = device_id {
        errors.check(
            id.chars().count() > MAX_DEVICE_ID_LEN,
            "device_id",
            "must be at most 255 characters",
        );
    }
}

// ---------------------------------------------------------------------------
// Pump control
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PumpControlDto {
    pub id: Uuid,
    pub status: PumpStatus,
    pub control_type: ControlType,
    pub timestamp: DateTime<Utc>,
    /// Account that issued the command; `null` for anonymous callers and field devices.
    pub controlled_by: Option<Uuid>,
    pub controlled_by_username: Option<String>,
    pub device_id: Option<String>,
    pub notes: Option<String>,
}

impl From<PumpControl> for PumpControlDto {
    fn from(p: PumpControl) -> Self {
        Self {
            id: p.id,
            status: p.status,
            control_type: p.control_type,
            timestamp: p.recorded_at,
            controlled_by: p.controlled_by,
            controlled_by_username: p.controlled_by_username,
            device_id: p.device_id,
            notes: p.notes,
        }
    }
}

/// Request body for `POST|PUT .../pump-control`.
///
/// There is no `controlled_by` field; the actor is decided by the server.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PumpControlRequest {
    /// Defaults to `OFF`.
    #[serde(default)]
    pub status: PumpStatus,
    /// Defaults to `MANUAL`.
    #[serde(default)]
    pub control_type: ControlType,
    pub device_id: Option<String>,
    pub notes: Option<String>,
}

impl PumpControlRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        check_device_id(&mut errors, self.device_id.as_deref());
        errors.into_result()
    }
}

impl From<PumpControlRequest> for CommandFields {
    fn from(r: PumpControlRequest) -> Self {
        Self {
            status: r.status,
            control_type: r.control_type,
            device_id: r.device_id,
            notes: r.notes,
        }
    }
}

/// Request body for `PATCH .../pump-control/{id}`. Absent fields are kept;
/// `null` clears `device_id` or `notes`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PumpControlPatch {
    pub status: Option<PumpStatus>,
    pub control_type: Option<ControlType>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub device_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub notes: Option<Option<String>>,
}

impl PumpControlPatch {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        check_device_id(&mut errors, self.device_id.as_ref().and_then(Option::as_deref));
        errors.into_result()
    }

    pub fn apply(self, current: CommandFields) -> CommandFields {
        CommandFields {
            status: self.status.unwrap_or(current.status),
            control_type: self.control_type.unwrap_or(current.control_type),
            device_id: merge(self.device_id, current.device_id),
            notes: merge(self.notes, current.notes),
        }
    }
}

// ---------------------------------------------------------------------------
// Relay (Blynk)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TemperatureDto {
    /// Degrees Celsius
    pub temperature: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SoilMoistureDto {
    /// Percent
    pub soil_moisture: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PumpStatusDto {
    /// `1` = on, `0` = off.
    pub pump_status: i64,
    pub is_on: bool,
    pub timestamp: DateTime<Utc>,
}

/// Request body for `POST /api/blynk/pump-status`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetPumpStatusRequest {
    /// `true` = on, `false` = off.
    pub status: Option<bool>,
}

impl SetPumpStatusRequest {
    pub fn required_status(&self) -> Result<bool, AppError> {
        let mut errors = FieldErrors::new();
        errors.check(self.status.is_none(), "status", "this field is required");
        errors.into_result()?;
        Ok(self.status.unwrap_or_default())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SetPumpStatusDto {
    pub success: bool,
    /// `1` = on, `0` = off.
    pub pump_status: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DashboardDto {
    pub temperature: f64,
    pub soil_moisture: f64,
    pub pump_status: i64,
    pub is_pump_on: bool,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn field_errors(err: AppError) -> Vec<String> {
        match err {
            AppError::Validation { field_errors, .. } => field_errors.into_keys().collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    fn reading(temperature: f64, soil_moisture: i32) -> DeviceReadingRequest {
        DeviceReadingRequest {
            temperature,
            soil_moisture,
            device_id: None,
        }
    }

    #[test]
    fn reading_within_range_is_valid() {
        assert!(reading(23.5, 40).validate().is_ok());
        assert!(reading(-10.0, 0).validate().is_ok());
        assert!(reading(45.0, 100).validate().is_ok());
    }

    #[test]
    fn reading_moisture_out_of_range_is_rejected() {
        assert_eq!(field_errors(reading(20.0, 101).validate().unwrap_err()), ["soil_moisture"]);
        assert_eq!(field_errors(reading(20.0, -1).validate().unwrap_err()), ["soil_moisture"]);
    }

    #[test]
    fn reading_non_finite_temperature_is_rejected() {
        assert_eq!(
            field_errors(reading(f64::NAN, 50).validate().unwrap_err()),
            ["temperature"]
        );
    }

    #[test]
    fn reading_patch_keeps_absent_fields() {
        let current = ReadingFields {
            temperature: 20.0,
            soil_moisture: 30,
            device_id: Some("esp32-1".into()),
        };
        let patch = DeviceReadingPatch {
            soil_moisture: Some(35),
            ..Default::default()
        };
        let merged = patch.apply(current.clone());
        assert_eq!(merged.temperature, 20.0);
        assert_eq!(merged.soil_moisture, 35);
        assert_eq!(merged.device_id.as_deref(), Some("esp32-1"));

        let clear: DeviceReadingPatch =
            serde_json::from_value(serde_json::json!({ "device_id": null })).unwrap();
        assert_eq!(clear.apply(current).device_id, None);
    }

    #[test]
    fn irrigation_event_requires_positive_duration() {
        let req: IrrigationEventRequest =
            serde_json::from_value(serde_json::json!({ "duration_minutes": 0 })).unwrap();
        assert_eq!(field_errors(req.validate().unwrap_err()), ["duration_minutes"]);
    }

    #[test]
    fn irrigation_event_collects_every_bad_field() {
        let req: IrrigationEventRequest = serde_json::from_value(serde_json::json!({
            "duration_minutes": 15,
            "water_consumed_liters": -2.0,
            "moisture_level_before": 120,
            "moisture_level_after": -5,
        }))
        .unwrap();
        assert_eq!(
            field_errors(req.validate().unwrap_err()),
            [
                "moisture_level_after",
                "moisture_level_before",
                "water_consumed_liters"
            ]
        );
    }

    #[test]
    fn irrigation_event_ignores_caller_supplied_actor() {
        let req: IrrigationEventRequest = serde_json::from_value(serde_json::json!({
            "duration_minutes": 15,
            "created_by": Uuid::new_v4(),
        }))
        .unwrap();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn irrigation_event_start_time_defaults() {
        let now = Utc::now();
        let req: IrrigationEventRequest =
            serde_json::from_value(serde_json::json!({ "duration_minutes": 10 })).unwrap();
        let fields = req.into_fields(now);
        assert_eq!(fields.start_time, now);
        assert_eq!(fields.duration_minutes, 10);
    }

    #[test]
    fn pump_request_defaults_to_off_and_manual() {
        let req: PumpControlRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(req.status, PumpStatus::Off);
        assert_eq!(req.control_type, ControlType::Manual);
    }

    #[test]
    fn pump_request_parses_uppercase_enums() {
        let req: PumpControlRequest = serde_json::from_value(serde_json::json!({
            "status": "ON",
            "control_type": "AUTOMATIC",
        }))
        .unwrap();
        assert_eq!(req.status, PumpStatus::On);
        assert_eq!(req.control_type, ControlType::Automatic);

        let bad = serde_json::from_value::<PumpControlRequest>(serde_json::json!({ "status": "on" }));
        assert!(bad.is_err());
    }

    #[test]
    fn pump_patch_keeps_absent_fields() {
        let current = CommandFields {
            status: PumpStatus::On,
            control_type: ControlType::Automatic,
            device_id: None,
            notes: Some("dry spell".into()),
        };
        let merged = PumpControlPatch {
            status: Some(PumpStatus::Off),
            ..Default::default()
        }
        .apply(current);
        assert_eq!(merged.status, PumpStatus::Off);
        assert_eq!(merged.control_type, ControlType::Automatic);
        assert_eq!(merged.notes.as_deref(), Some("dry spell"));
    }

    #[test]
    fn pump_patch_null_clears_optional_fields() {
        let current = CommandFields {
            status: PumpStatus::On,
            control_type: ControlType::Manual,
            device_id: Some("esp32-a".into()),
            notes: Some("old".into()),
        };
        let patch: PumpControlPatch =
            serde_json::from_value(serde_json::json!({ "notes": null, "device_id": null })).unwrap();
        let merged = patch.apply(current);
        assert_eq!(merged.notes, None);
        assert_eq!(merged.device_id, None);
        assert_eq!(merged.status, PumpStatus::On);
    }

    #[test]
    fn irrigation_patch_distinguishes_null_from_absent() {
        let current = EventFields {
            zone_name: Some("north".into()),
            start_time: Utc::now(),
            duration_minutes: 20,
            water_consumed_liters: Some(12.5),
            moisture_level_before: Some(30),
            moisture_level_after: Some(60),
            notes: Some("hot day".into()),
        };
        let patch: IrrigationEventPatch =
            serde_json::from_value(serde_json::json!({ "notes": null, "moisture_level_after": null }))
                .unwrap();
        assert!(patch.validate().is_ok());
        let merged = patch.apply(current);
        assert_eq!(merged.notes, None);
        assert_eq!(merged.moisture_level_after, None);
        assert_eq!(merged.zone_name.as_deref(), Some("north"));
        assert_eq!(merged.water_consumed_liters, Some(12.5));
    }

    #[test]
    fn registration_rules() {
        let ok = RegisterUserRequest {
            username: "alice".into(),
            password: "long-enough".into(),
            email: "alice@example.com".into(),
            first_name: String::new(),
            last_name: String::new(),
            address: None,
            phone_number: None,
        };
        assert!(ok.validate().is_ok());

        let bad = RegisterUserRequest {
            username: "a l i c e".into(),
            password: "short".into(),
            email: "nope".into(),
            ..ok
        };
        assert_eq!(
            field_errors(bad.validate().unwrap_err()),
            ["email", "password", "username"]
        );
    }

    #[test]
    fn set_pump_status_requires_status() {
        let missing = SetPumpStatusRequest { status: None };
        assert_eq!(
            field_errors(missing.required_status().unwrap_err()),
            ["status"]
        );
        let on = SetPumpStatusRequest { status: Some(true) };
        assert!(on.required_status().unwrap());
    }

    #[test]
    fn reading_dto_exposes_timestamp_and_no_actor() {
        let dto = DeviceReadingDto::from(DeviceReading {
            id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            temperature: 23.5,
            soil_moisture: 40,
            device_id: None,
        });
        let json = serde_json::to_value(&dto).unwrap();
        assert!(json.get("timestamp").is_some());
        assert!(json.get("created_by").is_none());
        assert!(json.get("controlled_by").is_none());
    }
}
