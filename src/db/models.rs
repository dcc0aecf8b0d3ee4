use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums mirroring Postgres enum types
// ---------------------------------------------------------------------------

/// Mirrors the `user_role` Postgres enum.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    #[default]
    Default,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UserRole::Admin => "admin",
            UserRole::Default => "default",
        })
    }
}

/// Mirrors the `pump_status` Postgres enum.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "pump_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PumpStatus {
    On,
    #[default]
    Off,
}

impl fmt::Display for PumpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PumpStatus::On => "ON",
            PumpStatus::Off => "OFF",
        })
    }
}

/// Mirrors the `control_type` Postgres enum.
///
/// `Manual` means a human issued the command, `Automatic` means a rule did.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "control_type", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ControlType {
    #[default]
    Manual,
    Automatic,
}

impl fmt::Display for ControlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ControlType::Manual => "MANUAL",
            ControlType::Automatic => "AUTOMATIC",
        })
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    /// argon2id PHC string. Never leaves the service.
    pub password_hash: String,
}

/// An irrigation event joined with its creator's username and email.
#[derive(Debug, Clone, FromRow)]
pub struct IrrigationEvent {
    pub id: Uuid,
    pub zone_name: Option<String>,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub water_consumed_liters: Option<f64>,
    /// Percent, 0-100.
    pub moisture_level_before: Option<i32>,
    /// Percent, 0-100.
    pub moisture_level_after: Option<i32>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_by_username: String,
    pub created_by_email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DeviceReading {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    /// Degrees Celsius
    pub temperature: f64,
    /// Percent, 0-100.
    pub soil_moisture: i32,
    pub device_id: Option<String>,
}

/// A pump-control command joined with the controller's username, if any.
#[derive(Debug, Clone, FromRow)]
pub struct PumpControl {
    pub id: Uuid,
    pub status: PumpStatus,
    pub control_type: ControlType,
    pub recorded_at: DateTime<Utc>,
    pub controlled_by: Option<Uuid>,
    pub controlled_by_username: Option<String>,
    pub device_id: Option<String>,
    pub notes: Option<String>,
}
