use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// A device is considered online if it reported within this window.
pub const ONLINE_THRESHOLD_SECS: i64 = 60;

/// Mirrors the `device_mode` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "device_mode", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeviceMode {
    Manual,
    Automatic,
    Scheduled,
}

/// Mirrors the `weather_condition` Postgres enum.
///
/// Canonical tag set for the categorical weather observation. Devices report
/// either a bare rain flag (mapped to `Rain`/`Clear`) or a condition string
/// (mapped onto the full set at normalization time).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    sqlx::Type,
    ToSchema,
)]
#[sqlx(type_name = "weather_condition", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Clear,
    Cloudy,
    Rain,
    Storm,
}

impl fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WeatherCondition::Clear => "clear",
            WeatherCondition::Cloudy => "cloudy",
            WeatherCondition::Rain => "rain",
            WeatherCondition::Storm => "storm",
        };
        f.write_str(s)
    }
}

/// A registered sensor node. Rows are created by the device-management
/// service; ingestion only ever touches `last_seen_at`, `actuator_on` and
/// `updated_at`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Device {
    pub id: Uuid,
    /// Firmware-assigned identifier used on the MQTT wire.
    pub external_id: String,
    pub owner_id: Uuid,
    pub mode: DeviceMode,
    /// Pump relay state, updated from heartbeats.
    pub actuator_on: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Device {
    /// Connectivity is derived from `last_seen_at` alone; there is no
    /// stored status column.
    pub fn is_online(&self, now: DateTime<Utc>) -> bool {
        match self.last_seen_at {
            Some(seen) => now - seen <= Duration::seconds(ONLINE_THRESHOLD_SECS),
            None => false,
        }
    }
}

/// One immutable measurement record from one device.
///
/// Measurement fields are nullable: a device payload that omits a field, or
/// sends garbage for it, stores NULL for that field rather than failing the
/// whole reading.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SensorReading {
    pub id: Uuid,
    pub device_id: Uuid,
    /// °C, clamped to [-50, 100].
    pub temperature: Option<f64>,
    /// %, clamped to [0, 100].
    pub humidity: Option<f64>,
    /// %, clamped to [0, 100].
    pub soil_moisture: Option<f64>,
    /// %, clamped to [0, 100]. Only present on nodes with a level sensor.
    pub water_level: Option<f64>,
    pub weather: Option<WeatherCondition>,
    pub recorded_at: DateTime<Utc>,
}
