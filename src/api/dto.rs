use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::db::models::{SensorReading, WeatherCondition};

/// Standard success envelope consumed by the dashboard:
/// `{"success": true, "data": ..., "count": n?}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl<T> Envelope<T> {
    pub fn new(data: T) -> Self {
        Self { success: true, data, count: None }
    }

    pub fn with_count(data: T, count: usize) -> Self {
        Self { success: true, data, count: Some(count) }
    }
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryParams {
    /// Device internal id (UUID). Omit to query all owned devices.
    pub device_id: Option<String>,
    /// Start of time range (RFC3339, inclusive).
    pub start_date: Option<DateTime<Utc>>,
    /// End of time range (RFC3339, inclusive).
    pub end_date: Option<DateTime<Utc>>,
    /// Maximum rows returned (default 100).
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StatisticsParams {
    pub device_id: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Relative window token (`12h`, `24h`, or a day count). Ignored when an
    /// explicit range is present.
    pub time_range: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct HourlyParams {
    pub device_id: Option<String>,
    /// Trailing window size in hours (default 24).
    pub hours: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DailyParams {
    pub device_id: Option<String>,
    /// Trailing window size in days (default 7).
    pub days: Option<i64>,
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadingDto {
    pub id: Uuid,
    pub device_id: Uuid,
    /// Display identifier of the owning device (its wire id).
    pub device_name: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub soil_moisture: Option<f64>,
    pub water_level: Option<f64>,
    pub weather: Option<WeatherCondition>,
    pub recorded_at: DateTime<Utc>,
}

impl ReadingDto {
    pub fn from_reading(r: SensorReading, device_name: &str) -> Self {
        Self {
            id: r.id,
            device_id: r.device_id,
            device_name: device_name.to_owned(),
            temperature: r.temperature,
            humidity: r.humidity,
            soil_moisture: r.soil_moisture,
            water_level: r.water_level,
            weather: r.weather,
            recorded_at: r.recorded_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Overview statistics, or an explicit "nothing to aggregate" message.
/// Never zeroed statistics.
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum StatisticsData {
    Stats(crate::analytics::aggregate::OverviewStats),
    Empty { message: String },
}
