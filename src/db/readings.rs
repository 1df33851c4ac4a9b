//! Reading Store: a device's time-ordered sensor readings.
//!
//! Every read query filters on device and time together, which is why the
//! table carries a composite `(device_id, recorded_at DESC)` index.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{SensorReading, WeatherCondition};

const READING_COLUMNS: &str =
    "id, device_id, temperature, humidity, soil_moisture, water_level, weather, recorded_at";

/// A normalized reading ready to be persisted.
#[derive(Debug, Clone)]
pub struct NewReading {
    pub device_id: Uuid,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub soil_moisture: Option<f64>,
    pub water_level: Option<f64>,
    pub weather: Option<WeatherCondition>,
    pub recorded_at: DateTime<Utc>,
}

/// Insert one reading. Readings are immutable once stored.
pub async fn insert(pool: &PgPool, reading: &NewReading) -> sqlx::Result<SensorReading> {
    sqlx::query_as::<_, SensorReading>(&format!(
        "INSERT INTO sensor_readings \
             (device_id, temperature, humidity, soil_moisture, water_level, weather, recorded_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {READING_COLUMNS}"
    ))
    .bind(reading.device_id)
    .bind(reading.temperature)
    .bind(reading.humidity)
    .bind(reading.soil_moisture)
    .bind(reading.water_level)
    .bind(reading.weather)
    .bind(reading.recorded_at)
    .fetch_one(pool)
    .await
}

/// Range scan over a set of devices, newest first.
///
/// `start`/`end` are inclusive; `None` leaves that side unbounded. `limit`
/// caps the result; `None` returns everything in range, which is what the
/// aggregate queries consume.
pub async fn scan(
    pool: &PgPool,
    device_ids: &[Uuid],
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    limit: Option<i64>,
) -> sqlx::Result<Vec<SensorReading>> {
    sqlx::query_as::<_, SensorReading>(&format!(
        "SELECT {READING_COLUMNS} \
         FROM sensor_readings \
         WHERE device_id = ANY($1) \
           AND ($2::timestamptz IS NULL OR recorded_at >= $2) \
           AND ($3::timestamptz IS NULL OR recorded_at <= $3) \
         ORDER BY recorded_at DESC \
         LIMIT $4"
    ))
    .bind(device_ids)
    .bind(start)
    .bind(end)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Purge readings older than `cutoff`. Returns the number of rows removed.
pub async fn delete_older_than(pool: &PgPool, cutoff: DateTime<Utc>) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM sensor_readings WHERE recorded_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
