//! Aggregation Engine: summary statistics and time-bucketed series over a
//! filtered reading set.
//!
//! Accumulation runs over unrounded sums; rounding to one decimal happens
//! once, when the output structs are built. Null measurement fields are
//! excluded per field: a reading with no temperature still counts for
//! humidity.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::models::{SensorReading, WeatherCondition};

/// Per-field summary. `avg` is rounded to one decimal; extrema are reported
/// as stored.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FieldStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

/// Single aggregate over the whole filtered set. A field with no non-null
/// readings is absent rather than zeroed.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct OverviewStats {
    pub temperature: Option<FieldStats>,
    pub humidity: Option<FieldStats>,
    pub soil_moisture: Option<FieldStats>,
    pub water_level: Option<FieldStats>,
    /// Canonical weather tag → occurrence count. Readings without a weather
    /// observation are excluded, not a category.
    pub weather_conditions: BTreeMap<WeatherCondition, u64>,
    /// Occurrences of the `rain` tag, surfaced separately for the dashboard.
    pub rain_count: u64,
    pub total_records: u64,
}

/// One point of the hourly series. Averages are rounded to one decimal.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct HourlyPoint {
    /// Chart label, `"dd/MM HH:00"`.
    pub time: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub soil_moisture: Option<f64>,
    pub water_level: Option<f64>,
    pub count: u64,
    /// Timestamp of the chronologically first reading in the bucket.
    pub timestamp: DateTime<Utc>,
}

/// One point of the daily series. Also carries the day's temperature
/// extrema, unrounded.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DailyPoint {
    /// Chart label, `"dd/MM/yyyy"`.
    pub date: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub soil_moisture: Option<f64>,
    pub water_level: Option<f64>,
    pub min_temp: Option<f64>,
    pub max_temp: Option<f64>,
    pub count: u64,
    pub timestamp: DateTime<Utc>,
}

/// Overview statistics, or `None` when the filtered set is empty. Callers
/// answer with an explicit "no data" message instead of NaN-ridden fields.
pub fn overview(readings: &[SensorReading]) -> Option<OverviewStats> {
    if readings.is_empty() {
        return None;
    }

    let mut temperature = FieldAcc::default();
    let mut humidity = FieldAcc::default();
    let mut soil_moisture = FieldAcc::default();
    let mut water_level = FieldAcc::default();
    let mut weather_conditions: BTreeMap<WeatherCondition, u64> = BTreeMap::new();

    for r in readings {
        temperature.push(r.temperature);
        humidity.push(r.humidity);
        soil_moisture.push(r.soil_moisture);
        water_level.push(r.water_level);
        if let Some(w) = r.weather {
            *weather_conditions.entry(w).or_insert(0) += 1;
        }
    }

    let rain_count = weather_conditions
        .get(&WeatherCondition::Rain)
        .copied()
        .unwrap_or(0);

    Some(OverviewStats {
        temperature: temperature.finish(),
        humidity: humidity.finish(),
        soil_moisture: soil_moisture.finish(),
        water_level: water_level.finish(),
        weather_conditions,
        rain_count,
        total_records: readings.len() as u64,
    })
}

/// Group readings by hour (UTC) and average per field. Buckets with no
/// readings are omitted; output is chronologically ascending.
pub fn hourly_series(readings: &[SensorReading]) -> Vec<HourlyPoint> {
    bucketize(readings, truncate_to_hour)
        .into_iter()
        .map(|(key, acc)| HourlyPoint {
            time: format!(
                "{:02}/{:02} {:02}:00",
                key.day(),
                key.month(),
                key.hour()
            ),
            temperature: acc.temperature.avg(),
            humidity: acc.humidity.avg(),
            soil_moisture: acc.soil_moisture.avg(),
            water_level: acc.water_level.avg(),
            count: acc.count,
            timestamp: acc.first_ts,
        })
        .collect()
}

/// Group readings by day (UTC). Daily points additionally report the day's
/// raw temperature extrema.
pub fn daily_series(readings: &[SensorReading]) -> Vec<DailyPoint> {
    bucketize(readings, truncate_to_day)
        .into_iter()
        .map(|(key, acc)| DailyPoint {
            date: format!("{:02}/{:02}/{}", key.day(), key.month(), key.year()),
            temperature: acc.temperature.avg(),
            humidity: acc.humidity.avg(),
            soil_moisture: acc.soil_moisture.avg(),
            water_level: acc.water_level.avg(),
            min_temp: acc.temperature.min(),
            max_temp: acc.temperature.max(),
            count: acc.count,
            timestamp: acc.first_ts,
        })
        .collect()
}

/// Round for display. Applied exactly once, at the presentation boundary.
fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Running sum/extrema for one measurement field, nulls excluded from both
/// the sum and the divisor.
#[derive(Debug, Default)]
struct FieldAcc {
    sum: f64,
    count: u64,
    min: f64,
    max: f64,
}

impl FieldAcc {
    fn push(&mut self, value: Option<f64>) {
        let Some(v) = value else { return };
        if self.count == 0 {
            self.min = v;
            self.max = v;
        } else {
            self.min = self.min.min(v);
            self.max = self.max.max(v);
        }
        self.sum += v;
        self.count += 1;
    }

    fn avg(&self) -> Option<f64> {
        (self.count > 0).then(|| round1(self.sum / self.count as f64))
    }

    fn min(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    fn max(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }

    fn finish(self) -> Option<FieldStats> {
        (self.count > 0).then(|| FieldStats {
            avg: round1(self.sum / self.count as f64),
            min: self.min,
            max: self.max,
        })
    }
}

#[derive(Debug, Default)]
struct BucketAcc {
    temperature: FieldAcc,
    humidity: FieldAcc,
    soil_moisture: FieldAcc,
    water_level: FieldAcc,
    count: u64,
    first_ts: DateTime<Utc>,
}

/// Readings keyed by truncated timestamp, ascending. The store returns rows
/// newest-first, so readings are re-sorted before folding to make "first in
/// bucket" mean chronologically first.
fn bucketize(
    readings: &[SensorReading],
    truncate: fn(DateTime<Utc>) -> DateTime<Utc>,
) -> BTreeMap<DateTime<Utc>, BucketAcc> {
    let mut sorted: Vec<&SensorReading> = readings.iter().collect();
    sorted.sort_by_key(|r| r.recorded_at);

    let mut buckets: BTreeMap<DateTime<Utc>, BucketAcc> = BTreeMap::new();
    for r in sorted {
        let acc = buckets.entry(truncate(r.recorded_at)).or_default();
        if acc.count == 0 {
            acc.first_ts = r.recorded_at;
        }
        acc.temperature.push(r.temperature);
        acc.humidity.push(r.humidity);
        acc.soil_moisture.push(r.soil_moisture);
        acc.water_level.push(r.water_level);
        acc.count += 1;
    }
    buckets
}

fn truncate_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(ts.year(), ts.month(), ts.day(), ts.hour(), 0, 0)
        .single()
        .expect("UTC hour truncation is unambiguous")
}

fn truncate_to_day(ts: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(ts.year(), ts.month(), ts.day(), 0, 0, 0)
        .single()
        .expect("UTC day truncation is unambiguous")
}
