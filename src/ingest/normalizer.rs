//! Payload Normalizer: turns a raw, untrusted device payload into a typed,
//! bounded reading draft.
//!
//! Devices in the field disagree on key spellings, send numbers as strings,
//! and report timestamps from clocks that may be unset, device-relative
//! (millis since boot) or in the wrong unit. Everything here is a pure
//! function of `(payload, now)` with no I/O. No input can make it fail:
//! a field that cannot be understood becomes `None`, a timestamp that
//! cannot be trusted becomes the ingestion wall clock.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::db::models::WeatherCondition;

/// Sane temperature range accepted from a garden node, °C.
pub const TEMPERATURE_MIN: f64 = -50.0;
pub const TEMPERATURE_MAX: f64 = 100.0;

/// 2020-01-01T00:00:00Z in epoch milliseconds. Anything earlier cannot be a
/// real observation time from this fleet.
const TIMESTAMP_MIN_MS: i64 = 1_577_836_800_000;

/// Device timestamps are allowed to run at most this far ahead of the
/// ingestion clock.
const TIMESTAMP_FUTURE_SLACK_MS: i64 = 86_400_000;

/// Raw values below this look like epoch seconds rather than milliseconds
/// (every valid millisecond timestamp in the accepted window is far above it).
const SECONDS_SCALE_CUTOFF: f64 = 1_000_000_000.0;

// Accepted key spellings per logical field, in priority order.
const TEMPERATURE_KEYS: &[&str] = &["temperature", "temp"];
const HUMIDITY_KEYS: &[&str] = &["humidity", "hum"];
const SOIL_MOISTURE_KEYS: &[&str] = &["soilMoisture", "soil_moisture", "soil"];
const WATER_LEVEL_KEYS: &[&str] = &["waterLevel", "water_level"];
const RAIN_FLAG_KEYS: &[&str] = &["isRain", "is_rain", "rain"];
const CONDITION_KEYS: &[&str] = &["weather", "weatherCondition", "weather_condition", "condition"];
const TIMESTAMP_KEYS: &[&str] = &["timestamp", "ts"];

/// A fully-typed reading, ready for identity resolution and persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingDraft {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub soil_moisture: Option<f64>,
    pub water_level: Option<f64>,
    pub weather: Option<WeatherCondition>,
    pub recorded_at: DateTime<Utc>,
}

/// Normalize a raw sensor-data payload.
///
/// `now` is the ingestion wall clock, passed in so the whole function stays
/// deterministic under test.
pub fn normalize(payload: &Map<String, Value>, now: DateTime<Utc>) -> ReadingDraft {
    ReadingDraft {
        temperature: numeric_field(payload, TEMPERATURE_KEYS)
            .into_bounded(TEMPERATURE_MIN, TEMPERATURE_MAX),
        humidity: numeric_field(payload, HUMIDITY_KEYS).into_bounded(0.0, 100.0),
        soil_moisture: numeric_field(payload, SOIL_MOISTURE_KEYS).into_bounded(0.0, 100.0),
        water_level: numeric_field(payload, WATER_LEVEL_KEYS).into_bounded(0.0, 100.0),
        weather: weather_field(payload),
        recorded_at: resolve_timestamp(first_present(payload, TIMESTAMP_KEYS), now),
    }
}

/// Outcome of looking a numeric field up in the payload. `Absent` and
/// `Invalid` are kept apart internally (they mean different things about the
/// device) but both resolve to `None` in the draft.
#[derive(Debug, Clone, Copy, PartialEq)]
enum FieldValue {
    Absent,
    Invalid,
    Number(f64),
}

impl FieldValue {
    fn into_bounded(self, min: f64, max: f64) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(n.clamp(min, max)),
            FieldValue::Absent | FieldValue::Invalid => None,
        }
    }
}

fn first_present<'a>(payload: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| payload.get(*k))
}

/// Try each alias in priority order; the first coercible value wins. A key
/// that is present but garbage does not stop a later alias from supplying
/// the value.
fn numeric_field(payload: &Map<String, Value>, keys: &[&str]) -> FieldValue {
    let mut saw_any = false;
    for key in keys {
        if let Some(value) = payload.get(*key) {
            saw_any = true;
            if let Some(n) = coerce_number(value) {
                return FieldValue::Number(n);
            }
        }
    }
    if saw_any {
        FieldValue::Invalid
    } else {
        FieldValue::Absent
    }
}

/// JSON number, or a string that parses as a finite float. Everything else
/// is uncoercible.
fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Booleans arrive as JSON bools, the strings `"true"`/`"1"`/`"false"`/`"0"`,
/// or bare numbers. Also used for the heartbeat actuator flag.
pub(crate) fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        _ => None,
    }
}

/// Map the payload's weather information onto the canonical tag set.
///
/// A recognized condition string wins over the bare rain flag; the rain flag
/// covers the older firmware that only reports `isRain`.
fn weather_field(payload: &Map<String, Value>) -> Option<WeatherCondition> {
    for key in CONDITION_KEYS {
        if let Some(Value::String(s)) = payload.get(*key) {
            if let Some(condition) = condition_from_str(s) {
                return Some(condition);
            }
        }
    }
    for key in RAIN_FLAG_KEYS {
        if let Some(value) = payload.get(*key) {
            if let Some(raining) = coerce_bool(value) {
                return Some(if raining {
                    WeatherCondition::Rain
                } else {
                    WeatherCondition::Clear
                });
            }
        }
    }
    None
}

fn condition_from_str(s: &str) -> Option<WeatherCondition> {
    match s.trim().to_ascii_lowercase().as_str() {
        "clear" | "sunny" => Some(WeatherCondition::Clear),
        "cloudy" | "overcast" => Some(WeatherCondition::Cloudy),
        "rain" | "rainy" | "drizzle" => Some(WeatherCondition::Rain),
        "storm" | "stormy" | "thunderstorm" => Some(WeatherCondition::Storm),
        _ => None,
    }
}

/// Resolve a possibly-corrupt device timestamp into a trustworthy one.
///
/// Accepted as-is when it reads as epoch milliseconds inside
/// [2020-01-01, now + 24 h]; retried as epoch seconds when the raw value is
/// below the seconds-scale cutoff; otherwise (uptime counters, unset clocks,
/// garbage) the ingestion wall clock wins. Never fails.
fn resolve_timestamp(raw: Option<&Value>, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(value) = raw else { return now };
    let Some(n) = coerce_number(value) else { return now };

    let max_ms = now.timestamp_millis() + TIMESTAMP_FUTURE_SLACK_MS;
    let in_window = |ms: i64| (TIMESTAMP_MIN_MS..=max_ms).contains(&ms);

    let as_millis = n as i64;
    if in_window(as_millis) {
        return from_millis(as_millis).unwrap_or(now);
    }

    if n < SECONDS_SCALE_CUTOFF {
        let scaled = (n * 1000.0) as i64;
        if in_window(scaled) {
            return from_millis(scaled).unwrap_or(now);
        }
    }

    now
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap()
    }

    // -----------------------------------------------------------------------
    // Numeric fields
    // -----------------------------------------------------------------------

    #[test]
    fn in_range_values_pass_through() {
        let draft = normalize(
            &payload(json!({
                "temperature": 21.5,
                "humidity": 60,
                "soilMoisture": 42.5,
                "waterLevel": 80
            })),
            now(),
        );
        assert_eq!(draft.temperature, Some(21.5));
        assert_eq!(draft.humidity, Some(60.0));
        assert_eq!(draft.soil_moisture, Some(42.5));
        assert_eq!(draft.water_level, Some(80.0));
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let draft = normalize(
            &payload(json!({
                "temperature": 240.0,
                "humidity": -5,
                "soilMoisture": 101,
                "waterLevel": 1e9
            })),
            now(),
        );
        assert_eq!(draft.temperature, Some(TEMPERATURE_MAX));
        assert_eq!(draft.humidity, Some(0.0));
        assert_eq!(draft.soil_moisture, Some(100.0));
        assert_eq!(draft.water_level, Some(100.0));
    }

    #[test]
    fn temperature_clamps_at_lower_bound() {
        let draft = normalize(&payload(json!({ "temperature": -273.15 })), now());
        assert_eq!(draft.temperature, Some(TEMPERATURE_MIN));
    }

    #[test]
    fn numeric_strings_are_coerced() {
        let draft = normalize(&payload(json!({ "temperature": "21.5", "humidity": " 60 " })), now());
        assert_eq!(draft.temperature, Some(21.5));
        assert_eq!(draft.humidity, Some(60.0));
    }

    #[test]
    fn garbage_and_missing_fields_become_null() {
        let draft = normalize(
            &payload(json!({
                "temperature": "warm",
                "humidity": null,
                "soilMoisture": {"v": 40}
            })),
            now(),
        );
        assert_eq!(draft.temperature, None);
        assert_eq!(draft.humidity, None);
        assert_eq!(draft.soil_moisture, None);
        assert_eq!(draft.water_level, None);
    }

    #[test]
    fn non_finite_strings_are_rejected() {
        let draft = normalize(&payload(json!({ "temperature": "NaN", "humidity": "inf" })), now());
        assert_eq!(draft.temperature, None);
        assert_eq!(draft.humidity, None);
    }

    #[test]
    fn alias_keys_are_tried_in_priority_order() {
        // Primary spelling wins over the alias.
        let draft = normalize(&payload(json!({ "temperature": 20.0, "temp": 99.0 })), now());
        assert_eq!(draft.temperature, Some(20.0));

        // Alias fills in when the primary is absent.
        let draft = normalize(&payload(json!({ "temp": 19.0, "soil": 33.0 })), now());
        assert_eq!(draft.temperature, Some(19.0));
        assert_eq!(draft.soil_moisture, Some(33.0));
    }

    #[test]
    fn uncoercible_primary_falls_through_to_alias() {
        let draft = normalize(&payload(json!({ "temperature": "broken", "temp": 18.5 })), now());
        assert_eq!(draft.temperature, Some(18.5));
    }

    // -----------------------------------------------------------------------
    // Weather
    // -----------------------------------------------------------------------

    #[test]
    fn rain_flag_maps_to_two_value_vocabulary() {
        let draft = normalize(&payload(json!({ "isRain": true })), now());
        assert_eq!(draft.weather, Some(WeatherCondition::Rain));

        let draft = normalize(&payload(json!({ "isRain": false })), now());
        assert_eq!(draft.weather, Some(WeatherCondition::Clear));
    }

    #[test]
    fn rain_flag_accepts_string_and_numeric_encodings() {
        let draft = normalize(&payload(json!({ "isRain": "true" })), now());
        assert_eq!(draft.weather, Some(WeatherCondition::Rain));

        let draft = normalize(&payload(json!({ "rain": 0 })), now());
        assert_eq!(draft.weather, Some(WeatherCondition::Clear));
    }

    #[test]
    fn condition_string_maps_onto_canonical_set() {
        for (input, expected) in [
            ("clear", WeatherCondition::Clear),
            ("Sunny", WeatherCondition::Clear),
            ("overcast", WeatherCondition::Cloudy),
            ("rainy", WeatherCondition::Rain),
            ("THUNDERSTORM", WeatherCondition::Storm),
        ] {
            let draft = normalize(&payload(json!({ "weather": input })), now());
            assert_eq!(draft.weather, Some(expected), "input {input:?}");
        }
    }

    #[test]
    fn condition_string_wins_over_rain_flag() {
        let draft = normalize(&payload(json!({ "weather": "storm", "isRain": false })), now());
        assert_eq!(draft.weather, Some(WeatherCondition::Storm));
    }

    #[test]
    fn unrecognized_condition_falls_back_to_rain_flag() {
        let draft = normalize(&payload(json!({ "weather": "hail?", "isRain": true })), now());
        assert_eq!(draft.weather, Some(WeatherCondition::Rain));
    }

    #[test]
    fn absent_weather_is_null_not_a_category() {
        let draft = normalize(&payload(json!({ "temperature": 20.0 })), now());
        assert_eq!(draft.weather, None);
    }

    // -----------------------------------------------------------------------
    // Timestamp resolution
    // -----------------------------------------------------------------------

    #[test]
    fn missing_timestamp_uses_wall_clock() {
        let draft = normalize(&payload(json!({ "temperature": 20.0 })), now());
        assert_eq!(draft.recorded_at, now());
    }

    #[test]
    fn valid_millisecond_timestamp_is_accepted_as_is() {
        let ts = now() - chrono::Duration::hours(2);
        let draft =
            normalize(&payload(json!({ "timestamp": ts.timestamp_millis() })), now());
        assert_eq!(draft.recorded_at, ts);
    }

    #[test]
    fn sub_billion_inputs_rescale_as_seconds_or_fall_back() {
        // Values below the cutoff are re-read as epoch seconds. Scaled by
        // 1000 they still land before the 2020 window floor, so the wall
        // clock wins; never a 1970s/1990s date.
        let draft = normalize(&payload(json!({ "timestamp": 999_999_999 })), now());
        assert_eq!(draft.recorded_at, now());
    }

    #[test]
    fn seconds_scale_epoch_for_today_is_not_mistaken_for_millis() {
        // An honest epoch-seconds clock reads ~1.7e9: out of the millisecond
        // window and above the seconds cutoff, so it is discarded.
        let draft = normalize(&payload(json!({ "timestamp": now().timestamp() })), now());
        assert_eq!(draft.recorded_at, now());
    }

    #[test]
    fn uptime_scale_values_fall_back_to_wall_clock() {
        // millis() from a device that booted ~20 minutes ago. Scaled by 1000
        // it still lands in 1970 and must never be stored as a 1970 date.
        let draft = normalize(&payload(json!({ "timestamp": 1_234_567 })), now());
        assert_eq!(draft.recorded_at, now());
    }

    #[test]
    fn far_future_timestamps_fall_back_to_wall_clock() {
        let future = now() + chrono::Duration::days(2);
        let draft =
            normalize(&payload(json!({ "timestamp": future.timestamp_millis() })), now());
        assert_eq!(draft.recorded_at, now());
    }

    #[test]
    fn slightly_future_timestamps_within_slack_are_accepted() {
        let future = now() + chrono::Duration::hours(3);
        let draft =
            normalize(&payload(json!({ "timestamp": future.timestamp_millis() })), now());
        assert_eq!(draft.recorded_at, future);
    }

    #[test]
    fn pre_2020_timestamps_fall_back_to_wall_clock() {
        // 2019-01-01 in ms: valid epoch time, but before the fleet existed.
        let draft = normalize(&payload(json!({ "timestamp": 1_546_300_800_000i64 })), now());
        assert_eq!(draft.recorded_at, now());
    }

    #[test]
    fn non_numeric_timestamp_falls_back_to_wall_clock() {
        let draft = normalize(&payload(json!({ "timestamp": "yesterday" })), now());
        assert_eq!(draft.recorded_at, now());
    }

    #[test]
    fn string_encoded_epoch_is_coerced_like_a_number() {
        let ts = now() - chrono::Duration::minutes(5);
        let draft = normalize(
            &payload(json!({ "timestamp": ts.timestamp_millis().to_string() })),
            now(),
        );
        assert_eq!(draft.recorded_at, ts);
    }

    #[test]
    fn timestamp_resolution_is_idempotent() {
        let ts = now() - chrono::Duration::hours(1);
        let p = payload(json!({ "timestamp": ts.timestamp_millis() }));
        let first = normalize(&p, now()).recorded_at;
        let second = normalize(&p, now()).recorded_at;
        assert_eq!(first, second);
        assert_eq!(first, ts);
    }

    // -----------------------------------------------------------------------
    // Bool coercion (shared with the heartbeat path)
    // -----------------------------------------------------------------------

    #[test]
    fn coerce_bool_accepts_known_encodings() {
        assert_eq!(coerce_bool(&json!(true)), Some(true));
        assert_eq!(coerce_bool(&json!("true")), Some(true));
        assert_eq!(coerce_bool(&json!("TRUE")), Some(true));
        assert_eq!(coerce_bool(&json!("1")), Some(true));
        assert_eq!(coerce_bool(&json!("false")), Some(false));
        assert_eq!(coerce_bool(&json!("0")), Some(false));
        assert_eq!(coerce_bool(&json!(1)), Some(true));
        assert_eq!(coerce_bool(&json!(0)), Some(false));
        assert_eq!(coerce_bool(&json!("on")), None);
        assert_eq!(coerce_bool(&json!([true])), None);
    }
}
