use std::collections::HashMap;

use axum::{
    extract::{FromRequestParts, Query, State},
    http::request::Parts,
    Json,
};
use chrono::Utc;
use sqlx::PgPool;
use utoipa::OpenApi;
use uuid::Uuid;

use super::{
    dto::{
        DailyParams, Envelope, HistoryParams, HourlyParams, ReadingDto, StatisticsData,
        StatisticsParams,
    },
    errors::ApiError,
};
use crate::analytics::{
    aggregate::{self, DailyPoint, FieldStats, HourlyPoint, OverviewStats},
    scope::{resolve_scope, DeviceScope},
    window,
};
use crate::db::{
    devices,
    models::{Device, WeatherCondition},
    readings,
};

const DEFAULT_HISTORY_LIMIT: i64 = 100;
const DEFAULT_HOURLY_WINDOW_HOURS: i64 = 24;
const DEFAULT_DAILY_WINDOW_DAYS: i64 = 7;

// ---------------------------------------------------------------------------
// Caller identity
// ---------------------------------------------------------------------------

/// Caller identity, injected as `X-User-Id` by the upstream auth gateway.
/// Sessions and token verification live there; by the time a request reaches
/// this service the header is trusted.
#[derive(Debug, Clone, Copy)]
pub struct CallerId(pub Uuid);

impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .map(CallerId)
            .ok_or(ApiError::MissingCaller)
    }
}

/// Load the caller's devices and resolve the requested scope. Shared by all
/// four query endpoints so ownership checks cannot drift apart.
async fn scoped_devices(
    pool: &PgPool,
    caller: CallerId,
    requested: Option<&str>,
) -> Result<(Vec<Device>, DeviceScope), ApiError> {
    let owned = devices::list_owned_by(pool, caller.0).await?;
    let scope = resolve_scope(&owned, requested)?;
    Ok((owned, scope))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Raw reading history, newest first.
#[utoipa::path(
    get,
    path = "/api/analytics/history",
    params(HistoryParams),
    responses(
        (status = 200, description = "Readings, newest first", body = Envelope<Vec<ReadingDto>>),
        (status = 400, description = "Invalid device identifier"),
        (status = 404, description = "Device not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "analytics"
)]
pub async fn get_history(
    State(pool): State<PgPool>,
    caller: CallerId,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Envelope<Vec<ReadingDto>>>, ApiError> {
    let (owned, scope) = scoped_devices(&pool, caller, params.device_id.as_deref()).await?;
    let ids = match scope {
        DeviceScope::NoDevices => return Ok(Json(Envelope::with_count(vec![], 0))),
        DeviceScope::Devices(ids) => ids,
    };

    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).max(1);
    let rows = readings::scan(&pool, &ids, params.start_date, params.end_date, Some(limit)).await?;

    let names: HashMap<Uuid, &str> =
        owned.iter().map(|d| (d.id, d.external_id.as_str())).collect();
    let data: Vec<ReadingDto> = rows
        .into_iter()
        .map(|r| {
            let name = names.get(&r.device_id).copied().unwrap_or("unknown");
            ReadingDto::from_reading(r, name)
        })
        .collect();

    let count = data.len();
    Ok(Json(Envelope::with_count(data, count)))
}

/// Overview statistics over an explicit date range or a relative window.
#[utoipa::path(
    get,
    path = "/api/analytics/statistics",
    params(StatisticsParams),
    responses(
        (status = 200, description = "Aggregate statistics", body = Envelope<StatisticsData>),
        (status = 400, description = "Invalid device identifier"),
        (status = 404, description = "Device not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "analytics"
)]
pub async fn get_statistics(
    State(pool): State<PgPool>,
    caller: CallerId,
    Query(params): Query<StatisticsParams>,
) -> Result<Json<Envelope<StatisticsData>>, ApiError> {
    let (_, scope) = scoped_devices(&pool, caller, params.device_id.as_deref()).await?;
    let ids = match scope {
        DeviceScope::NoDevices => {
            return Ok(Json(Envelope::new(StatisticsData::Empty {
                message: "No devices registered".to_owned(),
            })))
        }
        DeviceScope::Devices(ids) => ids,
    };

    let w = window::resolve(
        params.start_date,
        params.end_date,
        params.time_range.as_deref(),
        Utc::now(),
    );
    let rows = readings::scan(&pool, &ids, w.start, w.end, None).await?;

    let data = match aggregate::overview(&rows) {
        Some(stats) => StatisticsData::Stats(stats),
        None => StatisticsData::Empty {
            message: "No data in the selected time range".to_owned(),
        },
    };
    Ok(Json(Envelope::new(data)))
}

/// Hourly chart series over the trailing `hours` window.
#[utoipa::path(
    get,
    path = "/api/analytics/hourly",
    params(HourlyParams),
    responses(
        (status = 200, description = "Hourly buckets, ascending", body = Envelope<Vec<HourlyPoint>>),
        (status = 400, description = "Invalid device identifier"),
        (status = 404, description = "Device not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "analytics"
)]
pub async fn get_hourly_series(
    State(pool): State<PgPool>,
    caller: CallerId,
    Query(params): Query<HourlyParams>,
) -> Result<Json<Envelope<Vec<HourlyPoint>>>, ApiError> {
    let (_, scope) = scoped_devices(&pool, caller, params.device_id.as_deref()).await?;
    let ids = match scope {
        DeviceScope::NoDevices => return Ok(Json(Envelope::new(vec![]))),
        DeviceScope::Devices(ids) => ids,
    };

    let hours = params.hours.unwrap_or(DEFAULT_HOURLY_WINDOW_HOURS).max(1);
    let w = window::last_hours(hours, Utc::now());
    let rows = readings::scan(&pool, &ids, w.start, w.end, None).await?;
    Ok(Json(Envelope::new(aggregate::hourly_series(&rows))))
}

/// Daily chart series over the trailing `days` window.
#[utoipa::path(
    get,
    path = "/api/analytics/daily",
    params(DailyParams),
    responses(
        (status = 200, description = "Daily buckets, ascending", body = Envelope<Vec<DailyPoint>>),
        (status = 400, description = "Invalid device identifier"),
        (status = 404, description = "Device not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "analytics"
)]
pub async fn get_daily_series(
    State(pool): State<PgPool>,
    caller: CallerId,
    Query(params): Query<DailyParams>,
) -> Result<Json<Envelope<Vec<DailyPoint>>>, ApiError> {
    let (_, scope) = scoped_devices(&pool, caller, params.device_id.as_deref()).await?;
    let ids = match scope {
        DeviceScope::NoDevices => return Ok(Json(Envelope::new(vec![]))),
        DeviceScope::Devices(ids) => ids,
    };

    let days = params.days.unwrap_or(DEFAULT_DAILY_WINDOW_DAYS).max(1);
    let w = window::last_days(days, Utc::now());
    let rows = readings::scan(&pool, &ids, w.start, w.end, None).await?;
    Ok(Json(Envelope::new(aggregate::daily_series(&rows))))
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(get_history, get_statistics, get_hourly_series, get_daily_series, health),
    components(schemas(
        ReadingDto,
        StatisticsData,
        OverviewStats,
        FieldStats,
        HourlyPoint,
        DailyPoint,
        WeatherCondition,
    )),
    tags(
        (name = "analytics", description = "Telemetry history and statistics endpoints"),
        (name = "system",  description = "System endpoints"),
    ),
    info(
        title = "Garden Telemetry API",
        version = "0.1.0",
        description = "REST API for garden sensor telemetry and aggregate statistics"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
