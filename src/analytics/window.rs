//! Time-window resolution for statistics queries.
//!
//! Callers supply either an explicit `[start_date, end_date]` pair or a
//! relative token (`12h`, `24h`, a bare day count). Exactly one effective
//! window comes out; an explicit range always wins over a token.

use chrono::{DateTime, Duration, Utc};

/// The resolved query window. Bounds are inclusive; `None` leaves that side
/// unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl Window {
    pub const UNBOUNDED: Window = Window { start: None, end: None };
}

/// Resolve the effective window for an overview-statistics query.
///
/// - Explicit bounds present: use them, defaulting the open end to `now`.
///   A simultaneously-supplied relative token is ignored.
/// - Only a token: `[now - span, now]`.
/// - Neither: unbounded.
pub fn resolve(
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    time_range: Option<&str>,
    now: DateTime<Utc>,
) -> Window {
    if start_date.is_some() || end_date.is_some() {
        return Window {
            start: start_date,
            end: Some(end_date.unwrap_or(now)),
        };
    }

    if let Some(token) = time_range {
        return Window {
            start: parse_relative(token).map(|span| now - span),
            end: Some(now),
        };
    }

    Window::UNBOUNDED
}

/// Window covering the last `hours` hours, used by the hourly series.
pub fn last_hours(hours: i64, now: DateTime<Utc>) -> Window {
    Window {
        start: Some(now - Duration::hours(hours)),
        end: Some(now),
    }
}

/// Window covering the last `days` days, used by the daily series.
pub fn last_days(days: i64, now: DateTime<Utc>) -> Window {
    Window {
        start: Some(now - Duration::days(days)),
        end: Some(now),
    }
}

/// `"12h"`-style tokens are hours; bare integers are day counts. Anything
/// else leaves the window open at the start.
fn parse_relative(token: &str) -> Option<Duration> {
    let token = token.trim();
    if let Some(hours) = token.strip_suffix('h') {
        return hours.parse::<i64>().ok().filter(|h| *h > 0).map(Duration::hours);
    }
    token.parse::<i64>().ok().filter(|d| *d > 0).map(Duration::days)
}
