use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio::time;
use tracing::{debug, error, info};

use crate::db::readings;

/// Background purge of readings past the retention horizon.
///
/// Runs on its own interval task, off the query path. A failed or slow
/// sweep is logged and the next tick tries again; it never delays or fails
/// a statistics response.
pub struct RetentionSweeper {
    pool: PgPool,
    retention_days: i64,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(pool: PgPool, retention_days: i64, interval_secs: u64) -> Self {
        Self {
            pool,
            retention_days,
            interval: Duration::from_secs(interval_secs),
        }
    }

    /// Runs the sweep loop indefinitely.
    /// Spawn this via `tokio::spawn`.
    pub async fn run(self) {
        info!(
            retention_days = self.retention_days,
            interval_secs = self.interval.as_secs(),
            "Retention sweeper started"
        );
        let mut ticker = time::interval(self.interval);

        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep_once().await {
                error!(error = %e, "Retention sweep failed");
            }
        }
    }

    pub async fn sweep_once(&self) -> anyhow::Result<()> {
        let cutoff = Utc::now() - chrono::Duration::days(self.retention_days);
        let purged = readings::delete_older_than(&self.pool, cutoff).await?;
        if purged > 0 {
            info!(purged, cutoff = %cutoff, "Purged readings past retention horizon");
        } else {
            debug!(cutoff = %cutoff, "Retention sweep found nothing to purge");
        }
        Ok(())
    }
}
