//! Device identity and ownership queries.
//!
//! Device rows are owned by the device-management service; this module is
//! the narrow surface the core needs: resolve an external id to a device,
//! list a user's devices, and update the liveness/actuator fields fed by
//! heartbeats.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::models::Device;

const DEVICE_COLUMNS: &str =
    "id, external_id, owner_id, mode, actuator_on, last_seen_at, created_at, updated_at";

/// Resolve the wire identifier a device sends in its MQTT topic.
pub async fn find_by_external_id(pool: &PgPool, external_id: &str) -> sqlx::Result<Option<Device>> {
    sqlx::query_as::<_, Device>(&format!(
        "SELECT {DEVICE_COLUMNS} FROM devices WHERE external_id = $1"
    ))
    .bind(external_id)
    .fetch_optional(pool)
    .await
}

/// All devices owned by `owner_id`, oldest first.
pub async fn list_owned_by(pool: &PgPool, owner_id: Uuid) -> sqlx::Result<Vec<Device>> {
    sqlx::query_as::<_, Device>(&format!(
        "SELECT {DEVICE_COLUMNS} FROM devices WHERE owner_id = $1 ORDER BY created_at"
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await
}

/// Record that the device reported at `seen_at`. Online/offline is computed
/// from this column, so this is the whole liveness update.
pub async fn touch_last_seen(pool: &PgPool, id: Uuid, seen_at: DateTime<Utc>) -> sqlx::Result<()> {
    sqlx::query("UPDATE devices SET last_seen_at = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(seen_at)
        .execute(pool)
        .await?;
    Ok(())
}

/// Overwrite the pump relay state reported in a heartbeat. Concurrent
/// heartbeats race; last writer wins.
pub async fn set_actuator_state(pool: &PgPool, id: Uuid, on: bool) -> sqlx::Result<()> {
    sqlx::query("UPDATE devices SET actuator_on = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(on)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::db::models::DeviceMode;

    /// Register a device the way the device-management service would.
    pub async fn insert_device(pool: &PgPool, external_id: &str, owner_id: Uuid) -> Device {
        sqlx::query_as::<_, Device>(&format!(
            "INSERT INTO devices (external_id, owner_id, mode) VALUES ($1, $2, $3) \
             RETURNING {DEVICE_COLUMNS}"
        ))
        .bind(external_id)
        .bind(owner_id)
        .bind(DeviceMode::Manual)
        .fetch_one(pool)
        .await
        .unwrap()
    }
}
