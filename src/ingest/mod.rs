pub mod normalizer;

use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::PgPool;
use tracing::{debug, error, info, warn};

use crate::db::{
    devices,
    readings::{self, NewReading},
};

/// The three message classes a device publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Periodic measurement payload; becomes a stored reading.
    SensorData,
    /// Liveness message; touches `last_seen_at` and may carry relay state.
    Heartbeat,
    /// Explicit status report; liveness only.
    Status,
}

/// Heartbeat key spellings for the pump relay flag, in priority order.
/// Firmware revisions in the field disagree on the name.
const ACTUATOR_KEYS: &[&str] = &[
    "relay1Status",
    "relay1_status",
    "relayStatus",
    "pumpStatus",
    "pump_status",
];

/// Turns transport messages into persisted readings and device liveness
/// updates.
///
/// This path is fire-and-forget: no acknowledgement goes back over the
/// transport, and no payload, however malformed, may take the ingestion
/// loop down or affect other devices.
pub struct IngestService {
    pool: PgPool,
}

impl IngestService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Transport entry point. Errors are terminal here: logged with device
    /// context, never propagated.
    pub async fn handle_message(
        &self,
        external_id: &str,
        kind: MessageKind,
        payload: &Map<String, Value>,
    ) {
        let result = match kind {
            MessageKind::SensorData => self.ingest_sensor_data(external_id, payload).await,
            MessageKind::Heartbeat => self.update_liveness(external_id, payload, true).await,
            MessageKind::Status => self.update_liveness(external_id, payload, false).await,
        };

        if let Err(e) = result {
            error!(device_id = %external_id, error = %e, "Failed to process device message");
        }
    }

    /// Sensor-data path: resolve the device, normalize, persist. Telemetry
    /// from unregistered devices is dropped (no retry, no dead-letter).
    async fn ingest_sensor_data(
        &self,
        external_id: &str,
        payload: &Map<String, Value>,
    ) -> anyhow::Result<()> {
        let Some(device) = devices::find_by_external_id(&self.pool, external_id).await? else {
            warn!(device_id = %external_id, "Sensor data from unregistered device — dropping");
            return Ok(());
        };

        let draft = normalizer::normalize(payload, Utc::now());
        let reading = readings::insert(
            &self.pool,
            &NewReading {
                device_id: device.id,
                temperature: draft.temperature,
                humidity: draft.humidity,
                soil_moisture: draft.soil_moisture,
                water_level: draft.water_level,
                weather: draft.weather,
                recorded_at: draft.recorded_at,
            },
        )
        .await?;

        debug!(
            device_id = %external_id,
            reading_id = %reading.id,
            recorded_at = %reading.recorded_at,
            "Reading persisted"
        );
        Ok(())
    }

    /// Heartbeat/status path: the device is alive, note when. Heartbeats may
    /// also report the pump relay; when the flag is absent under every known
    /// key the stored state is left untouched. Never creates a reading.
    async fn update_liveness(
        &self,
        external_id: &str,
        payload: &Map<String, Value>,
        with_actuator: bool,
    ) -> anyhow::Result<()> {
        let Some(device) = devices::find_by_external_id(&self.pool, external_id).await? else {
            debug!(device_id = %external_id, "Liveness message from unregistered device");
            return Ok(());
        };

        devices::touch_last_seen(&self.pool, device.id, Utc::now()).await?;

        if with_actuator {
            match extract_actuator_state(payload) {
                Some(on) => {
                    devices::set_actuator_state(&self.pool, device.id, on).await?;
                    info!(device_id = %external_id, actuator_on = on, "Heartbeat");
                }
                None => {
                    debug!(device_id = %external_id, "Heartbeat without relay state");
                }
            }
        }
        Ok(())
    }
}

/// First alias that coerces to a boolean wins; an unrecognized value under
/// one key does not stop a later key from supplying the flag.
fn extract_actuator_state(payload: &Map<String, Value>) -> Option<bool> {
    ACTUATOR_KEYS
        .iter()
        .find_map(|k| payload.get(*k).and_then(normalizer::coerce_bool))
}
