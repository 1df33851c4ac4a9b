//! MQTT transport: subscribes to the device topic tree and hands inbound
//! messages to the ingestion pipeline.
//!
//! Delivery is at-most-once (QoS 0), matching the fire-and-forget ingestion
//! contract: nothing is acknowledged back to devices, and a dropped message
//! is just dropped. The loop reconnects on transport errors and never takes
//! the process down.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use serde_json::Value;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::ingest::{IngestService, MessageKind};

const TOPIC_PREFIX: &str = "iot/device/";

/// One subscription per message class; `+` matches the device's external id.
const SUBSCRIPTIONS: &[&str] = &[
    "iot/device/+/sensor/data",
    "iot/device/+/heartbeat",
    "iot/device/+/status",
];

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

pub struct MqttIngest {
    client: AsyncClient,
    event_loop: EventLoop,
    service: IngestService,
}

impl MqttIngest {
    pub fn new(config: &Config, service: IngestService) -> Self {
        let mut options = MqttOptions::new(
            config.mqtt_client_id.clone(),
            config.mqtt_broker_host.clone(),
            config.mqtt_broker_port,
        );
        options.set_keep_alive(Duration::from_secs(30));

        let (client, event_loop) = AsyncClient::new(options, 64);
        Self { client, event_loop, service }
    }

    /// Runs the subscription loop indefinitely.
    /// Spawn this via `tokio::spawn`.
    pub async fn run(mut self) {
        info!("MQTT ingest loop started");
        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("Connected to MQTT broker");
                    // Subscriptions do not survive a reconnect; renew on
                    // every ConnAck.
                    for topic in SUBSCRIPTIONS {
                        if let Err(e) = self.client.subscribe(*topic, QoS::AtMostOnce).await {
                            error!(topic = %topic, error = %e, "Subscribe failed");
                        }
                    }
                }
                Ok(Event::Incoming(Incoming::Publish(publish))) => {
                    Self::dispatch(&self.service, &publish.topic, &publish.payload).await;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "MQTT connection error; reconnecting");
                    time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }

    async fn dispatch(service: &IngestService, topic: &str, raw: &[u8]) {
        let Some((external_id, kind)) = parse_topic(topic) else {
            debug!(topic = %topic, "Ignoring message on unrecognized topic");
            return;
        };

        let payload = match serde_json::from_slice::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                warn!(device_id = %external_id, "Payload is not a JSON object — dropping");
                return;
            }
            Err(e) => {
                warn!(device_id = %external_id, error = %e, "Non-JSON payload — dropping");
                return;
            }
        };

        service.handle_message(external_id, kind, &payload).await;
    }
}

/// Parse `iot/device/{external_id}/{class}` into the device's wire id and
/// the message class. Returns `None` for anything outside the grammar.
pub fn parse_topic(topic: &str) -> Option<(&str, MessageKind)> {
    let rest = topic.strip_prefix(TOPIC_PREFIX)?;
    let (external_id, suffix) = rest.split_once('/')?;
    if external_id.is_empty() {
        return None;
    }
    let kind = match suffix {
        "sensor/data" => MessageKind::SensorData,
        "heartbeat" => MessageKind::Heartbeat,
        "status" => MessageKind::Status,
        _ => return None,
    };
    Some((external_id, kind))
}
