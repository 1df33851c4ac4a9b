use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub mqtt_broker_host: String,
    pub mqtt_broker_port: u16,
    pub mqtt_client_id: String,
    pub server_host: String,
    pub server_port: u16,
    /// Readings older than this are purged by the retention sweeper.
    pub retention_days: i64,
    /// Retention sweep interval in seconds.
    pub retention_sweep_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            mqtt_broker_host: required("MQTT_BROKER_HOST")?,
            mqtt_broker_port: optional("MQTT_BROKER_PORT", "1883")
                .parse()
                .context("MQTT_BROKER_PORT must be a valid port number")?,
            mqtt_client_id: optional("MQTT_CLIENT_ID", "garden-telemetry-service"),
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            retention_days: parse_positive(&optional("RETENTION_DAYS", "30"), "RETENTION_DAYS")?,
            retention_sweep_interval_secs: optional("RETENTION_SWEEP_INTERVAL_SECS", "3600")
                .parse()
                .context("RETENTION_SWEEP_INTERVAL_SECS must be a positive integer")?,
        })
    }
}

fn parse_positive(raw: &str, key: &str) -> Result<i64> {
    let value: i64 = raw
        .parse()
        .with_context(|| format!("{key} must be an integer, got: {raw:?}"))?;
    anyhow::ensure!(value > 0, "{key} must be positive, got: {value}");
    Ok(value)
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}
