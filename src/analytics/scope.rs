//! Query Authorization Layer: resolves a caller's device scope.
//!
//! Every statistics/history/chart endpoint goes through `resolve_scope`, so
//! ownership checks behave identically everywhere. The resolver is pure: it
//! operates on the caller's already-loaded device list.

use thiserror::Error;
use uuid::Uuid;

use crate::db::models::Device;

/// The set of device ids a query is permitted and intended to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceScope {
    Devices(Vec<Uuid>),
    /// The caller owns no devices. A valid terminal state: endpoints answer
    /// with an explicit empty result and never hit the reading store.
    NoDevices,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScopeError {
    /// The requested id is not a well-formed store identifier.
    #[error("invalid device identifier")]
    InvalidDeviceIdentifier,
    /// Well-formed but not in the caller's owned set. Also covers "exists
    /// but belongs to someone else": foreign devices must not be probeable.
    #[error("device not found")]
    DeviceNotFound,
}

pub fn resolve_scope(
    owned: &[Device],
    requested: Option<&str>,
) -> Result<DeviceScope, ScopeError> {
    let Some(raw) = requested else {
        if owned.is_empty() {
            return Ok(DeviceScope::NoDevices);
        }
        return Ok(DeviceScope::Devices(owned.iter().map(|d| d.id).collect()));
    };

    let id = Uuid::parse_str(raw).map_err(|_| ScopeError::InvalidDeviceIdentifier)?;
    if owned.iter().any(|d| d.id == id) {
        Ok(DeviceScope::Devices(vec![id]))
    } else {
        Err(ScopeError::DeviceNotFound)
    }
}
