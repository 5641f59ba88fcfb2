use thiserror::Error as ThisError;

use crate::homekit::{HomekitCharacteristic, HomekitService};

#[derive(ThisError, Debug)]
pub enum BridgeError {
    #[error("Cocoro authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Failed to query Cocoro devices: {0}")]
    DeviceQueryFailed(String),

    #[error("Failed to fetch device {device_id}: {reason}")]
    DeviceFetchFailed { device_id: u64, reason: String },

    #[error("Failed to submit updates for device {device_id}: {reason}")]
    UpdateSubmissionFailed { device_id: u64, reason: String },

    #[error("Unknown device: {0}")]
    UnknownDevice(u64),

    #[error("Device {device_id} has not reported {status}")]
    StatusUnavailable {
        device_id: u64,
        status: crate::cocoro::StatusCode,
    },

    #[error("Invalid value for {characteristic:?}: {reason}")]
    InvalidCharacteristicValue {
        characteristic: HomekitCharacteristic,
        reason: String,
    },

    #[error("Characteristic {characteristic:?} on {service:?} is not {access}")]
    UnsupportedCharacteristic {
        service: HomekitService,
        characteristic: HomekitCharacteristic,
        access: &'static str,
    },

    #[error("No handler bound for accessory {0}")]
    AccessoryNotBound(uuid::Uuid),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
