//! ECHONET Lite property and value codes used by the Cocoro cloud.
//!
//! The cloud reports each air-conditioner property as a status entry keyed by
//! its ECHONET property code (EPC). Enumerated properties carry a single-byte
//! value code, numeric properties carry a range value.

use serde::{Deserialize, Serialize};
use strum::{Display, FromRepr};

/// ECHONET property codes reported for an air conditioner.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, FromRepr, Display,
)]
#[repr(u8)]
pub enum StatusCode {
    /// Operation status (on/off)
    #[serde(rename = "80")]
    Power = 0x80,
    /// Air flow rate setting
    #[serde(rename = "A0")]
    Windspeed = 0xA0,
    /// Operation mode setting
    #[serde(rename = "B0")]
    OperationMode = 0xB0,
    /// Set temperature (°C)
    #[serde(rename = "B3")]
    Temperature = 0xB3,
    /// Measured room temperature (°C)
    #[serde(rename = "BB")]
    RoomTemperature = 0xBB,
}

/// Value codes of the operation status property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, Display)]
#[repr(u8)]
pub enum PowerStatus {
    On = 0x30,
    Off = 0x31,
}

/// Value codes of the operation mode property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, Display)]
#[repr(u8)]
pub enum OperationMode {
    Other = 0x40,
    Auto = 0x41,
    Cool = 0x42,
    Heat = 0x43,
    Dehumidify = 0x44,
    Ventilation = 0x45,
}

/// Value codes of the air flow rate property.
///
/// Levels 1 through 8 are manual speeds; `Auto` lets the unit choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, Display)]
#[repr(u8)]
pub enum Windspeed {
    Level1 = 0x31,
    Level2 = 0x32,
    Level3 = 0x33,
    Level4 = 0x34,
    Level5 = 0x35,
    Level6 = 0x36,
    Level7 = 0x37,
    Level8 = 0x38,
    Auto = 0x41,
}

impl Windspeed {
    /// Manual level for 1..=8, `None` otherwise.
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1..=8 => Self::from_repr(0x30 + level),
            _ => None,
        }
    }

    /// Manual level number, `None` for `Auto`.
    pub fn level(self) -> Option<u8> {
        match self {
            Windspeed::Auto => None,
            manual => Some(manual as u8 - 0x30),
        }
    }
}
