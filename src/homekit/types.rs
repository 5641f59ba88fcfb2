//! HomeKit services, characteristics and their enumerated values.

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use strum::FromRepr;

// https://github.com/homebridge/HAP-NodeJS/blob/latest/src/lib/definitions/ServiceDefinitions.ts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HomekitService {
    AccessoryInformation,
    Fanv2,
    Thermostat,
}

// https://github.com/homebridge/HAP-NodeJS/blob/latest/src/lib/definitions/CharacteristicDefinitions.ts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HomekitCharacteristic {
    Active,
    CurrentHeatingCoolingState,
    CurrentTemperature,
    Manufacturer,
    Model,
    Name,
    RotationSpeed,
    SerialNumber,
    TargetFanState,
    TargetHeatingCoolingState,
    TargetTemperature,
}

/// Value exchanged with the host for a characteristic read or write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CharacteristicValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Text(String),
}

impl CharacteristicValue {
    /// Numeric value as float; integers and booleans are widened.
    pub fn as_f32(&self, characteristic: HomekitCharacteristic) -> Result<f32> {
        match self {
            CharacteristicValue::Float(v) => Ok(*v),
            CharacteristicValue::Int(v) => Ok(*v as f32),
            CharacteristicValue::Bool(v) => Ok(if *v { 1.0 } else { 0.0 }),
            CharacteristicValue::Text(_) => Err(invalid(characteristic, "expected a number")),
        }
    }

    /// Numeric value as integer; floats are rounded.
    pub fn as_i32(&self, characteristic: HomekitCharacteristic) -> Result<i32> {
        match self {
            CharacteristicValue::Int(v) => Ok(*v),
            CharacteristicValue::Float(v) if v.is_finite() => Ok(v.round() as i32),
            CharacteristicValue::Bool(v) => Ok(i32::from(*v)),
            _ => Err(invalid(characteristic, "expected an integer")),
        }
    }
}

impl From<bool> for CharacteristicValue {
    fn from(v: bool) -> Self {
        CharacteristicValue::Bool(v)
    }
}

impl From<i32> for CharacteristicValue {
    fn from(v: i32) -> Self {
        CharacteristicValue::Int(v)
    }
}

impl From<u8> for CharacteristicValue {
    fn from(v: u8) -> Self {
        CharacteristicValue::Int(i32::from(v))
    }
}

impl From<f32> for CharacteristicValue {
    fn from(v: f32) -> Self {
        CharacteristicValue::Float(v)
    }
}

impl From<String> for CharacteristicValue {
    fn from(v: String) -> Self {
        CharacteristicValue::Text(v)
    }
}

impl From<&str> for CharacteristicValue {
    fn from(v: &str) -> Self {
        CharacteristicValue::Text(v.to_string())
    }
}

pub(crate) fn invalid(characteristic: HomekitCharacteristic, reason: &str) -> BridgeError {
    BridgeError::InvalidCharacteristicValue {
        characteristic,
        reason: reason.to_string(),
    }
}

/// Numeric constraints the host applies to a characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CharacteristicProps {
    pub min_value: f32,
    pub max_value: f32,
    pub min_step: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum CurrentHeatingCoolingState {
    Off = 0,
    Heat = 1,
    Cool = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum TargetHeatingCoolingState {
    Off = 0,
    Heat = 1,
    Cool = 2,
    Auto = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum Active {
    Inactive = 0,
    Active = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum TargetFanState {
    Manual = 0,
    Auto = 1,
}

/// Decode an enumerated characteristic value.
pub(crate) fn decode_enum<T>(
    value: &CharacteristicValue,
    characteristic: HomekitCharacteristic,
    from_repr: fn(u8) -> Option<T>,
) -> Result<T> {
    let raw = value.as_i32(characteristic)?;
    u8::try_from(raw)
        .ok()
        .and_then(from_repr)
        .ok_or_else(|| invalid(characteristic, &format!("unknown value {}", raw)))
}
