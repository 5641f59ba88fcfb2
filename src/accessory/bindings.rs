//! Characteristic binding table.
//!
//! Every characteristic the adapter serves is listed here once, with the
//! function that reads it and, for writable ones, the function that decodes
//! and applies a HomeKit write.

use super::CocoroAccessory;
use crate::error::Result;
use crate::homekit::types::{decode_enum, invalid};
use crate::homekit::{
    Active, CharacteristicProps, CharacteristicSpec, CharacteristicValue, HomekitCharacteristic,
    HomekitService, TargetFanState, TargetHeatingCoolingState,
};
use crate::homekit::HomekitCharacteristic as C;
use crate::homekit::HomekitService as S;

pub type ReadFn = fn(&CocoroAccessory) -> Result<CharacteristicValue>;
pub type WriteFn = fn(&CocoroAccessory, &CharacteristicValue) -> Result<()>;

pub struct Binding {
    pub service: HomekitService,
    pub characteristic: HomekitCharacteristic,
    pub read: ReadFn,
    pub write: Option<WriteFn>,
    pub props: Option<CharacteristicProps>,
}

impl Binding {
    pub fn spec(&self) -> CharacteristicSpec {
        CharacteristicSpec {
            service: self.service,
            characteristic: self.characteristic,
            readable: true,
            writable: self.write.is_some(),
            props: self.props,
        }
    }
}

pub const ROTATION_SPEED_PROPS: CharacteristicProps = CharacteristicProps {
    min_value: 0.0,
    max_value: 100.0,
    min_step: 10.0,
};

pub static BINDINGS: &[Binding] = &[
    Binding {
        service: S::AccessoryInformation,
        characteristic: C::Manufacturer,
        read: read_manufacturer,
        write: None,
        props: None,
    },
    Binding {
        service: S::AccessoryInformation,
        characteristic: C::Model,
        read: read_model,
        write: None,
        props: None,
    },
    Binding {
        service: S::AccessoryInformation,
        characteristic: C::SerialNumber,
        read: read_serial_number,
        write: None,
        props: None,
    },
    Binding {
        service: S::AccessoryInformation,
        characteristic: C::Name,
        read: read_name,
        write: None,
        props: None,
    },
    Binding {
        service: S::Thermostat,
        characteristic: C::Name,
        read: read_name,
        write: None,
        props: None,
    },
    Binding {
        service: S::Thermostat,
        characteristic: C::CurrentTemperature,
        read: read_current_temperature,
        write: None,
        props: None,
    },
    Binding {
        service: S::Thermostat,
        characteristic: C::TargetTemperature,
        read: read_target_temperature,
        write: Some(write_target_temperature),
        props: None,
    },
    Binding {
        service: S::Thermostat,
        characteristic: C::CurrentHeatingCoolingState,
        read: read_current_heating_cooling_state,
        write: None,
        props: None,
    },
    Binding {
        service: S::Thermostat,
        characteristic: C::TargetHeatingCoolingState,
        read: read_target_heating_cooling_state,
        write: Some(write_target_heating_cooling_state),
        props: None,
    },
    Binding {
        service: S::Fanv2,
        characteristic: C::Name,
        read: read_name,
        write: None,
        props: None,
    },
    Binding {
        service: S::Fanv2,
        characteristic: C::Active,
        read: read_active,
        write: Some(write_active),
        props: None,
    },
    Binding {
        service: S::Fanv2,
        characteristic: C::RotationSpeed,
        read: read_rotation_speed,
        write: Some(write_rotation_speed),
        props: Some(ROTATION_SPEED_PROPS),
    },
    Binding {
        service: S::Fanv2,
        characteristic: C::TargetFanState,
        read: read_target_fan_state,
        write: Some(write_target_fan_state),
        props: None,
    },
];

pub fn lookup(
    service: HomekitService,
    characteristic: HomekitCharacteristic,
) -> Option<&'static Binding> {
    BINDINGS
        .iter()
        .find(|b| b.service == service && b.characteristic == characteristic)
}

fn read_manufacturer(accessory: &CocoroAccessory) -> Result<CharacteristicValue> {
    Ok(accessory.information().manufacturer.as_str().into())
}

fn read_model(accessory: &CocoroAccessory) -> Result<CharacteristicValue> {
    Ok(accessory.information().model.as_str().into())
}

fn read_serial_number(accessory: &CocoroAccessory) -> Result<CharacteristicValue> {
    Ok(accessory.information().serial_number.as_str().into())
}

fn read_name(accessory: &CocoroAccessory) -> Result<CharacteristicValue> {
    Ok(accessory.name().into())
}

fn read_current_temperature(accessory: &CocoroAccessory) -> Result<CharacteristicValue> {
    accessory.current_temperature().map(Into::into)
}

fn read_target_temperature(accessory: &CocoroAccessory) -> Result<CharacteristicValue> {
    accessory.target_temperature().map(Into::into)
}

fn write_target_temperature(accessory: &CocoroAccessory, value: &CharacteristicValue) -> Result<()> {
    let temperature = value.as_f32(C::TargetTemperature)?;
    if !temperature.is_finite() {
        return Err(invalid(C::TargetTemperature, "temperature must be finite"));
    }
    accessory.set_target_temperature(temperature);
    Ok(())
}

fn read_current_heating_cooling_state(accessory: &CocoroAccessory) -> Result<CharacteristicValue> {
    Ok((accessory.current_heating_cooling_state() as u8).into())
}

fn read_target_heating_cooling_state(accessory: &CocoroAccessory) -> Result<CharacteristicValue> {
    Ok((accessory.target_heating_cooling_state() as u8).into())
}

fn write_target_heating_cooling_state(
    accessory: &CocoroAccessory,
    value: &CharacteristicValue,
) -> Result<()> {
    let state = decode_enum(
        value,
        C::TargetHeatingCoolingState,
        TargetHeatingCoolingState::from_repr,
    )?;
    accessory.set_target_heating_cooling_state(state);
    Ok(())
}

fn read_active(accessory: &CocoroAccessory) -> Result<CharacteristicValue> {
    Ok((accessory.fan_active() as u8).into())
}

fn write_active(accessory: &CocoroAccessory, value: &CharacteristicValue) -> Result<()> {
    let active = decode_enum(value, C::Active, Active::from_repr)?;
    accessory.set_fan_active(active);
    Ok(())
}

fn read_rotation_speed(accessory: &CocoroAccessory) -> Result<CharacteristicValue> {
    Ok(accessory.rotation_speed().into())
}

fn write_rotation_speed(accessory: &CocoroAccessory, value: &CharacteristicValue) -> Result<()> {
    let speed = value.as_i32(C::RotationSpeed)?;
    let speed = u8::try_from(speed)
        .ok()
        .filter(|speed| *speed <= 100)
        .ok_or_else(|| invalid(C::RotationSpeed, &format!("{} is outside 0..=100", speed)))?;
    accessory.set_rotation_speed(speed);
    Ok(())
}

fn read_target_fan_state(accessory: &CocoroAccessory) -> Result<CharacteristicValue> {
    Ok((accessory.target_fan_state() as u8).into())
}

fn write_target_fan_state(accessory: &CocoroAccessory, value: &CharacteristicValue) -> Result<()> {
    let state = decode_enum(value, C::TargetFanState, TargetFanState::from_repr)?;
    accessory.set_target_fan_state(state);
    Ok(())
}
