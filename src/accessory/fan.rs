//! Fanv2 service: power, rotation speed and manual/auto fan state.

use super::CocoroAccessory;
use crate::cocoro::{StatusCode, Windspeed};
use crate::homekit::{Active, TargetFanState, TargetHeatingCoolingState};
use log::debug;
use std::sync::atomic::Ordering;

/// Rotation speed shown while the unit runs on automatic air flow.
pub const DEFAULT_ROTATION_SPEED: u8 = 50;

/// Manual air flow level for a HomeKit rotation speed (0..=100).
///
/// `None` means the fan should be switched off. Anything above 100 is
/// treated as 100.
pub fn windspeed_for_speed(speed: u8) -> Option<Windspeed> {
    match speed.min(100) {
        0 => None,
        1..=24 => Some(Windspeed::Level1),
        25..=37 => Some(Windspeed::Level2),
        38..=49 => Some(Windspeed::Level3),
        50..=61 => Some(Windspeed::Level4),
        62..=74 => Some(Windspeed::Level5),
        75..=86 => Some(Windspeed::Level6),
        87..=99 => Some(Windspeed::Level7),
        _ => Some(Windspeed::Level8),
    }
}

/// Representative rotation speed for an air flow level. `None` for auto.
pub fn speed_for_windspeed(windspeed: Windspeed) -> Option<u8> {
    match windspeed {
        Windspeed::Level1 => Some(12),
        Windspeed::Level2 => Some(25),
        Windspeed::Level3 => Some(38),
        Windspeed::Level4 => Some(50),
        Windspeed::Level5 => Some(62),
        Windspeed::Level6 => Some(75),
        Windspeed::Level7 => Some(87),
        Windspeed::Level8 => Some(100),
        Windspeed::Auto => None,
    }
}

/// Seed for the rotation speed shadow from a raw air flow code.
pub(super) fn initial_rotation_speed(windspeed: Option<u8>) -> u8 {
    windspeed
        .and_then(Windspeed::from_repr)
        .and_then(speed_for_windspeed)
        .unwrap_or(DEFAULT_ROTATION_SPEED)
}

impl CocoroAccessory {
    /// Last rotation speed set through HomeKit.
    pub fn rotation_speed(&self) -> u8 {
        self.rotation_speed.load(Ordering::Relaxed)
    }

    pub fn set_rotation_speed(&self, speed: u8) {
        let speed = speed.min(100);
        debug!("[Accessory] {}: setting rotation speed {}", self.uuid, speed);
        self.rotation_speed.store(speed, Ordering::Relaxed);

        {
            let mut device = self.device.lock();
            match windspeed_for_speed(speed) {
                None => device.queue_power_off(),
                Some(windspeed) => {
                    device.queue_windspeed_update(windspeed);
                    reassert_temperature(&mut device);
                }
            }
        }
        self.request_submit();
    }

    pub fn fan_active(&self) -> Active {
        match self.target_heating_cooling_state() {
            TargetHeatingCoolingState::Off => Active::Inactive,
            _ => Active::Active,
        }
    }

    pub fn set_fan_active(&self, active: Active) {
        debug!("[Accessory] {}: setting fan active {:?}", self.uuid, active);
        {
            let mut device = self.device.lock();
            match active {
                Active::Inactive => device.queue_power_off(),
                Active::Active => {
                    device.queue_power_on();
                    reassert_temperature(&mut device);
                }
            }
        }
        self.request_submit();
    }

    pub fn target_fan_state(&self) -> TargetFanState {
        if self.device.lock().windspeed() == Some(Windspeed::Auto as u8) {
            TargetFanState::Auto
        } else {
            TargetFanState::Manual
        }
    }

    /// Switching to manual re-applies the last rotation speed.
    pub fn set_target_fan_state(&self, state: TargetFanState) {
        debug!("[Accessory] {}: setting fan state {:?}", self.uuid, state);
        match state {
            TargetFanState::Auto => {
                {
                    let mut device = self.device.lock();
                    device.queue_windspeed_update(Windspeed::Auto);
                    reassert_temperature(&mut device);
                }
                self.request_submit();
            }
            TargetFanState::Manual => self.set_rotation_speed(self.rotation_speed()),
        }
    }
}

// The cloud drops air flow changes that arrive without the set temperature.
fn reassert_temperature(device: &mut crate::cocoro::Device) {
    if let Some(temperature) = device.property_status(StatusCode::Temperature).copied() {
        device.queue_property_status_update(temperature);
    }
}
