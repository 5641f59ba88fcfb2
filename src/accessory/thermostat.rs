//! Thermostat service: temperatures and heating/cooling state.

use super::CocoroAccessory;
use crate::cocoro::{OperationMode, PowerStatus, PropertyStatus, StatusCode};
use crate::error::{BridgeError, Result};
use crate::homekit::{CurrentHeatingCoolingState, TargetHeatingCoolingState};
use log::debug;

/// Target state from the raw power and operation mode codes.
///
/// A unit that is off (or has not reported power at all) is `Off`. Modes
/// HomeKit has no word for (dehumidify, ventilation) show as `Cool`;
/// unrecognized modes show as `Auto`.
pub fn target_state_for(power: Option<u8>, mode: Option<u8>) -> TargetHeatingCoolingState {
    match power {
        None => return TargetHeatingCoolingState::Off,
        Some(code) if code == PowerStatus::Off as u8 => return TargetHeatingCoolingState::Off,
        Some(_) => {}
    }

    match mode.and_then(OperationMode::from_repr) {
        Some(OperationMode::Auto) => TargetHeatingCoolingState::Auto,
        Some(OperationMode::Cool) => TargetHeatingCoolingState::Cool,
        Some(OperationMode::Heat) => TargetHeatingCoolingState::Heat,
        Some(OperationMode::Dehumidify) | Some(OperationMode::Ventilation) => {
            TargetHeatingCoolingState::Cool
        }
        Some(OperationMode::Other) | None => TargetHeatingCoolingState::Auto,
    }
}

/// What the compressor is doing, inferred from the target state.
///
/// In auto mode the unit cools while the room is at or above the set
/// temperature and heats below it.
pub fn current_state_for(
    target: TargetHeatingCoolingState,
    room_temperature: Option<f32>,
    set_temperature: Option<f32>,
) -> CurrentHeatingCoolingState {
    match target {
        TargetHeatingCoolingState::Off => CurrentHeatingCoolingState::Off,
        TargetHeatingCoolingState::Heat => CurrentHeatingCoolingState::Heat,
        TargetHeatingCoolingState::Cool => CurrentHeatingCoolingState::Cool,
        TargetHeatingCoolingState::Auto => match (room_temperature, set_temperature) {
            (Some(room), Some(set)) if room < set => CurrentHeatingCoolingState::Heat,
            _ => CurrentHeatingCoolingState::Cool,
        },
    }
}

impl CocoroAccessory {
    pub fn current_temperature(&self) -> Result<f32> {
        let device = self.device.lock();
        device
            .room_temperature()
            .ok_or(BridgeError::StatusUnavailable {
                device_id: device.device_id,
                status: StatusCode::RoomTemperature,
            })
    }

    pub fn target_temperature(&self) -> Result<f32> {
        let device = self.device.lock();
        device
            .state8()
            .temperature
            .ok_or(BridgeError::StatusUnavailable {
                device_id: device.device_id,
                status: StatusCode::Temperature,
            })
    }

    /// Temperature changes must reach the cloud together with power and mode.
    pub fn set_target_temperature(&self, temperature: f32) {
        debug!("[Accessory] {}: setting new temp {}", self.uuid, temperature);
        {
            let mut device = self.device.lock();
            device.queue_temperature_update(temperature);
            device.queue_power_on();
            if let Some(mode) = device.property_status(StatusCode::OperationMode).copied() {
                device.queue_property_status_update(mode);
            }
        }
        self.request_submit();
    }

    pub fn target_heating_cooling_state(&self) -> TargetHeatingCoolingState {
        let device = self.device.lock();
        target_state_for(
            device
                .property_status(StatusCode::Power)
                .and_then(PropertyStatus::single_code),
            device.operation_mode(),
        )
    }

    pub fn current_heating_cooling_state(&self) -> CurrentHeatingCoolingState {
        let target = self.target_heating_cooling_state();
        let device = self.device.lock();
        current_state_for(target, device.room_temperature(), device.temperature())
    }

    pub fn set_target_heating_cooling_state(&self, state: TargetHeatingCoolingState) {
        debug!("[Accessory] {}: setting target state {:?}", self.uuid, state);
        {
            let mut device = self.device.lock();
            match state {
                TargetHeatingCoolingState::Off => device.queue_power_off(),
                TargetHeatingCoolingState::Cool => {
                    device.queue_power_on();
                    device.queue_operation_mode_update(OperationMode::Cool);
                }
                TargetHeatingCoolingState::Heat => {
                    device.queue_power_on();
                    device.queue_operation_mode_update(OperationMode::Heat);
                }
                TargetHeatingCoolingState::Auto => {
                    device.queue_power_on();
                    device.queue_operation_mode_update(OperationMode::Auto);
                }
            }
        }
        self.request_submit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessory::tests::{RecordingBackend, accessory_with, aircon};
    use crate::cocoro::PropertyStatus;

    const ON: Option<u8> = Some(PowerStatus::On as u8);
    const OFF: Option<u8> = Some(PowerStatus::Off as u8);

    #[test]
    fn test_target_state_is_off_whenever_power_is_off() {
        for mode in [0x40, 0x41, 0x42, 0x43, 0x44, 0x45, 0x99] {
            assert_eq!(
                target_state_for(OFF, Some(mode)),
                TargetHeatingCoolingState::Off
            );
        }
        assert_eq!(target_state_for(None, Some(0x42)), TargetHeatingCoolingState::Off);
    }

    #[test]
    fn test_target_state_mode_mapping() {
        let cases = [
            (OperationMode::Auto, TargetHeatingCoolingState::Auto),
            (OperationMode::Cool, TargetHeatingCoolingState::Cool),
            (OperationMode::Heat, TargetHeatingCoolingState::Heat),
            (OperationMode::Dehumidify, TargetHeatingCoolingState::Cool),
            (OperationMode::Ventilation, TargetHeatingCoolingState::Cool),
        ];
        for (mode, expected) in cases {
            assert_eq!(target_state_for(ON, Some(mode as u8)), expected, "{:?}", mode);
        }
        assert_eq!(target_state_for(ON, Some(0x99)), TargetHeatingCoolingState::Auto);
        assert_eq!(target_state_for(ON, None), TargetHeatingCoolingState::Auto);
    }

    #[test]
    fn test_current_state_in_auto_follows_room_temperature() {
        let auto = TargetHeatingCoolingState::Auto;
        assert_eq!(
            current_state_for(auto, Some(26.0), Some(24.0)),
            CurrentHeatingCoolingState::Cool
        );
        assert_eq!(
            current_state_for(auto, Some(24.0), Some(24.0)),
            CurrentHeatingCoolingState::Cool
        );
        assert_eq!(
            current_state_for(auto, Some(20.0), Some(24.0)),
            CurrentHeatingCoolingState::Heat
        );
        assert_eq!(
            current_state_for(auto, None, Some(24.0)),
            CurrentHeatingCoolingState::Cool
        );
    }

    #[test]
    fn test_current_state_mirrors_fixed_modes() {
        assert_eq!(
            current_state_for(TargetHeatingCoolingState::Heat, Some(30.0), Some(20.0)),
            CurrentHeatingCoolingState::Heat
        );
        assert_eq!(
            current_state_for(TargetHeatingCoolingState::Off, Some(30.0), Some(20.0)),
            CurrentHeatingCoolingState::Off
        );
    }

    #[test]
    fn test_auto_unit_reports_cool_or_heat_from_room_temperature() {
        let backend = RecordingBackend::new();
        let device = aircon(PowerStatus::On, OperationMode::Auto, 26.0, 24.0);
        let accessory = accessory_with(device, &backend);
        assert_eq!(
            accessory.current_heating_cooling_state(),
            CurrentHeatingCoolingState::Cool
        );

        let device = aircon(PowerStatus::On, OperationMode::Auto, 20.0, 24.0);
        let accessory = accessory_with(device, &backend);
        assert_eq!(
            accessory.current_heating_cooling_state(),
            CurrentHeatingCoolingState::Heat
        );
    }

    #[test]
    fn test_set_target_temperature_batches_power_and_mode() {
        let backend = RecordingBackend::new();
        let device = aircon(PowerStatus::Off, OperationMode::Heat, 19.0, 22.0);
        let accessory = accessory_with(device, &backend);

        accessory.set_target_temperature(23.5);

        let device = accessory.snapshot();
        assert_eq!(
            device.pending_updates().to_vec(),
            vec![
                PropertyStatus::range(StatusCode::Temperature, 23.5),
                PropertyStatus::single(StatusCode::Power, PowerStatus::On as u8),
                PropertyStatus::single(StatusCode::OperationMode, OperationMode::Heat as u8),
            ]
        );
        assert_eq!(backend.submissions(), 1);
        assert_eq!(accessory.target_temperature().unwrap(), 23.5);
    }

    #[test]
    fn test_set_target_temperature_without_mode_skips_mode() {
        let backend = RecordingBackend::new();
        let device = crate::cocoro::Device::new(1, "Bare", "SHARP", "X", "FE00");
        let accessory = accessory_with(device, &backend);

        accessory.set_target_temperature(25.0);

        assert_eq!(accessory.snapshot().pending_updates().len(), 2);
        assert_eq!(backend.submissions(), 1);
    }

    #[test]
    fn test_set_target_state_queues_power_and_mode() {
        let backend = RecordingBackend::new();
        let device = aircon(PowerStatus::Off, OperationMode::Cool, 25.0, 24.0);
        let accessory = accessory_with(device, &backend);

        accessory.set_target_heating_cooling_state(TargetHeatingCoolingState::Heat);
        assert_eq!(
            accessory.snapshot().pending_updates().to_vec(),
            vec![
                PropertyStatus::single(StatusCode::Power, PowerStatus::On as u8),
                PropertyStatus::single(StatusCode::OperationMode, OperationMode::Heat as u8),
            ]
        );
        assert_eq!(
            accessory.target_heating_cooling_state(),
            TargetHeatingCoolingState::Heat
        );

        accessory.set_target_heating_cooling_state(TargetHeatingCoolingState::Off);
        assert_eq!(
            accessory.target_heating_cooling_state(),
            TargetHeatingCoolingState::Off
        );
        assert_eq!(backend.submissions(), 2);
    }

    #[test]
    fn test_missing_temperatures_are_read_errors() {
        let backend = RecordingBackend::new();
        let device = crate::cocoro::Device::new(1, "Bare", "SHARP", "X", "FE00");
        let accessory = accessory_with(device, &backend);

        assert!(matches!(
            accessory.current_temperature(),
            Err(BridgeError::StatusUnavailable {
                status: StatusCode::RoomTemperature,
                ..
            })
        ));
        assert!(accessory.target_temperature().is_err());
    }
}
