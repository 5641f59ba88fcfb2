//! Host framework interface.
//!
//! The host owns accessory records and the HomeKit side of the bridge. A
//! platform registers accessories with it and binds one
//! [`CharacteristicHandler`] per accessory to serve characteristic reads and
//! writes.

use super::accessory::PlatformAccessory;
use super::types::{CharacteristicProps, CharacteristicValue, HomekitCharacteristic, HomekitService};
use crate::error::Result;
use std::sync::Arc;
use uuid::Uuid;

/// A characteristic served by a handler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharacteristicSpec {
    pub service: HomekitService,
    pub characteristic: HomekitCharacteristic,
    pub readable: bool,
    pub writable: bool,
    pub props: Option<CharacteristicProps>,
}

/// Serves characteristic reads and writes for one accessory.
///
/// # Example
/// ```ignore
/// host.bind_handler(accessory.uuid, adapter.clone());
///
/// // Later, when HomeKit reads the thermostat's current temperature:
/// let value = handler.read(HomekitService::Thermostat, HomekitCharacteristic::CurrentTemperature)?;
/// ```
pub trait CharacteristicHandler: Send + Sync + 'static {
    /// Characteristics this handler serves.
    fn characteristics(&self) -> Vec<CharacteristicSpec>;

    /// Called when HomeKit reads a characteristic.
    fn read(
        &self,
        service: HomekitService,
        characteristic: HomekitCharacteristic,
    ) -> Result<CharacteristicValue>;

    /// Called when HomeKit writes a characteristic.
    fn write(
        &self,
        service: HomekitService,
        characteristic: HomekitCharacteristic,
        value: CharacteristicValue,
    ) -> Result<()>;
}

/// Accessory lifecycle operations offered by the host.
pub trait AccessoryHost: Send + Sync + 'static {
    /// Publish newly created accessories.
    fn register_accessories(&self, accessories: &[PlatformAccessory]);

    /// Persist changed context of already registered accessories.
    fn update_accessories(&self, accessories: &[PlatformAccessory]);

    /// Remove accessories and their handlers.
    fn unregister_accessories(&self, accessories: &[PlatformAccessory]);

    /// Attach the handler serving an accessory's characteristics.
    fn bind_handler(&self, uuid: Uuid, handler: Arc<dyn CharacteristicHandler>);
}
