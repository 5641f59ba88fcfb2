//! HomeKit host side of the bridge.
//!
//! - `types`: services, characteristics and value enums
//! - `accessory`: accessory records and UUID generation
//! - `host`: the host framework interface
//! - `local`: in-process host with a JSON accessory cache

pub mod accessory;
pub mod host;
pub mod local;
pub mod types;

pub use accessory::{AccessoryContext, AccessoryInformation, PlatformAccessory, generate_uuid};
pub use host::{AccessoryHost, CharacteristicHandler, CharacteristicSpec};
pub use local::{AccessoryCache, LocalHost};
pub use types::{
    Active, CharacteristicProps, CharacteristicValue, CurrentHeatingCoolingState,
    HomekitCharacteristic, HomekitService, TargetFanState, TargetHeatingCoolingState,
};
