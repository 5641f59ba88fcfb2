//! Accessory records as held by the host.

use crate::cocoro::Device;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for accessory UUIDs derived from Cocoro device ids.
const ACCESSORY_NAMESPACE: Uuid = Uuid::from_u128(0x6b1f_3c2e_8a4d_5f70_9e21_c0c0_a1b2_c3d4);

/// Stable accessory UUID for a seed string (the vendor device id).
pub fn generate_uuid(seed: &str) -> Uuid {
    Uuid::new_v5(&ACCESSORY_NAMESPACE, seed.as_bytes())
}

/// Values of the AccessoryInformation service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessoryInformation {
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
}

/// Per-accessory context persisted with the record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessoryContext {
    pub device: Option<Device>,
}

/// A host-side accessory: identity, display name, information and context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformAccessory {
    pub uuid: Uuid,
    pub display_name: String,
    #[serde(default)]
    pub information: AccessoryInformation,
    #[serde(default)]
    pub context: AccessoryContext,
}

impl PlatformAccessory {
    pub fn new(display_name: impl Into<String>, uuid: Uuid) -> Self {
        Self {
            uuid,
            display_name: display_name.into(),
            information: AccessoryInformation::default(),
            context: AccessoryContext::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_is_stable_per_seed() {
        assert_eq!(generate_uuid("1001"), generate_uuid("1001"));
        assert_ne!(generate_uuid("1001"), generate_uuid("1002"));
    }
}
