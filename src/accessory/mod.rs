//! Device adapter: one Cocoro air conditioner exposed as a HomeKit accessory.
//!
//! A [`CocoroAccessory`] owns the shared device record and serves the
//! Thermostat and Fanv2 services through the binding table in [`bindings`].
//! Writes queue property updates on the device and ask the backend to submit
//! them; a background task refreshes the device from the cloud.

pub mod bindings;
mod fan;
mod thermostat;

pub use fan::{DEFAULT_ROTATION_SPEED, speed_for_windspeed, windspeed_for_speed};
pub use thermostat::{current_state_for, target_state_for};

use crate::cocoro::{Device, SharedDevice};
use crate::error::{BridgeError, Result};
use crate::homekit::{
    AccessoryInformation, CharacteristicHandler, CharacteristicSpec, CharacteristicValue,
    HomekitCharacteristic, HomekitService, PlatformAccessory,
};
use async_trait::async_trait;
use log::{debug, warn};
use std::sync::Arc;
use std::sync::atomic::AtomicU8;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

/// Cloud-facing operations an accessory needs from its platform.
#[async_trait]
pub trait DeviceBackend: Send + Sync + 'static {
    /// Fetch the latest server state of `device`.
    async fn fetch_device(&self, device: &Device) -> Result<Device>;

    /// Request submission of the device's queued updates.
    fn submit_device_updates(&self, device: &SharedDevice);
}

pub struct CocoroAccessory {
    uuid: Uuid,
    information: AccessoryInformation,
    device: SharedDevice,
    backend: Arc<dyn DeviceBackend>,
    rotation_speed: AtomicU8,
}

impl CocoroAccessory {
    /// Build the adapter for `device` and stamp its identity onto the
    /// host-side accessory record.
    pub fn new(
        accessory: &mut PlatformAccessory,
        device: Device,
        backend: Arc<dyn DeviceBackend>,
    ) -> Arc<Self> {
        let information = AccessoryInformation {
            manufacturer: device.maker.clone(),
            model: device.model.clone(),
            serial_number: device.serial().to_string(),
        };
        accessory.information = information.clone();
        accessory.context.device = Some(device.clone());

        let rotation_speed = fan::initial_rotation_speed(device.windspeed());
        Arc::new(Self {
            uuid: accessory.uuid,
            information,
            device: device.into_shared(),
            backend,
            rotation_speed: AtomicU8::new(rotation_speed),
        })
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn information(&self) -> &AccessoryInformation {
        &self.information
    }

    pub fn name(&self) -> String {
        self.device.lock().name.clone()
    }

    pub fn device(&self) -> &SharedDevice {
        &self.device
    }

    /// Copy of the device record including queued updates.
    pub fn snapshot(&self) -> Device {
        self.device.lock().clone()
    }

    pub fn submission_count(&self) -> u64 {
        self.device.lock().submission_count()
    }

    /// Take server state fetched after submission `since`, keeping updates
    /// not yet confirmed and codes submitted while the fetch was running.
    pub fn merge_device(&self, fresh: Device, since: u64) {
        self.device.lock().merge_refresh(fresh, since);
    }

    pub async fn refresh(&self) -> Result<()> {
        let (current, since) = {
            let device = self.device.lock();
            (device.clone(), device.submission_count())
        };
        debug!("[Accessory] Refreshing {}", current.name);
        let fresh = self.backend.fetch_device(&current).await?;
        self.merge_device(fresh, since);
        Ok(())
    }

    /// Refresh every `period` until `cancel` fires. The first refresh runs
    /// one period after the call.
    pub fn spawn_refresh(
        self: &Arc<Self>,
        period: Duration,
        cancel: CancellationToken,
        tracker: &TaskTracker,
    ) {
        let accessory = Arc::clone(self);
        tracker.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = accessory.refresh() => {
                        if let Err(e) = result {
                            warn!("[Accessory] Refresh of {} failed: {}", accessory.uuid, e);
                        }
                    }
                }
            }
            debug!("[Accessory] Refresh task for {} stopped", accessory.uuid);
        });
    }

    fn request_submit(&self) {
        self.backend.submit_device_updates(&self.device);
    }
}

impl CharacteristicHandler for CocoroAccessory {
    fn characteristics(&self) -> Vec<CharacteristicSpec> {
        bindings::BINDINGS.iter().map(bindings::Binding::spec).collect()
    }

    fn read(
        &self,
        service: HomekitService,
        characteristic: HomekitCharacteristic,
    ) -> Result<CharacteristicValue> {
        let binding =
            bindings::lookup(service, characteristic).ok_or(BridgeError::UnsupportedCharacteristic {
                service,
                characteristic,
                access: "served",
            })?;
        (binding.read)(self)
    }

    fn write(
        &self,
        service: HomekitService,
        characteristic: HomekitCharacteristic,
        value: CharacteristicValue,
    ) -> Result<()> {
        let write = bindings::lookup(service, characteristic)
            .and_then(|binding| binding.write)
            .ok_or(BridgeError::UnsupportedCharacteristic {
                service,
                characteristic,
                access: "writable",
            })?;
        write(self, &value)
    }
}
