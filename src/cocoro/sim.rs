//! In-process simulation of the Cocoro cloud.
//!
//! Holds device state in memory, applies submitted updates to it and records
//! every submission. Used as the bridge's backend when no cloud transport is
//! wired up, and as the vendor client in tests.

use super::client::CocoroApi;
use super::codes::{OperationMode, PowerStatus, StatusCode, Windspeed};
use super::device::{Device, PropertyStatus};
use crate::config::CocoroConfig;
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::time::Instant;

/// One call to `execute_queued_updates` as seen by the simulated cloud.
#[derive(Debug, Clone)]
pub struct ExecutedUpdate {
    pub device_id: u64,
    pub updates: Vec<PropertyStatus>,
    pub at: Instant,
}

pub struct SimulatedCloud {
    credentials: CocoroConfig,
    devices: Mutex<BTreeMap<u64, Device>>,
    executed: Mutex<Vec<ExecutedUpdate>>,
    logins: AtomicU32,
    fail_login: AtomicBool,
    fail_queries: AtomicBool,
    room_temperature_drift: AtomicBool,
}

impl SimulatedCloud {
    pub fn new(credentials: CocoroConfig) -> Self {
        Self {
            credentials,
            devices: Mutex::new(BTreeMap::new()),
            executed: Mutex::new(Vec::new()),
            logins: AtomicU32::new(0),
            fail_login: AtomicBool::new(false),
            fail_queries: AtomicBool::new(false),
            room_temperature_drift: AtomicBool::new(false),
        }
    }

    pub fn with_device(self, device: Device) -> Self {
        self.insert_device(device);
        self
    }

    /// Seed two idle units, one per room.
    pub fn with_demo_devices(self) -> Self {
        self.with_device(demo_device(1001, "Living Room", 27.5))
            .with_device(demo_device(1002, "Bedroom", 24.0))
    }

    /// Let the room temperature wander a little on every fetch.
    pub fn with_room_temperature_drift(self, enabled: bool) -> Self {
        self.room_temperature_drift.store(enabled, Ordering::SeqCst);
        self
    }

    pub fn insert_device(&self, device: Device) {
        self.devices.lock().insert(device.device_id, device);
    }

    pub fn remove_device(&self, device_id: u64) -> Option<Device> {
        self.devices.lock().remove(&device_id)
    }

    pub fn device(&self, device_id: u64) -> Option<Device> {
        self.devices.lock().get(&device_id).cloned()
    }

    /// Overwrite one reported status, as if the unit changed on its own.
    pub fn set_status(&self, device_id: u64, status: PropertyStatus) {
        if let Some(device) = self.devices.lock().get_mut(&device_id) {
            device.set_status(status);
        }
    }

    pub fn set_login_failure(&self, fail: bool) {
        self.fail_login.store(fail, Ordering::SeqCst);
    }

    pub fn set_query_failure(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    pub fn login_count(&self) -> u32 {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<ExecutedUpdate> {
        self.executed.lock().clone()
    }

    pub fn executed_for(&self, device_id: u64) -> Vec<ExecutedUpdate> {
        self.executed
            .lock()
            .iter()
            .filter(|update| update.device_id == device_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CocoroApi for SimulatedCloud {
    async fn login(&self) -> Result<()> {
        if self.fail_login.load(Ordering::SeqCst) {
            return Err(BridgeError::AuthenticationFailed(
                "simulated login failure".to_string(),
            ));
        }
        if self.credentials.app_secret.is_empty() || self.credentials.app_key.is_empty() {
            return Err(BridgeError::AuthenticationFailed(
                "missing app secret or app key".to_string(),
            ));
        }
        self.logins.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn query_devices(&self) -> Result<Vec<Device>> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(BridgeError::DeviceQueryFailed(
                "simulated query failure".to_string(),
            ));
        }
        let now = Utc::now();
        Ok(self
            .devices
            .lock()
            .values_mut()
            .map(|device| {
                device.updated_at = Some(now);
                device.clone()
            })
            .collect())
    }

    async fn fetch_device(&self, device: &Device) -> Result<Device> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(BridgeError::DeviceFetchFailed {
                device_id: device.device_id,
                reason: "simulated fetch failure".to_string(),
            });
        }
        let drift = self.room_temperature_drift.load(Ordering::SeqCst);
        let mut devices = self.devices.lock();
        let stored = devices
            .get_mut(&device.device_id)
            .ok_or(BridgeError::UnknownDevice(device.device_id))?;

        if drift && let Some(room) = stored.room_temperature() {
            let delta: f32 = rand::thread_rng().gen_range(-0.2..=0.2);
            let room = ((room + delta) * 10.0).round() / 10.0;
            stored.set_status(PropertyStatus::range(StatusCode::RoomTemperature, room));
        }
        stored.updated_at = Some(Utc::now());
        Ok(stored.clone())
    }

    async fn execute_queued_updates(&self, device: &Device) -> Result<()> {
        let updates = device.pending_updates().to_vec();
        {
            let mut devices = self.devices.lock();
            let stored = devices.get_mut(&device.device_id).ok_or_else(|| {
                BridgeError::UpdateSubmissionFailed {
                    device_id: device.device_id,
                    reason: "device not registered".to_string(),
                }
            })?;
            for status in &updates {
                stored.set_status(*status);
            }
        }

        info!(
            "[Sim] Applied {} update(s) to device {} ({})",
            updates.len(),
            device.name,
            device.device_id
        );
        debug!("[Sim] Updates: {:?}", updates);

        self.executed.lock().push(ExecutedUpdate {
            device_id: device.device_id,
            updates,
            at: Instant::now(),
        });
        Ok(())
    }
}

fn demo_device(device_id: u64, name: &str, room_temperature: f32) -> Device {
    Device::new(
        device_id,
        name,
        "SHARP",
        "AY-L40P",
        format!("FE00{:08X}", device_id),
    )
    .with_status(PropertyStatus::single(StatusCode::Power, PowerStatus::Off as u8))
    .with_status(PropertyStatus::single(
        StatusCode::OperationMode,
        OperationMode::Cool as u8,
    ))
    .with_status(PropertyStatus::range(StatusCode::Temperature, 26.0))
    .with_status(PropertyStatus::range(
        StatusCode::RoomTemperature,
        room_temperature,
    ))
    .with_status(PropertyStatus::single(
        StatusCode::Windspeed,
        Windspeed::Auto as u8,
    ))
}
