//! Platform controller.
//!
//! Discovers Cocoro devices, keeps the host's accessory records in sync with
//! them and runs one [`CocoroAccessory`] per device. Cloud access goes
//! through a [`CocoroSession`], which also owns the submit debouncer.

pub mod debounce;

pub use debounce::{DebounceScope, SubmitDebouncer};

use crate::accessory::{CocoroAccessory, DeviceBackend};
use crate::cocoro::{CocoroApi, Device, SharedDevice};
use crate::config::PlatformConfig;
use crate::error::Result;
use crate::homekit::{AccessoryHost, CharacteristicHandler, PlatformAccessory, generate_uuid};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

/// Authenticated access to the Cocoro cloud.
pub struct CocoroSession {
    api: Arc<dyn CocoroApi>,
    debouncer: SubmitDebouncer,
}

impl CocoroSession {
    pub fn new(api: Arc<dyn CocoroApi>, config: &PlatformConfig) -> Self {
        let debouncer =
            SubmitDebouncer::new(api.clone(), config.submit_debounce(), config.debounce_scope);
        Self { api, debouncer }
    }

    pub fn debouncer(&self) -> &SubmitDebouncer {
        &self.debouncer
    }

    pub async fn login(&self) -> Result<()> {
        self.api.login().await
    }

    pub async fn query_devices(&self) -> Result<Vec<Device>> {
        self.login().await?;
        self.api.query_devices().await
    }

    pub async fn fetch_device(&self, device: &Device) -> Result<Device> {
        self.login().await?;
        self.api.fetch_device(device).await
    }

    pub fn submit_device_updates(&self, device: &SharedDevice) {
        self.debouncer.schedule(device);
    }
}

#[async_trait]
impl DeviceBackend for CocoroSession {
    async fn fetch_device(&self, device: &Device) -> Result<Device> {
        CocoroSession::fetch_device(self, device).await
    }

    fn submit_device_updates(&self, device: &SharedDevice) {
        CocoroSession::submit_device_updates(self, device);
    }
}

/// Outcome of one discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Accessories created for devices seen for the first time
    pub added: Vec<Uuid>,
    /// Cached accessories bound to a device again
    pub restored: Vec<Uuid>,
    /// Cached accessories whose device is gone
    pub removed: Vec<Uuid>,
}

struct RunningAccessory {
    adapter: Arc<CocoroAccessory>,
    refresh: CancellationToken,
}

pub struct CocoroPlatform {
    config: PlatformConfig,
    host: Arc<dyn AccessoryHost>,
    session: Arc<CocoroSession>,
    cached: Mutex<Vec<PlatformAccessory>>,
    running: Mutex<HashMap<Uuid, RunningAccessory>>,
    discovery: tokio::sync::Mutex<()>,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl CocoroPlatform {
    pub fn new(
        config: PlatformConfig,
        api: Arc<dyn CocoroApi>,
        host: Arc<dyn AccessoryHost>,
    ) -> Self {
        let session = Arc::new(CocoroSession::new(api, &config));
        info!(
            "[Platform] Initialized {} (debounce {:?}, {:?})",
            config.name,
            config.submit_debounce(),
            config.debounce_scope
        );
        Self {
            config,
            host,
            session,
            cached: Mutex::new(Vec::new()),
            running: Mutex::new(HashMap::new()),
            discovery: tokio::sync::Mutex::new(()),
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    /// Keep an accessory restored from the host's cache for matching during
    /// discovery.
    pub fn configure_accessory(&self, accessory: PlatformAccessory) {
        info!(
            "[Platform] Loading accessory from cache: {}",
            accessory.display_name
        );
        let mut cached = self.cached.lock();
        cached.retain(|known| known.uuid != accessory.uuid);
        cached.push(accessory);
    }

    /// Host is ready: run the first discovery pass.
    pub async fn did_finish_launching(&self) {
        debug!("[Platform] Finished launching");
        match self.discover_devices().await {
            Ok(report) => info!(
                "[Platform] Discovery complete: {} added, {} restored, {} removed",
                report.added.len(),
                report.restored.len(),
                report.removed.len()
            ),
            Err(e) => error!("[Platform] Failed to discover devices: {}", e),
        }
    }

    pub async fn discover_devices(&self) -> Result<DiscoveryReport> {
        let _pass = self.discovery.lock().await;
        let baseline: HashMap<Uuid, u64> = self
            .running
            .lock()
            .iter()
            .map(|(uuid, running)| (*uuid, running.adapter.submission_count()))
            .collect();
        let devices = self.session.query_devices().await?;
        debug!("[Platform] Cloud reports {} device(s)", devices.len());

        let mut report = DiscoveryReport::default();
        let mut seen = HashSet::new();
        let mut to_register = Vec::new();
        let mut to_update = Vec::new();
        let mut to_unregister = Vec::new();

        {
            let mut cached = self.cached.lock();
            let mut running = self.running.lock();

            for device in devices {
                let uuid = generate_uuid(&device.device_id.to_string());
                if !seen.insert(uuid) {
                    warn!("[Platform] Duplicate device id {}", device.device_id);
                    continue;
                }

                if let Some(record) = cached.iter_mut().find(|known| known.uuid == uuid) {
                    record.context.device = Some(device.clone());
                    match running.get(&uuid) {
                        Some(existing) => {
                            debug!("[Platform] Refreshing running accessory: {}", device.name);
                            let since = baseline.get(&uuid).copied().unwrap_or_default();
                            existing.adapter.merge_device(device, since);
                        }
                        None => {
                            info!(
                                "[Platform] Restoring existing accessory from cache: {}",
                                record.display_name
                            );
                            let started = self.start_accessory(record, device);
                            running.insert(uuid, started);
                            report.restored.push(uuid);
                        }
                    }
                    to_update.push(record.clone());
                    continue;
                }

                info!("[Platform] Adding new accessory: {}", device.name);
                let mut record = PlatformAccessory::new(device.name.clone(), uuid);
                let started = self.start_accessory(&mut record, device);
                running.insert(uuid, started);
                report.added.push(uuid);
                to_register.push(record.clone());
                cached.push(record);
            }

            cached.retain(|record| {
                if seen.contains(&record.uuid) {
                    return true;
                }
                info!(
                    "[Platform] Removing stale accessory: {}",
                    record.display_name
                );
                if let Some(stopped) = running.remove(&record.uuid) {
                    stopped.refresh.cancel();
                }
                report.removed.push(record.uuid);
                to_unregister.push(record.clone());
                false
            });
        }

        if !to_register.is_empty() {
            self.host.register_accessories(&to_register);
        }
        if !to_update.is_empty() {
            self.host.update_accessories(&to_update);
        }
        if !to_unregister.is_empty() {
            self.host.unregister_accessories(&to_unregister);
        }
        for uuid in report.added.iter().chain(&report.restored) {
            if let Some(started) = self.running.lock().get(uuid) {
                let handler: Arc<dyn CharacteristicHandler> = started.adapter.clone();
                self.host.bind_handler(*uuid, handler);
            }
        }

        Ok(report)
    }

    fn start_accessory(&self, record: &mut PlatformAccessory, device: Device) -> RunningAccessory {
        let backend: Arc<dyn DeviceBackend> = self.session.clone();
        let adapter = CocoroAccessory::new(record, device, backend);
        let refresh = self.shutdown.child_token();
        adapter.spawn_refresh(self.config.refresh_interval(), refresh.clone(), &self.tasks);
        RunningAccessory { adapter, refresh }
    }

    pub async fn fetch_device(&self, device: &Device) -> Result<Device> {
        self.session.fetch_device(device).await
    }

    pub fn submit_device_updates(&self, device: &SharedDevice) {
        self.session.submit_device_updates(device);
    }

    pub fn accessory(&self, uuid: Uuid) -> Option<Arc<CocoroAccessory>> {
        self.running
            .lock()
            .get(&uuid)
            .map(|running| running.adapter.clone())
    }

    pub fn accessory_count(&self) -> usize {
        self.running.lock().len()
    }

    /// Re-run discovery on the configured interval until shutdown.
    pub fn spawn_discovery_loop(self: &Arc<Self>) {
        let Some(period) = self.config.discovery_interval() else {
            return;
        };
        info!("[Platform] Re-discovering devices every {:?}", period);

        let platform = Arc::clone(self);
        let shutdown = self.shutdown.clone();
        self.tasks.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {}
                }
                if let Err(e) = platform.discover_devices().await {
                    warn!("[Platform] Periodic discovery failed: {}", e);
                }
            }
        });
    }

    /// Stop background tasks and submit whatever is still queued.
    pub async fn shutdown(&self) {
        info!("[Platform] Shutting down");
        self.shutdown.cancel();
        self.tasks.close();
        self.tasks.wait().await;
        self.session.debouncer().flush_pending().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cocoro::{
        OperationMode, PowerStatus, PropertyStatus, SimulatedCloud, StatusCode, Windspeed,
    };
    use crate::config::CocoroConfig;
    use crate::error::BridgeError;
    use crate::homekit::{
        CharacteristicValue, HomekitCharacteristic, HomekitService, LocalHost,
    };
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn credentials() -> CocoroConfig {
        CocoroConfig {
            app_secret: "secret".to_string(),
            app_key: "key".to_string(),
        }
    }

    fn setup() -> (Arc<SimulatedCloud>, Arc<LocalHost>, Arc<CocoroPlatform>) {
        let cloud = Arc::new(SimulatedCloud::new(credentials()).with_demo_devices());
        let host = Arc::new(LocalHost::in_memory());
        let platform = Arc::new(CocoroPlatform::new(
            PlatformConfig::default(),
            cloud.clone(),
            host.clone(),
        ));
        (cloud, host, platform)
    }

    fn uuid_of(device_id: u64) -> Uuid {
        generate_uuid(&device_id.to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_registers_new_accessories() {
        let (_cloud, host, platform) = setup();

        let report = assert_ok!(platform.discover_devices().await);

        assert_eq!(report.added, vec![uuid_of(1001), uuid_of(1002)]);
        assert!(report.restored.is_empty());
        assert!(report.removed.is_empty());
        assert_eq!(host.accessories().len(), 2);
        assert_eq!(platform.accessory_count(), 2);

        let record = host.accessory(uuid_of(1001)).unwrap();
        assert_eq!(record.display_name, "Living Room");
        assert_eq!(record.information.manufacturer, "SHARP");
        assert_eq!(record.context.device.unwrap().device_id, 1001);

        let value = host
            .read(
                uuid_of(1001),
                HomekitService::Thermostat,
                HomekitCharacteristic::CurrentTemperature,
            )
            .unwrap();
        assert_eq!(value, CharacteristicValue::Float(27.5));

        platform.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_restores_cached_and_drops_stale() {
        let (_cloud, host, platform) = setup();
        platform.configure_accessory(PlatformAccessory::new("Living Room", uuid_of(1001)));
        platform.configure_accessory(PlatformAccessory::new("Old Unit", uuid_of(9999)));

        let report = assert_ok!(platform.discover_devices().await);

        assert_eq!(report.restored, vec![uuid_of(1001)]);
        assert_eq!(report.added, vec![uuid_of(1002)]);
        assert_eq!(report.removed, vec![uuid_of(9999)]);
        assert!(host.accessory(uuid_of(9999)).is_none());
        assert!(platform.accessory(uuid_of(9999)).is_none());

        let restored = host.accessory(uuid_of(1001)).unwrap();
        assert_eq!(restored.information.model, "AY-L40P");
        assert!(restored.context.device.is_some());

        platform.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_rediscovery_keeps_running_adapters() {
        let (cloud, host, platform) = setup();
        assert_ok!(platform.discover_devices().await);
        let adapter = platform.accessory(uuid_of(1001)).unwrap();

        cloud.remove_device(1002);
        cloud.set_status(1001, PropertyStatus::range(StatusCode::RoomTemperature, 29.0));
        let report = assert_ok!(platform.discover_devices().await);

        assert!(report.added.is_empty());
        assert!(report.restored.is_empty());
        assert_eq!(report.removed, vec![uuid_of(1002)]);
        assert!(Arc::ptr_eq(&adapter, &platform.accessory(uuid_of(1001)).unwrap()));
        assert_eq!(adapter.current_temperature().unwrap(), 29.0);
        assert_eq!(host.accessories().len(), 1);

        platform.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_failure_leaves_accessories_untouched() {
        let (cloud, host, platform) = setup();
        assert_ok!(platform.discover_devices().await);

        cloud.set_query_failure(true);
        let result = platform.discover_devices().await;

        assert!(matches!(result, Err(BridgeError::DeviceQueryFailed(_))));
        assert_eq!(host.accessories().len(), 2);
        assert_eq!(platform.accessory_count(), 2);

        platform.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_with_bad_credentials_is_not_fatal() {
        let cloud = Arc::new(SimulatedCloud::new(CocoroConfig::default()).with_demo_devices());
        let host = Arc::new(LocalHost::in_memory());
        let platform = CocoroPlatform::new(PlatformConfig::default(), cloud, host.clone());

        platform.did_finish_launching().await;

        assert!(host.accessories().is_empty());
        assert_err!(platform.discover_devices().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_within_window_become_one_submission() {
        let (cloud, host, platform) = setup();
        assert_ok!(platform.discover_devices().await);
        let uuid = uuid_of(1001);

        assert_ok!(host.write(
            uuid,
            HomekitService::Thermostat,
            HomekitCharacteristic::TargetTemperature,
            CharacteristicValue::Float(22.0),
        ));
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_ok!(host.write(
            uuid,
            HomekitService::Fanv2,
            HomekitCharacteristic::RotationSpeed,
            CharacteristicValue::Int(100),
        ));

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert!(cloud.executed().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        let executed = cloud.executed_for(1001);
        assert_eq!(executed.len(), 1);
        assert_eq!(
            executed[0].updates,
            vec![
                PropertyStatus::range(StatusCode::Temperature, 22.0),
                PropertyStatus::single(StatusCode::Power, PowerStatus::On as u8),
                PropertyStatus::single(StatusCode::OperationMode, OperationMode::Cool as u8),
                PropertyStatus::single(StatusCode::Windspeed, Windspeed::Level8 as u8),
            ]
        );

        let stored = cloud.device(1001).unwrap();
        assert_eq!(stored.temperature(), Some(22.0));
        assert_eq!(stored.power(), Some(PowerStatus::On));

        platform.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_refresh_picks_up_cloud_changes() {
        let (cloud, host, platform) = setup();
        assert_ok!(platform.discover_devices().await);

        cloud.set_status(1002, PropertyStatus::range(StatusCode::RoomTemperature, 30.5));
        tokio::time::sleep(Duration::from_secs(11)).await;

        let value = host
            .read(
                uuid_of(1002),
                HomekitService::Thermostat,
                HomekitCharacteristic::CurrentTemperature,
            )
            .unwrap();
        assert_eq!(value, CharacteristicValue::Float(30.5));

        platform.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_pending_updates() {
        let (cloud, host, platform) = setup();
        assert_ok!(platform.discover_devices().await);

        assert_ok!(host.write(
            uuid_of(1002),
            HomekitService::Thermostat,
            HomekitCharacteristic::TargetHeatingCoolingState,
            CharacteristicValue::Int(1),
        ));
        platform.shutdown().await;

        let executed = cloud.executed_for(1002);
        assert_eq!(executed.len(), 1);
        assert_eq!(
            cloud.device(1002).unwrap().operation_mode(),
            Some(OperationMode::Heat as u8)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_loop_picks_up_new_devices() {
        let cloud = Arc::new(SimulatedCloud::new(credentials()).with_demo_devices());
        let host = Arc::new(LocalHost::in_memory());
        let config = PlatformConfig {
            discovery_interval_secs: Some(60),
            ..PlatformConfig::default()
        };
        let platform = Arc::new(CocoroPlatform::new(config, cloud.clone(), host.clone()));
        platform.did_finish_launching().await;
        platform.spawn_discovery_loop();

        cloud.insert_device(
            Device::new(1003, "Office", "SHARP", "AY-L40P", "FE00000003EB")
                .with_status(PropertyStatus::range(StatusCode::RoomTemperature, 22.0)),
        );
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(host.accessories().len(), 3);
        assert!(platform.accessory(uuid_of(1003)).is_some());

        platform.shutdown().await;
    }
}
