//! Debounced submission of queued device updates.
//!
//! Every call to [`SubmitDebouncer::schedule`] restarts the quiet-period timer
//! of its key. When a timer fires, the updates queued on the device at that
//! moment are taken and submitted in one request, so a burst of HomeKit writes
//! becomes a single cloud call. Accepted updates become the device's reported
//! state; a failed call drops the batch without retrying.
//!
//! With [`DebounceScope::PerDevice`] each device has its own timer. With
//! [`DebounceScope::Global`] all devices share one timer: a request for one
//! device postpones the pending flush of every other device as well.

use crate::cocoro::{CocoroApi, SharedDevice};
use crate::error::Result;
use log::{debug, error};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use strum::EnumString;
use tokio::task::JoinHandle;

/// How pending flushes are keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DebounceScope {
    /// One timer per device
    #[default]
    PerDevice,
    /// One timer shared by all devices
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum DebounceKey {
    Device(u64),
    Global,
}

struct PendingFlush {
    generation: u64,
    handle: JoinHandle<()>,
    devices: Vec<SharedDevice>,
}

#[derive(Default)]
struct DebounceState {
    next_generation: u64,
    pending: HashMap<DebounceKey, PendingFlush>,
}

pub struct SubmitDebouncer {
    api: Arc<dyn CocoroApi>,
    delay: Duration,
    scope: DebounceScope,
    state: Arc<Mutex<DebounceState>>,
}

impl SubmitDebouncer {
    pub fn new(api: Arc<dyn CocoroApi>, delay: Duration, scope: DebounceScope) -> Self {
        Self {
            api,
            delay,
            scope,
            state: Arc::new(Mutex::new(DebounceState::default())),
        }
    }

    /// Request a submission of the updates queued on `device`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, device: &SharedDevice) {
        let key = match self.scope {
            DebounceScope::PerDevice => DebounceKey::Device(device.lock().device_id),
            DebounceScope::Global => DebounceKey::Global,
        };

        let mut state = self.state.lock();
        state.next_generation += 1;
        let generation = state.next_generation;

        let mut devices = match state.pending.remove(&key) {
            Some(previous) => {
                previous.handle.abort();
                previous.devices
            }
            None => Vec::new(),
        };
        if !devices.iter().any(|queued| Arc::ptr_eq(queued, device)) {
            devices.push(device.clone());
        }

        let handle = tokio::spawn(fire(
            self.api.clone(),
            self.state.clone(),
            key,
            generation,
            self.delay,
        ));
        state.pending.insert(
            key,
            PendingFlush {
                generation,
                handle,
                devices,
            },
        );
    }

    /// Number of timers currently waiting to fire.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Cancel every pending timer and submit what is queued right away.
    pub async fn flush_pending(&self) {
        let devices: Vec<SharedDevice> = {
            let mut state = self.state.lock();
            state
                .pending
                .drain()
                .flat_map(|(_, pending)| {
                    pending.handle.abort();
                    pending.devices
                })
                .collect()
        };
        if !devices.is_empty() {
            debug!("[Platform] Flushing {} pending device(s)", devices.len());
        }
        flush_devices(self.api.as_ref(), &devices).await;
    }
}

async fn fire(
    api: Arc<dyn CocoroApi>,
    state: Arc<Mutex<DebounceState>>,
    key: DebounceKey,
    generation: u64,
    delay: Duration,
) {
    tokio::time::sleep(delay).await;

    // Once removed from the map this flush can no longer be aborted.
    let devices = {
        let mut state = state.lock();
        match state.pending.get(&key) {
            Some(pending) if pending.generation == generation => {}
            _ => return,
        }
        state
            .pending
            .remove(&key)
            .map(|pending| pending.devices)
            .unwrap_or_default()
    };

    flush_devices(api.as_ref(), &devices).await;
}

async fn flush_devices(api: &dyn CocoroApi, devices: &[SharedDevice]) {
    for device in devices {
        let submission = device.lock().take_submission();
        let Some(submission) = submission else {
            debug!("[Platform] Nothing queued, skipping submission");
            continue;
        };

        debug!(
            "[Platform] Submitting device state update to cocoro api for {}: {:?}",
            submission.name,
            submission.pending_updates()
        );

        match submit(api, &submission).await {
            Ok(()) => {
                device.lock().confirm_submission(&submission);
            }
            Err(e) => {
                error!(
                    "[Platform] Failed to submit updates for {}: {}",
                    submission.name, e
                );
                device.lock().abandon_submission(&submission);
            }
        }
    }
}

async fn submit(api: &dyn CocoroApi, submission: &crate::cocoro::Device) -> Result<()> {
    api.login().await?;
    api.execute_queued_updates(submission).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cocoro::{
        Device, PowerStatus, PropertyStatus, SimulatedCloud, StatusCode, Windspeed,
    };
    use crate::config::CocoroConfig;
    use tokio::time::{Instant, sleep};

    fn cloud() -> Arc<SimulatedCloud> {
        Arc::new(
            SimulatedCloud::new(CocoroConfig {
                app_secret: "secret".to_string(),
                app_key: "key".to_string(),
            })
            .with_demo_devices(),
        )
    }

    fn shared(cloud: &SimulatedCloud, device_id: u64) -> SharedDevice {
        cloud.device(device_id).unwrap().into_shared()
    }

    fn debouncer(cloud: &Arc<SimulatedCloud>, scope: DebounceScope) -> SubmitDebouncer {
        SubmitDebouncer::new(cloud.clone(), Duration::from_millis(1000), scope)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_into_one_submission() {
        let cloud = cloud();
        let debouncer = debouncer(&cloud, DebounceScope::PerDevice);
        let device = shared(&cloud, 1001);
        let start = Instant::now();

        device.lock().queue_power_on();
        debouncer.schedule(&device);
        sleep(Duration::from_millis(300)).await;

        device.lock().queue_temperature_update(22.0);
        debouncer.schedule(&device);
        sleep(Duration::from_millis(300)).await;

        device.lock().queue_windspeed_update(Windspeed::Level2);
        debouncer.schedule(&device);

        sleep(Duration::from_millis(999)).await;
        assert!(cloud.executed().is_empty());

        sleep(Duration::from_millis(100)).await;
        let executed = cloud.executed_for(1001);
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].at - start, Duration::from_millis(1600));
        assert_eq!(
            executed[0].updates,
            vec![
                PropertyStatus::single(StatusCode::Power, PowerStatus::On as u8),
                PropertyStatus::range(StatusCode::Temperature, 22.0),
                PropertyStatus::single(StatusCode::Windspeed, Windspeed::Level2 as u8),
            ]
        );
        let device = device.lock();
        assert!(device.pending_updates().is_empty());
        assert!(device.in_flight_updates().is_empty());
        assert_eq!(device.temperature(), Some(22.0));
        assert_eq!(debouncer.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_reads_queue_at_fire_time() {
        let cloud = cloud();
        let debouncer = debouncer(&cloud, DebounceScope::PerDevice);
        let device = shared(&cloud, 1001);

        debouncer.schedule(&device);
        sleep(Duration::from_millis(500)).await;
        // Queued after the request, before the timer fires
        device.lock().queue_power_off();

        sleep(Duration::from_millis(600)).await;
        let executed = cloud.executed_for(1001);
        assert_eq!(executed.len(), 1);
        assert_eq!(
            executed[0].updates,
            vec![PropertyStatus::single(StatusCode::Power, PowerStatus::Off as u8)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_device_timers_are_independent() {
        let cloud = cloud();
        let debouncer = debouncer(&cloud, DebounceScope::PerDevice);
        let living = shared(&cloud, 1001);
        let bedroom = shared(&cloud, 1002);
        let start = Instant::now();

        living.lock().queue_power_on();
        debouncer.schedule(&living);
        sleep(Duration::from_millis(500)).await;
        bedroom.lock().queue_power_on();
        debouncer.schedule(&bedroom);

        sleep(Duration::from_millis(600)).await;
        let living_flushes = cloud.executed_for(1001);
        assert_eq!(living_flushes.len(), 1);
        assert_eq!(living_flushes[0].at - start, Duration::from_millis(1000));
        assert!(cloud.executed_for(1002).is_empty());

        sleep(Duration::from_millis(500)).await;
        let bedroom_flushes = cloud.executed_for(1002);
        assert_eq!(bedroom_flushes.len(), 1);
        assert_eq!(bedroom_flushes[0].at - start, Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_timer_couples_devices() {
        let cloud = cloud();
        let debouncer = debouncer(&cloud, DebounceScope::Global);
        let living = shared(&cloud, 1001);
        let bedroom = shared(&cloud, 1002);
        let start = Instant::now();

        living.lock().queue_power_on();
        debouncer.schedule(&living);
        sleep(Duration::from_millis(500)).await;
        bedroom.lock().queue_power_on();
        debouncer.schedule(&bedroom);

        sleep(Duration::from_millis(600)).await;
        assert!(cloud.executed().is_empty());

        sleep(Duration::from_millis(500)).await;
        let living_flushes = cloud.executed_for(1001);
        let bedroom_flushes = cloud.executed_for(1002);
        assert_eq!(living_flushes.len(), 1);
        assert_eq!(bedroom_flushes.len(), 1);
        assert_eq!(living_flushes[0].at - start, Duration::from_millis(1500));
        assert_eq!(bedroom_flushes[0].at - start, Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_queue_skips_remote_call() {
        let cloud = cloud();
        let debouncer = debouncer(&cloud, DebounceScope::PerDevice);
        let device = shared(&cloud, 1001);

        debouncer.schedule(&device);
        sleep(Duration::from_millis(1100)).await;

        assert!(cloud.executed().is_empty());
        assert_eq!(cloud.login_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_failure_drops_submission() {
        let cloud = cloud();
        cloud.set_login_failure(true);
        let debouncer = debouncer(&cloud, DebounceScope::PerDevice);
        let device = shared(&cloud, 1001);

        device.lock().queue_power_on();
        debouncer.schedule(&device);
        sleep(Duration::from_millis(1100)).await;

        assert!(cloud.executed().is_empty());
        let device = device.lock();
        assert!(device.pending_updates().is_empty());
        assert!(device.in_flight_updates().is_empty());
        assert_eq!(device.power(), Some(PowerStatus::Off));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_pending_submits_immediately() {
        let cloud = cloud();
        let debouncer = debouncer(&cloud, DebounceScope::PerDevice);
        let device = shared(&cloud, 1002);
        let start = Instant::now();

        device.lock().queue_power_on();
        debouncer.schedule(&device);
        debouncer.flush_pending().await;

        let executed = cloud.executed_for(1002);
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].at, start);
        assert_eq!(debouncer.pending_count(), 0);

        sleep(Duration::from_millis(1100)).await;
        assert_eq!(cloud.executed().len(), 1);
    }

    #[test]
    fn test_scope_parses_from_env_value() {
        assert_eq!(
            "per-device".parse::<DebounceScope>().unwrap(),
            DebounceScope::PerDevice
        );
        assert_eq!(
            "global".parse::<DebounceScope>().unwrap(),
            DebounceScope::Global
        );
        assert!("sometimes".parse::<DebounceScope>().is_err());
    }

    #[tokio::test]
    async fn test_unknown_device_submission_is_logged_not_fatal() {
        let cloud = cloud();
        let debouncer = debouncer(&cloud, DebounceScope::PerDevice);
        let ghost = Device::new(9, "Ghost", "SHARP", "X", "FE00").into_shared();

        ghost.lock().queue_power_on();
        debouncer.schedule(&ghost);
        debouncer.flush_pending().await;

        assert!(cloud.executed().is_empty());
    }
}
