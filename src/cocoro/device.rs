//! Cocoro device model.
//!
//! A [`Device`] holds the property statuses last reported by the cloud plus an
//! accumulator of property updates that have been queued locally but not yet
//! submitted. Reads see queued updates on top of the reported statuses, so a
//! value written by HomeKit is visible immediately.
//!
//! A submission moves the queued updates in flight. They stay visible until
//! the cloud call returns: confirmed updates become reported statuses,
//! abandoned ones disappear and reads fall back to what the cloud reported.

use super::codes::{OperationMode, PowerStatus, StatusCode, Windspeed};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A device shared between its accessory handlers, the refresh task and the
/// submit debouncer.
pub type SharedDevice = Arc<Mutex<Device>>;

/// Value carried by a property status.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PropertyValue {
    /// Enumerated value code (e.g. power on/off)
    Single(u8),
    /// Numeric value (e.g. temperature in °C)
    Range(f32),
}

/// One property of a device, keyed by its ECHONET code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyStatus {
    pub status_code: StatusCode,
    pub value: PropertyValue,
}

impl PropertyStatus {
    pub fn single(status_code: StatusCode, code: u8) -> Self {
        Self {
            status_code,
            value: PropertyValue::Single(code),
        }
    }

    pub fn range(status_code: StatusCode, value: f32) -> Self {
        Self {
            status_code,
            value: PropertyValue::Range(value),
        }
    }

    /// Value code if this is an enumerated property.
    pub fn single_code(&self) -> Option<u8> {
        match self.value {
            PropertyValue::Single(code) => Some(code),
            PropertyValue::Range(_) => None,
        }
    }

    /// Numeric value if this is a range property.
    pub fn range_value(&self) -> Option<f32> {
        match self.value {
            PropertyValue::Range(value) => Some(value),
            PropertyValue::Single(_) => None,
        }
    }
}

/// Ordered accumulator of not-yet-submitted property updates.
///
/// Keyed by status code: queuing a property that is already pending replaces
/// the pending value in place, keeping its original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyUpdates {
    entries: Vec<PropertyStatus>,
}

impl PropertyUpdates {
    pub fn queue(&mut self, status: PropertyStatus) {
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.status_code == status.status_code)
        {
            Some(entry) => *entry = status,
            None => self.entries.push(status),
        }
    }

    pub fn get(&self, code: StatusCode) -> Option<&PropertyStatus> {
        self.entries.iter().find(|entry| entry.status_code == code)
    }

    pub fn remove(&mut self, code: StatusCode) -> Option<PropertyStatus> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.status_code == code)?;
        Some(self.entries.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyStatus> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_vec(&self) -> Vec<PropertyStatus> {
        self.entries.clone()
    }
}

/// Aggregated operating state of a unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct State8 {
    pub power: Option<PowerStatus>,
    pub operation_mode: Option<u8>,
    pub temperature: Option<f32>,
    pub windspeed: Option<u8>,
}

/// A Cocoro air conditioner as known to the cloud.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub device_id: u64,
    pub name: String,
    pub maker: String,
    pub model: String,
    #[serde(default)]
    pub serial_number: Option<String>,
    pub echonet_node: String,
    #[serde(default)]
    status: BTreeMap<StatusCode, PropertyStatus>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    property_updates: PropertyUpdates,
    #[serde(skip)]
    in_flight: PropertyUpdates,
    /// Number of submissions taken from this device
    #[serde(skip)]
    submissions: u64,
    /// Submission sequence that last carried each code
    #[serde(skip)]
    submitted: BTreeMap<StatusCode, u64>,
}

impl Device {
    pub fn new(
        device_id: u64,
        name: impl Into<String>,
        maker: impl Into<String>,
        model: impl Into<String>,
        echonet_node: impl Into<String>,
    ) -> Self {
        Self {
            device_id,
            name: name.into(),
            maker: maker.into(),
            model: model.into(),
            serial_number: None,
            echonet_node: echonet_node.into(),
            status: BTreeMap::new(),
            updated_at: None,
            property_updates: PropertyUpdates::default(),
            in_flight: PropertyUpdates::default(),
            submissions: 0,
            submitted: BTreeMap::new(),
        }
    }

    pub fn with_serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = Some(serial_number.into());
        self
    }

    pub fn with_status(mut self, status: PropertyStatus) -> Self {
        self.set_status(status);
        self
    }

    /// Wrap the device for sharing between handlers and background tasks.
    pub fn into_shared(self) -> SharedDevice {
        Arc::new(Mutex::new(self))
    }

    /// Serial number, falling back to the ECHONET node id.
    pub fn serial(&self) -> &str {
        self.serial_number.as_deref().unwrap_or(&self.echonet_node)
    }

    /// Overwrite a reported status.
    pub fn set_status(&mut self, status: PropertyStatus) {
        self.status.insert(status.status_code, status);
    }

    /// Status as last reported by the cloud, ignoring queued updates.
    pub fn reported_status(&self, code: StatusCode) -> Option<&PropertyStatus> {
        self.status.get(&code)
    }

    /// Effective status: a queued update, else one in flight, else the
    /// reported one.
    pub fn property_status(&self, code: StatusCode) -> Option<&PropertyStatus> {
        self.property_updates
            .get(code)
            .or_else(|| self.in_flight.get(code))
            .or_else(|| self.status.get(&code))
    }

    pub fn room_temperature(&self) -> Option<f32> {
        self.property_status(StatusCode::RoomTemperature)
            .and_then(PropertyStatus::range_value)
    }

    /// Last commanded temperature.
    pub fn temperature(&self) -> Option<f32> {
        self.property_status(StatusCode::Temperature)
            .and_then(PropertyStatus::range_value)
    }

    /// Raw air flow value code.
    pub fn windspeed(&self) -> Option<u8> {
        self.property_status(StatusCode::Windspeed)
            .and_then(PropertyStatus::single_code)
    }

    pub fn power(&self) -> Option<PowerStatus> {
        self.property_status(StatusCode::Power)
            .and_then(PropertyStatus::single_code)
            .and_then(PowerStatus::from_repr)
    }

    pub fn operation_mode(&self) -> Option<u8> {
        self.property_status(StatusCode::OperationMode)
            .and_then(PropertyStatus::single_code)
    }

    pub fn state8(&self) -> State8 {
        State8 {
            power: self.power(),
            operation_mode: self.operation_mode(),
            temperature: self.temperature(),
            windspeed: self.windspeed(),
        }
    }

    pub fn queue_power_on(&mut self) {
        self.queue_property_status_update(PropertyStatus::single(
            StatusCode::Power,
            PowerStatus::On as u8,
        ));
    }

    pub fn queue_power_off(&mut self) {
        self.queue_property_status_update(PropertyStatus::single(
            StatusCode::Power,
            PowerStatus::Off as u8,
        ));
    }

    pub fn queue_temperature_update(&mut self, temperature: f32) {
        self.queue_property_status_update(PropertyStatus::range(
            StatusCode::Temperature,
            temperature,
        ));
    }

    pub fn queue_operation_mode_update(&mut self, mode: OperationMode) {
        self.queue_property_status_update(PropertyStatus::single(
            StatusCode::OperationMode,
            mode as u8,
        ));
    }

    pub fn queue_windspeed_update(&mut self, windspeed: Windspeed) {
        self.queue_property_status_update(PropertyStatus::single(
            StatusCode::Windspeed,
            windspeed as u8,
        ));
    }

    pub fn queue_property_status_update(&mut self, status: PropertyStatus) {
        self.property_updates.queue(status);
    }

    pub fn pending_updates(&self) -> &PropertyUpdates {
        &self.property_updates
    }

    /// Updates taken for submission whose cloud call has not returned.
    pub fn in_flight_updates(&self) -> &PropertyUpdates {
        &self.in_flight
    }

    /// Sequence number of the latest submission taken from this device.
    pub fn submission_count(&self) -> u64 {
        self.submissions
    }

    /// Take the queued updates for submission.
    ///
    /// Returns a snapshot carrying the pending updates and clears the
    /// accumulator. The updates stay visible to reads as in-flight until the
    /// snapshot is passed to [`Device::confirm_submission`] or
    /// [`Device::abandon_submission`]. `None` if nothing is queued.
    pub fn take_submission(&mut self) -> Option<Device> {
        if self.property_updates.is_empty() {
            return None;
        }
        self.submissions += 1;
        let sequence = self.submissions;
        let submission = self.clone();

        let updates = std::mem::take(&mut self.property_updates);
        for status in updates.iter() {
            self.in_flight.queue(*status);
            self.submitted.insert(status.status_code, sequence);
        }
        Some(submission)
    }

    /// The cloud accepted `submission`: its updates become reported statuses.
    pub fn confirm_submission(&mut self, submission: &Device) {
        let sequence = submission.submissions;
        for status in submission.pending_updates().iter() {
            self.set_status(*status);
            if self.submitted.get(&status.status_code) == Some(&sequence) {
                self.in_flight.remove(status.status_code);
            }
        }
    }

    /// The cloud call for `submission` failed: drop its updates so reads show
    /// the last reported state again.
    pub fn abandon_submission(&mut self, submission: &Device) {
        let sequence = submission.submissions;
        for status in submission.pending_updates().iter() {
            if self.submitted.get(&status.status_code) == Some(&sequence) {
                self.in_flight.remove(status.status_code);
                self.submitted.remove(&status.status_code);
            }
        }
    }

    /// Overlay freshly fetched server state onto this device.
    ///
    /// `since` is the [`Device::submission_count`] observed before the fetch
    /// started. Identity and reported statuses are replaced, except codes
    /// submitted after `since`: the fetched value for those predates the
    /// submission. Queued and in-flight updates are kept.
    pub fn merge_refresh(&mut self, fresh: Device, since: u64) {
        let preserved: Vec<PropertyStatus> = self
            .submitted
            .iter()
            .filter(|(_, sequence)| **sequence > since)
            .filter_map(|(code, _)| self.status.get(code).copied())
            .collect();
        let pending = std::mem::take(&mut self.property_updates);
        let in_flight = std::mem::take(&mut self.in_flight);
        let submitted = std::mem::take(&mut self.submitted);
        let submissions = self.submissions;

        *self = fresh;
        self.property_updates = pending;
        self.in_flight = in_flight;
        self.submitted = submitted;
        self.submissions = submissions;
        for status in preserved {
            self.set_status(status);
        }
    }
}
