//! Sharp Cocoro cloud model and client interface.
//!
//! - `codes`: ECHONET property and value codes
//! - `device`: device snapshot with its queued property updates
//! - `client`: the cloud operations the bridge depends on
//! - `sim`: in-process cloud used by the binary and tests

pub mod client;
pub mod codes;
pub mod device;
pub mod sim;

pub use client::CocoroApi;
pub use codes::{OperationMode, PowerStatus, StatusCode, Windspeed};
pub use device::{Device, PropertyStatus, PropertyUpdates, PropertyValue, SharedDevice, State8};
pub use sim::{ExecutedUpdate, SimulatedCloud};
