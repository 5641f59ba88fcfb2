//! Cocoro HomeKit bridge library.
//!
//! Exposes Sharp Cocoro air conditioners as HomeKit accessories: each unit
//! becomes a Thermostat plus a Fanv2 service, HomeKit writes are batched into
//! debounced cloud submissions, and device state is refreshed periodically.

pub mod accessory;
pub mod cocoro;
pub mod config;
pub mod error;
pub mod homekit;
pub mod platform;
