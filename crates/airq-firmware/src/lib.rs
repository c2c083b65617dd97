//! ESP32-S3 firmware-specific modules for airq
//!
//! This crate contains hardware-specific code that cannot compile on desktop
//! targets: ESP32 peripheral initialization, the SCD4x driver adapter, the
//! WiFi platform, the status LED and the HTTP property transport.

#![no_std]
#![feature(impl_trait_in_assoc_type)]

extern crate alloc;

pub mod hardware;
pub mod scd4x;
pub mod status_led;
pub mod web;
pub mod wifi;
pub mod wifi_secrets;
