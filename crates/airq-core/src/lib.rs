//! Hardware-independent core library for airq
//!
//! This crate contains all platform-agnostic logic for the airq WebThing
//! air quality device: device identity, the WiFi provisioning state machine,
//! the exposed property store, the thing description and the telemetry cycle
//! that moves sensor samples into properties.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32-S3) and desktop hosts (for the simulator and tests).

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod app_state;
pub mod config;
pub mod identity;
pub mod properties;
pub mod provisioning;
pub mod sensors;
pub mod telemetry;
pub mod thing;
