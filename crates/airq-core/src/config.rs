use embassy_time::Duration;
use serde::{Deserialize, Serialize};

/// Base device name used when the build does not override it.
pub const DEFAULT_BASE_NAME: &str = "AirQ";

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct InternetConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

impl InternetConfig<'_> {
    /// An empty SSID means nothing was provisioned at build time.
    pub fn has_credentials(&self) -> bool {
        !self.ssid.is_empty()
    }
}

/// How the derived device name is case-normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NameCasing {
    Lowercase,
    Preserve,
}

/// The two supported build profiles of the device.
///
/// `Responsive` polls every second and drops sentinel samples.
/// `Relaxed` polls every 30 seconds, keeps the base name casing and refuses
/// to run without a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TelemetryProfile {
    #[default]
    Responsive,
    Relaxed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Period of the telemetry tick
    pub tick_period: Duration,
    pub name_casing: NameCasing,
    /// Discard samples whose CO2 reading is the zero sentinel
    pub discard_zero_co2: bool,
    /// Halt at boot if the sensor cannot be started
    pub require_sensor: bool,
}

impl TelemetryConfig {
    pub const fn from_profile(profile: TelemetryProfile) -> Self {
        match profile {
            TelemetryProfile::Responsive => Self {
                tick_period: Duration::from_secs(1),
                name_casing: NameCasing::Lowercase,
                discard_zero_co2: true,
                require_sensor: false,
            },
            TelemetryProfile::Relaxed => Self {
                tick_period: Duration::from_secs(30),
                name_casing: NameCasing::Preserve,
                discard_zero_co2: false,
                require_sensor: true,
            },
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::from_profile(TelemetryProfile::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig<'a> {
    pub base_name: &'a str,
    pub telemetry: TelemetryConfig,
}

impl<'a> DeviceConfig<'a> {
    pub const fn new(base_name: &'a str, profile: TelemetryProfile) -> Self {
        Self {
            base_name,
            telemetry: TelemetryConfig::from_profile(profile),
        }
    }
}

impl Default for DeviceConfig<'_> {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_NAME, TelemetryProfile::default())
    }
}
