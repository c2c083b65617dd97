//! Sensor driver interface
//!
//! The telemetry cycle only talks to a CO2 sensor through the [`Sensor`]
//! trait. Concrete drivers (the SCD4x on real hardware, a mock in the
//! simulator) live in the crates that own the bus.

mod serial;

pub use serial::SerialNumber;

use core::fmt;

use thiserror_no_std::Error;

/// Errors reported by a sensor driver.
///
/// Every variant names the sensor so a log line is enough to tell an I2C bus
/// fault on one device from a power problem on another.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor}: {operation} failed: {details}")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
        details: &'static str,
    },
    #[error("{sensor}: initialization failed: {details}")]
    InitializationFailed {
        sensor: &'static str,
        details: &'static str,
    },
    #[error("{sensor}: not detected on the bus")]
    NotDetected { sensor: &'static str },
}

impl SensorError {
    /// Name of the driver operation that failed, for diagnostics.
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::ReadFailed { operation, .. } => operation,
            Self::InitializationFailed { .. } => "begin",
            Self::NotDetected { .. } => "probe",
        }
    }

    /// Driver-supplied detail text.
    pub const fn details(&self) -> &'static str {
        match self {
            Self::ReadFailed { details, .. } => details,
            Self::InitializationFailed { details, .. } => details,
            Self::NotDetected { .. } => "no acknowledge from device",
        }
    }
}

/// One measurement as returned by the driver.
///
/// `co2_ppm == 0` is the driver's way of saying "no valid measurement yet".
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sample {
    pub co2_ppm: u16,
    pub temperature_celsius: f32,
    pub humidity_percent: f32,
}

impl Sample {
    pub const fn new(co2_ppm: u16, temperature_celsius: f32, humidity_percent: f32) -> Self {
        Self {
            co2_ppm,
            temperature_celsius,
            humidity_percent,
        }
    }

    /// True when the CO2 channel carries the "unready" sentinel.
    pub const fn is_sentinel(&self) -> bool {
        self.co2_ppm == 0
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Co2:{}\tTemperature:{:.2}\tHumidity:{:.2}",
            self.co2_ppm, self.temperature_celsius, self.humidity_percent
        )
    }
}

/// Trait for CO2 / temperature / humidity sensors.
pub trait Sensor {
    /// Human readable driver name used in log lines.
    const NAME: &'static str;

    /// Bring the sensor into periodic measurement mode.
    ///
    /// Called once at boot, after the network is up.
    fn begin(&mut self) -> impl Future<Output = Result<(), SensorError>>;

    /// Ask the driver whether a fresh measurement is available.
    ///
    /// Drivers without a readiness query answer `true` and let the read
    /// itself decide.
    fn data_ready(&mut self) -> impl Future<Output = Result<bool, SensorError>> {
        async { Ok(true) }
    }

    /// Read the latest measurement.
    fn read_measurement(&mut self) -> impl Future<Output = Result<Sample, SensorError>>;
}
