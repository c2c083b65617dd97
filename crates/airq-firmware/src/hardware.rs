//! Hardware initialization for the airq device
//!
//! The SCD4x sits alone on the external I2C port, so the bus is handed to
//! the driver directly without a sharing wrapper.

use airq_core::identity::chip_id_from_mac;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::{i2c::master::Config as I2cConfig, time::Rate};

/// SCD4x supports fast mode, but long sensor cables are happier at 100 kHz
const SENSOR_I2C_FREQUENCY_KHZ: u32 = 100;

pub type SensorI2c = esp_hal::i2c::master::I2c<'static, esp_hal::Async>;

/// Initialize the I2C bus the sensor is connected to
pub fn create_i2c_bus(
    i2c0: esp_hal::peripherals::I2C0<'static>,
    sda: esp_hal::peripherals::GPIO2<'static>,
    scl: esp_hal::peripherals::GPIO1<'static>,
) -> Result<SensorI2c, esp_hal::i2c::master::ConfigError> {
    Ok(esp_hal::i2c::master::I2c::new(
        i2c0,
        I2cConfig::default().with_frequency(Rate::from_khz(SENSOR_I2C_FREQUENCY_KHZ)),
    )?
    .with_sda(sda)
    .with_scl(scl)
    .into_async())
}

/// Status LED, on while booting.
pub fn create_status_led(pin: esp_hal::peripherals::GPIO21<'static>) -> Output<'static> {
    Output::new(pin, Level::High, OutputConfig::default())
}

/// Hardware-derived id used to make the device name unique.
pub fn chip_id() -> u32 {
    chip_id_from_mac(esp_hal::efuse::Efuse::mac_address())
}
