use airq_core::sensors::{Sample, Sensor, SensorError, SerialNumber};
use embedded_hal_async::i2c::I2c;
use log::{debug, info, warn};
use scd41_embedded::r#async::Scd41Async;

/// The sensor ignores commands for this long after stopping measurement
const STOP_MEASUREMENT_DELAY_MS: u64 = 500;

const SENSOR: &str = "SCD4x";

/// SCD40 / SCD41 in periodic measurement mode.
pub struct Scd4xSensor<I> {
    sensor: Scd41Async<I, embassy_time::Delay>,
}

impl<I: I2c> Scd4xSensor<I> {
    pub fn new(i2c: I) -> Self {
        Self {
            sensor: Scd41Async::<I, embassy_time::Delay>::new(i2c, embassy_time::Delay),
        }
    }
}

impl<I: I2c> Sensor for Scd4xSensor<I> {
    const NAME: &'static str = SENSOR;

    async fn begin(&mut self) -> Result<(), SensorError> {
        // Stop a measurement left running from before a reset
        if let Err(e) = self.sensor.stop_periodic_measurement().await {
            warn!(
                "Error trying to execute stop_periodic_measurement(): {:?}",
                e
            );
        }
        embassy_time::Timer::after_millis(STOP_MEASUREMENT_DELAY_MS).await;

        match self.sensor.serial_number().await {
            Ok(serial) => info!("Serial: {}", SerialNumber(serial)),
            Err(e) => warn!("Error trying to execute serial_number(): {:?}", e),
        }

        self.sensor.start_periodic_measurement().await.map_err(|e| {
            debug!(
                "Error trying to execute start_periodic_measurement(): {:?}",
                e
            );
            SensorError::InitializationFailed {
                sensor: SENSOR,
                details: "Failed to start periodic measurement",
            }
        })?;

        info!("SCD4x: Periodic measurement started");
        Ok(())
    }

    async fn data_ready(&mut self) -> Result<bool, SensorError> {
        self.sensor.data_ready().await.map_err(|e| {
            debug!("SCD4x data_ready check failed: {:?}", e);
            SensorError::ReadFailed {
                sensor: SENSOR,
                operation: "data_ready",
                details: "I2C communication error",
            }
        })
    }

    async fn read_measurement(&mut self) -> Result<Sample, SensorError> {
        let measurement = self.sensor.measurement().await.map_err(|e| {
            debug!("SCD4x measurement read failed: {:?}", e);
            SensorError::ReadFailed {
                sensor: SENSOR,
                operation: "measurement",
                details: "I2C communication error or invalid data",
            }
        })?;

        Ok(Sample::new(
            measurement.co2_ppm,
            measurement.temperature_c,
            measurement.humidity_rh,
        ))
    }
}
