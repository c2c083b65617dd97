//! Desktop simulator for the airq WebThing air quality sensor.
//!
//! Runs the real provisioning state machine and telemetry cycle from
//! `airq-core` against a fake network and a mock SCD4x that drifts over
//! time, warms up with sentinel samples and occasionally fails a read.
//! Property change notifications are printed as they are published.
//!
//! # Environment
//!
//! | Variable        | Effect                                          |
//! |-----------------|-------------------------------------------------|
//! | `AIRQ_PROFILE`  | `responsive` (default) or `relaxed`             |
//! | `AIRQ_SSID`     | pretend credentials are stored; empty = pairing |
//! | `AIRQ_TICKS`    | stop after this many ticks (default: forever)   |
//! | `RUST_LOG`      | `env_logger` filter, e.g. `info` or `debug`     |

use std::time::{Duration, Instant};

use log::{debug, error, info};

use airq_core::app_state::{AppError, AppRunState};
use airq_core::config::{DEFAULT_BASE_NAME, DeviceConfig, TelemetryProfile};
use airq_core::identity::DeviceName;
use airq_core::properties::{PropertyChannel, SharedProperties, ThingProperties};
use airq_core::provisioning::{
    NetworkError, NetworkPlatform, ProvisioningState, Provisioner, StatusIndicator, Step,
};
use airq_core::sensors::{Sample, Sensor, SensorError, SerialNumber};
use airq_core::telemetry::{TelemetryCycle, TickOutcome};

// ---------------------------------------------------------------------------
// Mock collaborators
// ---------------------------------------------------------------------------

/// Reads before the mock sensor has its first measurement ready.
const WARM_UP_READS: u32 = 3;

/// Every n-th read fails with a simulated bus error.
const BUS_ERROR_EVERY: u32 = 17;

/// Generates SCD4x-like readings that vary over time.
struct MockScd4x {
    reads: u32,
}

impl MockScd4x {
    fn new() -> Self {
        Self { reads: 0 }
    }
}

impl Sensor for MockScd4x {
    const NAME: &'static str = "SCD4x (mock)";

    async fn begin(&mut self) -> Result<(), SensorError> {
        info!(
            "Serial: {}",
            SerialNumber::from_words([0x0b2e, 0x9f07, 0x3b19])
        );
        Ok(())
    }

    async fn read_measurement(&mut self) -> Result<Sample, SensorError> {
        self.reads += 1;
        if self.reads % BUS_ERROR_EVERY == 0 {
            return Err(SensorError::ReadFailed {
                sensor: Self::NAME,
                operation: "measurement",
                details: "simulated I2C NACK",
            });
        }
        if self.reads <= WARM_UP_READS {
            return Ok(Sample::default());
        }

        // The real sensor only updates every 5 s, so values repeat in between
        let t = f64::from(self.reads / 5);
        let co2 = 600.0 + 200.0 * (t / 60.0).sin() + 30.0 * (t / 8.0).cos();
        let temperature = 23.0 + 3.0 * (t / 24.0).sin();
        let humidity = 50.0 + 10.0 * (t / 36.0).sin();

        Ok(Sample::new(
            co2 as u16,
            ((temperature * 100.0).round() / 100.0) as f32,
            ((humidity * 100.0).round() / 100.0) as f32,
        ))
    }
}

/// Network that connects after a few polls.
struct FakeNetwork {
    stored_credentials: bool,
    polls_until_paired: u32,
    polls_until_connected: u32,
}

impl NetworkPlatform for FakeNetwork {
    fn has_stored_credentials(&self) -> bool {
        self.stored_credentials
    }

    async fn begin_smart_config(&mut self) -> Result<(), NetworkError> {
        info!("Waiting for smart config pairing (simulated)");
        Ok(())
    }

    fn smart_config_done(&mut self) -> bool {
        self.polls_until_paired = self.polls_until_paired.saturating_sub(1);
        self.polls_until_paired == 0
    }

    async fn begin(&mut self, hostname: &str) -> Result<(), NetworkError> {
        info!("Joining network as {}", hostname);
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        self.polls_until_connected = self.polls_until_connected.saturating_sub(1);
        self.polls_until_connected == 0
    }

    fn stop_smart_config(&mut self) {}
}

/// Status LED printed to the log.
struct ConsoleLed;

impl StatusIndicator for ConsoleLed {
    fn set(&mut self, lit: bool) {
        debug!("LED {}", if lit { "on" } else { "off" });
    }

    fn on_state(&mut self, state: ProvisioningState) {
        info!("Provisioning state: {:?}", state);
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

static PROPERTY_EVENTS: PropertyChannel = PropertyChannel::new();

fn profile_from_env() -> TelemetryProfile {
    match std::env::var("AIRQ_PROFILE").as_deref() {
        Ok("relaxed") => TelemetryProfile::Relaxed,
        _ => TelemetryProfile::Responsive,
    }
}

fn log_state(state: AppRunState) {
    info!("Device {}", state.label());
}

fn main() {
    env_logger::init();
    log_state(AppRunState::Uninitialized);

    let config = DeviceConfig::new(DEFAULT_BASE_NAME, profile_from_env());
    let tick_limit = std::env::var("AIRQ_TICKS")
        .ok()
        .and_then(|ticks| ticks.parse::<u64>().ok());

    let chip_id = std::process::id() & 0x00FF_FFFF;
    let name = match DeviceName::derive(config.base_name, chip_id, config.telemetry.name_casing) {
        Ok(name) => name,
        Err(e) => {
            error!("{}", AppError::from(e));
            return;
        }
    };
    info!("Starting airq simulator as {}", name);

    // Provisioning: step the state machine with real sleeps
    log_state(AppRunState::Provisioning);
    let network = FakeNetwork {
        stored_credentials: std::env::var("AIRQ_SSID")
            .is_ok_and(|ssid| !ssid.is_empty()),
        polls_until_paired: 4,
        polls_until_connected: 3,
    };
    let mut provisioner = Provisioner::new(network, ConsoleLed, name.as_str());
    while let Step::Wait(delay) = embassy_futures::block_on(provisioner.poll()) {
        std::thread::sleep(Duration::from_millis(delay.as_millis()));
    }
    log_state(AppRunState::Connected);

    let properties = SharedProperties::new(ThingProperties::with_channel(&PROPERTY_EVENTS));
    let mut events = match PROPERTY_EVENTS.subscriber() {
        Ok(subscriber) => subscriber,
        Err(e) => {
            error!("No subscriber slot left: {:?}", e);
            return;
        }
    };

    let mut cycle = TelemetryCycle::new(MockScd4x::new(), &properties, (), config.telemetry);

    log_state(AppRunState::SensorStarting);
    if let Err(e) = embassy_futures::block_on(cycle.start()) {
        error!("{}", e);
        log_state(AppRunState::Halted);
        return;
    }
    log_state(AppRunState::Running);

    let period = Duration::from_millis(config.telemetry.tick_period.as_millis());
    let mut ticks = 0u64;
    loop {
        let tick_start = Instant::now();

        match embassy_futures::block_on(cycle.tick()) {
            TickOutcome::Published(changes) if !changes.is_empty() => {
                debug!("Published {} properties", changes.len());
            }
            TickOutcome::Published(_) | TickOutcome::Discarded => {}
            TickOutcome::ReadFailed(e) => debug!("Tick failed: {}", e),
        }

        while let Some(event) = events.try_next_message_pure() {
            info!("-> {} = {}", event.id.name(), event.value.number);
        }

        ticks += 1;
        if tick_limit.is_some_and(|limit| ticks >= limit) {
            break;
        }

        let elapsed = tick_start.elapsed();
        if elapsed < period {
            std::thread::sleep(period - elapsed);
        }
    }

    info!("Final values: {:?}", properties.values());
    info!("Simulator exiting");
}
