//! Telemetry cycle
//!
//! Once per tick the cycle polls the sensor and copies every value that
//! differs from the last-published one into the property store. The store is
//! read back on each tick rather than caching the previous sample, so a
//! value changed by anything else is still compared correctly.
//!
//! Read errors and sentinel samples end the tick without touching any
//! property; the next tick retries on its own.

use embassy_time::Ticker;
use log::{debug, error, info, warn};

use crate::app_state::AppError;
use crate::config::TelemetryConfig;
use crate::properties::{PropertyId, PropertyStore, PropertyValue};
use crate::sensors::{Sample, Sensor, SensorError};

/// Service discovery housekeeping (mDNS and friends), run once per tick.
pub trait ServiceDiscovery {
    fn update(&mut self) {}
}

/// For platforms that announce themselves some other way (DHCP hostname).
impl ServiceDiscovery for () {}

/// Last-published values, read from the store at the start of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Snapshot {
    values: [PropertyValue; 3],
}

impl Snapshot {
    pub fn read<P: PropertyStore>(store: &P) -> Self {
        Self {
            values: PropertyId::ALL.map(|id| store.get_value(id)),
        }
    }

    pub const fn get(&self, id: PropertyId) -> PropertyValue {
        self.values[id.index()]
    }
}

impl From<[PropertyValue; 3]> for Snapshot {
    fn from(values: [PropertyValue; 3]) -> Self {
        Self { values }
    }
}

/// Value of one entity in a fresh sample, widened to the store's precision.
pub fn sample_value(sample: &Sample, id: PropertyId) -> PropertyValue {
    match id {
        PropertyId::Co2 => sample.co2_ppm.into(),
        PropertyId::Temperature => sample.temperature_celsius.into(),
        PropertyId::Humidity => sample.humidity_percent.into(),
    }
}

/// Set of properties touched by a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeSet {
    bits: u8,
}

impl ChangeSet {
    pub const EMPTY: Self = Self { bits: 0 };

    pub fn insert(&mut self, id: PropertyId) {
        self.bits |= 1 << id.index();
    }

    pub const fn contains(&self, id: PropertyId) -> bool {
        self.bits & (1 << id.index()) != 0
    }

    pub const fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub const fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = PropertyId> + '_ {
        PropertyId::ALL.into_iter().filter(|id| self.contains(*id))
    }
}

impl FromIterator<PropertyId> for ChangeSet {
    fn from_iter<T: IntoIterator<Item = PropertyId>>(iter: T) -> Self {
        let mut changes = Self::EMPTY;
        for id in iter {
            changes.insert(id);
        }
        changes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The sample is the CO2 sentinel; nothing may be written.
    Discard,
    /// Write exactly these properties.
    Publish(ChangeSet),
}

/// Decide what a fresh sample does to the last-published values.
///
/// Pure: no I/O, no logging. Values are compared exactly, so any jitter in
/// the sensor output leads to a publish.
pub fn decide(prior: &Snapshot, sample: &Sample, discard_zero_co2: bool) -> Decision {
    if discard_zero_co2 && sample.is_sentinel() {
        return Decision::Discard;
    }

    Decision::Publish(
        PropertyId::ALL
            .into_iter()
            .filter(|id| sample_value(sample, *id) != prior.get(*id))
            .collect(),
    )
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Sample accepted; the listed properties were written (possibly none).
    Published(ChangeSet),
    /// Sentinel sample dropped.
    Discarded,
    /// The driver reported an error; nothing was written.
    ReadFailed(SensorError),
}

/// Owns the sensor, the property store and the discovery service, and runs
/// the periodic cycle over them.
pub struct TelemetryCycle<S, P, D = ()> {
    sensor: S,
    store: P,
    discovery: D,
    config: TelemetryConfig,
}

impl<S, P, D> TelemetryCycle<S, P, D>
where
    S: Sensor,
    P: PropertyStore,
    D: ServiceDiscovery,
{
    pub fn new(sensor: S, store: P, discovery: D, config: TelemetryConfig) -> Self {
        Self {
            sensor,
            store,
            discovery,
            config,
        }
    }

    /// Start the sensor. Fails only when the configuration requires a
    /// working sensor; otherwise the error is logged and ticks will report
    /// read failures until the sensor recovers.
    pub async fn start(&mut self) -> Result<(), AppError> {
        match self.sensor.begin().await {
            Ok(()) => {
                info!("{} started", S::NAME);
                Ok(())
            }
            Err(e) if self.config.require_sensor => {
                error!("{} could not be started: {}", S::NAME, e);
                Err(e.into())
            }
            Err(e) => {
                warn!("{} could not be started, continuing: {}", S::NAME, e);
                Ok(())
            }
        }
    }

    /// One timer tick: discovery housekeeping, telemetry, then property
    /// store housekeeping.
    pub async fn tick(&mut self) -> TickOutcome {
        self.discovery.update();
        let outcome = self.poll_sensor().await;
        self.store.update();
        outcome
    }

    /// Run forever at the configured period.
    pub async fn run(&mut self) -> ! {
        info!(
            "Telemetry running every {} ms",
            self.config.tick_period.as_millis()
        );
        let mut ticker = Ticker::every(self.config.tick_period);
        loop {
            ticker.next().await;
            self.tick().await;
        }
    }

    async fn poll_sensor(&mut self) -> TickOutcome {
        let sample = match self.read_sample().await {
            Ok(sample) => sample,
            Err(e) => {
                error!(
                    "Error trying to execute {}(): {}",
                    e.operation(),
                    e.details()
                );
                return TickOutcome::ReadFailed(e);
            }
        };

        let prior = Snapshot::read(&self.store);
        let changes = match decide(&prior, &sample, self.config.discard_zero_co2) {
            Decision::Discard => {
                warn!("Invalid sample detected, skipping.");
                return TickOutcome::Discarded;
            }
            Decision::Publish(changes) => changes,
        };

        info!("{}", sample);

        // Re-checked under the store's own compare-then-write
        let mut written = ChangeSet::EMPTY;
        for id in changes.iter() {
            if self.store.publish_if_changed(id, sample_value(&sample, id)) {
                written.insert(id);
            }
        }

        if written.is_empty() {
            debug!("No property changed");
        }

        TickOutcome::Published(written)
    }

    async fn read_sample(&mut self) -> Result<Sample, SensorError> {
        if !self.sensor.data_ready().await? {
            debug!("{} reports no fresh data, reading anyway", S::NAME);
        }
        self.sensor.read_measurement().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TelemetryConfig, TelemetryProfile};
    use crate::properties::{PropertyChannel, PropertyEvent, ThingProperties};
    use embassy_futures::block_on;
    use std::collections::VecDeque;

    const BUS_ERROR: SensorError = SensorError::ReadFailed {
        sensor: "SCD4x",
        operation: "measurement",
        details: "I2C NACK",
    };

    /// Sensor that replays a scripted list of read results.
    #[derive(Default)]
    struct ScriptedSensor {
        reads: VecDeque<Result<Sample, SensorError>>,
        ready: VecDeque<Result<bool, SensorError>>,
        begin_result: Option<SensorError>,
        read_calls: usize,
    }

    impl ScriptedSensor {
        fn with_reads(reads: impl IntoIterator<Item = Result<Sample, SensorError>>) -> Self {
            Self {
                reads: reads.into_iter().collect(),
                ..Default::default()
            }
        }
    }

    impl Sensor for ScriptedSensor {
        const NAME: &'static str = "scripted";

        async fn begin(&mut self) -> Result<(), SensorError> {
            match self.begin_result {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }

        async fn data_ready(&mut self) -> Result<bool, SensorError> {
            self.ready.pop_front().unwrap_or(Ok(true))
        }

        async fn read_measurement(&mut self) -> Result<Sample, SensorError> {
            self.read_calls += 1;
            self.reads.pop_front().expect("unexpected read")
        }
    }

    /// Store wrapper counting raw writes.
    #[derive(Default)]
    struct CountingStore {
        inner: ThingProperties<'static>,
        writes: std::vec::Vec<PropertyId>,
        updates: usize,
    }

    impl PropertyStore for CountingStore {
        fn get_value(&self, id: PropertyId) -> PropertyValue {
            self.inner.get_value(id)
        }

        fn set_value(&mut self, id: PropertyId, value: PropertyValue) {
            self.writes.push(id);
            self.inner.set_value(id, value);
        }

        fn update(&mut self) {
            self.updates += 1;
            self.inner.update();
        }
    }

    #[derive(Default)]
    struct CountingDiscovery {
        updates: usize,
    }

    impl ServiceDiscovery for CountingDiscovery {
        fn update(&mut self) {
            self.updates += 1;
        }
    }

    fn cycle(
        sensor: ScriptedSensor,
    ) -> TelemetryCycle<ScriptedSensor, CountingStore, CountingDiscovery> {
        TelemetryCycle::new(
            sensor,
            CountingStore::default(),
            CountingDiscovery::default(),
            TelemetryConfig::from_profile(TelemetryProfile::Responsive),
        )
    }

    fn seeded(
        sensor: ScriptedSensor,
        prior: Sample,
    ) -> TelemetryCycle<ScriptedSensor, CountingStore, CountingDiscovery> {
        let mut cycle = cycle(sensor);
        for id in PropertyId::ALL {
            cycle.store.inner.set_value(id, sample_value(&prior, id));
        }
        cycle.store.inner.update();
        cycle
    }

    fn values(
        cycle: &TelemetryCycle<ScriptedSensor, CountingStore, CountingDiscovery>,
    ) -> Snapshot {
        Snapshot::read(&cycle.store)
    }

    fn snapshot_of(sample: Sample) -> Snapshot {
        PropertyId::ALL.map(|id| sample_value(&sample, id)).into()
    }

    const BASELINE: Sample = Sample::new(800, 21.5, 45.0);

    #[test]
    fn test_first_valid_sample_publishes_everything() {
        let mut cycle = cycle(ScriptedSensor::with_reads([Ok(BASELINE)]));

        let outcome = block_on(cycle.tick());

        let all: ChangeSet = PropertyId::ALL.into_iter().collect();
        assert_eq!(outcome, TickOutcome::Published(all));
        assert_eq!(values(&cycle), snapshot_of(BASELINE));
        assert_eq!(cycle.store.writes.len(), 3);
    }

    #[test]
    fn test_unchanged_sample_writes_nothing() {
        let mut cycle = seeded(ScriptedSensor::with_reads([Ok(BASELINE)]), BASELINE);

        let outcome = block_on(cycle.tick());

        assert_eq!(outcome, TickOutcome::Published(ChangeSet::EMPTY));
        assert!(cycle.store.writes.is_empty());
        assert_eq!(values(&cycle), snapshot_of(BASELINE));
    }

    #[test]
    fn test_sentinel_sample_is_discarded() {
        let sentinel = Sample::new(0, 21.6, 45.0);
        let mut cycle = seeded(ScriptedSensor::with_reads([Ok(sentinel)]), BASELINE);

        let outcome = block_on(cycle.tick());

        assert_eq!(outcome, TickOutcome::Discarded);
        assert!(cycle.store.writes.is_empty());
        assert_eq!(values(&cycle), snapshot_of(BASELINE));
    }

    #[test]
    fn test_read_error_leaves_properties_and_next_tick_recovers() {
        let next = Sample::new(810, 21.5, 45.0);
        let mut cycle = seeded(
            ScriptedSensor::with_reads([Err(BUS_ERROR), Ok(next)]),
            BASELINE,
        );

        assert_eq!(block_on(cycle.tick()), TickOutcome::ReadFailed(BUS_ERROR));
        assert!(cycle.store.writes.is_empty());
        assert_eq!(values(&cycle), snapshot_of(BASELINE));

        let outcome = block_on(cycle.tick());
        assert_eq!(
            outcome,
            TickOutcome::Published([PropertyId::Co2].into_iter().collect())
        );
        assert_eq!(values(&cycle), snapshot_of(next));
    }

    #[test]
    fn test_only_changed_entity_is_written() {
        let mut cycle = seeded(
            ScriptedSensor::with_reads([Ok(Sample::new(805, 21.5, 45.0))]),
            BASELINE,
        );

        let outcome = block_on(cycle.tick());

        assert_eq!(
            outcome,
            TickOutcome::Published([PropertyId::Co2].into_iter().collect())
        );
        assert_eq!(cycle.store.writes, [PropertyId::Co2]);
        assert_eq!(
            cycle.store.get_value(PropertyId::Co2),
            PropertyValue::number(805.0)
        );
        assert_eq!(
            cycle.store.get_value(PropertyId::Temperature),
            PropertyValue::number(21.5)
        );
        assert_eq!(
            cycle.store.get_value(PropertyId::Humidity),
            PropertyValue::number(45.0)
        );
    }

    #[test]
    fn test_same_sample_twice_publishes_once() {
        let mut cycle = cycle(ScriptedSensor::with_reads([Ok(BASELINE), Ok(BASELINE)]));

        block_on(cycle.tick());
        let writes_after_first = cycle.store.writes.len();
        let second = block_on(cycle.tick());

        assert_eq!(writes_after_first, 3);
        assert_eq!(second, TickOutcome::Published(ChangeSet::EMPTY));
        assert_eq!(cycle.store.writes.len(), 3);
    }

    #[test]
    fn test_readiness_error_aborts_tick_without_reading() {
        let mut sensor = ScriptedSensor::with_reads([]);
        let not_ready = SensorError::ReadFailed {
            sensor: "SCD4x",
            operation: "data_ready",
            details: "I2C timeout",
        };
        sensor.ready.push_back(Err(not_ready));
        let mut cycle = seeded(sensor, BASELINE);

        assert_eq!(block_on(cycle.tick()), TickOutcome::ReadFailed(not_ready));
        assert_eq!(cycle.sensor.read_calls, 0);
        assert!(cycle.store.writes.is_empty());
    }

    #[test]
    fn test_not_ready_still_reads() {
        let mut sensor = ScriptedSensor::with_reads([Ok(Sample::new(0, 0.0, 0.0))]);
        sensor.ready.push_back(Ok(false));
        let mut cycle = cycle(sensor);

        assert_eq!(block_on(cycle.tick()), TickOutcome::Discarded);
        assert_eq!(cycle.sensor.read_calls, 1);
    }

    #[test]
    fn test_housekeeping_runs_every_tick() {
        let mut cycle = cycle(ScriptedSensor::with_reads([
            Err(BUS_ERROR),
            Ok(Sample::new(0, 1.0, 1.0)),
            Ok(BASELINE),
        ]));

        for _ in 0..3 {
            block_on(cycle.tick());
        }

        assert_eq!(cycle.discovery.updates, 3);
        assert_eq!(cycle.store.updates, 3);
    }

    #[test]
    fn test_sentinel_check_can_be_disabled() {
        let mut cycle = TelemetryCycle::new(
            ScriptedSensor::with_reads([Ok(Sample::new(0, 21.6, 45.0))]),
            CountingStore::default(),
            (),
            TelemetryConfig::from_profile(TelemetryProfile::Relaxed),
        );

        let outcome = block_on(cycle.tick());

        let expected: ChangeSet = [PropertyId::Temperature, PropertyId::Humidity]
            .into_iter()
            .collect();
        assert_eq!(outcome, TickOutcome::Published(expected));
        assert_eq!(cycle.store.get_value(PropertyId::Co2), PropertyValue::ZERO);
    }

    #[test]
    fn test_changes_reach_subscribers_on_update() {
        let channel = PropertyChannel::new();
        let mut subscriber = channel.subscriber().unwrap();
        let mut cycle = TelemetryCycle::new(
            ScriptedSensor::with_reads([Ok(Sample::new(805, 0.0, 0.0))]),
            ThingProperties::with_channel(&channel),
            (),
            TelemetryConfig::default(),
        );

        block_on(cycle.tick());

        assert_eq!(
            subscriber.try_next_message_pure(),
            Some(PropertyEvent {
                id: PropertyId::Co2,
                value: PropertyValue::number(805.0),
            })
        );
        assert!(subscriber.try_next_message_pure().is_none());
    }

    #[test]
    fn test_start_failure_depends_on_profile() {
        let failure = SensorError::NotDetected { sensor: "scripted" };

        let mut tolerant = cycle(ScriptedSensor {
            begin_result: Some(failure),
            ..Default::default()
        });
        assert!(block_on(tolerant.start()).is_ok());

        let mut strict = TelemetryCycle::new(
            ScriptedSensor {
                begin_result: Some(failure),
                ..Default::default()
            },
            CountingStore::default(),
            (),
            TelemetryConfig::from_profile(TelemetryProfile::Relaxed),
        );
        assert!(matches!(
            block_on(strict.start()),
            Err(AppError::Sensor(SensorError::NotDetected { .. }))
        ));
    }

    #[test]
    fn test_decide_compares_exactly() {
        let prior = snapshot_of(BASELINE);
        let jitter = Sample::new(800, f32::from_bits(21.5f32.to_bits() + 1), 45.0);

        assert_eq!(
            decide(&prior, &jitter, true),
            Decision::Publish([PropertyId::Temperature].into_iter().collect())
        );
        assert_eq!(
            decide(&prior, &Sample::new(0, 30.0, 30.0), true),
            Decision::Discard
        );
    }
}
