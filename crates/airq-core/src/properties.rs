//! Exposed property store
//!
//! Holds the last-published value of every telemetry entity. The telemetry
//! cycle reads values back from here to decide whether a push is needed,
//! so this store (not the cycle) is the source of truth for what the
//! transport currently shows.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pubsub::{ImmediatePublisher, PubSubChannel};
use serde::Serialize;

/// Channel capacity for property change events
pub const EVENT_CHANNEL_CAPACITY: usize = 8;

/// Number of subscribers that can listen to property events
/// - Subscriber 0: transport / event stream
/// - Subscriber 1: diagnostics (simulator console)
pub const EVENT_SUBSCRIBERS: usize = 2;

/// Number of publishers (just the property store)
pub const EVENT_PUBLISHERS: usize = 1;

pub type PropertyChannel = PubSubChannel<
    CriticalSectionRawMutex,
    PropertyEvent,
    EVENT_CHANNEL_CAPACITY,
    EVENT_SUBSCRIBERS,
    EVENT_PUBLISHERS,
>;

pub type PropertyPublisher<'a> = ImmediatePublisher<
    'a,
    CriticalSectionRawMutex,
    PropertyEvent,
    EVENT_CHANNEL_CAPACITY,
    EVENT_SUBSCRIBERS,
    EVENT_PUBLISHERS,
>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyId {
    Co2,
    Temperature,
    Humidity,
}

impl PropertyId {
    pub const ALL: [PropertyId; 3] = [Self::Co2, Self::Temperature, Self::Humidity];

    pub const fn index(self) -> usize {
        match self {
            Self::Co2 => 0,
            Self::Temperature => 1,
            Self::Humidity => 2,
        }
    }

    /// Resource name of the property on the wire.
    pub const fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.name() == name)
    }

    pub const fn descriptor(self) -> &'static PropertyDescriptor {
        &DESCRIPTORS[self.index()]
    }
}

/// Value of a property. The WebThing value union only carries numbers for
/// these properties, stored at double precision.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct PropertyValue {
    pub number: f64,
}

impl PropertyValue {
    pub const ZERO: Self = Self { number: 0.0 };

    pub const fn number(number: f64) -> Self {
        Self { number }
    }
}

impl From<u16> for PropertyValue {
    fn from(value: u16) -> Self {
        Self::number(f64::from(value))
    }
}

impl From<f32> for PropertyValue {
    fn from(value: f32) -> Self {
        Self::number(f64::from(value))
    }
}

/// Static metadata of a property as registered with the thing.
#[derive(Debug)]
pub struct PropertyDescriptor {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    /// Semantic `@type` annotation
    pub semantic_type: &'static str,
    pub value_type: &'static str,
    pub unit: Option<&'static str>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub read_only: bool,
}

pub static DESCRIPTORS: [PropertyDescriptor; 3] = [
    PropertyDescriptor {
        name: "CO2",
        title: "CO2",
        description: "CO2 ppm",
        semantic_type: "ConcentrationProperty",
        value_type: "number",
        unit: Some("ppm"),
        minimum: None,
        maximum: None,
        read_only: true,
    },
    PropertyDescriptor {
        name: "Temperature",
        title: "Temperature",
        description: "Temperature",
        semantic_type: "TemperatureProperty",
        value_type: "number",
        unit: Some("degree celsius"),
        minimum: None,
        maximum: None,
        read_only: true,
    },
    PropertyDescriptor {
        name: "Humidity",
        title: "Humidity",
        description: "Humidity",
        semantic_type: "LevelProperty",
        value_type: "number",
        unit: Some("percent"),
        minimum: Some(0.0),
        maximum: Some(100.0),
        read_only: true,
    },
];

/// Notification emitted when a property's published value changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertyEvent {
    pub id: PropertyId,
    pub value: PropertyValue,
}

/// Storage of last-published property values.
pub trait PropertyStore {
    fn get_value(&self, id: PropertyId) -> PropertyValue;

    /// Store a new value. The transport is notified on the next `update()`.
    fn set_value(&mut self, id: PropertyId, value: PropertyValue);

    /// Periodic transport housekeeping, once per tick.
    fn update(&mut self);

    /// Write `value` only if it differs from the stored value.
    ///
    /// Comparison is exact. Returns whether a write happened. Stores that are
    /// shared between tasks must run the comparison and the write as one
    /// atomic unit.
    fn publish_if_changed(&mut self, id: PropertyId, value: PropertyValue) -> bool {
        if self.get_value(id) != value {
            self.set_value(id, value);
            true
        } else {
            false
        }
    }
}

/// The thing's three property slots.
pub struct ThingProperties<'a> {
    values: [PropertyValue; 3],
    pending: [bool; 3],
    notifier: Option<PropertyPublisher<'a>>,
}

impl<'a> ThingProperties<'a> {
    /// Create a store with every slot at zero and no subscribers.
    pub const fn new() -> Self {
        Self {
            values: [PropertyValue::ZERO; 3],
            pending: [false; 3],
            notifier: None,
        }
    }

    /// Create a store that announces changes on `channel`.
    pub fn with_channel(channel: &'a PropertyChannel) -> Self {
        Self {
            notifier: Some(channel.immediate_publisher()),
            ..Self::new()
        }
    }

    /// Snapshot of all values in `PropertyId::ALL` order.
    pub fn values(&self) -> [PropertyValue; 3] {
        self.values
    }

    pub fn is_pending(&self, id: PropertyId) -> bool {
        self.pending[id.index()]
    }
}

impl Default for ThingProperties<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyStore for ThingProperties<'_> {
    fn get_value(&self, id: PropertyId) -> PropertyValue {
        self.values[id.index()]
    }

    fn set_value(&mut self, id: PropertyId, value: PropertyValue) {
        self.values[id.index()] = value;
        self.pending[id.index()] = true;
    }

    fn update(&mut self) {
        for id in PropertyId::ALL {
            if !core::mem::take(&mut self.pending[id.index()]) {
                continue;
            }
            if let Some(notifier) = &self.notifier {
                notifier.publish_immediate(PropertyEvent {
                    id,
                    value: self.values[id.index()],
                });
            }
        }
    }
}

/// A [`ThingProperties`] shared between the telemetry task and the transport.
pub struct SharedProperties<'a> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<ThingProperties<'a>>>,
}

impl<'a> SharedProperties<'a> {
    pub const fn new(properties: ThingProperties<'a>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(properties)),
        }
    }

    pub fn values(&self) -> [PropertyValue; 3] {
        self.inner.lock(|cell| cell.borrow().values())
    }

    pub fn value(&self, id: PropertyId) -> PropertyValue {
        self.inner.lock(|cell| cell.borrow().get_value(id))
    }
}

/// Shared references act as the store, so several tasks can hold one.
impl PropertyStore for &SharedProperties<'_> {
    fn get_value(&self, id: PropertyId) -> PropertyValue {
        self.value(id)
    }

    fn set_value(&mut self, id: PropertyId, value: PropertyValue) {
        self.inner.lock(|cell| cell.borrow_mut().set_value(id, value));
    }

    fn update(&mut self) {
        self.inner.lock(|cell| cell.borrow_mut().update());
    }

    fn publish_if_changed(&mut self, id: PropertyId, value: PropertyValue) -> bool {
        self.inner.lock(|cell| cell.borrow_mut().publish_if_changed(id, value))
    }
}
