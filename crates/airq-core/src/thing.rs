//! WebThing description of the device
//!
//! Serialises to the self-describing resource served at `/things/airq`.

use heapless::String;
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use crate::identity::{DeviceName, MAX_NAME_LEN};
use crate::properties::{PropertyId, PropertyValue};

/// Id of the single thing this device exposes.
pub const THING_ID: &str = "airq";

/// Path of the thing resource, `/things/<THING_ID>`.
pub const THING_HREF: &str = "/things/airq";

/// Path of the thing's property collection.
pub const PROPERTIES_HREF: &str = "/things/airq/properties";

pub const THING_TYPES: [&str; 1] = ["AirQualitySensor"];

const HREF_CAPACITY: usize = 48;

#[derive(Debug, Serialize)]
pub struct ThingDescription {
    pub id: &'static str,
    pub title: String<MAX_NAME_LEN>,
    #[serde(rename = "@context")]
    pub context: &'static str,
    #[serde(rename = "@type")]
    pub types: &'static [&'static str],
    pub properties: ThingPropertyMap,
    pub links: [Link; 1],
}

impl ThingDescription {
    pub fn new(name: &DeviceName) -> Self {
        let mut title = String::new();
        // Device names are bounded by the same capacity
        let _ = title.push_str(name.as_str());
        Self {
            id: THING_ID,
            title,
            context: "https://webthings.io/schemas",
            types: &THING_TYPES,
            properties: ThingPropertyMap,
            links: [Link::new("properties", properties_href())],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Link {
    pub rel: &'static str,
    pub href: String<HREF_CAPACITY>,
}

impl Link {
    fn new(rel: &'static str, href: String<HREF_CAPACITY>) -> Self {
        Self { rel, href }
    }
}

pub fn properties_href() -> String<HREF_CAPACITY> {
    let mut href = String::new();
    let _ = href.push_str(PROPERTIES_HREF);
    href
}

/// `/things/airq/properties/<name>`
pub fn property_href(id: PropertyId) -> String<HREF_CAPACITY> {
    let mut href = properties_href();
    let _ = href.push('/');
    let _ = href.push_str(id.name());
    href
}

/// Property metadata keyed by property name.
#[derive(Debug)]
pub struct ThingPropertyMap;

impl Serialize for ThingPropertyMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(PropertyId::ALL.len()))?;
        for id in PropertyId::ALL {
            map.serialize_entry(id.name(), &DescribedProperty(id))?;
        }
        map.end()
    }
}

struct DescribedProperty(PropertyId);

impl Serialize for DescribedProperty {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let descriptor = self.0.descriptor();
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("title", descriptor.title)?;
        map.serialize_entry("description", descriptor.description)?;
        map.serialize_entry("@type", descriptor.semantic_type)?;
        map.serialize_entry("type", descriptor.value_type)?;
        if let Some(unit) = descriptor.unit {
            map.serialize_entry("unit", unit)?;
        }
        if let Some(minimum) = descriptor.minimum {
            map.serialize_entry("minimum", &minimum)?;
        }
        if let Some(maximum) = descriptor.maximum {
            map.serialize_entry("maximum", &maximum)?;
        }
        map.serialize_entry("readOnly", &descriptor.read_only)?;
        map.serialize_entry("links", &[Link::new("property", property_href(self.0))])?;
        map.end()
    }
}

/// Current values keyed by property name, e.g. `{"CO2":800.0,...}`.
#[derive(Debug, Clone, Copy)]
pub struct PropertyValues {
    values: [PropertyValue; 3],
    only: Option<PropertyId>,
}

impl PropertyValues {
    pub fn all(values: [PropertyValue; 3]) -> Self {
        Self { values, only: None }
    }

    pub fn single(id: PropertyId, values: [PropertyValue; 3]) -> Self {
        Self {
            values,
            only: Some(id),
        }
    }
}

impl Serialize for PropertyValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let ids = PropertyId::ALL
            .into_iter()
            .filter(|id| self.only.is_none_or(|only| only == *id));
        let mut map = serializer.serialize_map(None)?;
        for id in ids {
            map.serialize_entry(id.name(), &self.values[id.index()])?;
        }
        map.end()
    }
}
