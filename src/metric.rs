//! The metric data model consumed by the serializers.
//!
//! A metric is a named, timestamped measurement carrying a set of tags
//! (string key/value pairs used for grouping and routing) and a set of
//! typed fields (the measured values themselves). Tag and field maps
//! preserve insertion order so that serializers which expose optional
//! sorting behave observably.

use core::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

/// The value of a single metric field.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A 64-bit floating point value.
    Float(f64),
    /// A signed 64-bit integer value.
    Int(i64),
    /// An unsigned 64-bit integer value.
    UInt(u64),
    /// A boolean value.
    Bool(bool),
    /// A string value.
    String(String),
}

impl FieldValue {
    /// Gets a numeric view of this value, if one exists.
    ///
    /// Booleans map to `1.0`/`0.0`. String values, and floats that are
    /// not finite, have no numeric view.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(value) => value.is_finite().then_some(*value),
            FieldValue::Int(value) => Some(*value as f64),
            FieldValue::UInt(value) => Some(*value as f64),
            FieldValue::Bool(value) => Some(if *value { 1.0 } else { 0.0 }),
            FieldValue::String(_) => None,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Tags of a metric, as a map of tag names to tag values.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricTags(IndexMap<String, String>);

impl MetricTags {
    /// Returns `true` if the metric carries no tags.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Gets the number of tags.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Gets a reference to the value of the named tag, if it exists.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Sets or updates the value of a tag, returning the old value.
    pub fn replace(&mut self, key: String, value: String) -> Option<String> {
        self.0.insert(key, value)
    }

    /// Removes the tag entry for the named key, if it exists, and returns
    /// the old value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.shift_remove(key)
    }

    /// Iterates over the tags in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Iterates over the tags sorted by tag name.
    ///
    /// Most line-oriented wire formats require, or canonicalize on, tags
    /// ordered by key.
    pub fn iter_sorted(&self) -> impl Iterator<Item = (&str, &str)> {
        let mut tags: Vec<_> = self.iter().collect();
        tags.sort_by_key(|(key, _)| *key);
        tags.into_iter()
    }
}

impl FromIterator<(String, String)> for MetricTags {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A named, timestamped measurement with tags and typed fields.
#[derive(Clone, Debug, PartialEq)]
pub struct Metric {
    name: String,
    tags: MetricTags,
    fields: IndexMap<String, FieldValue>,
    timestamp: DateTime<Utc>,
}

impl Metric {
    /// Creates a new `Metric` with the given measurement name and
    /// timestamp, and no tags or fields.
    pub fn new(name: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            tags: MetricTags::default(),
            fields: IndexMap::new(),
            timestamp,
        }
    }

    /// Consumes this metric, returning it with the given tag added.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.replace(key.into(), value.into());
        self
    }

    /// Consumes this metric, returning it with the given field added.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Gets a reference to the measurement name.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Gets a reference to the tags of this metric.
    pub fn tags(&self) -> &MetricTags {
        &self.tags
    }

    /// Gets a mutable reference to the tags of this metric.
    pub fn tags_mut(&mut self) -> &mut MetricTags {
        &mut self.tags
    }

    /// Gets a reference to the fields of this metric, in insertion order.
    pub fn fields(&self) -> &IndexMap<String, FieldValue> {
        &self.fields
    }

    /// Gets the timestamp of this metric.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl fmt::Display for Metric {
    /// Display a metric series using something like Prometheus' text format:
    ///
    /// ```text
    /// NAME{TAGS}
    /// ```
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(fmt, "{}{{", self.name)?;
        for (index, (tag, value)) in self.tags.iter().enumerate() {
            if index > 0 {
                write!(fmt, ",")?;
            }
            write!(fmt, "{tag}={value:?}")?;
        }
        write!(fmt, "}}")
    }
}
