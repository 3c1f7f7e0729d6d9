use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use snafu::ensure;

use super::MetricSerializer;
use crate::encoding::{EmptyMetricSnafu, EncodeError, LineTooLongSnafu};
use crate::metric::{FieldValue, Metric};

/// Characters escaped in the measurement name.
const MEASUREMENT_ESCAPES: &[char] = &[',', ' '];

/// Characters escaped in tag keys, tag values, and field keys.
const ELEMENT_ESCAPES: &[char] = &[',', '=', ' '];

/// Config used to build an `InfluxSerializer`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct InfluxSerializerConfig {
    /// Maximum serialized line length in bytes, measured before the
    /// trailing newline. `0` means unlimited.
    #[serde(default)]
    pub max_line_bytes: usize,

    /// Sort fields by key.
    ///
    /// Fields are serialized in insertion order otherwise; sorting is
    /// less performant and mostly useful when comparing output.
    #[serde(default)]
    pub sort_fields: bool,

    /// Emit unsigned integer fields with the `u` suffix.
    ///
    /// When disabled, unsigned fields are clamped to `i64::MAX` and
    /// emitted as signed integers for compatibility with servers that
    /// do not accept the unsigned syntax.
    #[serde(default)]
    pub uint_support: bool,
}

impl InfluxSerializerConfig {
    /// Creates a new `InfluxSerializerConfig`.
    pub const fn new(max_line_bytes: usize, sort_fields: bool, uint_support: bool) -> Self {
        Self {
            max_line_bytes,
            sort_fields,
            uint_support,
        }
    }

    /// Build the `InfluxSerializer` from this configuration.
    pub const fn build(&self) -> InfluxSerializer {
        InfluxSerializer {
            max_line_bytes: self.max_line_bytes,
            sort_fields: self.sort_fields,
            uint_support: self.uint_support,
        }
    }
}

/// Serializer that converts a metric to bytes using the InfluxDB line
/// protocol.
///
/// Each metric becomes one `measurement[,tags] fields timestamp` line
/// terminated by a newline, with tags ordered by key and the timestamp in
/// nanoseconds since the epoch.
#[derive(Clone, Debug)]
pub struct InfluxSerializer {
    max_line_bytes: usize,
    sort_fields: bool,
    uint_support: bool,
}

impl InfluxSerializer {
    fn format_field(&self, value: &FieldValue) -> Option<String> {
        match value {
            FieldValue::Float(value) => value.is_finite().then(|| value.to_string()),
            FieldValue::Int(value) => Some(format!("{value}i")),
            FieldValue::UInt(value) => Some(if self.uint_support {
                format!("{value}u")
            } else {
                format!("{}i", (*value).min(i64::MAX as u64))
            }),
            FieldValue::Bool(value) => Some(value.to_string()),
            FieldValue::String(value) => {
                let mut quoted = String::with_capacity(value.len() + 2);
                quoted.push('"');
                for ch in value.chars() {
                    if ch == '"' || ch == '\\' {
                        quoted.push('\\');
                    }
                    quoted.push(ch);
                }
                quoted.push('"');
                Some(quoted)
            }
        }
    }
}

impl MetricSerializer for InfluxSerializer {
    fn encode(&mut self, metric: &Metric, buffer: &mut BytesMut) -> Result<(), EncodeError> {
        let mut line = String::with_capacity(128);

        escape_to(&mut line, metric.name(), MEASUREMENT_ESCAPES);

        for (key, value) in metric.tags().iter_sorted() {
            if key.is_empty() || value.is_empty() {
                continue;
            }
            line.push(',');
            escape_to(&mut line, key, ELEMENT_ESCAPES);
            line.push('=');
            escape_to(&mut line, value, ELEMENT_ESCAPES);
        }

        let mut fields: Vec<(&str, &FieldValue)> = metric
            .fields()
            .iter()
            .map(|(key, value)| (key.as_str(), value))
            .collect();
        if self.sort_fields {
            fields.sort_by_key(|(key, _)| *key);
        }

        let mut wrote_field = false;
        for (key, value) in fields {
            let Some(value) = self.format_field(value) else {
                continue;
            };
            line.push(if wrote_field { ',' } else { ' ' });
            escape_to(&mut line, key, ELEMENT_ESCAPES);
            line.push('=');
            line.push_str(&value);
            wrote_field = true;
        }
        ensure!(wrote_field, EmptyMetricSnafu { name: metric.name() });

        line.push(' ');
        // Timestamps outside the nanosecond-representable range saturate.
        let timestamp = metric.timestamp().timestamp_nanos_opt().unwrap_or(i64::MAX);
        line.push_str(&timestamp.to_string());

        ensure!(
            self.max_line_bytes == 0 || line.len() <= self.max_line_bytes,
            LineTooLongSnafu {
                line: line.len(),
                limit: self.max_line_bytes,
            }
        );

        line.push('\n');
        buffer.extend_from_slice(line.as_bytes());

        Ok(())
    }
}

fn escape_to(output: &mut String, input: &str, escaped: &[char]) {
    for ch in input.chars() {
        if escaped.contains(&ch) {
            output.push('\\');
        }
        output.push(ch);
    }
}
