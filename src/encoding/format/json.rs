use bytes::{BufMut, BytesMut};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use snafu::{ensure, ResultExt};

use super::MetricSerializer;
use crate::encoding::{EmptyMetricSnafu, EncodeError, JsonSnafu};
use crate::metric::Metric;

/// The resolution used for JSON-encoded timestamps.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampUnits {
    /// Whole seconds since the epoch.
    #[default]
    Seconds,
    /// Milliseconds since the epoch.
    Milliseconds,
    /// Microseconds since the epoch.
    Microseconds,
    /// Nanoseconds since the epoch.
    Nanoseconds,
}

impl TimestampUnits {
    fn apply(self, timestamp: DateTime<Utc>) -> i64 {
        match self {
            TimestampUnits::Seconds => timestamp.timestamp(),
            TimestampUnits::Milliseconds => timestamp.timestamp_millis(),
            TimestampUnits::Microseconds => timestamp.timestamp_micros(),
            // Saturates outside the nanosecond-representable range.
            TimestampUnits::Nanoseconds => timestamp.timestamp_nanos_opt().unwrap_or(i64::MAX),
        }
    }
}

/// Config used to build a `JsonSerializer`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct JsonSerializerConfig {
    /// The resolution of the `timestamp` value in the encoded object.
    #[serde(default)]
    pub timestamp_units: TimestampUnits,
}

impl JsonSerializerConfig {
    /// Creates a new `JsonSerializerConfig`.
    pub const fn new(timestamp_units: TimestampUnits) -> Self {
        Self { timestamp_units }
    }

    /// Build the `JsonSerializer` from this configuration.
    pub const fn build(&self) -> JsonSerializer {
        JsonSerializer {
            timestamp_units: self.timestamp_units,
        }
    }
}

/// Serializer that converts a metric to bytes using the JSON format.
///
/// A single metric is encoded as one object followed by a newline; a
/// batch is encoded as a single `{"metrics": [...]}` envelope with no
/// line framing.
#[derive(Clone, Debug)]
pub struct JsonSerializer {
    timestamp_units: TimestampUnits,
}

impl JsonSerializer {
    /// Encode a metric and represent it as a JSON value.
    pub fn to_json_value(&self, metric: &Metric) -> serde_json::Value {
        json!({
            "fields": metric.fields(),
            "name": metric.name(),
            "tags": metric.tags(),
            "timestamp": self.timestamp_units.apply(metric.timestamp()),
        })
    }
}

impl MetricSerializer for JsonSerializer {
    fn encode(&mut self, metric: &Metric, buffer: &mut BytesMut) -> Result<(), EncodeError> {
        ensure!(
            !metric.fields().is_empty(),
            EmptyMetricSnafu { name: metric.name() }
        );

        serde_json::to_writer(buffer.writer(), &self.to_json_value(metric)).context(JsonSnafu)?;
        buffer.put_u8(b'\n');

        Ok(())
    }

    fn encode_batch(&mut self, metrics: &[Metric], buffer: &mut BytesMut) -> Result<(), EncodeError> {
        let mut values = Vec::with_capacity(metrics.len());
        for metric in metrics {
            ensure!(
                !metric.fields().is_empty(),
                EmptyMetricSnafu { name: metric.name() }
            );
            values.push(self.to_json_value(metric));
        }

        serde_json::to_writer(buffer.writer(), &json!({ "metrics": values })).context(JsonSnafu)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use similar_asserts::assert_eq;

    use super::*;

    fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()
    }

    fn metric() -> Metric {
        Metric::new("cpu", timestamp())
            .with_tag("host", "localhost")
            .with_field("usage_idle", 98.2)
    }

    #[test]
    fn serializes_single_metric_as_object_line() {
        let mut serializer = JsonSerializerConfig::default().build();
        let mut buffer = BytesMut::new();

        serializer.encode(&metric(), &mut buffer).unwrap();
        assert_eq!(
            String::from_utf8(buffer.to_vec()).unwrap(),
            r#"{"fields":{"usage_idle":98.2},"name":"cpu","tags":{"host":"localhost"},"timestamp":1609459200}"#
                .to_owned()
                + "\n"
        );
    }

    #[test]
    fn timestamp_units_scale_the_timestamp() {
        let mut serializer =
            JsonSerializerConfig::new(TimestampUnits::Milliseconds).build();
        let mut buffer = BytesMut::new();

        serializer.encode(&metric(), &mut buffer).unwrap();
        assert!(String::from_utf8(buffer.to_vec())
            .unwrap()
            .contains(r#""timestamp":1609459200000"#));
    }

    #[test]
    fn serializes_batch_as_envelope() {
        let mut serializer = JsonSerializerConfig::default().build();
        let mut buffer = BytesMut::new();

        let other = Metric::new("mem", timestamp()).with_field("used", 512_u64);
        serializer
            .encode_batch(&[metric(), other], &mut buffer)
            .unwrap();

        let output = String::from_utf8(buffer.to_vec()).unwrap();
        assert!(output.starts_with(r#"{"metrics":["#));
        assert!(!output.ends_with('\n'));

        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["metrics"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn rejects_metric_without_fields() {
        let mut serializer = JsonSerializerConfig::default().build();
        let mut buffer = BytesMut::new();

        let error = serializer
            .encode(&Metric::new("empty", timestamp()), &mut buffer)
            .unwrap_err();
        assert!(matches!(error, EncodeError::EmptyMetric { .. }));
    }
}
