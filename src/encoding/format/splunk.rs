use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use snafu::{ensure, ResultExt};

use super::MetricSerializer;
use crate::encoding::{EmptyMetricSnafu, EncodeError, JsonSnafu};
use crate::metric::{FieldValue, Metric};

/// Config used to build a `SplunkSerializer`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SplunkSerializerConfig {
    /// Wrap each record in a HEC event envelope carrying `time`, `event`,
    /// and `host` routing fields.
    #[serde(default)]
    pub hec_routing: bool,

    /// Fold all fields of a metric into a single multi-metric record
    /// (supported by Splunk 8.0+).
    #[serde(default)]
    pub multi_metric: bool,
}

impl SplunkSerializerConfig {
    /// Creates a new `SplunkSerializerConfig`.
    pub const fn new(hec_routing: bool, multi_metric: bool) -> Self {
        Self {
            hec_routing,
            multi_metric,
        }
    }

    /// Build the `SplunkSerializer` from this configuration.
    pub const fn build(&self) -> SplunkSerializer {
        SplunkSerializer {
            hec_routing: self.hec_routing,
            multi_metric: self.multi_metric,
        }
    }
}

/// Serializer that converts a metric to Splunk HEC metric JSON objects,
/// newline-delimited, one per numeric field (or one per metric in
/// multi-metric mode).
#[derive(Clone, Debug)]
pub struct SplunkSerializer {
    hec_routing: bool,
    multi_metric: bool,
}

impl SplunkSerializer {
    fn records(&self, metric: &Metric) -> Result<Vec<Value>, EncodeError> {
        ensure!(
            !metric.fields().is_empty(),
            EmptyMetricSnafu { name: metric.name() }
        );

        // HEC expects epoch seconds with sub-second precision.
        let time = metric.timestamp().timestamp_millis() as f64 / 1000.0;

        let mut records = Vec::new();
        if self.multi_metric {
            let mut fields = Map::new();
            for (field, value) in metric.fields() {
                let Some(value) = numeric_value(value) else {
                    continue;
                };
                fields.insert(format!("metric_name:{}.{}", metric.name(), field), value);
            }
            if !fields.is_empty() {
                records.push(self.wrap(metric, time, fields));
            }
        } else {
            for (field, value) in metric.fields() {
                let Some(value) = numeric_value(value) else {
                    continue;
                };
                let mut fields = Map::new();
                fields.insert("_value".to_owned(), value);
                fields.insert(
                    "metric_name".to_owned(),
                    Value::String(format!("{}.{}", metric.name(), field)),
                );
                records.push(self.wrap(metric, time, fields));
            }
        }

        Ok(records)
    }

    /// Attach tags and routing to a record's measurement fields.
    fn wrap(&self, metric: &Metric, time: f64, mut fields: Map<String, Value>) -> Value {
        let host = metric.tags().get("host").map(str::to_owned);

        for (key, value) in metric.tags().iter() {
            if self.hec_routing && key == "host" {
                continue;
            }
            fields.insert(key.to_owned(), Value::String(value.to_owned()));
        }

        if self.hec_routing {
            let mut envelope = Map::new();
            envelope.insert("time".to_owned(), time.into());
            envelope.insert("event".to_owned(), Value::String("metric".to_owned()));
            if let Some(host) = host {
                envelope.insert("host".to_owned(), Value::String(host));
            }
            envelope.insert("fields".to_owned(), Value::Object(fields));
            Value::Object(envelope)
        } else {
            fields.insert("time".to_owned(), time.into());
            Value::Object(fields)
        }
    }
}

impl MetricSerializer for SplunkSerializer {
    fn encode(&mut self, metric: &Metric, buffer: &mut BytesMut) -> Result<(), EncodeError> {
        for record in self.records(metric)? {
            serde_json::to_writer(buffer.writer(), &record).context(JsonSnafu)?;
            buffer.put_u8(b'\n');
        }
        Ok(())
    }
}

fn numeric_value(value: &FieldValue) -> Option<Value> {
    match value {
        FieldValue::Float(value) => serde_json::Number::from_f64(*value).map(Value::Number),
        FieldValue::Int(value) => Some(Value::from(*value)),
        FieldValue::UInt(value) => Some(Value::from(*value)),
        FieldValue::Bool(value) => Some(Value::from(u8::from(*value))),
        FieldValue::String(_) => None,
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

    fn serialize(config: SplunkSerializerConfig, metric: &Metric) -> String {
        let mut serializer = config.build();
        let mut buffer = BytesMut::new();
        serializer.encode(metric, &mut buffer).unwrap();
        String::from_utf8(buffer.to_vec()).unwrap()
    }

    #[test]
    fn serializes_flat_records() {
        let metric = Metric::new("cpu", timestamp())
            .with_tag("host", "localhost")
            .with_field("usage_idle", 98.2);

        assert_eq!(
            serialize(SplunkSerializerConfig::default(), &metric),
            r#"{"_value":98.2,"host":"localhost","metric_name":"cpu.usage_idle","time":1609459200.0}"#
                .to_owned()
                + "\n"
        );
    }

    #[test]
    fn one_record_per_numeric_field() {
        let metric = Metric::new("cpu", timestamp())
            .with_field("usage_idle", 98.2)
            .with_field("usage_user", 1.1)
            .with_field("state", "idle");

        let output = serialize(SplunkSerializerConfig::default(), &metric);
        assert_eq!(output.lines().count(), 2);
        assert!(output.contains("cpu.usage_idle"));
        assert!(output.contains("cpu.usage_user"));
        assert!(!output.contains("state"));
    }

    #[test]
    fn hec_routing_wraps_records_in_an_envelope() {
        let metric = Metric::new("cpu", timestamp())
            .with_tag("host", "localhost")
            .with_tag("cpu", "cpu0")
            .with_field("usage_idle", 98.2);

        assert_eq!(
            serialize(SplunkSerializerConfig::new(true, false), &metric),
            r#"{"event":"metric","fields":{"_value":98.2,"cpu":"cpu0","metric_name":"cpu.usage_idle"},"host":"localhost","time":1609459200.0}"#
                .to_owned()
                + "\n"
        );
    }

    #[test]
    fn multi_metric_folds_fields_into_one_record() {
        let metric = Metric::new("cpu", timestamp())
            .with_field("usage_idle", 98.2)
            .with_field("usage_user", 1.1);

        assert_eq!(
            serialize(SplunkSerializerConfig::new(false, true), &metric),
            r#"{"metric_name:cpu.usage_idle":98.2,"metric_name:cpu.usage_user":1.1,"time":1609459200.0}"#
                .to_owned()
                + "\n"
        );
    }

    #[test]
    fn booleans_are_encoded_as_numbers() {
        let metric = Metric::new("service", timestamp()).with_field("up", true);

        assert_eq!(
            serialize(SplunkSerializerConfig::default(), &metric),
            r#"{"_value":1,"metric_name":"service.up","time":1609459200.0}"#.to_owned() + "\n"
        );
    }
}
