use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use snafu::ensure;

use super::MetricSerializer;
use crate::encoding::{EmptyMetricSnafu, EncodeError};
use crate::metric::{FieldValue, Metric};

/// Config used to build a `PrometheusSerializer`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PrometheusSerializerConfig {
    /// Include the metric timestamp, in milliseconds, on each sample.
    #[serde(default)]
    pub export_timestamp: bool,

    /// Sort samples lexicographically. Useful when comparing output.
    #[serde(default)]
    pub sort_metrics: bool,

    /// Expose string fields as labels on the metric's samples; when
    /// disabled string fields are discarded.
    #[serde(default)]
    pub string_as_label: bool,
}

impl PrometheusSerializerConfig {
    /// Creates a new `PrometheusSerializerConfig`.
    pub const fn new(export_timestamp: bool, sort_metrics: bool, string_as_label: bool) -> Self {
        Self {
            export_timestamp,
            sort_metrics,
            string_as_label,
        }
    }

    /// Build the `PrometheusSerializer` from this configuration.
    pub const fn build(&self) -> PrometheusSerializer {
        PrometheusSerializer {
            export_timestamp: self.export_timestamp,
            sort_metrics: self.sort_metrics,
            string_as_label: self.string_as_label,
        }
    }
}

/// Serializer that converts a metric to bytes using the Prometheus text
/// exposition format, one `name{labels} value` sample per numeric field.
#[derive(Clone, Debug)]
pub struct PrometheusSerializer {
    export_timestamp: bool,
    sort_metrics: bool,
    string_as_label: bool,
}

impl PrometheusSerializer {
    fn sample_lines(&self, metric: &Metric) -> Result<Vec<String>, EncodeError> {
        ensure!(
            !metric.fields().is_empty(),
            EmptyMetricSnafu { name: metric.name() }
        );

        let mut labels: Vec<(String, String)> = metric
            .tags()
            .iter()
            .map(|(key, value)| (sanitize_name(key), value.to_owned()))
            .collect();
        if self.string_as_label {
            for (field, value) in metric.fields() {
                if let FieldValue::String(value) = value {
                    labels.push((sanitize_name(field), value.clone()));
                }
            }
        }
        labels.sort();

        let rendered_labels = if labels.is_empty() {
            String::new()
        } else {
            let pairs: Vec<String> = labels
                .iter()
                .map(|(key, value)| format!("{key}=\"{}\"", escape_label_value(value)))
                .collect();
            format!("{{{}}}", pairs.join(","))
        };

        let mut lines = Vec::new();
        for (field, value) in metric.fields() {
            let Some(value) = format_value(value) else {
                continue;
            };
            let name = if field == "value" {
                sanitize_name(metric.name())
            } else {
                sanitize_name(&format!("{}_{}", metric.name(), field))
            };
            let mut line = format!("{name}{rendered_labels} {value}");
            if self.export_timestamp {
                line.push(' ');
                line.push_str(&metric.timestamp().timestamp_millis().to_string());
            }
            line.push('\n');
            lines.push(line);
        }

        Ok(lines)
    }

    fn write_lines(&self, mut lines: Vec<String>, buffer: &mut BytesMut) {
        if self.sort_metrics {
            lines.sort();
        }
        for line in lines {
            buffer.extend_from_slice(line.as_bytes());
        }
    }
}

impl MetricSerializer for PrometheusSerializer {
    fn encode(&mut self, metric: &Metric, buffer: &mut BytesMut) -> Result<(), EncodeError> {
        let lines = self.sample_lines(metric)?;
        self.write_lines(lines, buffer);
        Ok(())
    }

    fn encode_batch(&mut self, metrics: &[Metric], buffer: &mut BytesMut) -> Result<(), EncodeError> {
        let mut lines = Vec::new();
        for metric in metrics {
            lines.extend(self.sample_lines(metric)?);
        }
        self.write_lines(lines, buffer);
        Ok(())
    }
}

fn format_value(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Float(value) => value.is_finite().then(|| value.to_string()),
        FieldValue::Int(value) => Some(value.to_string()),
        FieldValue::UInt(value) => Some(value.to_string()),
        FieldValue::Bool(value) => Some(if *value { "1" } else { "0" }.to_owned()),
        FieldValue::String(_) => None,
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == ':' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            ch => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use indoc::indoc;

    use super::*;

    fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()
    }

    fn serialize(config: PrometheusSerializerConfig, metric: &Metric) -> String {
        let mut serializer = config.build();
        let mut buffer = BytesMut::new();
        serializer.encode(metric, &mut buffer).unwrap();
        String::from_utf8(buffer.to_vec()).unwrap()
    }

    #[test]
    fn serializes_samples_with_labels() {
        let metric = Metric::new("cpu", timestamp())
            .with_tag("host", "localhost")
            .with_field("usage_idle", 98.2);

        assert_eq!(
            serialize(PrometheusSerializerConfig::default(), &metric),
            "cpu_usage_idle{host=\"localhost\"} 98.2\n"
        );
    }

    #[test]
    fn value_field_uses_bare_measurement_name() {
        let metric = Metric::new("uptime", timestamp()).with_field("value", 3600_i64);

        assert_eq!(
            serialize(PrometheusSerializerConfig::default(), &metric),
            "uptime 3600\n"
        );
    }

    #[test]
    fn exports_timestamps_in_milliseconds() {
        let metric = Metric::new("up", timestamp()).with_field("value", 1_i64);

        let config = PrometheusSerializerConfig::new(true, false, false);
        assert_eq!(serialize(config, &metric), "up 1 1609459200000\n");
    }

    #[test]
    fn string_fields_become_labels_on_request() {
        let metric = Metric::new("disk", timestamp())
            .with_tag("host", "localhost")
            .with_field("free", 42_u64)
            .with_field("fstype", "ext4");

        assert_eq!(
            serialize(PrometheusSerializerConfig::default(), &metric),
            "disk_free{host=\"localhost\"} 42\n"
        );
        assert_eq!(
            serialize(PrometheusSerializerConfig::new(false, false, true), &metric),
            "disk_free{fstype=\"ext4\",host=\"localhost\"} 42\n"
        );
    }

    #[test]
    fn sorts_samples_on_request() {
        let metric = Metric::new("cpu", timestamp())
            .with_field("usage_user", 1.1)
            .with_field("usage_idle", 98.2);

        assert_eq!(
            serialize(PrometheusSerializerConfig::new(false, true, false), &metric),
            indoc! {"
                cpu_usage_idle 98.2
                cpu_usage_user 1.1
            "}
        );
    }

    #[test]
    fn escapes_label_values_and_sanitizes_names() {
        let metric = Metric::new("net.io", timestamp())
            .with_tag("device", "eth\"0\"")
            .with_field("bytes-sent", 10_i64);

        assert_eq!(
            serialize(PrometheusSerializerConfig::default(), &metric),
            "net_io_bytes_sent{device=\"eth\\\"0\\\"\"} 10\n"
        );
    }
}
