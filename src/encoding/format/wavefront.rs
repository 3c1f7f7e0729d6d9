use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use snafu::ensure;

use super::MetricSerializer;
use crate::encoding::{EmptyMetricSnafu, EncodeError};
use crate::metric::{FieldValue, Metric};

/// Config used to build a `WavefrontSerializer`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct WavefrontSerializerConfig {
    /// Tags to use as the point source, in order of preference. The
    /// `host` tag is used when none of these is present.
    #[serde(default)]
    pub source_override: Vec<String>,

    /// Accept `/` and `,` in metric and tag names instead of replacing
    /// them.
    #[serde(default)]
    pub use_strict: bool,
}

impl WavefrontSerializerConfig {
    /// Creates a new `WavefrontSerializerConfig`.
    pub const fn new(source_override: Vec<String>, use_strict: bool) -> Self {
        Self {
            source_override,
            use_strict,
        }
    }

    /// Build the `WavefrontSerializer` from this configuration.
    pub fn build(&self) -> WavefrontSerializer {
        WavefrontSerializer {
            source_override: self.source_override.clone(),
            use_strict: self.use_strict,
        }
    }
}

/// Serializer that converts a metric to bytes using the Wavefront data
/// format, one `"name" value timestamp source="..." tags` line per
/// numeric field.
#[derive(Clone, Debug)]
pub struct WavefrontSerializer {
    source_override: Vec<String>,
    use_strict: bool,
}

impl WavefrontSerializer {
    fn sanitize(&self, name: &str) -> String {
        name.chars()
            .map(|ch| {
                let kept = ch.is_ascii_alphanumeric()
                    || matches!(ch, '.' | '_' | '-')
                    || (self.use_strict && matches!(ch, '/' | ','));
                if kept {
                    ch
                } else {
                    '-'
                }
            })
            .collect()
    }

    /// Resolve the point source and the tags left to emit alongside it.
    fn resolve_source(&self, metric: &Metric) -> (String, Vec<(String, String)>) {
        let mut tags: Vec<(String, String)> = metric
            .tags()
            .iter_sorted()
            .map(|(key, value)| (key.to_owned(), value.to_owned()))
            .collect();

        let mut source = None;
        for key in &self.source_override {
            if let Some(index) = tags.iter().position(|(tag, _)| tag == key) {
                source = Some(tags.remove(index).1);
                // An overriding tag shadows the host tag.
                if let Some(host) = tags.iter_mut().find(|(tag, _)| tag == "host") {
                    host.0 = "_host".to_owned();
                }
                break;
            }
        }
        let source = source.or_else(|| {
            tags.iter()
                .position(|(tag, _)| tag == "host")
                .map(|index| tags.remove(index).1)
        });

        tags.sort();
        (source.unwrap_or_else(|| "unknown".to_owned()), tags)
    }
}

impl MetricSerializer for WavefrontSerializer {
    fn encode(&mut self, metric: &Metric, buffer: &mut BytesMut) -> Result<(), EncodeError> {
        ensure!(
            !metric.fields().is_empty(),
            EmptyMetricSnafu { name: metric.name() }
        );

        let (source, tags) = self.resolve_source(metric);
        let timestamp = metric.timestamp().timestamp();

        for (field, value) in metric.fields() {
            let Some(value) = format_value(value) else {
                continue;
            };
            let name = if field == "value" {
                self.sanitize(metric.name())
            } else {
                self.sanitize(&format!("{}.{}", metric.name(), field))
            };

            let mut line = format!(
                "\"{name}\" {value} {timestamp} source=\"{}\"",
                escape_quotes(&source)
            );
            for (key, value) in &tags {
                line.push_str(&format!(
                    " \"{}\"=\"{}\"",
                    self.sanitize(key),
                    escape_quotes(value)
                ));
            }
            line.push('\n');
            buffer.extend_from_slice(line.as_bytes());
        }

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

fn escape_quotes(value: &str) -> String {
    value.replace('"', "\\\"")
}
