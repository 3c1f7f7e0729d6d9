use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use snafu::ensure;

use super::MetricSerializer;
use crate::encoding::{BuildError, EmptyMetricSnafu, EncodeError, InvalidTemplateSnafu};
use crate::metric::{FieldValue, Metric};

/// Characters replaced by `_` in bucket segments.
const SANITIZED: &[char] = &[' ', '/', '(', ')', '*', '?', ',', ';', '=', '"', '\''];

fn default_template() -> String {
    "host.tags.measurement.field".to_owned()
}

/// Config used to build a `GraphiteSerializer`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GraphiteSerializerConfig {
    /// Prefix added to all bucket names.
    #[serde(default)]
    pub prefix: String,

    /// Template describing how a metric maps to a bucket name.
    ///
    /// The template is a `.`-separated list of parts: `measurement` and
    /// `field` insert those metric components, `tags` inserts the values
    /// of all tags not consumed elsewhere (ordered by tag key), and any
    /// other part names a tag whose value is inserted. Ignored when
    /// `tag_support` is enabled.
    #[serde(default = "default_template")]
    pub template: String,

    /// Use the graphite tag format (`name;tag=value`) instead of
    /// expanding tags into the bucket name.
    #[serde(default)]
    pub tag_support: bool,
}

impl Default for GraphiteSerializerConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            template: default_template(),
            tag_support: false,
        }
    }
}

impl GraphiteSerializerConfig {
    /// Creates a new `GraphiteSerializerConfig`.
    pub const fn new(prefix: String, template: String, tag_support: bool) -> Self {
        Self {
            prefix,
            template,
            tag_support,
        }
    }

    /// Build the `GraphiteSerializer` from this configuration.
    ///
    /// Fails if the template does not contain a `measurement` part.
    pub fn build(&self) -> Result<GraphiteSerializer, BuildError> {
        let parts: Vec<TemplatePart> = self
            .template
            .split('.')
            .filter(|part| !part.is_empty())
            .map(TemplatePart::parse)
            .collect();
        ensure!(
            parts.iter().any(|part| matches!(part, TemplatePart::Measurement)),
            InvalidTemplateSnafu {
                template: self.template.clone(),
            }
        );

        Ok(GraphiteSerializer {
            prefix: self.prefix.clone(),
            parts,
            tag_support: self.tag_support,
        })
    }
}

#[derive(Clone, Debug)]
enum TemplatePart {
    Measurement,
    Tags,
    Field,
    Tag(String),
}

impl TemplatePart {
    fn parse(part: &str) -> Self {
        match part {
            "measurement" => TemplatePart::Measurement,
            "tags" => TemplatePart::Tags,
            "field" => TemplatePart::Field,
            tag => TemplatePart::Tag(tag.to_owned()),
        }
    }
}

/// Serializer that converts a metric to bytes using the Graphite
/// plaintext protocol, one `bucket value timestamp` line per numeric
/// field.
#[derive(Clone, Debug)]
pub struct GraphiteSerializer {
    prefix: String,
    parts: Vec<TemplatePart>,
    tag_support: bool,
}

impl GraphiteSerializer {
    fn bucket(&self, metric: &Metric, field: &str) -> String {
        let mut segments = Vec::new();
        if !self.prefix.is_empty() {
            segments.push(sanitize(&self.prefix));
        }

        if self.tag_support {
            segments.push(sanitize(metric.name()));
            if field != "value" {
                segments.push(sanitize(field));
            }
            let mut bucket = segments.join(".");
            for (key, value) in metric.tags().iter_sorted() {
                bucket.push(';');
                bucket.push_str(&sanitize(key));
                bucket.push('=');
                bucket.push_str(&sanitize(value));
            }
            return bucket;
        }

        let consumed: Vec<&str> = self
            .parts
            .iter()
            .filter_map(|part| match part {
                TemplatePart::Tag(tag) => Some(tag.as_str()),
                _ => None,
            })
            .collect();

        for part in &self.parts {
            match part {
                TemplatePart::Measurement => segments.push(sanitize(metric.name())),
                TemplatePart::Field => {
                    if field != "value" {
                        segments.push(sanitize(field));
                    }
                }
                TemplatePart::Tag(tag) => {
                    if let Some(value) = metric.tags().get(tag) {
                        segments.push(sanitize(value));
                    }
                }
                TemplatePart::Tags => {
                    for (key, value) in metric.tags().iter_sorted() {
                        if !consumed.contains(&key) {
                            segments.push(sanitize(value));
                        }
                    }
                }
            }
        }

        segments.join(".")
    }
}

impl MetricSerializer for GraphiteSerializer {
    fn encode(&mut self, metric: &Metric, buffer: &mut BytesMut) -> Result<(), EncodeError> {
        ensure!(
            !metric.fields().is_empty(),
            EmptyMetricSnafu { name: metric.name() }
        );

        let timestamp = metric.timestamp().timestamp();
        for (field, value) in metric.fields() {
            let Some(value) = format_value(value) else {
                continue;
            };
            let line = format!("{} {} {}\n", self.bucket(metric, field), value, timestamp);
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

fn sanitize(segment: &str) -> String {
    segment
        .chars()
        .map(|ch| if SANITIZED.contains(&ch) { '_' } else { ch })
        .collect()
}
