//! A collection of serializers that can be used to transform metrics into
//! byte buffers, selected and configured through a single tagged
//! configuration record.

mod encoder;
mod format;
mod registry;

pub use encoder::{Encoder, SerializerOutput};
pub use format::{
    BoxedSerializer, GraphiteSerializer, GraphiteSerializerConfig, InfluxSerializer,
    InfluxSerializerConfig, JsonSerializer, JsonSerializerConfig, MdmSerializer,
    MdmSerializerConfig, MetricSerializer, PrometheusSerializer, PrometheusSerializerConfig,
    SplunkSerializer, SplunkSerializerConfig, TimestampUnits, WavefrontSerializer,
    WavefrontSerializerConfig,
};
pub use registry::{build_serializer, format_names, FormatDescription};

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use snafu::Snafu;

use crate::metric::Metric;

/// An error that occurred while building a serializer from configuration.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BuildError {
    /// The requested data format is not a recognized serializer.
    #[snafu(display("Invalid data format: {format}"))]
    UnknownFormat {
        /// The offending format identifier.
        format: String,
    },

    /// The format was recognized but its options did not deserialize.
    #[snafu(display("invalid {format} serializer options: {source}"))]
    InvalidOptions {
        /// The format whose options were rejected.
        format: &'static str,
        /// The underlying deserialization error.
        source: toml::de::Error,
    },

    /// A graphite template without a `measurement` part cannot produce
    /// distinct buckets.
    #[snafu(display("invalid graphite template `{template}`: missing a `measurement` part"))]
    InvalidTemplate {
        /// The rejected template.
        template: String,
    },
}

/// An error that occurred while serializing a metric into bytes.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EncodeError {
    /// The metric carried no serializable fields.
    #[snafu(display("metric `{name}` has no serializable fields"))]
    EmptyMetric {
        /// The measurement name of the offending metric.
        name: String,
    },

    /// A serialized line exceeded the configured length limit.
    #[snafu(display("serialized line of {line} bytes exceeds the limit of {limit} bytes"))]
    LineTooLong {
        /// The length of the offending line in bytes.
        line: usize,
        /// The configured limit in bytes.
        limit: usize,
    },

    /// The metric could not be encoded as JSON.
    #[snafu(display("failed to encode metric as JSON: {source}"))]
    Json {
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// An I/O error occurred while writing the encoded bytes.
    ///
    /// Present to satisfy the `tokio_util::codec::Encoder::Error:
    /// From<io::Error>` bound; the in-memory `BytesMut` sink never
    /// produces one in practice.
    #[snafu(display("I/O error while encoding metric: {source}"))]
    Io {
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

impl From<std::io::Error> for EncodeError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source }
    }
}

/// Serializer configuration.
///
/// The `data_format` tag selects the implementation; the remaining fields
/// of the record are the options of that implementation alone.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "data_format", rename_all = "snake_case")]
pub enum SerializerConfig {
    /// Encodes a metric in the [InfluxDB line protocol][line_protocol].
    ///
    /// [line_protocol]: https://docs.influxdata.com/influxdb/latest/reference/syntax/line-protocol/
    Influx(InfluxSerializerConfig),

    /// Encodes a metric as a [JSON][json] object.
    ///
    /// [json]: https://www.json.org/
    Json(JsonSerializerConfig),

    /// Encodes a metric in the [Graphite plaintext protocol][graphite].
    ///
    /// [graphite]: https://graphite.readthedocs.io/en/latest/feeding-carbon.html
    Graphite(GraphiteSerializerConfig),

    /// Encodes a metric in the [Prometheus text exposition format][prometheus].
    ///
    /// [prometheus]: https://prometheus.io/docs/instrumenting/exposition_formats/
    Prometheus(PrometheusSerializerConfig),

    /// Encodes a metric as [Splunk HEC metric][hec] JSON objects.
    ///
    /// [hec]: https://docs.splunk.com/Documentation/Splunk/latest/Metrics/GetMetricsInOther
    #[serde(rename = "splunkmetric")]
    Splunk(SplunkSerializerConfig),

    /// Encodes a metric in the [Wavefront data format][wavefront].
    ///
    /// [wavefront]: https://docs.wavefront.com/wavefront_data_format.html
    Wavefront(WavefrontSerializerConfig),

    /// Encodes a metric as newline-delimited dimensional JSON records.
    Mdm,
}

impl From<InfluxSerializerConfig> for SerializerConfig {
    fn from(config: InfluxSerializerConfig) -> Self {
        Self::Influx(config)
    }
}

impl From<JsonSerializerConfig> for SerializerConfig {
    fn from(config: JsonSerializerConfig) -> Self {
        Self::Json(config)
    }
}

impl From<GraphiteSerializerConfig> for SerializerConfig {
    fn from(config: GraphiteSerializerConfig) -> Self {
        Self::Graphite(config)
    }
}

impl From<PrometheusSerializerConfig> for SerializerConfig {
    fn from(config: PrometheusSerializerConfig) -> Self {
        Self::Prometheus(config)
    }
}

impl From<SplunkSerializerConfig> for SerializerConfig {
    fn from(config: SplunkSerializerConfig) -> Self {
        Self::Splunk(config)
    }
}

impl From<WavefrontSerializerConfig> for SerializerConfig {
    fn from(config: WavefrontSerializerConfig) -> Self {
        Self::Wavefront(config)
    }
}

impl From<MdmSerializerConfig> for SerializerConfig {
    fn from(_: MdmSerializerConfig) -> Self {
        Self::Mdm
    }
}

impl SerializerConfig {
    /// Build the `Serializer` from this configuration.
    pub fn build(&self) -> Result<Serializer, BuildError> {
        match self {
            SerializerConfig::Influx(config) => Ok(Serializer::Influx(config.build())),
            SerializerConfig::Json(config) => Ok(Serializer::Json(config.build())),
            SerializerConfig::Graphite(config) => Ok(Serializer::Graphite(config.build()?)),
            SerializerConfig::Prometheus(config) => Ok(Serializer::Prometheus(config.build())),
            SerializerConfig::Splunk(config) => Ok(Serializer::Splunk(config.build())),
            SerializerConfig::Wavefront(config) => Ok(Serializer::Wavefront(config.build())),
            SerializerConfig::Mdm => Ok(Serializer::Mdm(MdmSerializerConfig.build())),
        }
    }

    /// The format identifier this configuration selects.
    pub const fn data_format(&self) -> &'static str {
        match self {
            SerializerConfig::Influx(_) => "influx",
            SerializerConfig::Json(_) => "json",
            SerializerConfig::Graphite(_) => "graphite",
            SerializerConfig::Prometheus(_) => "prometheus",
            SerializerConfig::Splunk(_) => "splunkmetric",
            SerializerConfig::Wavefront(_) => "wavefront",
            SerializerConfig::Mdm => "mdm",
        }
    }
}

/// Serialize metrics as bytes.
#[derive(Clone, Debug)]
pub enum Serializer {
    /// Uses an `InfluxSerializer` for serialization.
    Influx(InfluxSerializer),
    /// Uses a `JsonSerializer` for serialization.
    Json(JsonSerializer),
    /// Uses a `GraphiteSerializer` for serialization.
    Graphite(GraphiteSerializer),
    /// Uses a `PrometheusSerializer` for serialization.
    Prometheus(PrometheusSerializer),
    /// Uses a `SplunkSerializer` for serialization.
    Splunk(SplunkSerializer),
    /// Uses a `WavefrontSerializer` for serialization.
    Wavefront(WavefrontSerializer),
    /// Uses an `MdmSerializer` for serialization.
    Mdm(MdmSerializer),
    /// Uses an opaque `MetricSerializer` implementation for serialization.
    Boxed(BoxedSerializer),
}

impl Serializer {
    /// Encode a single metric, returning the produced bytes.
    ///
    /// On error, no partial output is returned.
    pub fn serialize(&mut self, metric: &Metric) -> Result<Bytes, EncodeError> {
        let mut buffer = BytesMut::new();
        MetricSerializer::encode(self, metric, &mut buffer)?;
        Ok(buffer.freeze())
    }

    /// Encode an ordered batch of metrics as one buffer.
    ///
    /// On error, no partial output is returned.
    pub fn serialize_batch(&mut self, metrics: &[Metric]) -> Result<Bytes, EncodeError> {
        let mut buffer = BytesMut::new();
        MetricSerializer::encode_batch(self, metrics, &mut buffer)?;
        Ok(buffer.freeze())
    }

    /// Get the HTTP content type of the payloads this serializer produces.
    pub const fn content_type(&self) -> &'static str {
        match self {
            Serializer::Json(_) | Serializer::Splunk(_) | Serializer::Mdm(_) => "application/json",
            Serializer::Prometheus(_) => "text/plain; version=0.0.4",
            Serializer::Influx(_) | Serializer::Graphite(_) | Serializer::Wavefront(_) => {
                "text/plain"
            }
            Serializer::Boxed(_) => "application/octet-stream",
        }
    }
}

impl MetricSerializer for Serializer {
    fn encode(&mut self, metric: &Metric, buffer: &mut BytesMut) -> Result<(), EncodeError> {
        match self {
            Serializer::Influx(serializer) => serializer.encode(metric, buffer),
            Serializer::Json(serializer) => serializer.encode(metric, buffer),
            Serializer::Graphite(serializer) => serializer.encode(metric, buffer),
            Serializer::Prometheus(serializer) => serializer.encode(metric, buffer),
            Serializer::Splunk(serializer) => serializer.encode(metric, buffer),
            Serializer::Wavefront(serializer) => serializer.encode(metric, buffer),
            Serializer::Mdm(serializer) => serializer.encode(metric, buffer),
            Serializer::Boxed(serializer) => serializer.encode(metric, buffer),
        }
    }

    fn encode_batch(&mut self, metrics: &[Metric], buffer: &mut BytesMut) -> Result<(), EncodeError> {
        match self {
            Serializer::Influx(serializer) => serializer.encode_batch(metrics, buffer),
            Serializer::Json(serializer) => serializer.encode_batch(metrics, buffer),
            Serializer::Graphite(serializer) => serializer.encode_batch(metrics, buffer),
            Serializer::Prometheus(serializer) => serializer.encode_batch(metrics, buffer),
            Serializer::Splunk(serializer) => serializer.encode_batch(metrics, buffer),
            Serializer::Wavefront(serializer) => serializer.encode_batch(metrics, buffer),
            Serializer::Mdm(serializer) => serializer.encode_batch(metrics, buffer),
            Serializer::Boxed(serializer) => serializer.encode_batch(metrics, buffer),
        }
    }
}

impl From<InfluxSerializer> for Serializer {
    fn from(serializer: InfluxSerializer) -> Self {
        Self::Influx(serializer)
    }
}

impl From<JsonSerializer> for Serializer {
    fn from(serializer: JsonSerializer) -> Self {
        Self::Json(serializer)
    }
}

impl From<GraphiteSerializer> for Serializer {
    fn from(serializer: GraphiteSerializer) -> Self {
        Self::Graphite(serializer)
    }
}

impl From<PrometheusSerializer> for Serializer {
    fn from(serializer: PrometheusSerializer) -> Self {
        Self::Prometheus(serializer)
    }
}

impl From<SplunkSerializer> for Serializer {
    fn from(serializer: SplunkSerializer) -> Self {
        Self::Splunk(serializer)
    }
}

impl From<WavefrontSerializer> for Serializer {
    fn from(serializer: WavefrontSerializer) -> Self {
        Self::Wavefront(serializer)
    }
}

impl From<MdmSerializer> for Serializer {
    fn from(serializer: MdmSerializer) -> Self {
        Self::Mdm(serializer)
    }
}

impl From<BoxedSerializer> for Serializer {
    fn from(serializer: BoxedSerializer) -> Self {
        Self::Boxed(serializer)
    }
}

impl tokio_util::codec::Encoder<Metric> for Serializer {
    type Error = EncodeError;

    fn encode(&mut self, metric: Metric, buffer: &mut BytesMut) -> Result<(), Self::Error> {
        MetricSerializer::encode(self, &metric, buffer)
    }
}
