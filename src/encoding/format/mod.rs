//! A collection of formats that can be used to convert from metrics to
//! byte frames.

#![deny(missing_docs)]

mod graphite;
mod influx;
mod json;
mod mdm;
mod prometheus;
mod splunk;
mod wavefront;

use std::fmt::Debug;

use bytes::BytesMut;
use dyn_clone::DynClone;
pub use graphite::{GraphiteSerializer, GraphiteSerializerConfig};
pub use influx::{InfluxSerializer, InfluxSerializerConfig};
pub use json::{JsonSerializer, JsonSerializerConfig, TimestampUnits};
pub use mdm::{MdmSerializer, MdmSerializerConfig};
pub use prometheus::{PrometheusSerializer, PrometheusSerializerConfig};
pub use splunk::{SplunkSerializer, SplunkSerializerConfig};
pub use wavefront::{WavefrontSerializer, WavefrontSerializerConfig};

use crate::encoding::EncodeError;
use crate::metric::Metric;

/// Serialize metrics into byte frames.
///
/// Implementations must be reentrant but are not required to be safe for
/// concurrent invocation; callers needing concurrency should hold one
/// instance per worker.
pub trait MetricSerializer: DynClone + Debug + Send + Sync {
    /// Encode a single metric into the buffer.
    ///
    /// Line-oriented formats terminate each unit with a newline, so the
    /// concatenation of consecutive outputs can be framed by newline
    /// separation.
    fn encode(&mut self, metric: &Metric, buffer: &mut BytesMut) -> Result<(), EncodeError>;

    /// Encode an ordered batch of metrics into the buffer.
    ///
    /// This output is not required to be suitable for line-oriented
    /// framing. The default implementation concatenates single-metric
    /// encodings; formats with a distinct batch shape override it.
    fn encode_batch(&mut self, metrics: &[Metric], buffer: &mut BytesMut) -> Result<(), EncodeError> {
        for metric in metrics {
            self.encode(metric, buffer)?;
        }
        Ok(())
    }
}

dyn_clone::clone_trait_object!(MetricSerializer);

/// An opaque `MetricSerializer`, used for implementations registered from
/// outside this crate.
pub type BoxedSerializer = Box<dyn MetricSerializer>;

impl MetricSerializer for BoxedSerializer {
    fn encode(&mut self, metric: &Metric, buffer: &mut BytesMut) -> Result<(), EncodeError> {
        (**self).encode(metric, buffer)
    }

    fn encode_batch(&mut self, metrics: &[Metric], buffer: &mut BytesMut) -> Result<(), EncodeError> {
        (**self).encode_batch(metrics, buffer)
    }
}
