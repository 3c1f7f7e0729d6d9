use bytes::BytesMut;
use tracing::error;

use crate::encoding::{EncodeError, InfluxSerializerConfig, MetricSerializer, Serializer};
use crate::metric::Metric;

/// An output sink that is able to serialize metrics into arbitrary data
/// formats.
pub trait SerializerOutput {
    /// Sets the serializer used by this output.
    fn set_serializer(&mut self, serializer: Serializer);
}

/// An encoder that can encode metrics into byte payloads.
#[derive(Clone, Debug)]
pub struct Encoder {
    serializer: Serializer,
}

impl Default for Encoder {
    fn default() -> Self {
        Self {
            serializer: InfluxSerializerConfig::default().build().into(),
        }
    }
}

impl Encoder {
    /// Creates a new `Encoder` with the specified `Serializer` to produce
    /// bytes from metrics.
    pub const fn new(serializer: Serializer) -> Self {
        Self { serializer }
    }

    /// Get the serializer.
    pub const fn serializer(&self) -> &Serializer {
        &self.serializer
    }

    /// Get the HTTP content type.
    pub const fn content_type(&self) -> &'static str {
        self.serializer.content_type()
    }

    /// Serialize the metric into the buffer.
    ///
    /// On error the buffer is left unchanged.
    pub fn encode(&mut self, metric: &Metric, buffer: &mut BytesMut) -> Result<(), EncodeError> {
        let len = buffer.len();
        let mut payload = buffer.split_off(len);

        MetricSerializer::encode(&mut self.serializer, metric, &mut payload).map_err(|error| {
            error!("Failed to serialize metric: {}", error);
            error
        })?;

        buffer.unsplit(payload);

        Ok(())
    }

    /// Serialize the batch of metrics into the buffer.
    ///
    /// On error the buffer is left unchanged.
    pub fn encode_batch(
        &mut self,
        metrics: &[Metric],
        buffer: &mut BytesMut,
    ) -> Result<(), EncodeError> {
        let len = buffer.len();
        let mut payload = buffer.split_off(len);

        MetricSerializer::encode_batch(&mut self.serializer, metrics, &mut payload).map_err(
            |error| {
                error!("Failed to serialize metric batch: {}", error);
                error
            },
        )?;

        buffer.unsplit(payload);

        Ok(())
    }
}

impl SerializerOutput for Encoder {
    fn set_serializer(&mut self, serializer: Serializer) {
        self.serializer = serializer;
    }
}

impl tokio_util::codec::Encoder<Metric> for Encoder {
    type Error = EncodeError;

    fn encode(&mut self, metric: Metric, buffer: &mut BytesMut) -> Result<(), Self::Error> {
        Encoder::encode(self, &metric, buffer)
    }
}
