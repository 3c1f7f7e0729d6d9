use bytes::{BufMut, BytesMut};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::json;
use snafu::{ensure, ResultExt};

use super::MetricSerializer;
use crate::encoding::{EmptyMetricSnafu, EncodeError, JsonSnafu};
use crate::metric::{FieldValue, Metric};

/// Config used to build an `MdmSerializer`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct MdmSerializerConfig;

impl MdmSerializerConfig {
    /// Creates a new `MdmSerializerConfig`.
    pub const fn new() -> Self {
        Self
    }

    /// Build the `MdmSerializer` from this configuration.
    pub const fn build(&self) -> MdmSerializer {
        MdmSerializer
    }
}

/// Serializer that converts a metric to newline-delimited dimensional
/// JSON records, one per numeric field:
///
/// ```text
/// {"Dims":{...},"Metric":"measurement.field","TS":"...","Value":N}
/// ```
#[derive(Clone, Debug)]
pub struct MdmSerializer;

impl MetricSerializer for MdmSerializer {
    fn encode(&mut self, metric: &Metric, buffer: &mut BytesMut) -> Result<(), EncodeError> {
        ensure!(
            !metric.fields().is_empty(),
            EmptyMetricSnafu { name: metric.name() }
        );

        let timestamp = metric
            .timestamp()
            .to_rfc3339_opts(SecondsFormat::Millis, true);

        for (field, value) in metric.fields() {
            let Some(value) = numeric_value(value) else {
                continue;
            };
            let record = json!({
                "Dims": metric.tags(),
                "Metric": format!("{}.{}", metric.name(), field),
                "TS": timestamp,
                "Value": value,
            });
            serde_json::to_writer(buffer.writer(), &record).context(JsonSnafu)?;
            buffer.put_u8(b'\n');
        }

        Ok(())
    }
}

fn numeric_value(value: &FieldValue) -> Option<serde_json::Value> {
    match value {
        FieldValue::Float(value) => serde_json::Number::from_f64(*value).map(Into::into),
        FieldValue::Int(value) => Some((*value).into()),
        FieldValue::UInt(value) => Some((*value).into()),
        FieldValue::Bool(value) => Some(u8::from(*value).into()),
        FieldValue::String(_) => None,
    }
}
