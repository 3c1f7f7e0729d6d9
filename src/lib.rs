//! A collection of codecs that can be used to serialize metrics into
//! arbitrary wire formats, with the format selected and configured
//! through a single tagged configuration record.
//!
//! The crate is organized around three elements: the [`metric`] data
//! model the serializers consume, the [`encoding::MetricSerializer`]
//! capability implemented by every format, and the
//! [`encoding::SerializerConfig`] record whose `data_format` tag selects
//! which implementation [`encoding::SerializerConfig::build`] constructs.
//! A string-keyed path over the same constructors is available through
//! [`encoding::build_serializer`].

#![deny(missing_docs)]

pub mod encoding;
pub mod metric;

pub use encoding::{
    build_serializer, BuildError, EncodeError, Encoder, MetricSerializer, Serializer,
    SerializerConfig, SerializerOutput,
};
pub use metric::{FieldValue, Metric, MetricTags};
