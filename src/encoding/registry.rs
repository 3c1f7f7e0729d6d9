//! The registry of serializer formats.
//!
//! The set of formats is closed by default: every format known to this
//! crate submits a `FormatDescription` at process initialization, and
//! nothing is loaded data-driven at runtime. Downstream crates can extend
//! the set by submitting their own descriptions with `inventory::submit!`.

use snafu::ResultExt;

use crate::encoding::{
    BuildError, GraphiteSerializerConfig, InfluxSerializerConfig, InvalidOptionsSnafu,
    JsonSerializerConfig, MdmSerializerConfig, PrometheusSerializerConfig, Serializer,
    SplunkSerializerConfig, UnknownFormatSnafu, WavefrontSerializerConfig,
};

/// Describes a serializer format known to the registry.
pub struct FormatDescription {
    name: &'static str,
    build: fn(toml::Value) -> Result<Serializer, BuildError>,
}

impl FormatDescription {
    /// Creates a new `FormatDescription` from a format identifier and the
    /// constructor invoked for it.
    pub const fn new(
        name: &'static str,
        build: fn(toml::Value) -> Result<Serializer, BuildError>,
    ) -> Self {
        Self { name, build }
    }

    /// The format identifier.
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

inventory::collect!(FormatDescription);

/// Build the `Serializer` for the named format, forwarding the raw
/// options to that format's constructor.
///
/// The format identifier is compared exactly. An unrecognized identifier
/// produces `BuildError::UnknownFormat`; constructor failures are
/// propagated unchanged.
pub fn build_serializer(format: &str, options: toml::Value) -> Result<Serializer, BuildError> {
    let description = inventory::iter::<FormatDescription>
        .into_iter()
        .find(|description| description.name == format)
        .ok_or_else(|| UnknownFormatSnafu { format }.build())?;
    (description.build)(options)
}

/// The identifiers of all registered formats, sorted.
pub fn format_names() -> Vec<&'static str> {
    let mut names: Vec<_> = inventory::iter::<FormatDescription>
        .into_iter()
        .map(FormatDescription::name)
        .collect();
    names.sort_unstable();
    names
}

fn build_influx(options: toml::Value) -> Result<Serializer, BuildError> {
    let config: InfluxSerializerConfig = options
        .try_into()
        .context(InvalidOptionsSnafu { format: "influx" })?;
    Ok(config.build().into())
}

fn build_json(options: toml::Value) -> Result<Serializer, BuildError> {
    let config: JsonSerializerConfig = options
        .try_into()
        .context(InvalidOptionsSnafu { format: "json" })?;
    Ok(config.build().into())
}

fn build_graphite(options: toml::Value) -> Result<Serializer, BuildError> {
    let config: GraphiteSerializerConfig = options
        .try_into()
        .context(InvalidOptionsSnafu { format: "graphite" })?;
    Ok(config.build()?.into())
}

fn build_prometheus(options: toml::Value) -> Result<Serializer, BuildError> {
    let config: PrometheusSerializerConfig = options
        .try_into()
        .context(InvalidOptionsSnafu { format: "prometheus" })?;
    Ok(config.build().into())
}

fn build_splunk(options: toml::Value) -> Result<Serializer, BuildError> {
    let config: SplunkSerializerConfig = options
        .try_into()
        .context(InvalidOptionsSnafu { format: "splunkmetric" })?;
    Ok(config.build().into())
}

fn build_wavefront(options: toml::Value) -> Result<Serializer, BuildError> {
    let config: WavefrontSerializerConfig = options
        .try_into()
        .context(InvalidOptionsSnafu { format: "wavefront" })?;
    Ok(config.build().into())
}

fn build_mdm(_options: toml::Value) -> Result<Serializer, BuildError> {
    Ok(MdmSerializerConfig.build().into())
}

inventory::submit! { FormatDescription::new("influx", build_influx) }
inventory::submit! { FormatDescription::new("json", build_json) }
inventory::submit! { FormatDescription::new("graphite", build_graphite) }
inventory::submit! { FormatDescription::new("prometheus", build_prometheus) }
inventory::submit! { FormatDescription::new("splunkmetric", build_splunk) }
inventory::submit! { FormatDescription::new("wavefront", build_wavefront) }
inventory::submit! { FormatDescription::new("mdm", build_mdm) }

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    use super::*;
    use crate::encoding::MetricSerializer;
    use crate::metric::Metric;

    fn empty_options() -> toml::Value {
        toml::Value::Table(toml::Table::new())
    }

    #[rstest]
    #[case("influx")]
    #[case("json")]
    #[case("graphite")]
    #[case("prometheus")]
    #[case("splunkmetric")]
    #[case("wavefront")]
    #[case("mdm")]
    fn builds_every_registered_format(#[case] format: &'static str) {
        assert!(format_names().contains(&format));
        build_serializer(format, empty_options())
            .unwrap_or_else(|error| panic!("{format}: {error}"));
    }

    #[rstest]
    #[case("xml")]
    #[case("not-a-format")]
    fn unknown_format_is_a_descriptive_error(#[case] format: &str) {
        let error = build_serializer(format, empty_options()).unwrap_err();
        assert_eq!(error.to_string(), format!("Invalid data format: {format}"));
    }

    #[test]
    fn options_are_forwarded_to_the_constructor() {
        let options = toml::Value::Table(toml::toml! { template = "host.tags.field" });
        let error = build_serializer("graphite", options).unwrap_err();
        assert!(matches!(error, BuildError::InvalidTemplate { .. }));
    }

    #[test]
    fn malformed_options_are_rejected() {
        let options = toml::Value::Table(toml::toml! { max_line_bytes = "not-a-number" });
        let error = build_serializer("influx", options).unwrap_err();
        assert!(matches!(
            error,
            BuildError::InvalidOptions { format: "influx", .. }
        ));
    }

    #[derive(Clone, Debug)]
    struct NullSerializer;

    impl MetricSerializer for NullSerializer {
        fn encode(&mut self, _: &Metric, _: &mut BytesMut) -> Result<(), crate::encoding::EncodeError> {
            Ok(())
        }
    }

    fn build_null(_options: toml::Value) -> Result<Serializer, BuildError> {
        Ok(Serializer::Boxed(Box::new(NullSerializer)))
    }

    inventory::submit! { FormatDescription::new("null", build_null) }

    #[test]
    fn external_formats_can_be_registered() {
        let mut serializer = build_serializer("null", empty_options()).unwrap();
        let metric = Metric::new("cpu", Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap())
            .with_field("value", 1_i64);
        assert!(serializer.serialize(&metric).unwrap().is_empty());
    }
}
