use bytes::BytesMut;
use chrono::{DateTime, TimeZone, Utc};
use metric_codecs::{
    build_serializer, Encoder, Metric, MetricSerializer, Serializer, SerializerConfig,
    SerializerOutput,
};

fn timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()
}

fn sample() -> Metric {
    Metric::new("cpu", timestamp())
        .with_tag("host", "localhost")
        .with_field("usage_idle", 98.2)
}

#[test]
fn recognized_formats_build_from_config_records() {
    let records = [
        "data_format = \"influx\"\nmax_line_bytes = 512",
        "data_format = \"json\"\ntimestamp_units = \"milliseconds\"",
        "data_format = \"graphite\"\nprefix = \"agent\"",
        "data_format = \"prometheus\"\nexport_timestamp = true",
        "data_format = \"splunkmetric\"\nhec_routing = true",
        "data_format = \"wavefront\"\nuse_strict = true",
        "data_format = \"mdm\"",
    ];

    for record in records {
        let config: SerializerConfig = toml::from_str(record).unwrap();
        let mut serializer = config
            .build()
            .unwrap_or_else(|error| panic!("{record}: {error}"));
        let bytes = serializer.serialize(&sample()).unwrap();
        assert!(!bytes.is_empty(), "{record} produced no output");
    }
}

#[test]
fn unknown_format_reports_the_offending_string() {
    let error = build_serializer("xml", toml::Value::Table(toml::Table::new())).unwrap_err();
    assert_eq!(error.to_string(), "Invalid data format: xml");

    let error =
        build_serializer("not-a-format", toml::Value::Table(toml::Table::new())).unwrap_err();
    assert!(error.to_string().contains("not-a-format"));
}

#[test]
fn registry_and_typed_config_build_equivalent_serializers() {
    let config: SerializerConfig = toml::from_str("data_format = \"graphite\"").unwrap();
    let mut typed = config.build().unwrap();

    let mut registered =
        build_serializer("graphite", toml::Value::Table(toml::Table::new())).unwrap();

    assert_eq!(
        typed.serialize(&sample()).unwrap(),
        registered.serialize(&sample()).unwrap()
    );
}

#[test]
fn single_and_batch_entry_points_share_one_instance() {
    let config: SerializerConfig = toml::from_str("data_format = \"mdm\"").unwrap();
    let mut serializer = config.build().unwrap();

    let single = serializer.serialize(&sample()).unwrap();
    let batch = serializer.serialize_batch(&[sample()]).unwrap();

    // mdm is line-oriented, so a one-element batch matches the single output.
    assert_eq!(single, batch);
}

#[test]
fn line_formats_concatenate_by_newline() {
    let config: SerializerConfig = toml::from_str("data_format = \"influx\"").unwrap();
    let mut serializer = config.build().unwrap();

    let first = Metric::new("a", timestamp()).with_field("value", 1_i64);
    let second = Metric::new("b", timestamp()).with_field("value", 2_i64);

    let mut concatenated = serializer.serialize(&first).unwrap().to_vec();
    concatenated.extend_from_slice(&serializer.serialize(&second).unwrap());

    let batch = serializer
        .serialize_batch(&[first, second])
        .unwrap()
        .to_vec();
    assert_eq!(batch, concatenated);
}

#[test]
fn equivalent_configs_yield_independent_serializers() {
    let config: SerializerConfig = toml::from_str("data_format = \"wavefront\"").unwrap();
    let mut first = config.build().unwrap();
    let mut second = config.build().unwrap();

    assert_eq!(
        first.serialize(&sample()).unwrap(),
        second.serialize(&sample()).unwrap()
    );
}

struct CollectingOutput {
    serializer: Option<Serializer>,
}

impl SerializerOutput for CollectingOutput {
    fn set_serializer(&mut self, serializer: Serializer) {
        self.serializer = Some(serializer);
    }
}

#[test]
fn outputs_accept_an_injected_serializer() {
    let config: SerializerConfig = toml::from_str("data_format = \"json\"").unwrap();

    let mut output = CollectingOutput { serializer: None };
    output.set_serializer(config.build().unwrap());

    let mut serializer = output.serializer.expect("serializer was installed");
    let mut buffer = BytesMut::new();
    serializer.encode(&sample(), &mut buffer).unwrap();
    assert!(buffer.ends_with(b"\n"));
}

#[test]
fn encoder_wires_like_an_output() {
    let mut encoder = Encoder::default();
    let config: SerializerConfig = toml::from_str("data_format = \"prometheus\"").unwrap();
    encoder.set_serializer(config.build().unwrap());

    let mut buffer = BytesMut::new();
    encoder.encode(&sample(), &mut buffer).unwrap();

    assert_eq!(encoder.content_type(), "text/plain; version=0.0.4");
    assert_eq!(
        String::from_utf8(buffer.to_vec()).unwrap(),
        "cpu_usage_idle{host=\"localhost\"} 98.2\n"
    );
}
