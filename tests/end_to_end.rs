//! End-to-end scenarios and boundary cases for the token-writer API,
//! plus quickcheck-driven universal invariants.

use quickcheck_macros::quickcheck;
use rstest::rstest;
use streamjson::sink::{FixedSpanSink, GrowableBuffer};
use streamjson::{JsonWriteError, Writer, WriterOptions};

fn written(w: Writer<GrowableBuffer>) -> String {
    String::from_utf8(w.into_inner().into_vec()).unwrap()
}

#[test]
fn scenario_empty_object() {
    let mut w = Writer::new(GrowableBuffer::new());
    w.start_object().unwrap();
    w.end_object().unwrap();
    assert_eq!(written(w), "{}");
}

#[test]
fn scenario_one_property_not_indented() {
    let mut w = Writer::new(GrowableBuffer::new());
    w.start_object().unwrap();
    w.property_name(b"a", false).unwrap();
    w.number_value_i64(1).unwrap();
    w.end_object().unwrap();
    assert_eq!(written(w), r#"{"a":1}"#);
}

#[test]
fn scenario_one_property_indented_width_2() {
    let opts = WriterOptions::new().indented(true).indent_width(2);
    let mut w = Writer::with_options(GrowableBuffer::new(), opts);
    w.start_object().unwrap();
    w.property_name(b"a", false).unwrap();
    w.number_value_i64(1).unwrap();
    w.end_object().unwrap();
    assert_eq!(written(w), "{\n  \"a\": 1\n}");
}

#[test]
fn scenario_non_ascii_property_pi() {
    let mut w = Writer::new(GrowableBuffer::new());
    w.start_object().unwrap();
    w.property_name("π".as_bytes(), false).unwrap();
    assert_eq!(written(w), "{\"\\u03c0\":");
}

#[test]
fn scenario_nested_array_of_object_and_null() {
    let mut w = Writer::new(GrowableBuffer::new());
    w.start_array().unwrap();
    w.start_object().unwrap();
    w.property_name(b"x", false).unwrap();
    w.bool_value(true).unwrap();
    w.end_object().unwrap();
    w.null_value().unwrap();
    w.end_array().unwrap();
    assert_eq!(written(w), r#"[{"x":true},null]"#);
}

// --- Boundary cases --------------------------------------------------

#[test]
fn exactly_max_depth_nesting_succeeds_one_deeper_fails() {
    let opts = WriterOptions::new().max_depth(5);
    let mut w = Writer::with_options(GrowableBuffer::new(), opts);
    for _ in 0..5 {
        w.start_array().unwrap();
    }
    assert_eq!(
        w.start_array().unwrap_err(),
        JsonWriteError::DepthLimitExceeded { max_depth: 5 }
    );
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(255)]
#[case(256)]
#[case(257)]
fn property_name_lengths_around_stackalloc_threshold(#[case] len: usize) {
    let name: Vec<u8> = (0..len).map(|i| b'a' + (i % 26) as u8).collect();
    let mut w = Writer::new(GrowableBuffer::new());
    w.start_object().unwrap();
    w.property_name(&name, false).unwrap();
    let out = w.into_inner().into_vec();
    // `{"<name>":`
    assert_eq!(out[1], b'"');
    assert_eq!(out[out.len() - 2], b'"');
    assert_eq!(&out[2..out.len() - 2], name.as_slice());
}

#[test]
fn escape_expansion_exactly_fills_worst_case_bound() {
    // Every code unit classified, so the escaped form is exactly 6x input.
    let name: Vec<u8> = vec![0x00; 10];
    let mut w = Writer::new(GrowableBuffer::new());
    w.string_value(&name, false).unwrap();
    let out = w.into_inner().into_vec();
    // 10 * "\u0000" (6 bytes each) plus 2 quotes.
    assert_eq!(out.len(), 10 * 6 + 2);
}

#[rstest]
#[case(0.0_f64)]
#[case(-0.0_f64)]
#[case(f64::MIN_POSITIVE)]
fn f64_edge_values_are_accepted(#[case] value: f64) {
    let mut w = Writer::new(GrowableBuffer::new());
    assert!(w.number_value_f64(value).is_ok());
}

#[test]
fn f64_nan_and_infinities_are_rejected() {
    for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let mut w = Writer::new(GrowableBuffer::new());
        assert_eq!(
            w.number_value_f64(value).unwrap_err(),
            JsonWriteError::InvalidFloatValue
        );
    }
}

#[test]
fn utf8_overlong_three_byte_sequence_is_rejected() {
    let mut w = Writer::new(GrowableBuffer::new());
    let err = w.string_value(&[0xE0, 0x80, 0x80], false).unwrap_err();
    assert!(matches!(err, JsonWriteError::InvalidUtf8 { .. }));
}

#[test]
fn utf8_truncated_sequence_is_rejected() {
    let mut w = Writer::new(GrowableBuffer::new());
    let err = w.string_value(&[0xE2, 0x82], false).unwrap_err();
    assert!(matches!(err, JsonWriteError::InvalidUtf8 { .. }));
}

#[test]
fn utf16_lone_high_surrogate_is_rejected() {
    let mut w = Writer::new(GrowableBuffer::new());
    let err = w.string_value_u16(&[0xD800], false).unwrap_err();
    assert_eq!(err, JsonWriteError::InvalidUtf16 { offset: 0 });
}

#[test]
fn fixed_span_sink_reports_out_of_space_and_writer_remains_usable() {
    let mut span = [0u8; 4];
    let mut w = Writer::new(FixedSpanSink::new(&mut span));
    let before = w.bytes_committed();
    assert!(w.start_object().is_ok());
    let err = w.property_name(b"too long for the span", false).unwrap_err();
    assert!(matches!(
        err,
        JsonWriteError::OutOfSpace { .. } | JsonWriteError::Overcommit { .. }
    ));
    assert_eq!(w.bytes_committed(), before + 1);
}

// --- Universal invariants (quickcheck) --------------------------------

#[quickcheck]
fn byte_count_matches_predicted_size(a: i64, b: bool) -> bool {
    let mut w = Writer::new(GrowableBuffer::new());
    w.start_object().unwrap();
    w.property_name(b"n", false).unwrap();
    w.number_value_i64(a).unwrap();
    w.property_name(b"b", false).unwrap();
    w.bool_value(b).unwrap();
    w.end_object().unwrap();
    let predicted = w.bytes_committed();
    predicted as usize == w.into_inner().len()
}

#[quickcheck]
fn round_trips_through_serde_json(values: Vec<i64>) -> bool {
    let mut w = Writer::new(GrowableBuffer::new());
    w.start_array().unwrap();
    for v in &values {
        w.number_value_i64(*v).unwrap();
    }
    w.end_array().unwrap();
    let bytes = w.into_inner().into_vec();
    let parsed: Vec<i64> = serde_json::from_slice(&bytes).unwrap();
    parsed == values
}

#[quickcheck]
fn string_escape_round_trips_through_serde_json(s: String) -> bool {
    let mut w = Writer::new(GrowableBuffer::new());
    w.string_value(s.as_bytes(), false).unwrap();
    let bytes = w.into_inner().into_vec();
    let parsed: String = serde_json::from_slice(&bytes).unwrap();
    parsed == s
}

#[quickcheck]
fn two_sinks_produce_bit_identical_output(s: String, n: i64) -> bool {
    let mut a = Writer::new(GrowableBuffer::new());
    a.start_object().unwrap();
    a.property_name(b"s", false).unwrap();
    a.string_value(s.as_bytes(), false).unwrap();
    a.property_name(b"n", false).unwrap();
    a.number_value_i64(n).unwrap();
    a.end_object().unwrap();

    let mut buf = vec![0u8; 8192];
    let needed = a.bytes_committed() as usize;
    if needed > buf.len() {
        buf.resize(needed, 0);
    }
    let mut b = Writer::new(FixedSpanSink::new(&mut buf));
    b.start_object().unwrap();
    b.property_name(b"s", false).unwrap();
    b.string_value(s.as_bytes(), false).unwrap();
    b.property_name(b"n", false).unwrap();
    b.number_value_i64(n).unwrap();
    b.end_object().unwrap();

    a.into_inner().as_slice() == &buf[..needed]
}

#[quickcheck]
fn structural_violation_leaves_bytes_committed_unchanged(n: i64) -> bool {
    let mut w = Writer::new(GrowableBuffer::new());
    w.start_array().unwrap();
    w.number_value_i64(n).unwrap();
    let before = w.bytes_committed();
    let rejected = w.end_object().is_err();
    rejected && w.bytes_committed() == before
}
