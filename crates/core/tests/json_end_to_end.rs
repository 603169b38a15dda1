// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! End-to-end exercises across the JSON stack: parse, pointer traversal,
//! re-encode, and the streaming value model against the same inputs.

use voicekit_core::json::{self, JsonValue, KeyOrder, StringifyConfig};
use voicekit_core::value::json::{parse, Parsed};
use voicekit_core::{utf8, Value};

#[test]
fn parse_point_reencode() {
    let text = r#"{"a":1,"b":[true,1,{"x":false}]}"#;
    let root = json::decode_str(text).expect("decode");

    // pointer traversal hits the nested literal
    let x = json::get(&root, "/b/2/x").expect("/b/2/x resolves");
    assert_eq!(x.as_bool(), Some(false));

    // minimal re-encode parses back to an equal tree
    let minimal = json::encode_minimal(&root).expect("encode");
    let again = json::decode_str(&minimal).expect("re-decode");
    assert!(again.matches(&root));

    // and so does the pretty form
    let pretty = json::encode_pretty(&root).expect("encode pretty");
    let again = json::decode_str(&pretty).expect("re-decode pretty");
    assert!(again.matches(&root));
}

#[test]
fn encode_length_matches_calculate_for_canned_configs() {
    let root = json::decode_str(
        r#"{"codec":"opus","sample_rate_hertz":16000,"tags":["a","b",{"nested":[]}],"extra":{}}"#,
    )
    .expect("decode");

    for config in [StringifyConfig::minimal(), StringifyConfig::default_pretty()] {
        let mut out = String::new();
        let written =
            json::encode(&root, &config, KeyOrder::Ascending, &mut out).expect("encode");
        assert_eq!(written, out.len());
        assert_eq!(json::calculate(&root, &config).expect("calculate"), written);
    }
}

#[test]
fn utf8_sequence_as_string_literal() {
    // 41 E2 89 A2 CE 91 2E = "A≢Α."
    let seq: [u8; 7] = [0x41, 0xE2, 0x89, 0xA2, 0xCE, 0x91, 0x2E];

    // validate() is true exactly at the character boundaries
    let boundaries: Vec<usize> =
        (1..=seq.len()).filter(|&n| utf8::validate(&seq[..n])).collect();
    assert_eq!(boundaries, vec![1, 4, 6, 7]);

    // surrounded by quotes it is a legal JSON string literal
    let mut literal = vec![b'"'];
    literal.extend_from_slice(&seq);
    literal.push(b'"');

    let (value, used) = json::decode(&literal).expect("decode string literal");
    assert_eq!(used, literal.len());
    assert_eq!(value.as_str(), Some("A\u{2262}\u{0391}."));
}

#[test]
fn pointer_dash_appends_to_array() {
    let mut root = json::decode_str(r#"{"array":[1,2,3]}"#).expect("decode");

    let appended = json::get_mut(&mut root, "/array/-").expect("append");
    assert!(appended.is_null());

    let array = json::get(&root, "/array").expect("array");
    assert_eq!(array.count(), 4);
}

#[test]
fn streaming_value_agrees_with_tree_model() {
    let text = r#"{"a":1,"b":[true,1,{"x":false}]}"#;

    // the tree model insists on complete input
    let tree = json::decode_str(text).expect("tree decode");

    // the streaming model accepts the same bytes in two pieces
    let bytes = text.as_bytes();
    let (head, tail) = bytes.split_at(bytes.len() / 2);

    match parse(head) {
        Parsed::Incomplete { .. } => {},
        other => panic!("half input must be incomplete, got {other:?}"),
    }

    let mut full = head.to_vec();
    full.extend_from_slice(tail);
    let Parsed::Value { value, consumed } = parse(&full) else {
        panic!("full input must parse");
    };
    assert_eq!(consumed, bytes.len());

    // both models agree on the content
    assert_eq!(value.object_get("a").and_then(Value::as_number), Some(1.0));
    assert_eq!(
        tree.object_get("a").and_then(JsonValue::as_number),
        value.object_get("a").and_then(Value::as_number)
    );
    assert_eq!(value.object_get("b").map(|b| b.count()), Some(3));
}
