//! Avro binary decoder integration tests
//!
//! Hand-encoded payloads exercise the union, nested-record and block-encoding
//! paths end to end, including Confluent wire-format framing and the
//! round-trip property over generated records.

mod common;

use common::*;
use proptest::prelude::*;
use serde_json::json;
use streamcheck::schema::avro::AvroDecoder;

const SCHEMA: &str = r#"{
    "type": "record",
    "name": "Order",
    "fields": [
        {"name": "id", "type": "string"},
        {"name": "note", "type": ["null", "string"]},
        {"name": "customer", "type": {
            "type": "record",
            "name": "Customer",
            "fields": [
                {"name": "name", "type": "string"},
                {"name": "rating", "type": "double"}
            ]
        }},
        {"name": "quantities", "type": {"type": "array", "items": "long"}}
    ]
}"#;

fn encode_order(id: &str, note: Option<&str>, name: &str, rating: f64, quantities: &[i64]) -> Vec<u8> {
    let mut payload = avro_str(id);
    match note {
        None => payload.extend(avro_long(0)),
        Some(text) => {
            payload.extend(avro_long(1));
            payload.extend(avro_str(text));
        }
    }
    payload.extend(avro_str(name));
    payload.extend(avro_double(rating));
    if quantities.is_empty() {
        payload.extend(avro_long(0));
    } else {
        payload.extend(avro_long(quantities.len() as i64));
        for quantity in quantities {
            payload.extend(avro_long(*quantity));
        }
        payload.extend(avro_long(0));
    }
    payload
}

#[test]
fn round_trips_union_nested_record_and_array() {
    let decoder = AvroDecoder::from_schema_text(SCHEMA).unwrap();
    let payload = encode_order("o-1", Some("rush"), "Ada", 4.5, &[1, 2, 3]);
    let decoded = decoder.decode(&payload).unwrap();
    assert_eq!(
        decoded,
        json!({
            "id": "o-1",
            "note": "rush",
            "customer": {"name": "Ada", "rating": 4.5},
            "quantities": [1, 2, 3]
        })
    );
}

#[test]
fn null_union_branch_decodes_to_null() {
    let decoder = AvroDecoder::from_schema_text(SCHEMA).unwrap();
    let payload = encode_order("o-2", None, "Ada", 0.0, &[]);
    let decoded = decoder.decode(&payload).unwrap();
    assert_eq!(decoded["note"], serde_json::Value::Null);
    assert_eq!(decoded["quantities"], json!([]));
}

#[test]
fn multi_block_array_terminates_on_zero_count() {
    let decoder = AvroDecoder::from_schema_text(SCHEMA).unwrap();
    let mut payload = avro_str("o-3");
    payload.extend(avro_long(0));
    payload.extend(avro_str("Ada"));
    payload.extend(avro_double(1.0));
    // Two blocks of two items each, then the terminating zero-length block.
    payload.extend(avro_long(2));
    payload.extend(avro_long(10));
    payload.extend(avro_long(11));
    payload.extend(avro_long(2));
    payload.extend(avro_long(12));
    payload.extend(avro_long(13));
    payload.extend(avro_long(0));
    let decoded = decoder.decode(&payload).unwrap();
    assert_eq!(decoded["quantities"], json!([10, 11, 12, 13]));
}

#[test]
fn confluent_framed_payload_decodes_identically() {
    let decoder = AvroDecoder::from_schema_text(SCHEMA).unwrap();
    let payload = encode_order("o-4", Some("x"), "Ada", 2.25, &[7]);
    let plain = decoder.decode(&payload).unwrap();
    for schema_id in [0u32, 1, 0xDEAD_BEEF] {
        let framed = confluent_framed(&payload, schema_id);
        assert_eq!(decoder.decode(&framed).unwrap(), plain);
    }
}

#[test]
fn truncated_payload_is_a_decode_error() {
    let decoder = AvroDecoder::from_schema_text(SCHEMA).unwrap();
    let payload = encode_order("o-5", Some("x"), "Ada", 2.25, &[7]);
    for cut in [1, payload.len() / 2, payload.len() - 1] {
        assert!(decoder.decode(&payload[..cut]).is_err(), "cut at {cut}");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: encoding then decoding reproduces the original structure,
    /// including correct termination after the zero-length final block.
    #[test]
    fn order_round_trip(
        id in "[a-z0-9-]{1,12}",
        note in prop::option::of("[ -~]{0,24}"),
        name in "[A-Za-z ]{1,16}",
        rating in -1000.0f64..1000.0,
        quantities in prop::collection::vec(-100_000i64..100_000, 0..8),
    ) {
        let decoder = AvroDecoder::from_schema_text(SCHEMA).unwrap();
        let payload = encode_order(&id, note.as_deref(), &name, rating, &quantities);
        let decoded = decoder.decode(&payload).unwrap();

        prop_assert_eq!(&decoded["id"], &json!(id));
        match &note {
            None => prop_assert_eq!(&decoded["note"], &serde_json::Value::Null),
            Some(text) => prop_assert_eq!(&decoded["note"], &json!(text)),
        }
        prop_assert_eq!(&decoded["customer"]["name"], &json!(name));
        prop_assert_eq!(&decoded["customer"]["rating"], &json!(rating));
        prop_assert_eq!(&decoded["quantities"], &json!(quantities));
    }
}
