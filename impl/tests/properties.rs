//! Property tests for the round-trip invariant `toObject(fromObject(v))
//! == v` and the analogous wire round-trip, for every integer width, plus
//! sorted-vector ordering.

use proptest::prelude::*;
use structwire::{from_buffer, to_buffer, Codec, ToObjectConfig};

fn compile_one(schema: serde_json::Value, type_name: &str) -> std::sync::Arc<dyn Codec> {
    let output = structwire::compile_json(&schema, &structwire::TypeFactoryConfig::default());
    assert!(output.errors.is_empty(), "{:?}", output.errors);
    output.structs.get(type_name).unwrap().clone()
}

fn roundtrip_json(codec: &dyn Codec, json: serde_json::Value) {
    let internal = codec.from_object(Some(&json)).unwrap();
    let back = codec.to_object(Some(&internal), &ToObjectConfig::default()).unwrap();
    assert_eq!(back, json);
    let bytes = to_buffer(codec, &internal).unwrap();
    let decoded = from_buffer(codec, &bytes).unwrap();
    assert_eq!(decoded, internal);
}

macro_rules! int_roundtrip_test {
    ($test_name:ident, $field_type:literal, $range:expr) => {
        proptest! {
            #[test]
            fn $test_name(v in $range) {
                let schema = serde_json::json!({
                    "Holder": { "fields": { "v": $field_type } }
                });
                let codec = compile_one(schema, "Holder");
                roundtrip_json(codec.as_ref(), serde_json::json!({ "v": v }));
            }
        }
    };
}

int_roundtrip_test!(uint8_roundtrips, "uint8", 0u32..=0xffu32);
int_roundtrip_test!(uint16_roundtrips, "uint16", 0u32..=0xffffu32);
int_roundtrip_test!(int8_roundtrips, "int8", -0x80i32..=0x7fi32);
int_roundtrip_test!(int16_roundtrips, "int16", -0x8000i32..=0x7fffi32);
int_roundtrip_test!(varuint32_roundtrips, "varuint32", 0u32..=u32::MAX);
int_roundtrip_test!(varint32_roundtrips, "varint32", i32::MIN..=i32::MAX);

proptest! {
    #[test]
    fn uint64_decimal_string_roundtrips(v: u64) {
        let schema = serde_json::json!({ "Holder": { "fields": { "v": "uint64" } } });
        let codec = compile_one(schema, "Holder");
        roundtrip_json(codec.as_ref(), serde_json::json!({ "v": v.to_string() }));
    }

    #[test]
    fn int64_decimal_string_roundtrips(v: i64) {
        let schema = serde_json::json!({ "Holder": { "fields": { "v": "int64" } } });
        let codec = compile_one(schema, "Holder");
        roundtrip_json(codec.as_ref(), serde_json::json!({ "v": v.to_string() }));
    }

    #[test]
    fn sorted_vector_is_non_decreasing(values: Vec<u8>) {
        // The type-expression grammar only has plain `vector`; a
        // `sorted_vector` is reached the way any other composite primitive
        // outside the grammar would be, through `customTypes`.
        let mut config = structwire::TypeFactoryConfig::new();
        config.register_custom_type("sorted_uint8_vector", || {
            std::sync::Arc::new(structwire::VectorCodec::new(
                structwire::build_primitive("uint8").unwrap(),
                true,
            ))
        });

        let schema = serde_json::json!({
            "Holder": { "fields": { "v": "sorted_uint8_vector" } }
        });
        let output = structwire::compile_json(&schema, &config);
        prop_assert!(output.errors.is_empty());
        let holder = output.structs.get("Holder").unwrap();

        let value = holder
            .from_object(Some(&serde_json::json!({ "v": values })))
            .unwrap();
        let items = value.as_struct().unwrap()[0].1.as_vector().unwrap().to_vec();
        let as_ints: Vec<_> = items
            .iter()
            .map(|v| match v {
                structwire::Value::I64(n) => *n,
                _ => unreachable!(),
            })
            .collect();
        prop_assert!(as_ints.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn unsorted_vector_preserves_order(values: Vec<u8>) {
        let schema = serde_json::json!({
            "Holder": { "fields": { "v": "uint8[]" } }
        });
        let codec = compile_one(schema, "Holder");
        let json = serde_json::json!({ "v": values });
        roundtrip_json(codec.as_ref(), json);
    }
}
