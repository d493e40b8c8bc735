//! # EntiMap Codec
//!
//! External value model for EntiMap.
//!
//! Records arrive from outside (usually decoded JSON) as string-keyed maps
//! of dynamic [`Value`]s. This crate provides:
//! - [`Value`] and [`Record`], with absent and explicit-null fields kept apart
//! - conversion from and to `serde_json` documents
//! - deterministic CBOR encoding, used to store binary attributes
//!
//! ## Canonical CBOR Rules
//!
//! - Maps are sorted by key (length-first, then bytewise comparison of encoded keys)
//! - Integers use shortest encoding
//! - Floats use the shortest lossless width
//! - Strings must be UTF-8
//! - No indefinite-length items
//! - No NaN values
//!
//! ## Usage
//!
//! ```
//! use entimap_codec::{from_cbor, records_from_json, to_canonical_cbor, Value};
//!
//! let records = records_from_json(r#"[{"id": 1, "name": "Ada"}]"#).unwrap();
//! assert_eq!(records[0].get("id"), Some(&Value::Integer(1)));
//!
//! let value = Value::Map(records[0].clone());
//! let bytes = to_canonical_cbor(&value).unwrap();
//! assert_eq!(from_cbor(&bytes).unwrap(), value);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod json;
mod record;
mod value;

pub use decoder::from_cbor;
pub use encoder::to_canonical_cbor;
pub use error::{CodecError, CodecResult};
pub use json::{records_from_json, records_from_json_value, records_to_json};
pub use record::{Record, KEY_PATH_SEPARATOR};
pub use value::Value;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roundtrip(value: &Value) -> Value {
        let bytes = to_canonical_cbor(value).unwrap();
        from_cbor(&bytes).unwrap()
    }

    #[test]
    fn roundtrip_nested_record() {
        let user = |name: &str, age: i64| {
            Value::Map(Record::from_pairs([
                ("name", Value::from(name)),
                ("age", Value::from(age)),
                ("score", Value::from(0.25)),
            ]))
        };
        let value = Value::Map(Record::from_pairs([
            ("users", Value::Array(vec![user("Alice", 30), user("Bob", 25)])),
            ("count", Value::from(2)),
            ("avatar", Value::Bytes(vec![0xde, 0xad])),
            ("deleted", Value::Null),
        ]));
        assert_eq!(roundtrip(&value), value);
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Integer),
            (-1.0e9f64..1.0e9).prop_map(Value::Float),
            "[a-z]{0,8}".prop_map(Value::Text),
            prop::collection::vec(any::<u8>(), 0..8).prop_map(Value::Bytes),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::vec(("[a-z_]{1,6}", inner), 0..4)
                    .prop_map(|pairs| Value::Map(Record::from_pairs(pairs))),
            ]
        })
    }

    proptest! {
        #[test]
        fn canonical_encoding_is_stable(value in arb_value()) {
            let bytes = to_canonical_cbor(&value).unwrap();
            let decoded = from_cbor(&bytes).unwrap();
            prop_assert_eq!(&decoded, &value);
            prop_assert_eq!(to_canonical_cbor(&decoded).unwrap(), bytes);
        }
    }
}
