//! Conversion between [`Value`] and `serde_json` documents.

use crate::error::{CodecError, CodecResult};
use crate::record::Record;
use crate::value::Value;

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map_or(Value::Null, Value::Float),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(n) => serde_json::Value::from(*n),
            // Non-finite floats have no JSON form
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::Bytes(bytes) => {
                serde_json::Value::Array(bytes.iter().map(|b| serde_json::Value::from(*b)).collect())
            }
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            Value::Map(record) => serde_json::Value::Object(record_to_json_map(record)),
        }
    }
}

impl From<&Record> for serde_json::Value {
    fn from(record: &Record) -> Self {
        serde_json::Value::Object(record_to_json_map(record))
    }
}

fn record_to_json_map(record: &Record) -> serde_json::Map<String, serde_json::Value> {
    record
        .iter()
        .map(|(key, value)| (key.to_string(), serde_json::Value::from(value)))
        .collect()
}

/// Parse JSON text into a batch of records.
///
/// Accepts either an array of objects or a single object. `null` entries
/// inside the array are skipped.
///
/// # Errors
///
/// Returns [`CodecError::InvalidJson`] for malformed text or for any
/// element that is not an object.
pub fn records_from_json(text: &str) -> CodecResult<Vec<Record>> {
    let json: serde_json::Value =
        serde_json::from_str(text).map_err(|e| CodecError::invalid_json(e.to_string()))?;
    records_from_json_value(json)
}

/// Convert an already parsed JSON document into a batch of records.
///
/// # Errors
///
/// Returns [`CodecError::InvalidJson`] if the document is not an object
/// or an array of objects.
pub fn records_from_json_value(json: serde_json::Value) -> CodecResult<Vec<Record>> {
    match Value::from(json) {
        Value::Map(record) => Ok(vec![record]),
        Value::Array(items) => items
            .into_iter()
            .filter(|item| !item.is_null())
            .enumerate()
            .map(|(index, item)| match item {
                Value::Map(record) => Ok(record),
                other => Err(CodecError::invalid_json(format!(
                    "element {index} is {}, expected an object",
                    other.kind()
                ))),
            })
            .collect(),
        other => Err(CodecError::invalid_json(format!(
            "expected an object or an array of objects, found {}",
            other.kind()
        ))),
    }
}

/// Render records as a JSON array.
///
/// # Errors
///
/// Fails only if `serde_json` cannot serialize the document.
pub fn records_to_json(records: &[Record], pretty: bool) -> CodecResult<String> {
    let json = serde_json::Value::Array(records.iter().map(serde_json::Value::from).collect());
    let rendered = if pretty {
        serde_json::to_string_pretty(&json)
    } else {
        serde_json::to_string(&json)
    };
    rendered.map_err(|e| CodecError::invalid_json(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_array_of_objects() {
        let records =
            records_from_json(r#"[{"id": 1, "name": "Ada"}, null, {"id": 2.5, "tags": []}]"#)
                .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("id"), Some(&Value::Integer(1)));
        assert_eq!(records[1].get("id"), Some(&Value::Float(2.5)));
        assert_eq!(records[1].get("tags"), Some(&Value::Array(vec![])));
    }

    #[test]
    fn parse_single_object() {
        let records = records_from_json(r#"{"id": "abc"}"#).unwrap();
        assert_eq!(records, vec![Record::from_pairs([("id", "abc")])]);
    }

    #[test]
    fn reject_scalars() {
        assert!(matches!(
            records_from_json("[1, 2]"),
            Err(CodecError::InvalidJson { .. })
        ));
        assert!(matches!(
            records_from_json("\"text\""),
            Err(CodecError::InvalidJson { .. })
        ));
        assert!(matches!(
            records_from_json("{"),
            Err(CodecError::InvalidJson { .. })
        ));
    }

    #[test]
    fn render_keeps_field_order() {
        let record = Record::from_pairs([("b", Value::from(1)), ("a", Value::Null)]);
        let text = records_to_json(&[record], false).unwrap();
        assert_eq!(text, r#"[{"b":1,"a":null}]"#);
    }
}
