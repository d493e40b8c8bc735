//! Conversion between external values and typed attribute values.
//!
//! Import goes through [`ValueCoercer::to_native`], export through
//! [`ValueCoercer::to_external`]. A registered transformer named by the
//! attribute replaces the built-in rules in both directions.

mod native;
mod transformer;

pub use native::{Decimal, KeyValue, NativeValue};
pub use transformer::{FnTransformer, TransformerRegistry, ValueTransformer};

use crate::config::{BinaryExport, ExportOptions};
use crate::date::{date_from_integer, date_from_number, parse_date};
use crate::schema::{AttributeDescriptor, AttributeType};
use entimap_codec::{from_cbor, to_canonical_cbor, Value};
use thiserror::Error;
use tracing::warn;
use url::Url;
use uuid::Uuid;

/// An external value that does not fit its attribute's type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot coerce {found} into {expected:?} for attribute {attribute}")]
pub struct CoercionError {
    /// Attribute being assigned.
    pub attribute: String,
    /// Declared type.
    pub expected: AttributeType,
    /// Kind of the external value.
    pub found: &'static str,
}

impl CoercionError {
    fn new(attribute: &AttributeDescriptor, value: &Value) -> Self {
        Self {
            attribute: attribute.name.clone(),
            expected: attribute.attribute_type,
            found: value.kind(),
        }
    }
}

/// Converts values for one attribute at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueCoercer<'a> {
    transformers: Option<&'a TransformerRegistry>,
}

impl<'a> ValueCoercer<'a> {
    /// Creates a coercer that consults `transformers`.
    pub fn new(transformers: &'a TransformerRegistry) -> Self {
        Self {
            transformers: Some(transformers),
        }
    }

    /// Creates a coercer with built-in rules only.
    pub fn plain() -> Self {
        Self::default()
    }

    fn transformer(&self, attribute: &AttributeDescriptor) -> Option<&'a dyn ValueTransformer> {
        let name = attribute.transformer.as_deref()?;
        let found = self.transformers.and_then(|registry| registry.get(name));
        if found.is_none() {
            warn!(
                attribute = %attribute.name,
                transformer = name,
                "transformer not registered, using built-in conversion"
            );
        }
        found
    }

    /// Converts an external value for `attribute`.
    ///
    /// `Ok(None)` means the attribute should be cleared (the value was
    /// null).
    ///
    /// ```
    /// use entimap_codec::Value;
    /// use entimap_core::coerce::{NativeValue, ValueCoercer};
    /// use entimap_core::schema::AttributeDescriptor;
    ///
    /// let age = AttributeDescriptor::integer("age");
    /// let coercer = ValueCoercer::plain();
    /// assert_eq!(coercer.to_native(&Value::from("42"), &age), Ok(Some(NativeValue::Integer(42))));
    /// assert_eq!(coercer.to_native(&Value::Null, &age), Ok(None));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`CoercionError`] if the value cannot represent the type.
    pub fn to_native(
        &self,
        value: &Value,
        attribute: &AttributeDescriptor,
    ) -> Result<Option<NativeValue>, CoercionError> {
        if value.is_null() {
            return Ok(None);
        }
        if let Some(transformer) = self.transformer(attribute) {
            return transformer
                .transform(value)
                .map(Some)
                .ok_or_else(|| CoercionError::new(attribute, value));
        }

        let converted = match attribute.attribute_type {
            AttributeType::String => to_string(value),
            AttributeType::Integer => to_integer(value),
            AttributeType::Decimal => to_decimal(value),
            AttributeType::Float => to_float(value),
            AttributeType::Bool => to_bool(value),
            AttributeType::Date => to_date(value),
            AttributeType::Uuid => value
                .as_text()
                .and_then(|s| Uuid::parse_str(s.trim()).ok())
                .map(NativeValue::Uuid),
            AttributeType::Uri => value
                .as_text()
                .and_then(|s| Url::parse(s.trim()).ok())
                .map(NativeValue::Uri),
            AttributeType::Binary => to_canonical_cbor(value).ok().map(NativeValue::Binary),
            AttributeType::Transformable => Some(NativeValue::Transformable(value.clone())),
        };
        converted
            .map(Some)
            .ok_or_else(|| CoercionError::new(attribute, value))
    }

    /// Converts a stored value of `attribute` for export.
    ///
    /// Unset values export as null.
    pub fn to_external(
        &self,
        value: Option<&NativeValue>,
        attribute: &AttributeDescriptor,
        options: &ExportOptions,
    ) -> Value {
        let Some(value) = value else {
            return Value::Null;
        };
        if let Some(transformer) = self.transformer(attribute) {
            return transformer.reverse_transform(value).unwrap_or(Value::Null);
        }

        match value {
            NativeValue::String(s) => Value::Text(s.clone()),
            NativeValue::Integer(n) => Value::Integer(*n),
            NativeValue::Decimal(d) => d
                .to_integer()
                .map_or_else(|| Value::Float(d.to_f64()), Value::Integer),
            NativeValue::Float(f) => Value::Float(*f),
            NativeValue::Bool(b) => Value::Bool(*b),
            NativeValue::Date(date) => Value::Text(options.date_formatter.format(date)),
            NativeValue::Uuid(u) => Value::Text(u.to_string().to_uppercase()),
            NativeValue::Uri(u) => Value::Text(u.as_str().to_string()),
            NativeValue::Binary(bytes) => match options.binary {
                BinaryExport::Raw => Value::Bytes(bytes.clone()),
                BinaryExport::Decoded => {
                    from_cbor(bytes).unwrap_or_else(|_| Value::Bytes(bytes.clone()))
                }
            },
            NativeValue::Transformable(v) => v.clone(),
        }
    }
}

fn to_string(value: &Value) -> Option<NativeValue> {
    let text = match value {
        Value::Text(s) => s.clone(),
        Value::Integer(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    Some(NativeValue::String(text))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn truncate(f: f64) -> Option<i64> {
    let t = f.trunc();
    if f.is_finite() && t >= i64::MIN as f64 && t < i64::MAX as f64 {
        Some(t as i64)
    } else {
        None
    }
}

fn to_integer(value: &Value) -> Option<NativeValue> {
    let n = match value {
        Value::Integer(n) => *n,
        Value::Float(f) => truncate(*f)?,
        Value::Bool(b) => i64::from(*b),
        Value::Text(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(n) => n,
                Err(_) => truncate(s.parse::<f64>().ok()?)?,
            }
        }
        _ => return None,
    };
    Some(NativeValue::Integer(n))
}

fn to_decimal(value: &Value) -> Option<NativeValue> {
    let d = match value {
        Value::Integer(n) => Decimal::from_i64(*n),
        Value::Float(f) => Decimal::from_f64(*f)?,
        Value::Text(s) => Decimal::parse(s)?,
        _ => return None,
    };
    Some(NativeValue::Decimal(d))
}

#[allow(clippy::cast_precision_loss)]
fn to_float(value: &Value) -> Option<NativeValue> {
    let f = match value {
        Value::Integer(n) => *n as f64,
        Value::Float(f) => *f,
        Value::Text(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite())?,
        _ => return None,
    };
    Some(NativeValue::Float(f))
}

fn to_bool(value: &Value) -> Option<NativeValue> {
    let b = match value {
        Value::Bool(b) => *b,
        Value::Integer(n) => *n != 0,
        Value::Float(f) => *f != 0.0,
        Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => true,
            "false" | "no" | "0" => false,
            _ => return None,
        },
        _ => return None,
    };
    Some(NativeValue::Bool(b))
}

fn to_date(value: &Value) -> Option<NativeValue> {
    let date = match value {
        Value::Text(s) => parse_date(s)?,
        Value::Integer(n) => date_from_integer(*n)?,
        Value::Float(f) => date_from_number(*f)?,
        _ => return None,
    };
    Some(NativeValue::Date(date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn native(value: impl Into<Value>, attribute: &AttributeDescriptor) -> Option<NativeValue> {
        ValueCoercer::plain()
            .to_native(&value.into(), attribute)
            .unwrap()
    }

    #[test]
    fn strings_from_scalars() {
        let attr = AttributeDescriptor::string("name");
        assert_eq!(native("Ada", &attr), Some("Ada".into()));
        assert_eq!(native(12, &attr), Some("12".into()));
        assert_eq!(native(1.5, &attr), Some("1.5".into()));
        assert_eq!(native(true, &attr), Some("true".into()));
    }

    #[test]
    fn numbers_from_text() {
        let int = AttributeDescriptor::integer("age");
        assert_eq!(native("30", &int), Some(NativeValue::Integer(30)));
        assert_eq!(native("30.9", &int), Some(NativeValue::Integer(30)));
        assert_eq!(native(-2.7, &int), Some(NativeValue::Integer(-2)));

        let float = AttributeDescriptor::float("ratio");
        assert_eq!(native("0.25", &float), Some(NativeValue::Float(0.25)));
        assert_eq!(native(4, &float), Some(NativeValue::Float(4.0)));

        let decimal = AttributeDescriptor::decimal("price");
        assert_eq!(
            native("19.90", &decimal),
            Some(NativeValue::Decimal(Decimal::parse("19.9").unwrap()))
        );
    }

    #[test]
    fn bools_from_numbers_and_text() {
        let attr = AttributeDescriptor::bool("active");
        assert_eq!(native(1, &attr), Some(NativeValue::Bool(true)));
        assert_eq!(native(0, &attr), Some(NativeValue::Bool(false)));
        assert_eq!(native("true", &attr), Some(NativeValue::Bool(true)));
        assert_eq!(native("0", &attr), Some(NativeValue::Bool(false)));
    }

    #[test]
    fn dates_from_text_and_numbers() {
        let attr = AttributeDescriptor::date("createdAt");
        let expected = Some(NativeValue::Date(
            Utc.with_ymd_and_hms(2015, 9, 10, 12, 40, 8).unwrap(),
        ));
        assert_eq!(native("2015-09-10T12:40:08+00:00", &attr), expected);
        assert_eq!(native(1_441_888_808_i64, &attr), expected);
        assert_eq!(native("1441888808", &attr), expected);
    }

    #[test]
    fn uuid_and_uri() {
        let uuid = AttributeDescriptor::uuid("token");
        let parsed = native("6ba7b810-9dad-11d1-80b4-00c04fd430c8", &uuid);
        assert!(matches!(parsed, Some(NativeValue::Uuid(_))));

        let uri = AttributeDescriptor::uri("homepage");
        let parsed = native("https://example.com/a", &uri);
        assert!(matches!(parsed, Some(NativeValue::Uri(_))));
    }

    #[test]
    fn null_clears() {
        let attr = AttributeDescriptor::string("name");
        assert_eq!(ValueCoercer::plain().to_native(&Value::Null, &attr), Ok(None));
    }

    #[test]
    fn mismatches_fail() {
        let coercer = ValueCoercer::plain();
        let int = AttributeDescriptor::integer("age");
        let err = coercer.to_native(&Value::from("old"), &int).unwrap_err();
        assert_eq!(err.attribute, "age");
        assert_eq!(err.found, "text");
        assert!(coercer
            .to_native(&Value::from("maybe"), &AttributeDescriptor::bool("b"))
            .is_err());
        assert!(coercer
            .to_native(&Value::from("not a uuid"), &AttributeDescriptor::uuid("u"))
            .is_err());
        assert!(coercer
            .to_native(&Value::Array(vec![]), &AttributeDescriptor::string("s"))
            .is_err());
    }

    #[test]
    fn binary_round_trip() {
        let attr = AttributeDescriptor::binary("payload");
        let value = Value::Array(vec![Value::from(1), Value::from("x")]);
        let stored = ValueCoercer::plain().to_native(&value, &attr).unwrap();
        assert!(matches!(stored, Some(NativeValue::Binary(_))));

        let options = ExportOptions::new().binary(BinaryExport::Decoded);
        let exported = ValueCoercer::plain().to_external(stored.as_ref(), &attr, &options);
        assert_eq!(exported, value);
    }

    #[test]
    fn transformer_owns_conversion() {
        let mut registry = TransformerRegistry::new();
        registry.register_fn(
            "csv",
            |v| {
                v.as_array().map(|items| {
                    let parts: Vec<_> = items.iter().filter_map(Value::as_text).collect();
                    NativeValue::String(parts.join(","))
                })
            },
            |n| {
                n.as_str()
                    .map(|s| Value::Array(s.split(',').map(Value::from).collect()))
            },
        );
        let attr = AttributeDescriptor::string("tags").with_transformer("csv");
        let coercer = ValueCoercer::new(&registry);
        let value = Value::Array(vec![Value::from("a"), Value::from("b")]);

        let stored = coercer.to_native(&value, &attr).unwrap();
        assert_eq!(stored, Some("a,b".into()));
        let exported = coercer.to_external(stored.as_ref(), &attr, &ExportOptions::default());
        assert_eq!(exported, value);
    }

    #[test]
    fn unregistered_transformer_falls_back() {
        let registry = TransformerRegistry::new();
        let attr = AttributeDescriptor::integer("count").with_transformer("missing");
        assert_eq!(
            ValueCoercer::new(&registry).to_native(&Value::from("3"), &attr),
            Ok(Some(NativeValue::Integer(3)))
        );
    }

    #[test]
    fn export_formats() {
        let coercer = ValueCoercer::plain();
        let options = ExportOptions::default();

        let date = NativeValue::Date(Utc.with_ymd_and_hms(2015, 9, 10, 12, 40, 8).unwrap());
        assert_eq!(
            coercer.to_external(Some(&date), &AttributeDescriptor::date("at"), &options),
            Value::from("2015-09-10T12:40:08+00:00")
        );

        let uuid = NativeValue::Uuid(Uuid::parse_str("6ba7b810-9dad-11d1-80b4-00c04fd430c8").unwrap());
        assert_eq!(
            coercer.to_external(Some(&uuid), &AttributeDescriptor::uuid("u"), &options),
            Value::from("6BA7B810-9DAD-11D1-80B4-00C04FD430C8")
        );

        assert_eq!(
            coercer.to_external(None, &AttributeDescriptor::string("s"), &options),
            Value::Null
        );
    }
}
