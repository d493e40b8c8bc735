//! Native attribute values and primary-key values.

use crate::date::Timestamp;
use crate::schema::AttributeType;
use entimap_codec::Value;
use std::fmt;
use url::Url;
use uuid::Uuid;

/// A typed attribute value as stored on a persisted object.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    /// UTF-8 text.
    String(String),
    /// 64-bit signed integer.
    Integer(i64),
    /// Decimal number in normalized textual form.
    Decimal(Decimal),
    /// 64-bit float.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// UTC timestamp.
    Date(Timestamp),
    /// UUID.
    Uuid(Uuid),
    /// Absolute URI.
    Uri(Url),
    /// Opaque bytes.
    Binary(Vec<u8>),
    /// Structured value kept as-is.
    Transformable(Value),
}

impl NativeValue {
    /// The attribute type this value belongs to.
    pub fn attribute_type(&self) -> AttributeType {
        match self {
            Self::String(_) => AttributeType::String,
            Self::Integer(_) => AttributeType::Integer,
            Self::Decimal(_) => AttributeType::Decimal,
            Self::Float(_) => AttributeType::Float,
            Self::Bool(_) => AttributeType::Bool,
            Self::Date(_) => AttributeType::Date,
            Self::Uuid(_) => AttributeType::Uuid,
            Self::Uri(_) => AttributeType::Uri,
            Self::Binary(_) => AttributeType::Binary,
            Self::Transformable(_) => AttributeType::Transformable,
        }
    }

    /// Hashable key form of this value, if it can identify an object.
    ///
    /// Integral floats and decimals collapse onto integers so that `1`,
    /// `1.0` and `"1"` coerced into a numeric key all match.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn key(&self) -> Option<KeyValue> {
        match self {
            Self::String(s) => Some(KeyValue::Text(s.clone())),
            Self::Integer(n) => Some(KeyValue::Integer(*n)),
            Self::Decimal(d) => Some(
                d.to_integer()
                    .map_or_else(|| KeyValue::Text(d.to_string()), KeyValue::Integer),
            ),
            Self::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 9.0e15 {
                    Some(KeyValue::Integer(*f as i64))
                } else {
                    Some(KeyValue::Text(f.to_string()))
                }
            }
            Self::Bool(b) => Some(KeyValue::Integer(i64::from(*b))),
            Self::Date(d) => Some(KeyValue::Integer(d.timestamp_millis())),
            Self::Uuid(u) => Some(KeyValue::Uuid(*u)),
            Self::Uri(u) => Some(KeyValue::Text(u.as_str().to_string())),
            Self::Binary(_) | Self::Transformable(_) => None,
        }
    }

    /// Text content, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer content, if this is an integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Timestamp content, if this is a date.
    pub fn as_date(&self) -> Option<&Timestamp> {
        match self {
            Self::Date(d) => Some(d),
            _ => None,
        }
    }
}

impl From<&str> for NativeValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for NativeValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for NativeValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<i32> for NativeValue {
    fn from(n: i32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<f64> for NativeValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for NativeValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Timestamp> for NativeValue {
    fn from(d: Timestamp) -> Self {
        Self::Date(d)
    }
}

impl From<Uuid> for NativeValue {
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}

impl From<Url> for NativeValue {
    fn from(u: Url) -> Self {
        Self::Uri(u)
    }
}

impl From<Decimal> for NativeValue {
    fn from(d: Decimal) -> Self {
        Self::Decimal(d)
    }
}

/// Primary-key value used to match records against persisted objects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    /// Integral key.
    Integer(i64),
    /// Textual key.
    Text(String),
    /// UUID key.
    Uuid(Uuid),
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Uuid(u) => write!(f, "{u}"),
        }
    }
}

/// Arbitrary-precision decimal kept in normalized text form.
///
/// The exponent is folded into the digits and leading and trailing zeros
/// are dropped, so `1.5e1`, `+015` and `15.0` all normalize to `15`.
/// Values whose decimal point lands more than [`Decimal::PLAIN_DIGITS`]
/// places from the digits keep a `d.ddde±n` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decimal(String);

impl Decimal {
    /// Widest shift of the decimal point still written without an exponent.
    pub const PLAIN_DIGITS: i64 = 40;

    /// Parses decimal text (`-12.50`, `3e-2`). Returns `None` if invalid.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (negative, body) = match text.as_bytes().first()? {
            b'-' => (true, &text[1..]),
            b'+' => (false, &text[1..]),
            _ => (false, text),
        };
        let (mantissa, exponent) = match body.find(|c| c == 'e' || c == 'E') {
            Some(index) => (&body[..index], Some(&body[index + 1..])),
            None => (body, None),
        };
        let (integer, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if (integer.is_empty() && fraction.is_empty()) || !all_digits(integer) || !all_digits(fraction)
        {
            return None;
        }
        let exponent: i64 = match exponent {
            Some(exp) => exp.parse::<i32>().ok()?.into(),
            None => 0,
        };

        // value = 0.<significant> * 10^point
        let digits = format!("{integer}{fraction}");
        let unpadded = digits.trim_start_matches('0');
        let significant = unpadded.trim_end_matches('0');
        if significant.is_empty() {
            return Some(Self("0".to_string()));
        }
        let leading = i64::try_from(digits.len() - unpadded.len()).ok()?;
        let point = i64::try_from(integer.len()).ok()? + exponent - leading;

        let mut out = String::with_capacity(significant.len() + 8);
        if negative {
            out.push('-');
        }
        let width = i64::try_from(significant.len()).ok()?;
        if point > Self::PLAIN_DIGITS || point < -Self::PLAIN_DIGITS {
            let (first, rest) = significant.split_at(1);
            out.push_str(first);
            if !rest.is_empty() {
                out.push('.');
                out.push_str(rest);
            }
            out.push('e');
            out.push_str(&(point - 1).to_string());
        } else if point <= 0 {
            out.push_str("0.");
            out.push_str(&"0".repeat(usize::try_from(-point).ok()?));
            out.push_str(significant);
        } else if point >= width {
            out.push_str(significant);
            out.push_str(&"0".repeat(usize::try_from(point - width).ok()?));
        } else {
            let (whole, part) = significant.split_at(usize::try_from(point).ok()?);
            out.push_str(whole);
            out.push('.');
            out.push_str(part);
        }
        Some(Self(out))
    }

    /// Decimal holding an integer.
    pub fn from_i64(n: i64) -> Self {
        Self(n.to_string())
    }

    /// Decimal holding a finite float's shortest textual form.
    pub fn from_f64(f: f64) -> Option<Self> {
        if f.is_finite() {
            Self::parse(&f.to_string())
        } else {
            None
        }
    }

    /// The normalized text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Nearest float.
    pub fn to_f64(&self) -> f64 {
        self.0.parse().unwrap_or(0.0)
    }

    /// Integer value, if the decimal has no fraction or exponent.
    pub fn to_integer(&self) -> Option<i64> {
        if self.0.contains(['.', 'e']) {
            None
        } else {
            self.0.parse().ok()
        }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
