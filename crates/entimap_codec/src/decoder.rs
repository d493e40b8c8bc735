//! Strict decoding of canonical CBOR back into record values.

use crate::encoder::canonical_key_order;
use crate::error::{CodecError, CodecResult};
use crate::record::Record;
use crate::value::Value;
use std::cmp::Ordering;

/// Largest element count accepted for an array or map.
const MAX_ITEMS: u64 = 16 * 1024 * 1024;

/// Largest byte length accepted for a byte or text string.
const MAX_CHUNK: u64 = 256 * 1024 * 1024;

const NOT_SHORTEST: &str = "argument not in shortest form";

/// Decodes one canonical CBOR item that spans all of `bytes`.
///
/// # Errors
///
/// Returns an error for truncated or trailing input, non-shortest heads,
/// unsorted or non-text map keys, NaN and indefinite lengths.
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    let mut reader = Reader { input: bytes, offset: 0 };
    let value = reader.value()?;
    if reader.offset < bytes.len() {
        return Err(CodecError::invalid_structure("trailing bytes after value"));
    }
    Ok(value)
}

struct Reader<'a> {
    input: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self.offset.checked_add(len).ok_or(CodecError::UnexpectedEof)?;
        let bytes = self.input.get(self.offset..end).ok_or(CodecError::UnexpectedEof)?;
        self.offset = end;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn byte(&mut self) -> CodecResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn value(&mut self) -> CodecResult<Value> {
        let initial = self.byte()?;
        let info = initial & 0x1f;
        match initial >> 5 {
            0 => {
                let n = self.argument(info)?;
                i64::try_from(n)
                    .map(Value::Integer)
                    .map_err(|_| CodecError::IntegerOverflow)
            }
            1 => {
                let n = self.argument(info)?;
                i64::try_from(n)
                    .map(|n| Value::Integer(-1 - n))
                    .map_err(|_| CodecError::IntegerOverflow)
            }
            2 => Ok(Value::Bytes(self.chunk(info)?.to_vec())),
            3 => self.text(info).map(Value::Text),
            4 => {
                let len = self.length(info, MAX_ITEMS)?;
                let mut items = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    items.push(self.value()?);
                }
                Ok(Value::Array(items))
            }
            5 => self.map(info),
            6 => {
                // Tags carry no meaning for records
                self.argument(info)?;
                self.value()
            }
            _ => self.simple(info),
        }
    }

    /// Reads a head argument, rejecting any that has a shorter form.
    fn argument(&mut self, info: u8) -> CodecResult<u64> {
        let (value, shortest) = match info {
            0..=23 => return Ok(u64::from(info)),
            24 => {
                let v = u64::from(self.byte()?);
                (v, v >= 24)
            }
            25 => {
                let v = u64::from(u16::from_be_bytes(self.take_array()?));
                (v, v > 0xff)
            }
            26 => {
                let v = u64::from(u32::from_be_bytes(self.take_array()?));
                (v, v > 0xffff)
            }
            27 => {
                let v = u64::from_be_bytes(self.take_array()?);
                (v, v > 0xffff_ffff)
            }
            31 => return Err(CodecError::IndefiniteLengthForbidden),
            _ => return Err(CodecError::invalid_structure("reserved additional info")),
        };
        if shortest {
            Ok(value)
        } else {
            Err(CodecError::invalid_structure(NOT_SHORTEST))
        }
    }

    fn length(&mut self, info: u8, max: u64) -> CodecResult<usize> {
        let claimed = self.argument(info)?;
        if claimed > max {
            return Err(CodecError::SizeLimitExceeded {
                claimed,
                max_allowed: max,
            });
        }
        usize::try_from(claimed).map_err(|_| CodecError::IntegerOverflow)
    }

    fn chunk(&mut self, info: u8) -> CodecResult<&'a [u8]> {
        let len = self.length(info, MAX_CHUNK)?;
        self.take(len)
    }

    fn text(&mut self, info: u8) -> CodecResult<String> {
        let bytes = self.chunk(info)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| CodecError::InvalidUtf8)
    }

    fn map(&mut self, info: u8) -> CodecResult<Value> {
        let len = self.length(info, MAX_ITEMS)?;
        let mut record = Record::with_capacity(len.min(1024));
        let mut previous: Option<&'a [u8]> = None;
        for _ in 0..len {
            let start = self.offset;
            let initial = self.byte()?;
            if initial >> 5 != 3 {
                return Err(CodecError::invalid_structure("map keys must be text"));
            }
            let key = self.text(initial & 0x1f)?;
            let encoded = &self.input[start..self.offset];
            if previous.is_some_and(|p| canonical_key_order(p, encoded) != Ordering::Less) {
                return Err(CodecError::invalid_structure("map keys not in canonical order"));
            }
            previous = Some(encoded);
            let value = self.value()?;
            record.insert(key, value);
        }
        Ok(Value::Map(record))
    }

    fn simple(&mut self, info: u8) -> CodecResult<Value> {
        match info {
            20 => Ok(Value::Bool(false)),
            21 => Ok(Value::Bool(true)),
            // undefined reads as null
            22 | 23 => Ok(Value::Null),
            25 => finite(half_to_f64(u16::from_be_bytes(self.take_array()?))),
            26 => finite(f64::from(f32::from_be_bytes(self.take_array()?))),
            27 => finite(f64::from_be_bytes(self.take_array()?)),
            24 => {
                let simple = self.byte()?;
                Err(CodecError::unsupported_type(format!("simple value {simple}")))
            }
            28..=30 => Err(CodecError::invalid_structure("reserved additional info")),
            31 => Err(CodecError::invalid_structure("break outside an indefinite item")),
            _ => Err(CodecError::unsupported_type(format!("simple value {info}"))),
        }
    }
}

fn finite(value: f64) -> CodecResult<Value> {
    if value.is_nan() {
        Err(CodecError::NaNForbidden)
    } else {
        Ok(Value::Float(value))
    }
}

/// Widens an IEEE 754 half-precision bit pattern.
fn half_to_f64(bits: u16) -> f64 {
    let sign = if bits & 0x8000 == 0 { 1.0 } else { -1.0 };
    let exponent = i32::from((bits >> 10) & 0x1f);
    let mantissa = f64::from(bits & 0x03ff);
    let magnitude = match exponent {
        0 => mantissa * 2f64.powi(-24),
        31 if mantissa == 0.0 => f64::INFINITY,
        31 => f64::NAN,
        _ => (1.0 + mantissa / 1024.0) * 2f64.powi(exponent - 15),
    };
    sign * magnitude
}
