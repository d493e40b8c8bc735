//! Deterministic CBOR encoding of record values.

use crate::error::{CodecError, CodecResult};
use crate::record::Record;
use crate::value::Value;
use std::cmp::Ordering;

const UNSIGNED: u8 = 0;
const NEGATIVE: u8 = 1;
const BYTES: u8 = 2;
const TEXT: u8 = 3;
const ARRAY: u8 = 4;
const MAP: u8 = 5;

const FALSE: u8 = 0xf4;
const TRUE: u8 = 0xf5;
const NULL: u8 = 0xf6;
const SINGLE: u8 = 0xfa;
const DOUBLE: u8 = 0xfb;

/// Encodes `value` in canonical CBOR (RFC 8949 section 4.2.1).
///
/// Binary attributes store this encoding of whatever the record carried,
/// so equal values always produce equal bytes: map keys are sorted by
/// their encoded form, heads use the shortest width and floats the
/// narrowest lossless width.
///
/// # Errors
///
/// Returns [`CodecError::NaNForbidden`] if `value` holds a NaN.
pub fn to_canonical_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut writer = Writer::default();
    writer.value(value)?;
    Ok(writer.out)
}

/// Orders encoded map keys: shorter first, then bytewise.
pub(crate) fn canonical_key_order(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[derive(Default)]
struct Writer {
    out: Vec<u8>,
}

impl Writer {
    fn value(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => self.out.push(NULL),
            Value::Bool(b) => self.out.push(if *b { TRUE } else { FALSE }),
            Value::Integer(n) => self.integer(*n),
            Value::Float(f) => self.float(*f)?,
            Value::Bytes(bytes) => self.chunk(BYTES, bytes),
            Value::Text(text) => self.chunk(TEXT, text.as_bytes()),
            Value::Array(items) => {
                self.head(ARRAY, items.len() as u64);
                for item in items {
                    self.value(item)?;
                }
            }
            Value::Map(record) => self.map(record)?,
        }
        Ok(())
    }

    #[allow(clippy::cast_sign_loss)]
    fn integer(&mut self, n: i64) {
        if n < 0 {
            // -1 - n never overflows for negative n
            self.head(NEGATIVE, (-1 - n) as u64);
        } else {
            self.head(UNSIGNED, n as u64);
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
    fn float(&mut self, f: f64) -> CodecResult<()> {
        if f.is_nan() {
            return Err(CodecError::NaNForbidden);
        }
        let narrow = f as f32;
        if f64::from(narrow) == f {
            self.out.push(SINGLE);
            self.out.extend_from_slice(&narrow.to_be_bytes());
        } else {
            self.out.push(DOUBLE);
            self.out.extend_from_slice(&f.to_be_bytes());
        }
        Ok(())
    }

    /// Writes a major type with its argument in the shortest form.
    #[allow(clippy::cast_possible_truncation)]
    fn head(&mut self, major: u8, argument: u64) {
        let major = major << 5;
        match argument {
            0..=23 => self.out.push(major | argument as u8),
            24..=0xff => self.out.extend_from_slice(&[major | 24, argument as u8]),
            0x100..=0xffff => {
                self.out.push(major | 25);
                self.out.extend_from_slice(&(argument as u16).to_be_bytes());
            }
            0x1_0000..=0xffff_ffff => {
                self.out.push(major | 26);
                self.out.extend_from_slice(&(argument as u32).to_be_bytes());
            }
            _ => {
                self.out.push(major | 27);
                self.out.extend_from_slice(&argument.to_be_bytes());
            }
        }
    }

    fn chunk(&mut self, major: u8, bytes: &[u8]) {
        self.head(major, bytes.len() as u64);
        self.out.extend_from_slice(bytes);
    }

    fn map(&mut self, record: &Record) -> CodecResult<()> {
        let mut entries: Vec<(Vec<u8>, &Value)> = record
            .iter()
            .map(|(key, value)| {
                let mut key_writer = Writer::default();
                key_writer.chunk(TEXT, key.as_bytes());
                (key_writer.out, value)
            })
            .collect();
        entries.sort_by(|a, b| canonical_key_order(&a.0, &b.0));

        self.head(MAP, entries.len() as u64);
        for (key, value) in entries {
            self.out.extend_from_slice(&key);
            self.value(value)?;
        }
        Ok(())
    }
}
