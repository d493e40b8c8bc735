//! Date parsing and formatting for external values.
//!
//! Accepted inputs:
//! - ISO-8601 text: `2015-06-23T14:40:08.123+02:00`, `2015-06-23 14:40:08`,
//!   `2015-06-23T14:40:08Z`, `+hhmm` offsets and date-only `2015-06-23`.
//!   Fractional seconds are truncated to milliseconds.
//! - Unix timestamps in seconds, as text or number. Anything beyond the
//!   tenth integer digit is dropped, so millisecond and microsecond
//!   timestamps land on the same second.

use crate::error::{CoreError, CoreResult};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};

/// Native timestamp type.
pub type Timestamp = DateTime<Utc>;

/// Number of integer digits in a seconds-precision Unix timestamp.
const UNIX_SECONDS_DIGITS: usize = 10;

/// Parse external date text.
///
/// Text containing `-` is read as ISO-8601, anything else as a Unix
/// timestamp. Returns `None` for text that is neither.
///
/// ```
/// use entimap_core::date::parse_date;
///
/// let date = parse_date("2015-06-23T14:40:08.123+02:00").unwrap();
/// assert_eq!(date.to_rfc3339(), "2015-06-23T12:40:08.123+00:00");
/// assert_eq!(parse_date("1441888808000000"), parse_date("1441888808"));
/// ```
pub fn parse_date(input: &str) -> Option<Timestamp> {
    let text = input.trim();
    if text.is_empty() {
        None
    } else if text.contains('-') {
        parse_iso8601(text)
    } else {
        parse_unix_text(text)
    }
}

/// Interpret a number as a Unix timestamp in seconds.
#[allow(clippy::cast_possible_truncation)]
pub fn date_from_number(value: f64) -> Option<Timestamp> {
    if !value.is_finite() {
        return None;
    }
    if value < 0.0 {
        let seconds = value.trunc() as i64;
        let millis = ((value - value.trunc()) * 1000.0).round() as i64;
        return DateTime::from_timestamp(seconds, 0)?
            .checked_add_signed(TimeDelta::milliseconds(millis));
    }
    // `{}` on f64 never switches to exponent notation
    parse_unix_text(&format!("{value}"))
}

/// Interpret an integer as a Unix timestamp in seconds.
pub fn date_from_integer(value: i64) -> Option<Timestamp> {
    if value < 0 {
        DateTime::from_timestamp(value, 0)
    } else {
        parse_unix_text(&value.to_string())
    }
}

fn parse_unix_text(text: &str) -> Option<Timestamp> {
    let text = text.strip_prefix('+').unwrap_or(text);
    let (integer, fraction) = text.split_once('.').unwrap_or((text, ""));
    if integer.is_empty() || !integer.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let (integer, fraction) = if integer.len() > UNIX_SECONDS_DIGITS {
        (&integer[..UNIX_SECONDS_DIGITS], "")
    } else {
        (integer, fraction)
    };

    let seconds: i64 = integer.parse().ok()?;
    let millis = fraction_millis(fraction);
    DateTime::from_timestamp(seconds, millis * 1_000_000)
}

/// Leading three fraction digits as milliseconds, right-padded.
fn fraction_millis(digits: &str) -> u32 {
    digits
        .bytes()
        .chain(std::iter::repeat(b'0'))
        .take(3)
        .fold(0, |acc, b| acc * 10 + u32::from(b - b'0'))
}

fn parse_iso8601(text: &str) -> Option<Timestamp> {
    let mut normalized = text.to_string();
    if normalized.len() > 10 && normalized.as_bytes()[10] == b' ' {
        normalized.replace_range(10..11, "T");
    }

    if normalized.len() == 10 {
        let date = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d").ok()?;
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }

    let base = normalized.get(..19)?;
    let naive = NaiveDateTime::parse_from_str(base, "%Y-%m-%dT%H:%M:%S").ok()?;
    let mut rest = &normalized[19..];

    let mut millis = 0;
    if let Some(after_dot) = rest.strip_prefix('.') {
        let digits = after_dot
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        if digits == 0 {
            return None;
        }
        millis = fraction_millis(&after_dot[..digits]);
        rest = &after_dot[digits..];
    }

    let offset_seconds = parse_offset(rest)?;
    naive
        .and_utc()
        .checked_add_signed(TimeDelta::milliseconds(i64::from(millis)))?
        .checked_sub_signed(TimeDelta::seconds(offset_seconds))
}

/// Parse `""`, `Z`, `±hh`, `±hhmm` or `±hh:mm` into seconds east of UTC.
fn parse_offset(text: &str) -> Option<i64> {
    let (sign, body) = match text.as_bytes().first() {
        None => return Some(0),
        Some(b'Z' | b'z') if text.len() == 1 => return Some(0),
        Some(b'+') => (1, &text[1..]),
        Some(b'-') => (-1, &text[1..]),
        Some(_) => return None,
    };

    let digits: String = body.chars().filter(|c| *c != ':').collect();
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i64>().ok()?, 0),
        4 => (
            digits[..2].parse::<i64>().ok()?,
            digits[2..].parse::<i64>().ok()?,
        ),
        _ => return None,
    };
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(sign * (hours * 3600 + minutes * 60))
}

/// Renders dates on export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFormatter {
    pattern: String,
}

impl DateFormatter {
    /// The default export pattern (`2015-06-23T12:40:08+00:00`).
    pub const ISO8601: &'static str = "%Y-%m-%dT%H:%M:%S%:z";

    /// Creates a formatter from a `strftime` pattern.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] if the pattern contains an
    /// unknown specifier.
    pub fn new(pattern: impl Into<String>) -> CoreResult<Self> {
        let pattern = pattern.into();
        if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
            return Err(CoreError::invalid_operation(format!(
                "invalid date pattern: {pattern}"
            )));
        }
        Ok(Self { pattern })
    }

    /// The ISO-8601 formatter used by default.
    pub fn iso8601() -> Self {
        Self {
            pattern: Self::ISO8601.to_string(),
        }
    }

    /// The `strftime` pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Format a timestamp.
    pub fn format(&self, date: &Timestamp) -> String {
        date.format(&self.pattern).to_string()
    }
}

impl Default for DateFormatter {
    fn default() -> Self {
        Self::iso8601()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32, ms: i64) -> Timestamp {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap() + TimeDelta::milliseconds(ms)
    }

    #[test]
    fn iso8601_with_offset() {
        assert_eq!(
            parse_date("2015-06-23T14:40:08.123+02:00"),
            Some(utc(2015, 6, 23, 12, 40, 8, 123))
        );
        assert_eq!(
            parse_date("2015-09-10T12:40:08.123+0000"),
            Some(utc(2015, 9, 10, 12, 40, 8, 123))
        );
        assert_eq!(
            parse_date("2015-09-10T12:40:08-0130"),
            Some(utc(2015, 9, 10, 14, 10, 8, 0))
        );
    }

    #[test]
    fn iso8601_date_only() {
        assert_eq!(parse_date("2014-01-02"), Some(utc(2014, 1, 2, 0, 0, 0, 0)));
    }

    #[test]
    fn iso8601_fraction_truncated_to_millis() {
        assert_eq!(
            parse_date("2015-09-10T12:40:08.123456Z"),
            Some(utc(2015, 9, 10, 12, 40, 8, 123))
        );
        assert_eq!(
            parse_date("2016-01-09T12:40:08.12"),
            Some(utc(2016, 1, 9, 12, 40, 8, 120))
        );
    }

    #[test]
    fn iso8601_space_separator() {
        assert_eq!(
            parse_date("2009-10-09 12:40:08"),
            Some(utc(2009, 10, 9, 12, 40, 8, 0))
        );
    }

    #[test]
    fn unix_timestamps() {
        let expected = Some(utc(2015, 9, 10, 12, 40, 8, 0));
        assert_eq!(parse_date("1441888808"), expected);
        assert_eq!(parse_date("1441888808000"), expected);
        assert_eq!(parse_date("1441888808000000"), expected);
        assert_eq!(date_from_integer(1_441_888_808_000_000), expected);
        assert_eq!(date_from_number(1_441_888_808.0), expected);
        assert_eq!(
            parse_date("1441888808.5"),
            Some(utc(2015, 9, 10, 12, 40, 8, 500))
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date("2015-13-45"), None);
        assert_eq!(parse_date("2015-09-10T12:40:08."), None);
        assert_eq!(parse_date("2015-09-10T12:40:08+2"), None);
        assert_eq!(parse_date("2015-09-10T12:40:08 UTC"), None);
        assert_eq!(date_from_number(f64::NAN), None);
    }

    #[test]
    fn out_of_range_is_rejected() {
        let min = DateTime::<Utc>::MIN_UTC.timestamp();
        #[allow(clippy::cast_precision_loss)]
        let below = min as f64 - 0.5;
        assert_eq!(date_from_number(below), None);
        assert_eq!(date_from_integer(i64::MIN), None);
        assert!(date_from_number(-1.5).is_some());
    }

    #[test]
    fn formatter() {
        let date = utc(2015, 9, 10, 12, 40, 8, 0);
        assert_eq!(DateFormatter::default().format(&date), "2015-09-10T12:40:08+00:00");
        let short = DateFormatter::new("%Y-%m-%d").unwrap();
        assert_eq!(short.format(&date), "2015-09-10");
        assert!(DateFormatter::new("%Q").is_err());
    }

    #[test]
    fn export_then_import_is_stable() {
        let date = utc(2001, 2, 3, 4, 5, 6, 0);
        let text = DateFormatter::default().format(&date);
        assert_eq!(parse_date(&text), Some(date));
    }
}
