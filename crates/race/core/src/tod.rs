//! Time of day values used for every timestamp in the engine.
//!
//! A [`Tod`] is a fixed-point count of ten-thousandths of a second since
//! midnight. Arithmetic wraps at 24 hours so an event that runs past midnight
//! still produces sensible elapsed times. Display helpers always floor; the
//! raw value keeps full sub-second precision for gap comparisons.
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

/// Ten-thousandths of a second per second.
pub const UNITS_PER_SECOND: i64 = 10_000;

const SECONDS_PER_DAY: i64 = 86_400;
const UNITS_PER_DAY: i64 = SECONDS_PER_DAY * UNITS_PER_SECOND;

/// Seconds field width for each decimal place count (`SS`, `SS.d`, ...).
const SECONDS_WIDTH: [usize; 5] = [2, 4, 5, 6, 7];

/// Time of day with 0.0001 s resolution, always in `[0, 24h)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Tod(i64);

/// Failure to read a time of day from text.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TodParseError {
    #[error("empty time value")]
    Empty,
    #[error("negative time value {0:?}")]
    Negative(String),
    #[error("unrecognised time value {0:?}")]
    Invalid(String),
}

impl Tod {
    pub const ZERO: Self = Self(0);
    /// Largest representable time of day, `23h59:59.9999`.
    pub const MAX: Self = Self(UNITS_PER_DAY - 1);

    /// Builds a value from raw ten-thousandths, wrapping into one day.
    pub const fn from_units(units: i64) -> Self {
        Self(units.rem_euclid(UNITS_PER_DAY))
    }

    pub const fn from_seconds(seconds: i64) -> Self {
        Self::from_units((seconds % SECONDS_PER_DAY) * UNITS_PER_SECOND)
    }

    pub const fn from_millis(millis: i64) -> Self {
        Self::from_units((millis % (SECONDS_PER_DAY * 1_000)) * 10)
    }

    /// Like [`Tod::from_seconds`], but `None` when the count does not fit in
    /// ten-thousandths.
    pub const fn checked_from_seconds(seconds: i64) -> Option<Self> {
        match seconds.checked_mul(UNITS_PER_SECOND) {
            Some(units) => Some(Self::from_units(units)),
            None => None,
        }
    }

    /// Rounds a float number of seconds to the nearest 0.0001 s.
    pub fn from_secs_f64(seconds: f64) -> Self {
        Self::from_units((seconds * UNITS_PER_SECOND as f64).round() as i64)
    }

    /// Current local wall-clock time of day.
    pub fn now() -> Self {
        use chrono::Timelike;
        let time = chrono::Local::now().time();
        let units = i64::from(time.num_seconds_from_midnight()) * UNITS_PER_SECOND
            + i64::from(time.nanosecond() / 100_000);
        Self::from_units(units)
    }

    pub const fn units(self) -> i64 {
        self.0
    }

    /// Whole seconds, floored.
    pub const fn as_seconds(self) -> i64 {
        self.0 / UNITS_PER_SECOND
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / UNITS_PER_SECOND as f64
    }

    /// Floors the value to `places` decimal places (0..=4).
    pub const fn truncate(self, places: u8) -> Self {
        let step = quantum(places);
        Self(self.0 - self.0 % step)
    }

    /// Formats as `HhMM:SS.ffff`, `M:SS.ff` or `S.ff`, flooring to `places`.
    pub fn rawtime(self, places: u8) -> String {
        let places = places.min(4);
        let value = self.truncate(places).0;
        let whole = value / UNITS_PER_SECOND;
        let frac = value % UNITS_PER_SECOND;
        let seconds = format_seconds(whole % 60, frac, places);
        if whole >= 3600 {
            format!(
                "{}h{:02}:{:0>width$}",
                whole / 3600,
                (whole % 3600) / 60,
                seconds,
                width = SECONDS_WIDTH[usize::from(places)]
            )
        } else if whole >= 60 {
            format!(
                "{}:{:0>width$}",
                whole / 60,
                seconds,
                width = SECONDS_WIDTH[usize::from(places)]
            )
        } else {
            format_seconds(whole, frac, places)
        }
    }

    /// Parses the accepted time notations.
    ///
    /// Accepts `HhMM:SS.dcmz`, `H:MM:SS.dcmz`, `H-MM-SS.dcmz`, `MM:SS`,
    /// `MM'SS"dc` and bare decimal seconds (`3725.5`).
    pub fn parse(text: &str) -> Result<Self, TodParseError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TodParseError::Empty);
        }
        if text.starts_with('-') {
            return Err(TodParseError::Negative(text.to_owned()));
        }
        let invalid = || TodParseError::Invalid(text.to_owned());

        let normalised: String = text
            .chars()
            .map(|c| match c {
                'h' | 'H' | '\'' | '-' => ':',
                '"' => '.',
                other => other,
            })
            .collect();
        let fields: Vec<&str> = normalised.split(':').collect();

        let (hours, minutes, seconds) = match fields.as_slice() {
            [seconds] => (0, 0, *seconds),
            [minutes, seconds] => (0, parse_field(minutes, 2).ok_or_else(invalid)?, *seconds),
            [hours, minutes, seconds] => (
                parse_field(hours, 0).ok_or_else(invalid)?,
                parse_field(minutes, 2).ok_or_else(invalid)?,
                *seconds,
            ),
            _ => return Err(invalid()),
        };
        let limit = if fields.len() == 1 { 0 } else { 2 };
        let seconds = parse_seconds(seconds, limit).ok_or_else(invalid)?;
        let units = hours
            .checked_mul(3600)
            .and_then(|h| h.checked_add(minutes * 60))
            .and_then(|s| s.checked_mul(UNITS_PER_SECOND))
            .and_then(|u| u.checked_add(seconds))
            .ok_or_else(invalid)?;
        Ok(Self::from_units(units))
    }

    /// Parses optional time text, mapping blank input to `None`.
    pub fn parse_opt(text: &str) -> Result<Option<Self>, TodParseError> {
        if text.trim().is_empty() {
            Ok(None)
        } else {
            Self::parse(text).map(Some)
        }
    }
}

const fn quantum(places: u8) -> i64 {
    match places {
        0 => 10_000,
        1 => 1_000,
        2 => 100,
        3 => 10,
        _ => 1,
    }
}

fn format_seconds(whole: i64, frac: i64, places: u8) -> String {
    if places == 0 {
        return whole.to_string();
    }
    let digits = frac / quantum(places);
    format!("{whole}.{digits:0width$}", width = usize::from(places))
}

/// Parses an integer field; `max_digits == 0` means unbounded.
fn parse_field(field: &str, max_digits: usize) -> Option<i64> {
    if field.is_empty()
        || !field.bytes().all(|b| b.is_ascii_digit())
        || (max_digits > 0 && field.len() > max_digits)
    {
        return None;
    }
    field.parse().ok()
}

/// Parses `SS[.ffff...]` into units, flooring extra fractional digits.
fn parse_seconds(field: &str, max_int_digits: usize) -> Option<i64> {
    let (int_part, frac_part) = match field.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (field, ""),
    };
    let whole = if int_part.is_empty() && !frac_part.is_empty() {
        0
    } else {
        parse_field(int_part, max_int_digits)?
    };
    if !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut frac = 0;
    for (idx, digit) in frac_part.bytes().take(4).enumerate() {
        frac += i64::from(digit - b'0') * quantum(idx as u8 + 1);
    }
    whole.checked_mul(UNITS_PER_SECOND)?.checked_add(frac)
}

impl Add for Tod {
    type Output = Tod;
    fn add(self, rhs: Tod) -> Tod {
        Tod::from_units(self.0 + rhs.0)
    }
}

impl Sub for Tod {
    type Output = Tod;
    fn sub(self, rhs: Tod) -> Tod {
        Tod::from_units(self.0 - rhs.0)
    }
}

impl fmt::Display for Tod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rawtime(4))
    }
}

impl FromStr for Tod {
    type Err = TodParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Source of the current time of day.
///
/// The engine never reads the wall clock itself; callers pass `now` in, and
/// the runtime obtains it from one of these.
pub trait Clock: Send + Sync {
    fn now(&self) -> Tod;
}

/// Local wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Tod {
        Tod::now()
    }
}

/// Time source pinned to a settable instant, for replays and tests.
#[derive(Debug, Default)]
pub struct FixedClock {
    units: std::sync::atomic::AtomicI64,
}

impl FixedClock {
    pub fn new(at: Tod) -> Self {
        Self {
            units: std::sync::atomic::AtomicI64::new(at.units()),
        }
    }

    pub fn set(&self, at: Tod) {
        self.units
            .store(at.units(), std::sync::atomic::Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Tod {
        Tod::from_units(self.units.load(std::sync::atomic::Ordering::SeqCst))
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use super::Tod;
    use serde::de::{self, Visitor};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::fmt;

    // Stored as the 4-place text form so no format loses sub-second digits.
    impl Serialize for Tod {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&self.rawtime(4))
        }
    }

    struct TodVisitor;

    impl Visitor<'_> for TodVisitor {
        type Value = Tod;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a time of day string or a number of seconds")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Tod, E> {
            Tod::parse(v).map_err(E::custom)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Tod, E> {
            if v < 0 {
                return Err(E::custom("negative time of day"));
            }
            Tod::checked_from_seconds(v).ok_or_else(|| E::custom("time of day out of range"))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Tod, E> {
            i64::try_from(v)
                .ok()
                .and_then(Tod::checked_from_seconds)
                .ok_or_else(|| E::custom("time of day out of range"))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Tod, E> {
            if v < 0.0 {
                return Err(E::custom("negative time of day"));
            }
            Ok(Tod::from_secs_f64(v))
        }
    }

    impl<'de> Deserialize<'de> for Tod {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Tod, D::Error> {
            // text formats may carry plain seconds; binary ones only the string
            if deserializer.is_human_readable() {
                deserializer.deserialize_any(TodVisitor)
            } else {
                deserializer.deserialize_str(TodVisitor)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_and_keypad_forms() {
        assert_eq!(Tod::parse("1h02:03.45").unwrap(), Tod::from_units(37_234_500));
        assert_eq!(Tod::parse("1:02:03.45").unwrap(), Tod::parse("1-02-03.45").unwrap());
        assert_eq!(Tod::parse("2:05").unwrap(), Tod::from_seconds(125));
        assert_eq!(Tod::parse("1.12").unwrap(), Tod::from_units(11_200));
        assert_eq!(Tod::parse("3725.5").unwrap(), Tod::from_units(37_255_000));
        assert_eq!(Tod::parse("20.0").unwrap(), Tod::from_seconds(20));
    }

    #[test]
    fn rejects_malformed_text() {
        assert_eq!(Tod::parse("  "), Err(TodParseError::Empty));
        assert!(matches!(Tod::parse("-5"), Err(TodParseError::Negative(_))));
        assert!(Tod::parse("1:2:3:4").is_err());
        assert!(Tod::parse("abc").is_err());
        assert!(Tod::parse("1:75.0").is_err());
        assert_eq!(Tod::parse_opt("").unwrap(), None);
    }

    #[test]
    fn rawtime_floors_instead_of_rounding() {
        let t = Tod::parse("59.9999").unwrap();
        assert_eq!(t.rawtime(0), "59");
        assert_eq!(t.rawtime(2), "59.99");
        assert_eq!(Tod::parse("65.5").unwrap().rawtime(1), "1:05.5");
        assert_eq!(Tod::parse("1h00:05").unwrap().rawtime(0), "1h00:05");
        assert_eq!(Tod::from_seconds(5).rawtime(2), "5.00");
    }

    #[test]
    fn subtraction_wraps_past_midnight() {
        let start = Tod::parse("23h59:50").unwrap();
        let finish = Tod::parse("0:20").unwrap();
        assert_eq!((finish - start).as_seconds(), 30);
        assert_eq!(Tod::MAX + Tod::from_units(1), Tod::ZERO);
    }

    #[test]
    fn oversized_values_are_invalid_not_fatal() {
        assert!(matches!(
            Tod::parse("9223372036854775807"),
            Err(TodParseError::Invalid(_))
        ));
        assert!(matches!(
            Tod::parse("9000000000000000h00:00"),
            Err(TodParseError::Invalid(_))
        ));
        assert!(Tod::parse_opt("99999999999999999").is_err());
        assert_eq!(Tod::checked_from_seconds(i64::MAX), None);
        assert_eq!(Tod::from_seconds(i64::MAX), Tod::from_seconds(i64::MAX % 86_400));
        // whole days wrap away
        assert_eq!(Tod::parse("48h00:05").unwrap(), Tod::from_seconds(5));
    }

    #[test]
    fn truncate_keeps_requested_places() {
        let t = Tod::from_units(1_234_567);
        assert_eq!(t.truncate(0), Tod::from_seconds(123));
        assert_eq!(t.truncate(2).units(), 1_234_500);
        assert_eq!(t.truncate(4), t);
    }
}
