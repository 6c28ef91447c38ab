//! Human-readable time strings.
//!
//! Accepted forms are `HH:MM:SS[.fraction]`, `MM:SS[.fraction]` and bare
//! seconds (`SS[.fraction]`). Values are held at millisecond resolution
//! and rendered back as decimal seconds for use in filter expressions.

use std::fmt;
use std::str::FromStr;

use highlights_common::error::{HighlightsError, HighlightsResult};

/// A non-negative point in time with millisecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    millis: u64,
}

impl Timestamp {
    pub const ZERO: Self = Self { millis: 0 };

    /// Parse a time string.
    ///
    /// Minutes and seconds must be below 60 whenever a colon form is used;
    /// a bare seconds value may be any size.
    pub fn parse(input: &str) -> HighlightsResult<Self> {
        let value = input.trim();
        if value.is_empty() {
            return Err(HighlightsError::invalid_timestamp(input, "empty timestamp"));
        }

        let (clock, fraction) = match value.split_once('.') {
            Some((clock, fraction)) => (clock, Some(fraction)),
            None => (value, None),
        };

        let fraction_ms = match fraction {
            Some(digits) => parse_fraction_ms(input, digits)?,
            None => 0,
        };

        let parts: Vec<&str> = clock.split(':').collect();
        let (hours, minutes, seconds) = match parts.as_slice() {
            [s] => (0, 0, parse_component(input, s, "seconds")?),
            [m, s] => (
                0,
                parse_component(input, m, "minutes")?,
                parse_component(input, s, "seconds")?,
            ),
            [h, m, s] => (
                parse_component(input, h, "hours")?,
                parse_component(input, m, "minutes")?,
                parse_component(input, s, "seconds")?,
            ),
            _ => {
                return Err(HighlightsError::invalid_timestamp(
                    input,
                    "expected HH:MM:SS[.fraction] or a seconds value",
                ))
            }
        };

        if parts.len() > 1 {
            if minutes >= 60 {
                return Err(HighlightsError::invalid_timestamp(
                    input,
                    format!("minutes out of range: {minutes}"),
                ));
            }
            if seconds >= 60 {
                return Err(HighlightsError::invalid_timestamp(
                    input,
                    format!("seconds out of range: {seconds}"),
                ));
            }
        }

        hours
            .checked_mul(3600)
            .and_then(|h| h.checked_add(minutes * 60))
            .and_then(|s| s.checked_add(seconds))
            .and_then(|s| s.checked_mul(1000))
            .and_then(|ms| ms.checked_add(fraction_ms))
            .map(Self::from_millis)
            .ok_or_else(|| HighlightsError::invalid_timestamp(input, "value too large"))
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    /// Round a seconds value to the nearest millisecond.
    ///
    /// Returns `None` for negative or non-finite input.
    pub fn from_secs_f64(secs: f64) -> Option<Self> {
        if !secs.is_finite() || secs < 0.0 {
            return None;
        }
        Some(Self::from_millis((secs * 1000.0).round() as u64))
    }

    pub fn as_millis(&self) -> u64 {
        self.millis
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.millis as f64 / 1000.0
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self::from_millis(self.millis.saturating_sub(other.millis))
    }

    /// Canonical decimal-seconds text: `5`, `5.5`, `65.125`.
    pub fn seconds_str(&self) -> String {
        let secs = self.millis / 1000;
        let ms = self.millis % 1000;
        if ms == 0 {
            secs.to_string()
        } else {
            format!("{secs}.{ms:03}").trim_end_matches('0').to_string()
        }
    }
}

/// Render a duration in seconds the way timestamps render, for filter
/// arguments such as `fade` start/duration and `aevalsrc` length.
///
/// Negative input is clamped to zero.
pub fn format_seconds(secs: f64) -> String {
    Timestamp::from_secs_f64(secs.max(0.0))
        .unwrap_or(Timestamp::ZERO)
        .seconds_str()
}

impl FromStr for Timestamp {
    type Err = HighlightsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Timestamp {
    /// `HH:MM:SS.mmm`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.millis / 3_600_000;
        let minutes = (self.millis % 3_600_000) / 60_000;
        let seconds = (self.millis % 60_000) / 1000;
        let millis = self.millis % 1000;
        write!(f, "{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
    }
}

fn parse_component(input: &str, digits: &str, name: &str) -> HighlightsResult<u64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(HighlightsError::invalid_timestamp(
            input,
            format!("{name} must be a non-negative integer"),
        ));
    }
    digits
        .parse::<u64>()
        .map_err(|_| HighlightsError::invalid_timestamp(input, format!("{name} too large")))
}

/// Fractional digits to milliseconds, rounding on the fourth digit.
fn parse_fraction_ms(input: &str, digits: &str) -> HighlightsResult<u64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(HighlightsError::invalid_timestamp(
            input,
            "fraction must be one or more digits",
        ));
    }
    let mut scaled: u64 = 0;
    for i in 0..4 {
        let digit = digits.as_bytes().get(i).map_or(0, |b| (b - b'0') as u64);
        scaled = scaled * 10 + digit;
    }
    Ok((scaled + 5) / 10)
}
