//! Go-style durations
//!
//! Registry request limits and CloudFront sessions carry durations in the
//! Go `time.Duration` text form (`"1h30m"`, `"1.5s"`, `"250ms"`). This module
//! parses and prints that form with nanosecond precision so that values
//! survive a decode/encode cycle unchanged.

use std::fmt;
use std::str::FromStr;

use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Largest representable duration (Go stores durations as int64 nanoseconds).
const MAX_NANOS: u128 = i64::MAX as u128;

/// Fraction digits beyond this carry no nanosecond information.
const MAX_FRACTION_SCALE: u128 = 100_000_000_000_000_000_000;

/// A non-negative duration serialized as a Go duration string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration(std::time::Duration);

impl Duration {
    /// The zero duration, printed as `"0s"`.
    pub const ZERO: Duration = Duration(std::time::Duration::ZERO);

    /// Wrap a standard duration, rejecting values Go cannot represent.
    pub fn from_std(duration: std::time::Duration) -> Result<Self, Error> {
        if duration.as_nanos() > MAX_NANOS {
            return Err(Error::DurationParse(format!(
                "duration {:?} exceeds the maximum of {}ns",
                duration, MAX_NANOS
            )));
        }
        Ok(Self(duration))
    }

    /// The wrapped standard duration
    pub fn as_std(&self) -> std::time::Duration {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<Duration> for std::time::Duration {
    fn from(d: Duration) -> Self {
        d.0
    }
}

impl TryFrom<std::time::Duration> for Duration {
    type Error = Error;

    fn try_from(d: std::time::Duration) -> Result<Self, Self::Error> {
        Duration::from_std(d)
    }
}

impl FromStr for Duration {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_duration(s).map(Duration)
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_duration(self.0))
    }
}

impl Serialize for Duration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Duration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl JsonSchema for Duration {
    fn schema_name() -> String {
        "Duration".to_string()
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        SchemaObject {
            instance_type: Some(InstanceType::String.into()),
            format: Some("duration".to_string()),
            ..Default::default()
        }
        .into()
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Parse a Go duration string (e.g., "1h", "1h30m", "1.5s", "300ms", "0").
///
/// Units: `ns`, `us`/`µs`/`μs`, `ms`, `s`, `m`, `h`. Every component needs a
/// unit except the bare string `"0"`. Negative durations are rejected, and
/// so is surrounding whitespace.
pub fn parse_duration(s: &str) -> Result<std::time::Duration, Error> {
    let invalid = |reason: &str| Error::DurationParse(format!("{} in duration {:?}", reason, s));

    if s.is_empty() {
        return Err(Error::DurationParse("empty duration string".to_string()));
    }

    let mut rest = s.strip_prefix('+').unwrap_or(s);
    if rest.starts_with('-') {
        return Err(invalid("negative value"));
    }
    if rest == "0" {
        return Ok(std::time::Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid("missing value"));
    }

    let mut total: u128 = 0;

    while !rest.is_empty() {
        let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let (int_digits, mut after) = rest.split_at(int_len);

        let mut frac_digits = "";
        if let Some(stripped) = after.strip_prefix('.') {
            let frac_len = stripped.bytes().take_while(u8::is_ascii_digit).count();
            let (digits, tail) = stripped.split_at(frac_len);
            frac_digits = digits;
            after = tail;
        }

        if int_digits.is_empty() && frac_digits.is_empty() {
            return Err(invalid("missing number"));
        }

        let unit_len = after
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(after.len());
        let (unit, remaining) = after.split_at(unit_len);

        let multiplier: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => NANOS_PER_MICRO,
            "ms" => NANOS_PER_MILLI,
            "s" => NANOS_PER_SEC,
            "m" => 60 * NANOS_PER_SEC,
            "h" => 3600 * NANOS_PER_SEC,
            "" => return Err(invalid("missing unit")),
            other => return Err(invalid(&format!("unknown unit {:?}", other))),
        };

        let whole: u128 = if int_digits.is_empty() {
            0
        } else {
            int_digits.parse().map_err(|_| invalid("overflow"))?
        };
        if whole > MAX_NANOS {
            return Err(invalid("overflow"));
        }

        let mut value = whole
            .checked_mul(multiplier)
            .ok_or_else(|| invalid("overflow"))?;

        if !frac_digits.is_empty() {
            let mut fraction: u128 = 0;
            let mut scale: u128 = 1;
            for digit in frac_digits.bytes() {
                if scale >= MAX_FRACTION_SCALE {
                    break;
                }
                fraction = fraction * 10 + u128::from(digit - b'0');
                scale *= 10;
            }
            value = value
                .checked_add(fraction * multiplier / scale)
                .ok_or_else(|| invalid("overflow"))?;
        }

        total = total.checked_add(value).ok_or_else(|| invalid("overflow"))?;
        if total > MAX_NANOS {
            return Err(invalid("overflow"));
        }

        rest = remaining;
    }

    let nanos = u64::try_from(total).map_err(|_| invalid("overflow"))?;
    Ok(std::time::Duration::from_nanos(nanos))
}

// =============================================================================
// Formatting
// =============================================================================

/// Format a duration the way Go's `Duration.String()` does.
///
/// Sub-second values use the largest fitting unit among `ns`, `µs`, `ms`;
/// anything else is printed as `[Nh][Nm]N[.fff]s`, e.g. `1h0m0s`, `1m30s`.
pub fn format_duration(d: std::time::Duration) -> String {
    let nanos = d.as_nanos();

    if nanos == 0 {
        return "0s".to_string();
    }

    if nanos < NANOS_PER_MICRO {
        return format!("{}ns", nanos);
    }
    if nanos < NANOS_PER_MILLI {
        return format!("{}µs", with_fraction(nanos, NANOS_PER_MICRO, 3));
    }
    if nanos < NANOS_PER_SEC {
        return format!("{}ms", with_fraction(nanos, NANOS_PER_MILLI, 6));
    }

    let secs = nanos / NANOS_PER_SEC;
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    let sub_second = nanos % NANOS_PER_SEC;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{}h{}m", hours, minutes));
    } else if minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    out.push_str(&seconds.to_string());
    if sub_second > 0 {
        let frac = format!("{:09}", sub_second);
        out.push('.');
        out.push_str(frac.trim_end_matches('0'));
    }
    out.push('s');
    out
}

/// `value / unit` with the remainder printed as trailing-zero-free decimals.
fn with_fraction(value: u128, unit: u128, digits: usize) -> String {
    let whole = value / unit;
    let rem = value % unit;
    if rem == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0width$}", rem, width = digits);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}
