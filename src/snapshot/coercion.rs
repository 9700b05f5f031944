use rust_decimal::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;

/// Outcome of permissive numeric coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coerced {
    /// Key missing or `null`
    Absent,
    Valid(Decimal),
    /// Present but not usable as a finite number
    Invalid,
}

/// Where a resolved snapshot timestamp came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampSource {
    Supplied,
    Defaulted,
    /// Supplied but unusable, replaced by the current time
    Fallback,
}

/// Accepts JSON numbers and numeric strings; rejects everything else.
///
/// Numbers are converted through their shortest textual form, so `100.005` and
/// `"100.005"` produce the same decimal. Strings are trimmed and may use plain
/// (`"-12.50"`) or scientific (`"1e3"`) notation. Empty strings, `NaN`,
/// `Infinity`, hex/binary literals, booleans, arrays, objects and values above
/// the decimal range are `Invalid`. Finite values below decimal resolution
/// (`1e-30`) are `Valid(0)` whichever way they are written.
pub fn coerce_number(value: Option<&Value>) -> Coerced {
    match value {
        None | Some(Value::Null) => Coerced::Absent,
        Some(Value::Number(number)) => parse_decimal(&number.to_string()),
        Some(Value::String(text)) => parse_decimal(text.trim()),
        Some(_) => Coerced::Invalid,
    }
}

fn parse_decimal(text: &str) -> Coerced {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E')) {
        return Coerced::Invalid;
    }

    let parsed = if text.contains(['e', 'E']) {
        Decimal::from_scientific(&text.to_ascii_lowercase())
    } else {
        Decimal::from_str(text)
    };

    match parsed {
        Ok(value) => Coerced::Valid(value),
        Err(_) => from_float_text(text),
    }
}

// Smallest magnitude a Decimal can hold (28 fractional digits)
const DECIMAL_RESOLUTION: f64 = 1e-28;

// Finite values the decimal parser refuses: too many fractional digits, or too
// small to represent at all (collapses to zero). Out-of-range magnitudes stay invalid.
fn from_float_text(text: &str) -> Coerced {
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() && value.abs() < DECIMAL_RESOLUTION => Coerced::Valid(Decimal::ZERO),
        Ok(value) if value.is_finite() => Decimal::from_f64(value).map(Coerced::Valid).unwrap_or(Coerced::Invalid),
        _ => Coerced::Invalid,
    }
}

/// Round to cents, half away from zero: 100.005 -> 100.01, -2.345 -> -2.35.
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Resolve the snapshot key. A usable value is floored to whole seconds; an
/// absent one defaults to `now`, and an unusable one silently falls back to `now`.
pub fn resolve_timestamp(value: Option<&Value>, now: i64) -> (i64, TimestampSource) {
    match coerce_number(value) {
        Coerced::Absent => (now, TimestampSource::Defaulted),
        Coerced::Valid(seconds) => match seconds.floor().to_i64() {
            Some(seconds) => (seconds, TimestampSource::Supplied),
            None => (now, TimestampSource::Fallback),
        },
        Coerced::Invalid => (now, TimestampSource::Fallback),
    }
}
