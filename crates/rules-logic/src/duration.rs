// rules-logic/src/duration.rs
// ============================================================================
// Module: Duration Parsing
// Description: Parses the duration strings used by timers and temporal windows.
// Purpose: Give the Rule Index and Temporal Pattern Matchers one shared, strict
//          parser for "5m" / "15s" / "1h" / "2d" / bare-millisecond strings.
// Dependencies: std::fmt
// ============================================================================

//! ## Overview
//! Durations appear throughout rule definitions as short strings: `set_timer`
//! delays, `absence` and `count` window sizes, `aggregate` window sizes. This
//! module is the single place that parses them, so every caller gets the same
//! strictness and the same error reporting.
//!
//! Accepted forms: a bare non-negative integer (milliseconds), or an integer
//! immediately followed by one of the unit suffixes `ms`, `s`, `m`, `h`, `d`.
//! Leading/trailing whitespace is rejected rather than trimmed, since a
//! malformed rule definition should fail validation loudly rather than be
//! silently coerced.

use std::fmt;

// ============================================================================
// SECTION: Error Type
// ============================================================================

/// Error produced when a duration string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    /// The input string was empty.
    Empty,
    /// The numeric portion of the string was not a valid non-negative integer.
    InvalidNumber {
        /// The offending input.
        input: String,
    },
    /// The string carried a suffix that is not one of the known units.
    UnknownUnit {
        /// The offending input.
        input: String,
        /// The unrecognized unit.
        unit: String,
    },
    /// The computed millisecond value overflowed `u64`.
    Overflow {
        /// The offending input.
        input: String,
    },
}

impl fmt::Display for DurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "duration string is empty"),
            Self::InvalidNumber { input } => {
                write!(f, "invalid numeric value in duration string: {input:?}")
            }
            Self::UnknownUnit { input, unit } => {
                write!(f, "unknown duration unit {unit:?} in {input:?}")
            }
            Self::Overflow { input } => {
                write!(f, "duration value overflows milliseconds: {input:?}")
            }
        }
    }
}

impl std::error::Error for DurationError {}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Parses a duration string into a millisecond count.
///
/// Accepts a bare integer (interpreted as milliseconds) or an integer
/// followed directly by a unit suffix: `ms`, `s`, `m`, `h`, `d`.
///
/// # Errors
/// Returns [`DurationError`] if the string is empty, the numeric portion is
/// not a valid non-negative integer, the suffix is not a known unit, or the
/// computed value overflows `u64`.
pub fn parse_duration_ms(input: &str) -> Result<u64, DurationError> {
    if input.is_empty() {
        return Err(DurationError::Empty);
    }

    let split_at = input.find(|c: char| !c.is_ascii_digit()).unwrap_or(input.len());
    let (digits, suffix) = input.split_at(split_at);

    if digits.is_empty() {
        return Err(DurationError::InvalidNumber { input: input.to_string() });
    }

    let value: u64 = digits
        .parse()
        .map_err(|_| DurationError::InvalidNumber { input: input.to_string() })?;

    let multiplier: u64 = match suffix {
        "" | "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        other => {
            return Err(DurationError::UnknownUnit {
                input: input.to_string(),
                unit: other.to_string(),
            });
        }
    };

    value
        .checked_mul(multiplier)
        .ok_or_else(|| DurationError::Overflow { input: input.to_string() })
}
