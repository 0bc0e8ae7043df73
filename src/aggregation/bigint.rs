//! Split-integer sums
//!
//! The store aggregates in doubles, which lose precision past 2^53. A stored
//! big-uint (length prefix + hex digits) is therefore summed as two columns:
//! the high part (every hex digit except the trailing 8) and the low part (the
//! trailing 8 hex digits, one 32-bit chunk). Each column stays exact for a
//! large number of rows; the full sum is rebuilt as `high * 2^32 + low`.

use std::ops::AddAssign;

use num_bigint::BigUint;
use serde_json::Value;

use super::errors::{AggregationError, AggregationResult};

const LOW_BITS: usize = 32;
const LOW_HEX_DIGITS: usize = 8;

fn to_number(hex: String) -> String {
    format!("TO_NUMBER(CONCAT(\"0x\", {}))", hex)
}

/// Store expression for the high part of the value at `path`.
pub fn hi_part_expr(path: &str, prefix: usize) -> String {
    to_number(format!(
        "SUBSTRING({}, {}, LENGTH({}) - {})",
        path,
        prefix,
        path,
        prefix + LOW_HEX_DIGITS
    ))
}

/// Store expression for the low part of the value at `path`.
pub fn lo_part_expr(path: &str, prefix: usize) -> String {
    to_number(format!("RIGHT(SUBSTRING({}, {}), {})", path, prefix, LOW_HEX_DIGITS))
}

/// High and low parts of one value, or the column sums of many
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitParts {
    pub hi: BigUint,
    pub lo: BigUint,
}

impl SplitParts {
    /// `hi * 2^32 + lo`
    pub fn join(&self) -> BigUint {
        (&self.hi << LOW_BITS) + &self.lo
    }
}

impl AddAssign<&SplitParts> for SplitParts {
    fn add_assign(&mut self, other: &SplitParts) {
        self.hi += &other.hi;
        self.lo += &other.lo;
    }
}

/// Splits an integer into its high and low parts.
pub fn split(value: &BigUint) -> SplitParts {
    let mask = (BigUint::from(1u8) << LOW_BITS) - BigUint::from(1u8);
    SplitParts {
        hi: value >> LOW_BITS,
        lo: value & &mask,
    }
}

/// Splits a stored value the way the store's substring expressions do.
pub fn split_stored(prefix: usize, stored: &str) -> AggregationResult<SplitParts> {
    let hex = stored
        .get(prefix..)
        .ok_or_else(|| AggregationError::InvalidResult(stored.to_string()))?;
    let cut = hex.len().saturating_sub(LOW_HEX_DIGITS);
    let (hi, lo) = hex.split_at(cut);
    Ok(SplitParts {
        hi: parse_hex(hi)?,
        lo: parse_hex(lo)?,
    })
}

fn parse_hex(hex: &str) -> AggregationResult<BigUint> {
    if hex.is_empty() {
        return Ok(BigUint::default());
    }
    BigUint::parse_bytes(hex.as_bytes(), 16)
        .ok_or_else(|| AggregationError::InvalidResult(hex.to_string()))
}

/// Rounds a JSON number returned by the store into an integer.
pub fn round_to_big_uint(value: &Value) -> AggregationResult<BigUint> {
    if value.is_null() {
        return Ok(BigUint::default());
    }
    if let Some(u) = value.as_u64() {
        return Ok(BigUint::from(u));
    }
    let f = value
        .as_f64()
        .ok_or_else(|| AggregationError::InvalidResult(value.to_string()))?;
    let rounded = f.round();
    if !rounded.is_finite() || rounded < 0.0 {
        return Err(AggregationError::InvalidResult(value.to_string()));
    }
    BigUint::parse_bytes(format!("{:.0}", rounded).as_bytes(), 10)
        .ok_or_else(|| AggregationError::InvalidResult(value.to_string()))
}

/// Rebuilds `hi * 2^32 + lo` from the two summed columns.
pub fn reconstruct(hi: &Value, lo: &Value) -> AggregationResult<BigUint> {
    let columns = SplitParts {
        hi: round_to_big_uint(hi)?,
        lo: round_to_big_uint(lo)?,
    };
    Ok(columns.join())
}

/// Integer average; returns `sum` when `count` is zero or missing.
pub fn average(sum: BigUint, count: &Value) -> AggregationResult<BigUint> {
    let count = round_to_big_uint(count)?;
    if count == BigUint::default() {
        Ok(sum)
    } else {
        Ok(sum / count)
    }
}
