//! Order-preserving encoding for unsigned integers wider than a double
//!
//! A value is stored as its lowercase hex digits preceded by the hex digit
//! count, itself rendered in hex and left-padded to `prefix` digits. Longer
//! numbers therefore sort after shorter ones under plain string ordering.
//! `prefix` is 1 for 64-bit values and 2 for 1024-bit values.

use num_bigint::BigUint;
use serde_json::Value;

use super::errors::{FilterError, FilterResult};

/// Prefix length used by 64-bit fields
pub const U64_PREFIX: usize = 1;

/// Prefix length used by 1024-bit fields
pub const U1024_PREFIX: usize = 2;

/// Parses a number, a decimal string or a `0x` hex string.
pub fn parse_big_uint(value: &Value) -> FilterResult<BigUint> {
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                return Ok(BigUint::from(u));
            }
            match n.as_f64() {
                Some(f) if f >= 0.0 && f.fract() == 0.0 && f.is_finite() => {
                    parse_digits(&format!("{:.0}", f), 10, value)
                }
                _ => Err(FilterError::InvalidBigUInt(value.to_string())),
            }
        }
        Value::String(s) => {
            let s = s.trim();
            match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex) => parse_digits(hex, 16, value),
                None => parse_digits(s, 10, value),
            }
        }
        _ => Err(FilterError::InvalidBigUInt(value.to_string())),
    }
}

fn parse_digits(digits: &str, radix: u32, original: &Value) -> FilterResult<BigUint> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(FilterError::InvalidBigUInt(original.to_string()));
    }
    BigUint::parse_bytes(digits.as_bytes(), radix)
        .ok_or_else(|| FilterError::InvalidBigUInt(original.to_string()))
}

/// Encodes an integer into its stored string form.
pub fn encode_big_uint(prefix: usize, value: &BigUint) -> String {
    let hex = value.to_str_radix(16);
    format!("{:0width$x}{}", hex.len(), hex, width = prefix)
}

/// Converts a filter literal to the stored form; null passes through.
pub fn convert_big_uint(prefix: usize, value: &Value) -> FilterResult<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let parsed = parse_big_uint(value)?;
    Ok(Value::String(encode_big_uint(prefix, &parsed)))
}

/// Decodes a stored value back into an integer.
pub fn decode_big_uint(prefix: usize, stored: &Value) -> FilterResult<BigUint> {
    match stored {
        Value::String(s) => {
            let hex = s.get(prefix..).unwrap_or_default();
            parse_digits(hex, 16, stored)
        }
        Value::Number(_) => parse_big_uint(stored),
        _ => Err(FilterError::InvalidBigUInt(stored.to_string())),
    }
}

/// Renders a stored value as `0x…` for output.
pub fn resolve_big_uint(prefix: usize, stored: &Value) -> Value {
    match stored {
        Value::Null => Value::Null,
        Value::Number(_) => match parse_big_uint(stored) {
            Ok(n) => Value::String(format!("0x{}", n.to_str_radix(16))),
            Err(_) => stored.clone(),
        },
        Value::String(s) => Value::String(format!("0x{}", s.get(prefix..).unwrap_or_default())),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encoding_matches_store_layout() {
        assert_eq!(convert_big_uint(1, &json!(5)).unwrap(), json!("15"));
        assert_eq!(convert_big_uint(1, &json!("0x0a")).unwrap(), json!("1a"));
        assert_eq!(convert_big_uint(1, &json!(0)).unwrap(), json!("10"));
        assert_eq!(convert_big_uint(2, &json!(255)).unwrap(), json!("02ff"));
        assert_eq!(convert_big_uint(1, &json!("4096")).unwrap(), json!("41000"));
        assert_eq!(convert_big_uint(1, &Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_encoded_strings_sort_numerically() {
        let values = [0u64, 9, 15, 16, 255, 4096, u64::MAX];
        let encoded: Vec<String> = values
            .iter()
            .map(|v| encode_big_uint(1, &BigUint::from(*v)))
            .collect();
        let mut sorted = encoded.clone();
        sorted.sort();
        assert_eq!(encoded, sorted);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(convert_big_uint(1, &json!("0xzz")).is_err());
        assert!(convert_big_uint(1, &json!(-3)).is_err());
        assert!(convert_big_uint(1, &json!(1.5)).is_err());
        assert!(convert_big_uint(1, &json!(true)).is_err());
        assert!(convert_big_uint(1, &json!("")).is_err());
    }

    #[test]
    fn test_resolve_and_decode() {
        assert_eq!(resolve_big_uint(2, &json!("02ff")), json!("0xff"));
        assert_eq!(resolve_big_uint(1, &json!(255)), json!("0xff"));
        assert_eq!(resolve_big_uint(1, &Value::Null), Value::Null);
        assert_eq!(decode_big_uint(2, &json!("02ff")).unwrap(), BigUint::from(255u32));
    }
}
