//! Value ordering shared by in-memory tests and expression evaluation
//!
//! Mirrors the store's ordering so a document tested in memory compares the
//! same way the compiled condition would compare it server-side.
//!
//! Ordering rules:
//! - null < bool < number < string < array < object
//! - missing values are treated as null
//! - numbers compare as f64, strings bytewise
//! - arrays compare element-wise, then by length
//! - objects compare by their sorted key/value pairs

use std::cmp::Ordering;

use serde_json::Value;

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Compares two values using the store's total order.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let (a_rank, b_rank) = (type_rank(a), type_rank(b));
    if a_rank != b_rank {
        return a_rank.cmp(&b_rank);
    }

    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or(0.0);
            let b = b.as_f64().unwrap_or(0.0);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b.iter()) {
                let ordering = compare_values(x, y);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            a.len().cmp(&b.len())
        }
        (Value::Object(a), Value::Object(b)) => {
            let mut a_entries: Vec<_> = a.iter().collect();
            let mut b_entries: Vec<_> = b.iter().collect();
            a_entries.sort_by(|x, y| x.0.cmp(y.0));
            b_entries.sort_by(|x, y| x.0.cmp(y.0));
            for ((ak, av), (bk, bv)) in a_entries.iter().zip(b_entries.iter()) {
                let ordering = ak.cmp(bk).then_with(|| compare_values(av, bv));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            a_entries.len().cmp(&b_entries.len())
        }
        _ => Ordering::Equal,
    }
}

/// Equality under the store's order (`1 == 1.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    compare_values(a, b) == Ordering::Equal
}

/// Walks a field path from `root`, treating absent segments as null.
pub fn value_at_path<'a, I, S>(root: &'a Value, path: I) -> &'a Value
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut current = root;
    for segment in path {
        current = match current {
            Value::Object(map) => map.get(segment.as_ref()).unwrap_or(&Value::Null),
            _ => &Value::Null,
        };
    }
    current
}

/// String conversion used by `TO_STRING(...)` key comparisons.
pub fn to_ql_string(value: &Value) -> Value {
    match value {
        Value::String(_) => value.clone(),
        Value::Null => Value::String(String::new()),
        Value::Bool(b) => Value::String(b.to_string()),
        Value::Number(n) => Value::String(n.to_string()),
        other => Value::String(other.to_string()),
    }
}
