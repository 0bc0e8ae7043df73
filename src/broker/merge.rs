//! Result merging
//!
//! Per-source result arrays are concatenated in source order, deduplicated
//! by `_key` and, when an order is given, stable-sorted by it. Documents
//! without a key are never considered duplicates.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::filter::{compare_values, value_at_path, KEY_FIELD};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// One sort field; `path` is dotted (`master.min_shard_gen_utime`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub path: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn new(path: &str, direction: SortDirection) -> Self {
        Self {
            path: path.to_string(),
            direction,
        }
    }
}

fn document_key(doc: &Value) -> Option<String> {
    match doc.get(KEY_FIELD)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Compares two documents field by field; missing values sort first.
pub fn compare_docs(a: &Value, b: &Value, order_by: &[OrderBy]) -> Ordering {
    for field in order_by {
        let path: Vec<&str> = field.path.split('.').collect();
        let a_value = value_at_path(a, &path);
        let b_value = value_at_path(b, &path);
        let comparison = compare_values(a_value, b_value);
        if comparison != Ordering::Equal {
            return match field.direction {
                SortDirection::Asc => comparison,
                SortDirection::Desc => comparison.reverse(),
            };
        }
    }
    Ordering::Equal
}

/// Merges per-source results into one deduplicated, optionally sorted array.
pub fn combine_results(results: Vec<Vec<Value>>, order_by: &[OrderBy]) -> Vec<Value> {
    let mut seen = HashSet::new();
    let mut docs = Vec::new();
    for doc in results.into_iter().flatten() {
        match document_key(&doc) {
            Some(key) => {
                if seen.insert(key) {
                    docs.push(doc);
                }
            }
            None => docs.push(doc),
        }
    }
    if !order_by.is_empty() {
        docs.sort_by(|a, b| compare_docs(a, b, order_by));
    }
    docs
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keyless_docs_always_kept() {
        let merged = combine_results(
            vec![vec![json!({"v": 1}), json!({"_key": "a"})], vec![json!({"v": 1}), json!({"_key": "a"})]],
            &[],
        );
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_comparator_reads_both_sides() {
        let a = json!({"seq_no": 1});
        let b = json!({"seq_no": 2});
        let asc = [OrderBy::new("seq_no", SortDirection::Asc)];
        let desc = [OrderBy::new("seq_no", SortDirection::Desc)];
        assert_eq!(compare_docs(&a, &b, &asc), Ordering::Less);
        assert_eq!(compare_docs(&b, &a, &asc), Ordering::Greater);
        assert_eq!(compare_docs(&a, &b, &desc), Ordering::Greater);
    }

    #[test]
    fn test_missing_sorts_first_and_later_fields_break_ties() {
        let order = [
            OrderBy::new("master.seq", SortDirection::Asc),
            OrderBy::new("n", SortDirection::Desc),
        ];
        let merged = combine_results(
            vec![
                vec![json!({"_key": "1", "master": {"seq": 2}, "n": 1})],
                vec![
                    json!({"_key": "2", "master": {"seq": 2}, "n": 5}),
                    json!({"_key": "3"}),
                ],
            ],
            &order,
        );
        let keys: Vec<&str> = merged.iter().map(|d| d["_key"].as_str().unwrap()).collect();
        assert_eq!(keys, ["3", "2", "1"]);
    }

    #[test]
    fn test_direction_serde() {
        let parsed: OrderBy = serde_json::from_value(json!({"path": "now", "direction": "DESC"})).unwrap();
        assert_eq!(parsed.direction, SortDirection::Desc);
        let parsed: OrderBy = serde_json::from_value(json!({"path": "now"})).unwrap();
        assert_eq!(parsed.direction, SortDirection::Asc);
    }
}
