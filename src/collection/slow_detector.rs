//! Fast/slow query classification
//!
//! A query is fast when the store can answer it from a sorted index. For a
//! conjunction with filter fields `F` and order fields `O` that means some
//! index `I` has a prefix `I[0..k]` made only of fields in `F`, directly
//! followed by `O`. Without an order the prefix must not be empty. A
//! disjunction is fast when every branch is fast. Negations, array
//! sub-filters and join sub-queries are slow.

use std::collections::BTreeSet;

use crate::broker::OrderBy;
use crate::filter::QlExpr;

/// Classifies a compiled user filter (`None` for no filter) against the
/// collection's indexes.
pub fn is_fast_query(indexes: &[Vec<String>], filter: Option<&QlExpr>, order_by: &[OrderBy]) -> bool {
    let order: Vec<&str> = order_by.iter().map(|o| o.path.as_str()).collect();
    match filter {
        None => has_index(indexes, &BTreeSet::new(), &order),
        Some(expr) => is_fast_expr(indexes, expr, &order),
    }
}

fn is_fast_expr(indexes: &[Vec<String>], expr: &QlExpr, order: &[&str]) -> bool {
    if let Some(fields) = conjunction_fields(expr) {
        return has_index(indexes, &fields, order);
    }
    match expr {
        QlExpr::Or(branches) => branches.iter().all(|b| is_fast_expr(indexes, b, order)),
        _ => false,
    }
}

/// Field names constrained by a pure conjunction, or `None` when `expr`
/// contains anything an index cannot serve.
///
/// A disjunction over one field set (`in` expands to one) counts as that set.
fn conjunction_fields(expr: &QlExpr) -> Option<BTreeSet<String>> {
    match expr {
        QlExpr::Compare { path, .. } | QlExpr::InParams { path, .. } => {
            Some(BTreeSet::from([document_field(path)?]))
        }
        QlExpr::ParamIn { path, .. } => {
            Some(BTreeSet::from([format!("{}[*]", document_field(path)?)]))
        }
        QlExpr::And(items) => {
            let mut fields = BTreeSet::new();
            for item in items {
                fields.extend(conjunction_fields(item)?);
            }
            Some(fields)
        }
        QlExpr::Or(items) => {
            let mut branches = items.iter().map(conjunction_fields);
            let first = branches.next()??;
            for branch in branches {
                if branch? != first {
                    return None;
                }
            }
            Some(first)
        }
        _ => None,
    }
}

fn document_field(path: &str) -> Option<String> {
    path.strip_prefix("doc.").map(str::to_string)
}

fn has_index(indexes: &[Vec<String>], fields: &BTreeSet<String>, order: &[&str]) -> bool {
    indexes.iter().any(|index| index_serves(index, fields, order))
}

fn index_serves(index: &[String], fields: &BTreeSet<String>, order: &[&str]) -> bool {
    let min_prefix = if order.is_empty() { 1 } else { 0 };
    for k in min_prefix..=index.len() {
        if !index[..k].iter().all(|f| fields.contains(f)) {
            break;
        }
        let rest = &index[k..];
        if rest.len() >= order.len() && rest.iter().zip(order).all(|(a, b)| a == b) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::SortDirection;
    use crate::filter::BoundParams;
    use crate::schema;
    use serde_json::json;

    fn blocks_indexes() -> Vec<Vec<String>> {
        let mut indexes = schema::declared_indexes("blocks");
        indexes.push(vec!["_key".into()]);
        indexes
    }

    fn compile(filter: serde_json::Value) -> QlExpr {
        schema::types::block_base()
            .ql(&mut BoundParams::new(), "doc", &filter)
            .unwrap()
    }

    fn asc(path: &str) -> OrderBy {
        OrderBy::new(path, SortDirection::Asc)
    }

    #[test]
    fn test_filter_on_index_prefix_is_fast() {
        let indexes = blocks_indexes();
        let expr = compile(json!({"seq_no": {"eq": 1}}));
        assert!(is_fast_query(&indexes, Some(&expr), &[]));

        let expr = compile(json!({"workchain_id": {"eq": -1}, "seq_no": {"gt": 5}}));
        assert!(is_fast_query(&indexes, Some(&expr), &[]));

        let expr = compile(json!({"id": {"in": ["a", "b"]}}));
        assert!(is_fast_query(&indexes, Some(&expr), &[]));
    }

    #[test]
    fn test_filter_outside_indexes_is_slow() {
        let indexes = blocks_indexes();
        let expr = compile(json!({"global_id": {"gt": 1}}));
        assert!(!is_fast_query(&indexes, Some(&expr), &[]));

        let expr = compile(json!({"seq_no": {"notIn": [1, 2]}}));
        assert!(!is_fast_query(&indexes, Some(&expr), &[]));
    }

    #[test]
    fn test_order_must_follow_prefix() {
        let indexes = blocks_indexes();
        let expr = compile(json!({"workchain_id": {"eq": 0}}));
        assert!(is_fast_query(&indexes, Some(&expr), &[asc("seq_no")]));
        assert!(is_fast_query(&indexes, Some(&expr), &[asc("gen_utime")]));
        assert!(!is_fast_query(&indexes, Some(&expr), &[asc("global_id")]));

        assert!(is_fast_query(&indexes, None, &[asc("gen_utime")]));
        assert!(!is_fast_query(&indexes, None, &[]));
    }

    #[test]
    fn test_or_requires_every_branch() {
        let indexes = blocks_indexes();
        let fast = QlExpr::Or(vec![
            compile(json!({"seq_no": {"eq": 1}})),
            compile(json!({"gen_utime": {"gt": 1}})),
        ]);
        assert!(is_fast_query(&indexes, Some(&fast), &[]));

        let slow = QlExpr::Or(vec![
            compile(json!({"seq_no": {"eq": 1}})),
            compile(json!({"global_id": {"gt": 1}})),
        ]);
        assert!(!is_fast_query(&indexes, Some(&slow), &[]));
    }

    #[test]
    fn test_classification_is_deterministic() {
        let indexes = blocks_indexes();
        let expr = compile(json!({"workchain_id": {"eq": 0}, "shard": {"eq": "8000"}}));
        let order = [asc("seq_no")];
        let first = is_fast_query(&indexes, Some(&expr), &order);
        for _ in 0..10 {
            assert_eq!(is_fast_query(&indexes, Some(&expr), &order), first);
        }
        assert!(first);
    }
}
