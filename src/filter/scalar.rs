//! Scalar comparison operators
//!
//! Shared by plain scalars, big-uint fields and enum names; the latter two
//! only differ in how the filter literal is converted before comparison.

use serde_json::{Map, Value};

use super::errors::{FilterError, FilterResult};
use super::params::BoundParams;
use super::ql::{CompareOp, Connective, QlExpr};
use super::value::{compare_values, values_equal};

/// Kind of a plain scalar field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Number,
    String,
    Boolean,
}

/// Filter operators recognized on scalar fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

impl ScalarOp {
    /// Resolves a filter key; unknown keys yield `None`
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "eq" => Some(ScalarOp::Eq),
            "ne" => Some(ScalarOp::Ne),
            "lt" => Some(ScalarOp::Lt),
            "le" => Some(ScalarOp::Le),
            "gt" => Some(ScalarOp::Gt),
            "ge" => Some(ScalarOp::Ge),
            "in" => Some(ScalarOp::In),
            "notIn" => Some(ScalarOp::NotIn),
            _ => None,
        }
    }

    /// True for operators taking a list of values
    pub fn takes_list(&self) -> bool {
        matches!(self, ScalarOp::In | ScalarOp::NotIn)
    }

    fn compare_op(&self) -> CompareOp {
        match self {
            ScalarOp::Eq | ScalarOp::In | ScalarOp::NotIn => CompareOp::Eq,
            ScalarOp::Ne => CompareOp::Ne,
            ScalarOp::Lt => CompareOp::Lt,
            ScalarOp::Le => CompareOp::Le,
            ScalarOp::Gt => CompareOp::Gt,
            ScalarOp::Ge => CompareOp::Ge,
        }
    }
}

/// Converted operand of a scalar operator
enum Operand {
    Single(Value),
    List(Vec<Value>),
}

fn operand<F>(op: ScalarOp, raw: &Value, convert: &F) -> FilterResult<Operand>
where
    F: Fn(&Value) -> FilterResult<Value>,
{
    if op.takes_list() {
        let items = raw
            .as_array()
            .ok_or_else(|| FilterError::invalid_filter(format!("{:?} expects an array", op)))?;
        Ok(Operand::List(
            items.iter().map(convert).collect::<FilterResult<Vec<_>>>()?,
        ))
    } else {
        Ok(Operand::Single(convert(raw)?))
    }
}

/// Interprets a filter value as an operator object.
pub(crate) fn filter_object(filter: &Value) -> FilterResult<&Map<String, Value>> {
    filter
        .as_object()
        .ok_or_else(|| FilterError::invalid_filter(format!("expected an object, got {}", filter)))
}

/// Compiles scalar operators for the field at `path`.
pub(crate) fn ql_ops<F>(
    params: &mut BoundParams,
    path: &str,
    filter: &Value,
    convert: F,
) -> FilterResult<QlExpr>
where
    F: Fn(&Value) -> FilterResult<Value>,
{
    let mut conditions = Vec::new();
    for (key, raw) in filter_object(filter)? {
        let Some(op) = ScalarOp::from_key(key) else {
            continue;
        };
        let compiled = match operand(op, raw, &convert)? {
            Operand::Single(value) => QlExpr::Compare {
                path: path.to_string(),
                op: op.compare_op(),
                param: params.add(value),
            },
            Operand::List(values) => {
                let alternatives: Vec<QlExpr> = values
                    .into_iter()
                    .map(|value| QlExpr::Compare {
                        path: path.to_string(),
                        op: CompareOp::Eq,
                        param: params.add(value),
                    })
                    .collect();
                let any = QlExpr::combine(alternatives, Connective::Or, QlExpr::False);
                if op == ScalarOp::NotIn {
                    QlExpr::Not(Box::new(any))
                } else {
                    any
                }
            }
        };
        conditions.push(compiled);
    }
    Ok(QlExpr::combine(conditions, Connective::And, QlExpr::False))
}

/// Tests `value` against scalar operators.
pub(crate) fn test_ops<F>(value: &Value, filter: &Value, convert: F) -> FilterResult<bool>
where
    F: Fn(&Value) -> FilterResult<Value>,
{
    test_ops_ordered_on(value, value, filter, convert)
}

/// Like [`test_ops`], with ordered operators comparing `ordered` instead.
pub(crate) fn test_ops_ordered_on<F>(
    value: &Value,
    ordered: &Value,
    filter: &Value,
    convert: F,
) -> FilterResult<bool>
where
    F: Fn(&Value) -> FilterResult<Value>,
{
    let mut matched_any_key = false;
    for (key, raw) in filter_object(filter)? {
        let Some(op) = ScalarOp::from_key(key) else {
            continue;
        };
        matched_any_key = true;
        let passed = match operand(op, raw, &convert)? {
            Operand::Single(expected) => {
                let compare = op.compare_op();
                let lhs = if compare.is_ordered() { ordered } else { value };
                compare.accepts(compare_values(lhs, &expected))
            }
            Operand::List(list) => {
                let member = list.iter().any(|x| values_equal(value, x));
                if op == ScalarOp::NotIn {
                    !member
                } else {
                    member
                }
            }
        };
        if !passed {
            return Ok(false);
        }
    }
    Ok(matched_any_key)
}

/// Identity literal conversion for plain scalars
pub(crate) fn as_is(value: &Value) -> FilterResult<Value> {
    Ok(value.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_in_expands_to_disjunction() {
        let mut params = BoundParams::new();
        let ql = ql_ops(&mut params, "doc.x", &json!({"in": [1, 2]}), as_is).unwrap();
        assert_eq!(ql.to_string(), "(doc.x == @v1) OR (doc.x == @v2)");

        let mut params = BoundParams::new();
        let ql = ql_ops(&mut params, "doc.x", &json!({"notIn": [1]}), as_is).unwrap();
        assert_eq!(ql.to_string(), "NOT (doc.x == @v1)");
    }

    #[test]
    fn test_empty_in_list() {
        let mut params = BoundParams::new();
        let ql = ql_ops(&mut params, "doc.x", &json!({"in": []}), as_is).unwrap();
        assert_eq!(ql, QlExpr::False);
        assert!(!test_ops(&json!(1), &json!({"in": []}), as_is).unwrap());
        assert!(test_ops(&json!(1), &json!({"notIn": []}), as_is).unwrap());
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let mut params = BoundParams::new();
        let ql = ql_ops(&mut params, "doc.x", &json!({"eq": 1, "like": "a"}), as_is).unwrap();
        assert_eq!(ql.to_string(), "doc.x == @v1");
        assert!(test_ops(&json!(1), &json!({"eq": 1, "like": "a"}), as_is).unwrap());
        assert!(!test_ops(&json!(1), &json!({"like": "a"}), as_is).unwrap());
    }

    #[test]
    fn test_in_requires_array() {
        let err = test_ops(&json!(1), &json!({"in": 1}), as_is).unwrap_err();
        assert_eq!(err.code(), "FILTER_INVALID");
    }
}
