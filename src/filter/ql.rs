//! Query-language boolean expressions
//!
//! Conditions compile into a `QlExpr` tree instead of raw strings. The tree
//! renders to the store's query text via `Display` and can be evaluated
//! against a single in-memory document, which is how compiled conditions are
//! checked against the in-memory `test` predicates.

use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

use super::errors::{FilterError, FilterResult};
use super::params::BoundParams;
use super::value::{compare_values, to_ql_string, value_at_path, values_equal};

/// Variable bound to the current array item inside `[* FILTER ...]`
pub const CURRENT: &str = "CURRENT";

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Operator text
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    /// True for `<`, `<=`, `>`, `>=`
    pub fn is_ordered(&self) -> bool {
        !matches!(self, CompareOp::Eq | CompareOp::Ne)
    }

    /// Applies the operator to an ordering of `lhs` relative to `rhs`
    pub fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

/// Logical connective used when combining conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

/// Compiled boolean expression
#[derive(Debug, Clone, PartialEq)]
pub enum QlExpr {
    /// Unsatisfiable sentinel (`false`)
    False,
    /// `path op @param`
    Compare {
        path: String,
        op: CompareOp,
        param: String,
    },
    /// Parenthesized conjunction of two or more expressions
    And(Vec<QlExpr>),
    /// Parenthesized disjunction of two or more expressions
    Or(Vec<QlExpr>),
    /// `NOT (expr)`
    Not(Box<QlExpr>),
    /// Every item of the array at `path` satisfies `item`
    ArrayAll { path: String, item: Box<QlExpr> },
    /// At least one item of the array at `path` satisfies `item`
    ArrayAny { path: String, item: Box<QlExpr> },
    /// `@param IN path[*]`
    ParamIn { param: String, path: String },
    /// `path IN [@p1,@p2,...]`
    InParams { path: String, params: Vec<String> },
    /// Existence sub-query over another collection keyed by `on_path`
    Join {
        alias: String,
        on_path: String,
        collection: String,
        condition: Box<QlExpr>,
    },
    /// Sub-query over another collection keyed by the array at `on_path`
    JoinArray {
        alias: String,
        on_path: String,
        collection: String,
        condition: Box<QlExpr>,
        all: bool,
    },
}

impl QlExpr {
    /// Combines conditions: none → `default`, one → itself, more → connective.
    pub fn combine(mut conditions: Vec<QlExpr>, connective: Connective, default: QlExpr) -> QlExpr {
        match conditions.len() {
            0 => default,
            1 => conditions.remove(0),
            _ => match connective {
                Connective::And => QlExpr::And(conditions),
                Connective::Or => QlExpr::Or(conditions),
            },
        }
    }

    /// True for the unsatisfiable sentinel
    pub fn is_false(&self) -> bool {
        matches!(self, QlExpr::False)
    }

    /// Evaluates the expression against `doc` bound as the `doc` variable.
    pub fn evaluate(&self, doc: &Value, params: &BoundParams) -> FilterResult<bool> {
        self.evaluate_in(&Scope::new("doc", doc), params)
    }

    /// Evaluates the expression against `value` bound under `variable`.
    pub fn evaluate_as(&self, variable: &str, value: &Value, params: &BoundParams) -> FilterResult<bool> {
        self.evaluate_in(&Scope::new(variable, value), params)
    }

    fn evaluate_in(&self, scope: &Scope<'_>, params: &BoundParams) -> FilterResult<bool> {
        match self {
            QlExpr::False => Ok(false),
            QlExpr::Compare { path, op, param } => {
                let lhs = scope.resolve(path)?;
                let rhs = bound(params, param)?;
                let ordering = if is_key_ordered(path, *op) {
                    compare_values(&to_ql_string(lhs), rhs)
                } else {
                    compare_values(lhs, rhs)
                };
                Ok(op.accepts(ordering))
            }
            QlExpr::And(items) => {
                for item in items {
                    if !item.evaluate_in(scope, params)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            QlExpr::Or(items) => {
                for item in items {
                    if item.evaluate_in(scope, params)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            QlExpr::Not(inner) => Ok(!inner.evaluate_in(scope, params)?),
            QlExpr::ArrayAll { path, item } => {
                let items = array_items(scope.resolve(path)?);
                for value in items {
                    if !item.evaluate_in(&scope.with(CURRENT, value), params)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            QlExpr::ArrayAny { path, item } => {
                let items = array_items(scope.resolve(path)?);
                for value in items {
                    if item.evaluate_in(&scope.with(CURRENT, value), params)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            QlExpr::ParamIn { param, path } => {
                let needle = bound(params, param)?;
                Ok(array_items(scope.resolve(path)?)
                    .iter()
                    .any(|x| values_equal(x, needle)))
            }
            QlExpr::InParams { path, params: names } => {
                let value = scope.resolve(path)?;
                for name in names {
                    if values_equal(value, bound(params, name)?) {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            QlExpr::Join { collection, .. } | QlExpr::JoinArray { collection, .. } => Err(
                FilterError::NotEvaluable(format!("sub-query over {}", collection)),
            ),
        }
    }

    /// Visits `self` and every nested expression, parents first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a QlExpr)) {
        visit(self);
        match self {
            QlExpr::And(items) | QlExpr::Or(items) => {
                items.iter().for_each(|x| x.walk(visit));
            }
            QlExpr::Not(inner)
            | QlExpr::ArrayAll { item: inner, .. }
            | QlExpr::ArrayAny { item: inner, .. }
            | QlExpr::Join { condition: inner, .. }
            | QlExpr::JoinArray { condition: inner, .. } => inner.walk(visit),
            _ => {}
        }
    }
}

fn is_key_ordered(path: &str, op: CompareOp) -> bool {
    op.is_ordered() && path.ends_with("._key")
}

fn bound<'p>(params: &'p BoundParams, name: &str) -> FilterResult<&'p Value> {
    params
        .get(name)
        .ok_or_else(|| FilterError::UnknownParam(name.to_string()))
}

fn array_items(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        _ => &[],
    }
}

/// Variable bindings visible to an expression; inner bindings shadow outer
#[derive(Debug, Clone)]
struct Scope<'a> {
    vars: Vec<(&'a str, &'a Value)>,
}

impl<'a> Scope<'a> {
    fn new(name: &'a str, value: &'a Value) -> Self {
        Self {
            vars: vec![(name, value)],
        }
    }

    fn with(&self, name: &'a str, value: &'a Value) -> Scope<'a> {
        let mut vars = self.vars.clone();
        vars.push((name, value));
        Scope { vars }
    }

    fn resolve(&self, path: &str) -> FilterResult<&'a Value> {
        let mut segments = path.split('.');
        let root = segments.next().unwrap_or_default();
        let value = self
            .vars
            .iter()
            .rev()
            .find(|(name, _)| *name == root)
            .map(|(_, value)| *value)
            .ok_or_else(|| FilterError::NotEvaluable(format!("unbound variable {}", root)))?;
        Ok(value_at_path(value, segments))
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[QlExpr], op: &str) -> fmt::Result {
    match items {
        [] => write!(f, "false"),
        [single] => write!(f, "{}", single),
        _ => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, " {} ", op)?;
                }
                write!(f, "({})", item)?;
            }
            Ok(())
        }
    }
}

impl fmt::Display for QlExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QlExpr::False => write!(f, "false"),
            QlExpr::Compare { path, op, param } => {
                if is_key_ordered(path, *op) {
                    write!(f, "TO_STRING({}) {} @{}", path, op.as_str(), param)
                } else {
                    write!(f, "{} {} @{}", path, op.as_str(), param)
                }
            }
            QlExpr::And(items) => write_joined(f, items, "AND"),
            QlExpr::Or(items) => write_joined(f, items, "OR"),
            QlExpr::Not(inner) => write!(f, "NOT ({})", inner),
            QlExpr::ArrayAll { path, item } => {
                write!(f, "LENGTH({}[* FILTER {}]) == LENGTH({})", path, item, path)
            }
            QlExpr::ArrayAny { path, item } => {
                write!(f, "LENGTH({}[* FILTER {}]) > 0", path, item)
            }
            QlExpr::ParamIn { param, path } => write!(f, "@{} IN {}[*]", param, path),
            QlExpr::InParams { path, params } => {
                let list: Vec<String> = params.iter().map(|p| format!("@{}", p)).collect();
                write!(f, "{} IN [{}]", path, list.join(","))
            }
            QlExpr::Join {
                alias,
                on_path,
                collection,
                condition,
            } => write!(
                f,
                "LENGTH(FOR {alias} IN {collection} FILTER ({alias}._key == {on_path}) AND ({condition}) LIMIT 1 RETURN 1) > 0",
            ),
            QlExpr::JoinArray {
                alias,
                on_path,
                collection,
                condition,
                all,
            } => {
                let limit = if *all { "" } else { "LIMIT 1 " };
                let expected = if *all {
                    format!("== LENGTH({})", on_path)
                } else {
                    "> 0".to_string()
                };
                write!(
                    f,
                    "(LENGTH({on_path}) > 0) AND (LENGTH(FOR {alias} IN {collection} FILTER ({alias}._key IN {on_path}) AND ({condition}) {limit}RETURN 1) {expected})",
                )
            }
        }
    }
}
