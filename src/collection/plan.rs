//! Query plans
//!
//! A plan is built once per request: the user filter and the access scope
//! are compiled into one condition, order paths are mapped to physical
//! fields and the limit is clamped. Plans are immutable afterwards.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::access::{access_scope, AccessRights};
use super::errors::QueryResult;
use super::info::CollectionInfo;
use crate::broker::{DataQuery, DataSegment, OrderBy, SortDirection};
use crate::filter::{BoundParams, Condition, QlExpr};

/// Hard upper bound of `LIMIT`
pub const MAX_LIMIT: usize = 50;

static ID_WORD: OnceLock<Option<Regex>> = OnceLock::new();

/// Query arguments as received from the transport
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryArgs {
    pub filter: Option<Value>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
    /// Wait-for timeout in milliseconds; 0 or absent queries once
    pub timeout: Option<u64>,
    pub operation_id: Option<String>,
    pub access_key: Option<String>,
}

impl QueryArgs {
    pub fn with_filter(filter: Value) -> Self {
        Self {
            filter: Some(filter),
            ..Self::default()
        }
    }
}

/// True when `filter` has no keys (or is absent/null)
pub fn is_empty_filter(filter: &Value) -> bool {
    match filter {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// User filter and access scope of one query, compiled with shared params
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledCondition {
    /// `None` for an empty user filter
    pub filter: Option<QlExpr>,
    /// `None` when the request is not account-scoped
    pub scope: Option<QlExpr>,
    pub params: BoundParams,
}

impl CompiledCondition {
    /// Compiles `filter` then the access scope. Returns `None` when either
    /// part is unsatisfiable.
    pub fn build(
        collection: &str,
        doc_type: &Condition,
        filter: &Value,
        rights: &AccessRights,
    ) -> QueryResult<Option<Self>> {
        let mut params = BoundParams::new();
        let filter_expr = if is_empty_filter(filter) {
            None
        } else {
            Some(doc_type.ql(&mut params, "doc", filter)?)
        };
        let scope = access_scope(collection, rights, &mut params);
        let unsatisfiable = filter_expr.as_ref().map_or(false, QlExpr::is_false)
            || scope.as_ref().map_or(false, QlExpr::is_false);
        if unsatisfiable {
            return Ok(None);
        }
        Ok(Some(Self {
            filter: filter_expr,
            scope,
            params,
        }))
    }

    /// `(filter) AND (scope)`, or whichever part exists
    pub fn combined(&self) -> Option<QlExpr> {
        match (&self.filter, &self.scope) {
            (Some(filter), Some(scope)) => Some(QlExpr::And(vec![filter.clone(), scope.clone()])),
            (Some(single), None) | (None, Some(single)) => Some(single.clone()),
            (None, None) => None,
        }
    }

    /// Text of the combined condition; empty when there is none
    pub fn text(&self) -> String {
        self.combined().map(|c| c.to_string()).unwrap_or_default()
    }
}

/// Rewrites the logical `id` field to the physical key in a dotted path.
pub fn physical_order_path(path: &str) -> String {
    let pattern = ID_WORD.get_or_init(|| Regex::new(r"(?i)\bid\b").ok());
    match pattern {
        Some(re) => re.replace_all(path, "_key").into_owned(),
        None => path.to_string(),
    }
}

/// Compiled, immutable query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub collection: String,
    pub segment: DataSegment,
    pub filter: Value,
    pub condition: CompiledCondition,
    /// Order with physical paths
    pub order_by: Vec<OrderBy>,
    pub limit: usize,
    /// Milliseconds; 0 queries once
    pub timeout: u64,
    pub operation_id: Option<String>,
    pub access: AccessRights,
    pub text: String,
}

impl QueryPlan {
    /// Builds the plan; `None` when the condition is unsatisfiable.
    ///
    /// The limit falls back to `default_limit` and is clamped to `max_limit`.
    pub fn build(
        info: &CollectionInfo,
        doc_type: &Condition,
        args: &QueryArgs,
        rights: &AccessRights,
        default_limit: usize,
        max_limit: usize,
    ) -> QueryResult<Option<Self>> {
        let filter = args.filter.clone().unwrap_or_else(|| Value::Object(Map::new()));
        let Some(condition) = CompiledCondition::build(&info.name, doc_type, &filter, rights)? else {
            return Ok(None);
        };
        let order_by: Vec<OrderBy> = args
            .order_by
            .iter()
            .map(|field| OrderBy::new(&physical_order_path(&field.path), field.direction))
            .collect();
        let limit = args.limit.filter(|l| *l > 0).unwrap_or(default_limit).min(max_limit);
        let text = query_text(&info.name, &condition.text(), &order_by, limit);

        Ok(Some(Self {
            collection: info.name.clone(),
            segment: info.segment,
            filter,
            condition,
            order_by,
            limit,
            timeout: args.timeout.unwrap_or(0),
            operation_id: args.operation_id.clone(),
            access: rights.clone(),
            text,
        }))
    }

    pub fn params(&self) -> &Map<String, Value> {
        self.condition.params.values()
    }

    /// Query handed to a data broker
    pub fn data_query(&self) -> DataQuery {
        DataQuery::new(self.segment, self.text.clone(), self.params().clone())
            .with_order(self.order_by.clone())
    }
}

/// `FOR doc IN c [FILTER cond] [SORT doc.a DESC, ...] LIMIT n RETURN doc`
pub fn query_text(collection: &str, condition: &str, order_by: &[OrderBy], limit: usize) -> String {
    let mut text = format!("FOR doc IN {}", collection);
    if !condition.is_empty() {
        text.push_str(" FILTER ");
        text.push_str(condition);
    }
    if !order_by.is_empty() {
        let fields: Vec<String> = order_by
            .iter()
            .map(|field| match field.direction {
                SortDirection::Asc => format!("doc.{}", field.path),
                SortDirection::Desc => format!("doc.{} DESC", field.path),
            })
            .collect();
        text.push_str(" SORT ");
        text.push_str(&fields.join(", "));
    }
    text.push_str(&format!(" LIMIT {} RETURN doc", limit));
    text
}
