//! Aggregation helpers and combined query construction
//!
//! Each requested `FieldAggregation` resolves into an `AggregationHelper`: a
//! context (field, function, big-int prefix, array-ness), a query builder and
//! a result converter. Helper `i` owns the accumulators `a<i>`, `b<i>`, `c<i>`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::bigint;
use super::errors::{AggregationError, AggregationResult};
use super::fields::{ScalarField, ScalarFieldMap, ScalarType};
use crate::filter::decode_big_uint;

/// Aggregation functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregationFn {
    Count,
    Min,
    Max,
    Sum,
    Average,
}

impl AggregationFn {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationFn::Count => "COUNT",
            AggregationFn::Min => "MIN",
            AggregationFn::Max => "MAX",
            AggregationFn::Sum => "SUM",
            AggregationFn::Average => "AVERAGE",
        }
    }
}

/// One requested aggregation; `field` defaults to `id`, `fn` to COUNT
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldAggregation {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default, rename = "fn")]
    pub function: Option<AggregationFn>,
}

impl FieldAggregation {
    pub fn new(field: &str, function: AggregationFn) -> Self {
        Self {
            field: Some(field.to_string()),
            function: Some(function),
        }
    }

    pub fn count() -> Self {
        Self {
            field: None,
            function: Some(AggregationFn::Count),
        }
    }

    pub fn function(&self) -> AggregationFn {
        self.function.unwrap_or(AggregationFn::Count)
    }
}

/// Resolved state shared by a helper's builder and converter
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationContext {
    pub index: usize,
    pub field: ScalarField,
    pub function: AggregationFn,
    pub big_int_prefix: usize,
    pub is_array: bool,
}

/// How a helper contributes to `COLLECT AGGREGATE`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryBuilder {
    Count,
    Simple,
    BigIntSum,
    BigIntAverage,
}

/// How a helper's raw column is converted back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultConverter {
    None,
    BigIntString,
    BigIntParts,
    BigIntPartsAverage,
}

/// Collect clause and result expression of one helper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParts {
    pub collect: String,
    pub result: String,
}

const ACCUMULATORS: [char; 3] = ['a', 'b', 'c'];

fn query_parts(index: usize, exprs: &[String]) -> QueryParts {
    let var = |i: usize| format!("{}{}", ACCUMULATORS[i], index);
    let collect = exprs
        .iter()
        .enumerate()
        .map(|(i, x)| format!("{} = {}", var(i), x))
        .collect::<Vec<_>>()
        .join(", ");
    let result = if exprs.len() == 1 {
        var(0)
    } else {
        let fields = (0..exprs.len())
            .map(|i| format!("{}: {}", ACCUMULATORS[i], var(i)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{{ {} }}", fields)
    };
    QueryParts { collect, result }
}

/// Per-field aggregation helper
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationHelper {
    pub context: AggregationContext,
    pub builder: QueryBuilder,
    pub converter: ResultConverter,
}

impl AggregationHelper {
    /// Resolves `aggregation` against the field map of `collection`.
    pub fn create(
        fields: &ScalarFieldMap,
        collection: &str,
        index: usize,
        aggregation: &FieldAggregation,
    ) -> AggregationResult<Self> {
        let name = aggregation.field.as_deref().unwrap_or("id");
        let field = fields
            .get(collection, name)
            .cloned()
            .unwrap_or_else(ScalarField::count_only);
        let function = aggregation.function();
        let context = AggregationContext {
            index,
            big_int_prefix: field.ty.big_int_prefix(),
            is_array: field.is_array(),
            field,
            function,
        };
        let helper = |builder, converter| {
            Ok(AggregationHelper {
                context: context.clone(),
                builder,
                converter,
            })
        };

        if function == AggregationFn::Count {
            return helper(QueryBuilder::Count, ResultConverter::None);
        }
        let requested = aggregation.field.clone().unwrap_or_default();
        if context.field.path.is_empty() {
            return Err(AggregationError::NotAggregatable { field: requested });
        }
        if matches!(function, AggregationFn::Min | AggregationFn::Max) {
            let converter = if context.big_int_prefix > 0 {
                ResultConverter::BigIntString
            } else {
                ResultConverter::None
            };
            return helper(QueryBuilder::Simple, converter);
        }
        if context.field.ty == ScalarType::Number {
            return helper(QueryBuilder::Simple, ResultConverter::None);
        }
        if context.big_int_prefix > 0 {
            return if function == AggregationFn::Average {
                helper(QueryBuilder::BigIntAverage, ResultConverter::BigIntPartsAverage)
            } else {
                helper(QueryBuilder::BigIntSum, ResultConverter::BigIntParts)
            };
        }
        Err(AggregationError::UnsupportedFunction {
            field: requested,
            function: function.as_str().to_string(),
        })
    }

    fn big_int_sum_expr(&self, part: fn(&str, usize) -> String) -> String {
        let ctx = &self.context;
        if ctx.is_array {
            format!(
                "SUM(SUM(({})[* RETURN {}]))",
                ctx.field.path,
                part("CURRENT", ctx.big_int_prefix)
            )
        } else {
            format!("SUM({})", part(&ctx.field.path, ctx.big_int_prefix))
        }
    }

    /// Collect and result parts of this helper.
    pub fn query_parts(&self) -> QueryParts {
        let ctx = &self.context;
        let exprs = match self.builder {
            QueryBuilder::Count => vec!["COUNT(doc)".to_string()],
            QueryBuilder::Simple => {
                let f = ctx.function.as_str();
                if ctx.is_array {
                    vec![format!("{}({}({}))", f, f, ctx.field.path)]
                } else {
                    vec![format!("{}({})", f, ctx.field.path)]
                }
            }
            QueryBuilder::BigIntSum => vec![
                self.big_int_sum_expr(bigint::hi_part_expr),
                self.big_int_sum_expr(bigint::lo_part_expr),
            ],
            QueryBuilder::BigIntAverage => vec![
                self.big_int_sum_expr(bigint::hi_part_expr),
                self.big_int_sum_expr(bigint::lo_part_expr),
                if ctx.is_array {
                    format!("SUM(COUNT({}))", ctx.field.path)
                } else {
                    "COUNT(doc)".to_string()
                },
            ],
        };
        query_parts(ctx.index, &exprs)
    }

    /// Converts this helper's raw result column.
    pub fn convert_result(&self, value: &Value) -> AggregationResult<Value> {
        match self.converter {
            ResultConverter::None => Ok(value.clone()),
            ResultConverter::BigIntString => match value {
                Value::Number(_) => Ok(Value::String(number_to_string(value)?)),
                _ => {
                    let n = decode_big_uint(self.context.big_int_prefix, value)
                        .map_err(|e| AggregationError::InvalidResult(e.to_string()))?;
                    Ok(Value::String(n.to_string()))
                }
            },
            ResultConverter::BigIntParts => {
                let sum = bigint::reconstruct(part(value, "a"), part(value, "b"))?;
                Ok(Value::String(sum.to_string()))
            }
            ResultConverter::BigIntPartsAverage => {
                let sum = bigint::reconstruct(part(value, "a"), part(value, "b"))?;
                let avg = bigint::average(sum, part(value, "c"))?;
                Ok(Value::String(avg.to_string()))
            }
        }
    }

    /// Short human-readable description used by explain output
    pub fn describe(&self) -> String {
        format!(
            "{}({}) {:?}/{:?}",
            self.context.function.as_str(),
            if self.context.field.path.is_empty() {
                "doc"
            } else {
                self.context.field.path.as_str()
            },
            self.builder,
            self.converter
        )
    }
}

fn part<'a>(value: &'a Value, name: &str) -> &'a Value {
    value.get(name).unwrap_or(&Value::Null)
}

fn number_to_string(value: &Value) -> AggregationResult<String> {
    if let Some(u) = value.as_u64() {
        return Ok(u.to_string());
    }
    if let Some(i) = value.as_i64() {
        return Ok(i.to_string());
    }
    match value.as_f64() {
        Some(f) if f.fract() == 0.0 && f.is_finite() => Ok(format!("{:.0}", f)),
        Some(f) => Ok(f.to_string()),
        None => Err(AggregationError::InvalidResult(value.to_string())),
    }
}

/// Combined aggregation query and its helpers
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationQuery {
    pub text: String,
    pub helpers: Vec<AggregationHelper>,
}

impl AggregationQuery {
    /// Builds one query for all `fields`; an empty list means one COUNT.
    pub fn build(
        field_map: &ScalarFieldMap,
        collection: &str,
        filter: Option<&str>,
        fields: &[FieldAggregation],
    ) -> AggregationResult<Self> {
        let default_fields = [FieldAggregation::count()];
        let fields = if fields.is_empty() {
            &default_fields[..]
        } else {
            fields
        };
        let helpers = fields
            .iter()
            .enumerate()
            .map(|(i, aggregation)| AggregationHelper::create(field_map, collection, i, aggregation))
            .collect::<AggregationResult<Vec<_>>>()?;

        let filter_section = match filter {
            Some(condition) if !condition.is_empty() => format!(" FILTER {}", condition),
            _ => String::new(),
        };
        let is_single_count = fields.len() == 1 && fields[0].function() == AggregationFn::Count;
        let text = if is_single_count {
            if filter_section.is_empty() {
                format!("RETURN [LENGTH({})]", collection)
            } else {
                format!(
                    "FOR doc IN {}{} COLLECT WITH COUNT INTO a0 RETURN [a0]",
                    collection, filter_section
                )
            }
        } else {
            let parts: Vec<QueryParts> = helpers.iter().map(|h| h.query_parts()).collect();
            format!(
                "FOR doc IN {}{} COLLECT AGGREGATE {} RETURN [{}]",
                collection,
                filter_section,
                parts
                    .iter()
                    .map(|p| p.collect.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                parts
                    .iter()
                    .map(|p| p.result.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        };
        Ok(Self { text, helpers })
    }

    /// Converts the store's result row; null columns pass through.
    pub fn convert_results(&self, row: &[Value]) -> AggregationResult<Vec<Value>> {
        row.iter()
            .enumerate()
            .map(|(i, value)| match (value, self.helpers.get(i)) {
                (Value::Null, _) | (_, None) => Ok(value.clone()),
                (_, Some(helper)) => helper.convert_result(value),
            })
            .collect()
    }
}
