//! Field type conditions
//!
//! A `Condition` describes how one field type is filtered. Every variant
//! compiles a filter into a `QlExpr` (`ql`) and tests the same filter against
//! an in-memory value (`test`); both accept identical filter shapes and agree
//! on every input, with join sub-queries as the one exception.
//!
//! Filter shapes:
//! - scalar, big-uint, enum name: `{eq, ne, lt, le, gt, ge, in, notIn}`
//! - struct: `{field: <field filter>, ...}`
//! - array: `{all: <item filter>}` / `{any: <item filter>}`
//! - join array: `{all: <ref filter>}` / `{any: <ref filter>}`
//!
//! Unknown keys are ignored. A filter with no recognized keys compiles to
//! `false` and tests false.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;

use super::biguint::convert_big_uint;
use super::errors::{FilterError, FilterResult};
use super::params::BoundParams;
use super::ql::{CompareOp, Connective, QlExpr, CURRENT};
use super::scalar::{as_is, filter_object, ql_ops, test_ops, test_ops_ordered_on, ScalarKind};
use super::value::{to_ql_string, value_at_path};

/// Physical primary-key field of a collection document
pub const KEY_FIELD: &str = "_key";

/// Filterable field type
#[derive(Debug, Clone)]
pub enum Condition {
    /// Plain scalar compared as stored
    Scalar(ScalarKind),
    /// Unsigned integer stored with the order-preserving hex encoding
    BigUInt(usize),
    /// Object with named fields; a collection root maps `id` to `_key`
    Struct {
        fields: BTreeMap<String, Condition>,
        is_collection: bool,
    },
    /// Array of items of one type
    Array(Box<Condition>),
    /// Name of an enum whose numeric value is stored in the sibling `on_field`
    EnumName {
        on_field: String,
        values: BTreeMap<String, i64>,
    },
    /// Reference to a document of another collection through `on_field`
    Join {
        on_field: String,
        ref_collection: String,
        ref_type: Arc<Condition>,
    },
    /// References to documents of another collection through the array `on_field`
    JoinArray {
        on_field: String,
        ref_collection: String,
        ref_type: Arc<Condition>,
    },
}

fn field_path(path: &str, key: &str) -> String {
    if key.is_empty() {
        path.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

/// Replaces the last segment of `path` with `field`.
fn sibling_path(path: &str, field: &str) -> String {
    match path.rsplit_once('.') {
        Some((parent, _)) => format!("{}.{}", parent, field),
        None => field.to_string(),
    }
}

fn physical_name(key: &str, is_collection: bool) -> &str {
    if is_collection && key == "id" {
        KEY_FIELD
    } else {
        key
    }
}

fn array_items(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        _ => &[],
    }
}

impl Condition {
    pub fn number() -> Self {
        Condition::Scalar(ScalarKind::Number)
    }

    pub fn string() -> Self {
        Condition::Scalar(ScalarKind::String)
    }

    pub fn boolean() -> Self {
        Condition::Scalar(ScalarKind::Boolean)
    }

    /// Nested object type
    pub fn structure<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Condition)>,
        S: Into<String>,
    {
        Condition::Struct {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            is_collection: false,
        }
    }

    /// Collection document type (`id` filters `_key`)
    pub fn collection<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Condition)>,
        S: Into<String>,
    {
        Condition::Struct {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            is_collection: true,
        }
    }

    pub fn array(item: Condition) -> Self {
        Condition::Array(Box::new(item))
    }

    pub fn enum_name(on_field: &str, values: &[(&str, i64)]) -> Self {
        Condition::EnumName {
            on_field: on_field.to_string(),
            values: values.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    pub fn join(on_field: &str, ref_collection: &str, ref_type: Arc<Condition>) -> Self {
        Condition::Join {
            on_field: on_field.to_string(),
            ref_collection: ref_collection.to_string(),
            ref_type,
        }
    }

    pub fn join_array(on_field: &str, ref_collection: &str, ref_type: Arc<Condition>) -> Self {
        Condition::JoinArray {
            on_field: on_field.to_string(),
            ref_collection: ref_collection.to_string(),
            ref_type,
        }
    }

    /// Compiles `filter` for the field at `path`.
    pub fn ql(&self, params: &mut BoundParams, path: &str, filter: &Value) -> FilterResult<QlExpr> {
        match self {
            Condition::Scalar(_) => ql_ops(params, path, filter, as_is),
            Condition::BigUInt(prefix) => {
                ql_ops(params, path, filter, |v| convert_big_uint(*prefix, v))
            }
            Condition::Struct {
                fields,
                is_collection,
            } => {
                let mut conditions = Vec::new();
                for (key, sub_filter) in filter_object(filter)? {
                    let Some(field) = fields.get(key) else {
                        continue;
                    };
                    let name = physical_name(key, *is_collection);
                    conditions.push(field.ql(params, &field_path(path, name), sub_filter)?);
                }
                Ok(QlExpr::combine(conditions, Connective::And, QlExpr::False))
            }
            Condition::Array(item) => {
                let mut conditions = Vec::new();
                for (key, item_filter) in filter_object(filter)? {
                    match key.as_str() {
                        "all" => {
                            let item_ql = item.ql(params, CURRENT, item_filter)?;
                            conditions.push(QlExpr::ArrayAll {
                                path: path.to_string(),
                                item: Box::new(item_ql),
                            });
                        }
                        "any" => {
                            let next = params.peek_next_name();
                            let item_ql = item.ql(params, CURRENT, item_filter)?;
                            conditions.push(any_membership(path, next, item_ql));
                        }
                        _ => {}
                    }
                }
                Ok(QlExpr::combine(conditions, Connective::And, QlExpr::False))
            }
            Condition::EnumName { on_field, values } => {
                let on_path = sibling_path(path, on_field);
                ql_ops(params, &on_path, filter, |v| resolve_enum_value(on_field, values, v))
            }
            Condition::Join {
                on_field,
                ref_collection,
                ref_type,
            } => {
                let on_path = sibling_path(path, on_field);
                let alias = on_path.replacen('.', "_", 1);
                let condition = ref_type.ql(params, &alias, filter)?;
                Ok(QlExpr::Join {
                    alias,
                    on_path,
                    collection: ref_collection.clone(),
                    condition: Box::new(condition),
                })
            }
            Condition::JoinArray {
                on_field,
                ref_collection,
                ref_type,
            } => {
                let Some((all, ref_filter)) = join_array_filter(filter)? else {
                    return Ok(QlExpr::False);
                };
                let on_path = sibling_path(path, on_field);
                let alias = on_path.replacen('.', "_", 1);
                let condition = ref_type.ql(params, &alias, ref_filter)?;
                Ok(QlExpr::JoinArray {
                    alias,
                    on_path,
                    collection: ref_collection.clone(),
                    condition: Box::new(condition),
                    all,
                })
            }
        }
    }

    /// Tests `value` (a field of `parent`) against `filter`.
    pub fn test(&self, parent: &Value, value: &Value, filter: &Value) -> FilterResult<bool> {
        match self {
            Condition::Scalar(_) => test_ops(value, filter, as_is),
            Condition::BigUInt(prefix) => {
                test_ops(value, filter, |v| convert_big_uint(*prefix, v))
            }
            Condition::Struct {
                fields,
                is_collection,
            } => {
                let mut matched_any_key = false;
                for (key, sub_filter) in filter_object(filter)? {
                    let Some(field) = fields.get(key) else {
                        continue;
                    };
                    matched_any_key = true;
                    let name = physical_name(key, *is_collection);
                    let child = value_at_path(value, [name]);
                    let passed = match field {
                        // ordered key comparisons run on TO_STRING(_key)
                        Condition::Scalar(_) if name == KEY_FIELD => {
                            test_ops_ordered_on(child, &to_ql_string(child), sub_filter, as_is)?
                        }
                        _ => field.test(value, child, sub_filter)?,
                    };
                    if !passed {
                        return Ok(false);
                    }
                }
                Ok(matched_any_key)
            }
            Condition::Array(item) => {
                let items = array_items(value);
                let mut matched_any_key = false;
                for (key, item_filter) in filter_object(filter)? {
                    let passed = match key.as_str() {
                        "all" => {
                            let mut all = true;
                            for x in items {
                                if !item.test(parent, x, item_filter)? {
                                    all = false;
                                    break;
                                }
                            }
                            all
                        }
                        "any" => {
                            let mut any = false;
                            for x in items {
                                if item.test(parent, x, item_filter)? {
                                    any = true;
                                    break;
                                }
                            }
                            any
                        }
                        _ => continue,
                    };
                    matched_any_key = true;
                    if !passed {
                        return Ok(false);
                    }
                }
                Ok(matched_any_key)
            }
            Condition::EnumName { on_field, values } => {
                let stored = value_at_path(parent, [on_field.as_str()]);
                test_ops(stored, filter, |v| resolve_enum_value(on_field, values, v))
            }
            Condition::Join { ref_type, .. } => ref_type.test(parent, value, filter),
            Condition::JoinArray { ref_type, .. } => match join_array_filter(filter)? {
                Some((_, ref_filter)) => ref_type.test(parent, value, ref_filter),
                None => Ok(false),
            },
        }
    }

    /// Tests a whole collection document.
    pub fn test_document(&self, doc: &Value, filter: &Value) -> FilterResult<bool> {
        self.test(&Value::Null, doc, filter)
    }

    /// Named fields of a struct type
    pub fn fields(&self) -> Option<&BTreeMap<String, Condition>> {
        match self {
            Condition::Struct { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Resolver for output formatting of an enum name field
    pub fn enum_resolver(&self) -> Option<EnumNameResolver> {
        match self {
            Condition::EnumName { on_field, values } => {
                Some(EnumNameResolver::new(on_field, values))
            }
            _ => None,
        }
    }
}

/// `any` over an array compiles to plain membership when the item
/// condition is a single equality against the next bound parameter.
fn any_membership(path: &str, next: String, item_ql: QlExpr) -> QlExpr {
    match &item_ql {
        QlExpr::Compare {
            path: item_path,
            op: CompareOp::Eq,
            param,
        } if item_path == CURRENT && *param == next => QlExpr::ParamIn {
            param: next,
            path: path.to_string(),
        },
        _ => QlExpr::ArrayAny {
            path: path.to_string(),
            item: Box::new(item_ql),
        },
    }
}

fn join_array_filter(filter: &Value) -> FilterResult<Option<(bool, &Value)>> {
    let object = filter_object(filter)?;
    Ok(match (object.get("all"), object.get("any")) {
        (Some(all), _) => Some((true, all)),
        (None, Some(any)) => Some((false, any)),
        (None, None) => None,
    })
}

fn resolve_enum_value(
    on_field: &str,
    values: &BTreeMap<String, i64>,
    name: &Value,
) -> FilterResult<Value> {
    let name = match name {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    values
        .get(&name)
        .map(|v| Value::from(*v))
        .ok_or_else(|| FilterError::InvalidEnumName {
            field: on_field.to_string(),
            name,
        })
}

/// Maps a stored enum value back to its name
#[derive(Debug, Clone)]
pub struct EnumNameResolver {
    on_field: String,
    names: HashMap<i64, String>,
}

impl EnumNameResolver {
    pub fn new(on_field: &str, values: &BTreeMap<String, i64>) -> Self {
        Self {
            on_field: on_field.to_string(),
            names: values.iter().map(|(name, v)| (*v, name.clone())).collect(),
        }
    }

    /// Name of `parent[on_field]`, if it is a known value
    pub fn resolve(&self, parent: &Value) -> Option<&str> {
        let value = value_at_path(parent, [self.on_field.as_str()]).as_i64()?;
        self.names.get(&value).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn account_type() -> Condition {
        Condition::collection([
            ("id", Condition::string()),
            ("balance", Condition::BigUInt(2)),
            ("acc_type", Condition::number()),
            (
                "acc_type_name",
                Condition::enum_name("acc_type", &[("Uninit", 0), ("Active", 1), ("Frozen", 2)]),
            ),
            ("tags", Condition::array(Condition::string())),
        ])
    }

    fn compile(ty: &Condition, filter: Value) -> (QlExpr, BoundParams) {
        let mut params = BoundParams::new();
        let ql = ty.ql(&mut params, "doc", &filter).unwrap();
        (ql, params)
    }

    #[test]
    fn test_id_maps_to_key() {
        let (ql, params) = compile(&account_type(), json!({"id": {"eq": "a"}}));
        assert_eq!(ql.to_string(), "doc._key == @v1");
        assert_eq!(params.get("v1"), Some(&json!("a")));
        assert!(account_type()
            .test_document(&json!({"_key": "a"}), &json!({"id": {"eq": "a"}}))
            .unwrap());
    }

    #[test]
    fn test_ordered_key_compares_as_string() {
        let ty = account_type();
        let docs = [json!({"_key": 5}), json!({"acc_type": 1}), json!({"_key": "b"})];
        let filters = [
            json!({"id": {"gt": "4"}}),
            json!({"id": {"ge": ""}}),
            json!({"id": {"lt": "a"}}),
            json!({"id": {"eq": "5"}}),
        ];
        for filter in &filters {
            let (ql, params) = compile(&ty, filter.clone());
            for doc in &docs {
                assert_eq!(
                    ql.evaluate(doc, &params).unwrap(),
                    ty.test_document(doc, filter).unwrap(),
                    "filter {} on {}",
                    filter,
                    doc
                );
            }
        }
        assert!(ty.test_document(&json!({"_key": 5}), &json!({"id": {"gt": "4"}})).unwrap());
        assert!(ty.test_document(&json!({"acc_type": 1}), &json!({"id": {"ge": ""}})).unwrap());
        assert!(!ty.test_document(&json!({"_key": 5}), &json!({"id": {"eq": "5"}})).unwrap());
    }

    #[test]
    fn test_key_ordered_comparison() {
        let (ql, _) = compile(&account_type(), json!({"id": {"gt": "a"}}));
        assert_eq!(ql.to_string(), "TO_STRING(doc._key) > @v1");
    }

    #[test]
    fn test_enum_name_compiles_on_sibling_field() {
        let (ql, params) = compile(&account_type(), json!({"acc_type_name": {"eq": "Active"}}));
        assert_eq!(ql.to_string(), "doc.acc_type == @v1");
        assert_eq!(params.get("v1"), Some(&json!(1)));

        let doc = json!({"acc_type": 1});
        let filter = json!({"acc_type_name": {"in": ["Active", "Frozen"]}});
        assert!(account_type().test_document(&doc, &filter).unwrap());
    }

    #[test]
    fn test_enum_name_rejects_unknown_name() {
        let mut params = BoundParams::new();
        let err = account_type()
            .ql(&mut params, "doc", &json!({"acc_type_name": {"eq": "Bogus"}}))
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid value [Bogus] for acc_type_name");
    }

    #[test]
    fn test_enum_resolver() {
        let ty = Condition::enum_name("acc_type", &[("Uninit", 0), ("Active", 1)]);
        let resolver = ty.enum_resolver().unwrap();
        assert_eq!(resolver.resolve(&json!({"acc_type": 1})), Some("Active"));
        assert_eq!(resolver.resolve(&json!({"acc_type": 7})), None);
        assert_eq!(resolver.resolve(&json!({})), None);
    }

    #[test]
    fn test_big_uint_filter_literal_is_encoded() {
        let (ql, params) = compile(&account_type(), json!({"balance": {"gt": "0x05"}}));
        assert_eq!(ql.to_string(), "doc.balance > @v1");
        assert_eq!(params.get("v1"), Some(&json!("015")));
        assert!(account_type()
            .test_document(&json!({"balance": "01a"}), &json!({"balance": {"gt": 5}}))
            .unwrap());
    }

    #[test]
    fn test_array_any_equality_uses_membership() {
        let (ql, _) = compile(&account_type(), json!({"tags": {"any": {"eq": "x"}}}));
        assert_eq!(ql.to_string(), "@v1 IN doc.tags[*]");

        let (ql, _) = compile(&account_type(), json!({"tags": {"any": {"gt": "x"}}}));
        assert_eq!(ql.to_string(), "LENGTH(doc.tags[* FILTER CURRENT > @v1]) > 0");
    }

    #[test]
    fn test_empty_and_unknown_filters_are_false() {
        let ty = account_type();
        let doc = json!({"_key": "a"});
        for filter in [json!({}), json!({"nope": {"eq": 1}}), json!({"id": {}})] {
            let (ql, params) = compile(&ty, filter.clone());
            assert_eq!(ql, QlExpr::False);
            assert!(!ql.evaluate(&doc, &params).unwrap());
            assert!(!ty.test_document(&doc, &filter).unwrap());
        }
    }

    #[test]
    fn test_compiled_and_in_memory_agree() {
        let ty = account_type();
        let docs = [
            json!({"_key": "a", "acc_type": 1, "tags": ["x", "y"], "balance": "015"}),
            json!({"_key": "b", "acc_type": 2, "tags": []}),
            json!({"_key": "c"}),
        ];
        let filters = [
            json!({"acc_type": {"ge": 1}, "tags": {"all": {"ne": "z"}}}),
            json!({"tags": {"any": {"eq": "y"}}}),
            json!({"balance": {"le": 5}}),
            json!({"acc_type_name": {"notIn": ["Active"]}}),
        ];
        for filter in &filters {
            let (ql, params) = compile(&ty, filter.clone());
            for doc in &docs {
                assert_eq!(
                    ql.evaluate(doc, &params).unwrap(),
                    ty.test_document(doc, filter).unwrap(),
                    "filter {} on {}",
                    filter,
                    doc
                );
            }
        }
    }

    #[test]
    fn test_join_array_rendering() {
        let message = Arc::new(Condition::collection([("value", Condition::number())]));
        let ty = Condition::collection([(
            "out_messages",
            Condition::join_array("out_msgs", "messages", message),
        )]);
        let (ql, _) = compile(&ty, json!({"out_messages": {"all": {"value": {"gt": 1}}}}));
        assert_eq!(
            ql.to_string(),
            "(LENGTH(doc.out_msgs) > 0) AND (LENGTH(FOR doc_out_msgs IN messages FILTER (doc_out_msgs._key IN doc.out_msgs) AND (doc_out_msgs.value > @v1) RETURN 1) == LENGTH(doc.out_msgs))"
        );
    }
}
