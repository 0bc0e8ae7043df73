//! Scalar field metadata derived from document types
//!
//! Aggregations resolve a logical field name (`balance`, `compute.gas_fees`,
//! `out_msgs`) to the stored path and scalar type. Arrays contribute a `[*]`
//! expansion to the path.

use std::collections::HashMap;

use crate::filter::{Condition, ScalarKind, KEY_FIELD, U64_PREFIX};

/// Stored type of a scalar field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Number,
    String,
    Boolean,
    UInt64,
    UInt1024,
}

impl ScalarType {
    /// Hex length-prefix size for big-uint types, 0 otherwise
    pub fn big_int_prefix(&self) -> usize {
        match self {
            ScalarType::UInt64 => 1,
            ScalarType::UInt1024 => 2,
            _ => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::Number => "number",
            ScalarType::String => "string",
            ScalarType::Boolean => "boolean",
            ScalarType::UInt64 => "uint64",
            ScalarType::UInt1024 => "uint1024",
        }
    }
}

/// Path and type of one aggregatable field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarField {
    pub path: String,
    pub ty: ScalarType,
}

impl ScalarField {
    /// Synthetic field used when a name does not resolve; only COUNT accepts it
    pub fn count_only() -> Self {
        Self {
            path: String::new(),
            ty: ScalarType::String,
        }
    }

    pub fn is_array(&self) -> bool {
        self.path.contains("[*]")
    }
}

/// `collection.field` → scalar field lookup
#[derive(Debug, Clone, Default)]
pub struct ScalarFieldMap {
    fields: HashMap<String, ScalarField>,
}

impl ScalarFieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the map for one collection type.
    pub fn from_type(collection: &str, doc_type: &Condition) -> Self {
        let mut map = Self::new();
        map.add_type(collection, doc_type);
        map
    }

    /// Adds every scalar field of `doc_type` under `collection`.
    pub fn add_type(&mut self, collection: &str, doc_type: &Condition) {
        self.collect(collection, "", "doc", doc_type);
    }

    fn collect(&mut self, collection: &str, name: &str, path: &str, ty: &Condition) {
        let ty_scalar = match ty {
            Condition::Scalar(ScalarKind::Number) => Some(ScalarType::Number),
            Condition::Scalar(ScalarKind::String) => Some(ScalarType::String),
            Condition::Scalar(ScalarKind::Boolean) => Some(ScalarType::Boolean),
            Condition::BigUInt(prefix) if *prefix == U64_PREFIX => Some(ScalarType::UInt64),
            Condition::BigUInt(_) => Some(ScalarType::UInt1024),
            Condition::Struct {
                fields,
                is_collection,
            } => {
                for (key, field) in fields {
                    let stored = if *is_collection && key == "id" {
                        KEY_FIELD
                    } else {
                        key.as_str()
                    };
                    let child_name = if name.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", name, key)
                    };
                    self.collect(collection, &child_name, &format!("{}.{}", path, stored), field);
                }
                None
            }
            Condition::Array(item) => {
                self.collect(collection, name, &format!("{}[*]", path), item);
                None
            }
            // enum names and joins are resolved fields, not stored scalars
            _ => None,
        };
        if let Some(ty) = ty_scalar {
            self.fields.insert(
                format!("{}.{}", collection, name),
                ScalarField {
                    path: path.to_string(),
                    ty,
                },
            );
        }
    }

    /// Looks up `collection.field`.
    pub fn get(&self, collection: &str, field: &str) -> Option<&ScalarField> {
        self.fields.get(&format!("{}.{}", collection, field))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types;

    #[test]
    fn test_paths_and_types() {
        let map = ScalarFieldMap::from_type("transactions", &types::transaction());

        let id = map.get("transactions", "id").unwrap();
        assert_eq!(id.path, "doc._key");

        let lt = map.get("transactions", "lt").unwrap();
        assert_eq!(lt.ty, ScalarType::UInt64);

        let gas = map.get("transactions", "compute.gas_fees").unwrap();
        assert_eq!(gas.path, "doc.compute.gas_fees");
        assert_eq!(gas.ty, ScalarType::UInt1024);

        let out = map.get("transactions", "out_msgs").unwrap();
        assert_eq!(out.path, "doc.out_msgs[*]");
        assert!(out.is_array());

        let other = map.get("transactions", "total_fees_other.value").unwrap();
        assert_eq!(other.path, "doc.total_fees_other[*].value");

        assert!(map.get("transactions", "tr_type_name").is_none());
        assert!(map.get("transactions", "in_message").is_none());
    }
}
