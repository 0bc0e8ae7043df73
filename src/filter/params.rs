//! Bound query parameters
//!
//! Parameters are referenced in condition text as `@vN` and supplied to the
//! store as a flat name → value map. Names come from a strictly incrementing
//! per-query counter starting at 1.

use serde_json::{Map, Value};

/// Append-only bound parameter accumulator, owned by a single query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundParams {
    count: usize,
    values: Map<String, Value>,
}

impl BoundParams {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value and return its generated name (without the `@`)
    pub fn add(&mut self, value: Value) -> String {
        self.count += 1;
        let name = format!("v{}", self.count);
        self.values.insert(name.clone(), value);
        name
    }

    /// Name the next `add` will produce
    pub fn peek_next_name(&self) -> String {
        format!("v{}", self.count + 1)
    }

    /// Number of bound values
    pub fn count(&self) -> usize {
        self.count
    }

    /// Look up a bound value by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Bound values by name
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Consume into the flat map handed to the driver
    pub fn into_values(self) -> Map<String, Value> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_names_increment_from_one() {
        let mut params = BoundParams::new();
        assert_eq!(params.peek_next_name(), "v1");
        assert_eq!(params.add(json!(10)), "v1");
        assert_eq!(params.add(json!("x")), "v2");
        assert_eq!(params.count(), 2);
        assert_eq!(params.get("v2"), Some(&json!("x")));
    }

    #[test]
    fn test_same_value_gets_new_name() {
        let mut params = BoundParams::new();
        let a = params.add(json!(1));
        let b = params.add(json!(1));
        assert_ne!(a, b);
        assert_eq!(params.into_values().len(), 2);
    }
}
