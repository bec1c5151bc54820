// ironwire-core/src/index.rs
// Index descriptions: key normalization, default naming, option validation

use serde_json::{Map, Value};

use crate::error::{DriverError, Result};

/// First wire version whose `createIndexes` accepts `commitQuorum`.
pub const MIN_COMMIT_QUORUM_WIRE_VERSION: i32 = 9;

/// Options the `createIndexes` command accepts per index entry.
/// Anything else in caller input is silently discarded.
const KNOWN_INDEX_OPTIONS: &[&str] = &[
    "name",
    "unique",
    "sparse",
    "expireAfterSeconds",
    "hidden",
    "partialFilterExpression",
];

/// Description of one index to create.
///
/// Keys are an explicit ordered list, never a hash map: field order is
/// semantically meaningful for compound indexes and must survive into the
/// command document unchanged.
#[derive(Debug, Clone)]
pub struct IndexModel {
    pub keys: Vec<(String, i32)>,
    pub options: IndexOptions,
}

/// Per-index options recognized by the server.
#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    pub name: Option<String>,
    pub unique: Option<bool>,
    pub sparse: Option<bool>,
    pub expire_after_seconds: Option<i64>,
    pub hidden: Option<bool>,
    pub partial_filter_expression: Option<Value>,
}

impl IndexModel {
    pub fn new(keys: Vec<(String, i32)>) -> Self {
        IndexModel {
            keys,
            options: IndexOptions::default(),
        }
    }

    pub fn with_options(mut self, options: IndexOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.options.name = Some(name.into());
        self
    }

    /// Normalize heterogeneous caller input into one canonical model.
    ///
    /// Accepted shapes:
    /// - `"field"`: single ascending key;
    /// - `{"a": 1, "b": -1}`: object, insertion order preserved;
    /// - `[["a", 1], ["b", -1]]`: list of field/direction pairs.
    pub fn from_value(spec: &Value) -> Result<IndexModel> {
        let keys = match spec {
            Value::String(field) => vec![(field.clone(), 1)],
            Value::Object(map) => {
                let mut keys = Vec::with_capacity(map.len());
                for (field, direction) in map {
                    keys.push((field.clone(), parse_direction(field, direction)?));
                }
                keys
            }
            Value::Array(pairs) => {
                let mut keys = Vec::with_capacity(pairs.len());
                for pair in pairs {
                    let items = pair.as_array().filter(|p| p.len() == 2).ok_or_else(|| {
                        DriverError::InvalidArgument(
                            "index key pair must be [field, direction]".to_string(),
                        )
                    })?;
                    let field = items[0].as_str().ok_or_else(|| {
                        DriverError::InvalidArgument("index field must be a string".to_string())
                    })?;
                    keys.push((field.to_string(), parse_direction(field, &items[1])?));
                }
                keys
            }
            other => {
                return Err(DriverError::InvalidArgument(format!(
                    "unsupported index key specification: {other}"
                )));
            }
        };
        if keys.is_empty() {
            return Err(DriverError::InvalidArgument(
                "index specification must name at least one field".to_string(),
            ));
        }
        Ok(IndexModel::new(keys))
    }

    /// Deterministic default name: fields and directions joined by
    /// underscores, e.g. `{a: 1, b: -1}` -> `"a_1_b_-1"`.
    pub fn default_name(&self) -> String {
        self.keys
            .iter()
            .map(|(field, direction)| format!("{field}_{direction}"))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Effective name: caller-specified, or the derived default.
    pub fn name(&self) -> String {
        self.options
            .name
            .clone()
            .unwrap_or_else(|| self.default_name())
    }

    /// Build the per-index entry of the `createIndexes` command.
    pub fn to_document(&self) -> Value {
        let mut key = Map::new();
        for (field, direction) in &self.keys {
            key.insert(field.clone(), Value::from(*direction));
        }

        let mut doc = Map::new();
        doc.insert("key".to_string(), Value::Object(key));
        doc.insert("name".to_string(), Value::from(self.name()));
        if let Some(unique) = self.options.unique {
            doc.insert("unique".to_string(), Value::from(unique));
        }
        if let Some(sparse) = self.options.sparse {
            doc.insert("sparse".to_string(), Value::from(sparse));
        }
        if let Some(expire) = self.options.expire_after_seconds {
            doc.insert("expireAfterSeconds".to_string(), Value::from(expire));
        }
        if let Some(hidden) = self.options.hidden {
            doc.insert("hidden".to_string(), Value::from(hidden));
        }
        if let Some(filter) = &self.options.partial_filter_expression {
            doc.insert("partialFilterExpression".to_string(), filter.clone());
        }
        Value::Object(doc)
    }
}

impl IndexOptions {
    /// Extract recognized options from a caller-supplied bag, silently
    /// discarding unrecognized keys rather than failing.
    pub fn from_value(bag: &Value) -> Result<IndexOptions> {
        let Some(map) = bag.as_object() else {
            return Err(DriverError::InvalidArgument(
                "index options must be an object".to_string(),
            ));
        };

        let mut options = IndexOptions::default();
        for (key, value) in map {
            if !KNOWN_INDEX_OPTIONS.contains(&key.as_str()) {
                continue;
            }
            match key.as_str() {
                "name" => options.name = value.as_str().map(str::to_string),
                "unique" => options.unique = value.as_bool(),
                "sparse" => options.sparse = value.as_bool(),
                "expireAfterSeconds" => options.expire_after_seconds = value.as_i64(),
                "hidden" => options.hidden = value.as_bool(),
                "partialFilterExpression" => {
                    options.partial_filter_expression = Some(value.clone());
                }
                _ => unreachable!("key checked against KNOWN_INDEX_OPTIONS"),
            }
        }
        Ok(options)
    }
}

fn parse_direction(field: &str, value: &Value) -> Result<i32> {
    match value.as_i64() {
        Some(1) => Ok(1),
        Some(-1) => Ok(-1),
        _ => Err(DriverError::InvalidArgument(format!(
            "index direction for '{field}' must be 1 or -1, got {value}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_default_name_preserves_key_order() {
        let model = IndexModel::from_value(&json!({"a": 1, "b": -1})).unwrap();
        assert_eq!(
            model.keys,
            vec![("a".to_string(), 1), ("b".to_string(), -1)]
        );
        assert_eq!(model.default_name(), "a_1_b_-1");
    }

    #[test]
    fn test_caller_name_wins_over_default() {
        let model = IndexModel::new(vec![("a".to_string(), 1)]).with_name("custom");
        assert_eq!(model.name(), "custom");
        assert_eq!(model.default_name(), "a_1");
    }

    #[test]
    fn test_string_shorthand_is_ascending() {
        let model = IndexModel::from_value(&json!("created_at")).unwrap();
        assert_eq!(model.keys, vec![("created_at".to_string(), 1)]);
        assert_eq!(model.name(), "created_at_1");
    }

    #[test]
    fn test_pair_list_input() {
        let model = IndexModel::from_value(&json!([["country", 1], ["city", -1]])).unwrap();
        assert_eq!(model.default_name(), "country_1_city_-1");
    }

    #[test]
    fn test_invalid_direction_rejected() {
        let err = IndexModel::from_value(&json!({"a": 2})).unwrap_err();
        assert!(matches!(err, DriverError::InvalidArgument(_)));

        let err = IndexModel::from_value(&json!({"a": "text"})).unwrap_err();
        assert!(matches!(err, DriverError::InvalidArgument(_)));
    }

    #[test]
    fn test_empty_spec_rejected() {
        let err = IndexModel::from_value(&json!({})).unwrap_err();
        assert!(matches!(err, DriverError::InvalidArgument(_)));
    }

    #[test]
    fn test_to_document_key_order_and_fields() {
        let model = IndexModel::from_value(&json!({"a": 1, "b": -1})).unwrap();
        let doc = model.to_document();

        let key = doc.get("key").unwrap().as_object().unwrap();
        let fields: Vec<&String> = key.keys().collect();
        assert_eq!(fields, vec!["a", "b"]);
        assert_eq!(key.get("a").unwrap(), &json!(1));
        assert_eq!(key.get("b").unwrap(), &json!(-1));
        assert_eq!(doc.get("name").unwrap(), &json!("a_1_b_-1"));
    }

    #[test]
    fn test_unknown_options_silently_discarded() {
        let options = IndexOptions::from_value(&json!({
            "unique": true,
            "bogusOption": 42,
            "anotherUnknown": {"nested": true},
            "sparse": false
        }))
        .unwrap();

        assert_eq!(options.unique, Some(true));
        assert_eq!(options.sparse, Some(false));
        assert!(options.name.is_none());
    }

    #[test]
    fn test_options_passthrough() {
        let options = IndexOptions::from_value(&json!({
            "name": "ttl_idx",
            "expireAfterSeconds": 3600,
            "hidden": true,
            "partialFilterExpression": {"archived": false}
        }))
        .unwrap();

        assert_eq!(options.name.as_deref(), Some("ttl_idx"));
        assert_eq!(options.expire_after_seconds, Some(3600));
        assert_eq!(options.hidden, Some(true));
        assert_eq!(
            options.partial_filter_expression,
            Some(json!({"archived": false}))
        );
    }

    proptest! {
        #[test]
        fn prop_default_name_reflects_every_key(
            fields in proptest::collection::vec("[a-z]{1,8}", 1..5),
            directions in proptest::collection::vec(prop_oneof![Just(1i32), Just(-1i32)], 5),
        ) {
            let keys: Vec<(String, i32)> = fields
                .iter()
                .zip(directions.iter())
                .map(|(f, d)| (f.clone(), *d))
                .collect();
            let model = IndexModel::new(keys.clone());
            let name = model.default_name();

            let expected = keys
                .iter()
                .map(|(f, d)| format!("{f}_{d}"))
                .collect::<Vec<_>>()
                .join("_");
            prop_assert_eq!(name, expected);
        }
    }
}
