//! Registered defaults of one owner.

use std::collections::HashMap;

use serde_json::{Map, Value as JsonValue};
use strata_types::Category;

use crate::error::{json_kind, ConfigError, ConfigResult};

/// Default values per category plus the arity of every custom category.
///
/// Readers always receive deep copies, so a caller mutating what it got back
/// cannot change another caller's defaults.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    defaults: HashMap<Category, Map<String, JsonValue>>,
    custom_arities: HashMap<String, usize>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a custom category taking `arity` primary keys.
    ///
    /// Re-declaring with the same arity is allowed; changing it is not.
    pub fn init_custom(&mut self, name: &str, arity: usize) -> ConfigResult<Category> {
        let category = Category::custom(name)?;
        if arity == 0 {
            return Err(ConfigError::InvalidCustomArity {
                name: name.to_string(),
            });
        }
        match self.custom_arities.get(name) {
            Some(&existing) if existing != arity => Err(ConfigError::CustomArityConflict {
                name: name.to_string(),
                existing,
                requested: arity,
            }),
            Some(_) => Ok(category),
            None => {
                self.custom_arities.insert(name.to_string(), arity);
                Ok(category)
            }
        }
    }

    /// Primary-key arity of `category`.
    pub fn arity(&self, category: &Category) -> ConfigResult<usize> {
        match category {
            Category::Custom(name) => {
                self.custom_arities
                    .get(name)
                    .copied()
                    .ok_or_else(|| ConfigError::UnknownCategory { name: name.clone() })
            }
            builtin => Ok(builtin.builtin_arity().unwrap_or(0)),
        }
    }

    /// Merge `defaults` into the category's registered defaults.
    ///
    /// New keys are added and leaf values overwritten. A registration that
    /// would replace a subtree with a leaf, or a leaf with a subtree, fails
    /// and leaves the schema unchanged.
    pub fn register(&mut self, category: &Category, defaults: JsonValue) -> ConfigResult<()> {
        self.arity(category)?;
        let JsonValue::Object(to_add) = defaults else {
            return Err(ConfigError::InvalidSchema {
                found: json_kind(&defaults),
            });
        };
        let mut updated = self.defaults.get(category).cloned().unwrap_or_default();
        update_defaults(&mut updated, to_add, "")?;
        self.defaults.insert(category.clone(), updated);
        Ok(())
    }

    /// Deep copy of the defaults registered for `category`.
    pub fn defaults_for(&self, category: &Category) -> Map<String, JsonValue> {
        self.defaults.get(category).cloned().unwrap_or_default()
    }

    /// Every declared custom category.
    pub fn custom_categories(&self) -> Vec<Category> {
        let mut names: Vec<&String> = self.custom_arities.keys().collect();
        names.sort();
        names
            .into_iter()
            .map(|name| Category::Custom(name.clone()))
            .collect()
    }
}

fn update_defaults(
    partial: &mut Map<String, JsonValue>,
    to_add: Map<String, JsonValue>,
    prefix: &str,
) -> ConfigResult<()> {
    for (key, value) in to_add {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        let value_is_object = value.is_object();
        match partial.get_mut(&key) {
            Some(JsonValue::Object(existing)) => match value {
                JsonValue::Object(nested) => update_defaults(existing, nested, &path)?,
                _ => return Err(ConfigError::SchemaStructure { key: path }),
            },
            Some(_) if value_is_object => {
                return Err(ConfigError::SchemaStructure { key: path });
            }
            Some(slot) => *slot = value,
            None => {
                partial.insert(key, value);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn register_merges_and_overwrites() {
        let mut schema = Schema::new();
        schema
            .register(&Category::Guild, json!({"days": 0, "flags": {"a": true}}))
            .unwrap();
        schema
            .register(&Category::Guild, json!({"days": 7, "flags": {"b": false}}))
            .unwrap();
        assert_eq!(
            JsonValue::Object(schema.defaults_for(&Category::Guild)),
            json!({"days": 7, "flags": {"a": true, "b": false}})
        );
    }

    #[test]
    fn register_rejects_structure_change() {
        let mut schema = Schema::new();
        schema
            .register(&Category::Global, json!({"flags": {"a": true}, "n": 1}))
            .unwrap();
        let err = schema
            .register(&Category::Global, json!({"flags": false}))
            .unwrap_err();
        assert!(matches!(err, ConfigError::SchemaStructure { ref key } if key == "flags"));
        let err = schema
            .register(&Category::Global, json!({"n": {"x": 1}}))
            .unwrap_err();
        assert!(matches!(err, ConfigError::SchemaStructure { .. }));
        // Failed registrations leave the schema untouched.
        assert_eq!(
            JsonValue::Object(schema.defaults_for(&Category::Global)),
            json!({"flags": {"a": true}, "n": 1})
        );
    }

    #[test]
    fn register_requires_mapping() {
        let mut schema = Schema::new();
        let err = schema.register(&Category::Global, json!(5)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSchema { found: "number" }));
    }

    #[test]
    fn custom_category_lifecycle() {
        let mut schema = Schema::new();
        let reports = Category::Custom("reports".into());
        assert!(matches!(
            schema.register(&reports, json!({})),
            Err(ConfigError::UnknownCategory { .. })
        ));
        assert_eq!(schema.init_custom("reports", 2).unwrap(), reports);
        assert_eq!(schema.arity(&reports).unwrap(), 2);
        schema.init_custom("reports", 2).unwrap();
        assert!(matches!(
            schema.init_custom("reports", 1),
            Err(ConfigError::CustomArityConflict { existing: 2, requested: 1, .. })
        ));
        assert!(matches!(
            schema.init_custom("empty", 0),
            Err(ConfigError::InvalidCustomArity { .. })
        ));
        assert!(matches!(
            schema.init_custom("MEMBER", 1),
            Err(ConfigError::Address(_))
        ));
        assert_eq!(schema.custom_categories(), vec![reports]);
    }

    #[test]
    fn defaults_are_copies() {
        let mut schema = Schema::new();
        schema
            .register(&Category::User, json!({"names": []}))
            .unwrap();
        let mut copy = schema.defaults_for(&Category::User);
        copy.insert("names".into(), json!(["mutated"]));
        assert_eq!(
            JsonValue::Object(schema.defaults_for(&Category::User)),
            json!({"names": []})
        );
    }
}
