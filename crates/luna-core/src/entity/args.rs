//! Construction arguments for entities.

use crate::error::{LunaError, Result};
use crate::persistence::{Row, ID_COLUMN};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Row keys that map onto dedicated entity properties rather than the field
/// bag.
pub(crate) const RESERVED_KEYS: [&str; 5] = [ID_COLUMN, "uuid", "name", "config", "submodule"];

/// Arguments consumed by the entity initializer steps.
///
/// Each composed entity behavior reads the arguments it cares about and
/// ignores the rest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityArgs {
    /// Existing id (when loading); a fresh one is generated otherwise.
    pub id: Option<Uuid>,
    pub name: Option<String>,
    /// Store row id (when loading).
    pub db_id: Option<i64>,
    pub config: Option<Map<String, Value>>,
    pub implementation: Option<String>,
    /// Additional persisted fields (`title`, `project_uuid`, ...).
    pub fields: BTreeMap<String, Value>,
    /// Construction-only values for base hooks; never persisted.
    pub hints: BTreeMap<String, String>,
}

impl EntityArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new().name(name)
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn implementation(mut self, implementation: impl Into<String>) -> Self {
        self.implementation = Some(implementation.into());
        self
    }

    pub fn config(mut self, config: Map<String, Value>) -> Self {
        self.config = Some(config);
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn hint(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.hints.insert(key.into(), value.into());
        self
    }

    /// Rebuild arguments from a persisted row.
    pub fn from_row(row: &Row) -> Result<Self> {
        let id = match row.get("uuid") {
            Some(Value::String(s)) => Some(Uuid::parse_str(s).map_err(|e| LunaError::Validation {
                field: "uuid".to_string(),
                message: format!("invalid uuid '{}': {}", s, e),
            })?),
            Some(other) => {
                return Err(LunaError::Validation {
                    field: "uuid".to_string(),
                    message: format!("expected a string, got {}", other),
                })
            }
            None => None,
        };

        let config = match row.get("config") {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(map.clone()),
            Some(other) => {
                return Err(LunaError::Validation {
                    field: "config".to_string(),
                    message: format!("expected an object, got {}", other),
                })
            }
        };

        let fields = row
            .iter()
            .filter(|(key, value)| !RESERVED_KEYS.contains(&key.as_str()) && !value.is_null())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self {
            id,
            name: row.get("name").and_then(Value::as_str).map(str::to_string),
            db_id: row.get(ID_COLUMN).and_then(Value::as_i64),
            config,
            implementation: row
                .get("submodule")
                .and_then(Value::as_str)
                .map(str::to_string),
            fields,
            hints: BTreeMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let args = EntityArgs::named("demo")
            .implementation("github")
            .field("title", "Demo")
            .hint("project_name", "blog");

        assert_eq!(args.name.as_deref(), Some("demo"));
        assert_eq!(args.hints["project_name"], "blog");
        assert_eq!(args.implementation.as_deref(), Some("github"));
        assert_eq!(args.fields["title"], json!("Demo"));
    }

    #[test]
    fn test_from_row_splits_reserved_keys() {
        let id = Uuid::new_v4();
        let row: Row = [
            ("id", json!(7)),
            ("uuid", json!(id.to_string())),
            ("name", json!("site")),
            ("config", json!({"branch": "main"})),
            ("submodule", json!("website")),
            ("title", json!("My Site")),
            ("emoji", Value::Null),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let args = EntityArgs::from_row(&row).unwrap();
        assert_eq!(args.id, Some(id));
        assert_eq!(args.db_id, Some(7));
        assert_eq!(args.name.as_deref(), Some("site"));
        assert_eq!(args.implementation.as_deref(), Some("website"));
        assert_eq!(args.config.unwrap()["branch"], json!("main"));
        assert_eq!(args.fields.len(), 1);
        assert_eq!(args.fields["title"], json!("My Site"));
    }

    #[test]
    fn test_from_row_rejects_bad_uuid() {
        let mut row = Row::new();
        row.insert("uuid".into(), json!("not-a-uuid"));
        assert!(matches!(
            EntityArgs::from_row(&row),
            Err(LunaError::Validation { .. })
        ));
    }
}
