//! Implementation descriptor schema.
//!
//! Defines the structure of plugin JSON files and the built-in
//! implementations shipped with Luna.

use crate::types::EntityType;
use serde::{Deserialize, Serialize};

/// A plugin file declaring one implementation.
///
/// ```json
/// { "id": "mastodon", "entityType": "integration", "displayName": "Mastodon" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDescriptor {
    /// Implementation name; entities refer to it by this id.
    pub id: String,
    pub entity_type: EntityType,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A discoverable implementation of an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Implementation {
    pub name: String,
    pub entity_type: EntityType,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Shipped with Luna rather than loaded from a plugin file.
    pub builtin: bool,
}

impl From<PluginDescriptor> for Implementation {
    fn from(plugin: PluginDescriptor) -> Self {
        Self {
            name: plugin.id,
            entity_type: plugin.entity_type,
            display_name: plugin.display_name,
            description: plugin.description,
            builtin: false,
        }
    }
}

const BUILTINS: &[(EntityType, &str, &str, &str)] = &[
    (EntityType::Database, "sqlite", "SQLite", "Single-file SQLite database"),
    (EntityType::Database, "memory", "In-memory", "Volatile store for the current process"),
    (EntityType::Integration, "local", "Local", "Plain directory on disk"),
    (EntityType::Integration, "github", "GitHub", "Repository published with git and gh"),
    (EntityType::Integration, "website", "Website", "Jekyll site"),
    (EntityType::Integration, "pdf", "PDF", "Rendered PDF document"),
    (EntityType::Integration, "instagram", "Instagram", "Instagram posts"),
    (EntityType::Integration, "things3", "Things 3", "Things 3 project"),
];

/// Built-in implementations of `entity_type`, in declaration order.
pub fn builtin_implementations(entity_type: EntityType) -> Vec<Implementation> {
    BUILTINS
        .iter()
        .filter(|(t, ..)| *t == entity_type)
        .map(|(t, name, display_name, description)| Implementation {
            name: name.to_string(),
            entity_type: *t,
            display_name: display_name.to_string(),
            description: Some(description.to_string()),
            builtin: true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_per_type() {
        let names: Vec<_> = builtin_implementations(EntityType::Database)
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["sqlite", "memory"]);
        assert_eq!(builtin_implementations(EntityType::Integration).len(), 6);
        assert!(builtin_implementations(EntityType::Project).is_empty());
    }

    #[test]
    fn test_descriptor_parses_camel_case() {
        let plugin: PluginDescriptor = serde_json::from_str(
            r#"{"id": "notion", "entityType": "integration", "displayName": "Notion"}"#,
        )
        .unwrap();
        assert_eq!(plugin.entity_type, EntityType::Integration);
        assert_eq!(plugin.description, None);

        let implementation = Implementation::from(plugin);
        assert_eq!(implementation.name, "notion");
        assert!(!implementation.builtin);
    }
}
