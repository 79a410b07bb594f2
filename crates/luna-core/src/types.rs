//! Closed enumerations shared by every layer of the engine.

use serde::{Deserialize, Serialize};

/// The four layers every entity type is composed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Entity,
    Registry,
    Service,
    Command,
}

impl Layer {
    /// All layers in composition order.
    pub const ALL: [Layer; 4] = [Layer::Entity, Layer::Registry, Layer::Service, Layer::Command];

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Entity => "entity",
            Layer::Registry => "registry",
            Layer::Service => "service",
            Layer::Command => "command",
        }
    }

    /// Suffix used for composed type names (`ProjectService`, ...).
    ///
    /// The entity layer has no suffix: the composed entity type of `project`
    /// is simply `Project`.
    pub fn type_suffix(&self) -> &'static str {
        match self {
            Layer::Entity => "",
            Layer::Registry => "Registry",
            Layer::Service => "Service",
            Layer::Command => "Command",
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Known entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Project,
    Integration,
    ProjectIntegration,
    Database,
}

impl EntityType {
    pub const ALL: [EntityType; 4] = [
        EntityType::Database,
        EntityType::Project,
        EntityType::Integration,
        EntityType::ProjectIntegration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Project => "project",
            EntityType::Integration => "integration",
            EntityType::ProjectIntegration => "project_integration",
            EntityType::Database => "database",
        }
    }

    /// Title-cased prefix for composed type names.
    pub fn type_prefix(&self) -> &'static str {
        match self {
            EntityType::Project => "Project",
            EntityType::Integration => "Integration",
            EntityType::ProjectIntegration => "ProjectIntegration",
            EntityType::Database => "Database",
        }
    }

    /// Persistence table holding rows of this type, if it is persisted at all.
    pub fn table_name(&self) -> Option<&'static str> {
        match self {
            EntityType::Database => None,
            other => Some(other.as_str()),
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "project" => Some(EntityType::Project),
            "integration" => Some(EntityType::Integration),
            "project_integration" => Some(EntityType::ProjectIntegration),
            "database" => Some(EntityType::Database),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_roundtrip() {
        for entity_type in EntityType::ALL {
            let parsed = EntityType::from_str(entity_type.as_str()).expect("Should parse");
            assert_eq!(entity_type, parsed);
        }
        assert_eq!(
            EntityType::from_str("project-integration"),
            Some(EntityType::ProjectIntegration)
        );
        assert_eq!(EntityType::from_str("widget"), None);
    }

    #[test]
    fn test_database_is_not_persisted() {
        assert_eq!(EntityType::Database.table_name(), None);
        assert_eq!(EntityType::Project.table_name(), Some("project"));
    }
}
