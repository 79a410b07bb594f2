//! Composed domain entities.
//!
//! An [`Entity`] is built by running one initializer step per behavior
//! composed into its entity layer, bracketed by the base step and the
//! entity-type base initializer. Construction never registers; see
//! [`crate::registry::Registry::create`] for the registering factory.

mod args;
mod naming;
mod reference;

pub use args::EntityArgs;
pub use naming::{is_valid_name, validate_name};
pub use reference::EntityRef;

use crate::capability::{Behavior, Composition, NameMode};
use crate::error::{LunaError, Result};
use crate::persistence::{Row, ID_COLUMN};
use crate::types::EntityType;
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Field recording when an entity was first created.
pub const DATE_CREATED: &str = "date_created";

/// Field holding the implementation an entity was created from.
pub const IMPLEMENTATION_FIELD: &str = "submodule";

/// An instance of a composed entity type.
#[derive(Debug, Clone)]
pub struct Entity {
    id: Uuid,
    registry_id: Uuid,
    composition: Arc<Composition>,
    name: String,
    name_mode: NameMode,
    fields: BTreeMap<String, Value>,
    config: Option<Map<String, Value>>,
    db_id: Option<i64>,
    implementation: Option<String>,
}

impl Entity {
    /// Build an entity of `composition`'s type owned by `registry_id`.
    ///
    /// Any failing step discards the partially built entity.
    pub fn new(composition: Arc<Composition>, registry_id: Uuid, args: EntityArgs) -> Result<Self> {
        let mut entity = Entity {
            id: args.id.unwrap_or_else(Uuid::new_v4),
            registry_id,
            composition: Arc::clone(&composition),
            name: String::new(),
            name_mode: NameMode::ReadOnly,
            fields: args.fields.clone(),
            config: None,
            db_id: None,
            implementation: None,
        };

        for behavior in &composition.entity.behaviors {
            entity.apply(*behavior, &args)?;
        }
        composition.base().initialize(&mut entity)?;

        debug!(
            "Constructed {} '{}' ({}) in {} steps",
            entity.entity_type(),
            entity.name,
            entity.id,
            composition.entity.behaviors.len() + 2
        );
        Ok(entity)
    }

    fn apply(&mut self, behavior: Behavior, args: &EntityArgs) -> Result<()> {
        match behavior {
            Behavior::UserNameableProperty => {
                let name = args.name.clone().ok_or_else(|| LunaError::Validation {
                    field: "name".to_string(),
                    message: format!("a {} needs a name", self.entity_type()),
                })?;
                validate_name(&name)?;
                self.name = name;
                self.name_mode = NameMode::UserSettable;
            }
            Behavior::ReadOnlyNameProperty => {
                self.name = match &args.name {
                    Some(name) => name.clone(),
                    None => self
                        .composition
                        .base()
                        .auto_name(self.entity_type(), self.id, args),
                };
                self.name_mode = NameMode::ReadOnly;
            }
            Behavior::DatabaseProperty => {
                self.db_id = args.db_id;
                self.fields
                    .entry(DATE_CREATED.to_string())
                    .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
            }
            Behavior::ConfigProperty => {
                self.config = Some(args.config.clone().unwrap_or_default());
            }
            Behavior::ImplementationProperty => {
                if let Some(implementation) = &args.implementation {
                    self.fields.insert(
                        IMPLEMENTATION_FIELD.to_string(),
                        Value::String(implementation.clone()),
                    );
                    self.implementation = Some(implementation.clone());
                }
            }
            other => {
                return Err(LunaError::invariant(format!(
                    "{} is not an entity-layer behavior",
                    other
                )))
            }
        }
        Ok(())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn registry_id(&self) -> Uuid {
        self.registry_id
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.id, self.registry_id)
    }

    pub fn entity_type(&self) -> EntityType {
        self.composition.entity_type
    }

    pub fn composition(&self) -> &Arc<Composition> {
        &self.composition
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_mode(&self) -> NameMode {
        self.name_mode
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// String field parsed as a uuid (link endpoints).
    pub fn uuid_field(&self, key: &str) -> Result<Uuid> {
        let raw = self
            .fields
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| LunaError::Validation {
                field: key.to_string(),
                message: format!("{} '{}' has no {}", self.entity_type(), self.name, key),
            })?;
        Uuid::parse_str(raw).map_err(|e| LunaError::Validation {
            field: key.to_string(),
            message: format!("invalid uuid '{}': {}", raw, e),
        })
    }

    pub fn config(&self) -> Option<&Map<String, Value>> {
        self.config.as_ref()
    }

    pub fn db_id(&self) -> Option<i64> {
        self.db_id
    }

    pub fn implementation(&self) -> Option<&str> {
        self.implementation.as_deref()
    }

    pub fn date_created(&self) -> Option<&str> {
        self.fields.get(DATE_CREATED).and_then(Value::as_str)
    }

    /// Change a user-settable name, returning the previous one.
    pub(crate) fn set_name(&mut self, name: &str) -> Result<String> {
        if self.name_mode == NameMode::ReadOnly {
            return Err(LunaError::ReadOnlyName {
                entity_type: self.entity_type(),
                name: self.name.clone(),
            });
        }
        self.relabel(name)
    }

    /// Replace the name regardless of name mode, for generated names that
    /// follow other entities. Returns the old name.
    pub(crate) fn relabel(&mut self, name: &str) -> Result<String> {
        validate_name(name)?;
        Ok(std::mem::replace(&mut self.name, name.to_string()))
    }

    pub(crate) fn set_db_id(&mut self, db_id: i64) {
        self.db_id = Some(db_id);
    }

    pub(crate) fn set_field(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    /// Merge `updates` into the config, returning the config as it was.
    ///
    /// A `null` update removes the key.
    pub(crate) fn merge_config(&mut self, updates: Map<String, Value>) -> Result<Map<String, Value>> {
        let entity_type = self.entity_type();
        let config = self
            .config
            .as_mut()
            .ok_or_else(|| LunaError::unsupported(entity_type, "edit"))?;
        let previous = config.clone();
        for (key, value) in updates {
            if value.is_null() {
                config.remove(&key);
            } else {
                config.insert(key, value);
            }
        }
        Ok(previous)
    }

    pub(crate) fn restore_config(&mut self, config: Map<String, Value>) {
        self.config = Some(config);
    }

    /// Persistable row for this entity.
    pub fn to_row(&self) -> Row {
        let mut row: Row = self.fields.clone();
        row.insert("uuid".to_string(), Value::String(self.id.to_string()));
        row.insert("name".to_string(), Value::String(self.name.clone()));
        if let Some(config) = &self.config {
            row.insert("config".to_string(), Value::Object(config.clone()));
        }
        if let Some(db_id) = self.db_id {
            row.insert(ID_COLUMN.to_string(), Value::from(db_id));
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Compositions;
    use serde_json::json;

    fn composition(entity_type: EntityType) -> Arc<Composition> {
        Compositions::build().unwrap().get(entity_type).unwrap()
    }

    #[test]
    fn test_project_steps() {
        let registry_id = Uuid::new_v4();
        let entity = Entity::new(
            composition(EntityType::Project),
            registry_id,
            EntityArgs::named("demo").field("emoji", "🚀"),
        )
        .unwrap();

        assert_eq!(entity.name(), "demo");
        assert_eq!(entity.name_mode(), NameMode::UserSettable);
        assert_eq!(entity.registry_id(), registry_id);
        assert!(entity.date_created().is_some());
        assert_eq!(entity.config(), Some(&Map::new()));
        assert_eq!(entity.db_id(), None);
        assert_eq!(entity.field("emoji"), Some(&json!("🚀")));
    }

    #[test]
    fn test_user_name_is_required_and_validated() {
        let project = composition(EntityType::Project);
        assert!(matches!(
            Entity::new(Arc::clone(&project), Uuid::new_v4(), EntityArgs::new()),
            Err(LunaError::Validation { .. })
        ));
        assert!(matches!(
            Entity::new(project, Uuid::new_v4(), EntityArgs::named("a/b")),
            Err(LunaError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_generated_read_only_name() {
        let entity = Entity::new(
            composition(EntityType::ProjectIntegration),
            Uuid::new_v4(),
            EntityArgs::new()
                .field("project_uuid", Uuid::new_v4().to_string())
                .field("integration_uuid", Uuid::new_v4().to_string()),
        )
        .unwrap();

        assert_eq!(entity.name_mode(), NameMode::ReadOnly);
        assert!(entity.name().starts_with("project_integration-"));

        let mut entity = entity;
        assert!(matches!(
            entity.set_name("other"),
            Err(LunaError::ReadOnlyName { .. })
        ));
    }

    #[test]
    fn test_implementation_is_stored_as_submodule() {
        let entity = Entity::new(
            composition(EntityType::Integration),
            Uuid::new_v4(),
            EntityArgs::named("blog").implementation("website"),
        )
        .unwrap();

        assert_eq!(entity.implementation(), Some("website"));
        assert_eq!(entity.to_row()["submodule"], json!("website"));
    }

    #[test]
    fn test_row_roundtrip_keeps_identity() {
        let project = composition(EntityType::Project);
        let mut original =
            Entity::new(Arc::clone(&project), Uuid::new_v4(), EntityArgs::named("demo")).unwrap();
        original.set_db_id(4);

        let args = EntityArgs::from_row(&original.to_row()).unwrap();
        let loaded = Entity::new(project, Uuid::new_v4(), args).unwrap();

        assert_eq!(loaded.id(), original.id());
        assert_eq!(loaded.db_id(), Some(4));
        assert_eq!(loaded.date_created(), original.date_created());
    }

    #[test]
    fn test_merge_config() {
        let mut entity = Entity::new(
            composition(EntityType::Project),
            Uuid::new_v4(),
            EntityArgs::named("demo"),
        )
        .unwrap();

        let mut updates = Map::new();
        updates.insert("theme".into(), json!("dark"));
        let previous = entity.merge_config(updates).unwrap();
        assert!(previous.is_empty());
        assert_eq!(entity.config().unwrap()["theme"], json!("dark"));

        let mut updates = Map::new();
        updates.insert("theme".into(), Value::Null);
        entity.merge_config(updates).unwrap();
        assert!(entity.config().unwrap().is_empty());
    }
}
