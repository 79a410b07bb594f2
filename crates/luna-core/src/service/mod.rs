//! Composed business operations.
//!
//! A [`Service`] is obtained from [`RegistryManager::service`] for one
//! entity type. Each generic operation checks that the composed service
//! layer satisfies the matching interface and fails with `Unsupported`
//! otherwise; entity-specific operations live in [`links`] and
//! [`database`].

pub mod base;
mod database;
mod links;

use crate::capability::{Behavior, Composition, Interface};
use crate::entity::{Entity, EntityArgs};
use crate::error::{LunaError, Result};
use crate::plugins::Implementation;
use crate::registry::{Registry, RegistryManager};
use crate::types::EntityType;
use serde::Serialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Serializable view of one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDetails {
    pub id: Uuid,
    pub entity_type: EntityType,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,
    pub fields: BTreeMap<String, Value>,
}

impl From<&Entity> for EntityDetails {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id(),
            entity_type: entity.entity_type(),
            name: entity.name().to_string(),
            implementation: entity.implementation().map(str::to_string),
            config: entity.config().cloned(),
            fields: entity.fields().clone(),
        }
    }
}

/// Service-layer operations for one entity type.
pub struct Service<'a> {
    manager: &'a mut RegistryManager,
    composition: Arc<Composition>,
}

impl<'a> Service<'a> {
    pub(crate) fn new(manager: &'a mut RegistryManager, composition: Arc<Composition>) -> Self {
        Self {
            manager,
            composition,
        }
    }

    pub fn entity_type(&self) -> EntityType {
        self.composition.entity_type
    }

    pub fn composition(&self) -> &Arc<Composition> {
        &self.composition
    }

    fn registry(&self) -> Result<&Registry> {
        self.manager.require(self.entity_type())
    }

    fn registry_mut(&mut self) -> Result<&mut Registry> {
        self.manager.require_mut(self.composition.entity_type)
    }

    fn entity(&self, id: Uuid) -> Result<&Entity> {
        self.registry()?
            .get_by_id(id)
            .ok_or_else(|| LunaError::not_found(self.entity_type(), id.to_string()))
    }

    /// Fail unless this service is for `entity_type`.
    fn expect_type(&self, entity_type: EntityType, operation: &str) -> Result<()> {
        if self.entity_type() != entity_type {
            return Err(LunaError::unsupported(self.entity_type(), operation));
        }
        Ok(())
    }

    // ========================================
    // Creatable
    // ========================================

    /// Construct, register and persist a new entity.
    ///
    /// If persisting fails the entity is unregistered again.
    pub fn create(&mut self, args: EntityArgs) -> Result<EntityDetails> {
        let entity_type = self.entity_type();
        match self.composition.require(Interface::Creatable)? {
            Behavior::LoadableImplementationService => {
                return Err(LunaError::unsupported(entity_type, "create"));
            }
            Behavior::CreatableImplementationService => {
                let implementation =
                    args.implementation
                        .as_deref()
                        .ok_or_else(|| LunaError::Validation {
                            field: "implementation".to_string(),
                            message: format!("a {} needs an implementation", entity_type),
                        })?;
                if !self.registry()?.is_implementation(implementation) {
                    return Err(LunaError::Validation {
                        field: "implementation".to_string(),
                        message: format!(
                            "'{}' is not a known {} implementation",
                            implementation, entity_type
                        ),
                    });
                }
            }
            _ => {}
        }

        let registry_id = self.registry()?.id();
        let entity = Entity::new(Arc::clone(&self.composition), registry_id, args)?;
        self.composition.base().before_create(self.manager, &entity)?;

        let registry = self.registry_mut()?;
        let id = registry.register(entity)?.id();
        if let Err(e) = registry.persist(id) {
            let entity = registry.unregister(id)?;
            error!(
                "Failed to persist {} '{}', rolled back: {}",
                entity_type,
                entity.name(),
                e
            );
            return Err(LunaError::persistence(entity_type, entity.name(), e));
        }

        let entity = self.entity(id)?;
        info!("Created {} '{}'", entity_type, entity.name());
        Ok(EntityDetails::from(entity))
    }

    // ========================================
    // Listable
    // ========================================

    /// Entities whose name contains `filter` (case-insensitive), sorted by
    /// name or by the field `sort_by`.
    pub fn list(&self, sort_by: Option<&str>, filter: Option<&str>) -> Result<Vec<EntityDetails>> {
        self.composition.require(Interface::Listable)?;
        let filter = filter.map(str::to_lowercase);
        let mut entities: Vec<&Entity> = self
            .registry()?
            .find(move |entity| match &filter {
                Some(filter) => entity.name().to_lowercase().contains(filter.as_str()),
                None => true,
            })
            .collect();
        entities.sort_by(|a, b| a.name().cmp(b.name()));

        match sort_by {
            None | Some("name") => {}
            Some(key) if entities.iter().any(|e| e.field(key).is_some()) => {
                entities.sort_by(|a, b| compare_fields(a.field(key), b.field(key)));
            }
            Some(key) => {
                warn!(
                    "Unknown sort key '{}' for {}, sorting by name",
                    key,
                    self.entity_type()
                );
            }
        }

        Ok(entities.into_iter().map(EntityDetails::from).collect())
    }

    pub fn details(&self, id: Uuid) -> Result<EntityDetails> {
        self.composition.require(Interface::Listable)?;
        self.entity(id).map(EntityDetails::from)
    }

    // ========================================
    // Deletable
    // ========================================

    /// Delete an entity: run the base cleanup, delete its row, then
    /// unregister it.
    pub fn delete(&mut self, id: Uuid) -> Result<EntityDetails> {
        self.composition.require(Interface::Deletable)?;
        let entity_type = self.entity_type();
        let entity = self.entity(id)?.clone();

        self.composition.base().before_delete(self.manager, &entity)?;

        let registry = self.registry_mut()?;
        registry.delete_persisted(&entity).map_err(|e| {
            error!("Failed to delete {} '{}': {}", entity_type, entity.name(), e);
            LunaError::persistence(entity_type, entity.name(), e)
        })?;
        registry.unregister(id)?;

        info!("Deleted {} '{}'", entity_type, entity.name());
        Ok(EntityDetails::from(&entity))
    }

    // ========================================
    // Renamable
    // ========================================

    /// Rename an entity and run its base follow-up (renaming its links) in
    /// one transaction; if any of it fails the old name is restored.
    pub fn rename(&mut self, id: Uuid, new_name: &str) -> Result<EntityDetails> {
        self.composition.require(Interface::Renamable)?;
        let entity_type = self.entity_type();
        let base = self.composition.base();

        let old_name = self.registry_mut()?.rename(id, new_name)?;
        let outcome = self.manager.transaction(|manager| {
            let registry = manager.require_mut(entity_type)?;
            registry.persist(id)?;
            let entity = registry
                .get_by_id(id)
                .cloned()
                .ok_or_else(|| LunaError::not_found(entity_type, id.to_string()))?;
            base.after_rename(manager, &entity)
        });

        if let Err(e) = outcome {
            self.registry_mut()?.rename(id, &old_name)?;
            error!("Failed to persist rename of {} '{}': {}", entity_type, old_name, e);
            return Err(LunaError::persistence(entity_type, old_name, e));
        }

        info!("Renamed {} '{}' to '{}'", entity_type, old_name, new_name);
        self.details(id)
    }

    // ========================================
    // Editable
    // ========================================

    /// Merge `updates` into an entity's config; reverted if persisting
    /// fails.
    pub fn edit(&mut self, id: Uuid, updates: Map<String, Value>) -> Result<EntityDetails> {
        self.composition.require(Interface::Editable)?;
        let entity_type = self.entity_type();

        let registry = self.registry_mut()?;
        let entity = registry
            .get_mut(id)
            .ok_or_else(|| LunaError::not_found(entity_type, id.to_string()))?;
        let name = entity.name().to_string();
        let previous = entity.merge_config(updates)?;

        if let Err(e) = registry.persist(id) {
            if let Some(entity) = registry.get_mut(id) {
                entity.restore_config(previous);
            }
            error!("Failed to persist edit of {} '{}': {}", entity_type, name, e);
            return Err(LunaError::persistence(entity_type, name, e));
        }

        info!("Edited {} '{}'", entity_type, name);
        self.details(id)
    }

    // ========================================
    // Implementation discovery
    // ========================================

    pub fn list_implementations(&self) -> Result<Vec<Implementation>> {
        self.composition.require(Interface::ImplementationDiscovery)?;
        Ok(self.registry()?.discover().to_vec())
    }

    pub fn is_implementation(&self, name: &str) -> Result<bool> {
        self.composition.require(Interface::ImplementationDiscovery)?;
        Ok(self.registry()?.is_implementation(name))
    }
}

/// Order two optional field values; missing values sort last.
fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(a), Some(b)) => a.to_string().cmp(&b.to_string()),
    }
}
