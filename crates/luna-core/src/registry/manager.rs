//! Directory of every registry in the process.

use super::entity_registry::{LoadResult, Registry};
use crate::capability::{Behavior, Composition};
use crate::entity::{Entity, EntityRef};
use crate::error::{LunaError, Result};
use crate::persistence::{Persistence, TABLES};
use crate::plugins::Implementation;
use crate::service::Service;
use crate::types::EntityType;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Owns all registries, indexed by id and by entity type, and holds the
/// single active persistence handle.
///
/// Registries never reach for the active database themselves; the manager
/// hands them the handle when they are created or when it changes.
#[derive(Default)]
pub struct RegistryManager {
    registries: HashMap<Uuid, Registry>,
    by_type: HashMap<EntityType, Uuid>,
    active_database: Option<EntityRef>,
    store: Option<Arc<dyn Persistence>>,
}

impl std::fmt::Debug for RegistryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryManager")
            .field("registries", &self.registries)
            .field("by_type", &self.by_type)
            .field("active_database", &self.active_database)
            .field("store", &self.store.as_ref().map(|s| s.name().to_string()))
            .finish()
    }
}

impl RegistryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create, load and register the registry for `composition`'s type.
    ///
    /// The registry receives the active store (if any), creates its
    /// implementation entities and autoloads persisted rows.
    pub fn register_registry(
        &mut self,
        composition: Arc<Composition>,
        implementations: Vec<Implementation>,
    ) -> Result<(Uuid, LoadResult)> {
        let entity_type = composition.entity_type;
        if self.by_type.contains_key(&entity_type) {
            return Err(LunaError::invariant(format!(
                "A registry for {} is already registered",
                entity_type
            )));
        }

        let id = Uuid::new_v4();
        let mut registry = Registry::new(id, composition, None, implementations);
        if let Some(store) = &self.store {
            registry.bind_store(Arc::clone(store));
        }
        registry.load_implementations()?;
        let loaded = registry.autoload()?;

        info!("Registered {} registry {}", entity_type, id);
        self.registries.insert(id, registry);
        self.by_type.insert(entity_type, id);
        Ok((id, loaded))
    }

    pub fn registry(&self, id: Uuid) -> Option<&Registry> {
        self.registries.get(&id)
    }

    pub fn registry_mut(&mut self, id: Uuid) -> Option<&mut Registry> {
        self.registries.get_mut(&id)
    }

    pub fn get_by_entity_type(&self, entity_type: EntityType) -> Option<&Registry> {
        self.by_type
            .get(&entity_type)
            .and_then(|id| self.registries.get(id))
    }

    pub fn get_by_entity_type_mut(&mut self, entity_type: EntityType) -> Option<&mut Registry> {
        let id = *self.by_type.get(&entity_type)?;
        self.registries.get_mut(&id)
    }

    /// Registry for `entity_type`, or `InvariantViolation` if it was never
    /// created.
    pub fn require(&self, entity_type: EntityType) -> Result<&Registry> {
        self.get_by_entity_type(entity_type)
            .ok_or_else(|| missing_registry(entity_type))
    }

    pub fn require_mut(&mut self, entity_type: EntityType) -> Result<&mut Registry> {
        self.get_by_entity_type_mut(entity_type)
            .ok_or_else(|| missing_registry(entity_type))
    }

    pub fn registries(&self) -> impl Iterator<Item = &Registry> + '_ {
        self.registries.values()
    }

    /// Look up the entity a reference points at. Any miss is `None`.
    pub fn resolve(&self, entity_ref: &EntityRef) -> Option<&Entity> {
        self.registries
            .get(&entity_ref.registry_id)?
            .get_by_id(entity_ref.entity_id)
    }

    /// References to every entity matching `filter`, optionally restricted
    /// to one registry.
    pub fn find_entities<F>(&self, filter: F, registry_id: Option<Uuid>) -> Vec<EntityRef>
    where
        F: Fn(&Entity) -> bool,
    {
        self.registries
            .values()
            .filter(|registry| registry_id.map_or(true, |id| registry.id() == id))
            .flat_map(|registry| registry.get_all())
            .filter(|entity| filter(entity))
            .map(Entity::entity_ref)
            .collect()
    }

    /// Make the database entity named `name` the active one, backed by
    /// `store`.
    ///
    /// Ensures the entity tables exist and rebinds every registry composed
    /// with database support.
    pub fn activate_database(
        &mut self,
        name: &str,
        store: Arc<dyn Persistence>,
    ) -> Result<EntityRef> {
        let database = self.require(EntityType::Database)?.require_by_name(name)?;
        let entity_ref = database.entity_ref();

        store.ensure_tables(&TABLES)?;
        for registry in self.registries.values_mut() {
            if registry.composition().has(Behavior::DatabaseRegistry) {
                registry.bind_store(Arc::clone(&store));
            }
        }

        info!("Activated {} database '{}'", store.name(), name);
        self.active_database = Some(entity_ref);
        self.store = Some(store);
        Ok(entity_ref)
    }

    pub fn active_database(&self) -> Option<&Entity> {
        self.resolve(self.active_database.as_ref()?)
    }

    /// The active persistence handle.
    pub fn store(&self) -> Option<Arc<dyn Persistence>> {
        self.store.clone()
    }

    /// Run `work` inside one transaction on the active store.
    ///
    /// Store calls made by `work` join the transaction, and every row they
    /// wrote is rolled back if `work` fails. In-memory registry state is the
    /// caller's to restore. Without an active store `work` runs directly.
    pub fn transaction<T>(&mut self, work: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let Some(store) = self.store.clone() else {
            return work(self);
        };

        let mut work = Some(work);
        let mut output = None;
        store.transaction(&mut || {
            let work = work
                .take()
                .ok_or_else(|| LunaError::invariant("Transaction body ran twice"))?;
            output = Some(work(&mut *self)?);
            Ok(())
        })?;
        output.ok_or_else(|| LunaError::invariant("Transaction finished without a result"))
    }

    /// Service-layer operations for `entity_type`.
    pub fn service(&mut self, entity_type: EntityType) -> Result<Service<'_>> {
        let composition = Arc::clone(self.require(entity_type)?.composition());
        Ok(Service::new(self, composition))
    }
}

fn missing_registry(entity_type: EntityType) -> LunaError {
    LunaError::invariant(format!("No registry for {}", entity_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Compositions;
    use crate::entity::EntityArgs;
    use crate::persistence::MemoryStore;
    use crate::plugins::builtin_implementations;

    fn create_test_manager() -> RegistryManager {
        let compositions = Compositions::build().unwrap();
        let mut manager = RegistryManager::new();
        manager
            .register_registry(
                compositions.get(EntityType::Database).unwrap(),
                builtin_implementations(EntityType::Database),
            )
            .unwrap();
        manager
            .activate_database("memory", Arc::new(MemoryStore::new()))
            .unwrap();
        manager
            .register_registry(compositions.get(EntityType::Project).unwrap(), Vec::new())
            .unwrap();
        manager
    }

    #[test]
    fn test_registry_per_type_is_unique() {
        let mut manager = create_test_manager();
        let project = Compositions::build()
            .unwrap()
            .get(EntityType::Project)
            .unwrap();
        let result = manager.register_registry(project, Vec::new());
        assert!(matches!(result, Err(LunaError::InvariantViolation { .. })));
        assert!(manager.require(EntityType::Integration).is_err());
    }

    #[test]
    fn test_activation_binds_database_registries() {
        let manager = create_test_manager();
        assert_eq!(manager.active_database().unwrap().name(), "memory");
        assert!(manager.require(EntityType::Project).unwrap().store().is_some());
        assert!(manager.require(EntityType::Database).unwrap().store().is_none());
    }

    #[test]
    fn test_activating_unknown_database_fails() {
        let mut manager = create_test_manager();
        let result = manager.activate_database("oracle", Arc::new(MemoryStore::new()));
        assert!(matches!(result, Err(LunaError::NotFound { .. })));
        assert_eq!(manager.active_database().unwrap().name(), "memory");
    }

    #[test]
    fn test_find_entities_across_registries() {
        let mut manager = create_test_manager();
        let project = manager
            .require_mut(EntityType::Project)
            .unwrap()
            .create(EntityArgs::named("sqlite-notes"))
            .unwrap()
            .entity_ref();

        let matches = manager.find_entities(|e| e.name().starts_with("sqlite"), None);
        assert_eq!(matches.len(), 2);
        assert!(matches.contains(&project));

        let only_projects = manager.find_entities(|_| true, Some(project.registry_id));
        assert_eq!(only_projects, vec![project]);
        assert_eq!(manager.resolve(&project).unwrap().name(), "sqlite-notes");
    }

    #[test]
    fn test_transaction_rolls_back_rows_written_inside() {
        let mut manager = create_test_manager();
        let store = manager.store().unwrap();

        let result: Result<()> = manager.transaction(|manager| {
            let projects = manager.require_mut(EntityType::Project)?;
            let id = projects.create(EntityArgs::named("doomed"))?.id();
            projects.persist(id)?;
            assert_eq!(store.select_all("project")?.len(), 1);
            Err(LunaError::Other("abort".into()))
        });

        assert!(matches!(result, Err(LunaError::Other(_))));
        assert!(store.select_all("project").unwrap().is_empty());

        let kept = manager
            .transaction(|manager| {
                let projects = manager.require_mut(EntityType::Project)?;
                let id = projects.create(EntityArgs::named("kept"))?.id();
                projects.persist(id)?;
                Ok(id)
            })
            .unwrap();
        assert_eq!(store.select_all("project").unwrap().len(), 1);
        assert!(manager.require(EntityType::Project).unwrap().get_by_id(kept).is_some());
    }
}
