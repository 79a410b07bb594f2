//! In-memory store of the entities of one type.

use super::link_index::{Link, LinkIndex, INTEGRATION_FIELD, PROJECT_FIELD};
use super::name_index::NameIndex;
use crate::capability::{Behavior, Composition};
use crate::entity::{Entity, EntityArgs, EntityRef};
use crate::error::{LunaError, Result};
use crate::persistence::{self, Persistence, UpsertOutcome};
use crate::plugins::Implementation;
use crate::types::EntityType;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of loading persisted rows into a registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadResult {
    pub loaded: usize,
    /// One message per row that could not be rebuilt.
    pub errors: Vec<String>,
}

/// Owns every entity of one composed type.
///
/// Name, link, persistence and implementation support are present only
/// when the matching registry behavior was composed in.
pub struct Registry {
    id: Uuid,
    composition: Arc<Composition>,
    entities: HashMap<Uuid, Entity>,
    names: Option<NameIndex>,
    links: Option<LinkIndex>,
    store: Option<Arc<dyn Persistence>>,
    implementations: Vec<Implementation>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("id", &self.id)
            .field("type_name", &self.composition.registry.type_name)
            .field("entities", &self.entities.len())
            .field("store", &self.store.as_ref().map(|s| s.name().to_string()))
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Create an empty registry. Nothing is loaded yet.
    pub fn new(
        id: Uuid,
        composition: Arc<Composition>,
        store: Option<Arc<dyn Persistence>>,
        implementations: Vec<Implementation>,
    ) -> Self {
        let names = composition
            .has(Behavior::NameIndexedRegistry)
            .then(NameIndex::new);
        let links = composition
            .has(Behavior::LinkIndexedRegistry)
            .then(LinkIndex::new);
        let implementations = if composition.has(Behavior::DiscoverableImplementationRegistry) {
            implementations
        } else {
            Vec::new()
        };

        Self {
            id,
            composition,
            entities: HashMap::new(),
            names,
            links,
            store,
            implementations,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn entity_type(&self) -> EntityType {
        self.composition.entity_type
    }

    pub fn composition(&self) -> &Arc<Composition> {
        &self.composition
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    // ========================================
    // Registration
    // ========================================

    /// Insert a fully constructed entity.
    ///
    /// All checks run before any index is touched, so a failure leaves the
    /// registry unchanged.
    pub fn register(&mut self, entity: Entity) -> Result<&Entity> {
        let id = entity.id();
        if entity.registry_id() != self.id || entity.entity_type() != self.entity_type() {
            return Err(LunaError::invariant(format!(
                "{} {} does not belong to registry {}",
                entity.entity_type(),
                id,
                self.id
            )));
        }
        if self.entities.contains_key(&id) {
            return Err(LunaError::invariant(format!(
                "{} {} is already registered",
                entity.entity_type(),
                id
            )));
        }
        if let Some(names) = &self.names {
            if names.contains(entity.name()) {
                return Err(LunaError::DuplicateName {
                    entity_type: self.entity_type(),
                    name: entity.name().to_string(),
                });
            }
        }
        let link = match &self.links {
            Some(links) => {
                let link = link_of(&entity)?;
                links.check_vacant(link.project_id, link.integration_id)?;
                Some(link)
            }
            None => None,
        };

        if let Some(names) = &mut self.names {
            names.insert(entity.name(), id);
        }
        if let (Some(links), Some(link)) = (&mut self.links, link) {
            links.add_link(link)?;
        }
        debug!("Registered {} '{}' ({})", entity.entity_type(), entity.name(), id);
        Ok(self.entities.entry(id).or_insert(entity))
    }

    /// Remove an entity and every secondary index entry pointing at it.
    pub fn unregister(&mut self, id: Uuid) -> Result<Entity> {
        let entity = self
            .entities
            .get(&id)
            .ok_or_else(|| LunaError::not_found(self.entity_type(), id.to_string()))?;

        if let Some(links) = &mut self.links {
            links.remove_link(&link_of(entity)?)?;
        }
        if let Some(names) = &mut self.names {
            names.remove(entity.name(), id);
        }

        let entity = self
            .entities
            .remove(&id)
            .ok_or_else(|| LunaError::invariant("entity vanished during unregister"))?;
        debug!("Unregistered {} '{}' ({})", entity.entity_type(), entity.name(), id);
        Ok(entity)
    }

    /// Construct an entity and register it as one step.
    ///
    /// If construction fails nothing is registered.
    pub fn create(&mut self, args: EntityArgs) -> Result<&Entity> {
        let entity = Entity::new(Arc::clone(&self.composition), self.id, args)?;
        self.register(entity)
    }

    // ========================================
    // Lookup
    // ========================================

    pub fn get_by_id(&self, id: Uuid) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: Uuid) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Resolve a reference that points into this registry.
    pub fn get_by_ref(&self, entity_ref: &EntityRef) -> Option<&Entity> {
        if entity_ref.registry_id != self.id {
            return None;
        }
        self.get_by_id(entity_ref.entity_id)
    }

    pub fn get_all(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.values()
    }

    pub fn find<'a, F>(&'a self, predicate: F) -> impl Iterator<Item = &'a Entity> + 'a
    where
        F: Fn(&Entity) -> bool + 'a,
    {
        self.entities.values().filter(move |entity| predicate(entity))
    }

    // ========================================
    // Name index
    // ========================================

    pub fn get_by_name(&self, name: &str) -> Option<&Entity> {
        let id = self.names.as_ref()?.get(name)?;
        self.entities.get(&id)
    }

    /// Like [`Registry::get_by_name`], but a miss is `NotFound`.
    pub fn require_by_name(&self, name: &str) -> Result<&Entity> {
        self.get_by_name(name)
            .ok_or_else(|| LunaError::not_found(self.entity_type(), name))
    }

    /// Indexed names in sorted order.
    pub fn list_names(&self) -> Vec<String> {
        self.names.as_ref().map(NameIndex::names).unwrap_or_default()
    }

    /// Re-point the name index after an entity's name changed from
    /// `old_name`.
    pub fn update_name_index(&mut self, id: Uuid, old_name: &str) -> Result<()> {
        let entity = self
            .entities
            .get(&id)
            .ok_or_else(|| LunaError::not_found(self.entity_type(), id.to_string()))?;
        if let Some(names) = &mut self.names {
            names.rename(id, old_name, entity.name());
        }
        Ok(())
    }

    /// Rename an entity and update the name index. Returns the old name.
    pub fn rename(&mut self, id: Uuid, new_name: &str) -> Result<String> {
        self.replace_name(id, new_name, Entity::set_name)
    }

    /// Like [`Registry::rename`], but also replaces read-only generated
    /// names.
    pub(crate) fn relabel(&mut self, id: Uuid, new_name: &str) -> Result<String> {
        self.replace_name(id, new_name, Entity::relabel)
    }

    fn replace_name(
        &mut self,
        id: Uuid,
        new_name: &str,
        set: fn(&mut Entity, &str) -> Result<String>,
    ) -> Result<String> {
        let entity_type = self.entity_type();
        if let Some(names) = &self.names {
            if names.is_taken(new_name, id) {
                return Err(LunaError::DuplicateName {
                    entity_type,
                    name: new_name.to_string(),
                });
            }
        }

        let entity = self
            .entities
            .get_mut(&id)
            .ok_or_else(|| LunaError::not_found(entity_type, id.to_string()))?;
        let old_name = set(entity, new_name)?;
        self.update_name_index(id, &old_name)?;
        Ok(old_name)
    }

    // ========================================
    // Link index
    // ========================================

    pub fn links(&self) -> Option<&LinkIndex> {
        self.links.as_ref()
    }

    // ========================================
    // Persistence
    // ========================================

    pub fn store(&self) -> Option<&Arc<dyn Persistence>> {
        self.store.as_ref()
    }

    /// Swap the persistence handle. Registries without database support
    /// ignore it.
    pub fn bind_store(&mut self, store: Arc<dyn Persistence>) {
        if self.composition.has(Behavior::DatabaseRegistry) {
            debug!("{} bound to {} store", self.composition.registry.type_name, store.name());
            self.store = Some(store);
        }
    }

    fn require_store(&self) -> Result<(&Arc<dyn Persistence>, &'static str)> {
        let table = persistence::table_for(self.entity_type()).ok_or_else(|| {
            LunaError::unsupported(self.entity_type(), "persistence")
        })?;
        let store = self.store.as_ref().ok_or_else(|| LunaError::Database {
            message: format!("No active database for {}", self.entity_type()),
            source: None,
        })?;
        Ok((store, table.name))
    }

    /// Write an entity's row, recording a newly assigned row id.
    ///
    /// A no-op for registries without database support.
    pub fn persist(&mut self, id: Uuid) -> Result<()> {
        if !self.composition.has(Behavior::DatabaseRegistry) {
            return Ok(());
        }
        let (store, table) = self.require_store()?;
        let entity = self
            .entities
            .get(&id)
            .ok_or_else(|| LunaError::not_found(self.entity_type(), id.to_string()))?;

        let outcome = store.upsert(table, &entity.to_row())?;
        if let UpsertOutcome::Inserted(db_id) = outcome {
            if let Some(entity) = self.entities.get_mut(&id) {
                entity.set_db_id(db_id);
            }
        }
        Ok(())
    }

    /// Delete an entity's row, if it has one.
    pub fn delete_persisted(&self, entity: &Entity) -> Result<()> {
        if !self.composition.has(Behavior::DatabaseRegistry) {
            return Ok(());
        }
        let Some(db_id) = entity.db_id() else {
            return Ok(());
        };
        let (store, table) = self.require_store()?;
        store.delete(table, db_id)
    }

    /// Rebuild entities from every persisted row.
    ///
    /// Rows that fail to rebuild are logged and skipped.
    pub fn autoload(&mut self) -> Result<LoadResult> {
        let mut result = LoadResult::default();
        if !self.composition.has(Behavior::DatabaseRegistry) {
            return Ok(result);
        }
        let rows = match self.require_store() {
            Ok((store, table)) => store.select_all(table)?,
            Err(e) => {
                debug!("Skipping autoload: {}", e);
                return Ok(result);
            }
        };

        for row in rows {
            let outcome = EntityArgs::from_row(&row).and_then(|args| self.create(args).map(|_| ()));
            match outcome {
                Ok(()) => result.loaded += 1,
                Err(e) => {
                    warn!("Skipping {} row: {}", self.entity_type(), e);
                    result.errors.push(e.to_string());
                }
            }
        }

        info!(
            "Loaded {} {} entities ({} skipped)",
            result.loaded,
            self.entity_type(),
            result.errors.len()
        );
        Ok(result)
    }

    // ========================================
    // Implementations
    // ========================================

    /// Discovered implementations, built-ins first.
    pub fn discover(&self) -> &[Implementation] {
        &self.implementations
    }

    pub fn is_implementation(&self, name: &str) -> bool {
        self.implementations.iter().any(|i| i.name == name)
    }

    /// Create one entity per discovered implementation not yet present.
    pub fn load_implementations(&mut self) -> Result<usize> {
        if !self.composition.has(Behavior::LoadableImplementationRegistry) {
            return Ok(0);
        }
        let pending: Vec<String> = self
            .implementations
            .iter()
            .filter(|i| self.get_by_name(&i.name).is_none())
            .map(|i| i.name.clone())
            .collect();

        for name in &pending {
            self.create(EntityArgs::new().implementation(name.as_str()))?;
        }
        debug!("Loaded {} {} implementations", pending.len(), self.entity_type());
        Ok(pending.len())
    }
}

/// Link endpoints recorded on a link entity.
fn link_of(entity: &Entity) -> Result<Link> {
    Ok(Link {
        id: entity.id(),
        project_id: entity.uuid_field(PROJECT_FIELD)?,
        integration_id: entity.uuid_field(INTEGRATION_FIELD)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Compositions;
    use crate::persistence::{MemoryStore, TABLES};
    use crate::registry::{INTEGRATION_NAME_HINT, PROJECT_NAME_HINT};

    fn registry(entity_type: EntityType) -> Registry {
        let composition = Compositions::build().unwrap().get(entity_type).unwrap();
        Registry::new(Uuid::new_v4(), composition, None, Vec::new())
    }

    fn link_args(project: Uuid, integration: Uuid) -> EntityArgs {
        EntityArgs::new()
            .field(PROJECT_FIELD, project.to_string())
            .field(INTEGRATION_FIELD, integration.to_string())
    }

    #[test]
    fn test_create_registers_once() {
        let mut projects = registry(EntityType::Project);
        let id = projects.create(EntityArgs::named("demo")).unwrap().id();

        assert_eq!(projects.len(), 1);
        let again = projects.get_by_id(id).unwrap().clone();
        assert!(matches!(
            projects.register(again),
            Err(LunaError::InvariantViolation { .. })
        ));
        assert_eq!(projects.len(), 1);
    }

    #[test]
    fn test_failed_construction_registers_nothing() {
        let mut projects = registry(EntityType::Project);
        assert!(projects.create(EntityArgs::named("bad|name")).is_err());
        assert!(projects.is_empty());

        // Fails in the final base step: link endpoints are missing.
        let mut links = registry(EntityType::ProjectIntegration);
        assert!(links.create(EntityArgs::new()).is_err());
        assert!(links.is_empty());
    }

    #[test]
    fn test_duplicate_name_leaves_indices_untouched() {
        let mut projects = registry(EntityType::Project);
        let first = projects.create(EntityArgs::named("demo")).unwrap().id();

        assert!(matches!(
            projects.create(EntityArgs::named("demo")),
            Err(LunaError::DuplicateName { .. })
        ));
        assert_eq!(projects.len(), 1);
        assert_eq!(projects.get_by_name("demo").map(Entity::id), Some(first));
    }

    #[test]
    fn test_rename_updates_index() {
        let mut projects = registry(EntityType::Project);
        let id = projects.create(EntityArgs::named("old")).unwrap().id();
        projects.create(EntityArgs::named("taken")).unwrap();

        assert!(matches!(
            projects.rename(id, "taken"),
            Err(LunaError::DuplicateName { .. })
        ));
        assert_eq!(projects.rename(id, "new").unwrap(), "old");
        assert!(projects.get_by_name("old").is_none());
        assert_eq!(projects.get_by_name("new").map(Entity::id), Some(id));
        assert_eq!(projects.list_names(), vec!["new", "taken"]);
    }

    #[test]
    fn test_unregister_clears_indices() {
        let mut projects = registry(EntityType::Project);
        let entity_ref = projects.create(EntityArgs::named("demo")).unwrap().entity_ref();

        projects.unregister(entity_ref.entity_id).unwrap();

        assert!(projects.get_by_name("demo").is_none());
        assert!(projects.get_by_ref(&entity_ref).is_none());
        assert!(matches!(
            projects.unregister(entity_ref.entity_id),
            Err(LunaError::NotFound { .. })
        ));
    }

    #[test]
    fn test_link_registry_indexes_both_ends() {
        let mut links = registry(EntityType::ProjectIntegration);
        let (p, i) = (Uuid::new_v4(), Uuid::new_v4());

        let id = links.create(link_args(p, i)).unwrap().id();
        assert!(matches!(
            links.create(link_args(p, i)),
            Err(LunaError::DuplicateLink { .. })
        ));
        assert_eq!(links.len(), 1);

        let index = links.links().unwrap();
        assert_eq!(index.links_for_project(p)[0].id, id);
        assert_eq!(index.links_for_integration(i)[0].id, id);

        links.unregister(id).unwrap();
        let index = links.links().unwrap();
        assert!(index.links_for_project(p).is_empty());
        assert!(index.links_for_integration(i).is_empty());
    }

    #[test]
    fn test_generated_names_are_relabeled_not_renamed() {
        let mut links = registry(EntityType::ProjectIntegration);
        let args = link_args(Uuid::new_v4(), Uuid::new_v4())
            .hint(PROJECT_NAME_HINT, "blog")
            .hint(INTEGRATION_NAME_HINT, "site");
        let id = links.create(args).unwrap().id();
        assert_eq!(links.get_by_id(id).unwrap().name(), "blog-site");

        assert!(matches!(
            links.rename(id, "journal-site"),
            Err(LunaError::ReadOnlyName { .. })
        ));
        assert_eq!(links.relabel(id, "journal-site").unwrap(), "blog-site");
        assert_eq!(links.get_by_id(id).unwrap().name(), "journal-site");
    }

    #[test]
    fn test_find_and_get_all() {
        let mut projects = registry(EntityType::Project);
        for name in ["alpha", "beta", "gamma"] {
            projects.create(EntityArgs::named(name)).unwrap();
        }

        assert_eq!(projects.get_all().count(), 3);
        let found: Vec<_> = projects.find(|e| e.name().contains('a')).collect();
        assert_eq!(found.len(), 3);
        assert_eq!(projects.find(|e| e.name().starts_with('b')).count(), 1);
    }

    #[test]
    fn test_persist_and_autoload() {
        let store: Arc<dyn Persistence> = Arc::new(MemoryStore::new());
        store.ensure_tables(&TABLES).unwrap();

        let mut projects = registry(EntityType::Project);
        projects.bind_store(Arc::clone(&store));
        let id = projects.create(EntityArgs::named("demo")).unwrap().id();
        projects.persist(id).unwrap();
        assert_eq!(projects.get_by_id(id).unwrap().db_id(), Some(1));

        let mut reloaded = registry(EntityType::Project);
        reloaded.bind_store(store);
        let result = reloaded.autoload().unwrap();

        assert_eq!(result.loaded, 1);
        let entity = reloaded.get_by_name("demo").unwrap();
        assert_eq!(entity.id(), id);
        assert_eq!(entity.db_id(), Some(1));
    }

    #[test]
    fn test_persist_without_store_fails() {
        let mut projects = registry(EntityType::Project);
        let id = projects.create(EntityArgs::named("demo")).unwrap().id();
        assert!(matches!(projects.persist(id), Err(LunaError::Database { .. })));
    }

    #[test]
    fn test_load_implementations() {
        let composition = Compositions::build()
            .unwrap()
            .get(EntityType::Database)
            .unwrap();
        let implementations = crate::plugins::builtin_implementations(EntityType::Database);
        let mut databases = Registry::new(Uuid::new_v4(), composition, None, implementations);

        assert_eq!(databases.load_implementations().unwrap(), 2);
        assert_eq!(databases.load_implementations().unwrap(), 0);
        assert_eq!(databases.list_names(), vec!["memory", "sqlite"]);
        assert!(databases.is_implementation("sqlite"));
        assert_eq!(
            databases.get_by_name("sqlite").unwrap().implementation(),
            Some("sqlite")
        );
    }
}
