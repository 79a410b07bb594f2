//! Per-entity-type base behavior.
//!
//! Every composed layer of an entity type sits on one [`EntityBase`]. It
//! supplies what capabilities cannot express generically: generated names,
//! the final initializer step, create and delete hooks, and the commands an
//! entity type offers beyond its capabilities.

use crate::command::CommandType;
use crate::config::NameConfig;
use crate::entity::{Entity, EntityArgs};
use crate::error::{LunaError, Result};
use crate::registry::{
    link_name, RegistryManager, INTEGRATION_FIELD, INTEGRATION_NAME_HINT, PROJECT_FIELD,
    PROJECT_NAME_HINT,
};
use crate::types::EntityType;
use tracing::{debug, warn};
use uuid::Uuid;

/// `<type>-<short id>`, the fallback for generated names.
fn generated_name(entity_type: EntityType, id: Uuid) -> String {
    let id = id.simple().to_string();
    format!("{}-{}", entity_type, &id[..NameConfig::GENERATED_ID_LEN])
}

/// Base hooks shared by all four layers of one entity type.
pub trait EntityBase: Send + Sync {
    /// Name given to entities whose name is generated.
    fn auto_name(&self, entity_type: EntityType, id: Uuid, _args: &EntityArgs) -> String {
        generated_name(entity_type, id)
    }

    /// Final initializer step, run after every composed entity step.
    fn initialize(&self, _entity: &mut Entity) -> Result<()> {
        Ok(())
    }

    /// Checks run on a constructed entity before it is registered.
    fn before_create(&self, _manager: &RegistryManager, _entity: &Entity) -> Result<()> {
        Ok(())
    }

    /// Cleanup run before an entity is deleted.
    fn before_delete(&self, _manager: &mut RegistryManager, _entity: &Entity) -> Result<()> {
        Ok(())
    }

    /// Follow-up run inside the rename transaction, after the renamed
    /// entity was persisted.
    fn after_rename(&self, _manager: &mut RegistryManager, _entity: &Entity) -> Result<()> {
        Ok(())
    }

    /// Commands offered on top of the capability commands.
    fn base_commands(&self) -> &'static [CommandType] {
        &[]
    }
}

pub struct ProjectBase;
pub struct IntegrationBase;
pub struct ProjectIntegrationBase;
pub struct DatabaseBase;

static PROJECT: ProjectBase = ProjectBase;
static INTEGRATION: IntegrationBase = IntegrationBase;
static PROJECT_INTEGRATION: ProjectIntegrationBase = ProjectIntegrationBase;
static DATABASE: DatabaseBase = DatabaseBase;

/// The base of `entity_type`.
pub fn for_type(entity_type: EntityType) -> &'static dyn EntityBase {
    match entity_type {
        EntityType::Project => &PROJECT,
        EntityType::Integration => &INTEGRATION,
        EntityType::ProjectIntegration => &PROJECT_INTEGRATION,
        EntityType::Database => &DATABASE,
    }
}

/// Delete every link touching `entity`.
fn delete_links(manager: &mut RegistryManager, entity: &Entity) -> Result<()> {
    let mut links = manager.service(EntityType::ProjectIntegration)?;
    let ids: Vec<Uuid> = match entity.entity_type() {
        EntityType::Project => links.links_for_project(entity.id())?,
        _ => links.links_for_integration(entity.id())?,
    }
    .into_iter()
    .map(|link| link.id)
    .collect();

    for id in &ids {
        links.delete(*id)?;
    }
    if !ids.is_empty() {
        debug!(
            "Deleted {} links of {} '{}'",
            ids.len(),
            entity.entity_type(),
            entity.name()
        );
    }
    Ok(())
}

/// Regenerate the names of every link touching the renamed `entity`.
///
/// In-memory names are put back if persisting any link fails.
fn relabel_links(manager: &mut RegistryManager, entity: &Entity) -> Result<()> {
    let service = manager.service(EntityType::ProjectIntegration)?;
    let links = match entity.entity_type() {
        EntityType::Project => service.links_for_project(entity.id())?,
        _ => service.links_for_integration(entity.id())?,
    };

    let projects = manager.require(EntityType::Project)?;
    let integrations = manager.require(EntityType::Integration)?;
    let names: Vec<(Uuid, String)> = links
        .iter()
        .filter_map(|link| {
            let project = projects.get_by_id(link.project_id)?;
            let integration = integrations.get_by_id(link.integration_id)?;
            Some((link.id, link_name(project.name(), integration.name())))
        })
        .collect();

    let registry = manager.require_mut(EntityType::ProjectIntegration)?;
    let mut previous = Vec::with_capacity(names.len());
    let outcome = names.iter().try_for_each(|(id, name)| {
        previous.push((*id, registry.relabel(*id, name)?));
        registry.persist(*id)
    });

    if let Err(e) = outcome {
        for (id, name) in previous.into_iter().rev() {
            if let Err(restore) = registry.relabel(id, &name) {
                warn!("Failed to restore link name '{}': {}", name, restore);
            }
        }
        return Err(e);
    }

    if !names.is_empty() {
        debug!(
            "Renamed {} links of {} '{}'",
            names.len(),
            entity.entity_type(),
            entity.name()
        );
    }
    Ok(())
}

impl EntityBase for ProjectBase {
    fn before_delete(&self, manager: &mut RegistryManager, entity: &Entity) -> Result<()> {
        delete_links(manager, entity)
    }

    fn after_rename(&self, manager: &mut RegistryManager, entity: &Entity) -> Result<()> {
        relabel_links(manager, entity)
    }

    fn base_commands(&self) -> &'static [CommandType] {
        &[
            CommandType::AddIntegration,
            CommandType::RemoveIntegration,
            CommandType::ListIntegrations,
        ]
    }
}

impl EntityBase for IntegrationBase {
    fn before_delete(&self, manager: &mut RegistryManager, entity: &Entity) -> Result<()> {
        delete_links(manager, entity)
    }

    fn after_rename(&self, manager: &mut RegistryManager, entity: &Entity) -> Result<()> {
        relabel_links(manager, entity)
    }
}

impl EntityBase for ProjectIntegrationBase {
    /// A link is named after its endpoints when their names are supplied.
    fn auto_name(&self, entity_type: EntityType, id: Uuid, args: &EntityArgs) -> String {
        match (
            args.hints.get(PROJECT_NAME_HINT),
            args.hints.get(INTEGRATION_NAME_HINT),
        ) {
            (Some(project), Some(integration)) => link_name(project, integration),
            _ => generated_name(entity_type, id),
        }
    }

    fn initialize(&self, entity: &mut Entity) -> Result<()> {
        entity.uuid_field(PROJECT_FIELD)?;
        entity.uuid_field(INTEGRATION_FIELD)?;
        Ok(())
    }

    fn before_create(&self, manager: &RegistryManager, entity: &Entity) -> Result<()> {
        let project_id = entity.uuid_field(PROJECT_FIELD)?;
        let integration_id = entity.uuid_field(INTEGRATION_FIELD)?;

        for (entity_type, id) in [
            (EntityType::Project, project_id),
            (EntityType::Integration, integration_id),
        ] {
            if manager.require(entity_type)?.get_by_id(id).is_none() {
                return Err(LunaError::not_found(entity_type, id.to_string()));
            }
        }

        if let Some(links) = manager.require(EntityType::ProjectIntegration)?.links() {
            links.check_vacant(project_id, integration_id)?;
        }
        Ok(())
    }
}

impl EntityBase for DatabaseBase {
    /// A database entity is named after its implementation.
    fn auto_name(&self, entity_type: EntityType, id: Uuid, args: &EntityArgs) -> String {
        match &args.implementation {
            Some(implementation) => implementation.clone(),
            None => generated_name(entity_type, id),
        }
    }

    fn base_commands(&self) -> &'static [CommandType] {
        &[CommandType::Clear, CommandType::Test]
    }
}
