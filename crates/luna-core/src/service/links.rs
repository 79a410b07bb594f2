//! Project <-> integration operations.

use super::{EntityDetails, Service};
use crate::capability::Interface;
use crate::entity::EntityArgs;
use crate::error::{LunaError, Result};
use crate::registry::{
    Link, INTEGRATION_FIELD, INTEGRATION_NAME_HINT, PROJECT_FIELD, PROJECT_NAME_HINT,
};
use crate::types::EntityType;
use std::sync::Arc;
use uuid::Uuid;

impl Service<'_> {
    fn link_index(&self) -> Result<&crate::registry::LinkIndex> {
        self.composition.require(Interface::LinkQuery)?;
        self.registry()?
            .links()
            .ok_or_else(|| LunaError::unsupported(self.entity_type(), "link query"))
    }

    /// Links whose project side is `project_id`.
    pub fn links_for_project(&self, project_id: Uuid) -> Result<Vec<Arc<Link>>> {
        Ok(self.link_index()?.links_for_project(project_id))
    }

    /// Links whose integration side is `integration_id`.
    pub fn links_for_integration(&self, integration_id: Uuid) -> Result<Vec<Arc<Link>>> {
        Ok(self.link_index()?.links_for_integration(integration_id))
    }

    pub fn link(&self, project_id: Uuid, integration_id: Uuid) -> Result<Option<Arc<Link>>> {
        Ok(self.link_index()?.link(project_id, integration_id))
    }

    /// Link an integration to this project.
    pub fn add_integration(&mut self, project_id: Uuid, integration_id: Uuid) -> Result<EntityDetails> {
        self.expect_type(EntityType::Project, "add_integration")?;
        self.entity(project_id)?;
        create_link(self, project_id, integration_id)
    }

    /// Unlink an integration from this project.
    pub fn remove_integration(
        &mut self,
        project_id: Uuid,
        integration_id: Uuid,
    ) -> Result<EntityDetails> {
        self.expect_type(EntityType::Project, "remove_integration")?;
        self.entity(project_id)?;

        let mut links = self.manager.service(EntityType::ProjectIntegration)?;
        let link = links.link(project_id, integration_id)?.ok_or_else(|| {
            LunaError::not_found(
                EntityType::ProjectIntegration,
                format!("{} <-> {}", project_id, integration_id),
            )
        })?;
        links.delete(link.id)
    }

    /// Integrations linked to this project, sorted by name.
    pub fn list_integrations(&mut self, project_id: Uuid) -> Result<Vec<EntityDetails>> {
        self.expect_type(EntityType::Project, "list_integrations")?;
        self.entity(project_id)?;

        let links = self
            .manager
            .service(EntityType::ProjectIntegration)?
            .links_for_project(project_id)?;
        let integrations = self.manager.require(EntityType::Integration)?;

        let mut details: Vec<EntityDetails> = links
            .iter()
            .filter_map(|link| integrations.get_by_id(link.integration_id))
            .map(EntityDetails::from)
            .collect();
        details.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(details)
    }

    /// Link this integration to a project.
    pub fn add_to_project(&mut self, integration_id: Uuid, project_id: Uuid) -> Result<EntityDetails> {
        self.expect_type(EntityType::Integration, "add_to_project")?;
        self.entity(integration_id)?;
        create_link(self, project_id, integration_id)
    }
}

/// Create the link entity; it is named `<project>-<integration>`.
fn create_link(service: &mut Service<'_>, project_id: Uuid, integration_id: Uuid) -> Result<EntityDetails> {
    let mut args = EntityArgs::new()
        .field(PROJECT_FIELD, project_id.to_string())
        .field(INTEGRATION_FIELD, integration_id.to_string());
    for (entity_type, id, hint) in [
        (EntityType::Project, project_id, PROJECT_NAME_HINT),
        (EntityType::Integration, integration_id, INTEGRATION_NAME_HINT),
    ] {
        // Missing endpoints are reported by the link's create checks.
        if let Some(endpoint) = service.manager.require(entity_type)?.get_by_id(id) {
            args = args.hint(hint, endpoint.name());
        }
    }

    service
        .manager
        .service(EntityType::ProjectIntegration)?
        .create(args)
}
