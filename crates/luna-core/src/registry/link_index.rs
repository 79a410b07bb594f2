//! Bidirectional project <-> integration link index.
//!
//! Every link lives in both maps as the same shared object, so removing it
//! from one side without the other is detectable.

use crate::error::{LunaError, Result};
use crate::types::EntityType;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Field naming the project side of a link entity.
pub const PROJECT_FIELD: &str = "project_uuid";
/// Field naming the integration side of a link entity.
pub const INTEGRATION_FIELD: &str = "integration_uuid";

/// Construction hints carrying the endpoint names a link is named after.
pub const PROJECT_NAME_HINT: &str = "project_name";
pub const INTEGRATION_NAME_HINT: &str = "integration_name";

/// Generated name of the link between `project` and `integration`.
pub fn link_name(project: &str, integration: &str) -> String {
    format!("{}-{}", project, integration)
}

/// One project <-> integration relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Link {
    /// Id of the link entity itself.
    pub id: Uuid,
    pub project_id: Uuid,
    pub integration_id: Uuid,
}

/// Many-to-many index keyed from both ends.
#[derive(Debug, Clone, Default)]
pub struct LinkIndex {
    by_project: HashMap<Uuid, HashMap<Uuid, Arc<Link>>>,
    by_integration: HashMap<Uuid, HashMap<Uuid, Arc<Link>>>,
}

impl LinkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail with `DuplicateLink` if the pair is already indexed.
    pub fn check_vacant(&self, project_id: Uuid, integration_id: Uuid) -> Result<()> {
        if self.link(project_id, integration_id).is_some() {
            return Err(LunaError::DuplicateLink {
                project_id,
                integration_id,
            });
        }
        Ok(())
    }

    pub fn add_link(&mut self, link: Link) -> Result<Arc<Link>> {
        self.check_vacant(link.project_id, link.integration_id)?;

        let link = Arc::new(link);
        self.by_project
            .entry(link.project_id)
            .or_default()
            .insert(link.integration_id, Arc::clone(&link));
        self.by_integration
            .entry(link.integration_id)
            .or_default()
            .insert(link.project_id, Arc::clone(&link));
        Ok(link)
    }

    /// Remove `link` from both maps.
    ///
    /// A link missing from either side means the index is corrupt.
    pub fn remove_link(&mut self, link: &Link) -> Result<Arc<Link>> {
        let in_project = self
            .by_project
            .get(&link.project_id)
            .and_then(|links| links.get(&link.integration_id))
            .is_some_and(|found| found.id == link.id);
        let in_integration = self
            .by_integration
            .get(&link.integration_id)
            .and_then(|links| links.get(&link.project_id))
            .is_some_and(|found| found.id == link.id);

        if !in_project || !in_integration {
            return Err(LunaError::invariant(format!(
                "{} link {} is missing from the {} index",
                EntityType::ProjectIntegration,
                link.id,
                if in_project { "integration" } else { "project" }
            )));
        }

        let removed = remove_nested(&mut self.by_project, link.project_id, link.integration_id);
        remove_nested(&mut self.by_integration, link.integration_id, link.project_id);
        removed.ok_or_else(|| LunaError::invariant("link vanished during removal"))
    }

    pub fn links_for_project(&self, project_id: Uuid) -> Vec<Arc<Link>> {
        collect(self.by_project.get(&project_id))
    }

    pub fn links_for_integration(&self, integration_id: Uuid) -> Vec<Arc<Link>> {
        collect(self.by_integration.get(&integration_id))
    }

    pub fn link(&self, project_id: Uuid, integration_id: Uuid) -> Option<Arc<Link>> {
        self.by_project
            .get(&project_id)
            .and_then(|links| links.get(&integration_id))
            .cloned()
    }

    /// Number of links.
    pub fn len(&self) -> usize {
        self.by_project.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_project.is_empty()
    }
}

fn remove_nested(
    map: &mut HashMap<Uuid, HashMap<Uuid, Arc<Link>>>,
    outer: Uuid,
    inner: Uuid,
) -> Option<Arc<Link>> {
    let links = map.get_mut(&outer)?;
    let removed = links.remove(&inner);
    if links.is_empty() {
        map.remove(&outer);
    }
    removed
}

fn collect(links: Option<&HashMap<Uuid, Arc<Link>>>) -> Vec<Arc<Link>> {
    let mut links: Vec<Arc<Link>> = links
        .map(|links| links.values().cloned().collect())
        .unwrap_or_default();
    links.sort_by_key(|link| link.id);
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(project_id: Uuid, integration_id: Uuid) -> Link {
        Link {
            id: Uuid::new_v4(),
            project_id,
            integration_id,
        }
    }

    #[test]
    fn test_add_link_indexes_both_sides() {
        let mut index = LinkIndex::new();
        let (p, i) = (Uuid::new_v4(), Uuid::new_v4());

        let added = index.add_link(link(p, i)).unwrap();

        let by_project = index.links_for_project(p);
        let by_integration = index.links_for_integration(i);
        assert_eq!(by_project.len(), 1);
        assert_eq!(by_integration.len(), 1);
        assert!(Arc::ptr_eq(&by_project[0], &added));
        assert!(Arc::ptr_eq(&by_integration[0], &added));
        assert_eq!(index.link(p, i).map(|l| l.id), Some(added.id));
    }

    #[test]
    fn test_duplicate_link() {
        let mut index = LinkIndex::new();
        let (p, i) = (Uuid::new_v4(), Uuid::new_v4());
        index.add_link(link(p, i)).unwrap();

        assert!(matches!(
            index.add_link(link(p, i)),
            Err(LunaError::DuplicateLink { project_id, integration_id })
                if project_id == p && integration_id == i
        ));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_remove_link_clears_both_sides() {
        let mut index = LinkIndex::new();
        let (p, i) = (Uuid::new_v4(), Uuid::new_v4());
        let added = index.add_link(link(p, i)).unwrap();
        index.add_link(link(p, Uuid::new_v4())).unwrap();

        index.remove_link(&added).unwrap();

        assert_eq!(index.links_for_project(p).len(), 1);
        assert!(index.links_for_integration(i).is_empty());
        assert!(index.link(p, i).is_none());
    }

    #[test]
    fn test_remove_missing_link_is_invariant_violation() {
        let mut index = LinkIndex::new();
        let result = index.remove_link(&link(Uuid::new_v4(), Uuid::new_v4()));
        assert!(matches!(result, Err(LunaError::InvariantViolation { .. })));
    }

    #[test]
    fn test_one_sided_link_is_detected() {
        let mut index = LinkIndex::new();
        let (p, i) = (Uuid::new_v4(), Uuid::new_v4());
        let added = index.add_link(link(p, i)).unwrap();
        index.by_integration.clear();

        assert!(matches!(
            index.remove_link(&added),
            Err(LunaError::InvariantViolation { .. })
        ));
    }
}
