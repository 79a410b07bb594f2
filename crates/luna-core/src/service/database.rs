//! Operations on the active database.

use super::Service;
use crate::capability::Behavior;
use crate::error::{LunaError, Result};
use crate::persistence::Persistence;
use crate::types::EntityType;
use std::sync::Arc;
use tracing::info;

impl Service<'_> {
    fn active_store(&self) -> Result<Arc<dyn Persistence>> {
        self.manager.store().ok_or_else(|| LunaError::Database {
            message: "No active database".to_string(),
            source: None,
        })
    }

    /// Delete every persisted row and drop the matching in-memory entities.
    ///
    /// Returns the number of entities removed.
    pub fn clear(&mut self) -> Result<usize> {
        self.expect_type(EntityType::Database, "clear")?;
        let store = self.active_store()?;
        store.clear()?;

        let mut removed = 0;
        for entity_type in EntityType::ALL {
            let Some(registry) = self.manager.get_by_entity_type_mut(entity_type) else {
                continue;
            };
            if !registry.composition().has(Behavior::DatabaseRegistry) {
                continue;
            }
            let ids: Vec<_> = registry.get_all().map(|e| e.id()).collect();
            for id in ids {
                registry.unregister(id)?;
                removed += 1;
            }
        }

        info!("Cleared {} database ({} entities)", store.name(), removed);
        Ok(removed)
    }

    /// Check the active database answers.
    pub fn test(&self) -> Result<String> {
        self.expect_type(EntityType::Database, "test")?;
        let store = self.active_store()?;
        store.ping()?;
        Ok(store.name().to_string())
    }
}
