//! Value-type references to entities in other registries.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `(entity_id, registry_id)` pair used for cross-registry lookup.
///
/// Equality and hashing use only the two ids. A reference never keeps its
/// target alive; resolve it through the registry manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_id: Uuid,
    pub registry_id: Uuid,
}

impl EntityRef {
    pub fn new(entity_id: Uuid, registry_id: Uuid) -> Self {
        Self {
            entity_id,
            registry_id,
        }
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.entity_id, self.registry_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equality_by_ids() {
        let registry = Uuid::new_v4();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert_eq!(EntityRef::new(first, registry), EntityRef::new(first, registry));
        assert_ne!(EntityRef::new(first, registry), EntityRef::new(second, registry));
        assert_ne!(
            EntityRef::new(first, registry),
            EntityRef::new(first, Uuid::new_v4())
        );
    }

    #[test]
    fn test_hash_by_ids() {
        let registry = Uuid::new_v4();
        let id = Uuid::new_v4();
        let set: HashSet<_> = [EntityRef::new(id, registry), EntityRef::new(id, registry)]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 1);
    }
}
