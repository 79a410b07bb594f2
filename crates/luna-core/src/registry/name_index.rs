//! Secondary name -> entity index.

use std::collections::HashMap;
use uuid::Uuid;

/// Maps entity names to entity ids. Names are unique within one registry.
#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    by_name: HashMap<String, Uuid>,
}

impl NameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Uuid> {
        self.by_name.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Whether `name` is taken by an entity other than `id`.
    pub fn is_taken(&self, name: &str, id: Uuid) -> bool {
        self.get(name).is_some_and(|existing| existing != id)
    }

    pub fn insert(&mut self, name: impl Into<String>, id: Uuid) {
        self.by_name.insert(name.into(), id);
    }

    /// Remove `name` if it points at `id`.
    pub fn remove(&mut self, name: &str, id: Uuid) -> bool {
        if self.get(name) == Some(id) {
            self.by_name.remove(name);
            true
        } else {
            false
        }
    }

    /// Move `id` from `old_name` to `new_name`.
    pub fn rename(&mut self, id: Uuid, old_name: &str, new_name: &str) {
        self.remove(old_name, id);
        self.insert(new_name, id);
    }

    /// Names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rename_moves_entry() {
        let mut index = NameIndex::new();
        let id = Uuid::new_v4();
        index.insert("old", id);

        index.rename(id, "old", "new");

        assert_eq!(index.get("old"), None);
        assert_eq!(index.get("new"), Some(id));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_remove_only_matching_id() {
        let mut index = NameIndex::new();
        let id = Uuid::new_v4();
        index.insert("demo", id);

        assert!(!index.remove("demo", Uuid::new_v4()));
        assert!(index.contains("demo"));
        assert!(index.remove("demo", id));
        assert!(index.is_empty());
    }

    #[test]
    fn test_is_taken() {
        let mut index = NameIndex::new();
        let id = Uuid::new_v4();
        index.insert("demo", id);
        assert!(!index.is_taken("demo", id));
        assert!(index.is_taken("demo", Uuid::new_v4()));
        assert!(!index.is_taken("other", Uuid::new_v4()));
    }
}
