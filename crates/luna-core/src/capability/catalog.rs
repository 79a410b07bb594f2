//! The static capability catalog and per-entity-type declarations.

use super::behavior::{Behavior, Interface};
use super::descriptor::CapabilityDescriptor;
use crate::types::EntityType;
use std::collections::BTreeMap;
use std::sync::LazyLock;

pub static LISTABLE: CapabilityDescriptor = CapabilityDescriptor {
    name: "Listable",
    service: &[Behavior::ListableService],
    command: &[Behavior::ListableCommand],
    ..CapabilityDescriptor::EMPTY
};

pub static DATABASE: CapabilityDescriptor = CapabilityDescriptor {
    name: "Database",
    entity: &[Behavior::DatabaseProperty],
    registry: &[Behavior::DatabaseRegistry],
    ..CapabilityDescriptor::EMPTY
};

/// Created by the system with a generated, read-only name.
pub static CREATABLE: CapabilityDescriptor = CapabilityDescriptor {
    name: "Creatable",
    entity: &[Behavior::ReadOnlyNameProperty],
    registry: &[Behavior::NameIndexedRegistry],
    service: &[Behavior::CreatableService],
    command: &[Behavior::CreatableCommand],
    capability_dependencies: &["Database"],
    ..CapabilityDescriptor::EMPTY
};

pub static DELETABLE: CapabilityDescriptor = CapabilityDescriptor {
    name: "Deletable",
    service: &[Behavior::DeletableService],
    command: &[Behavior::DeletableCommand],
    interface_dependencies: &[Interface::Creatable],
    ..CapabilityDescriptor::EMPTY
};

/// Created by the user with a user-provided name.
pub static NAMEABLE: CapabilityDescriptor = CapabilityDescriptor {
    name: "Nameable",
    entity: &[Behavior::UserNameableProperty],
    registry: &[Behavior::NameIndexedRegistry],
    service: &[Behavior::CreatableService],
    command: &[Behavior::UserNameableCommand],
    capability_dependencies: &["Database"],
    ..CapabilityDescriptor::EMPTY
};

pub static RENAMABLE: CapabilityDescriptor = CapabilityDescriptor {
    name: "Renamable",
    service: &[Behavior::RenamableService],
    command: &[Behavior::RenamableCommand],
    behavior_dependencies: &[Behavior::UserNameableProperty],
    ..CapabilityDescriptor::EMPTY
};

pub static EDITABLE: CapabilityDescriptor = CapabilityDescriptor {
    name: "Editable",
    entity: &[Behavior::ConfigProperty],
    service: &[Behavior::EditableService],
    command: &[Behavior::EditableCommand],
    capability_dependencies: &["Database"],
    ..CapabilityDescriptor::EMPTY
};

pub static DISCOVERABLE_IMPLEMENTATION: CapabilityDescriptor = CapabilityDescriptor {
    name: "DiscoverableImplementation",
    entity: &[Behavior::ImplementationProperty],
    registry: &[Behavior::DiscoverableImplementationRegistry],
    service: &[Behavior::DiscoverableImplementationService],
    command: &[Behavior::DiscoverableImplementationCommand],
    ..CapabilityDescriptor::EMPTY
};

/// One entity per discovered implementation, created at registry startup.
pub static LOADABLE_IMPLEMENTATION: CapabilityDescriptor = CapabilityDescriptor {
    name: "LoadableImplementation",
    entity: &[Behavior::ReadOnlyNameProperty],
    registry: &[
        Behavior::NameIndexedRegistry,
        Behavior::LoadableImplementationRegistry,
    ],
    service: &[Behavior::LoadableImplementationService],
    capability_dependencies: &["DiscoverableImplementation"],
    ..CapabilityDescriptor::EMPTY
};

/// User-named entities backed by a chosen implementation.
pub static USER_NAMEABLE_IMPLEMENTATION: CapabilityDescriptor = CapabilityDescriptor {
    name: "UserNameableImplementation",
    entity: &[Behavior::UserNameableProperty],
    registry: &[Behavior::NameIndexedRegistry],
    service: &[Behavior::CreatableImplementationService],
    command: &[Behavior::CreatableImplementationCommand],
    capability_dependencies: &["DiscoverableImplementation"],
    ..CapabilityDescriptor::EMPTY
};

/// Many-to-many link entities indexed by both endpoints.
pub static LINKABLE: CapabilityDescriptor = CapabilityDescriptor {
    name: "Linkable",
    registry: &[Behavior::LinkIndexedRegistry],
    service: &[Behavior::LinkQueryService],
    interface_dependencies: &[Interface::Creatable],
    ..CapabilityDescriptor::EMPTY
};

static ALL: [&CapabilityDescriptor; 11] = [
    &LISTABLE,
    &DATABASE,
    &CREATABLE,
    &DELETABLE,
    &NAMEABLE,
    &RENAMABLE,
    &EDITABLE,
    &DISCOVERABLE_IMPLEMENTATION,
    &LOADABLE_IMPLEMENTATION,
    &USER_NAMEABLE_IMPLEMENTATION,
    &LINKABLE,
];

static BY_NAME: LazyLock<BTreeMap<&'static str, &'static CapabilityDescriptor>> =
    LazyLock::new(|| ALL.iter().map(|cap| (cap.name, *cap)).collect());

/// Look up a capability by name.
pub fn get(name: &str) -> Option<&'static CapabilityDescriptor> {
    BY_NAME.get(name).copied()
}

/// Every capability in the catalog, keyed by name.
pub fn all() -> impl Iterator<Item = &'static CapabilityDescriptor> {
    BY_NAME.values().copied()
}

/// Capabilities declared for an entity type, in declaration order.
pub fn declared(entity_type: EntityType) -> &'static [&'static CapabilityDescriptor] {
    match entity_type {
        EntityType::Project => &PROJECT,
        EntityType::Integration => &INTEGRATION,
        EntityType::ProjectIntegration => &PROJECT_INTEGRATION,
        EntityType::Database => &DATABASE_ENTITY,
    }
}

static PROJECT: [&CapabilityDescriptor; 6] = [
    &LISTABLE, &NAMEABLE, &DATABASE, &DELETABLE, &RENAMABLE, &EDITABLE,
];

static INTEGRATION: [&CapabilityDescriptor; 7] = [
    &LISTABLE,
    &DELETABLE,
    &DATABASE,
    &RENAMABLE,
    &EDITABLE,
    &USER_NAMEABLE_IMPLEMENTATION,
    &DISCOVERABLE_IMPLEMENTATION,
];

static PROJECT_INTEGRATION: [&CapabilityDescriptor; 6] = [
    &LISTABLE, &EDITABLE, &CREATABLE, &DELETABLE, &DATABASE, &LINKABLE,
];

static DATABASE_ENTITY: [&CapabilityDescriptor; 3] = [
    &LISTABLE,
    &DISCOVERABLE_IMPLEMENTATION,
    &LOADABLE_IMPLEMENTATION,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(get("Nameable"), Some(&NAMEABLE));
        assert_eq!(get("Missing"), None);
        assert_eq!(all().count(), ALL.len());
    }

    #[test]
    fn test_capability_dependencies_name_catalog_entries() {
        for cap in all() {
            for dep in cap.capability_dependencies {
                assert!(get(dep).is_some(), "{} depends on unknown {}", cap.name, dep);
            }
        }
    }
}
