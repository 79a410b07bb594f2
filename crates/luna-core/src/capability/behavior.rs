//! Layer-specific behavior units and the operation interfaces they satisfy.

use crate::types::Layer;
use serde::Serialize;

/// Operation interfaces. Within one entity type, at most one capability may
/// contribute behaviors satisfying any given interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Interface {
    Listable,
    Creatable,
    Deletable,
    Renamable,
    Editable,
    UserNameable,
    ImplementationDiscovery,
    LinkQuery,
}

impl Interface {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interface::Listable => "ListableInterface",
            Interface::Creatable => "CreatableInterface",
            Interface::Deletable => "DeletableInterface",
            Interface::Renamable => "RenamableInterface",
            Interface::Editable => "EditableInterface",
            Interface::UserNameable => "UserNameableInterface",
            Interface::ImplementationDiscovery => "ImplementationDiscoveryInterface",
            Interface::LinkQuery => "LinkQueryInterface",
        }
    }
}

impl std::fmt::Display for Interface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How an entity's name is provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NameMode {
    /// Supplied (and later changed) by the user.
    UserSettable,
    /// Generated at construction, never changed.
    ReadOnly,
}

/// A behavior unit contributed to one layer by a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Behavior {
    // Entity layer
    UserNameableProperty,
    ReadOnlyNameProperty,
    DatabaseProperty,
    ConfigProperty,
    ImplementationProperty,

    // Registry layer
    NameIndexedRegistry,
    DatabaseRegistry,
    DiscoverableImplementationRegistry,
    LoadableImplementationRegistry,
    LinkIndexedRegistry,

    // Service layer
    ListableService,
    CreatableService,
    CreatableImplementationService,
    LoadableImplementationService,
    DeletableService,
    RenamableService,
    EditableService,
    DiscoverableImplementationService,
    LinkQueryService,

    // Command layer
    ListableCommand,
    CreatableCommand,
    UserNameableCommand,
    CreatableImplementationCommand,
    DeletableCommand,
    RenamableCommand,
    EditableCommand,
    DiscoverableImplementationCommand,
}

impl Behavior {
    /// The layer this behavior attaches to.
    pub fn layer(&self) -> Layer {
        use Behavior::*;
        match self {
            UserNameableProperty
            | ReadOnlyNameProperty
            | DatabaseProperty
            | ConfigProperty
            | ImplementationProperty => Layer::Entity,

            NameIndexedRegistry
            | DatabaseRegistry
            | DiscoverableImplementationRegistry
            | LoadableImplementationRegistry
            | LinkIndexedRegistry => Layer::Registry,

            ListableService
            | CreatableService
            | CreatableImplementationService
            | LoadableImplementationService
            | DeletableService
            | RenamableService
            | EditableService
            | DiscoverableImplementationService
            | LinkQueryService => Layer::Service,

            ListableCommand
            | CreatableCommand
            | UserNameableCommand
            | CreatableImplementationCommand
            | DeletableCommand
            | RenamableCommand
            | EditableCommand
            | DiscoverableImplementationCommand => Layer::Command,
        }
    }

    /// Interfaces this behavior satisfies. Entity and registry behaviors
    /// satisfy none; they only add state and indices.
    pub fn interfaces(&self) -> &'static [Interface] {
        use Behavior::*;
        match self {
            ListableService | ListableCommand => &[Interface::Listable],
            CreatableService
            | CreatableImplementationService
            | LoadableImplementationService
            | CreatableCommand => &[Interface::Creatable],
            UserNameableCommand | CreatableImplementationCommand => {
                &[Interface::Creatable, Interface::UserNameable]
            }
            DeletableService | DeletableCommand => &[Interface::Deletable],
            RenamableService | RenamableCommand => &[Interface::Renamable],
            EditableService | EditableCommand => &[Interface::Editable],
            DiscoverableImplementationService | DiscoverableImplementationCommand => {
                &[Interface::ImplementationDiscovery]
            }
            LinkQueryService => &[Interface::LinkQuery],
            _ => &[],
        }
    }

    /// Name semantics provided by this behavior, if it is a name provider.
    pub fn name_mode(&self) -> Option<NameMode> {
        match self {
            Behavior::UserNameableProperty => Some(NameMode::UserSettable),
            Behavior::ReadOnlyNameProperty => Some(NameMode::ReadOnly),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        use Behavior::*;
        match self {
            UserNameableProperty => "UserNameableProperty",
            ReadOnlyNameProperty => "ReadOnlyNameProperty",
            DatabaseProperty => "DatabaseProperty",
            ConfigProperty => "ConfigProperty",
            ImplementationProperty => "ImplementationProperty",
            NameIndexedRegistry => "NameIndexedRegistry",
            DatabaseRegistry => "DatabaseRegistry",
            DiscoverableImplementationRegistry => "DiscoverableImplementationRegistry",
            LoadableImplementationRegistry => "LoadableImplementationRegistry",
            LinkIndexedRegistry => "LinkIndexedRegistry",
            ListableService => "ListableService",
            CreatableService => "CreatableService",
            CreatableImplementationService => "CreatableImplementationService",
            LoadableImplementationService => "LoadableImplementationService",
            DeletableService => "DeletableService",
            RenamableService => "RenamableService",
            EditableService => "EditableService",
            DiscoverableImplementationService => "DiscoverableImplementationService",
            LinkQueryService => "LinkQueryService",
            ListableCommand => "ListableCommand",
            CreatableCommand => "CreatableCommand",
            UserNameableCommand => "UserNameableCommand",
            CreatableImplementationCommand => "CreatableImplementationCommand",
            DeletableCommand => "DeletableCommand",
            RenamableCommand => "RenamableCommand",
            EditableCommand => "EditableCommand",
            DiscoverableImplementationCommand => "DiscoverableImplementationCommand",
        }
    }
}

impl std::fmt::Display for Behavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_service_and_command_behaviors_satisfy_interfaces() {
        assert!(Behavior::UserNameableProperty.interfaces().is_empty());
        assert!(Behavior::NameIndexedRegistry.interfaces().is_empty());
        assert_eq!(Behavior::RenamableService.interfaces(), &[Interface::Renamable]);
        assert_eq!(
            Behavior::UserNameableCommand.interfaces(),
            &[Interface::Creatable, Interface::UserNameable]
        );
    }

    #[test]
    fn test_name_providers() {
        assert_eq!(
            Behavior::UserNameableProperty.name_mode(),
            Some(NameMode::UserSettable)
        );
        assert_eq!(Behavior::ReadOnlyNameProperty.name_mode(), Some(NameMode::ReadOnly));
        assert_eq!(Behavior::ConfigProperty.name_mode(), None);
    }
}
