//! Structural validation of a capability list for one entity type.
//!
//! All checks run and their errors accumulate; nothing short-circuits.

use super::behavior::{Behavior, Interface};
use super::descriptor::CapabilityDescriptor;
use crate::types::Layer;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Validate `capabilities` as declared for `entity_type`.
///
/// Returns every problem found; an empty list means the composition is sound.
pub fn validate(entity_type: &str, capabilities: &[&CapabilityDescriptor]) -> Vec<String> {
    let mut errors = Vec::new();
    errors.extend(check_interface_uniqueness(capabilities));
    errors.extend(check_name_property(capabilities));
    errors.extend(check_dependencies(capabilities));

    debug!(
        "Validated {} capabilities for {}: {} error(s)",
        capabilities.len(),
        entity_type,
        errors.len()
    );
    errors
}

/// Every interface must be satisfied by at most one capability.
fn check_interface_uniqueness(capabilities: &[&CapabilityDescriptor]) -> Vec<String> {
    let mut providers: BTreeMap<Interface, Vec<&str>> = BTreeMap::new();
    for cap in capabilities {
        for interface in cap.interfaces() {
            let names = providers.entry(interface).or_default();
            if !names.contains(&cap.name) {
                names.push(cap.name);
            }
        }
    }

    providers
        .into_iter()
        .filter(|(_, names)| names.len() > 1)
        .map(|(interface, names)| {
            format!(
                "Interface {} is implemented by multiple capabilities: {}",
                interface,
                names.join(", ")
            )
        })
        .collect()
}

/// The entity layer must carry exactly one name provider.
fn check_name_property(capabilities: &[&CapabilityDescriptor]) -> Vec<String> {
    let mut seen = Vec::new();
    for cap in capabilities {
        for behavior in cap.behaviors(Layer::Entity) {
            if behavior.name_mode().is_some() && !seen.contains(behavior) {
                seen.push(*behavior);
            }
        }
    }

    match seen.len() {
        1 => Vec::new(),
        0 => vec![format!(
            "Entity must have exactly one name property ({} or {}), found none",
            Behavior::UserNameableProperty,
            Behavior::ReadOnlyNameProperty
        )],
        _ => vec![format!(
            "Entity must have exactly one name property, found {}: {}",
            seen.len(),
            seen.iter()
                .map(Behavior::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        )],
    }
}

fn check_dependencies(capabilities: &[&CapabilityDescriptor]) -> Vec<String> {
    let names: HashSet<&str> = capabilities.iter().map(|cap| cap.name).collect();
    let behaviors: HashSet<Behavior> = capabilities
        .iter()
        .flat_map(|cap| cap.all_behaviors())
        .collect();
    let interfaces: HashSet<Interface> = capabilities
        .iter()
        .flat_map(|cap| cap.interfaces())
        .collect();

    let mut errors = Vec::new();
    for cap in capabilities {
        for dep in cap.capability_dependencies {
            if !names.contains(dep) {
                errors.push(format!("Capability {} requires capability {}", cap.name, dep));
            }
        }
        for dep in cap.behavior_dependencies {
            if !behaviors.contains(dep) {
                errors.push(format!("Capability {} requires trait {}", cap.name, dep));
            }
        }
        for dep in cap.interface_dependencies {
            if !interfaces.contains(dep) {
                errors.push(format!("Capability {} requires interface {}", cap.name, dep));
            }
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::catalog::{self, DATABASE, DELETABLE, LISTABLE, NAMEABLE};
    use crate::types::EntityType;

    static RENAME_A: CapabilityDescriptor = CapabilityDescriptor {
        name: "RenameA",
        service: &[Behavior::RenamableService],
        ..CapabilityDescriptor::EMPTY
    };

    static RENAME_B: CapabilityDescriptor = CapabilityDescriptor {
        name: "RenameB",
        command: &[Behavior::RenamableCommand],
        ..CapabilityDescriptor::EMPTY
    };

    static AUTO_NAMED: CapabilityDescriptor = CapabilityDescriptor {
        name: "AutoNamed",
        entity: &[Behavior::ReadOnlyNameProperty],
        ..CapabilityDescriptor::EMPTY
    };

    #[test]
    fn test_declared_catalog_is_valid() {
        for entity_type in EntityType::ALL {
            let errors = validate(entity_type.as_str(), catalog::declared(entity_type));
            assert!(errors.is_empty(), "{}: {:?}", entity_type, errors);
        }
    }

    #[test]
    fn test_duplicate_interface_names_both_capabilities() {
        let errors = validate("widget", &[&NAMEABLE, &DATABASE, &RENAME_A, &RENAME_B]);

        assert_eq!(errors.len(), 1, "{:?}", errors);
        assert!(errors[0].contains("RenamableInterface"));
        assert!(errors[0].contains("RenameA"));
        assert!(errors[0].contains("RenameB"));
    }

    #[test]
    fn test_same_capability_across_layers_is_not_a_conflict() {
        // Listable satisfies ListableInterface from both service and command.
        let errors = validate("widget", &[&LISTABLE, &NAMEABLE, &DATABASE]);
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_missing_name_property() {
        let errors = validate("widget", &[&LISTABLE]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("found none"));
    }

    #[test]
    fn test_two_name_properties() {
        let errors = validate("widget", &[&NAMEABLE, &DATABASE, &AUTO_NAMED]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("UserNameableProperty"));
        assert!(errors[0].contains("ReadOnlyNameProperty"));
    }

    #[test]
    fn test_errors_accumulate_across_checks() {
        // No name property, Deletable lacks Creatable, RenameA/RenameB clash.
        let errors = validate("widget", &[&DELETABLE, &RENAME_A, &RENAME_B]);
        assert_eq!(errors.len(), 3, "{:?}", errors);
    }

    #[test]
    fn test_unsatisfied_dependencies() {
        let errors = validate("widget", &[&NAMEABLE, &catalog::RENAMABLE, &DELETABLE]);
        // Nameable requires Database; the rest are satisfied.
        assert_eq!(errors, vec!["Capability Nameable requires capability Database"]);

        let errors = validate("widget", &[&AUTO_NAMED, &catalog::RENAMABLE]);
        assert_eq!(
            errors,
            vec!["Capability Renamable requires trait UserNameableProperty"]
        );

        let errors = validate("widget", &[&AUTO_NAMED, &catalog::LINKABLE]);
        assert_eq!(
            errors,
            vec!["Capability Linkable requires interface CreatableInterface"]
        );
    }
}
