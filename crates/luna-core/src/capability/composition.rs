//! Composition of per-layer types from a capability list.
//!
//! Each entity type is composed once at startup into four layers. A layer is
//! its deduplicated behavior list plus a delegation table mapping every
//! interface the layer satisfies to the single behavior that provides it.
//! The resulting [`Compositions`] arena is never mutated afterwards.

use super::behavior::{Behavior, Interface, NameMode};
use super::descriptor::CapabilityDescriptor;
use super::{catalog, validator};
use crate::error::{LunaError, Result};
use crate::service::base::{self, EntityBase};
use crate::types::{EntityType, Layer};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// Interface -> delegate behavior for one composed layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelegationTable {
    entries: BTreeMap<Interface, Behavior>,
}

impl DelegationTable {
    /// Build the table for a layer, rejecting a second delegate for any
    /// interface.
    pub fn build(entity_type: EntityType, layer: Layer, behaviors: &[Behavior]) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for behavior in behaviors {
            for interface in behavior.interfaces() {
                if let Some(existing) = entries.insert(*interface, *behavior) {
                    return Err(LunaError::invariant(format!(
                        "{} {} layer has two delegates for {}: {} and {}",
                        entity_type, layer, interface, existing, behavior
                    )));
                }
            }
        }
        Ok(Self { entries })
    }

    pub fn get(&self, interface: Interface) -> Option<Behavior> {
        self.entries.get(&interface).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Interface, Behavior)> + '_ {
        self.entries.iter().map(|(i, b)| (*i, *b))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One composed layer of an entity type (`ProjectRegistry`, `ProjectService`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedLayer {
    pub layer: Layer,
    pub entity_type: EntityType,
    pub type_name: String,
    pub behaviors: Vec<Behavior>,
    pub delegates: DelegationTable,
}

impl ComposedLayer {
    pub fn has(&self, behavior: Behavior) -> bool {
        self.behaviors.contains(&behavior)
    }
}

/// The four composed layers of one entity type.
///
/// Holding all four in one value gives the registry layer its handles to the
/// entity and service layers, and the service layer its handle to the
/// entity layer.
pub struct Composition {
    pub entity_type: EntityType,
    pub capabilities: Vec<&'static str>,
    pub entity: Arc<ComposedLayer>,
    pub registry: Arc<ComposedLayer>,
    pub service: Arc<ComposedLayer>,
    pub command: Arc<ComposedLayer>,
    base: &'static dyn EntityBase,
}

impl std::fmt::Debug for Composition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composition")
            .field("entity_type", &self.entity_type)
            .field("capabilities", &self.capabilities)
            .field("entity", &self.entity)
            .field("registry", &self.registry)
            .field("service", &self.service)
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}

impl Composition {
    pub fn layer(&self, layer: Layer) -> &ComposedLayer {
        match layer {
            Layer::Entity => &self.entity,
            Layer::Registry => &self.registry,
            Layer::Service => &self.service,
            Layer::Command => &self.command,
        }
    }

    /// Whether `behavior` was composed into its layer.
    pub fn has(&self, behavior: Behavior) -> bool {
        self.layer(behavior.layer()).has(behavior)
    }

    /// Whether the service layer satisfies `interface`.
    pub fn implements(&self, interface: Interface) -> bool {
        self.service.delegates.get(interface).is_some()
    }

    /// Service-layer delegate for `interface`.
    pub fn delegate(&self, interface: Interface) -> Option<Behavior> {
        self.service.delegates.get(interface)
    }

    /// Service-layer delegate for `interface`, or `Unsupported`.
    pub fn require(&self, interface: Interface) -> Result<Behavior> {
        self.delegate(interface)
            .ok_or_else(|| LunaError::unsupported(self.entity_type, interface.as_str()))
    }

    /// Name semantics of the composed entity layer.
    pub fn name_mode(&self) -> Option<NameMode> {
        self.entity.behaviors.iter().find_map(Behavior::name_mode)
    }

    pub fn base(&self) -> &'static dyn EntityBase {
        self.base
    }
}

/// Compose the four layers of `entity_type` from `capabilities`, attaching
/// `base` as the base of every layer.
///
/// Fails with `Configuration` when validation reports any error.
pub fn compose(
    entity_type: EntityType,
    capabilities: &[&CapabilityDescriptor],
    base: &'static dyn EntityBase,
) -> Result<Composition> {
    let errors = validator::validate(entity_type.as_str(), capabilities);
    if !errors.is_empty() {
        return Err(LunaError::Configuration {
            entity_type,
            errors,
        });
    }

    let build = |layer: Layer| -> Result<Arc<ComposedLayer>> {
        let behaviors = merge_behaviors(capabilities, layer);
        let delegates = DelegationTable::build(entity_type, layer, &behaviors)?;
        Ok(Arc::new(ComposedLayer {
            layer,
            entity_type,
            type_name: format!("{}{}", entity_type.type_prefix(), layer.type_suffix()),
            behaviors,
            delegates,
        }))
    };

    let composition = Composition {
        entity_type,
        capabilities: capabilities.iter().map(|cap| cap.name).collect(),
        entity: build(Layer::Entity)?,
        registry: build(Layer::Registry)?,
        service: build(Layer::Service)?,
        command: build(Layer::Command)?,
        base,
    };

    debug!(
        "Composed {} from [{}]",
        entity_type,
        composition.capabilities.join(", ")
    );
    Ok(composition)
}

/// Concatenate every capability's behaviors for `layer` in declaration
/// order, keeping the first occurrence of each.
fn merge_behaviors(capabilities: &[&CapabilityDescriptor], layer: Layer) -> Vec<Behavior> {
    let mut merged = Vec::new();
    for behavior in capabilities.iter().flat_map(|cap| cap.behaviors(layer)) {
        if !merged.contains(behavior) {
            merged.push(*behavior);
        }
    }
    merged
}

/// Startup-built table of every entity type's composition.
#[derive(Debug, Clone)]
pub struct Compositions {
    types: HashMap<EntityType, Arc<Composition>>,
}

impl Compositions {
    /// Compose every known entity type from its declared capabilities.
    pub fn build() -> Result<Self> {
        let mut types = HashMap::new();
        for entity_type in EntityType::ALL {
            let composition = compose(
                entity_type,
                catalog::declared(entity_type),
                base::for_type(entity_type),
            )?;
            types.insert(entity_type, Arc::new(composition));
        }
        info!("Composed {} entity types", types.len());
        Ok(Self { types })
    }

    pub fn get(&self, entity_type: EntityType) -> Result<Arc<Composition>> {
        self.types.get(&entity_type).cloned().ok_or_else(|| {
            LunaError::invariant(format!("{} was never composed", entity_type))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::catalog::{DATABASE, DELETABLE, NAMEABLE, RENAMABLE};

    fn project_base() -> &'static dyn EntityBase {
        base::for_type(EntityType::Project)
    }

    #[test]
    fn test_composed_type_names() {
        let composition = compose(
            EntityType::ProjectIntegration,
            catalog::declared(EntityType::ProjectIntegration),
            base::for_type(EntityType::ProjectIntegration),
        )
        .unwrap();

        assert_eq!(composition.entity.type_name, "ProjectIntegration");
        assert_eq!(composition.registry.type_name, "ProjectIntegrationRegistry");
        assert_eq!(composition.service.type_name, "ProjectIntegrationService");
        assert_eq!(composition.command.type_name, "ProjectIntegrationCommand");
        assert_eq!(composition.name_mode(), Some(NameMode::ReadOnly));
    }

    #[test]
    fn test_composition_is_deterministic() {
        let caps = [&NAMEABLE, &DATABASE, &DELETABLE, &RENAMABLE];
        let first = compose(EntityType::Project, &caps, project_base()).unwrap();
        let second = compose(EntityType::Project, &caps, project_base()).unwrap();

        for layer in Layer::ALL {
            assert_eq!(first.layer(layer), second.layer(layer));
        }
    }

    #[test]
    fn test_behaviors_are_deduplicated_in_first_occurrence_order() {
        let composition = compose(
            EntityType::Database,
            catalog::declared(EntityType::Database),
            base::for_type(EntityType::Database),
        )
        .unwrap();

        assert_eq!(
            composition.registry.behaviors,
            vec![
                Behavior::DiscoverableImplementationRegistry,
                Behavior::NameIndexedRegistry,
                Behavior::LoadableImplementationRegistry,
            ]
        );
    }

    #[test]
    fn test_delegation_table() {
        let composition = compose(
            EntityType::Integration,
            catalog::declared(EntityType::Integration),
            base::for_type(EntityType::Integration),
        )
        .unwrap();

        assert_eq!(
            composition.delegate(Interface::Creatable),
            Some(Behavior::CreatableImplementationService)
        );
        assert!(composition.implements(Interface::ImplementationDiscovery));
        assert!(!composition.implements(Interface::LinkQuery));
        assert!(matches!(
            composition.require(Interface::LinkQuery),
            Err(LunaError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_delegation_table_rejects_second_delegate() {
        let result = DelegationTable::build(
            EntityType::Project,
            Layer::Service,
            &[Behavior::CreatableService, Behavior::CreatableImplementationService],
        );
        assert!(matches!(result, Err(LunaError::InvariantViolation { .. })));
    }

    #[test]
    fn test_invalid_capabilities_do_not_compose() {
        let result = compose(EntityType::Project, &[&DELETABLE], project_base());
        match result {
            Err(LunaError::Configuration { entity_type, errors }) => {
                assert_eq!(entity_type, EntityType::Project);
                assert_eq!(errors.len(), 2);
            }
            other => panic!("Expected configuration error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_arena_holds_every_type() {
        let compositions = Compositions::build().unwrap();
        for entity_type in EntityType::ALL {
            assert_eq!(compositions.get(entity_type).unwrap().entity_type, entity_type);
        }
    }
}
