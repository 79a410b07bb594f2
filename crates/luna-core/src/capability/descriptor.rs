//! Capability descriptors: immutable, declarative behavior bundles.

use super::behavior::{Behavior, Interface};
use crate::types::Layer;

/// A named bundle of behaviors, one list per layer, plus what it requires
/// from the other capabilities declared alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityDescriptor {
    pub name: &'static str,
    pub entity: &'static [Behavior],
    pub registry: &'static [Behavior],
    pub service: &'static [Behavior],
    pub command: &'static [Behavior],
    /// Capabilities that must be declared alongside this one.
    pub capability_dependencies: &'static [&'static str],
    /// Behaviors some other declared capability must contribute.
    pub behavior_dependencies: &'static [Behavior],
    /// Interfaces some declared behavior must satisfy.
    pub interface_dependencies: &'static [Interface],
}

impl CapabilityDescriptor {
    /// Descriptor with no behaviors and no dependencies; the base for
    /// struct-update syntax in static declarations.
    pub const EMPTY: CapabilityDescriptor = CapabilityDescriptor {
        name: "",
        entity: &[],
        registry: &[],
        service: &[],
        command: &[],
        capability_dependencies: &[],
        behavior_dependencies: &[],
        interface_dependencies: &[],
    };

    /// Behaviors this capability contributes to `layer`.
    pub fn behaviors(&self, layer: Layer) -> &'static [Behavior] {
        match layer {
            Layer::Entity => self.entity,
            Layer::Registry => self.registry,
            Layer::Service => self.service,
            Layer::Command => self.command,
        }
    }

    /// Every behavior across all layers, in layer order.
    pub fn all_behaviors(&self) -> impl Iterator<Item = Behavior> + '_ {
        Layer::ALL
            .into_iter()
            .flat_map(move |layer| self.behaviors(layer).iter().copied())
    }

    /// Every interface satisfied by any of this capability's behaviors.
    pub fn interfaces(&self) -> impl Iterator<Item = Interface> + '_ {
        self.all_behaviors()
            .flat_map(|behavior| behavior.interfaces().iter().copied())
    }
}

impl std::fmt::Display for CapabilityDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
