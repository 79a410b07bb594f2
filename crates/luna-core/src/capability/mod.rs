//! Capability-based composition.
//!
//! Capabilities are static bundles of layer-specific behaviors. The
//! validator checks that the bundle declared for an entity type is
//! consistent, and composition turns it into the four per-layer types used
//! by the entity, registry, service and command layers.

mod behavior;
pub mod catalog;
mod composition;
mod descriptor;
mod validator;

pub use behavior::{Behavior, Interface, NameMode};
pub use composition::{compose, ComposedLayer, Composition, Compositions, DelegationTable};
pub use descriptor::CapabilityDescriptor;
pub use validator::validate;
