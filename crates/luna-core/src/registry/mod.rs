//! Entity registries.
//!
//! A [`Registry`] owns every entity of one composed type, with optional
//! name, link, persistence and implementation-discovery support depending
//! on its composed registry behaviors. The [`RegistryManager`] owns all
//! registries and resolves cross-registry [`crate::entity::EntityRef`]s.

mod entity_registry;
mod link_index;
mod manager;
mod name_index;

pub use entity_registry::{LoadResult, Registry};
pub use link_index::{
    link_name, Link, LinkIndex, INTEGRATION_FIELD, INTEGRATION_NAME_HINT, PROJECT_FIELD,
    PROJECT_NAME_HINT,
};
pub use manager::RegistryManager;
pub use name_index::NameIndex;
