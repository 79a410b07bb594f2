//! Implementation discovery.
//!
//! Entity types composed with implementation discovery (`database`,
//! `integration`) pick their implementations from the built-ins plus JSON
//! plugin descriptors found in the plugins directory.

mod loader;
mod schema;

pub use loader::PluginLoader;
pub use schema::{builtin_implementations, Implementation, PluginDescriptor};
