//! Luna Core - capability composition and entity registry engine.
//!
//! Entity types (projects, integrations, project/integration links,
//! databases) are declared as sets of capabilities. At startup each set is
//! validated and composed into per-layer behavior tables; registries,
//! services and commands are then driven entirely by those tables.
//!
//! # Example
//!
//! ```rust,ignore
//! use luna_core::{AppContext, Command, DatabaseSettings, EntityType};
//!
//! let mut ctx = AppContext::builder(DatabaseSettings::new("memory", "/tmp/luna")).build()?;
//! ctx.execute(
//!     EntityType::Project,
//!     Command::Create { name: Some("demo".into()), implementation: None, fields: Default::default() },
//! )?;
//! let projects = ctx.execute(EntityType::Project, Command::List { sort_by: None, filter: None })?;
//! println!("{}", projects);
//! ```

pub mod capability;
pub mod command;
pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod persistence;
pub mod plugins;
pub mod registry;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use capability::{Behavior, Composition, Compositions, Interface};
pub use command::{Command, CommandType};
pub use config::DatabaseSettings;
pub use context::{AppContext, AppContextBuilder};
pub use entity::{Entity, EntityArgs, EntityRef};
pub use error::{LunaError, Result};
pub use persistence::{MemoryStore, Persistence, SqliteStore};
pub use registry::{Registry, RegistryManager};
pub use service::{EntityDetails, Service};
pub use types::{EntityType, Layer};
