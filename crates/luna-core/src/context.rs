//! Application bootstrap.
//!
//! Composes every entity type, then builds the registries in dependency
//! order: the database registry first, then activation of the configured
//! database, then the registries that persist through it.

use crate::capability::Compositions;
use crate::command::{self, Command, CommandType};
use crate::config::{DatabaseSettings, PathsConfig};
use crate::error::{LunaError, Result};
use crate::persistence::{MemoryStore, Persistence, SqliteStore};
use crate::plugins::PluginLoader;
use crate::registry::RegistryManager;
use crate::types::EntityType;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// A fully bootstrapped Luna instance.
#[derive(Debug)]
pub struct AppContext {
    compositions: Compositions,
    manager: RegistryManager,
    plugins: PluginLoader,
    settings: DatabaseSettings,
}

impl AppContext {
    /// Bootstrap from `DB_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::builder(DatabaseSettings::from_env()?).build()
    }

    pub fn builder(settings: DatabaseSettings) -> AppContextBuilder {
        AppContextBuilder::new(settings)
    }

    pub fn compositions(&self) -> &Compositions {
        &self.compositions
    }

    pub fn manager(&self) -> &RegistryManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut RegistryManager {
        &mut self.manager
    }

    pub fn plugins(&self) -> &PluginLoader {
        &self.plugins
    }

    pub fn settings(&self) -> &DatabaseSettings {
        &self.settings
    }

    /// Commands `entity_type` accepts.
    pub fn available_commands(&self, entity_type: EntityType) -> Result<Vec<CommandType>> {
        let composition = self.compositions.get(entity_type)?;
        Ok(command::available(&composition))
    }

    pub fn execute(&mut self, entity_type: EntityType, command: Command) -> Result<Value> {
        command::execute(&mut self.manager, entity_type, command)
    }
}

/// Builder for [`AppContext`].
///
/// # Example
///
/// ```rust,ignore
/// use luna_core::{AppContext, DatabaseSettings};
///
/// let ctx = AppContext::builder(DatabaseSettings::new("memory", "/tmp/luna"))
///     .plugins_dir("/tmp/luna/plugins")
///     .build()?;
/// ```
pub struct AppContextBuilder {
    settings: DatabaseSettings,
    plugins_dir: Option<PathBuf>,
    store: Option<Arc<dyn Persistence>>,
}

impl AppContextBuilder {
    pub fn new(settings: DatabaseSettings) -> Self {
        Self {
            settings,
            plugins_dir: None,
            store: None,
        }
    }

    /// Read plugin descriptors from `dir` (created if missing).
    ///
    /// Default: `<db dir>/plugins`, used only when it already exists.
    pub fn plugins_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.plugins_dir = Some(dir.into());
        self
    }

    /// Use `store` instead of opening one from the settings.
    pub fn store(mut self, store: Arc<dyn Persistence>) -> Self {
        self.store = Some(store);
        self
    }

    fn load_plugins(&self) -> Result<PluginLoader> {
        match &self.plugins_dir {
            Some(dir) => PluginLoader::new(dir),
            None => {
                let dir = self.settings.dir.join(PathsConfig::PLUGINS_DIR_NAME);
                if dir.is_dir() {
                    PluginLoader::new(dir)
                } else {
                    Ok(PluginLoader::builtin())
                }
            }
        }
    }

    fn open_store(&self) -> Result<Arc<dyn Persistence>> {
        if let Some(store) = &self.store {
            return Ok(Arc::clone(store));
        }
        match self.settings.db_type.as_str() {
            "sqlite" => Ok(Arc::new(SqliteStore::open(&self.settings.path())?)),
            "memory" => Ok(Arc::new(MemoryStore::new())),
            other => Err(LunaError::Config {
                message: format!("No store available for database type '{}'", other),
            }),
        }
    }

    pub fn build(self) -> Result<AppContext> {
        let compositions = Compositions::build()?;
        let plugins = self.load_plugins()?;
        let mut manager = RegistryManager::new();

        manager.register_registry(
            compositions.get(EntityType::Database)?,
            plugins.discover(EntityType::Database),
        )?;
        let store = self.open_store()?;
        manager.activate_database(&self.settings.db_type, store)?;

        for entity_type in EntityType::ALL {
            if entity_type == EntityType::Database {
                continue;
            }
            let (_, loaded) = manager.register_registry(
                compositions.get(entity_type)?,
                plugins.discover(entity_type),
            )?;
            for error in &loaded.errors {
                warn!("Skipped persisted {}: {}", entity_type, error);
            }
        }

        info!(
            "Luna ready ({} database, {} plugins)",
            self.settings.db_type,
            plugins.count()
        );
        Ok(AppContext {
            compositions,
            manager,
            plugins,
            settings: self.settings,
        })
    }
}
