//! Plugin descriptor loader.
//!
//! Loads implementation descriptors from JSON files in the plugins directory.

use super::schema::{builtin_implementations, Implementation, PluginDescriptor};
use crate::entity::validate_name;
use crate::error::{LunaError, Result};
use crate::types::EntityType;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Loads plugin descriptors and merges them with the built-in
/// implementations.
#[derive(Debug, Clone, Default)]
pub struct PluginLoader {
    /// Directory containing plugin JSON files, if any.
    plugins_dir: Option<PathBuf>,
    /// Loaded descriptors keyed by id.
    plugins: BTreeMap<String, PluginDescriptor>,
}

impl PluginLoader {
    /// Loader with built-in implementations only.
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Create a loader for the given directory and load it.
    ///
    /// The directory will be created if it doesn't exist.
    pub fn new(plugins_dir: impl AsRef<Path>) -> Result<Self> {
        let plugins_dir = plugins_dir.as_ref().to_path_buf();

        if !plugins_dir.exists() {
            std::fs::create_dir_all(&plugins_dir).map_err(|e| LunaError::Io {
                message: format!("Failed to create plugins directory: {}", e),
                path: Some(plugins_dir.clone()),
                source: Some(e),
            })?;
        }

        let mut loader = Self {
            plugins_dir: Some(plugins_dir),
            plugins: BTreeMap::new(),
        };
        loader.reload()?;
        Ok(loader)
    }

    /// Reload all plugins from disk.
    ///
    /// Files that fail to read, parse or validate are logged and skipped.
    pub fn reload(&mut self) -> Result<usize> {
        self.plugins.clear();
        let Some(plugins_dir) = &self.plugins_dir else {
            return Ok(0);
        };

        let entries = std::fs::read_dir(plugins_dir).map_err(|e| LunaError::Io {
            message: format!("Failed to read plugins directory: {}", e),
            path: Some(plugins_dir.clone()),
            source: Some(e),
        })?;

        let mut loaded = BTreeMap::new();
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();

            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }

            match load_plugin_file(&path) {
                Ok(plugin) => {
                    info!(
                        "Loaded {} plugin: {} ({})",
                        plugin.entity_type, plugin.display_name, plugin.id
                    );
                    loaded.insert(plugin.id.clone(), plugin);
                }
                Err(e) => {
                    warn!("Failed to load plugin from {}: {}", path.display(), e);
                }
            }
        }

        debug!("Loaded {} plugins from {}", loaded.len(), plugins_dir.display());
        self.plugins = loaded;
        Ok(self.plugins.len())
    }

    /// Implementations of `entity_type`: built-ins first, then plugins sorted
    /// by id. A plugin reusing a built-in name is ignored.
    pub fn discover(&self, entity_type: EntityType) -> Vec<Implementation> {
        let mut seen = HashSet::new();
        let plugins = self
            .plugins
            .values()
            .filter(|p| p.entity_type == entity_type)
            .cloned()
            .map(Implementation::from);

        builtin_implementations(entity_type)
            .into_iter()
            .chain(plugins)
            .filter(|implementation| {
                let fresh = seen.insert(implementation.name.clone());
                if !fresh {
                    warn!(
                        "Ignoring duplicate {} implementation '{}'",
                        entity_type, implementation.name
                    );
                }
                fresh
            })
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&PluginDescriptor> {
        self.plugins.get(id)
    }

    pub fn plugins_dir(&self) -> Option<&Path> {
        self.plugins_dir.as_deref()
    }

    /// Number of loaded plugin files.
    pub fn count(&self) -> usize {
        self.plugins.len()
    }
}

fn load_plugin_file(path: &Path) -> Result<PluginDescriptor> {
    let content = std::fs::read_to_string(path).map_err(|e| LunaError::Io {
        message: format!("Failed to read plugin file: {}", e),
        path: Some(path.to_path_buf()),
        source: Some(e),
    })?;

    let plugin: PluginDescriptor = serde_json::from_str(&content).map_err(|e| LunaError::Json {
        message: format!("Failed to parse plugin from {}: {}", path.display(), e),
        source: Some(e),
    })?;

    if plugin.id.is_empty() {
        return Err(LunaError::Config {
            message: format!("Plugin in {} has empty id", path.display()),
        });
    }
    validate_name(&plugin.id).map_err(|e| LunaError::Config {
        message: format!("Plugin in {} has an unusable id: {}", path.display(), e),
    })?;

    if plugin.display_name.is_empty() {
        return Err(LunaError::Config {
            message: format!("Plugin '{}' has empty displayName", plugin.id),
        });
    }

    Ok(plugin)
}
