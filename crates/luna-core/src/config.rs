//! Centralized configuration for Luna.
//!
//! Constants live on zero-sized config structs; runtime database settings are
//! resolved from `DB_`-prefixed environment variables.

use crate::error::{LunaError, Result};
use std::collections::HashMap;
use std::path::PathBuf;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "luna";
}

/// Persistence configuration.
pub struct DatabaseConfig;

impl DatabaseConfig {
    pub const ENV_PREFIX: &'static str = "DB_";
    pub const DEFAULT_TYPE: &'static str = "sqlite";
    pub const DEFAULT_NAME: &'static str = "luna";
    pub const FILE_EXTENSION: &'static str = "sqlite";
    pub const BUSY_TIMEOUT_MS: u32 = 5_000;
}

/// Limits applied to user-provided entity names.
pub struct NameConfig;

impl NameConfig {
    pub const MAX_LENGTH: usize = 255;
    pub const RESERVED_CHARS: [char; 10] = ['<', '>', '"', '|', '\0', '/', '\\', ':', '*', '?'];
    /// Length of the id prefix used in generated names (`project-1a2b3c4d`).
    pub const GENERATED_ID_LEN: usize = 8;
}

/// Shared directory names.
pub struct PathsConfig;

impl PathsConfig {
    /// Data directory relative to the user's home.
    pub const DATA_DIR: &'static str = ".luna/data";
    pub const PLUGINS_DIR_NAME: &'static str = "plugins";
}

/// Runtime database selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    /// Name of the database implementation to activate (`sqlite`, `memory`).
    pub db_type: String,
    /// Directory holding database files.
    pub dir: PathBuf,
    /// Database file stem.
    pub name: String,
}

impl DatabaseSettings {
    pub fn new(db_type: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            db_type: db_type.into(),
            dir: dir.into(),
            name: DatabaseConfig::DEFAULT_NAME.to_string(),
        }
    }

    /// Resolve settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Resolve settings from an explicit set of variables.
    ///
    /// Only `DB_`-prefixed keys are considered; the prefix is stripped and the
    /// remainder lowercased (`DB_DIR` -> `dir`).
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Result<Self> {
        let env: HashMap<String, String> = vars
            .into_iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(DatabaseConfig::ENV_PREFIX)
                    .map(|k| (k.to_lowercase(), value))
            })
            .collect();

        let dir = match env.get("dir") {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };

        Ok(Self {
            db_type: env
                .get("type")
                .cloned()
                .unwrap_or_else(|| DatabaseConfig::DEFAULT_TYPE.to_string()),
            dir,
            name: env
                .get("name")
                .cloned()
                .unwrap_or_else(|| DatabaseConfig::DEFAULT_NAME.to_string()),
        })
    }

    /// Path of the SQLite database file.
    pub fn path(&self) -> PathBuf {
        self.dir
            .join(format!("{}.{}", self.name, DatabaseConfig::FILE_EXTENSION))
    }
}

fn default_data_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(PathsConfig::DATA_DIR))
        .ok_or_else(|| LunaError::Config {
            message: "Could not determine home directory; set DB_DIR".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_settings_from_vars() {
        let settings = DatabaseSettings::from_vars(vars(&[
            ("DB_TYPE", "memory"),
            ("DB_DIR", "/tmp/luna"),
            ("DB_NAME", "work"),
            ("HOME_DIR", "/ignored"),
        ]))
        .unwrap();

        assert_eq!(settings.db_type, "memory");
        assert_eq!(settings.dir, PathBuf::from("/tmp/luna"));
        assert_eq!(settings.path(), PathBuf::from("/tmp/luna/work.sqlite"));
    }

    #[test]
    fn test_settings_defaults() {
        let settings = DatabaseSettings::from_vars(vars(&[("DB_DIR", "/data")])).unwrap();
        assert_eq!(settings.db_type, DatabaseConfig::DEFAULT_TYPE);
        assert_eq!(settings.name, DatabaseConfig::DEFAULT_NAME);
    }
}
