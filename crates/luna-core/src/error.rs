//! Error types for Luna.
//!
//! One enum covers the whole engine. Startup configuration failures,
//! recoverable lookup/link/persistence failures and internal invariant
//! violations are distinct variants so callers can tell them apart.

use crate::types::EntityType;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Main error type for the Luna engine.
#[derive(Debug, Error)]
pub enum LunaError {
    // Startup errors
    #[error("{entity_type} capability validation failed: {}", errors.join("; "))]
    Configuration {
        entity_type: EntityType,
        errors: Vec<String>,
    },

    // Lookup errors
    #[error("{entity_type} not found: {name}")]
    NotFound { entity_type: EntityType, name: String },

    #[error("{entity_type} named '{name}' already exists")]
    DuplicateName { entity_type: EntityType, name: String },

    #[error("Link between project {project_id} and integration {integration_id} already exists")]
    DuplicateLink {
        project_id: Uuid,
        integration_id: Uuid,
    },

    // Entity errors
    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("{entity_type} '{name}' has a read-only name")]
    ReadOnlyName { entity_type: EntityType, name: String },

    #[error("{entity_type} does not support '{operation}'")]
    Unsupported {
        entity_type: EntityType,
        operation: String,
    },

    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Persistence errors
    #[error("Failed to persist {entity_type} '{name}': {message}")]
    Persistence {
        entity_type: EntityType,
        name: String,
        message: String,
        #[source]
        source: Option<Box<LunaError>>,
    },

    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    // Programmer errors
    #[error("Internal invariant violated: {message}")]
    InvariantViolation { message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Luna operations.
pub type Result<T> = std::result::Result<T, LunaError>;

impl From<std::io::Error> for LunaError {
    fn from(err: std::io::Error) -> Self {
        LunaError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for LunaError {
    fn from(err: serde_json::Error) -> Self {
        LunaError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for LunaError {
    fn from(err: rusqlite::Error) -> Self {
        LunaError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl LunaError {
    /// Wrap a collaborator failure with the entity it concerned.
    pub fn persistence(entity_type: EntityType, name: impl Into<String>, err: LunaError) -> Self {
        LunaError::Persistence {
            entity_type,
            name: name.into(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        LunaError::InvariantViolation {
            message: message.into(),
        }
    }

    pub fn not_found(entity_type: EntityType, name: impl Into<String>) -> Self {
        LunaError::NotFound {
            entity_type,
            name: name.into(),
        }
    }

    pub fn unsupported(entity_type: EntityType, operation: impl Into<String>) -> Self {
        LunaError::Unsupported {
            entity_type,
            operation: operation.into(),
        }
    }

    /// Whether the caller can reasonably recover and carry on.
    ///
    /// Configuration errors abort startup and invariant violations indicate
    /// a bug; everything else is an ordinary failure of one operation.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            LunaError::Configuration { .. } | LunaError::InvariantViolation { .. }
        )
    }

    /// Map to a process exit code for the command-line front-end.
    ///
    /// - 2: the request named something that does not exist or is invalid
    /// - 3: the persistence collaborator failed
    /// - 70: internal invariant violated (`EX_SOFTWARE`)
    /// - 78: capability configuration is broken (`EX_CONFIG`)
    pub fn to_exit_code(&self) -> i32 {
        match self {
            LunaError::NotFound { .. }
            | LunaError::DuplicateName { .. }
            | LunaError::DuplicateLink { .. }
            | LunaError::InvalidName { .. }
            | LunaError::ReadOnlyName { .. }
            | LunaError::Unsupported { .. }
            | LunaError::Validation { .. } => 2,

            LunaError::Persistence { .. } | LunaError::Database { .. } => 3,

            LunaError::InvariantViolation { .. } => 70,

            LunaError::Configuration { .. } | LunaError::Config { .. } => 78,

            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LunaError::not_found(EntityType::Project, "demo");
        assert_eq!(err.to_string(), "project not found: demo");

        let err = LunaError::Configuration {
            entity_type: EntityType::Integration,
            errors: vec!["first".into(), "second".into()],
        };
        assert_eq!(
            err.to_string(),
            "integration capability validation failed: first; second"
        );
    }

    #[test]
    fn test_persistence_error_keeps_context() {
        let err = LunaError::persistence(
            EntityType::Project,
            "demo",
            LunaError::Other("disk full".into()),
        );
        assert_eq!(err.to_string(), "Failed to persist project 'demo': disk full");
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.to_exit_code(), 3);
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(LunaError::not_found(EntityType::Project, "x").is_recoverable());
        assert!(!LunaError::invariant("index corrupted").is_recoverable());
        assert!(!LunaError::Configuration {
            entity_type: EntityType::Project,
            errors: vec![],
        }
        .is_recoverable());
    }
}
