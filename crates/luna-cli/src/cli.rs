//! Argument definitions and their translation into core commands.

use clap::{Parser, Subcommand};
use luna_core::config::AppConfig;
use luna_core::{Command, EntityType};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = AppConfig::APP_NAME)]
#[command(about = "Manage Luna projects, integrations and databases")]
pub struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Database type to activate (overrides DB_TYPE)
    #[arg(long, global = true)]
    pub db_type: Option<String>,

    /// Directory holding database files (overrides DB_DIR)
    #[arg(long, global = true)]
    pub db_dir: Option<PathBuf>,

    /// Directory of plugin descriptors
    #[arg(long, global = true)]
    pub plugins_dir: Option<PathBuf>,

    /// Entity type: project, integration, project_integration, database
    #[arg(value_parser = parse_entity_type)]
    pub entity_type: EntityType,

    #[command(subcommand)]
    pub action: Action,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Action {
    /// Create an entity
    Create {
        /// Name (omit for generated names)
        name: Option<String>,

        /// Implementation to create the entity from
        #[arg(short, long)]
        implementation: Option<String>,

        /// Extra field as key=value (value parsed as JSON when possible)
        #[arg(short, long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, Value)>,
    },
    /// List entities
    List {
        /// Field to sort by (default: name)
        #[arg(long)]
        sort_by: Option<String>,

        /// Only names containing this text
        #[arg(long)]
        filter: Option<String>,
    },
    /// Show one entity
    Detail { name: String },
    /// Delete an entity
    Delete { name: String },
    /// Rename an entity
    Rename { name: String, new_name: String },
    /// Update config values (key=value; null removes the key)
    Edit {
        name: String,

        #[arg(required = true, value_parser = parse_key_value)]
        updates: Vec<(String, Value)>,
    },
    /// List available implementations
    ListModules,
    /// Link an integration to a project
    AddIntegration { project: String, integration: String },
    /// Unlink an integration from a project
    RemoveIntegration { project: String, integration: String },
    /// List a project's integrations
    ListIntegrations { project: String },
    /// Delete everything stored in the active database
    Clear,
    /// Check the active database
    Test,
}

impl From<Action> for Command {
    fn from(action: Action) -> Self {
        match action {
            Action::Create {
                name,
                implementation,
                fields,
            } => Command::Create {
                name,
                implementation,
                fields: fields.into_iter().collect::<BTreeMap<_, _>>(),
            },
            Action::List { sort_by, filter } => Command::List { sort_by, filter },
            Action::Detail { name } => Command::Detail { name },
            Action::Delete { name } => Command::Delete { name },
            Action::Rename { name, new_name } => Command::Rename { name, new_name },
            Action::Edit { name, updates } => Command::Edit {
                name,
                updates: updates.into_iter().collect::<Map<_, _>>(),
            },
            Action::ListModules => Command::ListModules,
            Action::AddIntegration {
                project,
                integration,
            } => Command::AddIntegration {
                project,
                integration,
            },
            Action::RemoveIntegration {
                project,
                integration,
            } => Command::RemoveIntegration {
                project,
                integration,
            },
            Action::ListIntegrations { project } => Command::ListIntegrations { project },
            Action::Clear => Command::Clear,
            Action::Test => Command::Test,
        }
    }
}

fn parse_entity_type(s: &str) -> Result<EntityType, String> {
    EntityType::from_str(s).ok_or_else(|| {
        let known: Vec<_> = EntityType::ALL.iter().map(|t| t.as_str()).collect();
        format!("unknown entity type '{}' (expected one of: {})", s, known.join(", "))
    })
}

fn parse_key_value(s: &str) -> Result<(String, Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
