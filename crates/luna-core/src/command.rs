//! Command adapter.
//!
//! Maps parsed commands onto composed service operations. Which commands an
//! entity type accepts follows from its command-layer behaviors plus the
//! commands its base adds. Names given on the command line are resolved to
//! entities here; formatting the JSON result is left to the caller.

use crate::capability::{Behavior, Composition};
use crate::entity::EntityArgs;
use crate::error::{LunaError, Result};
use crate::registry::RegistryManager;
use crate::types::EntityType;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use uuid::Uuid;

/// Kinds of command an entity type may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    Create,
    List,
    Detail,
    Delete,
    Rename,
    Edit,
    ListModules,
    AddIntegration,
    RemoveIntegration,
    ListIntegrations,
    Clear,
    Test,
}

impl CommandType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::Create => "create",
            CommandType::List => "list",
            CommandType::Detail => "detail",
            CommandType::Delete => "delete",
            CommandType::Rename => "rename",
            CommandType::Edit => "edit",
            CommandType::ListModules => "list_modules",
            CommandType::AddIntegration => "add_integration",
            CommandType::RemoveIntegration => "remove_integration",
            CommandType::ListIntegrations => "list_integrations",
            CommandType::Clear => "clear",
            CommandType::Test => "test",
        }
    }

    /// Commands enabled by a command-layer behavior.
    fn enabled_by(behavior: Behavior) -> &'static [CommandType] {
        match behavior {
            Behavior::ListableCommand => &[CommandType::List, CommandType::Detail],
            Behavior::CreatableCommand
            | Behavior::UserNameableCommand
            | Behavior::CreatableImplementationCommand => &[CommandType::Create],
            Behavior::DeletableCommand => &[CommandType::Delete],
            Behavior::RenamableCommand => &[CommandType::Rename],
            Behavior::EditableCommand => &[CommandType::Edit],
            Behavior::DiscoverableImplementationCommand => &[CommandType::ListModules],
            _ => &[],
        }
    }
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A parsed command with its arguments. Entities are named, not id'd.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Create {
        name: Option<String>,
        implementation: Option<String>,
        fields: BTreeMap<String, Value>,
    },
    List {
        sort_by: Option<String>,
        filter: Option<String>,
    },
    Detail {
        name: String,
    },
    Delete {
        name: String,
    },
    Rename {
        name: String,
        new_name: String,
    },
    Edit {
        name: String,
        updates: Map<String, Value>,
    },
    ListModules,
    AddIntegration {
        project: String,
        integration: String,
    },
    RemoveIntegration {
        project: String,
        integration: String,
    },
    ListIntegrations {
        project: String,
    },
    Clear,
    Test,
}

impl Command {
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Create { .. } => CommandType::Create,
            Command::List { .. } => CommandType::List,
            Command::Detail { .. } => CommandType::Detail,
            Command::Delete { .. } => CommandType::Delete,
            Command::Rename { .. } => CommandType::Rename,
            Command::Edit { .. } => CommandType::Edit,
            Command::ListModules => CommandType::ListModules,
            Command::AddIntegration { .. } => CommandType::AddIntegration,
            Command::RemoveIntegration { .. } => CommandType::RemoveIntegration,
            Command::ListIntegrations { .. } => CommandType::ListIntegrations,
            Command::Clear => CommandType::Clear,
            Command::Test => CommandType::Test,
        }
    }
}

/// Commands `composition`'s entity type accepts, in a stable order.
pub fn available(composition: &Composition) -> Vec<CommandType> {
    let mut commands: Vec<CommandType> = composition
        .command
        .behaviors
        .iter()
        .flat_map(|behavior| CommandType::enabled_by(*behavior).iter().copied())
        .chain(composition.base().base_commands().iter().copied())
        .collect();
    commands.sort();
    commands.dedup();
    commands
}

/// Run `command` against `entity_type`.
///
/// Failures are logged here and returned as typed errors.
pub fn execute(
    manager: &mut RegistryManager,
    entity_type: EntityType,
    command: Command,
) -> Result<Value> {
    let command_type = command.command_type();
    let result = dispatch(manager, entity_type, command);
    match &result {
        Ok(_) => debug!("{} {} succeeded", entity_type, command_type),
        Err(e) => warn!("{} {} failed: {}", entity_type, command_type, e),
    }
    result
}

fn dispatch(manager: &mut RegistryManager, entity_type: EntityType, command: Command) -> Result<Value> {
    let composition = std::sync::Arc::clone(manager.require(entity_type)?.composition());
    let command_type = command.command_type();
    if !available(&composition).contains(&command_type) {
        return Err(LunaError::unsupported(entity_type, command_type.as_str()));
    }

    let output = match command {
        Command::Create {
            name,
            implementation,
            fields,
        } => {
            let args = EntityArgs {
                name,
                implementation,
                fields,
                ..EntityArgs::default()
            };
            json!(manager.service(entity_type)?.create(args)?)
        }
        Command::List { sort_by, filter } => json!(manager
            .service(entity_type)?
            .list(sort_by.as_deref(), filter.as_deref())?),
        Command::Detail { name } => {
            let id = resolve(manager, entity_type, &name)?;
            json!(manager.service(entity_type)?.details(id)?)
        }
        Command::Delete { name } => {
            let id = resolve(manager, entity_type, &name)?;
            json!(manager.service(entity_type)?.delete(id)?)
        }
        Command::Rename { name, new_name } => {
            let id = resolve(manager, entity_type, &name)?;
            json!(manager.service(entity_type)?.rename(id, &new_name)?)
        }
        Command::Edit { name, updates } => {
            let id = resolve(manager, entity_type, &name)?;
            json!(manager.service(entity_type)?.edit(id, updates)?)
        }
        Command::ListModules => json!(manager.service(entity_type)?.list_implementations()?),
        Command::AddIntegration {
            project,
            integration,
        } => {
            let project = resolve(manager, EntityType::Project, &project)?;
            let integration = resolve(manager, EntityType::Integration, &integration)?;
            json!(manager
                .service(entity_type)?
                .add_integration(project, integration)?)
        }
        Command::RemoveIntegration {
            project,
            integration,
        } => {
            let project = resolve(manager, EntityType::Project, &project)?;
            let integration = resolve(manager, EntityType::Integration, &integration)?;
            json!(manager
                .service(entity_type)?
                .remove_integration(project, integration)?)
        }
        Command::ListIntegrations { project } => {
            let project = resolve(manager, EntityType::Project, &project)?;
            json!(manager.service(entity_type)?.list_integrations(project)?)
        }
        Command::Clear => json!({ "removed": manager.service(entity_type)?.clear()? }),
        Command::Test => json!({ "ok": true, "database": manager.service(entity_type)?.test()? }),
    };
    Ok(output)
}

/// Id of the entity of `entity_type` named `name`.
fn resolve(manager: &RegistryManager, entity_type: EntityType, name: &str) -> Result<Uuid> {
    Ok(manager.require(entity_type)?.require_by_name(name)?.id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Compositions;

    #[test]
    fn test_available_commands() {
        let compositions = Compositions::build().unwrap();

        let project = available(&compositions.get(EntityType::Project).unwrap());
        assert_eq!(
            project,
            vec![
                CommandType::Create,
                CommandType::List,
                CommandType::Detail,
                CommandType::Delete,
                CommandType::Rename,
                CommandType::Edit,
                CommandType::AddIntegration,
                CommandType::RemoveIntegration,
                CommandType::ListIntegrations,
            ]
        );

        let database = available(&compositions.get(EntityType::Database).unwrap());
        assert_eq!(
            database,
            vec![
                CommandType::List,
                CommandType::Detail,
                CommandType::ListModules,
                CommandType::Clear,
                CommandType::Test,
            ]
        );

        let links = available(&compositions.get(EntityType::ProjectIntegration).unwrap());
        assert!(links.contains(&CommandType::Create));
        assert!(!links.contains(&CommandType::Rename));
    }

    #[test]
    fn test_command_type_names() {
        assert_eq!(CommandType::ListModules.to_string(), "list_modules");
        assert_eq!(
            Command::Rename {
                name: "a".into(),
                new_name: "b".into()
            }
            .command_type(),
            CommandType::Rename
        );
    }
}
