//! Name -> command schema mapping, built once per conversation

use std::collections::BTreeMap;
use std::sync::Arc;

use super::command::Command;
use super::schema::{CommandKind, CommandSchema, SlotSchema, SlotType};
use crate::executor::errors::{ExecError, ExecResult};

/// Immutable registry of every command a turn may call.
///
/// Always holds the auxiliary commands (`say`, `hint`, `perform`, `len`,
/// `next`) next to the domain's intents and queries.
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Arc<CommandSchema>>,
}

impl CommandRegistry {
    /// Build a registry from domain command schemas.
    ///
    /// A name that is already registered keeps its first definition.
    pub fn new(domain: impl IntoIterator<Item = CommandSchema>) -> Self {
        let mut commands = BTreeMap::new();
        for schema in auxiliary_commands().into_iter().chain(domain) {
            commands
                .entry(schema.name.clone())
                .or_insert_with(|| Arc::new(schema));
        }
        Self { commands }
    }

    /// Registry with only the auxiliary commands
    pub fn auxiliary() -> Self {
        Self::new(Vec::new())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<CommandSchema>> {
        self.commands.get(name)
    }

    /// Instantiate a fresh command
    pub fn build(&self, name: &str) -> ExecResult<Command> {
        self.get(name)
            .map(|schema| Command::new(Arc::clone(schema)))
            .ok_or_else(|| ExecError::UnknownCommand(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    pub fn schemas(&self) -> impl Iterator<Item = &CommandSchema> {
        self.commands.values().map(Arc::as_ref)
    }

    pub fn signatures(&self) -> Vec<String> {
        self.schemas().map(CommandSchema::signature).collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::auxiliary()
    }
}

fn auxiliary_commands() -> Vec<CommandSchema> {
    vec![
        CommandSchema::new("say", CommandKind::Say)
            .slot(SlotSchema::optional("args", SlotType::Any))
            .positional(&["args"]),
        CommandSchema::new("hint", CommandKind::Hint)
            .slot(SlotSchema::optional("message", SlotType::Str))
            .slot(SlotSchema::optional("ref", SlotType::Any))
            .positional(&["message", "ref"]),
        CommandSchema::new("perform", CommandKind::Perform)
            .slot(SlotSchema::optional("args", SlotType::Any))
            .positional(&["args"]),
        CommandSchema::new("len", CommandKind::Len)
            .slot(SlotSchema::optional("args", SlotType::Any))
            .positional(&["args"]),
        CommandSchema::new("next", CommandKind::Next)
            .slot(SlotSchema::optional("args", SlotType::Any))
            .positional(&["args"]),
    ]
}
