//! Task object model
//!
//! Every value a turn can act on is either a [`Command`] (a task with slots)
//! or an [`Entity`] (a query result). Both implement [`TaskObject`], the
//! contract the executor drives:
//!
//! - `recommend_action` reads slot completeness and confirmation
//! - `perform` runs the domain side effect
//! - `notify_action` records that a recommendation was followed
//! - `get_attr` / `set_attr` / `append_attr` read and write slots

pub mod app_context;
pub mod command;
pub mod domain;
pub mod entity;
pub mod registry;
pub mod schema;

pub use app_context::AppContext;
pub use command::{Command, SlotStatus};
pub use domain::{Domain, DomainSchema};
pub use entity::Entity;
pub use registry::CommandRegistry;
pub use schema::{CommandKind, CommandSchema, EntitySchema, SchemaError, SlotSchema, SlotType};

use crate::executor::errors::{ExecError, ExecResult, PerformError};
use crate::executor::types::{ActionOutput, RecommendedAction, Value};

pub trait TaskObject {
    /// Name used in error messages (`create_alarm`, `alarm`)
    fn type_name(&self) -> &str;

    /// What the task still needs before it can be performed
    fn recommend_action(&self) -> Option<RecommendedAction>;

    fn perform(&mut self, app_context: &AppContext) -> Result<Option<ActionOutput>, PerformError>;

    fn notify_action(&mut self, action_name: &str);

    fn get_attr(&self, attr: &str) -> ExecResult<Value>;

    fn set_attr(&mut self, attr: &str, value: Value) -> ExecResult<()>;

    /// Append `value` to a list-valued attribute
    fn append_attr(&mut self, attr: &str, value: Value) -> ExecResult<()> {
        match self.get_attr(attr)? {
            Value::List(mut items) => {
                items.push(value);
                self.set_attr(attr, Value::List(items))
            }
            _ => Err(ExecError::NotAList {
                owner: self.type_name().to_string(),
                slot: attr.to_string(),
            }),
        }
    }
}

/// An arena entry of the execution state
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Command(Command),
    Entity(Entity),
}

impl Object {
    pub fn as_task(&self) -> &dyn TaskObject {
        match self {
            Object::Command(command) => command,
            Object::Entity(entity) => entity,
        }
    }

    pub fn as_task_mut(&mut self) -> &mut dyn TaskObject {
        match self {
            Object::Command(command) => command,
            Object::Entity(entity) => entity,
        }
    }

    pub fn as_command(&self) -> Option<&Command> {
        match self {
            Object::Command(command) => Some(command),
            Object::Entity(_) => None,
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Object::Entity(entity) => Some(entity),
            Object::Command(_) => None,
        }
    }
}
