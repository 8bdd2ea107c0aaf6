//! Per-conversation execution state

use std::collections::{HashMap, HashSet};
use tracing::warn;

use super::errors::{ExecError, ExecResult, PerformError};
use super::types::{ActionOutput, ObjectId, RecommendedAction, Value};
use crate::tasks::{AppContext, Command, Entity, Object, TaskObject};

/// Variable name for turn `index`
pub fn var_name(index: usize) -> String {
    format!("x{}", index)
}

/// Index of a variable name of the form `x<N>`
pub fn var_index(name: &str) -> Option<usize> {
    name.strip_prefix('x')?.parse().ok()
}

/// Where an attribute write or protocol run lands: a bound object, or one
/// result entity of a bound query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRef {
    pub id: ObjectId,
    pub entity: Option<usize>,
}

/// Mutable store of one conversation.
///
/// Tasks and entities live in an arena; variables bind [`Value`]s that refer
/// into it. Cloning the state is a full snapshot.
#[derive(Debug, Clone, Default)]
pub struct ExecutionState {
    objects: Vec<Object>,
    assignments: HashMap<String, Value>,
    pub app_context: AppContext,
    /// Variables whose task was performed
    pub completed: HashSet<String>,
    /// Outstanding recommendation and the variable it belongs to
    pub current_recommendation: Option<(String, RecommendedAction)>,
}

impl ExecutionState {
    pub fn new(app_context: AppContext) -> Self {
        Self {
            app_context,
            ..Self::default()
        }
    }

    pub fn alloc(&mut self, object: Object) -> ObjectId {
        self.objects.push(object);
        ObjectId(self.objects.len() - 1)
    }

    pub fn object(&self, id: ObjectId) -> &Object {
        &self.objects[id.0]
    }

    pub fn object_mut(&mut self, id: ObjectId) -> &mut Object {
        &mut self.objects[id.0]
    }

    pub fn bind(&mut self, var: impl Into<String>, value: Value) {
        self.assignments.insert(var.into(), value);
    }

    pub fn lookup(&self, var: &str) -> ExecResult<&Value> {
        self.assignments
            .get(var)
            .ok_or_else(|| ExecError::UnboundVariable(var.to_string()))
    }

    pub fn is_bound(&self, var: &str) -> bool {
        self.assignments.contains_key(var)
    }

    /// Bound variable names in variable-index order
    pub fn variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.assignments.keys().map(String::as_str).collect();
        names.sort_by_key(|name| (var_index(name).unwrap_or(usize::MAX), *name));
        names
    }

    /// The command bound to `var`, if it holds one
    pub fn command(&self, var: &str) -> Option<&Command> {
        let id = self.lookup(var).ok()?.as_object()?;
        self.object(id).as_command()
    }

    /// The entity bound to `var`, if it holds one
    pub fn entity(&self, var: &str) -> Option<&Entity> {
        let id = self.lookup(var).ok()?.as_object()?;
        self.object(id).as_entity()
    }

    /// Resolve `var` (optionally `var[index]`) to the task a turn acts on.
    ///
    /// A query resolves to one of its results; an index on anything else is
    /// an error.
    pub fn get_assignment(&self, var: &str, index: Option<i64>) -> ExecResult<TaskRef> {
        let value = self.lookup(var)?;
        let Some(id) = value.as_object() else {
            return Err(ExecError::NotATask {
                var: var.to_string(),
                found: value.type_name().to_string(),
            });
        };

        match self.object(id) {
            Object::Command(command) if command.is_query() => {
                match command.entity_index(var, index)? {
                    Some(position) => Ok(TaskRef {
                        id,
                        entity: Some(position),
                    }),
                    None => Err(ExecError::NoEntity {
                        var: var.to_string(),
                    }),
                }
            }
            other => match index {
                None => Ok(TaskRef { id, entity: None }),
                Some(_) => Err(ExecError::NotIndexable {
                    var: var.to_string(),
                    found: other.as_task().type_name().to_string(),
                }),
            },
        }
    }

    pub fn task(&self, target: TaskRef) -> &dyn TaskObject {
        match (self.object(target.id), target.entity) {
            (Object::Command(command), Some(position)) => match command.result(position) {
                Some(entity) => entity,
                None => command,
            },
            (object, _) => object.as_task(),
        }
    }

    pub fn task_mut(&mut self, target: TaskRef) -> &mut dyn TaskObject {
        match (self.object_mut(target.id), target.entity) {
            (Object::Command(command), Some(position)) => command.entity_or_self_mut(position),
            (object, _) => object.as_task_mut(),
        }
    }

    /// Run the task's side effect against the app context
    pub fn perform(&mut self, target: TaskRef) -> Result<Option<ActionOutput>, PerformError> {
        let app_context = &self.app_context;
        let task: &mut dyn TaskObject = match (&mut self.objects[target.id.0], target.entity) {
            (Object::Command(command), Some(position)) => command.entity_or_self_mut(position),
            (object, _) => object.as_task_mut(),
        };
        task.perform(app_context)
    }

    /// Tell the task behind the outstanding recommendation that it was followed
    pub fn flag_recommendation_followed(&mut self) {
        let Some((var, action)) = self.current_recommendation.clone() else {
            warn!("A non-existent recommendation was followed");
            return;
        };

        match self.assignments.get(&var).and_then(Value::as_object) {
            Some(id) => self.object_mut(id).as_task_mut().notify_action(action.name()),
            None => warn!(var = %var, "Recommended variable no longer holds a task"),
        }
    }

    /// Variables bound to a task or entity that were never performed, in
    /// variable-index order
    pub fn incomplete_tasks(&self) -> Vec<String> {
        self.variables()
            .into_iter()
            .filter(|var| !self.completed.contains(*var))
            .filter(|var| matches!(self.assignments.get(*var), Some(Value::Object(_))))
            .map(str::to_string)
            .collect()
    }
}
