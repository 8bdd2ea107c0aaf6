//! Call classification and the perform-or-recommend protocol
//!
//! A parsed, rewritten turn is classified into exactly one [`Call`]:
//!
//! | Statement                         | Call        |
//! |-----------------------------------|-------------|
//! | `x0.items.append(v)`              | Append      |
//! | `perform(x1)`                     | Perform     |
//! | `next(x1)`                        | Next        |
//! | `create_alarm(...)`               | Command     |
//! | `x3` bound to a command           | Command     |
//! | `x0.a = v`, `x0.a, x1.b = v, w`   | Assignment  |
//! | anything else that evaluates      | Value       |

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use super::errors::{ExecError, ExecResult};
use super::expressions::{eval_expr, subscript_index};
use super::state::{var_index, var_name, ExecutionState, TaskRef};
use super::types::{ActionOutput, ActionResult, Expr, Module, ObjectId, Stmt, Value};
use crate::parser::ParseError;
use crate::tasks::{CommandKind, CommandRegistry, Entity, Object};

/// How a tuple assignment spanning several variables is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiTargetPolicy {
    /// Keep the variable with the most attribute writes; ties go to the
    /// variable written first
    #[default]
    MostUpdated,
    /// Fail the turn
    Reject,
}

impl fmt::Display for MultiTargetPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MultiTargetPolicy::MostUpdated => write!(f, "most_updated"),
            MultiTargetPolicy::Reject => write!(f, "reject"),
        }
    }
}

/// One attribute write of an assignment
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeUpdate {
    pub attribute: String,
    pub index: Option<i64>,
    pub value: Value,
}

/// Entity bound by `perform(x)`
#[derive(Debug, Clone, PartialEq)]
pub enum PerformBinding {
    /// `x` was itself an entity
    Shared(ObjectId),
    /// `x` was a query with a single result; the variable gets a copy
    Copied(Entity),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallKind {
    Command { object: ObjectId, assigned: bool },
    Perform { entity: Option<PerformBinding> },
    Assignment { updates: Vec<AttributeUpdate> },
    Append { attribute: String, value: Value },
    /// `next(x)`: binds a copy of the first result of a query
    Next { entity: Option<Entity> },
    Value { value: Value },
}

/// A classified turn, ready to run
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub var_name: String,
    /// Index reported in the turn's result
    pub index: usize,
    pub kind: CallKind,
}

impl Call {
    fn new(var_name: impl Into<String>, turn_index: usize, kind: CallKind) -> Self {
        let var_name = var_name.into();
        let index = var_index(&var_name).unwrap_or(turn_index);
        Self {
            var_name,
            index,
            kind,
        }
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            CallKind::Command { .. } => "command",
            CallKind::Perform { .. } => "perform",
            CallKind::Assignment { .. } => "assignment",
            CallKind::Append { .. } => "append",
            CallKind::Next { .. } => "next",
            CallKind::Value { .. } => "value",
        }
    }

    /// Apply the call to the state
    pub fn run(
        self,
        state: &mut ExecutionState,
        follows_recommendation: bool,
    ) -> ExecResult<ActionResult> {
        if follows_recommendation {
            state.flag_recommendation_followed();
        }

        match self.kind {
            CallKind::Command { object, assigned } => {
                if !assigned {
                    state.bind(&self.var_name, Value::Object(object));
                }
                let target = TaskRef {
                    id: object,
                    entity: None,
                };
                perform_or_recommend(state, &self.var_name, self.index, target)
            }

            CallKind::Perform { entity } => {
                match entity {
                    Some(PerformBinding::Shared(id)) => {
                        state.bind(&self.var_name, Value::Object(id));
                    }
                    Some(PerformBinding::Copied(entity)) => {
                        let id = state.alloc(Object::Entity(entity));
                        state.bind(&self.var_name, Value::Object(id));
                    }
                    None => {}
                }
                Ok(ActionResult::empty(self.index))
            }

            CallKind::Assignment { updates } => {
                let mut target = None;
                for update in updates {
                    let task = state.get_assignment(&self.var_name, update.index)?;
                    state.task_mut(task).set_attr(&update.attribute, update.value)?;
                    target = Some(task);
                }
                match target {
                    Some(task) => perform_or_recommend(state, &self.var_name, self.index, task),
                    None => Ok(ActionResult::empty(self.index)),
                }
            }

            CallKind::Append { attribute, value } => {
                let task = state.get_assignment(&self.var_name, None)?;
                state.task_mut(task).append_attr(&attribute, value)?;
                perform_or_recommend(state, &self.var_name, self.index, task)
            }

            CallKind::Next { entity } => {
                let value = match entity {
                    Some(entity) => Value::Object(state.alloc(Object::Entity(entity))),
                    None => Value::None,
                };
                state.bind(&self.var_name, value.clone());
                Ok(ActionResult::performed(
                    self.index,
                    Some(ActionOutput::Value { value }),
                ))
            }

            CallKind::Value { value } => {
                state.bind(&self.var_name, value.clone());
                Ok(ActionResult::performed(
                    self.index,
                    Some(ActionOutput::Value { value }),
                ))
            }
        }
    }
}

/// Recommend the next step for the task, or perform it when nothing is
/// missing
fn perform_or_recommend(
    state: &mut ExecutionState,
    var: &str,
    index: usize,
    target: TaskRef,
) -> ExecResult<ActionResult> {
    if let Some(action) = state.task(target).recommend_action() {
        state.current_recommendation = Some((var.to_string(), action.clone()));
        return Ok(ActionResult::recommended(index, action));
    }

    state.current_recommendation = None;
    let result = state
        .perform(target)
        .map_err(|source| ExecError::Perform {
            var: var.to_string(),
            source,
        })?;
    state.completed.insert(var.to_string());
    info!(var = %var, task = %state.task(target).type_name(), "Task performed");

    Ok(ActionResult::performed(index, result))
}

/* ===================== Classification ===================== */

/// Classify the single statement of `module` into a call.
///
/// Sub-expressions are evaluated here, so building a command allocates it
/// even when the turn fails later.
pub fn classify(
    turn_index: usize,
    module: &Module,
    registry: &CommandRegistry,
    state: &mut ExecutionState,
    policy: MultiTargetPolicy,
) -> ExecResult<Call> {
    let stmt = match module.body.as_slice() {
        [] => return Err(ParseError::NoExpression.into()),
        [stmt] => stmt,
        body => return Err(ParseError::MultipleStatements(body.len()).into()),
    };

    match stmt {
        Stmt::Append { target, value, .. } => {
            let (var, attribute) = match target {
                Expr::Attribute { value: base, attr, .. } => match base.as_name() {
                    Some(var) => (var, attr),
                    None => return Err(unsupported_target(target)),
                },
                other => return Err(unsupported_target(other)),
            };
            let value = eval_expr(value, registry, state)?;
            Ok(Call::new(
                var,
                turn_index,
                CallKind::Append {
                    attribute: attribute.clone(),
                    value,
                },
            ))
        }

        Stmt::Expr {
            value: expr @ Expr::Call { .. },
            ..
        } => {
            let var = var_name(turn_index);
            let value = eval_expr(expr, registry, state)?;
            let kind = match value.as_object().map(|id| (id, state.object(id))) {
                Some((id, Object::Command(command))) => {
                    let arg = command.value("args");
                    match command.kind() {
                        CommandKind::Perform => CallKind::Perform {
                            entity: perform_binding(state, arg),
                        },
                        CommandKind::Len => CallKind::Value {
                            value: Value::Int(result_count(state, arg)?),
                        },
                        CommandKind::Next => CallKind::Next {
                            entity: first_result(state, arg)?,
                        },
                        _ => CallKind::Command {
                            object: id,
                            assigned: false,
                        },
                    }
                }
                _ => CallKind::Value { value },
            };
            Ok(Call::new(var, turn_index, kind))
        }

        Stmt::Expr {
            value: expr @ Expr::Name { id: var, .. },
            ..
        } => {
            let value = eval_expr(expr, registry, state)?;
            let kind = match value.as_object() {
                Some(id) if state.object(id).as_command().is_some() => CallKind::Command {
                    object: id,
                    assigned: true,
                },
                _ => CallKind::Value { value },
            };
            Ok(Call::new(var.clone(), turn_index, kind))
        }

        Stmt::Expr { value: expr, .. } => {
            let value = eval_expr(expr, registry, state)?;
            Ok(Call::new(var_name(turn_index), turn_index, CallKind::Value { value }))
        }

        Stmt::Assign { target, value, .. } => {
            let groups = assignment_groups(
                std::slice::from_ref(target),
                std::slice::from_ref(value),
                registry,
                state,
            )?;
            select_group(groups, policy, turn_index)
        }

        Stmt::TupleAssign {
            targets, values, ..
        } => {
            let groups = assignment_groups(targets, values, registry, state)?;
            select_group(groups, policy, turn_index)
        }
    }
}

/// Entity a `perform(x)` binds to the current variable
fn perform_binding(state: &ExecutionState, arg: Option<&Value>) -> Option<PerformBinding> {
    let id = arg?.as_object()?;
    match state.object(id) {
        Object::Entity(_) => Some(PerformBinding::Shared(id)),
        Object::Command(command) if command.is_query() && command.results().len() == 1 => {
            command.result(0).cloned().map(PerformBinding::Copied)
        }
        Object::Command(_) => None,
    }
}

/// Number of results of the query (or items of the list) passed to `len`
fn result_count(state: &ExecutionState, arg: Option<&Value>) -> ExecResult<i64> {
    let count = match arg {
        Some(Value::List(items)) => items.len(),
        Some(Value::Object(id)) => match state.object(*id) {
            Object::Command(command) if command.is_query() => command.results().len(),
            other => {
                return Err(ExecError::NotIndexable {
                    var: "len".to_string(),
                    found: other.as_task().type_name().to_string(),
                })
            }
        },
        other => {
            return Err(ExecError::NotIndexable {
                var: "len".to_string(),
                found: other.map_or("NoneType", Value::type_name).to_string(),
            })
        }
    };
    Ok(i64::try_from(count).unwrap_or(i64::MAX))
}

/// First result of the query passed to `next`, if any
fn first_result(state: &ExecutionState, arg: Option<&Value>) -> ExecResult<Option<Entity>> {
    match arg.and_then(Value::as_object).map(|id| state.object(id)) {
        Some(Object::Command(command)) if command.is_query() => Ok(command.result(0).cloned()),
        Some(other) => Err(ExecError::NotIndexable {
            var: "next".to_string(),
            found: other.as_task().type_name().to_string(),
        }),
        None => Err(ExecError::NotIndexable {
            var: "next".to_string(),
            found: arg.map_or("NoneType", Value::type_name).to_string(),
        }),
    }
}

type AssignmentGroup = (String, Vec<AttributeUpdate>);

/// Evaluate every assigned value and group the writes by base variable, in
/// order of first appearance
fn assignment_groups(
    targets: &[Expr],
    values: &[Expr],
    registry: &CommandRegistry,
    state: &mut ExecutionState,
) -> ExecResult<Vec<AssignmentGroup>> {
    let mut groups: Vec<AssignmentGroup> = Vec::new();

    for (target, value) in targets.iter().zip(values) {
        let (var, index, attribute) = assignment_target(target)?;
        let value = eval_expr(value, registry, state)?;
        let update = AttributeUpdate {
            attribute: attribute.to_string(),
            index,
            value,
        };

        match groups.iter_mut().find(|(name, _)| name == var) {
            Some((_, updates)) => updates.push(update),
            None => groups.push((var.to_string(), vec![update])),
        }
    }

    Ok(groups)
}

/// `var.attr` or `var[idx].attr`
fn assignment_target(target: &Expr) -> ExecResult<(&str, Option<i64>, &str)> {
    let Expr::Attribute { value, attr, .. } = target else {
        return Err(unsupported_target(target));
    };

    match value.as_ref() {
        Expr::Name { id, .. } => Ok((id, None, attr)),
        Expr::Subscript { value: base, index, .. } => match base.as_name() {
            Some(var) => Ok((var, subscript_index(index)?, attr)),
            None => Err(unsupported_target(target)),
        },
        _ => Err(unsupported_target(target)),
    }
}

fn select_group(
    groups: Vec<AssignmentGroup>,
    policy: MultiTargetPolicy,
    turn_index: usize,
) -> ExecResult<Call> {
    if policy == MultiTargetPolicy::Reject && groups.len() > 1 {
        let vars: Vec<&str> = groups.iter().map(|(var, _)| var.as_str()).collect();
        return Err(ExecError::CrossVariableAssignment {
            vars: vars.join(", "),
        });
    }

    let most = groups.iter().map(|(_, updates)| updates.len()).max().unwrap_or(0);
    let tied: Vec<&str> = groups
        .iter()
        .filter(|(_, updates)| updates.len() == most)
        .map(|(var, _)| var.as_str())
        .collect();
    if tied.len() > 1 {
        warn!(
            vars = %tied.join(", "),
            chosen = %tied[0],
            "Multi-assignment tie between variables; keeping the first"
        );
    }

    let (var, updates) = groups
        .into_iter()
        .find(|(_, updates)| updates.len() == most)
        .ok_or(ExecError::Parse(ParseError::NoExpression))?;

    Ok(Call::new(var, turn_index, CallKind::Assignment { updates }))
}

fn unsupported_target(target: &Expr) -> ExecError {
    ExecError::UnsupportedExpression(format!("cannot assign to {}", target.shape()))
}
