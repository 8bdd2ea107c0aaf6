//! Generic task instance validated against its schema

use std::sync::Arc;

use super::entity::Entity;
use super::schema::{CommandKind, CommandSchema};
use super::{AppContext, TaskObject};
use crate::executor::errors::{ExecError, ExecResult, PerformError};
use crate::executor::types::{ActionOutput, RecommendedAction, Value};
use crate::parser::rewrite::rules::CONFIRMED_ATTR;

/// Slot completeness of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus<'a> {
    /// The first required slot without a value
    NeedsValue(&'a str),
    /// Every required slot is filled but the task is not confirmed yet
    NeedsConfirmation,
    Ready,
}

/// One task instance.
///
/// Slot values are kept in schema order. A query command also owns the
/// entities its last `perform` found.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    schema: Arc<CommandSchema>,
    values: Vec<Value>,
    confirmed: bool,
    results: Vec<Entity>,
    followed_actions: Vec<String>,
}

impl Command {
    pub fn new(schema: Arc<CommandSchema>) -> Self {
        let values = vec![Value::None; schema.slots.len()];
        Self {
            schema,
            values,
            confirmed: false,
            results: Vec::new(),
            followed_actions: Vec::new(),
        }
    }

    pub fn schema(&self) -> &CommandSchema {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn kind(&self) -> &CommandKind {
        &self.schema.kind
    }

    pub fn is_query(&self) -> bool {
        matches!(self.schema.kind, CommandKind::Query { .. })
    }

    pub fn confirmed(&self) -> bool {
        self.confirmed
    }

    pub fn results(&self) -> &[Entity] {
        &self.results
    }

    /// Names of recommendations this task was told were followed
    pub fn followed_actions(&self) -> &[String] {
        &self.followed_actions
    }

    /// Slot names positional arguments map onto
    pub fn positional_args(&self) -> &[String] {
        &self.schema.positional
    }

    /// Value of a declared slot
    pub fn value(&self, slot: &str) -> Option<&Value> {
        self.schema
            .slots
            .iter()
            .position(|s| s.name == slot)
            .map(|position| &self.values[position])
    }

    /// Set slots in schema order
    pub fn filled_slots(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.schema
            .slots
            .iter()
            .zip(&self.values)
            .filter(|(_, value)| !value.is_none())
            .map(|(slot, value)| (slot.name.as_str(), value))
    }

    pub fn slot_status(&self) -> SlotStatus<'_> {
        let missing = self
            .schema
            .slots
            .iter()
            .zip(&self.values)
            .find(|(slot, value)| slot.required && value.is_none());

        if let Some((slot, _)) = missing {
            return SlotStatus::NeedsValue(&slot.name);
        }
        if self.schema.confirmation_required && !self.confirmed {
            return SlotStatus::NeedsConfirmation;
        }
        SlotStatus::Ready
    }

    /// Position of the query result `index` resolves to.
    ///
    /// No results gives `None`; a single result is returned whatever the
    /// index; several results need an index within range.
    pub fn entity_index(&self, var: &str, index: Option<i64>) -> ExecResult<Option<usize>> {
        match (self.results.len(), index) {
            (0, _) => Ok(None),
            (1, _) => Ok(Some(0)),
            (_, None) => Err(ExecError::MultipleEntities {
                var: var.to_string(),
            }),
            (len, Some(idx)) => match usize::try_from(idx) {
                Ok(i) if i < len => Ok(Some(i)),
                _ => Err(ExecError::IndexOutOfBound {
                    var: var.to_string(),
                    index: idx,
                    len,
                }),
            },
        }
    }

    pub fn result(&self, position: usize) -> Option<&Entity> {
        self.results.get(position)
    }

    /// The result at `position`, or the command itself when there is none
    pub fn entity_or_self_mut(&mut self, position: usize) -> &mut dyn TaskObject {
        if position < self.results.len() {
            &mut self.results[position]
        } else {
            self
        }
    }

    fn slot_position(&self, attr: &str) -> ExecResult<usize> {
        self.schema
            .slots
            .iter()
            .position(|slot| slot.name == attr)
            .ok_or_else(|| ExecError::UnknownAttribute {
                owner: self.schema.name.clone(),
                attr: attr.to_string(),
            })
    }

    fn run_query(&mut self, entity: &str, app_context: &AppContext) -> Result<ActionOutput, PerformError> {
        let records = app_context.records(entity);
        if records.is_empty() {
            return Err(PerformError::NoRecords {
                entity: entity.to_string(),
            });
        }

        self.results = records.to_vec();
        let listed: Vec<String> = self.results.iter().map(Entity::to_string).collect();
        Ok(ActionOutput::InformList {
            dialogue: format!("Found {}: {}", entity, listed.join("; ")),
            items: self.results.clone(),
        })
    }
}

impl TaskObject for Command {
    fn type_name(&self) -> &str {
        &self.schema.name
    }

    fn recommend_action(&self) -> Option<RecommendedAction> {
        match self.slot_status() {
            SlotStatus::NeedsValue(slot) => Some(RecommendedAction::request_value(slot)),
            SlotStatus::NeedsConfirmation => Some(RecommendedAction::request_confirmation()),
            SlotStatus::Ready => None,
        }
    }

    fn perform(&mut self, app_context: &AppContext) -> Result<Option<ActionOutput>, PerformError> {
        match self.schema.kind.clone() {
            CommandKind::Intent => Ok(Some(ActionOutput::inform("Success"))),
            CommandKind::Query { entity } => self.run_query(&entity, app_context).map(Some),
            CommandKind::Say
            | CommandKind::Hint
            | CommandKind::Perform
            | CommandKind::Len
            | CommandKind::Next => Ok(None),
        }
    }

    fn notify_action(&mut self, action_name: &str) {
        self.followed_actions.push(action_name.to_string());
    }

    fn get_attr(&self, attr: &str) -> ExecResult<Value> {
        if attr == CONFIRMED_ATTR {
            return Ok(Value::Bool(self.confirmed));
        }
        let position = self.slot_position(attr)?;
        Ok(self.values[position].clone())
    }

    fn set_attr(&mut self, attr: &str, value: Value) -> ExecResult<()> {
        if attr == CONFIRMED_ATTR {
            return match value {
                Value::Bool(confirmed) => {
                    self.confirmed = confirmed;
                    Ok(())
                }
                other => Err(ExecError::SlotType {
                    owner: self.schema.name.clone(),
                    slot: attr.to_string(),
                    expected: "bool".to_string(),
                    found: other.type_name().to_string(),
                }),
            };
        }

        let position = self.slot_position(attr)?;
        let slot = &self.schema.slots[position];
        if !slot.ty.accepts(&value) {
            return Err(ExecError::SlotType {
                owner: self.schema.name.clone(),
                slot: attr.to_string(),
                expected: slot.ty.to_string(),
                found: value.type_name().to_string(),
            });
        }
        self.values[position] = value;
        Ok(())
    }
}
