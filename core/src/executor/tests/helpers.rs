//! Test helpers for executor tests
//!
//! A small alarm domain plus shortcuts for running turn sequences

use crate::executor::{ActionResult, ExecError, ProgramExecutor};
use crate::tasks::{
    AppContext, CommandKind, CommandRegistry, CommandSchema, Entity, SlotSchema, SlotType,
};

/// Registry with:
/// - `create_alarm(time, label, volume=None)`, confirmation required
/// - `set_timer(duration)`
/// - `order_food(items=None, restaurant=None)`
/// - `find_alarm(select=None, time=None, label=None)`
pub fn alarm_registry() -> CommandRegistry {
    CommandRegistry::new(vec![
        CommandSchema::new("create_alarm", CommandKind::Intent)
            .slot(SlotSchema::required("time", SlotType::Str))
            .slot(SlotSchema::required("label", SlotType::Str))
            .slot(SlotSchema::optional("volume", SlotType::Int))
            .positional(&["time", "label"])
            .with_confirmation(),
        CommandSchema::new("set_timer", CommandKind::Intent)
            .slot(SlotSchema::required("duration", SlotType::Int))
            .positional(&["duration"]),
        CommandSchema::new("order_food", CommandKind::Intent)
            .slot(SlotSchema::optional("items", SlotType::List))
            .slot(SlotSchema::optional("restaurant", SlotType::Str)),
        CommandSchema::new(
            "find_alarm",
            CommandKind::Query {
                entity: "alarm".to_string(),
            },
        )
        .slot(SlotSchema::optional("select", SlotType::Any))
        .slot(SlotSchema::optional("time", SlotType::Str))
        .slot(SlotSchema::optional("label", SlotType::Str)),
    ])
}

pub fn alarm_record(time: &str, label: &str) -> Entity {
    Entity::new("alarm", vec![("time", time), ("label", label)])
}

/// App context holding `count` alarm records (7:00, 8:00, ...)
pub fn alarm_context(count: usize) -> AppContext {
    let mut context = AppContext::default();
    for i in 0..count {
        context.insert(alarm_record(&format!("{}:00", i + 7), "wake"));
    }
    context
}

pub fn build_executor(records: usize) -> ProgramExecutor {
    ProgramExecutor::with_app_context(alarm_registry(), alarm_context(records))
}

/// Run each turn with its position as the turn index, panicking on failure
pub fn run_turns(executor: &mut ProgramExecutor, turns: &[&str]) -> Vec<ActionResult> {
    turns
        .iter()
        .enumerate()
        .map(|(index, text)| {
            executor
                .execute_expression(index, text)
                .unwrap_or_else(|e| panic!("Turn {} '{}' failed: {}", index, text, e))
        })
        .collect()
}

/// Run `setup` turns, then return the error of `failing` run as the next turn
pub fn run_failing(executor: &mut ProgramExecutor, setup: &[&str], failing: &str) -> ExecError {
    run_turns(executor, setup);
    match executor.execute_expression(setup.len(), failing) {
        Ok(result) => panic!("Expected '{}' to fail, got {:?}", failing, result),
        Err(e) => e,
    }
}
