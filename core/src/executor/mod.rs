//! # Program Executor
//!
//! Runs program turns against a per-conversation [`ExecutionState`].
//!
//! ## Pipeline
//!
//! 1. **Split**: separate the expression from the follow marker (`#y`)
//! 2. **Parse**: build a single-statement [`Module`]
//! 3. **Rewrite**: expand `confirm(x)` and `resume(x)`
//! 4. **Classify**: turn the statement into one [`Call`], evaluating its
//!    sub-expressions
//! 5. **Run**: apply the call and advance the task protocol
//!
//! A failing turn keeps every effect applied before the failure. Clone the
//! state (or use [`ProgramExecutor::snapshot`]) to run speculative turns.

pub mod calls;
pub mod errors;
pub mod expressions;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;

pub use calls::{Call, CallKind, MultiTargetPolicy};
pub use errors::{ErrorKind, ExecError, ExecResult, PerformError};
pub use state::{ExecutionState, TaskRef};
pub use types::{ActionOutput, ActionResult, Module, RecommendedAction, Value};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::parser::rewrite::Rewriter;
use crate::parser::{parse_turn, split_follow_marker, ParseError};
use crate::tasks::{AppContext, CommandRegistry};
use crate::transcript::{ProgramTurn, Turn};

/// Marker appended to a turn that follows the last recommendation
pub const DEFAULT_FOLLOW_MARKER: &str = "#y";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorOptions {
    pub multi_target_policy: MultiTargetPolicy,
    pub follow_marker: String,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            multi_target_policy: MultiTargetPolicy::default(),
            follow_marker: DEFAULT_FOLLOW_MARKER.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct ProgramExecutor {
    registry: CommandRegistry,
    state: ExecutionState,
    rewriter: Rewriter,
    options: ExecutorOptions,
}

impl ProgramExecutor {
    pub fn new(registry: CommandRegistry) -> Self {
        Self::with_app_context(registry, AppContext::default())
    }

    pub fn with_app_context(registry: CommandRegistry, app_context: AppContext) -> Self {
        Self {
            registry,
            state: ExecutionState::new(app_context),
            rewriter: Rewriter::new(),
            options: ExecutorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_rewriter(mut self, rewriter: Rewriter) -> Self {
        self.rewriter = rewriter;
        self
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ExecutionState {
        &mut self.state
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> ExecutionState {
        self.state.clone()
    }

    pub fn restore(&mut self, state: ExecutionState) {
        self.state = state;
    }

    /// Parse and rewrite turn text without executing it.
    ///
    /// Returns the rewritten module and whether the turn follows the last
    /// recommendation.
    pub fn prepare(&self, text: &str) -> Result<(Module, bool), ParseError> {
        let (expression, followed) =
            split_follow_marker(text, &self.options.follow_marker).ok_or(ParseError::NoExpression)?;
        let module = parse_turn(expression)?;
        Ok((self.rewriter.apply(module), followed))
    }

    pub fn execute_turn(&mut self, turn: &ProgramTurn) -> ExecResult<ActionResult> {
        self.execute_expression(turn.index, &turn.expression)
    }

    /// Execute the turn text `text` as turn `index`
    pub fn execute_expression(&mut self, index: usize, text: &str) -> ExecResult<ActionResult> {
        let (module, followed) = self.prepare(text)?;
        let call = calls::classify(
            index,
            &module,
            &self.registry,
            &mut self.state,
            self.options.multi_target_policy,
        )?;

        debug!(
            turn = index,
            expression = %text.trim(),
            call = call.name(),
            var = %call.var_name,
            followed,
            "Executing turn"
        );

        call.run(&mut self.state, followed)
    }

    /// Execute every program turn in order, stopping at the first error
    pub fn execute_program(&mut self, turns: &[Turn]) -> ExecResult<Vec<ActionResult>> {
        turns
            .iter()
            .filter_map(Turn::as_program)
            .map(|turn| self.execute_turn(turn))
            .collect()
    }
}
