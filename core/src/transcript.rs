//! Conversation transcripts
//!
//! A transcript interleaves user utterances, program turns and agent
//! responses:
//!
//! ```text
//! user: wake me up at 8:30 for swimming
//! 0 create_alarm(time="8:30", label="swim")
//! 1 perform(x0)
//! lucid: Your alarm is set.
//! ```
//!
//! [`Conversation`] executes the program turns as they are added and can
//! derive the follow-up turn an app would insert after each result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::executor::{
    ActionOutput, ActionResult, ExecResult, ProgramExecutor, RecommendedAction,
    DEFAULT_FOLLOW_MARKER,
};

pub const USER_PREFIX: &str = "user: ";
pub const AGENT_PREFIX: &str = "lucid: ";

/* ===================== Turns ===================== */

/// One program line: the turn index and its expression text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramTurn {
    pub index: usize,
    /// Expression text, possibly followed by the follow marker
    pub expression: String,
}

impl ProgramTurn {
    pub fn new(index: usize, expression: impl Into<String>) -> Self {
        Self {
            index,
            expression: expression.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Turn {
    User { query: String },
    /// Written by the program generator
    Program(ProgramTurn),
    /// Inserted from an app result (`perform(x3)`)
    Auto(ProgramTurn),
    /// Inserted from an app recommendation; only shown while it is the last
    /// turn
    AutoTransient(ProgramTurn),
    Agent { response: String },
}

impl Turn {
    pub fn user(query: impl Into<String>) -> Self {
        Turn::User {
            query: query.into(),
        }
    }

    pub fn program(index: usize, expression: impl Into<String>) -> Self {
        Turn::Program(ProgramTurn::new(index, expression))
    }

    pub fn agent(response: impl Into<String>) -> Self {
        Turn::Agent {
            response: response.into(),
        }
    }

    /// The program line of a program, auto or auto-transient turn
    pub fn as_program(&self) -> Option<&ProgramTurn> {
        match self {
            Turn::Program(turn) | Turn::Auto(turn) | Turn::AutoTransient(turn) => Some(turn),
            Turn::User { .. } | Turn::Agent { .. } => None,
        }
    }

    pub fn index(&self) -> Option<usize> {
        self.as_program().map(|turn| turn.index)
    }

    /// Text form of the turn with `follow_marker` removed from program lines
    pub fn render(&self, follow_marker: &str) -> String {
        match self {
            Turn::User { query } => format!("{}{}", USER_PREFIX, query),
            Turn::Program(turn) => format!(
                "{} {}",
                turn.index,
                strip_marker(&turn.expression, follow_marker)
            ),
            Turn::Auto(turn) | Turn::AutoTransient(turn) => {
                format!("{} {}", turn.index, turn.expression)
            }
            Turn::Agent { response } => format!("{}{}", AGENT_PREFIX, response),
        }
    }
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(DEFAULT_FOLLOW_MARKER))
    }
}

fn strip_marker<'a>(expression: &'a str, marker: &str) -> &'a str {
    let trimmed = expression.trim_end();
    if marker.is_empty() {
        return trimmed;
    }
    trimmed
        .strip_suffix(marker)
        .map(str::trim_end)
        .unwrap_or(trimmed)
}

/// Highest program turn index, if any
pub fn max_turn_index(turns: &[Turn]) -> Option<usize> {
    turns.iter().filter_map(Turn::index).max()
}

/* ===================== Follow-up Turns ===================== */

/// The turn an app inserts after `result`.
///
/// A recommendation becomes a transient `hint(...)`; an Inform payload
/// becomes `perform(x<i>)`.
pub fn followup_turn(result: &ActionResult, next_index: usize) -> Option<Turn> {
    let reference = format!("x{}", result.index);

    if let Some(action) = &result.recommended_action {
        let prefix = match action {
            RecommendedAction::RequestValue { .. } => "ask for value",
            RecommendedAction::RequestDisambiguation { .. } => "choose between values",
            RecommendedAction::RequestConfirmation { .. } => "please confirm",
        };
        let message = escape(&format!("{}: {}", prefix, action.dialogue()));
        return Some(Turn::AutoTransient(ProgramTurn::new(
            next_index,
            format!("hint(\"{}\", ref={})", message, reference),
        )));
    }

    match &result.result {
        Some(ActionOutput::Inform { .. } | ActionOutput::InformList { .. }) => Some(Turn::Auto(
            ProgramTurn::new(next_index, format!("perform({})", reference)),
        )),
        _ => None,
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/* ===================== Transcript Text ===================== */

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("line {line}: expected 'user: ', 'lucid: ' or '<index> <expression>', got '{text}'")]
    InvalidLine { line: usize, text: String },

    #[error("line {line}: follow marker without a preceding program turn")]
    DanglingMarker { line: usize },
}

/// A parsed transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub turns: Vec<Turn>,
    /// Marker stripped from program lines when the transcript is printed
    #[serde(default = "default_follow_marker")]
    pub follow_marker: String,
}

fn default_follow_marker() -> String {
    DEFAULT_FOLLOW_MARKER.to_string()
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new(DEFAULT_FOLLOW_MARKER)
    }
}

impl Transcript {
    pub fn new(follow_marker: impl Into<String>) -> Self {
        Self {
            turns: Vec::new(),
            follow_marker: follow_marker.into(),
        }
    }

    /// Parse the text form; a line holding only the follow marker attaches
    /// to the program turn above it
    pub fn parse(text: &str, follow_marker: &str) -> Result<Self, TranscriptError> {
        let mut turns: Vec<Turn> = Vec::new();

        for (i, raw) in text.lines().enumerate() {
            let line = raw.trim();
            let line_no = i + 1;
            if line.is_empty() {
                continue;
            }

            if !follow_marker.is_empty() && line == follow_marker {
                match turns.last_mut() {
                    Some(Turn::Program(turn)) => {
                        turn.expression.push('\n');
                        turn.expression.push_str(follow_marker);
                    }
                    _ => return Err(TranscriptError::DanglingMarker { line: line_no }),
                }
                continue;
            }

            if let Some(query) = line.strip_prefix(USER_PREFIX.trim_end()) {
                turns.push(Turn::user(query.trim()));
            } else if let Some(response) = line.strip_prefix(AGENT_PREFIX.trim_end()) {
                turns.push(Turn::agent(response.trim()));
            } else if let Some(turn) = parse_program_line(line) {
                turns.push(Turn::Program(turn));
            } else if line.starts_with('#') {
                debug!(line = line_no, "Skipping comment line");
            } else {
                return Err(TranscriptError::InvalidLine {
                    line: line_no,
                    text: line.to_string(),
                });
            }
        }

        Ok(Self {
            turns,
            follow_marker: follow_marker.to_string(),
        })
    }

    pub fn program_turns(&self) -> impl Iterator<Item = &ProgramTurn> {
        self.turns.iter().filter_map(Turn::as_program)
    }

    pub fn max_turn_index(&self) -> Option<usize> {
        max_turn_index(&self.turns)
    }
}

impl FromStr for Transcript {
    type Err = TranscriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Transcript::parse(s, DEFAULT_FOLLOW_MARKER)
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last = self.turns.len().saturating_sub(1);
        let mut first = true;
        for (i, turn) in self.turns.iter().enumerate() {
            if matches!(turn, Turn::AutoTransient(_)) && i != last {
                continue;
            }
            if !first {
                writeln!(f)?;
            }
            f.write_str(&turn.render(&self.follow_marker))?;
            first = false;
        }
        Ok(())
    }
}

fn parse_program_line(line: &str) -> Option<ProgramTurn> {
    let (index, expression) = line.split_once(char::is_whitespace)?;
    let index = index.parse().ok()?;
    Some(ProgramTurn::new(index, expression.trim()))
}

/* ===================== Conversation ===================== */

/// Outcome of one executed program turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutcome {
    pub index: usize,
    pub expression: String,
    /// Inserted by follow-up derivation rather than read or generated
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub auto: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ActionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationReport {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub turns: Vec<TurnOutcome>,
    pub completed: Vec<String>,
    pub incomplete: Vec<String>,
}

/// A conversation in progress: its turns and the executor running them.
///
/// A program turn that fails leaves the state as it was before the turn and
/// is not added to the transcript.
#[derive(Debug)]
pub struct Conversation {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    transcript: Transcript,
    executor: ProgramExecutor,
    auto_followup: bool,
    outcomes: Vec<TurnOutcome>,
}

impl Conversation {
    pub fn new(executor: ProgramExecutor) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            transcript: Transcript::new(executor.options().follow_marker.clone()),
            executor,
            auto_followup: false,
            outcomes: Vec::new(),
        }
    }

    /// Also execute the follow-up turn derived from each program turn
    pub fn with_auto_followup(mut self, enabled: bool) -> Self {
        self.auto_followup = enabled;
        self
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn executor(&self) -> &ProgramExecutor {
        &self.executor
    }

    pub fn outcomes(&self) -> &[TurnOutcome] {
        &self.outcomes
    }

    pub fn next_index(&self) -> usize {
        self.transcript.max_turn_index().map_or(0, |index| index + 1)
    }

    pub fn push_user(&mut self, query: impl Into<String>) {
        self.transcript.turns.push(Turn::user(query));
    }

    pub fn push_agent(&mut self, response: impl Into<String>) {
        self.transcript.turns.push(Turn::agent(response));
    }

    /// Execute `expression` as the next program turn
    pub fn push_program(&mut self, expression: impl Into<String>) -> ExecResult<ActionResult> {
        let turn = Turn::program(self.next_index(), expression);
        self.push(turn)
            .unwrap_or_else(|| unreachable!("program turns always execute"))
    }

    /// Add a turn, executing it when it is a program line.
    ///
    /// Returns the execution result of a program line; `None` for user and
    /// agent turns.
    pub fn push(&mut self, turn: Turn) -> Option<ExecResult<ActionResult>> {
        let Some(program) = turn.as_program().cloned() else {
            self.transcript.turns.push(turn);
            return None;
        };
        let auto = !matches!(turn, Turn::Program(_));

        let snapshot = self.executor.snapshot();
        let outcome = self.executor.execute_turn(&program);

        let mut record = TurnOutcome {
            index: program.index,
            expression: program.expression.clone(),
            auto,
            result: None,
            error: None,
        };

        match &outcome {
            Ok(result) => {
                record.result = Some(result.clone());
                self.outcomes.push(record);
                self.transcript.turns.push(turn);

                if self.auto_followup && !auto {
                    if let Some(followup) = followup_turn(result, self.next_index()) {
                        if let Some(Err(e)) = self.push(followup) {
                            warn!(error = %e, "Follow-up turn failed");
                        }
                    }
                }
            }
            Err(e) => {
                warn!(turn = program.index, error = %e, kind = ?e.kind(), "Turn failed");
                self.executor.restore(snapshot);
                record.error = Some(e.to_string());
                self.outcomes.push(record);
            }
        }

        Some(outcome)
    }

    /// Add every turn of a transcript, continuing past failed turns
    pub fn run_transcript(&mut self, transcript: Transcript) {
        for turn in transcript.turns {
            self.push(turn);
        }
    }

    pub fn report(&self) -> ConversationReport {
        let state = self.executor.state();
        let mut completed: Vec<String> = state.completed.iter().cloned().collect();
        completed.sort_by_key(|var| crate::executor::state::var_index(var));

        ConversationReport {
            id: self.id,
            started_at: self.started_at,
            turns: self.outcomes.clone(),
            completed,
            incomplete: state.incomplete_tasks(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transcript() {
        let text = "user: set an alarm\n0 create_alarm()\n#y\n\nlucid: What time?\n1 x0.time = \"8:30\" #y\n";
        let transcript: Transcript = text.parse().unwrap();

        assert_eq!(transcript.turns.len(), 4);
        assert_eq!(transcript.turns[0], Turn::user("set an alarm"));
        assert_eq!(transcript.turns[1], Turn::program(0, "create_alarm()\n#y"));
        assert_eq!(transcript.turns[2], Turn::agent("What time?"));
        assert_eq!(transcript.turns[3], Turn::program(1, "x0.time = \"8:30\" #y"));
        assert_eq!(transcript.max_turn_index(), Some(1));
    }

    #[test]
    fn test_parse_rejects_unknown_lines() {
        assert_eq!(
            "hello there".parse::<Transcript>(),
            Err(TranscriptError::InvalidLine {
                line: 1,
                text: "hello there".to_string()
            })
        );
        assert_eq!(
            "#y".parse::<Transcript>(),
            Err(TranscriptError::DanglingMarker { line: 1 })
        );
    }

    #[test]
    fn test_display_strips_marker_and_stale_hints() {
        let transcript = Transcript {
            turns: vec![
                Turn::program(0, "create_alarm()\n#y"),
                Turn::AutoTransient(ProgramTurn::new(1, "hint(\"x\", ref=x0)")),
                Turn::program(2, "x0.time = \"8:30\" #y"),
            ],
            ..Transcript::default()
        };
        assert_eq!(
            transcript.to_string(),
            "0 create_alarm()\n2 x0.time = \"8:30\""
        );
    }

    #[test]
    fn test_display_strips_configured_marker() {
        let text = "0 create_alarm()\n#ok\n1 x0.time = \"8:30\" #ok\n2 say(\"#y\")";
        let transcript = Transcript::parse(text, "#ok").unwrap();

        assert_eq!(transcript.follow_marker, "#ok");
        assert_eq!(
            transcript.to_string(),
            "0 create_alarm()\n1 x0.time = \"8:30\"\n2 say(\"#y\")"
        );
    }

    #[test]
    fn test_turn_json_shape() {
        let json = serde_json::to_value(Turn::user("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "user", "query": "hi"}));

        let json = serde_json::to_value(Turn::program(2, "perform(x1)")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "program", "index": 2, "expression": "perform(x1)"})
        );
    }

    #[test]
    fn test_max_turn_index_empty() {
        assert_eq!(max_turn_index(&[Turn::user("hi")]), None);
    }

    #[test]
    fn test_followup_for_recommendation() {
        let result = ActionResult::recommended(3, RecommendedAction::request_value("label"));
        let turn = followup_turn(&result, 4).unwrap();
        assert_eq!(
            turn,
            Turn::AutoTransient(ProgramTurn::new(
                4,
                "hint(\"ask for value: Ask for label\", ref=x3)"
            ))
        );

        let result = ActionResult::recommended(0, RecommendedAction::request_confirmation());
        let turn = followup_turn(&result, 1).unwrap();
        assert!(turn.to_string().contains("please confirm: Please confirm"));
    }

    #[test]
    fn test_followup_escapes_quotes() {
        let result = ActionResult::recommended(
            1,
            RecommendedAction::request_disambiguation("song", vec!["\"Hey\"".into()]),
        );
        let turn = followup_turn(&result, 2).unwrap();
        let expression = &turn.as_program().unwrap().expression;
        assert!(crate::parser::parse_turn(expression).is_ok(), "{}", expression);
    }

    #[test]
    fn test_followup_for_inform() {
        let result = ActionResult::performed(2, Some(ActionOutput::inform("Success")));
        assert_eq!(
            followup_turn(&result, 3),
            Some(Turn::Auto(ProgramTurn::new(3, "perform(x2)")))
        );

        assert_eq!(followup_turn(&ActionResult::empty(2), 3), None);
    }
}
