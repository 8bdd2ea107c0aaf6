//! What a turn hands back to the conversation: results and recommendations

use serde::{Deserialize, Serialize};

use super::values::Value;
use crate::tasks::Entity;

/// A structured request from a task back to the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecommendedAction {
    /// A slot still needs a value
    RequestValue { dialogue: String, name: String },
    /// A slot needs to be picked among candidate options
    RequestDisambiguation {
        dialogue: String,
        name: String,
        options: Vec<String>,
    },
    /// Every required slot is filled but the task must be confirmed
    RequestConfirmation { dialogue: String, name: String },
}

impl RecommendedAction {
    /// Ask for the value of `slot`
    pub fn request_value(slot: &str) -> Self {
        RecommendedAction::RequestValue {
            dialogue: format!("Ask for {}", slot),
            name: slot.to_string(),
        }
    }

    pub fn request_disambiguation(slot: &str, options: Vec<String>) -> Self {
        RecommendedAction::RequestDisambiguation {
            dialogue: format!("{} ({})", slot, options.join(", ")),
            name: slot.to_string(),
            options,
        }
    }

    pub fn request_confirmation() -> Self {
        RecommendedAction::RequestConfirmation {
            dialogue: "Please confirm".to_string(),
            name: "confirmation".to_string(),
        }
    }

    pub fn dialogue(&self) -> &str {
        match self {
            RecommendedAction::RequestValue { dialogue, .. } => dialogue,
            RecommendedAction::RequestDisambiguation { dialogue, .. } => dialogue,
            RecommendedAction::RequestConfirmation { dialogue, .. } => dialogue,
        }
    }

    /// Name used to match the recommendation when it is followed
    pub fn name(&self) -> &str {
        match self {
            RecommendedAction::RequestValue { name, .. } => name,
            RecommendedAction::RequestDisambiguation { name, .. } => name,
            RecommendedAction::RequestConfirmation { name, .. } => name,
        }
    }
}

/// Payload produced by a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionOutput {
    Inform { dialogue: String },
    InformList { dialogue: String, items: Vec<Entity> },
    /// A plain value recorded by a non-task turn
    Value { value: Value },
}

impl ActionOutput {
    pub fn inform(dialogue: impl Into<String>) -> Self {
        ActionOutput::Inform {
            dialogue: dialogue.into(),
        }
    }

    /// Dialogue of an Inform or InformList payload
    pub fn dialogue(&self) -> Option<&str> {
        match self {
            ActionOutput::Inform { dialogue } | ActionOutput::InformList { dialogue, .. } => {
                Some(dialogue)
            }
            ActionOutput::Value { .. } => None,
        }
    }
}

/// Outcome of executing one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Index of the variable the turn acted on (`x3` -> 3)
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ActionOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_action: Option<RecommendedAction>,
}

impl ActionResult {
    pub fn empty(index: usize) -> Self {
        Self {
            index,
            result: None,
            recommended_action: None,
        }
    }

    pub fn performed(index: usize, result: Option<ActionOutput>) -> Self {
        Self {
            index,
            result,
            recommended_action: None,
        }
    }

    pub fn recommended(index: usize, action: RecommendedAction) -> Self {
        Self {
            index,
            result: None,
            recommended_action: Some(action),
        }
    }
}
