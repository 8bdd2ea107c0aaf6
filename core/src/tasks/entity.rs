//! Query result records

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{AppContext, TaskObject};
use crate::executor::errors::{ExecError, ExecResult, PerformError};
use crate::executor::types::{ActionOutput, RecommendedAction, Value};

/// A record with a fixed set of named attributes.
///
/// Attribute values may change through assignment; the set of names never
/// does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub kind: String,
    pub attributes: Vec<(String, Value)>,
}

impl Entity {
    pub fn new<K, V>(kind: impl Into<String>, attributes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            kind: kind.into(),
            attributes: attributes
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, attr: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|(name, _)| name == attr)
            .map(|(_, value)| value)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} with", self.kind)?;
        for (name, value) in &self.attributes {
            if !value.is_none() {
                write!(f, " {} {}", name, value)?;
            }
        }
        Ok(())
    }
}

impl TaskObject for Entity {
    fn type_name(&self) -> &str {
        &self.kind
    }

    fn recommend_action(&self) -> Option<RecommendedAction> {
        None
    }

    fn perform(&mut self, _app_context: &AppContext) -> Result<Option<ActionOutput>, PerformError> {
        Ok(None)
    }

    fn notify_action(&mut self, _action_name: &str) {}

    fn get_attr(&self, attr: &str) -> ExecResult<Value> {
        self.get(attr)
            .cloned()
            .ok_or_else(|| ExecError::UnknownAttribute {
                owner: self.kind.clone(),
                attr: attr.to_string(),
            })
    }

    fn set_attr(&mut self, attr: &str, value: Value) -> ExecResult<()> {
        match self.attributes.iter_mut().find(|(name, _)| name == attr) {
            Some((_, slot)) => {
                *slot = value;
                Ok(())
            }
            None => Err(ExecError::UnknownAttribute {
                owner: self.kind.clone(),
                attr: attr.to_string(),
            }),
        }
    }
}
