//! Error types raised while executing a turn
//!
//! Every error aborts the current turn. Effects applied before the failing
//! step are kept; callers snapshot the state if they need atomic turns.

use thiserror::Error;

use crate::parser::ParseError;

/// Coarse classification of an execution failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Turn text does not match a supported statement shape
    Parse,
    /// Unknown command, unbound variable, unknown attribute or unsupported node
    Resolution,
    /// Too many positional arguments
    Arity,
    /// Entity-query indexing failed
    Index,
    /// A value was used where a task was required, or had the wrong type
    Protocol,
    /// The task's domain side effect failed
    Perform,
}

/// Failure of a task's `perform` side effect
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PerformError {
    #[error("no {entity} records available in the app context")]
    NoRecords { entity: String },
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{0} is not registered")]
    UnknownCommand(String),

    #[error("{0} not found")]
    UnboundVariable(String),

    #[error("unsupported expression: {0}")]
    UnsupportedExpression(String),

    #[error("{owner} has no attribute '{attr}'")]
    UnknownAttribute { owner: String, attr: String },

    #[error("too many positional arguments passed to {command}: got {given}, accepts {accepted}")]
    TooManyPositional {
        command: String,
        given: usize,
        accepted: usize,
    },

    #[error("multiple entities found in {var}")]
    MultipleEntities { var: String },

    #[error("index {index} of entity out of bound in {var} ({len} results)")]
    IndexOutOfBound { var: String, index: i64, len: usize },

    #[error("{var} has no entity to update")]
    NoEntity { var: String },

    #[error("cannot index {var} of type {found}")]
    NotIndexable { var: String, found: String },

    #[error("{var} must be a Command or Entity (was {found})")]
    NotATask { var: String, found: String },

    #[error("{owner}.{slot} expects {expected}, got {found}")]
    SlotType {
        owner: String,
        slot: String,
        expected: String,
        found: String,
    },

    #[error("{owner}.{slot} is not a list")]
    NotAList { owner: String, slot: String },

    #[error("assignment spans several variables ({vars}); only one may be updated per turn")]
    CrossVariableAssignment { vars: String },

    #[error("failed to perform {var}: {source}")]
    Perform {
        var: String,
        #[source]
        source: PerformError,
    },
}

impl ExecError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecError::Parse(_) => ErrorKind::Parse,
            ExecError::UnknownCommand(_)
            | ExecError::UnboundVariable(_)
            | ExecError::UnsupportedExpression(_)
            | ExecError::UnknownAttribute { .. } => ErrorKind::Resolution,
            ExecError::TooManyPositional { .. } => ErrorKind::Arity,
            ExecError::MultipleEntities { .. }
            | ExecError::IndexOutOfBound { .. }
            | ExecError::NoEntity { .. }
            | ExecError::NotIndexable { .. } => ErrorKind::Index,
            ExecError::NotATask { .. }
            | ExecError::SlotType { .. }
            | ExecError::NotAList { .. }
            | ExecError::CrossVariableAssignment { .. } => ErrorKind::Protocol,
            ExecError::Perform { .. } => ErrorKind::Perform,
        }
    }
}

pub type ExecResult<T> = Result<T, ExecError>;
