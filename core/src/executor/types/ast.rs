//! Abstract Syntax Tree node types
//!
//! The tree is deliberately closed: a turn can only ever be one of the
//! statement shapes below, built from the expression shapes below.

use serde::{Deserialize, Serialize};

/// Byte range of a node inside the turn text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span {
    /// Start byte offset
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Create a span that covers both self and other
    pub fn merge(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// A parsed turn: the list of top-level statements.
///
/// The grammar admits several statements so that the classifier can report
/// "exactly one expression or assignment allowed" instead of a grammar error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub body: Vec<Stmt>,
}

impl Module {
    pub fn new(body: Vec<Stmt>) -> Self {
        Self { body }
    }

    /// The only statement of a single-statement module
    pub fn single(&self) -> Option<&Stmt> {
        match self.body.as_slice() {
            [stmt] => Some(stmt),
            _ => None,
        }
    }
}

/// Keyword argument of a call: `name=value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub arg: String,
    pub value: Expr,
    #[serde(default, skip_serializing_if = "is_default_span")]
    pub span: Span,
}

/// Statement AST node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Stmt {
    /// A bare expression: `create_alarm(time="8:30")`, `x3`
    Expr {
        value: Expr,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// `x0.duration = "10 minutes"` or `x0[1].label = "swim"`
    Assign {
        target: Expr,
        value: Expr,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// `x0.duration, x0.label = "10 minutes", "noodles"`
    TupleAssign {
        targets: Vec<Expr>,
        values: Vec<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// `x0.entrees.append("fries")`; `target` is always an attribute of a name
    Append {
        target: Expr,
        value: Expr,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
}

impl Stmt {
    /// Get the span of this statement
    pub fn span(&self) -> Span {
        match self {
            Stmt::Expr { span, .. } => *span,
            Stmt::Assign { span, .. } => *span,
            Stmt::TupleAssign { span, .. } => *span,
            Stmt::Append { span, .. } => *span,
        }
    }
}

/// Expression AST node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Expr {
    LitNone {
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    LitBool {
        v: bool,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    LitInt {
        v: i64,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    LitFloat {
        v: f64,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    LitStr {
        v: String,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    LitList {
        elements: Vec<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Name {
        id: String,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Subscript {
        value: Box<Expr>,
        index: Box<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
}

impl Expr {
    /// Get the span of this expression
    pub fn span(&self) -> Span {
        match self {
            Expr::LitNone { span } => *span,
            Expr::LitBool { span, .. } => *span,
            Expr::LitInt { span, .. } => *span,
            Expr::LitFloat { span, .. } => *span,
            Expr::LitStr { span, .. } => *span,
            Expr::LitList { span, .. } => *span,
            Expr::Name { span, .. } => *span,
            Expr::Attribute { span, .. } => *span,
            Expr::Subscript { span, .. } => *span,
            Expr::Call { span, .. } => *span,
        }
    }

    /// The identifier if this is a bare name
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Expr::Name { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Short human-readable description of the node shape, used in errors
    pub fn shape(&self) -> &'static str {
        match self {
            Expr::LitNone { .. }
            | Expr::LitBool { .. }
            | Expr::LitInt { .. }
            | Expr::LitFloat { .. }
            | Expr::LitStr { .. } => "constant",
            Expr::LitList { .. } => "list",
            Expr::Name { .. } => "name",
            Expr::Attribute { .. } => "attribute",
            Expr::Subscript { .. } => "subscript",
            Expr::Call { .. } => "call",
        }
    }
}

/// Helper function for serde to skip serializing default spans
fn is_default_span(span: &Span) -> bool {
    *span == Span::default()
}
