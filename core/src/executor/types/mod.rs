//! Type definitions for the executor
//!
//! - AST nodes (Module, Stmt, Expr)
//! - Runtime values (Value, ObjectId)
//! - Turn outcomes (ActionResult, ActionOutput, RecommendedAction)

pub mod actions;
pub mod ast;
pub mod values;

pub use actions::{ActionOutput, ActionResult, RecommendedAction};
pub use ast::{Expr, Keyword, Module, Span, Stmt};
pub use values::{ObjectId, Value};
