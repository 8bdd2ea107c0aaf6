//! Pass: Resume
//!
//! ```text
//! resume(x3)   =>   x3
//! ```
//!
//! The bare reference re-runs the task protocol on `x3`.

use crate::executor::types::ast::{Expr, Module, Stmt};

use super::super::{match_sugar_call, RewriteRule};

pub struct ResumeRule;

impl RewriteRule for ResumeRule {
    fn id(&self) -> &'static str {
        "resume"
    }

    fn rewrite(&self, module: Module) -> Module {
        let Some(call) = match_sugar_call(&module, "resume") else {
            return module;
        };

        Module::new(vec![Stmt::Expr {
            value: Expr::Name {
                id: call.var.to_string(),
                span: call.var_span,
            },
            span: call.stmt_span,
        }])
    }
}
