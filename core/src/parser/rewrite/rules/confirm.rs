//! Pass: Confirm
//!
//! ```text
//! confirm(x3)   =>   x3.confirmed = True
//! ```
//!
//! Only a top-level call with a single variable argument is rewritten.

use crate::executor::types::ast::{Expr, Module, Stmt};

use super::super::{match_sugar_call, RewriteRule};

/// Name of the flag set by a confirmation
pub const CONFIRMED_ATTR: &str = "confirmed";

pub struct ConfirmRule;

impl RewriteRule for ConfirmRule {
    fn id(&self) -> &'static str {
        "confirm"
    }

    fn rewrite(&self, module: Module) -> Module {
        let Some(call) = match_sugar_call(&module, "confirm") else {
            return module;
        };

        let target = Expr::Attribute {
            value: Box::new(Expr::Name {
                id: call.var.to_string(),
                span: call.var_span,
            }),
            attr: CONFIRMED_ATTR.to_string(),
            span: call.var_span,
        };

        Module::new(vec![Stmt::Assign {
            target,
            value: Expr::LitBool {
                v: true,
                span: call.stmt_span,
            },
            span: call.stmt_span,
        }])
    }
}
