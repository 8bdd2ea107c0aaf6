//! Rewrite passes applied to a parsed turn before classification
//!
//! Each pass expands one piece of syntactic sugar into its canonical form:
//!
//! - `confirm(x)` becomes `x.confirmed = True`
//! - `resume(x)` becomes `x`
//!
//! Passes only look at modules made of exactly one top-level statement and
//! return any other input unchanged, so they are idempotent and can run in
//! any order.
//!
//! # Adding a New Pass
//!
//! 1. Create a new file in `rewrite/rules/`
//! 2. Implement `RewriteRule` for your struct
//! 3. Add it to the `Rewriter::new()` constructor

pub mod rules;


use crate::executor::types::ast::{Expr, Module, Span, Stmt};

/// A single AST-to-AST rewrite
pub trait RewriteRule: Send + Sync {
    /// Unique identifier for this pass (e.g., "confirm")
    fn id(&self) -> &'static str;

    /// Rewrite the module; inputs that do not match are returned as-is
    fn rewrite(&self, module: Module) -> Module;
}

/// Runs every registered rewrite pass in order
pub struct Rewriter {
    rules: Vec<Box<dyn RewriteRule>>,
}

impl Rewriter {
    /// Create a rewriter with the built-in passes
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(rules::ConfirmRule),
                Box::new(rules::ResumeRule),
            ],
        }
    }

    /// Create a rewriter with no passes
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Add a pass to run after the existing ones
    pub fn with_rule(mut self, rule: impl RewriteRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn apply(&self, module: Module) -> Module {
        self.rules
            .iter()
            .fold(module, |module, rule| rule.rewrite(module))
    }

    pub fn rule_ids(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.id()).collect()
    }
}

impl Default for Rewriter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Rewriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rewriter")
            .field("rules", &self.rule_ids())
            .finish()
    }
}

/// A top-level `func(var)` call: one positional name argument, no keywords
pub(crate) struct SugarCall<'a> {
    pub var: &'a str,
    pub var_span: Span,
    pub stmt_span: Span,
}

/// Match the only statement of `module` against `func_name(var)`
pub(crate) fn match_sugar_call<'a>(module: &'a Module, func_name: &str) -> Option<SugarCall<'a>> {
    let Some(Stmt::Expr { value, span }) = module.single() else {
        return None;
    };
    let Expr::Call {
        func,
        args,
        keywords,
        ..
    } = value
    else {
        return None;
    };
    if func.as_name() != Some(func_name) || !keywords.is_empty() {
        return None;
    }
    match args.as_slice() {
        [arg @ Expr::Name { id, .. }] => Some(SugarCall {
            var: id,
            var_span: arg.span(),
            stmt_span: *span,
        }),
        _ => None,
    }
}
