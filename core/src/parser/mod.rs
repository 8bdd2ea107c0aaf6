//! PEST-based parser for program turns
//!
//! A turn is one line such as `create_alarm(time="8:30")`, `x2.label = "swim"`
//! or `x0.entrees.append("fries")`, optionally followed by the follow marker
//! (`#y`) saying that the turn follows the last recommendation.
//!
//! Parsing produces a [`Module`] made of the closed set of nodes in
//! [`crate::executor::types::ast`]. Statement shapes the executor cannot run
//! are rejected here; expression shapes inside a statement are checked by the
//! evaluator.

use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

use crate::executor::types::ast::{Expr, Keyword, Module, Span, Stmt};

pub mod rewrite;

#[cfg(test)]
mod tests;

/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "parser/turn.pest"]
struct TurnParser;

/* ===================== Error Types ===================== */

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// The text does not match the grammar
    #[error("{0}")]
    PestError(String, Option<Span>),
    /// The text matched the grammar but is not a supported statement
    #[error("{0}")]
    BuildError(String, Option<Span>),
    #[error("no expression found")]
    NoExpression,
    #[error("exactly one expression or assignment allowed (found {0})")]
    MultipleStatements(usize),
}

impl ParseError {
    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::PestError(_, span) => *span,
            ParseError::BuildError(_, span) => *span,
            ParseError::NoExpression | ParseError::MultipleStatements(_) => None,
        }
    }

    fn unsupported(what: impl std::fmt::Display, span: Span) -> Self {
        ParseError::BuildError(format!("unsupported expression: {}", what), Some(span))
    }
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        let span = match err.location {
            pest::error::InputLocation::Pos(pos) => Span::new(pos, pos),
            pest::error::InputLocation::Span((start, end)) => Span::new(start, end),
        };
        ParseError::PestError(err.to_string(), Some(span))
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

type Pair<'i> = pest::iterators::Pair<'i, Rule>;

/// Convert a PEST pair's span to our Span type
fn pair_to_span(pair: &Pair) -> Span {
    let pest_span = pair.as_span();
    Span::new(pest_span.start(), pest_span.end())
}

/* ===================== Public API ===================== */

/// Split raw turn text into its expression and the follow flag.
///
/// The expression is the first run of characters that contains neither `#`
/// nor a newline. The turn follows the last recommendation when that run is
/// followed, after at most one newline, by `marker`. Returns `None` when the
/// text holds no such run.
pub fn split_follow_marker<'a>(text: &'a str, marker: &str) -> Option<(&'a str, bool)> {
    let start = text.find(|c: char| c != '#' && c != '\n')?;
    let rest = &text[start..];
    let end = rest.find(['#', '\n']).unwrap_or(rest.len());

    let tail = &rest[end..];
    let tail = tail.strip_prefix('\n').unwrap_or(tail);
    let followed = !marker.is_empty() && tail.starts_with(marker);

    Some((&rest[..end], followed))
}

/// Parse turn text (without follow marker) into a module
pub fn parse_turn(source: &str) -> ParseResult<Module> {
    let mut pairs = TurnParser::parse(Rule::turn, source)?;
    let Some(turn) = pairs.next() else {
        return Ok(Module::new(vec![]));
    };

    let body = turn
        .into_inner()
        .filter(|pair| pair.as_rule() != Rule::EOI)
        .map(build_statement)
        .collect::<ParseResult<Vec<_>>>()?;

    Ok(Module::new(body))
}

/* ===================== AST Builder ===================== */

fn build_statement(pair: Pair) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair);

    match pair.as_rule() {
        Rule::statement => {
            let inner = next_inner(pair)?;
            build_statement(inner)
        }
        Rule::expr_stmt => {
            let value = build_expression(next_inner(pair)?)?;
            build_expr_stmt(value, span)
        }
        Rule::assign => {
            let mut inner = pair.into_inner();
            let target = build_expression(expect_pair(inner.next(), span)?)?;
            let value = build_expression(expect_pair(inner.next(), span)?)?;
            check_assign_target(&target)?;
            Ok(Stmt::Assign {
                target,
                value,
                span,
            })
        }
        Rule::tuple_assign => build_tuple_assign(pair),
        _ => Err(ParseError::BuildError(
            format!("Unexpected statement rule: {:?}", pair.as_rule()),
            Some(span),
        )),
    }
}

/// Expression statements are either a call to a named command, the
/// method-style `var.field.append(value)`, or any other expression.
fn build_expr_stmt(value: Expr, span: Span) -> ParseResult<Stmt> {
    match value {
        Expr::Call {
            func,
            args,
            keywords,
            span: call_span,
        } => match *func {
            Expr::Name { .. } => Ok(Stmt::Expr {
                value: Expr::Call {
                    func,
                    args,
                    keywords,
                    span: call_span,
                },
                span,
            }),
            Expr::Attribute {
                value: target,
                attr,
                ..
            } if attr == "append" => build_append(*target, args, keywords, span),
            other => Err(ParseError::unsupported(
                format!("call on {}", other.shape()),
                call_span,
            )),
        },
        value => Ok(Stmt::Expr { value, span }),
    }
}

fn build_append(
    target: Expr,
    mut args: Vec<Expr>,
    keywords: Vec<Keyword>,
    span: Span,
) -> ParseResult<Stmt> {
    let is_field_of_name = matches!(
        &target,
        Expr::Attribute { value, .. } if matches!(**value, Expr::Name { .. })
    );
    if !is_field_of_name {
        return Err(ParseError::unsupported(
            "append must target a field of a variable (var.field.append(value))",
            target.span(),
        ));
    }
    if args.len() != 1 || !keywords.is_empty() {
        return Err(ParseError::BuildError(
            format!(
                "append takes exactly one positional argument ({} given)",
                args.len() + keywords.len()
            ),
            Some(span),
        ));
    }

    Ok(Stmt::Append {
        target,
        value: args.remove(0),
        span,
    })
}

fn build_tuple_assign(pair: Pair) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair);
    let mut inner = pair.into_inner();

    let targets = expect_pair(inner.next(), span)?
        .into_inner()
        .map(build_expression)
        .collect::<ParseResult<Vec<_>>>()?;
    let values = expect_pair(inner.next(), span)?
        .into_inner()
        .map(build_expression)
        .collect::<ParseResult<Vec<_>>>()?;

    for target in &targets {
        check_assign_target(target)?;
    }
    if targets.len() != values.len() {
        return Err(ParseError::BuildError(
            format!(
                "cannot assign {} values to {} targets",
                values.len(),
                targets.len()
            ),
            Some(span),
        ));
    }

    Ok(Stmt::TupleAssign {
        targets,
        values,
        span,
    })
}

/// Only attribute targets can be assigned: `var.attr` or `var[idx].attr`
fn check_assign_target(target: &Expr) -> ParseResult<()> {
    match target {
        Expr::Attribute { .. } => Ok(()),
        other => Err(ParseError::unsupported(
            format!("cannot assign to {}", other.shape()),
            other.span(),
        )),
    }
}

fn build_expression(pair: Pair) -> ParseResult<Expr> {
    let span = pair_to_span(&pair);

    match pair.as_rule() {
        Rule::expression => {
            let inner = next_inner(pair)?;
            build_expression(inner)
        }
        Rule::postfix_expr => build_postfix(pair),
        Rule::identifier => Ok(Expr::Name {
            id: pair.as_str().to_string(),
            span,
        }),
        Rule::none_lit => Ok(Expr::LitNone { span }),
        Rule::boolean => {
            let v = matches!(pair.as_str(), "True" | "true");
            Ok(Expr::LitBool { v, span })
        }
        Rule::number => build_number(pair.as_str(), span),
        Rule::string => {
            let content = next_inner(pair)?;
            Ok(Expr::LitStr {
                v: unescape(content.as_str()),
                span,
            })
        }
        Rule::list_lit => {
            let elements = pair
                .into_inner()
                .map(build_expression)
                .collect::<ParseResult<Vec<_>>>()?;
            Ok(Expr::LitList { elements, span })
        }
        _ => Err(ParseError::BuildError(
            format!("Unexpected expression rule: {:?}", pair.as_rule()),
            Some(span),
        )),
    }
}

fn build_postfix(pair: Pair) -> ParseResult<Expr> {
    let mut inner = pair.into_inner();
    let head = expect_pair(inner.next(), Span::default())?;
    let mut expr = build_expression(head)?;

    for postfix in inner {
        let postfix_span = pair_to_span(&postfix);
        let new_span = expr.span().merge(&postfix_span);

        expr = match postfix.as_rule() {
            Rule::call_suffix => {
                let (args, keywords) = build_arguments(postfix)?;
                Expr::Call {
                    func: Box::new(expr),
                    args,
                    keywords,
                    span: new_span,
                }
            }
            Rule::attr_access => {
                let attr = next_inner(postfix)?.as_str().to_string();
                Expr::Attribute {
                    value: Box::new(expr),
                    attr,
                    span: new_span,
                }
            }
            Rule::index_access => {
                let index = build_expression(next_inner(postfix)?)?;
                Expr::Subscript {
                    value: Box::new(expr),
                    index: Box::new(index),
                    span: new_span,
                }
            }
            rule => {
                return Err(ParseError::BuildError(
                    format!("Unexpected postfix rule: {:?}", rule),
                    Some(postfix_span),
                ))
            }
        };
    }

    Ok(expr)
}

fn build_arguments(pair: Pair) -> ParseResult<(Vec<Expr>, Vec<Keyword>)> {
    let mut args = Vec::new();
    let mut keywords: Vec<Keyword> = Vec::new();

    for arg in pair.into_inner() {
        let span = pair_to_span(&arg);
        match arg.as_rule() {
            Rule::keyword_arg => {
                let mut inner = arg.into_inner();
                let name = expect_pair(inner.next(), span)?.as_str().to_string();
                if keywords.iter().any(|k| k.arg == name) {
                    return Err(ParseError::BuildError(
                        format!("keyword argument repeated: {}", name),
                        Some(span),
                    ));
                }
                let value = build_expression(expect_pair(inner.next(), span)?)?;
                keywords.push(Keyword {
                    arg: name,
                    value,
                    span,
                });
            }
            _ => {
                if !keywords.is_empty() {
                    return Err(ParseError::BuildError(
                        "positional argument follows keyword argument".to_string(),
                        Some(span),
                    ));
                }
                args.push(build_expression(arg)?);
            }
        }
    }

    Ok((args, keywords))
}

fn build_number(text: &str, span: Span) -> ParseResult<Expr> {
    let is_float = text.contains(['.', 'e', 'E']);
    if is_float {
        let v = text.parse::<f64>().map_err(|e| {
            ParseError::BuildError(
                format!("Failed to parse number '{}': {}", text, e),
                Some(span),
            )
        })?;
        Ok(Expr::LitFloat { v, span })
    } else {
        let v = text.parse::<i64>().map_err(|e| {
            ParseError::BuildError(
                format!("Failed to parse number '{}': {}", text, e),
                Some(span),
            )
        })?;
        Ok(Expr::LitInt { v, span })
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/* ===================== Pair Helpers ===================== */

fn next_inner(pair: Pair) -> ParseResult<Pair> {
    let span = pair_to_span(&pair);
    expect_pair(pair.into_inner().next(), span)
}

/// The grammar guarantees the child exists; report a build error if not
fn expect_pair(pair: Option<Pair>, span: Span) -> ParseResult<Pair> {
    pair.ok_or_else(|| ParseError::BuildError("Missing grammar node".to_string(), Some(span)))
}
