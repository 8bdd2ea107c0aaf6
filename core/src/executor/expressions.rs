//! Expression evaluation
//!
//! Resolves an expression node to a runtime value:
//!
//! - literals and list literals evaluate to themselves
//! - a bare name resolves to its binding
//! - `var.attr` and `var[idx].attr` read an attribute of a task or entity
//! - `command(...)` builds a new task from the registry and fills its slots
//!
//! Every other node is an unsupported expression.

use super::errors::{ExecError, ExecResult};
use super::state::ExecutionState;
use super::types::{Expr, Keyword, Value};
use crate::tasks::{CommandRegistry, Object, TaskObject};

/// Evaluate an expression against the state, allocating any task it builds
pub fn eval_expr(
    expr: &Expr,
    registry: &CommandRegistry,
    state: &mut ExecutionState,
) -> ExecResult<Value> {
    if let Some(value) = constant_value(expr) {
        return Ok(value);
    }

    match expr {
        Expr::LitList { elements, .. } => elements
            .iter()
            .map(|element| eval_expr(element, registry, state))
            .collect::<ExecResult<Vec<_>>>()
            .map(Value::List),

        Expr::Name { id, .. } => state.lookup(id).cloned(),

        Expr::Attribute { value, attr, .. } => eval_attribute(value, attr, state),

        Expr::Call {
            func,
            args,
            keywords,
            ..
        } => match func.as_name() {
            Some(name) => eval_call(name, args, keywords, registry, state),
            None => Err(unsupported(expr)),
        },

        _ => Err(unsupported(expr)),
    }
}

/// The value of a literal, or of a list made only of literals
pub fn constant_value(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::LitNone { .. } => Some(Value::None),
        Expr::LitBool { v, .. } => Some(Value::Bool(*v)),
        Expr::LitInt { v, .. } => Some(Value::Int(*v)),
        Expr::LitFloat { v, .. } => Some(Value::Float(*v)),
        Expr::LitStr { v, .. } => Some(Value::Str(v.clone())),
        Expr::LitList { elements, .. } => elements
            .iter()
            .map(constant_value)
            .collect::<Option<Vec<_>>>()
            .map(Value::List),
        _ => None,
    }
}

/// The index of `var[idx]`: an integer literal or `None`
pub fn subscript_index(index: &Expr) -> ExecResult<Option<i64>> {
    match index {
        Expr::LitInt { v, .. } => Ok(Some(*v)),
        Expr::LitNone { .. } => Ok(None),
        other => Err(ExecError::UnsupportedExpression(format!(
            "index must be an integer or None, got {}",
            other.shape()
        ))),
    }
}

fn eval_attribute(base: &Expr, attr: &str, state: &ExecutionState) -> ExecResult<Value> {
    match base {
        Expr::Name { id, .. } => {
            let value = state.lookup(id)?;
            let Some(object) = value.as_object() else {
                return Err(ExecError::NotATask {
                    var: id.clone(),
                    found: value.type_name().to_string(),
                });
            };
            state.object(object).as_task().get_attr(attr)
        }

        Expr::Subscript { value, index, .. } => {
            let Some(var) = value.as_name() else {
                return Err(unsupported(base));
            };
            let index = subscript_index(index)?;

            match state.lookup(var)? {
                Value::List(items) => {
                    let element = index
                        .and_then(|i| usize::try_from(i).ok())
                        .and_then(|i| items.get(i))
                        .ok_or_else(|| ExecError::IndexOutOfBound {
                            var: var.to_string(),
                            index: index.unwrap_or(-1),
                            len: items.len(),
                        })?;
                    match element.as_object() {
                        Some(id) => state.object(id).as_task().get_attr(attr),
                        None => Err(ExecError::NotATask {
                            var: format!("{}[{}]", var, index.unwrap_or_default()),
                            found: element.type_name().to_string(),
                        }),
                    }
                }
                _ => {
                    let target = state.get_assignment(var, index)?;
                    state.task(target).get_attr(attr)
                }
            }
        }

        other => Err(unsupported(other)),
    }
}

fn eval_call(
    name: &str,
    args: &[Expr],
    keywords: &[Keyword],
    registry: &CommandRegistry,
    state: &mut ExecutionState,
) -> ExecResult<Value> {
    let mut command = registry.build(name)?;

    let positional = command.positional_args();
    if args.len() > positional.len() {
        return Err(ExecError::TooManyPositional {
            command: name.to_string(),
            given: args.len(),
            accepted: positional.len(),
        });
    }

    let slots: Vec<(String, &Expr)> = positional
        .iter()
        .cloned()
        .zip(args)
        .chain(keywords.iter().map(|kw| (kw.arg.clone(), &kw.value)))
        .collect();

    for (slot, expr) in slots {
        let value = eval_expr(expr, registry, state)?;
        command.set_attr(&slot, value)?;
    }

    Ok(Value::Object(state.alloc(Object::Command(command))))
}

fn unsupported(expr: &Expr) -> ExecError {
    let detail = match expr {
        Expr::Call { func, .. } => format!("call on {}", func.shape()),
        Expr::Subscript { .. } => "subscript outside of attribute access".to_string(),
        Expr::Attribute { value, .. } => format!("attribute of {}", value.shape()),
        other => other.shape().to_string(),
    };
    ExecError::UnsupportedExpression(detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_turn;
    use crate::executor::types::Stmt;
    use crate::tasks::schema::{CommandKind, CommandSchema, SlotSchema, SlotType};

    fn registry() -> CommandRegistry {
        CommandRegistry::new(vec![
            CommandSchema::new("send_message", CommandKind::Intent)
                .slot(SlotSchema::required("recipient", SlotType::Object("Contact".into())))
                .slot(SlotSchema::required("content", SlotType::Str))
                .slot(SlotSchema::optional("tags", SlotType::List))
                .positional(&["recipient", "content"]),
        ])
    }

    fn eval(source: &str, state: &mut ExecutionState) -> ExecResult<Value> {
        let module = parse_turn(source).unwrap();
        let Some(Stmt::Expr { value, .. }) = module.single() else {
            panic!("Expected expression statement");
        };
        eval_expr(value, &registry(), state)
    }

    #[test]
    fn test_literals() {
        let mut state = ExecutionState::default();
        assert_eq!(eval("3", &mut state).unwrap(), Value::Int(3));
        assert_eq!(
            eval("['a', None]", &mut state).unwrap(),
            Value::List(vec!["a".into(), Value::None])
        );
    }

    #[test]
    fn test_list_resolves_names() {
        let mut state = ExecutionState::default();
        state.bind("x1", Value::Int(1));
        assert_eq!(
            eval("[x1, 2]", &mut state).unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn test_call_maps_positional_then_keywords() {
        let mut state = ExecutionState::default();
        state.bind("x0", Value::from("hello"));

        let value = eval("send_message(None, x0, tags=['a'])", &mut state).unwrap();
        let id = value.as_object().unwrap();
        let command = state.object(id).as_command().unwrap();
        assert_eq!(command.get_attr("content").unwrap(), Value::from("hello"));
        assert_eq!(command.get_attr("tags").unwrap(), Value::List(vec!["a".into()]));
    }

    #[test]
    fn test_too_many_positional() {
        let mut state = ExecutionState::default();
        let err = eval("send_message(1, 2, 3)", &mut state).unwrap_err();
        assert!(matches!(
            err,
            ExecError::TooManyPositional {
                given: 3,
                accepted: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_nested_call_is_shared_object() {
        let mut state = ExecutionState::default();
        let outer = eval("say(send_message(content='hi'))", &mut state).unwrap();
        let outer = state.object(outer.as_object().unwrap()).as_command().unwrap();
        assert!(matches!(outer.get_attr("args").unwrap(), Value::Object(_)));
    }

    #[test]
    fn test_attribute_of_unbound_variable() {
        let mut state = ExecutionState::default();
        let err = eval("x4.content", &mut state).unwrap_err();
        assert_eq!(err.to_string(), "x4 not found");
    }

    #[test]
    fn test_attribute_of_list_element() {
        let mut state = ExecutionState::default();
        let message = eval("send_message(content='hi')", &mut state).unwrap();
        state.bind("x2", Value::List(vec![message]));

        assert_eq!(eval("x2[0].content", &mut state).unwrap(), Value::from("hi"));
        assert!(matches!(
            eval("x2[3].content", &mut state),
            Err(ExecError::IndexOutOfBound { .. })
        ));
    }

    #[test]
    fn test_unsupported_shapes() {
        let mut state = ExecutionState::default();
        state.bind("x1", Value::List(vec![]));
        for source in ["x1[0]", "x1.a.b", "x1[x1].a"] {
            assert!(
                matches!(
                    eval(source, &mut state),
                    Err(ExecError::UnsupportedExpression(_) | ExecError::UnboundVariable(_))
                ),
                "{} should be unsupported",
                source
            );
        }
    }

    #[test]
    fn test_constant_value() {
        let module = parse_turn("['a', 1, x1]").unwrap();
        let Some(Stmt::Expr { value, .. }) = module.single() else {
            panic!("Expected expression statement");
        };
        assert_eq!(constant_value(value), None);
    }
}
