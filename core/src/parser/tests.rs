//! Tests for the turn parser

use super::*;

// ============================================================================
// Helper Functions
// ============================================================================

/// Parse source that must hold exactly one statement
fn parse_one(source: &str) -> Stmt {
    let module = parse_turn(source).expect("Parse should succeed");
    assert_eq!(module.body.len(), 1, "expected one statement in {:?}", source);
    module.body.into_iter().next().unwrap()
}

fn parse_err(source: &str) -> ParseError {
    parse_turn(source).expect_err("Parse should fail")
}

// ============================================================================
// Follow Marker
// ============================================================================

#[test]
fn test_split_follow_marker_plain() {
    assert_eq!(
        split_follow_marker("create_alarm()", "#y"),
        Some(("create_alarm()", false))
    );
}

#[test]
fn test_split_follow_marker_inline() {
    assert_eq!(
        split_follow_marker("x2.label = \"swim\" #y", "#y"),
        Some(("x2.label = \"swim\" ", true))
    );
}

#[test]
fn test_split_follow_marker_next_line() {
    assert_eq!(
        split_follow_marker("resume(x1)\n#y", "#y"),
        Some(("resume(x1)", true))
    );
}

#[test]
fn test_split_follow_marker_other_comment() {
    assert_eq!(
        split_follow_marker("x0 #note", "#y"),
        Some(("x0 ", false))
    );
}

#[test]
fn test_split_follow_marker_empty() {
    assert_eq!(split_follow_marker("", "#y"), None);
    assert_eq!(split_follow_marker("#\n#", "#y"), None);
}

// ============================================================================
// Statement Shapes
// ============================================================================

#[test]
fn test_parse_call_with_keywords() {
    let stmt = parse_one(r#"create_alarm(time="8:30", label='swim')"#);
    let Stmt::Expr {
        value: Expr::Call {
            func,
            args,
            keywords,
            ..
        },
        ..
    } = stmt
    else {
        panic!("Expected call statement, got {:?}", stmt);
    };

    assert_eq!(func.as_name(), Some("create_alarm"));
    assert!(args.is_empty());
    assert_eq!(keywords.len(), 2);
    assert_eq!(keywords[0].arg, "time");
    assert!(matches!(&keywords[0].value, Expr::LitStr { v, .. } if v == "8:30"));
    assert!(matches!(&keywords[1].value, Expr::LitStr { v, .. } if v == "swim"));
}

#[test]
fn test_parse_call_with_positional_and_nested_call() {
    let stmt = parse_one("send_message(find_contact(name=\"Ann\"), x1.body)");
    let Stmt::Expr {
        value: Expr::Call { args, .. },
        ..
    } = stmt
    else {
        panic!("Expected call statement");
    };

    assert_eq!(args.len(), 2);
    assert_eq!(args[0].shape(), "call");
    assert_eq!(args[1].shape(), "attribute");
}

#[test]
fn test_parse_bare_name() {
    let stmt = parse_one("x3");
    assert!(matches!(stmt, Stmt::Expr { value: Expr::Name { ref id, .. }, .. } if id == "x3"));
}

#[test]
fn test_parse_attribute_assignment() {
    let stmt = parse_one("x2.time = \"8:30\"");
    let Stmt::Assign { target, value, .. } = stmt else {
        panic!("Expected assignment");
    };

    let Expr::Attribute { value: base, attr, .. } = target else {
        panic!("Expected attribute target");
    };
    assert_eq!(base.as_name(), Some("x2"));
    assert_eq!(attr, "time");
    assert!(matches!(value, Expr::LitStr { ref v, .. } if v == "8:30"));
}

#[test]
fn test_parse_indexed_assignment() {
    let stmt = parse_one("x9[1].label = None");
    let Stmt::Assign { target, value, .. } = stmt else {
        panic!("Expected assignment");
    };

    let Expr::Attribute { value: base, .. } = target else {
        panic!("Expected attribute target");
    };
    let Expr::Subscript { value: var, index, .. } = *base else {
        panic!("Expected subscript");
    };
    assert_eq!(var.as_name(), Some("x9"));
    assert!(matches!(*index, Expr::LitInt { v: 1, .. }));
    assert!(matches!(value, Expr::LitNone { .. }));
}

#[test]
fn test_parse_tuple_assignment() {
    let stmt = parse_one("x1.time, x1.repeat = \"9:00\", True");
    let Stmt::TupleAssign { targets, values, .. } = stmt else {
        panic!("Expected tuple assignment");
    };
    assert_eq!(targets.len(), 2);
    assert!(matches!(values[1], Expr::LitBool { v: true, .. }));
}

#[test]
fn test_parse_tuple_assignment_parenthesized() {
    let stmt = parse_one("x1.a, x2.b = (1, 2.5)");
    let Stmt::TupleAssign { values, .. } = stmt else {
        panic!("Expected tuple assignment");
    };
    assert!(matches!(values[0], Expr::LitInt { v: 1, .. }));
    assert!(matches!(values[1], Expr::LitFloat { v, .. } if v == 2.5));
}

#[test]
fn test_parse_append() {
    let stmt = parse_one("x0.entrees.append(\"fries\")");
    let Stmt::Append { target, value, .. } = stmt else {
        panic!("Expected append, got {:?}", stmt);
    };
    assert!(matches!(target, Expr::Attribute { ref attr, .. } if attr == "entrees"));
    assert!(matches!(value, Expr::LitStr { ref v, .. } if v == "fries"));
}

#[test]
fn test_parse_literals() {
    let stmt = parse_one("[1, -2, 3.5e1, 'a\\'b', false, None]");
    let Stmt::Expr {
        value: Expr::LitList { elements, .. },
        ..
    } = stmt
    else {
        panic!("Expected list literal");
    };

    assert!(matches!(elements[1], Expr::LitInt { v: -2, .. }));
    assert!(matches!(elements[2], Expr::LitFloat { v, .. } if v == 35.0));
    assert!(matches!(elements[3], Expr::LitStr { ref v, .. } if v == "a'b"));
    assert!(matches!(elements[4], Expr::LitBool { v: false, .. }));
    assert!(matches!(elements[5], Expr::LitNone { .. }));
}

#[test]
fn test_parse_multiple_statements_are_kept() {
    let module = parse_turn("x1; x2").unwrap();
    assert_eq!(module.body.len(), 2);
}

#[test]
fn test_parse_empty_turn() {
    let module = parse_turn("   ").unwrap();
    assert!(module.body.is_empty());
}

// ============================================================================
// Rejected Shapes
// ============================================================================

#[test]
fn test_assign_to_name_rejected() {
    let err = parse_err("x1 = 5");
    assert!(err.to_string().contains("unsupported expression"));
    assert!(err.span().is_some());
}

#[test]
fn test_method_call_other_than_append_rejected() {
    let err = parse_err("x1.items.pop()");
    assert!(err.to_string().contains("unsupported expression"));
}

#[test]
fn test_append_on_bare_name_rejected() {
    let err = parse_err("x1.append(3)");
    assert!(err.to_string().contains("unsupported expression"));
}

#[test]
fn test_append_arity() {
    let err = parse_err("x1.items.append(1, 2)");
    assert!(err.to_string().contains("exactly one positional argument"));
}

#[test]
fn test_tuple_assign_count_mismatch() {
    let err = parse_err("x1.a, x1.b = 1, 2, 3");
    assert!(err.to_string().contains("cannot assign 3 values to 2 targets"));
}

#[test]
fn test_positional_after_keyword_rejected() {
    let err = parse_err("create_alarm(time=\"8:30\", \"swim\")");
    assert!(matches!(err, ParseError::BuildError(..)));
}

#[test]
fn test_repeated_keyword_rejected() {
    let err = parse_err("create_alarm(time=\"8:30\", time=\"9:00\")");
    assert!(err.to_string().contains("keyword argument repeated"));
}

#[test]
fn test_grammar_error_has_location() {
    let err = parse_err("x1 +");
    assert!(matches!(err, ParseError::PestError(_, Some(_))));
}

// ============================================================================
// Serialization
// ============================================================================

#[test]
fn test_module_serialization() {
    let module = parse_turn("create_alarm(time=\"8:30\")").unwrap();
    let json = serde_json::to_value(&module).unwrap();
    let back: Module = serde_json::from_value(json).unwrap();
    assert_eq!(back, module);
}
