//! End-to-end scenarios exercising the engine through its public surface
//! only: defining rules, parsing heterogeneous input, scoped rule overlays,
//! left-recursion detection, and tracing.

use hetero_peg::{Engine, Expr, ItemClassKind, Number, Parsed, Processor, RecordingSink, SequenceKind, Symbol, Value};
use std::rc::Rc;

fn list_of_bytes(bytes: &[u8]) -> Value {
    Value::list(bytes.iter().map(|b| Value::Byte(*b)).collect())
}

#[test]
fn literal_and_item_class_combine_through_and() {
    let mut engine = Engine::new();
    // rule: byte(0) followed by any byte
    engine.define_rule(
        "pair",
        Vec::new(),
        Rc::new(Expr::And(vec![
            Expr::literal(Value::Byte(0)),
            Rc::new(Expr::ItemClass(ItemClassKind::AnyByte)),
        ])),
        Vec::new(),
    );
    let mut sink = RecordingSink::default();
    let result = engine.parse("pair", list_of_bytes(&[0, 7]), &mut sink).unwrap();
    assert_eq!(
        result,
        Parsed::Matched(Value::list(vec![Value::Byte(0), Value::Byte(7)]))
    );
}

#[test]
fn or_tries_alternatives_in_order() {
    let mut engine = Engine::new();
    engine.define_rule(
        "zero_or_one",
        Vec::new(),
        Rc::new(Expr::Or(vec![
            Expr::literal(Value::Byte(0)),
            Expr::literal(Value::Byte(1)),
        ])),
        Vec::new(),
    );
    let mut sink = RecordingSink::default();
    assert_eq!(
        engine.parse("zero_or_one", list_of_bytes(&[1]), &mut sink).unwrap(),
        Parsed::Matched(Value::Byte(1))
    );
}

#[test]
fn rep_enforces_bounds() {
    let mut engine = Engine::new();
    engine.define_rule(
        "two_or_three",
        Vec::new(),
        Rc::new(Expr::Rep(
            hetero_peg::CountArg::Literal(2),
            Some(hetero_peg::CountArg::Literal(3)),
            Rc::new(Expr::ItemClass(ItemClassKind::AnyByte)),
        )),
        Vec::new(),
    );
    let mut sink = RecordingSink::default();
    assert!(matches!(
        engine.parse("two_or_three", list_of_bytes(&[1]), &mut sink).unwrap(),
        Parsed::Unmatched
    ));
    assert!(matches!(
        engine.parse("two_or_three", list_of_bytes(&[1, 2, 3]), &mut sink).unwrap(),
        Parsed::Matched(_)
    ));
}

#[test]
fn descend_parses_into_a_nested_list() {
    let mut engine = Engine::new();
    engine.define_rule(
        "nested_pair",
        Vec::new(),
        Rc::new(Expr::Descend(
            SequenceKind::List,
            Rc::new(Expr::And(vec![
                Expr::literal(Value::Byte(1)),
                Expr::literal(Value::Byte(2)),
            ])),
        )),
        Vec::new(),
    );
    let input = Value::list(vec![list_of_bytes(&[1, 2])]);
    let mut sink = RecordingSink::default();
    let result = engine.parse("nested_pair", input, &mut sink).unwrap();
    assert!(matches!(result, Parsed::Matched(_)));
}

#[test]
fn call_with_processor_pipeline_transforms_the_result() {
    let mut engine = Engine::new();
    engine.define_rule(
        "tagged_byte",
        Vec::new(),
        Rc::new(Expr::ItemClass(ItemClassKind::AnyByte)),
        vec![Processor::Function(Rc::new(|args: &[Value]| match args {
            [Value::Byte(b)] => Value::list(vec![Value::Symbol(Symbol::new("byte")), Value::Number(Number::Integer(*b as i64))]),
            _ => panic!("unexpected"),
        }))],
    );
    let mut sink = RecordingSink::default();
    let result = engine.parse("tagged_byte", list_of_bytes(&[5]), &mut sink).unwrap();
    match result {
        Parsed::Matched(Value::List(items)) => {
            assert_eq!(items[1], Value::Number(Number::Integer(5)));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn let_and_external_thread_a_byte_count_across_sibling_calls() {
    let mut engine = Engine::new();
    engine.define_rule(
        "length",
        Vec::new(),
        Rc::new(Expr::ExternalSet(
            Rc::from("len"),
            Rc::new(Expr::ItemClass(ItemClassKind::AnyByte)),
        )),
        Vec::new(),
    );
    engine.define_rule(
        "chars",
        Vec::new(),
        Rc::new(Expr::Rep(
            hetero_peg::CountArg::External(Rc::from("len")),
            Some(hetero_peg::CountArg::External(Rc::from("len"))),
            Rc::new(Expr::ItemClass(ItemClassKind::AnyByte)),
        )),
        Vec::new(),
    );
    engine.define_rule_with_lets(
        "string",
        Vec::new(),
        Rc::new(Expr::And(vec![
            Rc::new(Expr::Call(Rc::from("length"), Vec::new())),
            Rc::new(Expr::Call(Rc::from("chars"), Vec::new())),
        ])),
        Vec::new(),
        vec![(Rc::from("len"), Value::Nil)],
    );
    let mut sink = RecordingSink::default();
    assert!(matches!(
        engine.parse("string", list_of_bytes(&[3, b'x', b'y', b'z']), &mut sink).unwrap(),
        Parsed::Matched(_)
    ));
    assert!(matches!(
        engine.parse("string", list_of_bytes(&[3, b'x', b'y']), &mut sink).unwrap(),
        Parsed::Unmatched
    ));
}

#[test]
fn direct_left_recursion_raises_a_fatal_error() {
    let mut engine = Engine::new();
    engine.define_rule("loop", Vec::new(), Rc::new(Expr::Call(Rc::from("loop"), Vec::new())), Vec::new());
    let mut sink = RecordingSink::default();
    let result = engine.parse("loop", Value::empty_list(), &mut sink);
    assert!(result.is_err());
}

#[test]
fn isolated_rules_scope_definitions_to_the_closure() {
    let mut engine = Engine::new();
    engine.define_rule(
        "digit",
        Vec::new(),
        Rc::new(Expr::ItemClass(ItemClassKind::AnyByte)),
        Vec::new(),
    );
    engine.with_isolated_rules(|scoped| {
        scoped.define_rule("temp", Vec::new(), Expr::literal(Value::Nil), Vec::new());
        let mut sink = RecordingSink::default();
        // "digit" is not visible inside an isolated scope.
        assert!(scoped.parse("digit", list_of_bytes(&[1]), &mut sink).is_err());
    });
    let mut sink = RecordingSink::default();
    assert!(engine.parse("digit", list_of_bytes(&[1]), &mut sink).is_ok());
    assert!(!engine.undefine_rule("temp"));
}

#[test]
fn inherited_rules_see_outer_definitions_without_leaking_back() {
    let mut engine = Engine::new();
    engine.define_rule(
        "digit",
        Vec::new(),
        Rc::new(Expr::ItemClass(ItemClassKind::AnyByte)),
        Vec::new(),
    );
    engine.with_inherited_rules(|scoped| {
        let mut sink = RecordingSink::default();
        assert!(scoped.parse("digit", list_of_bytes(&[1]), &mut sink).unwrap() == Parsed::Matched(Value::Byte(1)));
        scoped.define_rule("temp", Vec::new(), Expr::literal(Value::Nil), Vec::new());
    });
    assert!(!engine.undefine_rule("temp"));
}

#[test]
fn right_recursive_rule_nests_successive_matches() {
    // R = or(and('a, R), 'a): each extra 'a' in the input wraps one more
    // nesting level around the tail match (spec.md §8 seed scenario 6).
    let mut engine = Engine::new();
    let a = || Expr::literal(Value::Symbol(Symbol::new("a")));
    engine.define_rule(
        "R",
        Vec::new(),
        Rc::new(Expr::Or(vec![
            Rc::new(Expr::And(vec![a(), Rc::new(Expr::Call(Rc::from("R"), Vec::new()))])),
            a(),
        ])),
        Vec::new(),
    );
    let mut sink = RecordingSink::default();
    let sym = |s: &str| Value::Symbol(Symbol::new(s));

    let input3 = Value::list(vec![sym("a"), sym("a"), sym("a")]);
    let expected3 = Value::list(vec![sym("a"), Value::list(vec![sym("a"), sym("a")])]);
    assert_eq!(engine.parse("R", input3, &mut sink).unwrap(), Parsed::Matched(expected3));

    let input4 = Value::list(vec![sym("a"), sym("a"), sym("a"), sym("a")]);
    let expected4 = Value::list(vec![
        sym("a"),
        Value::list(vec![sym("a"), Value::list(vec![sym("a"), sym("a")])]),
    ]);
    assert_eq!(engine.parse("R", input4, &mut sink).unwrap(), Parsed::Matched(expected4));
}

#[test]
fn descend_kind_mismatch_is_an_ordinary_failure_not_a_fatal_error() {
    // R = (list 'a): a peeked item that isn't a List at all, or is a
    // sequence of the wrong kind, declines the match rather than aborting
    // the parse (spec.md §8 seed scenario 8).
    let mut engine = Engine::new();
    engine.define_rule(
        "R",
        Vec::new(),
        Rc::new(Expr::Descend(
            SequenceKind::List,
            Expr::literal(Value::Symbol(Symbol::new("a"))),
        )),
        Vec::new(),
    );
    let sym = |s: &str| Value::Symbol(Symbol::new(s));
    let mut sink = RecordingSink::default();

    let nested = Value::list(vec![Value::list(vec![sym("a")])]);
    assert_eq!(
        engine.parse("R", nested, &mut sink).unwrap(),
        Parsed::Matched(sym("a"))
    );

    let flat = Value::list(vec![sym("a")]);
    assert!(matches!(engine.parse("R", flat, &mut sink).unwrap(), Parsed::Unmatched));

    let wrong_kind = Value::list(vec![Value::vector(vec![sym("a")])]);
    assert!(matches!(
        engine.parse("R", wrong_kind, &mut sink).unwrap(),
        Parsed::Unmatched
    ));
}

#[test]
fn tracing_records_a_line_per_call_site_only_while_enabled() {
    let mut engine = Engine::new();
    engine.define_rule(
        "digit",
        Vec::new(),
        Rc::new(Expr::ItemClass(ItemClassKind::AnyByte)),
        Vec::new(),
    );
    engine.trace("digit");
    let mut sink = RecordingSink::default();
    engine.parse("digit", list_of_bytes(&[1]), &mut sink).unwrap();
    assert_eq!(sink.lines.len(), 2);
    engine.untrace("digit");
    sink.lines.clear();
    engine.parse("digit", list_of_bytes(&[1]), &mut sink).unwrap();
    assert!(sink.lines.is_empty());
}
