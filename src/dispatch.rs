//! Rule dispatch (spec.md §4.4): resolves a `Call` against the registry,
//! closes its arguments over the caller's own parameters, guards against
//! left recursion, binds named parameters to their evaluated values for
//! `external` reads, introduces the rule's own `let`-declared cells into the
//! same frame, evaluates the rule body, and runs the result through the
//! rule's processor pipeline.
//!
//! Grounded on the teacher's `Union`/`Concat` dispatch inside
//! `IProduction::parse` (`src/production/mod.rs`), generalized with the
//! left-recursion guard and parameter/processor machinery spec.md requires
//! that the teacher's static grammar graph never needed.

use crate::context::Context;
use crate::error::{EngineError, EvalResult, ParseOutcome};
use crate::eval::{eval, eval_as_value, EvalEnv};
use crate::expr::{close_over, Expr};
use crate::position::Position;
use crate::processor::run_pipeline;
use crate::trace::TraceEvent;
use std::rc::Rc;

pub fn dispatch(
    name: &str,
    args: &[Rc<Expr>],
    pos: &Position,
    ctx: &mut Context,
    env: &mut EvalEnv<'_>,
) -> EvalResult {
    let rule = env.registry.get(name)?;
    let rule_name: Rc<str> = Rc::from(name);

    let closed_args: Vec<Rc<Expr>> =
        args.iter().map(|a| close_over(a, ctx.current_args())).collect();

    if rule.params.len() != closed_args.len() {
        return Err(EngineError::ArityMismatch {
            what: format!("call to rule '{}'", name),
            expected: format!("{} argument(s)", rule.params.len()),
            got: closed_args.len(),
        });
    }

    if !ctx.mark_in_progress(rule_name.clone(), pos.clone()) {
        return Err(EngineError::LeftRecursion {
            rule: rule_name,
            position: pos.summary(),
        });
    }

    let mut callee_env = EvalEnv {
        registry: env.registry,
        rule: rule_name.clone(),
        traced: env.traced,
        sink: &mut *env.sink,
    };

    ctx.push_binding_frame();
    for (param_name, arg_expr) in rule.params.iter().zip(closed_args.iter()) {
        match eval_as_value(arg_expr, ctx, &mut callee_env) {
            Ok(v) => ctx.bind(param_name.clone(), v),
            Err(e) => {
                ctx.pop_binding_frame();
                ctx.clear_in_progress(&rule_name, pos);
                return Err(e);
            }
        }
    }

    for (name, initial) in &rule.lets {
        ctx.bind(name.clone(), initial.clone());
    }

    ctx.push_params(closed_args);
    ctx.enter_call();

    let own_trace_recursive = env.traced.get(&rule_name).copied();
    let inherited_trace = ctx.in_recursive_trace_scope();
    let traced = own_trace_recursive.is_some() || inherited_trace;
    let opened_recursive_scope = own_trace_recursive == Some(true);
    if opened_recursive_scope {
        ctx.enter_recursive_trace_scope();
    }
    if traced {
        callee_env.sink.emit(TraceEvent::Enter {
            rule: &rule_name,
            position: pos.summary(),
            depth: ctx.call_depth(),
        });
    }

    let body_result = eval(&rule.body, pos, ctx, &mut callee_env);

    if opened_recursive_scope {
        ctx.exit_recursive_trace_scope();
    }
    ctx.exit_call();
    ctx.pop_params();
    ctx.pop_binding_frame();
    ctx.clear_in_progress(&rule_name, pos);

    let outcome = body_result?;

    let outcome = match outcome {
        ParseOutcome::Success(value, end_pos) => match run_pipeline(&rule.processors, value, &rule_name)? {
            Some(processed) => ParseOutcome::Success(processed, end_pos),
            None => ParseOutcome::Failure,
        },
        ParseOutcome::Failure => ParseOutcome::Failure,
    };

    if traced {
        callee_env.sink.emit(TraceEvent::Exit {
            rule: &rule_name,
            position: pos.summary(),
            depth: ctx.call_depth(),
            succeeded: outcome.is_success(),
        });
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Registry, Rule};
    use crate::trace::RecordingSink;
    use crate::value::{ItemClassKind, Value};
    use std::collections::HashMap;

    fn test_env<'a>(
        registry: &'a Registry,
        traced: &'a HashMap<Rc<str>, bool>,
        sink: &'a mut RecordingSink,
    ) -> EvalEnv<'a> {
        EvalEnv {
            registry,
            rule: Rc::from("top"),
            traced,
            sink,
        }
    }

    #[test]
    fn undefined_rule_is_fatal() {
        let registry = Registry::new();
        let traced = HashMap::new();
        let mut sink = RecordingSink::default();
        let mut ctx = Context::new();
        let pos = Position::start(Value::empty_list());
        let result = dispatch("missing", &[], &pos, &mut ctx, &mut test_env(&registry, &traced, &mut sink));
        assert!(matches!(result, Err(EngineError::UndefinedRule { .. })));
    }

    #[test]
    fn direct_left_recursion_is_detected() {
        let mut registry = Registry::new();
        registry.define(
            Rc::from("r"),
            Rule::new(
                Vec::new(),
                Rc::new(Expr::Call(Rc::from("r"), Vec::new())),
                Vec::new(),
            ),
        );
        let traced = HashMap::new();
        let mut sink = RecordingSink::default();
        let mut ctx = Context::new();
        let pos = Position::start(Value::empty_list());
        let result = dispatch("r", &[], &pos, &mut ctx, &mut test_env(&registry, &traced, &mut sink));
        assert!(matches!(result, Err(EngineError::LeftRecursion { .. })));
    }

    #[test]
    fn successful_dispatch_runs_processor_pipeline() {
        let mut registry = Registry::new();
        registry.define(
            Rc::from("byte"),
            Rule::new(
                Vec::new(),
                Rc::new(Expr::ItemClass(ItemClassKind::AnyByte)),
                vec![crate::processor::Processor::Constant(Value::Symbol(
                    crate::value::Symbol::new("matched"),
                ))],
            ),
        );
        let traced = HashMap::new();
        let mut sink = RecordingSink::default();
        let mut ctx = Context::new();
        let pos = Position::start(Value::list(vec![Value::Byte(1)]));
        let outcome = dispatch("byte", &[], &pos, &mut ctx, &mut test_env(&registry, &traced, &mut sink))
            .unwrap();
        match outcome {
            ParseOutcome::Success(Value::Symbol(s), _) => assert_eq!(s.name.as_ref(), "matched"),
            _ => panic!("expected processed success"),
        }
    }

    #[test]
    fn arity_mismatch_on_call_is_fatal() {
        let mut registry = Registry::new();
        registry.define(
            Rc::from("r"),
            Rule::new(vec![Rc::from("x")], Expr::literal(Value::Nil), Vec::new()),
        );
        let traced = HashMap::new();
        let mut sink = RecordingSink::default();
        let mut ctx = Context::new();
        let pos = Position::start(Value::empty_list());
        let result = dispatch("r", &[], &pos, &mut ctx, &mut test_env(&registry, &traced, &mut sink));
        assert!(matches!(result, Err(EngineError::ArityMismatch { .. })));
    }

    #[test]
    fn let_declared_cell_is_visible_and_writable_from_a_nested_call() {
        // string = (and length chars); length writes `len`, chars reads it
        // as a repetition count (spec.md §8 seed scenario 4).
        let mut registry = Registry::new();
        registry.define(
            Rc::from("length"),
            Rule::new(
                Vec::new(),
                Rc::new(Expr::ExternalSet(
                    Rc::from("len"),
                    Rc::new(Expr::ItemClass(ItemClassKind::AnyByte)),
                )),
                Vec::new(),
            ),
        );
        registry.define(
            Rc::from("chars"),
            Rule::new(
                Vec::new(),
                Rc::new(Expr::Rep(
                    crate::expr::CountArg::External(Rc::from("len")),
                    Some(crate::expr::CountArg::External(Rc::from("len"))),
                    Rc::new(Expr::ItemClass(ItemClassKind::AnyByte)),
                )),
                Vec::new(),
            ),
        );
        registry.define(
            Rc::from("string"),
            Rule::with_lets(
                Vec::new(),
                Rc::new(Expr::And(vec![
                    Rc::new(Expr::Call(Rc::from("length"), Vec::new())),
                    Rc::new(Expr::Call(Rc::from("chars"), Vec::new())),
                ])),
                Vec::new(),
                vec![(Rc::from("len"), Value::Nil)],
            ),
        );
        let traced = HashMap::new();
        let mut sink = RecordingSink::default();
        let mut ctx = Context::new();
        let pos = Position::start(Value::list(vec![
            Value::Byte(3),
            Value::Byte(b'x'),
            Value::Byte(b'y'),
            Value::Byte(b'z'),
        ]));
        let outcome = dispatch("string", &[], &pos, &mut ctx, &mut test_env(&registry, &traced, &mut sink))
            .unwrap();
        match outcome {
            ParseOutcome::Success(_, end) => assert!(end.at_end()),
            ParseOutcome::Failure => panic!("expected success"),
        }

        let short = Position::start(Value::list(vec![Value::Byte(3), Value::Byte(b'x'), Value::Byte(b'y')]));
        let mut ctx = Context::new();
        let outcome = dispatch("string", &[], &short, &mut ctx, &mut test_env(&registry, &traced, &mut sink))
            .unwrap();
        assert!(!outcome.is_success());
    }
}
