//! The evaluator: the combinator contract table of spec.md §4.2, driving an
//! [`Expr`] tree against a [`Position`] and the dynamic [`Context`].
//!
//! Grounded on the teacher's `IProduction::parse` dispatch
//! (`src/production/mod.rs`), which recursively walks a production graph
//! threading a mutable parse state through each combinator; this module
//! keeps that recursive-descent shape but over the closed `Expr` enum
//! (see `src/expr.rs`) rather than a trait-object graph, and threads
//! `Context` explicitly rather than through interior mutability.

mod unordered;

use crate::context::Context;
use crate::error::{EngineError, EvalResult, ParseOutcome};
use crate::expr::{CountArg, Expr};
use crate::position::Position;
use crate::registry::Registry;
use crate::trace::TraceSink;
use crate::value::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// Everything an [`eval`] call needs beyond the expression and position
/// itself, bundled so every combinator's recursive call site stays short.
pub struct EvalEnv<'a> {
    pub registry: &'a Registry,
    pub rule: Rc<str>,
    /// Rule name -> whether tracing it also traces its descendant calls
    /// (spec.md §6, `trace(name, {recursive: bool})`).
    pub traced: &'a HashMap<Rc<str>, bool>,
    pub sink: &'a mut dyn TraceSink,
}

/// Evaluates `expr` against `pos`, per the combinator contract table
/// (spec.md §4.2). Never panics on ordinary parse failure — only a fatal
/// grammar/usage condition produces `Err`.
pub fn eval(expr: &Rc<Expr>, pos: &Position, ctx: &mut Context, env: &mut EvalEnv<'_>) -> EvalResult {
    match expr.as_ref() {
        Expr::Literal(v) => eval_literal(v, pos),
        Expr::ItemClass(kind) => match pos.peek() {
            Some(item) if kind.matches(&item) => Ok(ParseOutcome::Success(item, pos.advance(1))),
            _ => Ok(ParseOutcome::Failure),
        },
        Expr::And(children) => eval_and(children, pos, ctx, env),
        Expr::Or(children) => eval_or(children, pos, ctx, env),
        Expr::Star(child) => eval_repeat(child, pos, ctx, env, 0, None),
        Expr::Plus(child) => eval_repeat(child, pos, ctx, env, 1, None),
        Expr::Opt(child) => eval_opt(child, pos, ctx, env),
        Expr::Rep(min, max, child) => {
            let min = resolve_count(min, pos, ctx, env)?;
            let max = match max {
                Some(m) => Some(resolve_count(m, pos, ctx, env)?),
                None => None,
            };
            eval_repeat(child, pos, ctx, env, min, max)
        }
        Expr::AndTilde(children) => unordered::eval_and_tilde(children, pos, ctx, env),
        Expr::AndTildeTilde(counts, children) => {
            let resolved: Result<Vec<(usize, Option<usize>)>, EngineError> = counts
                .iter()
                .map(|(mn, mx)| {
                    let lo = resolve_count(mn, pos, ctx, env)?;
                    let hi = match mx {
                        Some(m) => Some(resolve_count(m, pos, ctx, env)?),
                        None => None,
                    };
                    Ok((lo, hi))
                })
                .collect();
            unordered::eval_and_tilde_tilde(&resolved?, children, pos, ctx, env)
        }
        Expr::AndPred(child) => match eval(child, pos, ctx, env)? {
            ParseOutcome::Success(_, _) => Ok(ParseOutcome::Success(Value::Nil, pos.clone())),
            ParseOutcome::Failure => Ok(ParseOutcome::Failure),
        },
        Expr::NotPred(child) => match eval(child, pos, ctx, env)? {
            ParseOutcome::Success(_, _) => Ok(ParseOutcome::Failure),
            ParseOutcome::Failure => Ok(ParseOutcome::Success(Value::Nil, pos.clone())),
        },
        Expr::Not(child) => {
            if pos.peek().is_none() {
                return Ok(ParseOutcome::Failure);
            }
            match eval(child, pos, ctx, env)? {
                ParseOutcome::Success(_, _) => Ok(ParseOutcome::Failure),
                ParseOutcome::Failure => {
                    let item = pos.peek().expect("checked above");
                    Ok(ParseOutcome::Success(item, pos.advance(1)))
                }
            }
        }
        Expr::Descend(kind, child) => eval_descend(*kind, child, pos, ctx, env),
        Expr::Call(name, args) => crate::dispatch::dispatch(name, args, pos, ctx, env),
        Expr::ParamRef(i) => match ctx.param(*i) {
            Some(closed) => eval(&closed, pos, ctx, env),
            None => eval_literal(&Value::Nil, pos),
        },
        Expr::External(name) => match ctx.lookup(name) {
            Some(v) => Ok(ParseOutcome::Success(v.clone(), pos.clone())),
            None => Err(EngineError::UnboundExternal {
                rule: env.rule.clone(),
                variable: name.clone(),
            }),
        },
        Expr::ExternalSet(name, child) => match eval(child, pos, ctx, env)? {
            ParseOutcome::Success(v, next) => {
                if ctx.write_external(name, v.clone()) {
                    Ok(ParseOutcome::Success(v, next))
                } else {
                    Err(EngineError::UnboundExternal {
                        rule: env.rule.clone(),
                        variable: name.clone(),
                    })
                }
            }
            ParseOutcome::Failure => Ok(ParseOutcome::Failure),
        },
    }
}

fn eval_literal(v: &Value, pos: &Position) -> EvalResult {
    if v.is_sequence() {
        let n = v.seq_len().expect("is_sequence implies seq_len");
        if pos.matches_subsequence(v) {
            Ok(ParseOutcome::Success(v.clone(), pos.advance(n)))
        } else {
            Ok(ParseOutcome::Failure)
        }
    } else {
        match pos.peek() {
            Some(item) if &item == v => Ok(ParseOutcome::Success(item, pos.advance(1))),
            _ => Ok(ParseOutcome::Failure),
        }
    }
}

fn eval_and(children: &[Rc<Expr>], pos: &Position, ctx: &mut Context, env: &mut EvalEnv<'_>) -> EvalResult {
    let mut cur = pos.clone();
    let mut values = Vec::with_capacity(children.len());
    for child in children {
        match eval(child, &cur, ctx, env)? {
            ParseOutcome::Success(v, next) => {
                values.push(v);
                cur = next;
            }
            ParseOutcome::Failure => return Ok(ParseOutcome::Failure),
        }
    }
    Ok(ParseOutcome::Success(Value::list(values), cur))
}

fn eval_or(children: &[Rc<Expr>], pos: &Position, ctx: &mut Context, env: &mut EvalEnv<'_>) -> EvalResult {
    for child in children {
        match eval(child, pos, ctx, env)? {
            success @ ParseOutcome::Success(_, _) => return Ok(success),
            ParseOutcome::Failure => continue,
        }
    }
    Ok(ParseOutcome::Failure)
}

fn eval_opt(child: &Rc<Expr>, pos: &Position, ctx: &mut Context, env: &mut EvalEnv<'_>) -> EvalResult {
    match eval(child, pos, ctx, env)? {
        success @ ParseOutcome::Success(_, _) => Ok(success),
        ParseOutcome::Failure => Ok(ParseOutcome::Success(Value::Nil, pos.clone())),
    }
}

/// The shared engine behind `Star`/`Plus`/`Rep`: greedily repeats `child`,
/// stopping at the first failure or at `max` matches, never backtracking
/// into a partial repetition (spec.md §4.2).
fn eval_repeat(
    child: &Rc<Expr>,
    pos: &Position,
    ctx: &mut Context,
    env: &mut EvalEnv<'_>,
    min: usize,
    max: Option<usize>,
) -> EvalResult {
    let mut cur = pos.clone();
    let mut values = Vec::new();
    loop {
        if let Some(max) = max {
            if values.len() >= max {
                break;
            }
        }
        match eval(child, &cur, ctx, env)? {
            ParseOutcome::Success(v, next) => {
                if next == cur {
                    // No progress: stop instead of looping forever.
                    break;
                }
                values.push(v);
                cur = next;
            }
            ParseOutcome::Failure => break,
        }
    }
    if values.len() < min {
        Ok(ParseOutcome::Failure)
    } else {
        Ok(ParseOutcome::Success(Value::list(values), cur))
    }
}

fn eval_descend(
    kind: crate::value::SequenceKind,
    child: &Rc<Expr>,
    pos: &Position,
    ctx: &mut Context,
    env: &mut EvalEnv<'_>,
) -> EvalResult {
    let item = match pos.peek() {
        Some(item) => item,
        None => return Ok(ParseOutcome::Failure),
    };
    // Neither "not a sequence at all" nor "a sequence of the wrong kind" is
    // fatal: both are an ordinary declined match (spec.md §8 seed scenario
    // 8 — `(list 'a)` against `(a)` and against `(#(a))` are both spelled
    // out as "failure", not a terminated parse).
    if item.sequence_kind() != Some(kind) {
        return Ok(ParseOutcome::Failure);
    }
    let inner_start = pos.descend(item);
    match eval(child, &inner_start, ctx, env)? {
        ParseOutcome::Success(v, inner_end) => {
            if inner_end.top_frame_exhausted() {
                Ok(ParseOutcome::Success(v, inner_end.ascend()))
            } else {
                Ok(ParseOutcome::Failure)
            }
        }
        ParseOutcome::Failure => Ok(ParseOutcome::Failure),
    }
}

/// Evaluates `expr` to a concrete value without touching the input position
/// at all — the mode spec.md §3's "Parameters: name -> Value" and §4.4
/// step 4's "pre-evaluated value" call for, as distinct from [`eval`]'s
/// ordinary matching-against-the-input-position mode. A literal unwraps
/// directly; a `ParamRef`/`External`/`ExternalSet` recurses through the
/// same value mode; anything else (no value-producing form applies) falls
/// back to `Value::Nil`, mirroring `ParamRef`'s own unbound-index fallback.
pub(crate) fn eval_as_value(expr: &Rc<Expr>, ctx: &mut Context, env: &mut EvalEnv<'_>) -> Result<Value, EngineError> {
    match expr.as_ref() {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::ParamRef(i) => match ctx.param(*i) {
            Some(closed) => eval_as_value(&closed, ctx, env),
            None => Ok(Value::Nil),
        },
        Expr::External(name) => ctx.lookup(name).cloned().ok_or_else(|| EngineError::UnboundExternal {
            rule: env.rule.clone(),
            variable: name.clone(),
        }),
        Expr::ExternalSet(name, child) => {
            let v = eval_as_value(child, ctx, env)?;
            if ctx.write_external(name, v.clone()) {
                Ok(v)
            } else {
                Err(EngineError::UnboundExternal {
                    rule: env.rule.clone(),
                    variable: name.clone(),
                })
            }
        }
        _ => Ok(Value::Nil),
    }
}

/// Resolves a repetition/unordered-combinator bound: a literal count is used
/// directly, a parameter-supplied one is evaluated in value mode (the
/// position is never touched) and must be a non-negative integer (spec.md
/// §4.4 step 4, §7).
pub(crate) fn resolve_count(
    count: &CountArg,
    pos: &Position,
    ctx: &mut Context,
    env: &mut EvalEnv<'_>,
) -> Result<usize, EngineError> {
    match count {
        CountArg::Literal(n) => Ok(*n),
        CountArg::Param(i) => {
            let expr = ctx.param(*i).ok_or_else(|| EngineError::InvalidRepArgument {
                rule: env.rule.clone(),
            })?;
            match eval_as_value(&expr, ctx, env)? {
                Value::Number(n) => n.as_non_negative_usize().ok_or_else(|| EngineError::InvalidRepArgument {
                    rule: env.rule.clone(),
                }),
                _ => Err(EngineError::InvalidRepArgument { rule: env.rule.clone() }),
            }
        }
        // An external cell may hold a Number (the ordinary case) or a Byte
        // (spec.md §8 seed scenario 4: a byte item written by `length` and
        // read back as `chars`'s repetition count) — both are non-negative
        // integers by construction.
        CountArg::External(name) => match ctx.lookup(name) {
            Some(Value::Number(n)) => {
                n.as_non_negative_usize().ok_or_else(|| EngineError::InvalidRepArgument {
                    rule: env.rule.clone(),
                })
            }
            Some(Value::Byte(b)) => Ok(*b as usize),
            Some(_) => Err(EngineError::InvalidRepArgument { rule: env.rule.clone() }),
            None => Err(EngineError::UnboundExternal {
                rule: env.rule.clone(),
                variable: name.clone(),
            }),
        },
    }
}
