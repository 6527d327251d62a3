//! The unordered combinators (spec.md §4.3): `And~` requires every branch to
//! match exactly once, in any order; `And~~` requires every branch to match
//! within its own `(min, max)` count, in any order. Both use an incremental
//! scan-and-shrink algorithm rather than trying branch permutations, so the
//! cost is quadratic in the branch count rather than factorial.
//!
//! Grounded on the teacher's `Union`/`Suffixes` combinators
//! (`src/production/mod.rs`), which already scan a set of alternatives at a
//! fixed position; this module generalizes that single-pick scan into a
//! repeated-pass scan that consumes branches (or increments their count) as
//! they succeed, restarting over what's left until a full pass makes no
//! progress.

use super::{eval, EvalEnv};
use crate::context::Context;
use crate::error::{EvalResult, ParseOutcome};
use crate::expr::Expr;
use crate::position::Position;
use crate::value::Value;
use std::rc::Rc;

/// `And~`: every branch must match exactly once; order is free.
pub fn eval_and_tilde(
    children: &[Rc<Expr>],
    pos: &Position,
    ctx: &mut Context,
    env: &mut EvalEnv<'_>,
) -> EvalResult {
    let mut remaining: Vec<usize> = (0..children.len()).collect();
    let mut results: Vec<Option<Value>> = vec![None; children.len()];
    let mut cur = pos.clone();

    loop {
        let mut progressed = false;
        let mut i = 0;
        while i < remaining.len() {
            let idx = remaining[i];
            match eval(&children[idx], &cur, ctx, env)? {
                ParseOutcome::Success(v, next) => {
                    results[idx] = Some(v);
                    cur = next;
                    remaining.remove(i);
                    progressed = true;
                    i = 0; // restart the scan over the shrunk remaining set
                }
                ParseOutcome::Failure => i += 1,
            }
        }
        if remaining.is_empty() || !progressed {
            break;
        }
    }

    if remaining.is_empty() {
        let values = results.into_iter().map(|v| v.expect("every index filled")).collect();
        Ok(ParseOutcome::Success(Value::list(values), cur))
    } else {
        Ok(ParseOutcome::Failure)
    }
}

/// `And~~`: each branch `i` must match between `counts[i].0` and
/// `counts[i].1` (unbounded if `None`) times; order is free. Per spec.md
/// §4.3, each step re-derives the candidate group from scratch: while any
/// branch's minimum is still unmet, *only* those branches are tried (in
/// declaration order); only once every minimum is satisfied does a branch
/// still below its maximum become eligible. The first candidate that
/// matches is committed and the step repeats; the repetition stops once no
/// candidate in the current group matches.
pub fn eval_and_tilde_tilde(
    counts: &[(usize, Option<usize>)],
    children: &[Rc<Expr>],
    pos: &Position,
    ctx: &mut Context,
    env: &mut EvalEnv<'_>,
) -> EvalResult {
    let n = children.len();
    let mut matched = vec![0usize; n];
    let mut collected: Vec<Vec<Value>> = vec![Vec::new(); n];
    let mut cur = pos.clone();

    loop {
        let unmet: Vec<usize> = (0..n).filter(|&i| matched[i] < counts[i].0).collect();
        let candidates = if !unmet.is_empty() {
            unmet
        } else {
            (0..n)
                .filter(|&i| counts[i].1.map_or(true, |max| matched[i] < max))
                .collect()
        };

        let mut committed = false;
        for idx in candidates {
            match eval(&children[idx], &cur, ctx, env)? {
                ParseOutcome::Success(v, next) => {
                    if next == cur {
                        // No progress: treat as a non-match so a nullable
                        // branch can't loop this step forever.
                        continue;
                    }
                    collected[idx].push(v);
                    matched[idx] += 1;
                    cur = next;
                    committed = true;
                    break;
                }
                ParseOutcome::Failure => continue,
            }
        }
        if !committed {
            break;
        }
    }

    let satisfied = (0..n).all(|i| matched[i] >= counts[i].0);
    if satisfied {
        // spec.md §4.3: "a list of n lists, each collecting that child's
        // matches in input order."
        let values = collected.into_iter().map(Value::list).collect();
        Ok(ParseOutcome::Success(Value::list(values), cur))
    } else {
        Ok(ParseOutcome::Failure)
    }
}
