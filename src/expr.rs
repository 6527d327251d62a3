//! The compiled expression tree a rule body evaluates (spec.md §3, §4.2).
//!
//! Grounded on the teacher's tagged family of `IProduction` implementors
//! (`Concat`, `Union`, `Suffixes`, `List`, `Nullable`, ... in
//! `src/production/mod.rs`), collapsed into one closed enum rather than one
//! struct-plus-trait-object per combinator kind. The teacher's own design
//! notes for *this* engine's domain (spec.md §9, "Cyclic references between
//! rules") call for resolving `Call` by name through the registry at
//! dispatch time rather than by direct pointer, which is naturally expressed
//! by a plain data tree rather than an `Rc<dyn Trait>` graph.

use crate::value::{ItemClassKind, SequenceKind, Value};
use std::rc::Rc;

/// A repetition bound that is either fixed at compile time or supplied as
/// one of the current rule's arguments, resolved dynamically against the
/// argument's *value* rather than reparsed as an expression (spec.md §4.4
/// step 4: "When the parameter is used in a position demanding a value...").
#[derive(Debug, Clone)]
pub enum CountArg {
    Literal(usize),
    Param(usize),
    /// Resolved by reading an ancestor's `let`-declared cell by name at
    /// evaluation time (spec.md §8 seed scenario 4: `chars` reads `len`).
    External(Rc<str>),
}

/// The compiled form of a rule body (spec.md §3 "Expression tree").
#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    ItemClass(ItemClassKind),
    And(Vec<Rc<Expr>>),
    Or(Vec<Rc<Expr>>),
    Star(Rc<Expr>),
    Plus(Rc<Expr>),
    Opt(Rc<Expr>),
    Rep(CountArg, Option<CountArg>, Rc<Expr>),
    AndTilde(Vec<Rc<Expr>>),
    AndTildeTilde(Vec<(CountArg, Option<CountArg>)>, Vec<Rc<Expr>>),
    AndPred(Rc<Expr>),
    NotPred(Rc<Expr>),
    /// Consuming negation: succeeds when `child` fails and an item remains.
    Not(Rc<Expr>),
    Descend(SequenceKind, Rc<Expr>),
    Call(Rc<str>, Vec<Rc<Expr>>),
    ParamRef(usize),
    /// Reads the nearest ancestor's `let`-declared cell named by this
    /// identifier (spec.md §4.6, §9 "dynamically scoped variables"). Always
    /// succeeds, consuming nothing; fatal `UnboundExternal` if no ancestor
    /// declared it.
    External(Rc<str>),
    /// Evaluates `child` normally, and on success writes its result value
    /// into the nearest ancestor's cell named by this identifier before
    /// returning that same result (spec.md §4.6, §8 seed scenario 4). Fatal
    /// `UnboundExternal` if no ancestor declared the name.
    ExternalSet(Rc<str>, Rc<Expr>),
}

impl Expr {
    pub fn literal(v: Value) -> Rc<Expr> {
        Rc::new(Expr::Literal(v))
    }
}

/// Rewrites every `ParamRef(i)` inside `expr` with `caller_args[i]`, so an
/// argument expression handed to a `Call` is always closed (self-contained)
/// by the time it is stored as the callee's parameter — see DESIGN.md, Open
/// Question 3. `caller_args` must already be closed (an invariant maintained
/// inductively: the root call is made with no arguments, so it vacuously
/// holds, and every substitution below preserves it).
pub fn close_over(expr: &Rc<Expr>, caller_args: &[Rc<Expr>]) -> Rc<Expr> {
    match expr.as_ref() {
        Expr::ParamRef(i) => caller_args
            .get(*i)
            .cloned()
            .unwrap_or_else(|| Expr::literal(Value::Nil)),
        Expr::Literal(_) | Expr::ItemClass(_) => expr.clone(),
        Expr::And(children) => Rc::new(Expr::And(close_over_all(children, caller_args))),
        Expr::Or(children) => Rc::new(Expr::Or(close_over_all(children, caller_args))),
        Expr::Star(c) => Rc::new(Expr::Star(close_over(c, caller_args))),
        Expr::Plus(c) => Rc::new(Expr::Plus(close_over(c, caller_args))),
        Expr::Opt(c) => Rc::new(Expr::Opt(close_over(c, caller_args))),
        Expr::Rep(min, max, c) => Rc::new(Expr::Rep(
            close_over_count(min, caller_args),
            max.as_ref().map(|m| close_over_count(m, caller_args)),
            close_over(c, caller_args),
        )),
        Expr::AndTilde(children) => Rc::new(Expr::AndTilde(close_over_all(children, caller_args))),
        Expr::AndTildeTilde(counts, children) => Rc::new(Expr::AndTildeTilde(
            counts
                .iter()
                .map(|(mn, mx)| {
                    (
                        close_over_count(mn, caller_args),
                        mx.as_ref().map(|m| close_over_count(m, caller_args)),
                    )
                })
                .collect(),
            close_over_all(children, caller_args),
        )),
        Expr::AndPred(c) => Rc::new(Expr::AndPred(close_over(c, caller_args))),
        Expr::NotPred(c) => Rc::new(Expr::NotPred(close_over(c, caller_args))),
        Expr::Not(c) => Rc::new(Expr::Not(close_over(c, caller_args))),
        Expr::Descend(kind, c) => Rc::new(Expr::Descend(*kind, close_over(c, caller_args))),
        Expr::Call(name, args) => {
            Rc::new(Expr::Call(name.clone(), close_over_all(args, caller_args)))
        }
        Expr::External(name) => Rc::new(Expr::External(name.clone())),
        Expr::ExternalSet(name, c) => {
            Rc::new(Expr::ExternalSet(name.clone(), close_over(c, caller_args)))
        }
    }
}

fn close_over_all(children: &[Rc<Expr>], caller_args: &[Rc<Expr>]) -> Vec<Rc<Expr>> {
    children.iter().map(|c| close_over(c, caller_args)).collect()
}

/// `CountArg::Param` indices are positional references into the *current*
/// rule's own (already-closed) arguments, so closing them over the caller's
/// arguments is a plain substitution exactly like `ParamRef`.
fn close_over_count(count: &CountArg, caller_args: &[Rc<Expr>]) -> CountArg {
    match count {
        CountArg::Literal(n) => CountArg::Literal(*n),
        CountArg::Param(i) => match caller_args.get(*i).map(|e| e.as_ref()) {
            Some(Expr::Literal(Value::Number(n))) => {
                CountArg::Literal(n.as_non_negative_usize().unwrap_or(0))
            }
            _ => CountArg::Param(*i),
        },
        // An `external` read is resolved dynamically against the Context at
        // evaluation time, not against the caller's closed arguments.
        CountArg::External(name) => CountArg::External(name.clone()),
    }
}
