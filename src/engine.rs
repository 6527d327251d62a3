//! The top-level driver (spec.md §6): the one type a host embedding talks
//! to — define/undefine rules, parse input against a named rule, run a
//! closure against an isolated or inherited rule overlay, and toggle
//! per-rule tracing.
//!
//! Grounded on the teacher's `DefaultParser` (`src/parsing.rs`): a small
//! façade owning the grammar and exposing `parse`/`tokenize_n_parse` as the
//! only entry points a caller needs, with debug-only production
//! introspection folded in behind `cfg(debug_assertions)`. This module
//! generalizes that façade with runtime rule mutation and scoped overlays,
//! and replaces the `cfg(debug_assertions)` gate with the always-available
//! `trace`/`untrace` pair spec.md §6 calls for.

use crate::context::Context;
use crate::error::{EngineError, ParseOutcome};
use crate::eval::{eval, EvalEnv};
use crate::expr::Expr;
use crate::position::Position;
use crate::processor::Processor;
use crate::registry::{Registry, Rule};
use crate::trace::{StdoutSink, TraceSink};
use crate::value::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// The result of a top-level [`Engine::parse`] call: either the whole input
/// matched the named rule (and was fully consumed), or it didn't. Any fatal
/// grammar/usage condition is reported separately as `Err(EngineError)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    Matched(Value),
    Unmatched,
}

/// Owns the rule registry and trace state for one grammar.
#[derive(Default)]
pub struct Engine {
    registry: Registry,
    /// Rule name -> whether tracing it also traces its descendant calls
    /// (spec.md §6, `trace(name, {recursive: bool})`).
    traced: HashMap<Rc<str>, bool>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a rule (spec.md §6, `define-rule`).
    pub fn define_rule(
        &mut self,
        name: impl Into<Rc<str>>,
        params: Vec<Rc<str>>,
        body: Rc<Expr>,
        processors: Vec<Processor>,
    ) {
        self.registry.define(name.into(), Rule::new(params, body, processors));
    }

    /// Adds or replaces a rule that also declares `let` cells (spec.md §4.6):
    /// each is bound fresh, in order, into the rule's own dispatch frame,
    /// visible to any descendant call that reads it `external`.
    pub fn define_rule_with_lets(
        &mut self,
        name: impl Into<Rc<str>>,
        params: Vec<Rc<str>>,
        body: Rc<Expr>,
        processors: Vec<Processor>,
        lets: Vec<(Rc<str>, Value)>,
    ) {
        self.registry
            .define(name.into(), Rule::with_lets(params, body, processors, lets));
    }

    /// Removes a rule, if present. Returns whether one was removed
    /// (spec.md §6, `undefine-rule`).
    pub fn undefine_rule(&mut self, name: &str) -> bool {
        self.registry.undefine(name)
    }

    /// Parses `input` against `rule`, reporting trace events to `sink`
    /// (spec.md §6, §4.8, `parse` with `junk-allowed: false`). A `Failure`
    /// outcome, or a successful-but-partial match, both report as
    /// [`Parsed::Unmatched`] — only a fatal grammar/usage condition becomes
    /// `Err`.
    pub fn parse(
        &mut self,
        rule: &str,
        input: Value,
        sink: &mut dyn TraceSink,
    ) -> Result<Parsed, EngineError> {
        self.parse_with_junk(rule, input, false, sink)
    }

    /// The full form of the top-level driver (spec.md §4.8): on success, if
    /// `junk_allowed` is true or the final position is at end, the parse
    /// matches regardless of how much of the input the rule actually
    /// consumed; otherwise leftover input after a syntactically successful
    /// parse still reports [`Parsed::Unmatched`].
    pub fn parse_with_junk(
        &mut self,
        rule: &str,
        input: Value,
        junk_allowed: bool,
        sink: &mut dyn TraceSink,
    ) -> Result<Parsed, EngineError> {
        let pos = Position::start(input);
        let mut ctx = Context::new();
        let mut env = EvalEnv {
            registry: &self.registry,
            rule: Rc::from(rule),
            traced: &self.traced,
            sink,
        };
        match crate::dispatch::dispatch(rule, &[], &pos, &mut ctx, &mut env)? {
            ParseOutcome::Success(value, end) if junk_allowed || end.at_end() => {
                Ok(Parsed::Matched(value))
            }
            ParseOutcome::Success(_, _) | ParseOutcome::Failure => Ok(Parsed::Unmatched),
        }
    }

    /// Parses against the default [`StdoutSink`], for callers that don't
    /// care about trace output.
    pub fn parse_quiet(&mut self, rule: &str, input: Value) -> Result<Parsed, EngineError> {
        let mut sink = StdoutSink;
        self.parse(rule, input, &mut sink)
    }

    /// Also usable standalone, outside of a full [`eval`] driver, when a
    /// caller wants one expression evaluated directly (used by tests and by
    /// `with_isolated_rules`/`with_inherited_rules` closures that need to
    /// probe a single rule without going through [`Engine::parse`]'s
    /// full-consumption requirement).
    pub fn eval_at(
        &mut self,
        expr: &Rc<Expr>,
        input: Value,
        sink: &mut dyn TraceSink,
    ) -> Result<ParseOutcome, EngineError> {
        let pos = Position::start(input);
        let mut ctx = Context::new();
        let mut env = EvalEnv {
            registry: &self.registry,
            rule: Rc::from("<eval_at>"),
            traced: &self.traced,
            sink,
        };
        eval(expr, &pos, &mut ctx, &mut env)
    }

    /// Runs `f` against a completely empty rule set, then restores the
    /// current one verbatim, regardless of how `f` exits (spec.md §6,
    /// `with-isolated-rules`).
    pub fn with_isolated_rules<T>(&mut self, f: impl FnOnce(&mut Engine) -> T) -> T {
        let outer = std::mem::take(&mut self.registry);
        let result = f(self);
        self.registry = outer;
        result
    }

    /// Runs `f` against a snapshot copy of the current rule set — `f` may
    /// freely add to or shadow rules, but none of that is visible once it
    /// returns (spec.md §6, `with-inherited-rules`).
    pub fn with_inherited_rules<T>(&mut self, f: impl FnOnce(&mut Engine) -> T) -> T {
        let snapshot = self.registry.clone();
        let pre = std::mem::replace(&mut self.registry, snapshot);
        let result = f(self);
        self.registry = pre;
        result
    }

    /// Enables trace events for `rule` (spec.md §6, `trace`), non-recursive:
    /// only calls to `rule` itself are reported, not calls it makes in turn.
    pub fn trace(&mut self, rule: impl Into<Rc<str>>) {
        self.traced.insert(rule.into(), false);
    }

    /// Enables trace events for `rule` and, for the duration of each of its
    /// calls, for every rule it calls transitively (spec.md §6, `trace(name,
    /// {recursive: bool})` with `recursive: true`).
    pub fn trace_recursive(&mut self, rule: impl Into<Rc<str>>) {
        self.traced.insert(rule.into(), true);
    }

    /// Disables trace events for `rule` (spec.md §6, `untrace`).
    pub fn untrace(&mut self, rule: &str) {
        self.traced.remove(rule);
    }
}
