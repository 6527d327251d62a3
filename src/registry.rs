//! The rule registry and its isolated/inheriting overlay scopes (spec.md §3,
//! §6). A `Rule` pairs a compiled body with its processor pipeline; a
//! `Registry` maps names to rules and supports temporarily swapping in a
//! fresh or snapshot-copied overlay for the duration of a closure.
//!
//! Grounded on the teacher's top-level `Parser`/`DefaultParser`
//! (`src/parsing.rs`), which owns the named-production table a grammar is
//! built from; this module generalizes that fixed-at-construction table into
//! one that can be overlaid and restored at runtime, per spec.md §6's
//! `with-isolated-rules`/`with-inherited-rules`.

use crate::error::EngineError;
use crate::expr::Expr;
use crate::processor::Processor;
use crate::value::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// A compiled rule: its body expression plus the processor pipeline applied
/// to whatever the body successfully parses (spec.md §3, §4.5).
pub struct Rule {
    pub params: Vec<Rc<str>>,
    pub body: Rc<Expr>,
    pub processors: Vec<Processor>,
    /// `let`-declared variable cells (spec.md §4.6): name plus initial
    /// value, bound fresh into this rule's own binding frame on every
    /// dispatch and discarded on return.
    pub lets: Vec<(Rc<str>, Value)>,
}

impl Rule {
    pub fn new(params: Vec<Rc<str>>, body: Rc<Expr>, processors: Vec<Processor>) -> Self {
        Self::with_lets(params, body, processors, Vec::new())
    }

    pub fn with_lets(
        params: Vec<Rc<str>>,
        body: Rc<Expr>,
        processors: Vec<Processor>,
        lets: Vec<(Rc<str>, Value)>,
    ) -> Self {
        Self {
            params,
            body,
            processors,
            lets,
        }
    }
}

/// The set of named rules currently in effect. A plain `HashMap` rather than
/// the teacher's construction-time production graph, since spec.md requires
/// runtime `define-rule`/`undefine-rule` and scoped overlays.
#[derive(Default, Clone)]
pub struct Registry {
    rules: HashMap<Rc<str>, Rc<Rule>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    pub fn define(&mut self, name: Rc<str>, rule: Rule) {
        self.rules.insert(name, Rc::new(rule));
    }

    pub fn undefine(&mut self, name: &str) -> bool {
        self.rules.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Result<Rc<Rule>, EngineError> {
        self.rules
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UndefinedRule { rule: Rc::from(name) })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// Runs `f` against a completely empty registry, then restores the
    /// current one verbatim — spec.md §6's `with-isolated-rules`: any
    /// `define-rule` calls `f` makes are invisible to the caller regardless
    /// of how `f` exits (including a fatal `Err`).
    pub fn with_isolated<T>(&mut self, f: impl FnOnce(&mut Registry) -> T) -> T {
        let outer = std::mem::take(&mut self.rules);
        let result = f(self);
        self.rules = outer;
        result
    }

    /// Runs `f` against a snapshot copy of the current registry (an
    /// independent clone of the name→rule table; rule bodies are cheaply
    /// `Rc`-shared), then discards the overlay and restores the pre-snapshot
    /// state verbatim — spec.md §6's `with-inherited-rules`: `f` sees every
    /// rule currently defined and may shadow or add to them, but none of
    /// that is visible to the caller afterward.
    pub fn with_inherited<T>(&mut self, f: impl FnOnce(&mut Registry) -> T) -> T {
        let snapshot = self.rules.clone();
        let pre = std::mem::replace(&mut self.rules, snapshot);
        let result = f(self);
        self.rules = pre;
        result
    }
}
