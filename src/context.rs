//! Per-parse dynamic state threaded explicitly through evaluation (spec.md
//! §3, §4.4): the `let`/`external` binding-frame stack, the current rule's
//! closed parameter expressions, and the in-progress set used to detect left
//! recursion dynamically.
//!
//! Grounded on the teacher's `TokenStream`/`Cache` pair (`src/tokenization.rs`,
//! `src/cache.rs`): mutable parse-wide state passed by `&mut` reference
//! through the recursive-descent call tree rather than stashed behind
//! `RefCell` or thread-locals. This module keeps that same threading
//! discipline for the bindings/parameters/in-progress state spec.md requires.

use crate::expr::Expr;
use crate::position::Position;
use crate::value::Value;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// All state a rule dispatch needs beyond the input position itself.
#[derive(Default)]
pub struct Context {
    bindings: Vec<HashMap<Rc<str>, Value>>,
    params: Vec<Vec<Rc<Expr>>>,
    in_progress: HashSet<(Rc<str>, Position)>,
    call_depth: usize,
    recursive_trace_depth: usize,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new `let`/`external` binding frame (spec.md §4.4 step 3).
    pub fn push_binding_frame(&mut self) {
        self.bindings.push(HashMap::new());
    }

    pub fn pop_binding_frame(&mut self) {
        self.bindings.pop();
    }

    /// Binds `name` in the innermost frame.
    pub fn bind(&mut self, name: Rc<str>, value: Value) {
        if let Some(frame) = self.bindings.last_mut() {
            frame.insert(name, value);
        }
    }

    /// Reads `name`'s dynamic binding, searching from the innermost
    /// (closest enclosing `let`) frame outward — an `external` read sees
    /// the nearest ancestor that declared it (spec.md §4.4 step 3).
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.bindings.iter().rev().find_map(|frame| frame.get(name))
    }

    /// Mutates the nearest ancestor frame's existing cell named `name` in
    /// place (spec.md §4.6: "writing to an external cell is visible to any
    /// sibling/descendant sharing that ancestor"). Unlike `bind`, this never
    /// creates a new cell in the current frame — it finds and overwrites the
    /// cell the introducing rule's `let` already declared. Returns `false`
    /// (leaving every frame untouched) if no ancestor declared `name`.
    pub fn write_external(&mut self, name: &str, value: Value) -> bool {
        for frame in self.bindings.iter_mut().rev() {
            if let Some(cell) = frame.get_mut(name) {
                *cell = value;
                return true;
            }
        }
        false
    }

    /// Pushes the current rule's closed (self-contained) argument
    /// expressions, for `ParamRef` resolution within its body.
    pub fn push_params(&mut self, args: Vec<Rc<Expr>>) {
        self.params.push(args);
    }

    pub fn pop_params(&mut self) {
        self.params.pop();
    }

    /// The closed expression a `ParamRef(i)` in the current rule body
    /// refers to.
    pub fn param(&self, i: usize) -> Option<Rc<Expr>> {
        self.params.last().and_then(|frame| frame.get(i)).cloned()
    }

    /// The current rule's full closed argument list, used as `caller_args`
    /// when closing over a nested `Call`'s own arguments.
    pub fn current_args(&self) -> &[Rc<Expr>] {
        self.params.last().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Marks `(rule, position)` as being actively dispatched. Returns
    /// `false` (without inserting) if it already was — the left-recursion
    /// signal (spec.md §4.4 step 2, §7 item 2).
    pub fn mark_in_progress(&mut self, rule: Rc<str>, position: Position) -> bool {
        self.in_progress.insert((rule, position))
    }

    pub fn clear_in_progress(&mut self, rule: &Rc<str>, position: &Position) {
        self.in_progress.remove(&(rule.clone(), position.clone()));
    }

    /// Rule-dispatch call depth, for trace indentation (spec.md §6).
    pub fn call_depth(&self) -> usize {
        self.call_depth
    }

    pub fn enter_call(&mut self) {
        self.call_depth += 1;
    }

    pub fn exit_call(&mut self) {
        self.call_depth -= 1;
    }

    /// Whether the current call is nested inside a rule traced with the
    /// `recursive` flag (spec.md §6, `trace(name, {recursive: bool})`):
    /// every descendant call inherits tracing from such an ancestor, not
    /// just the rule named directly.
    pub fn in_recursive_trace_scope(&self) -> bool {
        self.recursive_trace_depth > 0
    }

    pub fn enter_recursive_trace_scope(&mut self) {
        self.recursive_trace_depth += 1;
    }

    pub fn exit_recursive_trace_scope(&mut self) {
        self.recursive_trace_depth -= 1;
    }
}
