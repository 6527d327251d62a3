//! The ordered result-transformation pipeline attached to each rule
//! (spec.md §4.5). The success value of the rule body is threaded through
//! `processors` left to right; any `test`/`not` step that fails turns the
//! rule's success into an ordinary (recoverable) parse failure.
//!
//! Grounded on the teacher's `Node`/`Validator` wrappers
//! (`src/production/mod.rs`): both wrap an inner production and transform or
//! gate its result. This module generalizes that one-wrapper-at-a-time idea
//! into the explicit ordered pipeline spec.md §4.5 calls for.

use crate::error::EngineError;
use crate::pattern::Pattern;
use crate::value::Value;
use std::rc::Rc;

/// A single pipeline step.
pub enum Processor {
    Constant(Value),
    /// `lambda(formals, body)` and `destructure(pattern, body)` share this
    /// representation: spec.md §4.5 calls the two "identical in contract."
    Destructure {
        pattern: Pattern,
        body: Rc<dyn Fn(&std::collections::HashMap<Rc<str>, Value>) -> Value>,
    },
    /// Invokes `f` with the input's elements spread as positional
    /// arguments if the input is a list, or as a single argument otherwise
    /// (spec.md §9's recommended resolution of the spread ambiguity).
    Function(Rc<dyn Fn(&[Value]) -> Value>),
    Identity(bool),
    Flatten,
    StringJoin,
    Vectorize,
    Test {
        pattern: Pattern,
        predicate: Rc<dyn Fn(&std::collections::HashMap<Rc<str>, Value>) -> bool>,
        negate: bool,
    },
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Processor::Constant(v) => write!(f, "Constant({:?})", v),
            Processor::Destructure { .. } => write!(f, "Destructure(..)"),
            Processor::Function(_) => write!(f, "Function(..)"),
            Processor::Identity(flag) => write!(f, "Identity({})", flag),
            Processor::Flatten => write!(f, "Flatten"),
            Processor::StringJoin => write!(f, "StringJoin"),
            Processor::Vectorize => write!(f, "Vectorize"),
            Processor::Test { negate, .. } => write!(f, "Test(negate={})", negate),
        }
    }
}

/// Depth-first collection of the non-list leaves of a tree of lists
/// (spec.md §4.5, `flatten`).
fn flatten_leaves(value: &Value, out: &mut Vec<Value>) {
    match value {
        Value::List(items) => {
            for item in items.iter() {
                flatten_leaves(item, out);
            }
        }
        other => out.push(other.clone()),
    }
}

fn leaf_to_char_run(leaf: &Value, rule: &Rc<str>, out: &mut String) -> Result<(), EngineError> {
    match leaf {
        Value::Character(c) => {
            out.push(*c);
            Ok(())
        }
        Value::String(s) => {
            out.extend(s.iter());
            Ok(())
        }
        Value::Byte(b) => {
            out.push(*b as char);
            Ok(())
        }
        Value::Symbol(s) => {
            out.push_str(&s.name);
            Ok(())
        }
        other => Err(EngineError::ProcessorError {
            rule: rule.clone(),
            message: format!(
                "`string` processor cannot join a {:?} leaf (only characters, strings, bytes, and symbols are supported)",
                other
            ),
        }),
    }
}

/// Runs `value` through one processor step. `rule` names the owning rule,
/// for error messages only.
fn apply_one(
    processor: &Processor,
    value: Value,
    rule: &Rc<str>,
) -> Result<Option<Value>, EngineError> {
    match processor {
        Processor::Constant(v) => Ok(Some(v.clone())),
        Processor::Destructure { pattern, body } => {
            let bindings = pattern.destructure(&value)?;
            Ok(Some(body(&bindings)))
        }
        Processor::Function(f) => {
            let args: Vec<Value> = match &value {
                Value::List(items) => items.as_ref().clone(),
                other => vec![other.clone()],
            };
            Ok(Some(f(&args)))
        }
        Processor::Identity(flag) => {
            if *flag {
                Ok(Some(value))
            } else {
                Ok(Some(Value::Nil))
            }
        }
        Processor::Flatten => {
            let mut leaves = Vec::new();
            flatten_leaves(&value, &mut leaves);
            Ok(Some(Value::list(leaves)))
        }
        Processor::StringJoin => {
            let mut leaves = Vec::new();
            flatten_leaves(&value, &mut leaves);
            let mut joined = String::new();
            for leaf in &leaves {
                leaf_to_char_run(leaf, rule, &mut joined)?;
            }
            Ok(Some(Value::string(joined.chars().collect())))
        }
        Processor::Vectorize => {
            let mut leaves = Vec::new();
            flatten_leaves(&value, &mut leaves);
            Ok(Some(Value::vector(leaves)))
        }
        Processor::Test {
            pattern,
            predicate,
            negate,
        } => {
            let bindings = pattern.destructure(&value)?;
            let truthy = predicate(&bindings);
            let passes = if *negate { !truthy } else { truthy };
            if passes {
                Ok(Some(value))
            } else {
                Ok(None)
            }
        }
    }
}

/// Runs the full pipeline left to right. Returns `Ok(None)` if a `test`/
/// `not` step rejected the value (an ordinary, recoverable parse failure),
/// `Ok(Some(value))` on success, or `Err` for a fatal processor error.
pub fn run_pipeline(
    processors: &[Processor],
    mut value: Value,
    rule: &Rc<str>,
) -> Result<Option<Value>, EngineError> {
    for processor in processors {
        match apply_one(processor, value, rule)? {
            Some(next) => value = next,
            None => return Ok(None),
        }
    }
    Ok(Some(value))
}
