//! Destructuring patterns used by the `lambda`/`destructure` and
//! `test`/`not` processors (spec.md §4.5): "positional, nested, and
//! rest-tail forms permitted."
//!
//! Grounded on the teacher's `Validator` wrapper (`src/production/mod.rs`):
//! a production wraps another and runs a host closure over the parsed
//! result. Here the "parsed result" is destructured into named bindings
//! before the closure runs, since spec.md requires pattern matching as a
//! first-class core feature rather than leaving it to the closure body.

use crate::error::EngineError;
use crate::value::Value;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum Pattern {
    /// Matches anything, binds nothing.
    Wildcard,
    /// Matches anything, binds it to `name`.
    Bind(Rc<str>),
    /// Matches a list/vector-shaped value: `items` match positionally
    /// against the front, and `rest`, if present, binds the remaining tail
    /// as a list.
    Sequence {
        items: Vec<Pattern>,
        rest: Option<Rc<str>>,
    },
}

impl Pattern {
    /// A flat positional pattern over `names`, with an optional rest-tail
    /// binding — the shape `lambda(formals, body)` needs (spec.md §4.5
    /// says `lambda` and `destructure` are "identical in contract").
    pub fn positional(names: &[Rc<str>], rest: Option<Rc<str>>) -> Pattern {
        Pattern::Sequence {
            items: names.iter().cloned().map(Pattern::Bind).collect(),
            rest,
        }
    }

    /// Matches `value` against this pattern, returning the bound names, or
    /// an `ArityMismatch` (spec.md §7 item 3) if the shapes disagree.
    pub fn destructure(&self, value: &Value) -> Result<HashMap<Rc<str>, Value>, EngineError> {
        let mut bindings = HashMap::new();
        self.bind_into(value, &mut bindings)?;
        Ok(bindings)
    }

    fn bind_into(
        &self,
        value: &Value,
        bindings: &mut HashMap<Rc<str>, Value>,
    ) -> Result<(), EngineError> {
        match self {
            Pattern::Wildcard => Ok(()),
            Pattern::Bind(name) => {
                bindings.insert(name.clone(), value.clone());
                Ok(())
            }
            Pattern::Sequence { items, rest } => {
                let len = value.seq_len().ok_or_else(|| EngineError::ArityMismatch {
                    what: "pattern destructuring".into(),
                    expected: "a sequence value".into(),
                    got: 0,
                })?;
                if len < items.len() || (rest.is_none() && len != items.len()) {
                    return Err(EngineError::ArityMismatch {
                        what: "pattern destructuring".into(),
                        expected: if rest.is_some() {
                            format!("at least {} elements", items.len())
                        } else {
                            format!("exactly {} elements", items.len())
                        },
                        got: len,
                    });
                }
                for (i, item_pattern) in items.iter().enumerate() {
                    let item = value.seq_get(i).expect("length already checked");
                    item_pattern.bind_into(&item, bindings)?;
                }
                if let Some(rest_name) = rest {
                    let tail: Vec<Value> = (items.len()..len)
                        .map(|i| value.seq_get(i).expect("length already checked"))
                        .collect();
                    bindings.insert(rest_name.clone(), Value::list(tail));
                }
                Ok(())
            }
        }
    }
}
