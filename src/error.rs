//! The two-tier error model of spec.md §7: ordinary PEG backtracking never
//! raises, it returns [`ParseOutcome::Failure`]; grammar/usage mistakes and
//! left recursion are fatal and returned as `Err(EngineError)`.
//!
//! Grounded on the teacher's `ImplementationError`/`ProductionError`/
//! `ParseError` split (`src/error.rs`, `src/impl_default.rs`): the teacher
//! keeps "this production simply didn't match" (`ProductionError::Unparsed`)
//! separate from "this grammar is broken" (`ImplementationError`) and from
//! "never throw, always Display by hand" — this module keeps that shape.

use crate::position::Position;
use crate::value::Value;
use std::fmt;
use std::rc::Rc;

/// A fatal grammar or usage error (spec.md §7, items 2 and 3). Terminates
/// the parse; never recovered from by alternation or optionals.
#[derive(Debug, Clone)]
pub enum EngineError {
    /// A rule invoked itself at the same input position without consuming
    /// input, detected dynamically via the `InProgress` set.
    LeftRecursion { rule: Rc<str>, position: String },
    /// `Call` referenced a rule name absent from the active registry.
    UndefinedRule { rule: Rc<str> },
    /// A descendant rule read an `external` variable no ancestor declared.
    UnboundExternal { rule: Rc<str>, variable: Rc<str> },
    /// A `Call`, `lambda`/`destructure`, or `function` processor received
    /// the wrong number of arguments/elements.
    ArityMismatch {
        what: String,
        expected: String,
        got: usize,
    },
    /// A dynamic `Rep`/unordered-combinator count argument did not resolve
    /// to a non-negative integer.
    InvalidRepArgument { rule: Rc<str> },
    /// A processor pipeline step could not be applied to its input (e.g.
    /// `string`/`vector` encountering a leaf kind that isn't one of the
    /// enumerated printable kinds). Covered by spec.md §7's closing "usage
    /// error... terminates the parse with a message identifying the rule
    /// and site," which the enumerated list there isn't exhaustive of.
    ProcessorError { rule: Rc<str>, message: String },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::LeftRecursion { rule, position } => {
                write!(
                    f,
                    "LeftRecursion: rule '{}' invoked itself at position {} without consuming input",
                    rule, position
                )
            }
            EngineError::UndefinedRule { rule } => {
                write!(f, "UndefinedRule: no rule named '{}' in the active registry", rule)
            }
            EngineError::UnboundExternal { rule, variable } => {
                write!(
                    f,
                    "UnboundExternal: rule '{}' read external variable '{}' with no ancestor binding",
                    rule, variable
                )
            }
            EngineError::ArityMismatch { what, expected, got } => {
                write!(f, "ArityMismatch: {} expected {}, got {}", what, expected, got)
            }
            EngineError::InvalidRepArgument { rule } => {
                write!(
                    f,
                    "InvalidRepArgument: rule '{}' supplied a repetition count that isn't a non-negative integer",
                    rule
                )
            }
            EngineError::ProcessorError { rule, message } => {
                write!(f, "ProcessorError: rule '{}': {}", rule, message)
            }
        }
    }
}

impl std::error::Error for EngineError {}

/// The outcome of evaluating an expression against a position: ordinary PEG
/// success/failure, never an exception (spec.md §4.2, §7 item 1).
#[derive(Debug, Clone)]
pub enum ParseOutcome {
    Success(Value, Position),
    Failure,
}

impl ParseOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ParseOutcome::Success(_, _))
    }
}

/// The result type every evaluator function and rule dispatch returns.
pub type EvalResult = Result<ParseOutcome, EngineError>;
