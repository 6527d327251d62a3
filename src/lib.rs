//! A parsing-expression-grammar engine for structured, heterogeneous input:
//! strings, byte vectors, general vectors, and cons-lists, possibly nested.
//!
//! # Overview
//!
//! Most PEG libraries assume the input is a flat stream of characters or
//! tokens. This one instead treats a [`Value`](value::Value) — a
//! tagged-union domain of symbols, characters, bytes, numbers, strings,
//! vectors, and lists — as its unit of input, and lets a grammar descend
//! into nested containers with [`Expr::Descend`](expr::Expr::Descend) the
//! same way it matches scalar elements.
//!
//! # Design
//!
//! A grammar is a set of named rules held in a [`Registry`](registry::Registry),
//! each compiled to an [`Expr`](expr::Expr) tree plus a processor pipeline
//! that transforms or validates the rule's matched value. [`Engine`](engine::Engine)
//! is the façade a host embedding talks to: define and undefine rules at
//! runtime, parse input against a named rule, and run closures against a
//! temporarily isolated or inherited rule overlay. Rule dispatch
//! ([`dispatch`]) resolves [`Expr::Call`](expr::Expr::Call) by name,
//! detects left recursion dynamically via an in-progress set rather than
//! static analysis, and binds call arguments as closed (self-contained)
//! expressions so they can be re-evaluated by reference at a
//! [`ParamRef`](expr::Expr::ParamRef) site without chasing an environment
//! chain.

pub mod context;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod eval;
pub mod expr;
pub mod pattern;
pub mod position;
pub mod processor;
pub mod registry;
pub mod trace;
pub mod value;

pub use engine::{Engine, Parsed};
pub use error::{EngineError, EvalResult, ParseOutcome};
pub use expr::{CountArg, Expr};
pub use pattern::Pattern;
pub use position::Position;
pub use processor::Processor;
pub use registry::{Registry, Rule};
pub use trace::{RecordingSink, StdoutSink, TraceSink};
pub use value::{Form, ItemClassKind, Number, SequenceKind, Symbol, Value};
