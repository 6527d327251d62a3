//! Runtime-toggleable trace hooks fired around rule dispatch (spec.md §6
//! `trace`/`untrace`).
//!
//! Grounded on the teacher's `Log<T>`-leveled logging convention
//! (`src/util/logger.rs`), generalized from a fixed `cfg(debug_assertions)`
//! `println!` into a small `TraceSink` trait so a host embedding can redirect
//! trace output anywhere (a file, a test buffer, a UI panel) rather than only
//! stdout — see DESIGN.md, Open Question 1 for the chosen message format.

/// A single rule-dispatch trace event.
pub enum TraceEvent<'a> {
    Enter { rule: &'a str, position: String, depth: usize },
    Exit { rule: &'a str, position: String, depth: usize, succeeded: bool },
}

/// Where trace events go. Implement this to redirect tracing; the default
/// [`StdoutSink`] just prints.
pub trait TraceSink {
    fn emit(&mut self, event: TraceEvent<'_>);
}

/// Formats an event the same way regardless of sink, per DESIGN.md's chosen
/// format: `"{indent}{> or <} {rule}@{position} -> {outcome}"`.
fn format_event(event: &TraceEvent<'_>) -> String {
    match event {
        TraceEvent::Enter { rule, position, depth } => {
            format!("{}> {}@{}", "  ".repeat(*depth), rule, position)
        }
        TraceEvent::Exit {
            rule,
            position,
            depth,
            succeeded,
        } => {
            let outcome = if *succeeded { "success" } else { "failure" };
            format!("{}< {}@{} -> {}", "  ".repeat(*depth), rule, position, outcome)
        }
    }
}

/// Prints every event to stdout, one line each.
#[derive(Default)]
pub struct StdoutSink;

impl TraceSink for StdoutSink {
    fn emit(&mut self, event: TraceEvent<'_>) {
        println!("{}", format_event(&event));
    }
}

/// Collects every event's formatted line in order, for tests and
/// programmatic inspection.
#[derive(Default)]
pub struct RecordingSink {
    pub lines: Vec<String>,
}

impl TraceSink for RecordingSink {
    fn emit(&mut self, event: TraceEvent<'_>) {
        self.lines.push(format_event(&event));
    }
}
