//! Evaluator execution tracing.
//!
//! Grounded on the teacher's `tracer.rs`: a trait with zero-cost `NoopTracer`
//! default, so production evaluation pays nothing for observability, and a
//! `RecordingTracer` for tests/debugging that collects events for inspection.

/// A single observed evaluator event.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    /// A function call was entered, with its current recursion depth.
    Call { name: String, depth: usize },
    /// A loop (while/until/for) was entered.
    LoopEnter,
    /// One loop iteration's body finished; `iteration` is zero-based.
    LoopIteration { iteration: usize },
    /// A loop finished and refinements were synthesized for `count` variables.
    LoopExit { refined_vars: usize },
    /// An `@invariant` or `@assert` check passed.
    CheckPassed,
    /// An `@invariant` or `@assert` check failed.
    CheckFailed { message: String },
}

/// Hook points the evaluator calls during execution.
///
/// Implementations that ignore every method (like [`NoopTracer`]) compile
/// away entirely via monomorphization, exactly as the teacher's `VmTracer`
/// does for its bytecode loop.
pub trait EngineTracer {
    fn on_event(&mut self, _event: TraceEvent) {}
}

/// Zero-cost tracer used by default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl EngineTracer for NoopTracer {}

/// Tracer that records every event, for tests and debugging.
#[derive(Debug, Default, Clone)]
pub struct RecordingTracer {
    pub events: Vec<TraceEvent>,
}

impl EngineTracer for RecordingTracer {
    fn on_event(&mut self, event: TraceEvent) {
        self.events.push(event);
    }
}
