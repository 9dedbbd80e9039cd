//! Engine error type.
//!
//! Mirrors the teacher's `ExcType` + payload split: a closed tag enum
//! (`ErrorKind`) carries the classification from spec.md §7, while
//! `EngineError` carries the message, optional source location, and (for
//! predicate violations) the rendered environment dump.

use std::fmt;

/// Result type alias for operations that can fail during evaluation.
pub type EngineResult<T> = Result<T, EngineError>;

/// Classification of an engine failure, per spec.md §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ErrorKind {
    /// Bad operand types, non-boolean condition, property missing on kind.
    Type,
    /// Undefined variable, assignment to undeclared name, reading `_`.
    Resolution,
    /// Pop-from-empty, out-of-bounds tuple index, missing record field.
    Container,
    /// `@invariant` / `@assert` / `|- @pred(...)` failed.
    PredicateViolation,
    /// A recursion or iteration-count limit from `EngineLimits` was exceeded.
    ResourceLimit,
    /// The parser should have prevented this; dispatched on the wrong type.
    Internal,
}

/// A source location, when the failing construct carries `line`/`column`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLoc {
    pub line: u32,
    pub column: u32,
}

/// An error produced during evaluation.
#[derive(Debug, Clone)]
pub struct EngineError {
    pub kind: ErrorKind,
    pub message: String,
    pub loc: Option<SourceLoc>,
    /// Rendered environment dump, populated only for `PredicateViolation`.
    pub state_dump: Option<String>,
}

impl EngineError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), loc: None, state_dump: None }
    }

    #[must_use]
    pub fn with_loc(mut self, line: u32, column: u32) -> Self {
        self.loc = Some(SourceLoc { line, column });
        self
    }

    #[must_use]
    pub fn with_state_dump(mut self, dump: impl Into<String>) -> Self {
        self.state_dump = Some(dump.into());
        self
    }

    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, msg)
    }

    pub fn resolution_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Resolution, msg)
    }

    pub fn container_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Container, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, msg)
    }

    pub fn resource_limit(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResourceLimit, msg)
    }

    /// An `@invariant`/`@assert`/`|- @pred(...)` failure; `dump` is the
    /// rendered non-function bindings in scope at the failing statement
    /// (spec.md §7 kind 4).
    pub fn predicate_violation(msg: impl Into<String>, dump: impl Into<String>) -> Self {
        Self::new(ErrorKind::PredicateViolation, msg).with_state_dump(dump)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(loc) = self.loc {
            write!(f, " (line {}, column {})", loc.line, loc.column)?;
        }
        if let Some(dump) = &self.state_dump {
            write!(f, "\n{dump}")?;
        }
        Ok(())
    }
}

impl std::error::Error for EngineError {}
