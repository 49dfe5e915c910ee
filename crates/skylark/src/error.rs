//! Error taxonomy shared by every subsystem.
//!
//! A flat exception type (one enum discriminant plus a formatted message)
//! rather than a `thiserror`-derived tree per kind: every fault the core
//! can raise is a `SkylarkError`, tagged with an `ExcKind` so the embedder
//! can match on category without parsing the message.

use std::fmt;

use crate::ast::Span;

/// Coarse-grained error category, per the error handling design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExcKind {
    Syntax,
    Resolve,
    Type,
    Value,
    Arithmetic,
    Mutation,
    Argument,
    Recursion,
    StepLimit,
    Cancelled,
    Load,
}

impl fmt::Display for ExcKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Syntax => "syntax error",
            Self::Resolve => "resolve error",
            Self::Type => "type error",
            Self::Value => "value error",
            Self::Arithmetic => "arithmetic error",
            Self::Mutation => "mutation error",
            Self::Argument => "argument error",
            Self::Recursion => "recursion error",
            Self::StepLimit => "step limit exceeded",
            Self::Cancelled => "cancelled",
            Self::Load => "load error",
        };
        f.write_str(s)
    }
}

/// One frame of the backtrace accumulated while an error unwinds call frames.
#[derive(Debug, Clone)]
pub struct CodeLoc {
    pub function_name: String,
    pub span: Span,
}

/// A single error value, carrying its kind, a human message, and a backtrace
/// built up as the error propagates through frames.
#[derive(Debug, Clone)]
pub struct SkylarkError {
    pub kind: ExcKind,
    pub message: String,
    pub backtrace: Vec<CodeLoc>,
}

impl SkylarkError {
    pub fn new(kind: ExcKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            backtrace: Vec::new(),
        }
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(ExcKind::Syntax, message)
    }

    pub fn resolve(message: impl Into<String>) -> Self {
        Self::new(ExcKind::Resolve, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ExcKind::Type, message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new(ExcKind::Value, message)
    }

    pub fn arithmetic(message: impl Into<String>) -> Self {
        Self::new(ExcKind::Arithmetic, message)
    }

    pub fn mutation(message: impl Into<String>) -> Self {
        Self::new(ExcKind::Mutation, message)
    }

    pub fn argument(message: impl Into<String>) -> Self {
        Self::new(ExcKind::Argument, message)
    }

    pub fn recursion(message: impl Into<String>) -> Self {
        Self::new(ExcKind::Recursion, message)
    }

    pub fn step_limit(message: impl Into<String>) -> Self {
        Self::new(ExcKind::StepLimit, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ExcKind::Cancelled, message)
    }

    pub fn load(message: impl Into<String>) -> Self {
        Self::new(ExcKind::Load, message)
    }

    /// Pushes a frame onto the backtrace; called as the error unwinds.
    pub fn push_frame(mut self, function_name: impl Into<String>, span: Span) -> Self {
        self.backtrace.push(CodeLoc {
            function_name: function_name.into(),
            span,
        });
        self
    }
}

impl fmt::Display for SkylarkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for SkylarkError {}

/// Crate-wide result alias.
pub type RunResult<T> = Result<T, SkylarkError>;
