//! Engine Errors
//!
//! Unified error type for interpretation and code generation. Function
//! decorator failures propagate up the shell-assembly path and fail the
//! enclosing command; block decorator failures propagate to the enclosing
//! block; `@try` intercepts at exactly its boundary. Generation errors are
//! always fatal for the invocation.

use std::time::Duration;

use thiserror::Error;

use crate::decorators::DecoratorKind;

/// Coarse error classification, used when recording command results and by
/// callers that only care about the failure family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown decorator, undefined variable, wrong decorator kind
    Resolution,
    /// Missing or type-mismatched decorator argument
    Argument,
    /// Shell exit non-zero, failed spawn
    Execution,
    /// Context cancellation
    Cancelled,
    /// Deadline expiry in `@timeout`
    Timeout,
    /// Code emission failure
    Generation,
}

/// Unified error enum for the execution engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("unknown {kind} decorator '@{name}'")]
    UnknownDecorator { kind: DecoratorKind, name: String },

    #[error("'@{name}' is a {actual} decorator, not usable as {expected}")]
    WrongDecoratorKind {
        name: String,
        actual: DecoratorKind,
        expected: DecoratorKind,
    },

    #[error("variable '{0}' not defined")]
    UndefinedVariable(String),

    #[error("duplicate command '{0}'")]
    DuplicateCommand(String),

    #[error("@{decorator}: missing required argument '{argument}'")]
    MissingArgument { decorator: String, argument: String },

    #[error("@{decorator}: argument '{argument}' expects {expected}, got {actual}")]
    ArgumentType {
        decorator: String,
        argument: String,
        expected: String,
        actual: String,
    },

    #[error("command exited with status {code}")]
    CommandFailed { code: i32 },

    #[error("failed to spawn shell: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("execution cancelled")]
    Cancelled,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("{failed} parallel task(s) failed: {first}")]
    ParallelFailed { failed: usize, first: Box<EngineError> },

    #[error("cannot generate code for {0}")]
    UnsupportedNode(String),

    #[error("generation failed: {0}")]
    Generation(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::UnknownDecorator { .. }
            | EngineError::WrongDecoratorKind { .. }
            | EngineError::UndefinedVariable(_)
            | EngineError::DuplicateCommand(_) => ErrorKind::Resolution,
            EngineError::MissingArgument { .. } | EngineError::ArgumentType { .. } => {
                ErrorKind::Argument
            }
            EngineError::CommandFailed { .. } | EngineError::Spawn(_) => ErrorKind::Execution,
            EngineError::Cancelled => ErrorKind::Cancelled,
            EngineError::Timeout(_) => ErrorKind::Timeout,
            EngineError::ParallelFailed { first, .. } => first.kind(),
            EngineError::UnsupportedNode(_) | EngineError::Generation(_) => ErrorKind::Generation,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind(), ErrorKind::Cancelled)
    }

    /// Exit code carried by a failed shell command, if any.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            EngineError::CommandFailed { code } => Some(*code),
            EngineError::ParallelFailed { first, .. } => first.exit_code(),
            _ => None,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

// ============================================================================
// Tests
// ============================================================================
