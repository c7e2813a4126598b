//! devcmd - A dual-mode developer command runner
//!
//! This library walks a parsed command program and either interprets it
//! against the host shell or generates a standalone Go CLI with the same
//! behavior, driven by a shared decorator contract.

pub mod ast;
pub mod codegen;
pub mod decorators;
pub mod engine;

pub use ast::types::*;
pub use decorators::{DecoratorRegistry, ImportRequirements};
pub use engine::{
    CommandResult, CommandStatus, Engine, EngineError, ExecContext, ExecMode, ExecutionPlan,
    ExecutionResult, GenerationResult,
};
