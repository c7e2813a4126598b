//! Result Types
//!
//! What an invocation hands back to the caller: per-command outcomes for
//! interpretation, and the emitted artefacts plus import sets for generation.

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::decorators::ImportRequirements;

/// Outcome of a single interpreted command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Success,
    Failed,
}

/// Per-command record: captured output lines plus the error that stopped the
/// command, if any.
#[derive(Debug, Clone, Serialize)]
pub struct CommandResult {
    pub name: String,
    pub status: CommandStatus,
    pub output: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResult {
    pub fn success(name: impl Into<String>, output: Vec<String>) -> Self {
        Self { name: name.into(), status: CommandStatus::Success, output, error: None }
    }

    pub fn failed(name: impl Into<String>, output: Vec<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CommandStatus::Failed,
            output,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CommandStatus::Success
    }
}

/// Result of interpreting a whole program. A failed command does not abort
/// the program, so the record can mix successes and failures.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionResult {
    /// Variable table after the initial pass, in declaration order
    pub variables: IndexMap<String, String>,
    /// One entry per command, in source order
    pub commands: Vec<CommandResult>,
}

impl ExecutionResult {
    pub fn has_errors(&self) -> bool {
        self.commands.iter().any(|c| !c.is_success())
    }

    pub fn successful_commands(&self) -> impl Iterator<Item = &CommandResult> {
        self.commands.iter().filter(|c| c.is_success())
    }

    pub fn failed_commands(&self) -> impl Iterator<Item = &CommandResult> {
        self.commands.iter().filter(|c| !c.is_success())
    }

    pub fn summary(&self) -> String {
        let total = self.commands.len();
        let failed = self.failed_commands().count();
        if failed == 0 {
            format!("{} command(s) succeeded", total)
        } else {
            format!("{} command(s): {} succeeded, {} failed", total, total - failed, failed)
        }
    }
}

/// Result of generating a standalone program: the main source file, the
/// module manifest, and the import sets collected during traversal.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    /// Emitted main source file
    pub code: String,
    /// Module manifest (`go.mod`) text
    pub manifest: String,
    /// Imports and module requirements collected from every decorator reached
    pub imports: ImportRequirements,
    /// Names of decorators reached during traversal
    pub decorators_used: BTreeSet<String>,
    /// One warning per declared-but-unused variable
    pub warnings: Vec<String>,
}

// ============================================================================
// Tests
// ============================================================================
