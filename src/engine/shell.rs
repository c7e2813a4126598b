//! Shell Execution
//!
//! The engine hands fully assembled command strings to a [`ShellExecutor`].
//! [`SystemShell`] spawns `sh -c` on the host; [`RecordingShell`] is an
//! in-memory double that records commands and replays scripted outcomes,
//! useful for exercising the walker without touching the host.
//!
//! No escaping happens at this layer: the assembled string is passed to the
//! shell verbatim. That is a contract with the source language.

use std::process::Stdio;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::engine::context::ExecContext;
use crate::engine::errors::{EngineError, EngineResult};

/// Captured outcome of one shell invocation.
#[derive(Debug, Clone)]
pub struct ShellOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ShellOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self { stdout: stdout.into(), stderr: String::new(), exit_code: 0 }
    }

    pub fn failure(stderr: impl Into<String>, exit_code: i32) -> Self {
        Self { stdout: String::new(), stderr: stderr.into(), exit_code }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Executes one assembled command string.
#[async_trait]
pub trait ShellExecutor: Send + Sync {
    async fn run(&self, ctx: &ExecContext, command: &str) -> EngineResult<ShellOutput>;
}

/// Runs commands on the host via `sh -c`, honoring the context's working
/// directory and cancellation token.
pub struct SystemShell;

#[async_trait]
impl ShellExecutor for SystemShell {
    async fn run(&self, ctx: &ExecContext, command: &str) -> EngineResult<ShellOutput> {
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &ctx.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn()?;

        tokio::select! {
            output = child.wait_with_output() => {
                let output = output?;
                Ok(ShellOutput {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    // A killed child has no code on Unix
                    exit_code: output.status.code().unwrap_or(-1),
                })
            }
            _ = ctx.cancel_token().cancelled() => {
                Err(EngineError::Cancelled)
            }
        }
    }
}

/// Test double: records every command and replays scripted results. With no
/// script, every command succeeds with empty output.
#[derive(Default)]
pub struct RecordingShell {
    commands: Mutex<Vec<String>>,
    script: Mutex<Vec<ShellOutput>>,
}

impl RecordingShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result for the next unscripted command.
    pub fn push_result(&self, output: ShellOutput) {
        self.script.lock().unwrap().push(output);
    }

    /// Commands seen so far, in execution order.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl ShellExecutor for RecordingShell {
    async fn run(&self, _ctx: &ExecContext, command: &str) -> EngineResult<ShellOutput> {
        self.commands.lock().unwrap().push(command.to_string());
        let next = {
            let mut script = self.script.lock().unwrap();
            if script.is_empty() { None } else { Some(script.remove(0)) }
        };
        Ok(next.unwrap_or_else(|| ShellOutput::success("")))
    }
}

// ============================================================================
// Tests
// ============================================================================
