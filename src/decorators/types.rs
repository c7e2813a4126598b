//! Decorator Contract
//!
//! Every decorator satisfies the same dual-backend contract: `run` interprets
//! the decorator now against the host shell, `generate` emits equivalent Go
//! source, and `plan` describes the step for dry-run rendering. A decorator
//! also declares the imports its generated code needs; the walker collects
//! those while traversing.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::ast::{CommandContent, DecoratorArg, PatternBranch};
use crate::engine::context::ExecContext;
use crate::engine::errors::EngineResult;
use crate::engine::plan::PlanStep;

/// The three decorator shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoratorKind {
    Function,
    Block,
    Pattern,
}

impl fmt::Display for DecoratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoratorKind::Function => write!(f, "function"),
            DecoratorKind::Block => write!(f, "block"),
            DecoratorKind::Pattern => write!(f, "pattern"),
        }
    }
}

/// Imports a decorator's generated code relies on: Go standard-library
/// packages, third-party packages, and module requirements for the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportRequirements {
    pub stdlib: BTreeSet<String>,
    pub third_party: BTreeSet<String>,
    /// module path → version
    pub modules: BTreeMap<String, String>,
}

impl ImportRequirements {
    pub fn stdlib<const N: usize>(packages: [&str; N]) -> Self {
        Self {
            stdlib: packages.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_third_party(mut self, package: &str, module: &str, version: &str) -> Self {
        self.third_party.insert(package.to_string());
        self.modules.insert(module.to_string(), version.to_string());
        self
    }

    /// Merge another requirement set into this one. Sets are monotonic and
    /// deduplicated, so repeated decorator uses contribute each import once.
    pub fn merge(&mut self, other: &ImportRequirements) {
        self.stdlib.extend(other.stdlib.iter().cloned());
        self.third_party.extend(other.third_party.iter().cloned());
        for (module, version) in &other.modules {
            self.modules.insert(module.clone(), version.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stdlib.is_empty() && self.third_party.is_empty() && self.modules.is_empty()
    }
}

/// Re-entry interface decorators use to hand nested content back to the
/// engine: run it now, emit statements for it, or describe it as plan steps.
#[async_trait]
pub trait ContentExecutor: Send + Sync {
    async fn run_content(&self, ctx: &ExecContext, content: &[CommandContent]) -> EngineResult<()>;

    fn generate_content(&self, ctx: &ExecContext, content: &[CommandContent])
        -> EngineResult<String>;

    fn plan_content(
        &self,
        ctx: &ExecContext,
        content: &[CommandContent],
    ) -> EngineResult<Vec<PlanStep>>;
}

/// A decorator embedded in shell content, yielding a string when run and an
/// expression when generated.
#[async_trait]
pub trait FunctionDecorator: Send + Sync {
    fn name(&self) -> &'static str;

    fn imports(&self) -> ImportRequirements {
        ImportRequirements::default()
    }

    async fn run(&self, ctx: &ExecContext, args: &[DecoratorArg]) -> EngineResult<String>;

    /// Emit a Go expression evaluating to the same string at runtime.
    fn generate(&self, ctx: &ExecContext, args: &[DecoratorArg]) -> EngineResult<String>;

    fn plan(&self, ctx: &ExecContext, args: &[DecoratorArg]) -> EngineResult<PlanStep>;
}

/// A decorator wrapping nested command content.
#[async_trait]
pub trait BlockDecorator: Send + Sync {
    fn name(&self) -> &'static str;

    fn imports(&self) -> ImportRequirements {
        ImportRequirements::default()
    }

    async fn run(
        &self,
        ctx: &ExecContext,
        exec: Arc<dyn ContentExecutor>,
        args: &[DecoratorArg],
        content: &[CommandContent],
    ) -> EngineResult<()>;

    /// Emit a Go statement sequence with the same behavior. Statements follow
    /// the `return err` convention of the enclosing generated closure.
    fn generate(
        &self,
        ctx: &ExecContext,
        exec: &dyn ContentExecutor,
        args: &[DecoratorArg],
        content: &[CommandContent],
    ) -> EngineResult<String>;

    fn plan(
        &self,
        ctx: &ExecContext,
        exec: &dyn ContentExecutor,
        args: &[DecoratorArg],
        content: &[CommandContent],
    ) -> EngineResult<PlanStep>;
}

/// A decorator selecting among named branches.
#[async_trait]
pub trait PatternDecorator: Send + Sync {
    fn name(&self) -> &'static str;

    fn imports(&self) -> ImportRequirements {
        ImportRequirements::default()
    }

    async fn run(
        &self,
        ctx: &ExecContext,
        exec: Arc<dyn ContentExecutor>,
        args: &[DecoratorArg],
        branches: &[PatternBranch],
    ) -> EngineResult<()>;

    fn generate(
        &self,
        ctx: &ExecContext,
        exec: &dyn ContentExecutor,
        args: &[DecoratorArg],
        branches: &[PatternBranch],
    ) -> EngineResult<String>;

    fn plan(
        &self,
        ctx: &ExecContext,
        exec: &dyn ContentExecutor,
        args: &[DecoratorArg],
        branches: &[PatternBranch],
    ) -> EngineResult<PlanStep>;
}

// ============================================================================
// Tests
// ============================================================================
