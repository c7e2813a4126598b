//! `@try` — Attempt/Recover Branches
//!
//! The `main` branch always runs; the `error` branch runs iff `main` fails.
//! Cancellation passes through without recovery. Generating emits a
//! closure-wrapped attempt whose failure triggers the recovery statements.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::ast::{DecoratorArg, PatternBranch};
use crate::codegen::indent_block;
use crate::decorators::types::{ContentExecutor, ImportRequirements, PatternDecorator};
use crate::engine::context::ExecContext;
use crate::engine::errors::{EngineError, EngineResult};
use crate::engine::plan::{PlanKind, PlanStep};

pub const MAIN_BRANCH: &str = "main";
pub const ERROR_BRANCH: &str = "error";

pub struct TryDecorator;

impl TryDecorator {
    fn branch<'a>(branches: &'a [PatternBranch], key: &str) -> Option<&'a PatternBranch> {
        branches.iter().find(|b| b.pattern == key)
    }

    fn main_branch<'a>(branches: &'a [PatternBranch]) -> EngineResult<&'a PatternBranch> {
        Self::branch(branches, MAIN_BRANCH).ok_or_else(|| EngineError::MissingArgument {
            decorator: "try".to_string(),
            argument: MAIN_BRANCH.to_string(),
        })
    }
}

#[async_trait]
impl PatternDecorator for TryDecorator {
    fn name(&self) -> &'static str {
        "try"
    }

    fn imports(&self) -> ImportRequirements {
        ImportRequirements::stdlib(["context", "fmt", "os"])
    }

    async fn run(
        &self,
        ctx: &ExecContext,
        exec: Arc<dyn ContentExecutor>,
        _args: &[DecoratorArg],
        branches: &[PatternBranch],
    ) -> EngineResult<()> {
        let main = Self::main_branch(branches)?;

        match exec.run_content(ctx, &main.commands).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => match Self::branch(branches, ERROR_BRANCH) {
                Some(recovery) => {
                    debug!(error = %e, "main branch failed, running error branch");
                    exec.run_content(ctx, &recovery.commands).await
                }
                None => Err(e),
            },
        }
    }

    fn generate(
        &self,
        ctx: &ExecContext,
        exec: &dyn ContentExecutor,
        _args: &[DecoratorArg],
        branches: &[PatternBranch],
    ) -> EngineResult<String> {
        let main = Self::main_branch(branches)?;
        let main_body = exec.generate_content(ctx, &main.commands)?;

        let mut out = String::new();
        out.push_str("if err := func(ctx context.Context) error {\n");
        out.push_str(&indent_block(&main_body, 1));
        out.push_str("\treturn nil\n");
        out.push_str("}(ctx); err != nil {\n");
        match Self::branch(branches, ERROR_BRANCH) {
            Some(recovery) => {
                let recovery_body = exec.generate_content(ctx, &recovery.commands)?;
                out.push_str("\tfmt.Fprintln(os.Stderr, \"recovering from error:\", err)\n");
                out.push_str("\tif err := func(ctx context.Context) error {\n");
                out.push_str(&indent_block(&recovery_body, 2));
                out.push_str("\t\treturn nil\n");
                out.push_str("\t}(ctx); err != nil {\n");
                out.push_str("\t\treturn err\n");
                out.push_str("\t}\n");
            }
            None => {
                out.push_str("\treturn err\n");
            }
        }
        out.push_str("}\n");
        Ok(out)
    }

    fn plan(
        &self,
        ctx: &ExecContext,
        exec: &dyn ContentExecutor,
        _args: &[DecoratorArg],
        branches: &[PatternBranch],
    ) -> EngineResult<PlanStep> {
        let main = Self::main_branch(branches)?;
        let mut step = PlanStep::new(PlanKind::Try, "try")
            .with_decorator("try", "pattern", BTreeMap::new())
            .with_children(exec.plan_content(ctx, &main.commands)?);

        if let Some(recovery) = Self::branch(branches, ERROR_BRANCH) {
            step = step.with_child(
                PlanStep::new(PlanKind::Try, "on failure")
                    .with_children(exec.plan_content(ctx, &recovery.commands)?),
            );
        }
        Ok(step)
    }
}

// ============================================================================
// Tests
// ============================================================================
