//! `@timeout` — Deadline-Bound Block
//!
//! Interpreting derives a cancellable child context and races the nested
//! content against the deadline; on expiry the child is cancelled and the
//! block fails with a timeout error. Generating emits a closure establishing
//! a `context.WithTimeout` scope around the nested statements.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::ast::{CommandContent, DecoratorArg};
use crate::codegen::{go_duration, indent_block};
use crate::decorators::args::ArgResolver;
use crate::decorators::types::{BlockDecorator, ContentExecutor, ImportRequirements};
use crate::engine::context::ExecContext;
use crate::engine::errors::{EngineError, EngineResult};
use crate::engine::plan::{PlanKind, PlanStep, TimingInfo};

pub struct TimeoutDecorator;

#[async_trait]
impl BlockDecorator for TimeoutDecorator {
    fn name(&self) -> &'static str {
        "timeout"
    }

    fn imports(&self) -> ImportRequirements {
        ImportRequirements::stdlib(["context", "time"])
    }

    async fn run(
        &self,
        ctx: &ExecContext,
        exec: Arc<dyn ContentExecutor>,
        args: &[DecoratorArg],
        content: &[CommandContent],
    ) -> EngineResult<()> {
        let duration = ArgResolver::new("timeout", args).required_duration(ctx, "duration", 0)?;
        if ctx.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let child = ctx.with_cancellation();
        tokio::select! {
            result = exec.run_content(&child, content) => result,
            _ = tokio::time::sleep(duration) => {
                child.cancel();
                Err(EngineError::Timeout(duration))
            }
        }
    }

    fn generate(
        &self,
        ctx: &ExecContext,
        exec: &dyn ContentExecutor,
        args: &[DecoratorArg],
        content: &[CommandContent],
    ) -> EngineResult<String> {
        let duration = ArgResolver::new("timeout", args).required_duration(ctx, "duration", 0)?;
        let body = exec.generate_content(ctx, content)?;

        Ok(format!(
            "if err := func(ctx context.Context) error {{\n\
             \tctx, cancel := context.WithTimeout(ctx, {})\n\
             \tdefer cancel()\n\
             {}\
             \treturn nil\n\
             }}(ctx); err != nil {{\n\
             \treturn err\n\
             }}\n",
            go_duration(duration),
            indent_block(&body, 1),
        ))
    }

    fn plan(
        &self,
        ctx: &ExecContext,
        exec: &dyn ContentExecutor,
        args: &[DecoratorArg],
        content: &[CommandContent],
    ) -> EngineResult<PlanStep> {
        let duration = ArgResolver::new("timeout", args).required_duration(ctx, "duration", 0)?;
        let children = exec.plan_content(ctx, content)?;

        let mut parameters = BTreeMap::new();
        parameters.insert("duration".to_string(), format!("{:?}", duration));

        Ok(PlanStep::new(PlanKind::Timeout, format!("timeout {:?}", duration))
            .with_decorator("timeout", "block", parameters)
            .with_timing(TimingInfo { timeout: Some(duration), ..Default::default() })
            .with_children(children))
    }
}

// ============================================================================
// Tests
// ============================================================================
