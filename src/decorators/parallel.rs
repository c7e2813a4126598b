//! `@parallel` — Concurrent Block
//!
//! Interpreting launches one task per content item, bounded by a counting
//! semaphore (`concurrency = 0` or unset means unbounded). With
//! `failOnFirstError` the first failure cancels the remaining siblings;
//! otherwise every item runs and the failures are aggregated. Generating
//! emits one goroutine per item gated by a weighted semaphore, sharing a
//! cancellable context.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::ast::{CommandContent, DecoratorArg};
use crate::codegen::indent_block;
use crate::decorators::args::ArgResolver;
use crate::decorators::types::{BlockDecorator, ContentExecutor, ImportRequirements};
use crate::engine::context::ExecContext;
use crate::engine::errors::{EngineError, EngineResult};
use crate::engine::plan::{PlanKind, PlanStep, TimingInfo};

pub struct ParallelDecorator;

impl ParallelDecorator {
    fn settings(&self, ctx: &ExecContext, args: &[DecoratorArg]) -> EngineResult<(u64, bool)> {
        let resolver = ArgResolver::new("parallel", args);
        let concurrency = resolver.optional_u64(ctx, "concurrency", 0)?.unwrap_or(0);
        let fail_fast = resolver
            .optional_bool(ctx, "failOnFirstError", 1)?
            .unwrap_or(false);
        Ok((concurrency, fail_fast))
    }
}

#[async_trait]
impl BlockDecorator for ParallelDecorator {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn imports(&self) -> ImportRequirements {
        ImportRequirements::stdlib(["context", "sync"]).with_third_party(
            "golang.org/x/sync/semaphore",
            "golang.org/x/sync",
            "v0.7.0",
        )
    }

    async fn run(
        &self,
        ctx: &ExecContext,
        exec: Arc<dyn ContentExecutor>,
        args: &[DecoratorArg],
        content: &[CommandContent],
    ) -> EngineResult<()> {
        let (concurrency, fail_fast) = self.settings(ctx, args)?;
        let child = ctx.with_cancellation();
        let semaphore = (concurrency > 0).then(|| Arc::new(Semaphore::new(concurrency as usize)));

        let mut tasks = JoinSet::new();
        for item in content.iter().cloned() {
            let task_ctx = child.clone();
            let exec = exec.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = match semaphore {
                    Some(sem) => Some(tokio::select! {
                        permit = sem.acquire_owned() => {
                            permit.map_err(|_| EngineError::Cancelled)?
                        }
                        _ = task_ctx.cancel_token().cancelled() => {
                            return Err(EngineError::Cancelled);
                        }
                    }),
                    None => None,
                };
                if task_ctx.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }
                exec.run_content(&task_ctx, std::slice::from_ref(&item)).await
            });
        }

        let mut failures: Vec<EngineError> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(join_error) if join_error.is_panic() => {
                    std::panic::resume_unwind(join_error.into_panic())
                }
                Err(_) => Err(EngineError::Cancelled),
            };
            match outcome {
                Ok(()) => {}
                // siblings torn down after the first failure are not failures
                Err(e) if e.is_cancelled() && !failures.is_empty() => {}
                Err(e) => {
                    if fail_fast && failures.is_empty() {
                        child.cancel();
                    }
                    failures.push(e);
                }
            }
        }

        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0)),
            n => {
                let first = failures.remove(0);
                Err(EngineError::ParallelFailed { failed: n, first: Box::new(first) })
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
        let (concurrency, fail_fast) = self.settings(ctx, args)?;
        let bound = if concurrency > 0 {
            concurrency.to_string()
        } else {
            // one permit per task keeps the gate semantically unbounded
            format!("int64({})", content.len().max(1))
        };

        let mut out = String::new();
        out.push_str("if err := func(ctx context.Context) error {\n");
        out.push_str("\tctx, cancel := context.WithCancel(ctx)\n");
        out.push_str("\tdefer cancel()\n");
        out.push_str(&format!("\tsem := semaphore.NewWeighted({})\n", bound));
        out.push_str(&format!("\terrs := make(chan error, {})\n", content.len().max(1)));
        out.push_str("\tvar wg sync.WaitGroup\n");

        for item in content {
            let body = exec.generate_content(ctx, std::slice::from_ref(item))?;
            out.push_str("\twg.Add(1)\n");
            out.push_str("\tgo func() {\n");
            out.push_str("\t\tdefer wg.Done()\n");
            out.push_str("\t\tif err := sem.Acquire(ctx, 1); err != nil {\n");
            out.push_str("\t\t\terrs <- err\n");
            out.push_str("\t\t\treturn\n");
            out.push_str("\t\t}\n");
            out.push_str("\t\tdefer sem.Release(1)\n");
            out.push_str("\t\tif err := func(ctx context.Context) error {\n");
            out.push_str(&indent_block(&body, 3));
            out.push_str("\t\t\treturn nil\n");
            out.push_str("\t\t}(ctx); err != nil {\n");
            out.push_str("\t\t\terrs <- err\n");
            if fail_fast {
                out.push_str("\t\t\tcancel()\n");
            }
            out.push_str("\t\t}\n");
            out.push_str("\t}()\n");
        }

        out.push_str("\twg.Wait()\n");
        out.push_str("\tclose(errs)\n");
        out.push_str("\tfor err := range errs {\n");
        out.push_str("\t\tif err != nil {\n");
        out.push_str("\t\t\treturn err\n");
        out.push_str("\t\t}\n");
        out.push_str("\t}\n");
        out.push_str("\treturn nil\n");
        out.push_str("}(ctx); err != nil {\n");
        out.push_str("\treturn err\n");
        out.push_str("}\n");
        Ok(out)
    }

    fn plan(
        &self,
        ctx: &ExecContext,
        exec: &dyn ContentExecutor,
        args: &[DecoratorArg],
        content: &[CommandContent],
    ) -> EngineResult<PlanStep> {
        let (concurrency, fail_fast) = self.settings(ctx, args)?;
        let children = exec.plan_content(ctx, content)?;

        let mut parameters = BTreeMap::new();
        parameters.insert("concurrency".to_string(), concurrency.to_string());
        parameters.insert("failOnFirstError".to_string(), fail_fast.to_string());

        let description = if concurrency > 0 {
            format!("parallel ({} at a time)", concurrency)
        } else {
            "parallel (unbounded)".to_string()
        };

        let mut step = PlanStep::new(PlanKind::Parallel, description)
            .with_decorator("parallel", "block", parameters)
            .with_children(children);
        if concurrency > 0 {
            step = step.with_timing(TimingInfo {
                concurrency_limit: Some(concurrency),
                ..Default::default()
            });
        }
        Ok(step)
    }
}

// ============================================================================
// Tests
// ============================================================================
