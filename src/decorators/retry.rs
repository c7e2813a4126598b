//! `@retry` — Bounded Retry Block
//!
//! Interpreting runs the nested content up to `attempts` times, sleeping
//! `delay` between attempts; each attempt gets a fresh child context.
//! Cancellation is never retried. Generating emits a bounded loop with a
//! cancellation-aware inter-attempt sleep.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::ast::{CommandContent, DecoratorArg};
use crate::codegen::{go_duration, indent_block};
use crate::decorators::args::ArgResolver;
use crate::decorators::types::{BlockDecorator, ContentExecutor, ImportRequirements};
use crate::engine::context::ExecContext;
use crate::engine::errors::{EngineError, EngineResult};
use crate::engine::plan::{PlanKind, PlanStep, TimingInfo};

const DEFAULT_ATTEMPTS: u64 = 3;
const DEFAULT_DELAY: Duration = Duration::from_secs(1);

pub struct RetryDecorator;

impl RetryDecorator {
    fn settings(&self, ctx: &ExecContext, args: &[DecoratorArg]) -> EngineResult<(u64, Duration)> {
        let resolver = ArgResolver::new("retry", args);
        let attempts = resolver
            .optional_u64(ctx, "attempts", 0)?
            .unwrap_or(DEFAULT_ATTEMPTS)
            .max(1);
        let delay = resolver
            .optional_duration(ctx, "delay", 1)?
            .unwrap_or(DEFAULT_DELAY);
        Ok((attempts, delay))
    }
}

#[async_trait]
impl BlockDecorator for RetryDecorator {
    fn name(&self) -> &'static str {
        "retry"
    }

    fn imports(&self) -> ImportRequirements {
        ImportRequirements::stdlib(["context", "fmt", "os", "time"])
    }

    async fn run(
        &self,
        ctx: &ExecContext,
        exec: Arc<dyn ContentExecutor>,
        args: &[DecoratorArg],
        content: &[CommandContent],
    ) -> EngineResult<()> {
        let (attempts, delay) = self.settings(ctx, args)?;

        let mut last_error = None;
        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = ctx.cancel_token().cancelled() => return Err(EngineError::Cancelled),
                }
            }

            let child = ctx.with_cancellation();
            match exec.run_content(&child, content).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "retry attempt failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or(EngineError::Cancelled))
    }

    fn generate(
        &self,
        ctx: &ExecContext,
        exec: &dyn ContentExecutor,
        args: &[DecoratorArg],
        content: &[CommandContent],
    ) -> EngineResult<String> {
        let (attempts, delay) = self.settings(ctx, args)?;
        let body = exec.generate_content(ctx, content)?;

        Ok(format!(
            "{{\n\
             \tvar lastErr error\n\
             \tfor attempt := 1; attempt <= {attempts}; attempt++ {{\n\
             \t\tif attempt > 1 {{\n\
             \t\t\tselect {{\n\
             \t\t\tcase <-ctx.Done():\n\
             \t\t\t\treturn ctx.Err()\n\
             \t\t\tcase <-time.After({delay}):\n\
             \t\t\t}}\n\
             \t\t}}\n\
             \t\tlastErr = func(ctx context.Context) error {{\n\
             {body}\
             \t\t\treturn nil\n\
             \t\t}}(ctx)\n\
             \t\tif lastErr == nil {{\n\
             \t\t\tbreak\n\
             \t\t}}\n\
             \t\tfmt.Fprintf(os.Stderr, \"attempt %d/%d failed: %v\\n\", attempt, {attempts}, lastErr)\n\
             \t}}\n\
             \tif lastErr != nil {{\n\
             \t\treturn lastErr\n\
             \t}}\n\
             }}\n",
            attempts = attempts,
            delay = go_duration(delay),
            body = indent_block(&body, 3),
        ))
    }

    fn plan(
        &self,
        ctx: &ExecContext,
        exec: &dyn ContentExecutor,
        args: &[DecoratorArg],
        content: &[CommandContent],
    ) -> EngineResult<PlanStep> {
        let (attempts, delay) = self.settings(ctx, args)?;
        let children = exec.plan_content(ctx, content)?;

        let mut parameters = BTreeMap::new();
        parameters.insert("attempts".to_string(), attempts.to_string());
        parameters.insert("delay".to_string(), format!("{:?}", delay));

        Ok(PlanStep::new(
            PlanKind::Retry,
            format!("retry up to {} time(s)", attempts),
        )
        .with_decorator("retry", "block", parameters)
        .with_timing(TimingInfo {
            attempts: Some(attempts),
            delay: Some(delay),
            ..Default::default()
        })
        .with_children(children))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ValueExpr;
    use crate::engine::context::ExecMode;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Fails the first `failures` runs, then succeeds.
    struct FlakyExecutor {
        failures: u64,
        calls: AtomicU64,
    }

    impl FlakyExecutor {
        fn new(failures: u64) -> Self {
            Self { failures, calls: AtomicU64::new(0) }
        }
    }

    #[async_trait]
    impl ContentExecutor for FlakyExecutor {
        async fn run_content(
            &self,
            _ctx: &ExecContext,
            _content: &[CommandContent],
        ) -> EngineResult<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(EngineError::CommandFailed { code: 1 })
            } else {
                Ok(())
            }
        }

        fn generate_content(
            &self,
            _ctx: &ExecContext,
            _content: &[CommandContent],
        ) -> EngineResult<String> {
            Ok("if err := runShell(ctx, \"echo b\"); err != nil {\n\treturn err\n}\n".into())
        }

        fn plan_content(
            &self,
            _ctx: &ExecContext,
            _content: &[CommandContent],
        ) -> EngineResult<Vec<PlanStep>> {
            Ok(vec![PlanStep::new(PlanKind::Shell, "echo b")])
        }
    }

    fn retry_args(attempts: u64, delay: &str) -> Vec<DecoratorArg> {
        vec![
            DecoratorArg::named("attempts", ValueExpr::Number(attempts as f64)),
            DecoratorArg::named("delay", ValueExpr::Duration(delay.into())),
        ]
    }

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let ctx = ExecContext::new(ExecMode::Interpret);
        let exec = Arc::new(FlakyExecutor::new(2));
        RetryDecorator
            .run(&ctx, exec.clone(), &retry_args(3, "1ms"), &[])
            .await
            .unwrap();
        assert_eq!(exec.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_attempt_bound_is_respected() {
        let ctx = ExecContext::new(ExecMode::Interpret);
        let exec = Arc::new(FlakyExecutor::new(u64::MAX));
        let err = RetryDecorator
            .run(&ctx, exec.clone(), &retry_args(2, "1ms"), &[])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "command exited with status 1");
        assert_eq!(exec.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancellation_is_not_retried() {
        let ctx = ExecContext::new(ExecMode::Interpret);
        ctx.cancel();

        struct CancelledExecutor;
        #[async_trait]
        impl ContentExecutor for CancelledExecutor {
            async fn run_content(
                &self,
                _ctx: &ExecContext,
                _content: &[CommandContent],
            ) -> EngineResult<()> {
                Err(EngineError::Cancelled)
            }
            fn generate_content(
                &self,
                _ctx: &ExecContext,
                _content: &[CommandContent],
            ) -> EngineResult<String> {
                Ok(String::new())
            }
            fn plan_content(
                &self,
                _ctx: &ExecContext,
                _content: &[CommandContent],
            ) -> EngineResult<Vec<PlanStep>> {
                Ok(vec![])
            }
        }

        let err = RetryDecorator
            .run(&ctx, Arc::new(CancelledExecutor), &retry_args(5, "1ms"), &[])
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_generate_bounded_loop() {
        let ctx = ExecContext::new(ExecMode::Generate);
        let code = RetryDecorator
            .generate(&ctx, &FlakyExecutor::new(0), &retry_args(2, "1s"), &[])
            .unwrap();
        assert!(code.contains("for attempt := 1; attempt <= 2; attempt++ {"));
        assert!(code.contains("case <-time.After(1 * time.Second):"));
        assert!(code.contains("case <-ctx.Done():"));
        assert!(code.contains("return lastErr"));
    }

    #[test]
    fn test_plan_defaults() {
        let ctx = ExecContext::new(ExecMode::Interpret);
        let step = RetryDecorator.plan(&ctx, &FlakyExecutor::new(0), &[], &[]).unwrap();
        let timing = step.timing.unwrap();
        assert_eq!(timing.attempts, Some(DEFAULT_ATTEMPTS));
        assert_eq!(timing.delay, Some(DEFAULT_DELAY));
    }
}
