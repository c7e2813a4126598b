//! `@env` — Environment Lookup
//!
//! Interpreting reads the host environment with an optional fallback;
//! generating emits a guarded lookup (`envOr(...)`) so the emitted program
//! resolves the variable at its own runtime.

use async_trait::async_trait;

use crate::ast::DecoratorArg;
use crate::decorators::args::ArgResolver;
use crate::decorators::types::{FunctionDecorator, ImportRequirements};
use crate::engine::context::ExecContext;
use crate::engine::errors::EngineResult;
use crate::engine::plan::{PlanKind, PlanStep};

pub struct EnvDecorator;

#[async_trait]
impl FunctionDecorator for EnvDecorator {
    fn name(&self) -> &'static str {
        "env"
    }

    fn imports(&self) -> ImportRequirements {
        ImportRequirements::stdlib(["os"])
    }

    async fn run(&self, ctx: &ExecContext, args: &[DecoratorArg]) -> EngineResult<String> {
        let resolver = ArgResolver::new("env", args);
        let name = resolver.required_name("name", 0)?;
        let fallback = resolver.optional_string(ctx, "default", 1)?.unwrap_or_default();
        Ok(std::env::var(&name).unwrap_or(fallback))
    }

    fn generate(&self, ctx: &ExecContext, args: &[DecoratorArg]) -> EngineResult<String> {
        let resolver = ArgResolver::new("env", args);
        let name = resolver.required_name("name", 0)?;
        let fallback = resolver.optional_string(ctx, "default", 1)?.unwrap_or_default();
        ctx.render_template("env_lookup", &[name, fallback])
    }

    fn plan(&self, ctx: &ExecContext, args: &[DecoratorArg]) -> EngineResult<PlanStep> {
        let resolver = ArgResolver::new("env", args);
        let name = resolver.required_name("name", 0)?;
        let fallback = resolver.optional_string(ctx, "default", 1)?.unwrap_or_default();
        Ok(PlanStep::new(
            PlanKind::EnvRef,
            format!("${} (default {:?})", name, fallback),
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================
