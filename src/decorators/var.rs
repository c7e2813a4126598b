//! `@var` — Variable Reference
//!
//! Interpreting returns the stored value; generating emits the bare Go
//! identifier of the live variable, which the liveness pass guarantees is
//! declared in the emitted program.

use async_trait::async_trait;

use crate::ast::DecoratorArg;
use crate::decorators::args::ArgResolver;
use crate::decorators::types::FunctionDecorator;
use crate::engine::context::ExecContext;
use crate::engine::errors::EngineResult;
use crate::engine::plan::{PlanKind, PlanStep};

pub struct VarDecorator;

#[async_trait]
impl FunctionDecorator for VarDecorator {
    fn name(&self) -> &'static str {
        "var"
    }

    async fn run(&self, ctx: &ExecContext, args: &[DecoratorArg]) -> EngineResult<String> {
        let name = ArgResolver::new("var", args).required_name("name", 0)?;
        ctx.get(&name).map(str::to_string)
    }

    fn generate(&self, ctx: &ExecContext, args: &[DecoratorArg]) -> EngineResult<String> {
        let name = ArgResolver::new("var", args).required_name("name", 0)?;
        // reference must resolve even though only the identifier is emitted
        ctx.get(&name)?;
        Ok(name)
    }

    fn plan(&self, ctx: &ExecContext, args: &[DecoratorArg]) -> EngineResult<PlanStep> {
        let name = ArgResolver::new("var", args).required_name("name", 0)?;
        let value = ctx.get(&name)?.to_string();
        Ok(PlanStep::new(
            PlanKind::VariableRef,
            format!("{} = {:?}", name, value),
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================
