//! `@when` — Conditional Branches
//!
//! Interpreting evaluates the variable and runs exactly the matching branch,
//! falling back to `default` when present (also when the variable itself is
//! unset). Generating emits a Go `switch` on the emitted variable.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::ast::{DecoratorArg, PatternBranch};
use crate::codegen::{go_quote, indent_block};
use crate::decorators::args::ArgResolver;
use crate::decorators::types::{ContentExecutor, PatternDecorator};
use crate::engine::context::ExecContext;
use crate::engine::errors::EngineResult;
use crate::engine::plan::{BranchInfo, ConditionInfo, PlanKind, PlanStep};

pub const DEFAULT_BRANCH: &str = "default";

pub struct WhenDecorator;

impl WhenDecorator {
    /// Branch selection: first key match in source order, then `default`.
    fn select<'a>(
        branches: &'a [PatternBranch],
        value: Option<&str>,
    ) -> Option<&'a PatternBranch> {
        value
            .and_then(|v| branches.iter().find(|b| b.pattern == v))
            .or_else(|| branches.iter().find(|b| b.pattern == DEFAULT_BRANCH))
    }
}

#[async_trait]
impl PatternDecorator for WhenDecorator {
    fn name(&self) -> &'static str {
        "when"
    }

    async fn run(
        &self,
        ctx: &ExecContext,
        exec: Arc<dyn ContentExecutor>,
        args: &[DecoratorArg],
        branches: &[PatternBranch],
    ) -> EngineResult<()> {
        let variable = ArgResolver::new("when", args).required_name("variable", 0)?;
        let value = ctx.get(&variable).ok().map(str::to_string);

        match Self::select(branches, value.as_deref()) {
            Some(branch) => exec.run_content(ctx, &branch.commands).await,
            None => Ok(()),
        }
    }

    fn generate(
        &self,
        ctx: &ExecContext,
        exec: &dyn ContentExecutor,
        args: &[DecoratorArg],
        branches: &[PatternBranch],
    ) -> EngineResult<String> {
        let variable = ArgResolver::new("when", args).required_name("variable", 0)?;
        // the switch references the emitted variable by name
        ctx.get(&variable)?;

        let mut out = format!("switch {} {{\n", variable);
        for branch in branches {
            if branch.pattern == DEFAULT_BRANCH {
                out.push_str("default:\n");
            } else {
                out.push_str(&format!("case {}:\n", go_quote(&branch.pattern)));
            }
            out.push_str(&indent_block(&exec.generate_content(ctx, &branch.commands)?, 1));
        }
        out.push_str("}\n");
        Ok(out)
    }

    fn plan(
        &self,
        ctx: &ExecContext,
        exec: &dyn ContentExecutor,
        args: &[DecoratorArg],
        branches: &[PatternBranch],
    ) -> EngineResult<PlanStep> {
        let variable = ArgResolver::new("when", args).required_name("variable", 0)?;
        let value = ctx.get(&variable).ok().map(str::to_string);
        let selected = Self::select(branches, value.as_deref());
        let selected_key = selected.map(|b| b.pattern.clone());

        let children = match selected {
            Some(branch) => exec.plan_content(ctx, &branch.commands)?,
            None => Vec::new(),
        };

        let mut parameters = BTreeMap::new();
        parameters.insert("variable".to_string(), variable.clone());

        Ok(PlanStep::new(PlanKind::Conditional, format!("when {}", variable))
            .with_decorator("when", "pattern", parameters)
            .with_condition(ConditionInfo {
                variable,
                value,
                selected: selected_key.clone(),
                branches: branches
                    .iter()
                    .map(|b| BranchInfo {
                        key: b.pattern.clone(),
                        will_execute: Some(&b.pattern) == selected_key.as_ref(),
                    })
                    .collect(),
            })
            .with_children(children))
    }
}

// ============================================================================
// Tests
// ============================================================================
