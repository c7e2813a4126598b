//! Execution Plan
//!
//! A tree describing what would be executed, used for dry-run inspection.
//! Decorator `plan` methods build [`PlanStep`]s with the fluent constructors
//! here; rendering walks the tree depth-first producing indented, annotated
//! text.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::time::Duration;

use serde::Serialize;

/// The step families a plan can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanKind {
    Shell,
    Timeout,
    Retry,
    Parallel,
    Conditional,
    Try,
    VariableRef,
    EnvRef,
}

/// Which decorator produced a step.
#[derive(Debug, Clone, Serialize)]
pub struct DecoratorMeta {
    pub name: String,
    pub kind: String,
    pub parameters: BTreeMap<String, String>,
}

/// Timing annotations for timeout/retry/parallel steps.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TimingInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency_limit: Option<u64>,
}

/// One enumerated branch of a conditional step.
#[derive(Debug, Clone, Serialize)]
pub struct BranchInfo {
    pub key: String,
    pub will_execute: bool,
}

/// Condition annotations for conditional steps.
#[derive(Debug, Clone, Serialize)]
pub struct ConditionInfo {
    pub variable: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<String>,
    pub branches: Vec<BranchInfo>,
}

/// A node of the plan tree.
#[derive(Debug, Clone, Serialize)]
pub struct PlanStep {
    pub kind: PlanKind,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decorator: Option<DecoratorMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<TimingInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionInfo>,
    pub children: Vec<PlanStep>,
}

impl PlanStep {
    pub fn new(kind: PlanKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            decorator: None,
            timing: None,
            condition: None,
            children: Vec::new(),
        }
    }

    pub fn with_decorator(
        mut self,
        name: impl Into<String>,
        kind: impl Into<String>,
        parameters: BTreeMap<String, String>,
    ) -> Self {
        self.decorator = Some(DecoratorMeta { name: name.into(), kind: kind.into(), parameters });
        self
    }

    pub fn with_timing(mut self, timing: TimingInfo) -> Self {
        self.timing = Some(timing);
        self
    }

    pub fn with_condition(mut self, condition: ConditionInfo) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_child(mut self, child: PlanStep) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: Vec<PlanStep>) -> Self {
        self.children.extend(children);
        self
    }

    /// Total number of steps in this subtree, including this one.
    pub fn total_steps(&self) -> usize {
        1 + self.children.iter().map(PlanStep::total_steps).sum::<usize>()
    }

    fn icon(&self) -> &'static str {
        match self.kind {
            PlanKind::Shell => "$",
            PlanKind::Conditional => "?",
            PlanKind::VariableRef | PlanKind::EnvRef => "·",
            _ => "@",
        }
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let _ = writeln!(out, "{}{} {}", indent, self.icon(), self.description);

        if let Some(timing) = &self.timing {
            let mut parts = Vec::new();
            if let Some(t) = timing.timeout {
                parts.push(format!("timeout={:?}", t));
            }
            if let Some(d) = timing.delay {
                parts.push(format!("delay={:?}", d));
            }
            if let Some(a) = timing.attempts {
                parts.push(format!("attempts={}", a));
            }
            if let Some(c) = timing.concurrency_limit {
                parts.push(format!("concurrency={}", c));
            }
            if !parts.is_empty() {
                let _ = writeln!(out, "{}  ⏱ {}", indent, parts.join(" "));
            }
        }

        if let Some(cond) = &self.condition {
            let value = cond.value.as_deref().unwrap_or("<unset>");
            let selected = cond.selected.as_deref().unwrap_or("<none>");
            let _ = writeln!(out, "{}  ? {} = {:?} → {}", indent, cond.variable, value, selected);
            for branch in &cond.branches {
                let mark = if branch.will_execute { "✓" } else { " " };
                let _ = writeln!(out, "{}    [{}] {}", indent, mark, branch.key);
            }
        }

        for child in &self.children {
            child.render_into(out, depth + 1);
        }
    }

    fn collect_summary(&self, summary: &mut PlanSummary) {
        summary.total_steps += 1;
        match self.kind {
            PlanKind::Shell => summary.shell_commands += 1,
            PlanKind::Parallel => summary.parallel_sections += 1,
            _ => {}
        }
        if let Some(meta) = &self.decorator {
            summary.decorators.insert(meta.name.clone());
        }
        for child in &self.children {
            child.collect_summary(summary);
        }
    }
}

/// Plan for one command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandPlan {
    pub command: String,
    pub steps: Vec<PlanStep>,
}

/// Plan for a whole program: one entry per command, in source order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionPlan {
    pub commands: Vec<CommandPlan>,
}

/// Aggregated plan statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlanSummary {
    pub total_steps: usize,
    pub shell_commands: usize,
    pub parallel_sections: usize,
    pub decorators: BTreeSet<String>,
}

impl ExecutionPlan {
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.commands {
            let _ = writeln!(out, "{}:", entry.command);
            for step in &entry.steps {
                step.render_into(&mut out, 1);
            }
        }
        out
    }

    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for entry in &self.commands {
            for step in &entry.steps {
                step.collect_summary(&mut summary);
            }
        }
        summary
    }
}

// ============================================================================
// Tests
// ============================================================================
