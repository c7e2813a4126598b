//! Execution Engine
//!
//! A unified tree walker over a parsed [`Program`] driving both backends
//! through the decorator contract: `interpret` dispatches decorator `run`
//! methods against the host shell, `generate` invokes decorator `generate`
//! methods and scaffolds a standalone Go program, `plan` builds the dry-run
//! step tree. Variables are materialised into the context in both modes,
//! because decorators need their values during generation as well.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::ast::{
    CommandContent, CommandDecl, CommandKind, FunctionNode, Program, ShellContent, ShellPart,
};
use crate::codegen::{self, render_manifest, CommandBlock, ProgramParts};
use crate::decorators::{ContentExecutor, DecoratorRegistry, ImportRequirements};
use crate::engine::context::ExecContext;
use crate::engine::errors::{EngineError, EngineResult};
use crate::engine::plan::{CommandPlan, ExecutionPlan, PlanKind, PlanStep};
use crate::engine::results::{CommandResult, ExecutionResult, GenerationResult};
use crate::engine::shell::{ShellExecutor, SystemShell};

/// Drives a program in Interpret, Generate, or Plan mode. The decorator
/// registry and shell executor are fixed at construction, so alternate sets
/// (or test doubles) can coexist.
pub struct Engine {
    registry: Arc<DecoratorRegistry>,
    shell: Arc<dyn ShellExecutor>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(DecoratorRegistry::with_builtins()),
            shell: Arc::new(SystemShell),
        }
    }

    pub fn with_parts(registry: Arc<DecoratorRegistry>, shell: Arc<dyn ShellExecutor>) -> Self {
        Self { registry, shell }
    }

    fn validate(program: &Program) -> EngineResult<()> {
        let mut seen = BTreeSet::new();
        for cmd in &program.commands {
            if !seen.insert(cmd.name.as_str()) {
                return Err(EngineError::DuplicateCommand(cmd.name.clone()));
            }
        }
        Ok(())
    }

    /// Initial variables pass, shared by every mode. Declarations evaluate in
    /// source order; a later duplicate name overwrites.
    fn materialize_variables(program: &Program, ctx: &mut ExecContext) {
        for decl in program.all_variables() {
            ctx.set(decl.name.clone(), decl.value.canonical());
        }
    }

    /// Interpret the program: commands run in source order, a failed command
    /// is recorded and the remaining commands still run.
    pub async fn interpret(
        &self,
        program: &Program,
        ctx: &mut ExecContext,
    ) -> EngineResult<ExecutionResult> {
        Self::validate(program)?;
        Self::materialize_variables(program, ctx);

        let walker = Walker::new(self.registry.clone(), self.shell.clone());
        let mut result = ExecutionResult {
            variables: ctx.vars().clone(),
            commands: Vec::with_capacity(program.commands.len()),
        };

        for cmd in &program.commands {
            debug!(command = %cmd.name, "running command");
            match walker.run_content(ctx, &cmd.body).await {
                Ok(()) => {
                    result
                        .commands
                        .push(CommandResult::success(&cmd.name, ctx.take_output()));
                }
                Err(e) => {
                    error!(command = %cmd.name, error = %e, "command failed");
                    result.commands.push(CommandResult::failed(
                        &cmd.name,
                        ctx.take_output(),
                        e.to_string(),
                    ));
                }
            }
        }
        Ok(result)
    }

    /// Generate a standalone program. Two passes: variable liveness first,
    /// then emission with import collection. Any resolution error aborts with
    /// no partial output.
    pub fn generate(
        &self,
        program: &Program,
        ctx: &mut ExecContext,
    ) -> EngineResult<GenerationResult> {
        Self::validate(program)?;
        Self::materialize_variables(program, ctx);

        let used = used_variables(program);
        let mut warnings = Vec::new();
        let mut live = Vec::new();
        for (name, value) in ctx.vars() {
            if used.contains(name.as_str()) {
                live.push((name.clone(), value.clone()));
            } else {
                warn!(variable = %name, "declared variable is never referenced");
                warnings.push(format!("unused variable '{}'", name));
            }
        }

        let (decorator_imports, decorators_used) = self.collect_imports(program)?;

        let walker = Walker::new(self.registry.clone(), self.shell.clone());
        let mut commands = Vec::with_capacity(program.commands.len());
        for cmd in &program.commands {
            let body = match cmd.kind {
                CommandKind::Run => walker.generate_content(ctx, &cmd.body)?,
                CommandKind::Watch => walker.generate_watch_body(ctx, cmd)?,
            };
            commands.push(CommandBlock { name: cmd.name.clone(), kind: cmd.kind, body });
        }

        let parts = ProgramParts {
            variables: live,
            commands,
            uses_env_helper: decorators_used.contains("env"),
        };
        let mut imports = codegen::scaffold::base_imports(&parts);
        imports.merge(&decorator_imports);

        Ok(GenerationResult {
            code: codegen::render_main(&parts, &imports),
            manifest: render_manifest(&imports),
            imports,
            decorators_used,
            warnings,
        })
    }

    /// Build the dry-run plan tree.
    pub fn plan(&self, program: &Program, ctx: &mut ExecContext) -> EngineResult<ExecutionPlan> {
        Self::validate(program)?;
        Self::materialize_variables(program, ctx);

        let walker = Walker::new(self.registry.clone(), self.shell.clone());
        let mut plan = ExecutionPlan::default();
        for cmd in &program.commands {
            plan.commands.push(CommandPlan {
                command: cmd.name.clone(),
                steps: walker.plan_content(ctx, &cmd.body)?,
            });
        }
        Ok(plan)
    }

    /// Walk every decorator reachable from any command and merge its import
    /// requirements. Also records which decorator names were reached.
    fn collect_imports(
        &self,
        program: &Program,
    ) -> EngineResult<(ImportRequirements, BTreeSet<String>)> {
        let mut imports = ImportRequirements::default();
        let mut used = BTreeSet::new();
        for cmd in &program.commands {
            self.collect_content(&cmd.body, &mut imports, &mut used)?;
        }
        Ok((imports, used))
    }

    fn collect_content(
        &self,
        content: &[CommandContent],
        imports: &mut ImportRequirements,
        used: &mut BTreeSet<String>,
    ) -> EngineResult<()> {
        for item in content {
            match item {
                CommandContent::Shell(sc) => {
                    for part in &sc.parts {
                        if let ShellPart::Function(f) = part {
                            let d = self.registry.function(&f.name)?;
                            imports.merge(&d.imports());
                            used.insert(f.name.clone());
                        }
                    }
                }
                CommandContent::Block(b) => {
                    let d = self.registry.block(&b.name)?;
                    imports.merge(&d.imports());
                    used.insert(b.name.clone());
                    self.collect_content(&b.content, imports, used)?;
                }
                CommandContent::Pattern(p) => {
                    let d = self.registry.pattern(&p.name)?;
                    imports.merge(&d.imports());
                    used.insert(p.name.clone());
                    for branch in &p.branches {
                        self.collect_content(&branch.commands, imports, used)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Identifiers a generated program must declare: everything referenced by
/// `@var`, plus the variables `@when` switches on.
pub fn used_variables(program: &Program) -> BTreeSet<String> {
    let mut used = BTreeSet::new();
    for cmd in &program.commands {
        collect_used(&cmd.body, &mut used);
    }
    used
}

fn collect_used(content: &[CommandContent], used: &mut BTreeSet<String>) {
    use crate::decorators::ArgResolver;

    for item in content {
        match item {
            CommandContent::Shell(sc) => {
                for part in &sc.parts {
                    if let ShellPart::Function(f) = part {
                        if f.name == "var" {
                            if let Ok(name) =
                                ArgResolver::new("var", &f.args).required_name("name", 0)
                            {
                                used.insert(name);
                            }
                        }
                    }
                }
            }
            CommandContent::Block(b) => collect_used(&b.content, used),
            CommandContent::Pattern(p) => {
                if p.name == "when" {
                    if let Ok(name) =
                        ArgResolver::new("when", &p.args).required_name("variable", 0)
                    {
                        used.insert(name);
                    }
                }
                for branch in &p.branches {
                    collect_used(&branch.commands, used);
                }
            }
        }
    }
}

// =============================================================================
// CONTENT WALKER
// =============================================================================

/// The re-entrant walker decorators call back into. Cloning shares the
/// registry, shell executor, and temp-name counter.
#[derive(Clone)]
pub(crate) struct Walker {
    inner: Arc<WalkerInner>,
}

struct WalkerInner {
    registry: Arc<DecoratorRegistry>,
    shell: Arc<dyn ShellExecutor>,
    tmp_counter: AtomicUsize,
}

impl Walker {
    pub(crate) fn new(registry: Arc<DecoratorRegistry>, shell: Arc<dyn ShellExecutor>) -> Self {
        Self {
            inner: Arc::new(WalkerInner {
                registry,
                shell,
                tmp_counter: AtomicUsize::new(0),
            }),
        }
    }

    fn next_tmp(&self) -> usize {
        self.inner.tmp_counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Lexical shell assembly: literal text plus the string values of
    /// embedded function decorators, concatenated with no escaping.
    async fn assemble(&self, ctx: &ExecContext, sc: &ShellContent) -> EngineResult<String> {
        let mut out = String::new();
        for part in &sc.parts {
            match part {
                ShellPart::Text { text } => out.push_str(text),
                ShellPart::Function(f) => {
                    let d = self.inner.registry.function(&f.name)?;
                    out.push_str(&d.run(ctx, &f.args).await?);
                }
            }
        }
        Ok(out)
    }

    /// Go expression reconstructing the same string at the emitted program's
    /// runtime: text becomes quoted literals, function decorators their
    /// generated expressions.
    fn assemble_expr(&self, ctx: &ExecContext, sc: &ShellContent) -> EngineResult<String> {
        let mut parts = Vec::new();
        for part in &sc.parts {
            match part {
                ShellPart::Text { text } => {
                    parts.push(ctx.render_template("go_quote", &[text.clone()])?);
                }
                ShellPart::Function(f) => {
                    let d = self.inner.registry.function(&f.name)?;
                    parts.push(d.generate(ctx, &f.args)?);
                }
            }
        }
        if parts.is_empty() {
            Ok("\"\"".to_string())
        } else {
            Ok(parts.join(" + "))
        }
    }

    async fn run_shell(&self, ctx: &ExecContext, sc: &ShellContent) -> EngineResult<()> {
        if ctx.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let command = self.assemble(ctx, sc).await?;
        if ctx.dry_run {
            ctx.emit(format!("Would execute: {}", command));
            return Ok(());
        }

        debug!(%command, "executing shell");
        let output = self.inner.shell.run(ctx, &command).await?;
        for line in output.stdout.lines() {
            ctx.emit(line);
        }
        for line in output.stderr.lines() {
            ctx.emit(line);
        }
        if output.is_success() {
            Ok(())
        } else {
            Err(EngineError::CommandFailed { code: output.exit_code })
        }
    }

    fn generate_shell(&self, ctx: &ExecContext, sc: &ShellContent) -> EngineResult<String> {
        let expr = self.assemble_expr(ctx, sc)?;
        let tmp = self.next_tmp();
        Ok(format!(
            "cmd_{tmp} := {expr}\n\
             fmt.Println(\"Executing:\", cmd_{tmp})\n\
             if err := runShell(ctx, cmd_{tmp}); err != nil {{\n\
             \treturn err\n\
             }}\n",
        ))
    }

    fn plan_shell(&self, ctx: &ExecContext, sc: &ShellContent) -> EngineResult<PlanStep> {
        let mut description = String::new();
        let mut children = Vec::new();
        for part in &sc.parts {
            match part {
                ShellPart::Text { text } => description.push_str(text),
                ShellPart::Function(f) => {
                    let d = self.inner.registry.function(&f.name)?;
                    description.push_str(&render_function_call(f));
                    children.push(d.plan(ctx, &f.args)?);
                }
            }
        }
        Ok(PlanStep::new(PlanKind::Shell, description).with_children(children))
    }

    /// Watch bodies assemble to one shell string handed to the supervision
    /// runtime; decorator content has no meaning there.
    fn generate_watch_body(&self, ctx: &ExecContext, cmd: &CommandDecl) -> EngineResult<String> {
        let mut exprs = Vec::new();
        for item in &cmd.body {
            match item {
                CommandContent::Shell(sc) => exprs.push(self.assemble_expr(ctx, sc)?),
                CommandContent::Block(b) => {
                    return Err(EngineError::UnsupportedNode(format!(
                        "block decorator '@{}' in watch command '{}'",
                        b.name, cmd.name
                    )));
                }
                CommandContent::Pattern(p) => {
                    return Err(EngineError::UnsupportedNode(format!(
                        "pattern decorator '@{}' in watch command '{}'",
                        p.name, cmd.name
                    )));
                }
            }
        }
        let expr = if exprs.is_empty() {
            "\"\"".to_string()
        } else {
            exprs.join(" + \" && \" + ")
        };
        let tmp = self.next_tmp();
        Ok(format!(
            "cmd_{tmp} := {expr}\n\
             if err := registryStart({name}, cmd_{tmp}); err != nil {{\n\
             \treturn err\n\
             }}\n",
            name = codegen::go_quote(&cmd.name),
        ))
    }
}

fn render_function_call(f: &FunctionNode) -> String {
    let args: Vec<String> = f
        .args
        .iter()
        .map(|a| match &a.name {
            Some(name) => format!("{}={}", name, a.value.canonical()),
            None => a.value.canonical(),
        })
        .collect();
    format!("@{}({})", f.name, args.join(", "))
}

#[async_trait]
impl ContentExecutor for Walker {
    async fn run_content(&self, ctx: &ExecContext, content: &[CommandContent]) -> EngineResult<()> {
        for item in content {
            if ctx.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            match item {
                CommandContent::Shell(sc) => self.run_shell(ctx, sc).await?,
                CommandContent::Block(b) => {
                    let d = self.inner.registry.block(&b.name)?;
                    let exec: Arc<dyn ContentExecutor> = Arc::new(self.clone());
                    d.run(ctx, exec, &b.args, &b.content).await?;
                }
                CommandContent::Pattern(p) => {
                    let d = self.inner.registry.pattern(&p.name)?;
                    let exec: Arc<dyn ContentExecutor> = Arc::new(self.clone());
                    d.run(ctx, exec, &p.args, &p.branches).await?;
                }
            }
        }
        Ok(())
    }

    fn generate_content(
        &self,
        ctx: &ExecContext,
        content: &[CommandContent],
    ) -> EngineResult<String> {
        let mut out = String::new();
        for item in content {
            match item {
                CommandContent::Shell(sc) => out.push_str(&self.generate_shell(ctx, sc)?),
                CommandContent::Block(b) => {
                    let d = self.inner.registry.block(&b.name)?;
                    out.push_str(&d.generate(ctx, self, &b.args, &b.content)?);
                }
                CommandContent::Pattern(p) => {
                    let d = self.inner.registry.pattern(&p.name)?;
                    out.push_str(&d.generate(ctx, self, &p.args, &p.branches)?);
                }
            }
        }
        Ok(out)
    }

    fn plan_content(
        &self,
        ctx: &ExecContext,
        content: &[CommandContent],
    ) -> EngineResult<Vec<PlanStep>> {
        let mut steps = Vec::new();
        for item in content {
            match item {
                CommandContent::Shell(sc) => steps.push(self.plan_shell(ctx, sc)?),
                CommandContent::Block(b) => {
                    let d = self.inner.registry.block(&b.name)?;
                    steps.push(d.plan(ctx, self, &b.args, &b.content)?);
                }
                CommandContent::Pattern(p) => {
                    let d = self.inner.registry.pattern(&p.name)?;
                    steps.push(d.plan(ctx, self, &p.args, &p.branches)?);
                }
            }
        }
        Ok(steps)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        BlockNode, DecoratorArg, PatternBranch, PatternNode, ShellPart, ValueExpr, VariableDecl,
    };
    use crate::engine::context::ExecMode;
    use crate::engine::shell::{RecordingShell, ShellOutput};
    use std::time::{Duration, Instant};

    fn var_decl(name: &str, value: ValueExpr) -> VariableDecl {
        VariableDecl { name: name.into(), value }
    }

    fn command(name: &str, body: Vec<CommandContent>) -> CommandDecl {
        CommandDecl { name: name.into(), kind: CommandKind::Run, body }
    }

    /// `<prefix>@var(<name>)<suffix>` as shell content.
    fn shell_with_var(prefix: &str, name: &str, suffix: &str) -> CommandContent {
        CommandContent::Shell(ShellContent {
            parts: vec![
                ShellPart::Text { text: prefix.into() },
                ShellPart::Function(FunctionNode {
                    name: "var".into(),
                    args: vec![DecoratorArg::positional(ValueExpr::Identifier(name.into()))],
                }),
                ShellPart::Text { text: suffix.into() },
            ],
        })
    }

    fn recording_engine() -> (Engine, Arc<RecordingShell>) {
        let shell = Arc::new(RecordingShell::new());
        let engine =
            Engine::with_parts(Arc::new(DecoratorRegistry::with_builtins()), shell.clone());
        (engine, shell)
    }

    #[tokio::test]
    async fn test_dry_run_records_expanded_command() {
        let program = Program {
            variables: vec![var_decl("PORT", ValueExpr::Number(8080.0))],
            var_groups: vec![],
            commands: vec![command("build", vec![shell_with_var("echo \"p=", "PORT", "\"")])],
        };

        let (engine, shell) = recording_engine();
        let mut ctx = ExecContext::new(ExecMode::Interpret);
        ctx.dry_run = true;
        let result = engine.interpret(&program, &mut ctx).await.unwrap();

        assert!(!result.has_errors());
        assert_eq!(result.commands.len(), 1);
        assert_eq!(
            result.commands[0].output,
            vec!["Would execute: echo \"p=8080\""]
        );
        assert!(shell.commands().is_empty());
    }

    #[tokio::test]
    async fn test_interpret_runs_commands_in_order() {
        let program = Program {
            commands: vec![
                command("build", vec![CommandContent::shell("make build")]),
                command("test", vec![CommandContent::shell("make test")]),
            ],
            ..Default::default()
        };

        let (engine, shell) = recording_engine();
        let mut ctx = ExecContext::new(ExecMode::Interpret);
        let result = engine.interpret(&program, &mut ctx).await.unwrap();

        assert_eq!(shell.commands(), vec!["make build", "make test"]);
        let names: Vec<&str> = result.commands.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["build", "test"]);
    }

    #[tokio::test]
    async fn test_failed_command_does_not_stop_later_commands() {
        let program = Program {
            commands: vec![
                command("bad", vec![CommandContent::shell("make broken")]),
                command("good", vec![CommandContent::shell("echo fine")]),
            ],
            ..Default::default()
        };

        let (engine, shell) = recording_engine();
        shell.push_result(ShellOutput::failure("no rule", 2));

        let mut ctx = ExecContext::new(ExecMode::Interpret);
        let result = engine.interpret(&program, &mut ctx).await.unwrap();

        assert!(result.has_errors());
        assert_eq!(result.commands[0].status, crate::engine::results::CommandStatus::Failed);
        assert_eq!(
            result.commands[0].error.as_deref(),
            Some("command exited with status 2")
        );
        assert_eq!(result.commands[1].status, crate::engine::results::CommandStatus::Success);
        assert_eq!(shell.commands().len(), 2);
    }

    #[tokio::test]
    async fn test_variable_table_is_monotonic() {
        let program = Program {
            variables: vec![var_decl("A", ValueExpr::String("1".into()))],
            var_groups: vec![],
            commands: vec![command("noop", vec![CommandContent::shell("true")])],
        };

        let (engine, _) = recording_engine();
        let mut ctx = ExecContext::new(ExecMode::Interpret);
        let result = engine.interpret(&program, &mut ctx).await.unwrap();

        assert_eq!(result.variables.len(), 1);
        assert_eq!(ctx.vars().len(), 1);
        assert_eq!(ctx.get("A").unwrap(), "1");
    }

    #[tokio::test]
    async fn test_duplicate_command_rejected() {
        let program = Program {
            commands: vec![command("build", vec![]), command("build", vec![])],
            ..Default::default()
        };
        let (engine, _) = recording_engine();
        let mut ctx = ExecContext::new(ExecMode::Interpret);
        let err = engine.interpret(&program, &mut ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "duplicate command 'build'");
    }

    #[tokio::test]
    async fn test_when_selects_matching_branch() {
        let when = |env: &str| Program {
            variables: vec![var_decl("ENV", ValueExpr::String(env.into()))],
            var_groups: vec![],
            commands: vec![command(
                "deploy",
                vec![CommandContent::Pattern(PatternNode {
                    name: "when".into(),
                    args: vec![DecoratorArg::positional(ValueExpr::Identifier("ENV".into()))],
                    branches: vec![
                        PatternBranch {
                            pattern: "prod".into(),
                            commands: vec![CommandContent::shell("echo P")],
                        },
                        PatternBranch {
                            pattern: "default".into(),
                            commands: vec![CommandContent::shell("echo D")],
                        },
                    ],
                })],
            )],
        };

        let (engine, shell) = recording_engine();
        let mut ctx = ExecContext::new(ExecMode::Interpret);
        engine.interpret(&when("prod"), &mut ctx).await.unwrap();
        assert_eq!(shell.commands(), vec!["echo P"]);

        let (engine, shell) = recording_engine();
        let mut ctx = ExecContext::new(ExecMode::Interpret);
        engine.interpret(&when("other"), &mut ctx).await.unwrap();
        assert_eq!(shell.commands(), vec!["echo D"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_timeout_cancels_slow_shell() {
        let program = Program {
            commands: vec![command(
                "slow",
                vec![CommandContent::Block(BlockNode {
                    name: "timeout".into(),
                    args: vec![DecoratorArg::named(
                        "duration",
                        ValueExpr::Duration("50ms".into()),
                    )],
                    content: vec![CommandContent::shell("sleep 2")],
                })],
            )],
            ..Default::default()
        };

        let engine = Engine::new();
        let mut ctx = ExecContext::new(ExecMode::Interpret);
        let start = Instant::now();
        let result = engine.interpret(&program, &mut ctx).await.unwrap();

        assert!(start.elapsed() < Duration::from_millis(250));
        assert!(result.has_errors());
        assert!(result.commands[0]
            .error
            .as_deref()
            .unwrap()
            .starts_with("timed out after"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_interpret_end_to_end_with_system_shell() {
        let program = Program {
            variables: vec![var_decl("NAME", ValueExpr::String("world".into()))],
            var_groups: vec![],
            commands: vec![command("greet", vec![shell_with_var("echo hello ", "NAME", "")])],
        };

        let engine = Engine::new();
        let mut ctx = ExecContext::new(ExecMode::Interpret);
        let result = engine.interpret(&program, &mut ctx).await.unwrap();

        assert!(!result.has_errors());
        assert_eq!(result.commands[0].output, vec!["hello world"]);
    }

    // ------------------------------------------------------------------------
    // Generation
    // ------------------------------------------------------------------------

    #[test]
    fn test_generate_liveness_filters_and_warns() {
        let program = Program {
            variables: vec![
                var_decl("USED", ValueExpr::String("x".into())),
                var_decl("UNUSED", ValueExpr::String("y".into())),
            ],
            var_groups: vec![],
            commands: vec![command("build", vec![shell_with_var("echo ", "USED", "")])],
        };

        let (engine, _) = recording_engine();
        let mut ctx = ExecContext::new(ExecMode::Generate);
        let result = engine.generate(&program, &mut ctx).unwrap();

        assert!(result.code.contains("USED = \"x\""));
        assert!(!result.code.contains("UNUSED"));
        assert_eq!(result.warnings, vec!["unused variable 'UNUSED'"]);
    }

    #[test]
    fn test_generate_nested_decorators_and_import_closure() {
        let retry = CommandContent::Block(BlockNode {
            name: "retry".into(),
            args: vec![DecoratorArg::named("attempts", ValueExpr::Number(2.0))],
            content: vec![CommandContent::shell("echo b")],
        });
        let program = Program {
            commands: vec![command(
                "build",
                vec![CommandContent::Block(BlockNode {
                    name: "parallel".into(),
                    args: vec![],
                    content: vec![CommandContent::shell("echo a"), retry],
                })],
            )],
            ..Default::default()
        };

        let (engine, _) = recording_engine();
        let mut ctx = ExecContext::new(ExecMode::Generate);
        let result = engine.generate(&program, &mut ctx).unwrap();

        assert!(result.imports.stdlib.contains("time"));
        assert!(result.imports.stdlib.contains("sync"));
        assert!(result.imports.third_party.contains("golang.org/x/sync/semaphore"));
        assert!(result.code.contains("semaphore.NewWeighted"));
        assert!(result.code.contains("for attempt := 1; attempt <= 2; attempt++ {"));
        assert_eq!(result.code.matches("go func() {").count(), 2);
        assert!(result.manifest.contains("require golang.org/x/sync v0.7.0"));
    }

    #[test]
    fn test_generate_import_deduplication() {
        // two commands, each reaching @env and @timeout
        let body = || {
            vec![
                CommandContent::Shell(ShellContent {
                    parts: vec![
                        ShellPart::Text { text: "echo ".into() },
                        ShellPart::Function(FunctionNode {
                            name: "env".into(),
                            args: vec![DecoratorArg::positional(ValueExpr::Identifier(
                                "HOME".into(),
                            ))],
                        }),
                    ],
                }),
                CommandContent::Block(BlockNode {
                    name: "timeout".into(),
                    args: vec![DecoratorArg::named(
                        "duration",
                        ValueExpr::Duration("1s".into()),
                    )],
                    content: vec![CommandContent::shell("true")],
                }),
            ]
        };
        let program = Program {
            commands: vec![command("one", body()), command("two", body())],
            ..Default::default()
        };

        let (engine, _) = recording_engine();
        let mut ctx = ExecContext::new(ExecMode::Generate);
        let result = engine.generate(&program, &mut ctx).unwrap();

        let import_block_start = result.code.find("import (").unwrap();
        let import_block_end = result.code[import_block_start..].find(")\n").unwrap();
        let block = &result.code[import_block_start..import_block_start + import_block_end];
        assert_eq!(block.matches("\"time\"").count(), 1);
        assert_eq!(block.matches("\"os\"").count(), 1);
        assert!(result.decorators_used.contains("env"));
        assert!(result.code.contains("func envOr"));
    }

    #[test]
    fn test_generate_command_blocks_in_source_order() {
        let program = Program {
            commands: vec![
                command("build", vec![CommandContent::shell("make build")]),
                command("test", vec![CommandContent::shell("make test")]),
            ],
            ..Default::default()
        };

        let (engine, _) = recording_engine();
        let mut ctx = ExecContext::new(ExecMode::Generate);
        let result = engine.generate(&program, &mut ctx).unwrap();

        let build = result.code.find("case \"build\":").unwrap();
        let test = result.code.find("case \"test\":").unwrap();
        assert!(build < test);
        assert!(result.code.contains("fmt.Println(\"Executing:\", cmd_1)"));
    }

    #[test]
    fn test_generate_unknown_decorator_is_fatal() {
        let program = Program {
            commands: vec![command(
                "build",
                vec![CommandContent::Block(BlockNode {
                    name: "nope".into(),
                    args: vec![],
                    content: vec![],
                })],
            )],
            ..Default::default()
        };
        let (engine, _) = recording_engine();
        let mut ctx = ExecContext::new(ExecMode::Generate);
        let err = engine.generate(&program, &mut ctx).unwrap_err();
        assert_eq!(err.to_string(), "unknown block decorator '@nope'");
    }

    #[test]
    fn test_generate_watch_command_embeds_registry() {
        let program = Program {
            commands: vec![CommandDecl {
                name: "api".into(),
                kind: CommandKind::Watch,
                body: vec![CommandContent::shell("sleep 60")],
            }],
            ..Default::default()
        };

        let (engine, _) = recording_engine();
        let mut ctx = ExecContext::new(ExecMode::Generate);
        let result = engine.generate(&program, &mut ctx).unwrap();

        assert!(result.code.contains("registryStart(\"api\", cmd_1)"));
        assert!(result.code.contains("func registryStop"));
        assert!(result.code.contains("case \"status\":"));
        assert!(result.imports.stdlib.contains("encoding/json"));
    }

    #[test]
    fn test_generate_watch_rejects_decorator_content() {
        let program = Program {
            commands: vec![CommandDecl {
                name: "api".into(),
                kind: CommandKind::Watch,
                body: vec![CommandContent::Block(BlockNode {
                    name: "retry".into(),
                    args: vec![],
                    content: vec![],
                })],
            }],
            ..Default::default()
        };
        let (engine, _) = recording_engine();
        let mut ctx = ExecContext::new(ExecMode::Generate);
        let err = engine.generate(&program, &mut ctx).unwrap_err();
        assert!(err.to_string().contains("watch command 'api'"));
    }

    #[test]
    fn test_generate_is_deterministic() {
        let program = Program {
            variables: vec![var_decl("PORT", ValueExpr::Number(8080.0))],
            var_groups: vec![],
            commands: vec![command("build", vec![shell_with_var("echo ", "PORT", "")])],
        };

        let (engine, _) = recording_engine();
        let mut ctx = ExecContext::new(ExecMode::Generate);
        let first = engine.generate(&program, &mut ctx).unwrap();
        let mut ctx = ExecContext::new(ExecMode::Generate);
        let second = engine.generate(&program, &mut ctx).unwrap();

        assert_eq!(first.code, second.code);
        assert_eq!(first.manifest, second.manifest);
    }

    #[test]
    fn test_used_variables_sees_when_and_nested_var() {
        let program = Program {
            variables: vec![],
            var_groups: vec![],
            commands: vec![command(
                "deploy",
                vec![CommandContent::Pattern(PatternNode {
                    name: "when".into(),
                    args: vec![DecoratorArg::positional(ValueExpr::Identifier("ENV".into()))],
                    branches: vec![PatternBranch {
                        pattern: "prod".into(),
                        commands: vec![CommandContent::Block(BlockNode {
                            name: "retry".into(),
                            args: vec![],
                            content: vec![shell_with_var("echo ", "PORT", "")],
                        })],
                    }],
                })],
            )],
        };

        let used = used_variables(&program);
        assert!(used.contains("ENV"));
        assert!(used.contains("PORT"));
        assert_eq!(used.len(), 2);
    }

    // ------------------------------------------------------------------------
    // Plan
    // ------------------------------------------------------------------------

    #[test]
    fn test_plan_tree_and_summary() {
        let program = Program {
            variables: vec![var_decl("PORT", ValueExpr::Number(8080.0))],
            var_groups: vec![],
            commands: vec![command(
                "build",
                vec![CommandContent::Block(BlockNode {
                    name: "parallel".into(),
                    args: vec![DecoratorArg::named("concurrency", ValueExpr::Number(2.0))],
                    content: vec![
                        shell_with_var("echo ", "PORT", ""),
                        CommandContent::shell("echo other"),
                    ],
                })],
            )],
        };

        let (engine, _) = recording_engine();
        let mut ctx = ExecContext::new(ExecMode::Interpret);
        let plan = engine.plan(&program, &mut ctx).unwrap();

        assert_eq!(plan.commands.len(), 1);
        assert_eq!(plan.commands[0].command, "build");

        let summary = plan.summary();
        assert_eq!(summary.shell_commands, 2);
        assert_eq!(summary.parallel_sections, 1);
        assert!(summary.decorators.contains("parallel"));

        let text = plan.render();
        assert!(text.contains("build:"));
        assert!(text.contains("@ parallel (2 at a time)"));
        assert!(text.contains("$ echo @var(PORT)"));
        assert!(text.contains("· PORT = \"8080\""));
    }
}
