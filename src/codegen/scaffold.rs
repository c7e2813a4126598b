//! Program Scaffold
//!
//! Assembles the emitted `main.go`: package clause, import block, live
//! variable declarations, runtime helpers, the supervision subsystem when
//! watch commands exist, and a `main` function with signal wiring and one
//! labelled case per command in source order.

use crate::ast::CommandKind;
use crate::codegen::builder::CodeBuilder;
use crate::codegen::imports::{render_import_block, GENERATED_MODULE};
use crate::codegen::runtime::{runtime_imports, PROCESS_REGISTRY_GO};
use crate::decorators::ImportRequirements;

/// One emitted command: its name, kind, and body statements. Bodies follow
/// the `return err` convention and are wrapped in a context-taking closure by
/// the scaffold.
#[derive(Debug, Clone)]
pub struct CommandBlock {
    pub name: String,
    pub kind: CommandKind,
    pub body: String,
}

/// Everything the scaffold needs to render a program.
#[derive(Debug, Clone, Default)]
pub struct ProgramParts {
    /// Live variables in declaration order, canonical string values
    pub variables: Vec<(String, String)>,
    /// Command blocks in source order
    pub commands: Vec<CommandBlock>,
    /// Whether `@env` was reached, requiring the `envOr` helper
    pub uses_env_helper: bool,
}

impl ProgramParts {
    pub fn has_watch(&self) -> bool {
        self.commands.iter().any(|c| c.kind == CommandKind::Watch)
    }
}

/// Imports contributed by the scaffold itself, before decorator imports are
/// merged in.
pub fn base_imports(parts: &ProgramParts) -> ImportRequirements {
    let mut imports = ImportRequirements::stdlib(["fmt", "os"]);
    if !parts.commands.is_empty() {
        imports.merge(&ImportRequirements::stdlib([
            "context",
            "errors",
            "os/exec",
            "os/signal",
            "syscall",
        ]));
    }
    if parts.has_watch() {
        imports.merge(&runtime_imports());
    }
    imports
}

/// Render the complete `main.go`.
pub fn render_main(parts: &ProgramParts, imports: &ImportRequirements) -> String {
    let mut b = CodeBuilder::new();

    b.line("// Code generated by devcmd. DO NOT EDIT.");
    b.line("package main");
    b.blank();
    b.block(&render_import_block(imports));
    b.blank();

    if !parts.variables.is_empty() {
        b.line("var (").indent();
        for (name, value) in &parts.variables {
            b.line(format!("{} = {}", name, super::go_quote(value)));
        }
        b.dedent().line(")");
        b.blank();
    }

    if !parts.commands.is_empty() {
        render_run_shell(&mut b);
        render_fail(&mut b);
    }
    if parts.uses_env_helper {
        render_env_or(&mut b);
    }
    render_help(&mut b, parts);

    if parts.has_watch() {
        b.block(PROCESS_REGISTRY_GO);
        b.blank();
    }

    render_main_fn(&mut b, parts);
    b.finish()
}

fn render_run_shell(b: &mut CodeBuilder) {
    b.line("func runShell(ctx context.Context, command string) error {").indent();
    b.line("cmd := exec.CommandContext(ctx, \"sh\", \"-c\", command)");
    b.line("cmd.Stdin = os.Stdin");
    b.line("cmd.Stdout = os.Stdout");
    b.line("cmd.Stderr = os.Stderr");
    b.line("return cmd.Run()");
    b.dedent().line("}");
    b.blank();
}

fn render_fail(b: &mut CodeBuilder) {
    b.line("func fail(err error) {").indent();
    b.line("fmt.Fprintln(os.Stderr, \"error:\", err)");
    b.line("var exitErr *exec.ExitError");
    b.line("if errors.As(err, &exitErr) {").indent();
    b.line("os.Exit(exitErr.ExitCode())");
    b.dedent().line("}");
    b.line("os.Exit(1)");
    b.dedent().line("}");
    b.blank();
}

fn render_env_or(b: &mut CodeBuilder) {
    b.line("func envOr(key, fallback string) string {").indent();
    b.line("if v, ok := os.LookupEnv(key); ok {").indent();
    b.line("return v");
    b.dedent().line("}");
    b.line("return fallback");
    b.dedent().line("}");
    b.blank();
}

fn render_help(b: &mut CodeBuilder, parts: &ProgramParts) {
    b.line("func printHelp() {").indent();
    b.line(format!("fmt.Println(\"usage: {} <command>\")", GENERATED_MODULE));
    if !parts.commands.is_empty() {
        b.line("fmt.Println()");
        b.line("fmt.Println(\"commands:\")");
        for cmd in &parts.commands {
            let suffix = if cmd.kind == CommandKind::Watch { " (watch)" } else { "" };
            b.line(format!("fmt.Println(\"  {}{}\")", cmd.name, suffix));
        }
        if parts.has_watch() {
            b.line("fmt.Println(\"  status\")");
            b.line("fmt.Println(\"  logs <name>\")");
            b.line("fmt.Println(\"  stop <name>\")");
        }
        b.line("fmt.Println(\"  help\")");
    }
    b.dedent().line("}");
    b.blank();
}

fn render_main_fn(b: &mut CodeBuilder, parts: &ProgramParts) {
    b.line("func main() {").indent();

    if !parts.commands.is_empty() {
        b.line("ctx, cancel := context.WithCancel(context.Background())");
        b.line("defer cancel()");
        b.blank();
        b.line("sigs := make(chan os.Signal, 1)");
        b.line("signal.Notify(sigs, syscall.SIGINT, syscall.SIGTERM)");
        b.line("go func() {").indent();
        b.line("<-sigs");
        b.line("cancel()");
        b.dedent().line("}()");
        b.blank();
    }

    b.line("if len(os.Args) < 2 {").indent();
    b.line("printHelp()");
    b.line("os.Exit(1)");
    b.dedent().line("}");
    b.blank();

    b.line("switch os.Args[1] {");
    for cmd in &parts.commands {
        b.line(format!("case {}:", super::go_quote(&cmd.name)));
        b.indent();
        b.line("if err := func(ctx context.Context) error {").indent();
        b.block(&cmd.body);
        b.line("return nil");
        b.dedent().line("}(ctx); err != nil {").indent();
        b.line("fail(err)");
        b.dedent().line("}");
        b.dedent();
    }
    if parts.has_watch() {
        b.line("case \"status\":").indent();
        b.line("if err := registryStatus(); err != nil {").indent();
        b.line("fail(err)");
        b.dedent().line("}");
        b.dedent();
        b.line("case \"logs\":").indent();
        b.line("if len(os.Args) < 3 {").indent();
        b.line("fail(fmt.Errorf(\"usage: logs <name>\"))");
        b.dedent().line("}");
        b.line("if err := registryLogs(os.Args[2]); err != nil {").indent();
        b.line("fail(err)");
        b.dedent().line("}");
        b.dedent();
        b.line("case \"stop\":").indent();
        b.line("if len(os.Args) < 3 {").indent();
        b.line("fail(fmt.Errorf(\"usage: stop <name>\"))");
        b.dedent().line("}");
        b.line("if err := registryStop(os.Args[2]); err != nil {").indent();
        b.line("fail(err)");
        b.dedent().line("}");
        b.dedent();
    }
    b.line("case \"help\":").indent();
    b.line("printHelp()");
    b.dedent();
    b.line("default:").indent();
    b.line("fmt.Fprintf(os.Stderr, \"unknown command %q\\n\", os.Args[1])");
    b.line("os.Exit(1)");
    b.dedent();
    b.line("}");

    b.dedent().line("}");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn run_block(name: &str, body: &str) -> CommandBlock {
        CommandBlock { name: name.into(), kind: CommandKind::Run, body: body.into() }
    }

    #[test]
    fn test_render_orders_commands_and_wraps_bodies() {
        let parts = ProgramParts {
            variables: vec![("PORT".into(), "8080".into())],
            commands: vec![
                run_block("build", "if err := runShell(ctx, \"make\"); err != nil {\n\treturn err\n}"),
                run_block("test", "if err := runShell(ctx, \"make test\"); err != nil {\n\treturn err\n}"),
            ],
            uses_env_helper: false,
        };
        let mut imports = base_imports(&parts);
        imports.merge(&ImportRequirements::default());
        let code = render_main(&parts, &imports);

        assert!(code.contains("package main"));
        assert!(code.contains("PORT = \"8080\""));
        let build = code.find("case \"build\":").unwrap();
        let test = code.find("case \"test\":").unwrap();
        assert!(build < test);
        assert!(code.contains("signal.Notify(sigs, syscall.SIGINT, syscall.SIGTERM)"));
        assert!(!code.contains("registryStart"));
        assert!(!code.contains("envOr"));
    }

    #[test]
    fn test_watch_pulls_in_registry_and_subcommands() {
        let parts = ProgramParts {
            variables: vec![],
            commands: vec![CommandBlock {
                name: "api".into(),
                kind: CommandKind::Watch,
                body: "cmd_1 := \"sleep 60\"\nif err := registryStart(\"api\", cmd_1); err != nil {\n\treturn err\n}".into(),
            }],
            uses_env_helper: false,
        };
        let imports = base_imports(&parts);
        let code = render_main(&parts, &imports);

        assert!(code.contains("func registryStart"));
        assert!(code.contains("case \"status\":"));
        assert!(code.contains("case \"logs\":"));
        assert!(code.contains("case \"stop\":"));
        assert!(imports.stdlib.contains("encoding/json"));
    }

    #[test]
    fn test_env_helper_emitted_on_demand() {
        let parts = ProgramParts {
            variables: vec![],
            commands: vec![run_block("x", "return nil")],
            uses_env_helper: true,
        };
        let code = render_main(&parts, &base_imports(&parts));
        assert!(code.contains("func envOr(key, fallback string) string {"));
    }

    #[test]
    fn test_empty_program_renders_help_only() {
        let parts = ProgramParts::default();
        let code = render_main(&parts, &base_imports(&parts));
        assert!(code.contains("printHelp()"));
        assert!(!code.contains("runShell"));
        assert!(!code.contains("signal.Notify"));
    }
}
