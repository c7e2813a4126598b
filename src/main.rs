use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use devcmd::engine::{Engine, ExecContext, ExecMode};
use devcmd::Program;

#[derive(Parser)]
#[command(name = "devcmd")]
#[command(about = "Run declarative developer commands or generate a standalone CLI")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interpret commands against the host shell
    Run {
        /// Program file (JSON AST produced by the front end)
        program: PathBuf,

        /// Command names to run (default: all, in source order)
        commands: Vec<String>,

        /// Record what would execute instead of executing it
        #[arg(long)]
        dry_run: bool,

        /// Working directory for spawned shells
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate a standalone Go program
    Generate {
        /// Program file (JSON AST produced by the front end)
        program: PathBuf,

        /// Directory for main.go and go.mod (default: print to stdout)
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },
    /// Show the execution plan
    Plan {
        /// Program file (JSON AST produced by the front end)
        program: PathBuf,

        /// Output the plan as JSON
        #[arg(long)]
        json: bool,
    },
}

fn load_program(path: &PathBuf) -> Result<Program, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read program file {}: {}", path.display(), e))?;
    serde_json::from_str(&text)
        .map_err(|e| format!("invalid program file {}: {}", path.display(), e))
}

/// Keep only the requested commands, preserving source order.
fn select_commands(program: &mut Program, names: &[String]) -> Result<(), String> {
    if names.is_empty() {
        return Ok(());
    }
    for name in names {
        if !program.commands.iter().any(|c| &c.name == name) {
            return Err(format!("no such command: {}", name));
        }
    }
    program.commands.retain(|c| names.contains(&c.name));
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "devcmd=debug" } else { "devcmd=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Run { program, commands, dry_run, cwd, json } => {
            let mut program = match load_program(&program) {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("error: {}", e);
                    return ExitCode::from(2);
                }
            };
            if let Err(e) = select_commands(&mut program, &commands) {
                eprintln!("error: {}", e);
                return ExitCode::from(2);
            }

            let mut ctx = ExecContext::new(ExecMode::Interpret);
            ctx.dry_run = dry_run;
            ctx.debug = cli.verbose;
            ctx.working_dir = cwd;

            let result = match Engine::new().interpret(&program, &mut ctx).await {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("error: {}", e);
                    return ExitCode::FAILURE;
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default());
            } else {
                for cmd in &result.commands {
                    println!("{}:", cmd.name);
                    for line in &cmd.output {
                        println!("  {}", line);
                    }
                    if let Some(error) = &cmd.error {
                        eprintln!("  error: {}", error);
                    }
                }
                println!("{}", result.summary());
            }

            if result.has_errors() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Command::Generate { program, output } => {
            let program = match load_program(&program) {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("error: {}", e);
                    return ExitCode::from(2);
                }
            };

            let mut ctx = ExecContext::new(ExecMode::Generate);
            ctx.debug = cli.verbose;

            let result = match Engine::new().generate(&program, &mut ctx) {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("error: {}", e);
                    return ExitCode::FAILURE;
                }
            };

            match output {
                Some(dir) => {
                    if let Err(e) = std::fs::create_dir_all(&dir)
                        .and_then(|_| std::fs::write(dir.join("main.go"), &result.code))
                        .and_then(|_| std::fs::write(dir.join("go.mod"), &result.manifest))
                    {
                        eprintln!("error: cannot write generated program: {}", e);
                        return ExitCode::FAILURE;
                    }
                    println!("wrote {} and {}", dir.join("main.go").display(), dir.join("go.mod").display());
                }
                None => {
                    print!("{}", result.code);
                }
            }
            ExitCode::SUCCESS
        }
        Command::Plan { program, json } => {
            let program = match load_program(&program) {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("error: {}", e);
                    return ExitCode::from(2);
                }
            };

            let mut ctx = ExecContext::new(ExecMode::Interpret);
            ctx.debug = cli.verbose;

            let plan = match Engine::new().plan(&program, &mut ctx) {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("error: {}", e);
                    return ExitCode::FAILURE;
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&plan).unwrap_or_default());
            } else {
                print!("{}", plan.render());
                let summary = plan.summary();
                println!(
                    "{} step(s), {} shell command(s), {} parallel section(s)",
                    summary.total_steps, summary.shell_commands, summary.parallel_sections
                );
            }
            ExitCode::SUCCESS
        }
    }
}
