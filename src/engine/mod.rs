pub mod context;
pub mod errors;
pub mod plan;
pub mod results;
pub mod shell;
pub mod walker;

pub use context::{ExecContext, ExecMode, TemplateRegistry};
pub use errors::{EngineError, EngineResult, ErrorKind};
pub use plan::{ExecutionPlan, PlanKind, PlanStep, PlanSummary};
pub use results::{CommandResult, CommandStatus, ExecutionResult, GenerationResult};
pub use shell::{RecordingShell, ShellExecutor, ShellOutput, SystemShell};
pub use walker::Engine;
