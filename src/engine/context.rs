//! Execution Context
//!
//! Per-invocation state shared by the tree walker and the decorators: the
//! variable table, mode and flags, the cancellation token, the output sink of
//! the command currently running, and the template helpers some generators use
//! to splice snippets into emitted code.
//!
//! The variable table is monotonic during one invocation: the engine fills it
//! in the initial variables pass and nothing mutates it afterwards.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;

use crate::engine::errors::{EngineError, EngineResult};

/// Which backend an invocation drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Execute commands against the host shell
    Interpret,
    /// Emit an equivalent standalone program
    Generate,
}

/// A named snippet helper available to code generators.
pub type TemplateFn = Arc<dyn Fn(&[String]) -> String + Send + Sync>;

/// Registry of snippet helpers used while emitting code. The defaults cover
/// string-literal quoting and environment lookups for the Go backend.
#[derive(Clone)]
pub struct TemplateRegistry {
    templates: HashMap<String, TemplateFn>,
}

impl TemplateRegistry {
    pub fn empty() -> Self {
        Self { templates: HashMap::new() }
    }

    pub fn register(&mut self, name: impl Into<String>, f: TemplateFn) {
        self.templates.insert(name.into(), f);
    }

    pub fn render(&self, name: &str, args: &[String]) -> Option<String> {
        self.templates.get(name).map(|f| f(args))
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        let mut reg = Self::empty();
        reg.register(
            "go_quote",
            Arc::new(|args: &[String]| {
                crate::codegen::go_quote(args.first().map(String::as_str).unwrap_or(""))
            }),
        );
        reg.register(
            "env_lookup",
            Arc::new(|args: &[String]| {
                let key = args.first().map(String::as_str).unwrap_or("");
                let fallback = args.get(1).map(String::as_str).unwrap_or("");
                format!(
                    "envOr({}, {})",
                    crate::codegen::go_quote(key),
                    crate::codegen::go_quote(fallback)
                )
            }),
        );
        reg
    }
}

/// Process-wide state for a single engine invocation.
///
/// Contexts are cheap to clone; clones share the output sink and template
/// registry, and `with_cancellation` derives a child whose token is cancelled
/// when the parent's is.
#[derive(Clone)]
pub struct ExecContext {
    mode: ExecMode,
    pub dry_run: bool,
    pub debug: bool,
    pub working_dir: Option<PathBuf>,
    vars: IndexMap<String, String>,
    cancel: CancellationToken,
    sink: Arc<Mutex<Vec<String>>>,
    templates: Arc<TemplateRegistry>,
}

impl ExecContext {
    pub fn new(mode: ExecMode) -> Self {
        Self {
            mode,
            dry_run: false,
            debug: false,
            working_dir: None,
            vars: IndexMap::new(),
            cancel: CancellationToken::new(),
            sink: Arc::new(Mutex::new(Vec::new())),
            templates: Arc::new(TemplateRegistry::default()),
        }
    }

    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    /// Look up a variable, failing with `variable 'NAME' not defined`.
    pub fn get(&self, name: &str) -> EngineResult<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| EngineError::UndefinedVariable(name.to_string()))
    }

    /// Install a variable. Called only by the engine's initial variables
    /// pass; a later declaration with the same name overwrites.
    pub(crate) fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Snapshot of the variable table in declaration order.
    pub fn vars(&self) -> &IndexMap<String, String> {
        &self.vars
    }

    /// Derive a child context with its own cancellation token. The child
    /// inherits variables and shares the output sink; cancelling the parent
    /// cancels the child, not the other way around.
    pub fn with_cancellation(&self) -> Self {
        let mut child = self.clone();
        child.cancel = self.cancel.child_token();
        child
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Append a line to the output of the command currently being walked.
    pub fn emit(&self, line: impl Into<String>) {
        self.sink.lock().expect("output sink poisoned").push(line.into());
    }

    /// Drain accumulated output. The engine calls this once per command.
    pub(crate) fn take_output(&self) -> Vec<String> {
        std::mem::take(&mut *self.sink.lock().expect("output sink poisoned"))
    }

    /// Render a template helper, failing when the helper is not registered.
    pub fn render_template(&self, name: &str, args: &[String]) -> EngineResult<String> {
        self.templates
            .render(name, args)
            .ok_or_else(|| EngineError::Generation(format!("no template helper '{}'", name)))
    }

    pub fn with_templates(mut self, templates: TemplateRegistry) -> Self {
        self.templates = Arc::new(templates);
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set() {
        let mut ctx = ExecContext::new(ExecMode::Interpret);
        ctx.set("PORT", "8080");
        assert_eq!(ctx.get("PORT").unwrap(), "8080");
    }

    #[test]
    fn test_get_undefined() {
        let ctx = ExecContext::new(ExecMode::Interpret);
        let err = ctx.get("MISSING").unwrap_err();
        assert_eq!(err.to_string(), "variable 'MISSING' not defined");
    }

    #[test]
    fn test_later_declaration_overwrites() {
        let mut ctx = ExecContext::new(ExecMode::Interpret);
        ctx.set("ENV", "dev");
        ctx.set("ENV", "prod");
        assert_eq!(ctx.get("ENV").unwrap(), "prod");
        assert_eq!(ctx.vars().len(), 1);
    }

    #[test]
    fn test_child_inherits_vars_with_own_token() {
        let mut ctx = ExecContext::new(ExecMode::Interpret);
        ctx.set("PORT", "8080");
        let child = ctx.with_cancellation();
        assert_eq!(child.get("PORT").unwrap(), "8080");

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn test_parent_cancel_propagates_to_child() {
        let ctx = ExecContext::new(ExecMode::Interpret);
        let child = ctx.with_cancellation();
        ctx.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_shared_sink() {
        let ctx = ExecContext::new(ExecMode::Interpret);
        let child = ctx.with_cancellation();
        child.emit("from child");
        ctx.emit("from parent");
        assert_eq!(ctx.take_output(), vec!["from child", "from parent"]);
        assert!(ctx.take_output().is_empty());
    }

    #[test]
    fn test_default_templates() {
        let ctx = ExecContext::new(ExecMode::Generate);
        assert_eq!(
            ctx.render_template("go_quote", &["a \"b\"".to_string()]).unwrap(),
            r#""a \"b\"""#
        );
        assert!(ctx.render_template("nope", &[]).is_err());
    }
}
