//! Abstract Syntax Tree (AST) Types
//!
//! This module defines the AST the execution engine consumes. Programs arrive
//! already parsed; the types here derive serde so an external front end can
//! hand them over as JSON.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// PROGRAM & DECLARATIONS
// =============================================================================

/// Root node: a complete program of variable declarations and commands.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    /// Top-level variable declarations, in source order
    #[serde(default)]
    pub variables: Vec<VariableDecl>,
    /// Lexically grouped variable declarations
    #[serde(default)]
    pub var_groups: Vec<VarGroup>,
    /// Command declarations, in source order
    #[serde(default)]
    pub commands: Vec<CommandDecl>,
}

impl Program {
    /// All variable declarations in evaluation order: top-level declarations
    /// first, then group members in group order.
    pub fn all_variables(&self) -> impl Iterator<Item = &VariableDecl> {
        self.variables
            .iter()
            .chain(self.var_groups.iter().flat_map(|g| g.variables.iter()))
    }
}

/// A named bundle of variable declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarGroup {
    pub name: String,
    pub variables: Vec<VariableDecl>,
}

/// A single variable declaration: name and value expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDecl {
    pub name: String,
    pub value: ValueExpr,
}

/// Value expression variants shared by variable declarations and decorator
/// arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ValueExpr {
    String(String),
    Number(f64),
    Bool(bool),
    /// Duration literal in the form `<int><unit>`, unit one of ns, µs, ms, s, m, h
    Duration(String),
    Identifier(String),
}

impl ValueExpr {
    /// Canonical string form used for variable storage: booleans become
    /// `true`/`false`, numbers their decimal text, durations and identifiers
    /// keep their literal text.
    pub fn canonical(&self) -> String {
        match self {
            ValueExpr::String(s) => s.clone(),
            ValueExpr::Number(n) => format_number(*n),
            ValueExpr::Bool(b) => b.to_string(),
            ValueExpr::Duration(d) => d.clone(),
            ValueExpr::Identifier(id) => id.clone(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ValueExpr::String(_) => "string",
            ValueExpr::Number(_) => "number",
            ValueExpr::Bool(_) => "boolean",
            ValueExpr::Duration(_) => "duration",
            ValueExpr::Identifier(_) => "identifier",
        }
    }
}

impl fmt::Display for ValueExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

// =============================================================================
// COMMANDS & CONTENT
// =============================================================================

/// How a command is meant to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// Foreground command that runs to completion
    #[default]
    Run,
    /// Long-running background command, supervised by the process registry
    /// in generated programs
    Watch,
}

/// A named command and its body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDecl {
    pub name: String,
    #[serde(default)]
    pub kind: CommandKind,
    pub body: Vec<CommandContent>,
}

/// Union of command content items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandContent {
    Shell(ShellContent),
    Block(BlockNode),
    Pattern(PatternNode),
}

/// Shell content: ordered parts assembled into a single command string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellContent {
    pub parts: Vec<ShellPart>,
}

/// One part of shell content: literal text or an embedded function decorator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShellPart {
    Text { text: String },
    Function(FunctionNode),
}

/// A function-decorator invocation, e.g. `@var(PORT)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionNode {
    pub name: String,
    #[serde(default)]
    pub args: Vec<DecoratorArg>,
}

/// A block-decorator invocation wrapping nested content,
/// e.g. `@retry(attempts=3) { ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockNode {
    pub name: String,
    #[serde(default)]
    pub args: Vec<DecoratorArg>,
    pub content: Vec<CommandContent>,
}

/// A pattern-decorator invocation with branches, e.g. `@when(ENV) { ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternNode {
    pub name: String,
    #[serde(default)]
    pub args: Vec<DecoratorArg>,
    pub branches: Vec<PatternBranch>,
}

/// One branch of a pattern decorator: a key and the content it guards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternBranch {
    pub pattern: String,
    pub commands: Vec<CommandContent>,
}

/// A decorator argument: optional keyword name plus a value expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoratorArg {
    #[serde(default)]
    pub name: Option<String>,
    pub value: ValueExpr,
}

impl DecoratorArg {
    pub fn positional(value: ValueExpr) -> Self {
        Self { name: None, value }
    }

    pub fn named(name: impl Into<String>, value: ValueExpr) -> Self {
        Self { name: Some(name.into()), value }
    }
}

// =============================================================================
// CONVENIENCE CONSTRUCTORS
// =============================================================================

impl ShellContent {
    /// Shell content consisting of a single literal string.
    pub fn literal(text: impl Into<String>) -> Self {
        Self { parts: vec![ShellPart::Text { text: text.into() }] }
    }
}

impl CommandContent {
    pub fn shell(text: impl Into<String>) -> Self {
        CommandContent::Shell(ShellContent::literal(text))
    }
}

// ============================================================================
// Tests
// ============================================================================
