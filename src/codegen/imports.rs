//! Import & Manifest Rendering
//!
//! Renders the collected import sets as a Go import block (standard library
//! group first, third-party group second, both sorted) and the module
//! manifest (`go.mod`) with one require line per collected module.

use crate::codegen::builder::CodeBuilder;
use crate::decorators::ImportRequirements;

pub const GENERATED_MODULE: &str = "devcmd-generated";
pub const GO_VERSION: &str = "1.22";

/// Render the import block. Empty requirements render nothing.
pub fn render_import_block(imports: &ImportRequirements) -> String {
    if imports.stdlib.is_empty() && imports.third_party.is_empty() {
        return String::new();
    }

    let mut b = CodeBuilder::new();
    b.line("import (").indent();
    for pkg in &imports.stdlib {
        b.line(format!("\"{}\"", pkg));
    }
    if !imports.stdlib.is_empty() && !imports.third_party.is_empty() {
        b.blank();
    }
    for pkg in &imports.third_party {
        b.line(format!("\"{}\"", pkg));
    }
    b.dedent().line(")");
    b.finish()
}

/// Render the `go.mod` manifest for the generated program.
pub fn render_manifest(imports: &ImportRequirements) -> String {
    let mut b = CodeBuilder::new();
    b.line(format!("module {}", GENERATED_MODULE));
    b.blank();
    b.line(format!("go {}", GO_VERSION));
    if !imports.modules.is_empty() {
        b.blank();
        for (module, version) in &imports.modules {
            b.line(format!("require {} {}", module, version));
        }
    }
    b.finish()
}

// ============================================================================
// Tests
// ============================================================================
