pub mod builder;
pub mod imports;
pub mod runtime;
pub mod scaffold;

pub use builder::{go_duration, go_quote, indent_block, CodeBuilder};
pub use imports::{render_import_block, render_manifest};
pub use scaffold::{render_main, CommandBlock, ProgramParts};
