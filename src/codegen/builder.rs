//! Code Builder
//!
//! Small text-building helpers for the Go backend: an indentation-aware line
//! writer plus quoting and duration formatting for emitted expressions.

use std::time::Duration;

/// Indentation-aware source text builder. Go convention: one tab per level.
#[derive(Debug, Default)]
pub struct CodeBuilder {
    buf: String,
    indent: usize,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        let text = text.as_ref();
        if text.is_empty() {
            self.buf.push('\n');
        } else {
            for _ in 0..self.indent {
                self.buf.push('\t');
            }
            self.buf.push_str(text);
            self.buf.push('\n');
        }
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.buf.push('\n');
        self
    }

    /// Write a multi-line block, applying the current indent to each
    /// non-empty line.
    pub fn block(&mut self, text: &str) -> &mut Self {
        for line in text.lines() {
            self.line(line);
        }
        self
    }

    pub fn indent(&mut self) -> &mut Self {
        self.indent += 1;
        self
    }

    pub fn dedent(&mut self) -> &mut Self {
        self.indent = self.indent.saturating_sub(1);
        self
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

/// Quote a string as a Go string literal.
pub fn go_quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Format a duration as a Go `time.Duration` expression, using the coarsest
/// unit that divides it evenly.
pub fn go_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0 * time.Second".to_string();
    }
    if nanos % 1_000_000_000 == 0 {
        format!("{} * time.Second", nanos / 1_000_000_000)
    } else if nanos % 1_000_000 == 0 {
        format!("{} * time.Millisecond", nanos / 1_000_000)
    } else if nanos % 1_000 == 0 {
        format!("{} * time.Microsecond", nanos / 1_000)
    } else {
        format!("{} * time.Nanosecond", nanos)
    }
}

/// Prefix every non-empty line of `text` with `levels` tabs.
pub fn indent_block(text: &str, levels: usize) -> String {
    let prefix = "\t".repeat(levels);
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        if !line.is_empty() {
            out.push_str(&prefix);
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}

// ============================================================================
// Tests
// ============================================================================
