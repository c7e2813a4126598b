//! Decorator Arguments
//!
//! Keyword-then-positional argument resolution shared by all decorators: a
//! named match wins, otherwise the value falls back to the unnamed argument at
//! the decorator's positional index. Also home to the duration-literal parser
//! (`<int><unit>`, unit one of ns, µs, ms, s, m, h).

use std::time::Duration;

use crate::ast::{DecoratorArg, ValueExpr};
use crate::engine::context::ExecContext;
use crate::engine::errors::{EngineError, EngineResult};

/// Parse a duration literal such as `50ms` or `2h`.
pub fn parse_duration(text: &str) -> Result<Duration, String> {
    let trimmed = text.trim();
    let digits_end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{}' has no unit", trimmed))?;
    let (number, unit) = trimmed.split_at(digits_end);
    let value: u64 = number
        .parse()
        .map_err(|_| format!("duration '{}' has no integer value", trimmed))?;

    match unit {
        "ns" => Ok(Duration::from_nanos(value)),
        "µs" | "us" => Ok(Duration::from_micros(value)),
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        _ => Err(format!("duration '{}' has unknown unit '{}'", trimmed, unit)),
    }
}

/// Resolves a decorator's arguments by keyword, then by position.
pub struct ArgResolver<'a> {
    decorator: &'a str,
    args: &'a [DecoratorArg],
}

impl<'a> ArgResolver<'a> {
    pub fn new(decorator: &'a str, args: &'a [DecoratorArg]) -> Self {
        Self { decorator, args }
    }

    fn find(&self, name: &str, position: usize) -> Option<&'a ValueExpr> {
        if let Some(arg) = self.args.iter().find(|a| a.name.as_deref() == Some(name)) {
            return Some(&arg.value);
        }
        self.args
            .iter()
            .filter(|a| a.name.is_none())
            .nth(position)
            .map(|a| &a.value)
    }

    fn missing(&self, name: &str) -> EngineError {
        EngineError::MissingArgument {
            decorator: self.decorator.to_string(),
            argument: name.to_string(),
        }
    }

    fn type_error(&self, name: &str, expected: &str, value: &ValueExpr) -> EngineError {
        EngineError::ArgumentType {
            decorator: self.decorator.to_string(),
            argument: name.to_string(),
            expected: expected.to_string(),
            actual: value.type_name().to_string(),
        }
    }

    /// Resolve a value to text: identifiers read from the variable table,
    /// literals take their canonical form.
    fn as_text(&self, ctx: &ExecContext, value: &ValueExpr) -> EngineResult<String> {
        match value {
            ValueExpr::Identifier(id) => ctx.get(id).map(str::to_string),
            other => Ok(other.canonical()),
        }
    }

    pub fn required_string(
        &self,
        ctx: &ExecContext,
        name: &str,
        position: usize,
    ) -> EngineResult<String> {
        let value = self.find(name, position).ok_or_else(|| self.missing(name))?;
        self.as_text(ctx, value)
    }

    pub fn optional_string(
        &self,
        ctx: &ExecContext,
        name: &str,
        position: usize,
    ) -> EngineResult<Option<String>> {
        match self.find(name, position) {
            Some(value) => self.as_text(ctx, value).map(Some),
            None => Ok(None),
        }
    }

    /// The raw name carried by an identifier or string argument, without
    /// variable resolution. Used where the argument *names* a variable.
    pub fn required_name(&self, name: &str, position: usize) -> EngineResult<String> {
        let value = self.find(name, position).ok_or_else(|| self.missing(name))?;
        match value {
            ValueExpr::Identifier(id) => Ok(id.clone()),
            ValueExpr::String(s) => Ok(s.clone()),
            other => Err(self.type_error(name, "identifier", other)),
        }
    }

    pub fn required_duration(
        &self,
        ctx: &ExecContext,
        name: &str,
        position: usize,
    ) -> EngineResult<Duration> {
        let value = self.find(name, position).ok_or_else(|| self.missing(name))?;
        self.duration_of(ctx, name, value)
    }

    pub fn optional_duration(
        &self,
        ctx: &ExecContext,
        name: &str,
        position: usize,
    ) -> EngineResult<Option<Duration>> {
        match self.find(name, position) {
            Some(value) => self.duration_of(ctx, name, value).map(Some),
            None => Ok(None),
        }
    }

    fn duration_of(
        &self,
        ctx: &ExecContext,
        name: &str,
        value: &ValueExpr,
    ) -> EngineResult<Duration> {
        match value {
            ValueExpr::Duration(text) | ValueExpr::String(text) => {
                parse_duration(text).map_err(|_| self.type_error(name, "duration", value))
            }
            ValueExpr::Identifier(id) => {
                let text = ctx.get(id)?.to_string();
                parse_duration(&text).map_err(|_| self.type_error(name, "duration", value))
            }
            other => Err(self.type_error(name, "duration", other)),
        }
    }

    pub fn optional_u64(
        &self,
        ctx: &ExecContext,
        name: &str,
        position: usize,
    ) -> EngineResult<Option<u64>> {
        let value = match self.find(name, position) {
            Some(v) => v,
            None => return Ok(None),
        };
        match value {
            ValueExpr::Number(n) if n.fract() == 0.0 && *n >= 0.0 => Ok(Some(*n as u64)),
            ValueExpr::String(_) | ValueExpr::Identifier(_) => {
                let text = self.as_text(ctx, value)?;
                text.parse::<u64>()
                    .map(Some)
                    .map_err(|_| self.type_error(name, "integer", value))
            }
            other => Err(self.type_error(name, "integer", other)),
        }
    }

    pub fn optional_bool(
        &self,
        ctx: &ExecContext,
        name: &str,
        position: usize,
    ) -> EngineResult<Option<bool>> {
        let value = match self.find(name, position) {
            Some(v) => v,
            None => return Ok(None),
        };
        match value {
            ValueExpr::Bool(b) => Ok(Some(*b)),
            ValueExpr::String(_) | ValueExpr::Identifier(_) => {
                match self.as_text(ctx, value)?.as_str() {
                    "true" => Ok(Some(true)),
                    "false" => Ok(Some(false)),
                    _ => Err(self.type_error(name, "boolean", value)),
                }
            }
            other => Err(self.type_error(name, "boolean", other)),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::ExecMode;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("50ms").unwrap(), Duration::from_millis(50));
        assert_eq!(parse_duration("10ns").unwrap(), Duration::from_nanos(10));
        assert_eq!(parse_duration("3µs").unwrap(), Duration::from_micros(3));
        assert_eq!(parse_duration("3us").unwrap(), Duration::from_micros(3));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("ms").is_err());
    }

    #[test]
    fn test_keyword_wins_over_position() {
        let ctx = ExecContext::new(ExecMode::Interpret);
        let args = vec![
            DecoratorArg::positional(ValueExpr::String("positional".into())),
            DecoratorArg::named("target", ValueExpr::String("named".into())),
        ];
        let resolver = ArgResolver::new("test", &args);
        assert_eq!(resolver.required_string(&ctx, "target", 0).unwrap(), "named");
    }

    #[test]
    fn test_positional_fallback() {
        let ctx = ExecContext::new(ExecMode::Interpret);
        let args = vec![
            DecoratorArg::positional(ValueExpr::Duration("50ms".into())),
            DecoratorArg::positional(ValueExpr::Number(3.0)),
        ];
        let resolver = ArgResolver::new("test", &args);
        assert_eq!(
            resolver.required_duration(&ctx, "duration", 0).unwrap(),
            Duration::from_millis(50)
        );
        assert_eq!(resolver.optional_u64(&ctx, "attempts", 1).unwrap(), Some(3));
    }

    #[test]
    fn test_missing_required() {
        let ctx = ExecContext::new(ExecMode::Interpret);
        let resolver = ArgResolver::new("timeout", &[]);
        let err = resolver.required_duration(&ctx, "duration", 0).unwrap_err();
        assert_eq!(err.to_string(), "@timeout: missing required argument 'duration'");
    }

    #[test]
    fn test_type_mismatch() {
        let ctx = ExecContext::new(ExecMode::Interpret);
        let args = vec![DecoratorArg::positional(ValueExpr::Bool(true))];
        let resolver = ArgResolver::new("timeout", &args);
        let err = resolver.required_duration(&ctx, "duration", 0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "@timeout: argument 'duration' expects duration, got boolean"
        );
    }

    #[test]
    fn test_identifier_resolves_through_context() {
        let mut ctx = ExecContext::new(ExecMode::Interpret);
        ctx.set("WAIT", "2s");
        let args = vec![DecoratorArg::positional(ValueExpr::Identifier("WAIT".into()))];
        let resolver = ArgResolver::new("timeout", &args);
        assert_eq!(
            resolver.required_duration(&ctx, "duration", 0).unwrap(),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_required_name_keeps_identifier_raw() {
        let args = vec![DecoratorArg::positional(ValueExpr::Identifier("ENV".into()))];
        let resolver = ArgResolver::new("when", &args);
        assert_eq!(resolver.required_name("variable", 0).unwrap(), "ENV");
    }

    #[test]
    fn test_bool_from_text() {
        let ctx = ExecContext::new(ExecMode::Interpret);
        let args = vec![DecoratorArg::named("failOnFirstError", ValueExpr::String("true".into()))];
        let resolver = ArgResolver::new("parallel", &args);
        assert_eq!(resolver.optional_bool(&ctx, "failOnFirstError", 1).unwrap(), Some(true));
    }
}
