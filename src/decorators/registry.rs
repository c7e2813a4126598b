//! Decorator Registry
//!
//! Name → decorator lookup per kind. The registry is built at construction
//! time and threaded through the engine, so alternate decorator sets can
//! coexist (and tests can install doubles).

use std::collections::HashMap;
use std::sync::Arc;

use crate::decorators::env::EnvDecorator;
use crate::decorators::parallel::ParallelDecorator;
use crate::decorators::retry::RetryDecorator;
use crate::decorators::timeout::TimeoutDecorator;
use crate::decorators::try_catch::TryDecorator;
use crate::decorators::types::{
    BlockDecorator, DecoratorKind, FunctionDecorator, PatternDecorator,
};
use crate::decorators::var::VarDecorator;
use crate::decorators::when::WhenDecorator;
use crate::engine::errors::{EngineError, EngineResult};

#[derive(Default)]
pub struct DecoratorRegistry {
    functions: HashMap<String, Arc<dyn FunctionDecorator>>,
    blocks: HashMap<String, Arc<dyn BlockDecorator>>,
    patterns: HashMap<String, Arc<dyn PatternDecorator>>,
}

impl DecoratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the seven built-in decorators installed.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register_function(Arc::new(VarDecorator));
        reg.register_function(Arc::new(EnvDecorator));
        reg.register_block(Arc::new(TimeoutDecorator));
        reg.register_block(Arc::new(RetryDecorator));
        reg.register_block(Arc::new(ParallelDecorator));
        reg.register_pattern(Arc::new(WhenDecorator));
        reg.register_pattern(Arc::new(TryDecorator));
        reg
    }

    pub fn register_function(&mut self, d: Arc<dyn FunctionDecorator>) {
        self.functions.insert(d.name().to_string(), d);
    }

    pub fn register_block(&mut self, d: Arc<dyn BlockDecorator>) {
        self.blocks.insert(d.name().to_string(), d);
    }

    pub fn register_pattern(&mut self, d: Arc<dyn PatternDecorator>) {
        self.patterns.insert(d.name().to_string(), d);
    }

    pub fn function(&self, name: &str) -> EngineResult<Arc<dyn FunctionDecorator>> {
        if let Some(d) = self.functions.get(name) {
            return Ok(d.clone());
        }
        Err(self.resolution_error(name, DecoratorKind::Function))
    }

    pub fn block(&self, name: &str) -> EngineResult<Arc<dyn BlockDecorator>> {
        if let Some(d) = self.blocks.get(name) {
            return Ok(d.clone());
        }
        Err(self.resolution_error(name, DecoratorKind::Block))
    }

    pub fn pattern(&self, name: &str) -> EngineResult<Arc<dyn PatternDecorator>> {
        if let Some(d) = self.patterns.get(name) {
            return Ok(d.clone());
        }
        Err(self.resolution_error(name, DecoratorKind::Pattern))
    }

    /// The kind a name is actually registered under, if any.
    fn kind_of(&self, name: &str) -> Option<DecoratorKind> {
        if self.functions.contains_key(name) {
            Some(DecoratorKind::Function)
        } else if self.blocks.contains_key(name) {
            Some(DecoratorKind::Block)
        } else if self.patterns.contains_key(name) {
            Some(DecoratorKind::Pattern)
        } else {
            None
        }
    }

    fn resolution_error(&self, name: &str, expected: DecoratorKind) -> EngineError {
        match self.kind_of(name) {
            Some(actual) => EngineError::WrongDecoratorKind {
                name: name.to_string(),
                actual,
                expected,
            },
            None => EngineError::UnknownDecorator { kind: expected, name: name.to_string() },
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
