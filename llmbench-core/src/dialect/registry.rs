use std::collections::BTreeMap;
use std::sync::Arc;

use super::Dialect;
use super::openai::{self, OpenAiDialect};

pub type DialectFactory = fn() -> Arc<dyn Dialect>;

#[derive(Debug, thiserror::Error)]
#[error("unknown provider `{name}` (available: {available})")]
pub struct UnknownDialect {
    pub name: String,
    pub available: String,
}

/// Name to dialect constructor lookup, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct DialectRegistry {
    factories: BTreeMap<String, DialectFactory>,
}

impl DialectRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with every dialect shipped in this crate.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(openai::NAME, openai_dialect);
        registry
    }

    /// Register `factory` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: &str, factory: DialectFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Dialect>, UnknownDialect> {
        match self.factories.get(name) {
            Some(factory) => Ok(factory()),
            None => Err(UnknownDialect {
                name: name.to_string(),
                available: self.names().join(", "),
            }),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

fn openai_dialect() -> Arc<dyn Dialect> {
    Arc::new(OpenAiDialect)
}
