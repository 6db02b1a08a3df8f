//! Name to constructor registry for evaluators

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

use super::{
    AgentProcedureEvaluator, Evaluator, HallucinationEvaluator, SafetyEvaluator, SetupEvaluator,
    ToolCallingEvaluator,
};
use crate::error::{RepriseError, Result};

/// Builds a fresh evaluator instance
pub type EvaluatorConstructor = fn() -> Box<dyn Evaluator>;

static BUILTIN: Lazy<EvaluatorRegistry> = Lazy::new(EvaluatorRegistry::builtin);

/// Explicit evaluator registry.
///
/// Names are sorted, so listing order is stable.
#[derive(Clone, Default)]
pub struct EvaluatorRegistry {
    constructors: BTreeMap<String, EvaluatorConstructor>,
}

impl EvaluatorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in evaluators
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("Setup", || Box::new(SetupEvaluator));
        registry.register("ToolCalling", || Box::new(ToolCallingEvaluator));
        registry.register("AgentProcedure", || Box::new(AgentProcedureEvaluator));
        registry.register("Hallucination", || Box::new(HallucinationEvaluator));
        registry.register("Safety", || Box::new(SafetyEvaluator));
        registry
    }

    /// Shared instance of [`EvaluatorRegistry::builtin`]
    pub fn global() -> &'static Self {
        &BUILTIN
    }

    /// Register a constructor, returning the one it replaced
    pub fn register(
        &mut self,
        name: impl Into<String>,
        constructor: EvaluatorConstructor,
    ) -> Option<EvaluatorConstructor> {
        self.constructors.insert(name.into(), constructor)
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Instantiate the evaluator registered under `name`
    pub fn load(&self, name: &str) -> Result<Box<dyn Evaluator>> {
        self.constructors
            .get(name)
            .map(|constructor| constructor())
            .ok_or_else(|| RepriseError::UnknownEvaluator(name.to_string()))
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }
}

impl std::fmt::Debug for EvaluatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluatorRegistry")
            .field("evaluators", &self.names())
            .finish()
    }
}

/// Instantiate a built-in evaluator by name
pub fn load_evaluator(name: &str) -> Result<Box<dyn Evaluator>> {
    EvaluatorRegistry::global().load(name)
}

/// Names of the built-in evaluators, sorted
pub fn list_available_evaluators() -> Vec<String> {
    EvaluatorRegistry::global().names()
}
