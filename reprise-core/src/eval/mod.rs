//! Conversation evaluators
//!
//! An [`Evaluator`] scores one conversation log, optionally with the agent's
//! configuration, and returns a flat mapping of metric name to score.
//! Evaluators are plain data-free strategies; the [`EvaluatorRegistry`] maps
//! names to constructors and is populated once, at first use.
//!
//! # Example
//!
//! ```rust,ignore
//! use reprise_core::eval::{load_evaluator, list_available_evaluators};
//!
//! for name in list_available_evaluators() {
//!     let evaluator = load_evaluator(&name)?;
//!     let scores = evaluator.evaluate(&actions, agent_config.as_ref(), None)?;
//!     println!("{name}: {scores:?}");
//! }
//! ```

mod agent_procedure;
mod evaluator;
mod hallucination;
mod registry;
mod safety;
mod setup;
mod tool_calling;

pub use agent_procedure::AgentProcedureEvaluator;
pub use evaluator::{evaluation_error_scores, Evaluator, EVALUATION_ERROR_METRIC};
pub use hallucination::HallucinationEvaluator;
pub use registry::{
    list_available_evaluators, load_evaluator, EvaluatorConstructor, EvaluatorRegistry,
};
pub use safety::SafetyEvaluator;
pub use setup::SetupEvaluator;
pub use tool_calling::ToolCallingEvaluator;
