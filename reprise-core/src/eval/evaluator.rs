//! Evaluator trait

use serde_json::Value;

use crate::conversation::Action;
use crate::error::Result;
use crate::metrics::Scores;

/// Metric substituted for an evaluator that failed
pub const EVALUATION_ERROR_METRIC: &str = "evaluation_error";

/// Scores recorded in place of a failed evaluator's result
pub fn evaluation_error_scores() -> Scores {
    Scores::from([(EVALUATION_ERROR_METRIC.to_string(), 1.0)])
}

/// Scores one conversation.
///
/// Implementations should not fail under expected inputs. Callers still
/// isolate every evaluator, so an `Err` (or a panic) only costs that
/// evaluator's contribution.
pub trait Evaluator: Send + Sync {
    /// Stable name, also the registry key
    fn name(&self) -> &'static str;

    /// Score `actions`, ordered ascending by insertion time
    fn evaluate(
        &self,
        actions: &[Action],
        agent_config: Option<&Value>,
        agent_tools_config: Option<&[Value]>,
    ) -> Result<Scores>;
}
