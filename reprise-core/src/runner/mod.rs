//! End-to-end replay tests
//!
//! A [`TestRunner`] loads a recorded conversation, pins its tool outputs,
//! replays it, scores both runs and compares them.
//!
//! # Example
//!
//! ```rust,ignore
//! use reprise_core::runner::{TestCase, TestRunner, TestSuite};
//!
//! let runner = TestRunner::new(platform);
//! let suite = TestSuite::load("suites/regressions.yaml")?;
//! for outcome in runner.run_suite(&suite).await? {
//!     println!("{}: {:?}", outcome.test_name(), outcome.report().and_then(|r| r.assessment()));
//! }
//! ```

mod case;
mod executor;
mod report;

pub use case::{TestCase, TestSuite};
pub use executor::{
    TestData, TestRunner, DEFAULT_EVALUATORS, FRAMEWORK_EVALUATOR, RUN_STATUS_METRIC,
};
pub use report::{ReplayFailure, ReplayFailureKind, TestOutcome, TestReport};

#[cfg(test)]
mod tests;
