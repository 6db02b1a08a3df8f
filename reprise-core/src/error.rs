//! Error types for Reprise operations

/// Result type for Reprise operations
pub type Result<T> = std::result::Result<T, RepriseError>;

/// Error types for the replay harness
#[derive(Debug, thiserror::Error)]
pub enum RepriseError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Original conversation data could not be resolved
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// Vendor transport or application failure
    #[error("Platform error: {0}")]
    Platform(String),

    /// Vendor returned a non-success HTTP status
    #[error("Platform returned {status}: {body}")]
    PlatformStatus {
        /// HTTP status code
        status: u16,
        /// Response body as text
        body: String,
    },

    /// Replay orchestration misuse
    #[error("Replay error: {0}")]
    Replay(String),

    /// An evaluator failed to score a conversation
    #[error("Evaluation error in {evaluator}: {message}")]
    Evaluation {
        /// Evaluator name
        evaluator: String,
        /// Failure description
        message: String,
    },

    /// Evaluator name missing from the registry
    #[error("Unknown evaluator: {0}")]
    UnknownEvaluator(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl RepriseError {
    /// Build an evaluation error for the named evaluator
    pub fn evaluation(evaluator: impl Into<String>, message: impl Into<String>) -> Self {
        RepriseError::Evaluation {
            evaluator: evaluator.into(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for RepriseError {
    fn from(err: reqwest::Error) -> Self {
        RepriseError::Platform(err.to_string())
    }
}

impl From<String> for RepriseError {
    fn from(s: String) -> Self {
        RepriseError::Other(s)
    }
}

impl From<&str> for RepriseError {
    fn from(s: &str) -> Self {
        RepriseError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for RepriseError {
    fn from(err: anyhow::Error) -> Self {
        RepriseError::Other(err.to_string())
    }
}
