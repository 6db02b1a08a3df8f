//! Configuration types for Reprise

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::{RepriseError, Result};
use crate::eval::EvaluatorRegistry;
use crate::replay::PollingConfig;
use crate::runner::DEFAULT_EVALUATORS;
use crate::simulation::UnrunToolPolicy;

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE: &str = "reprise.toml";

/// Environment variable naming an additional configuration file
pub const CONFIG_PATH_ENV: &str = "REPRISE_CONFIG_PATH";

/// Prefix of environment overrides; nested keys are separated by `__`
pub const ENV_PREFIX: &str = "REPRISE_";

/// Main configuration for the replay harness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepriseConfig {
    /// Vendor platform access
    pub platform: PlatformConfig,

    /// Replay polling budget
    pub polling: PollingConfig,

    /// Simulation building
    pub simulation: SimulationSettings,

    /// Evaluators for tests that do not list their own
    pub evaluators: Vec<String>,
}

impl Default for RepriseConfig {
    fn default() -> Self {
        Self {
            platform: PlatformConfig::default(),
            polling: PollingConfig::default(),
            simulation: SimulationSettings::default(),
            evaluators: DEFAULT_EVALUATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Vendor platform configuration
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Region identifier, part of the default base URL
    pub region_id: String,

    /// Project identifier
    pub project_id: String,

    /// API key; usually supplied through `REPRISE_PLATFORM__API_KEY`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Per-request HTTP timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            region_id: String::new(),
            project_id: String::new(),
            api_key: None,
            base_url: None,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("region_id", &self.region_id)
            .field("project_id", &self.project_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Simulation building settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// How tools that never ran in the original conversation behave
    pub unrun_tools: UnrunToolPolicy,
}

impl RepriseConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. `reprise.toml` in the working directory
    /// 3. The file named by `REPRISE_CONFIG_PATH`
    /// 4. `REPRISE_`-prefixed environment variables, e.g. `REPRISE_POLLING__MAX_ATTEMPTS`
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration source is malformed or the
    /// result fails validation.
    pub fn load() -> Result<Self> {
        let mut figment = Figment::new().merge(Toml::file(CONFIG_FILE));

        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            figment = figment.merge(Toml::file(path));
        }

        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RepriseError::Configuration(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }
        Self::extract(Figment::new().merge(Toml::file(path)))
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: RepriseConfig = figment.extract().map_err(|e| {
            RepriseError::Configuration(format!("Failed to load configuration: {}", e))
        })?;

        config.validate()?;
        tracing::debug!(?config, "Loaded configuration");
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty polling budget or an evaluator name
    /// the built-in registry does not know.
    pub fn validate(&self) -> Result<()> {
        if self.polling.max_attempts == 0 {
            return Err(RepriseError::Configuration(
                "polling.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.polling.interval.is_zero() {
            return Err(RepriseError::Configuration(
                "polling.interval must be positive".to_string(),
            ));
        }

        let registry = EvaluatorRegistry::global();
        if let Some(unknown) = self.evaluators.iter().find(|name| !registry.contains(name)) {
            return Err(RepriseError::Configuration(format!(
                "unknown evaluator '{}' (available: {})",
                unknown,
                registry.names().join(", ")
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = RepriseConfig::default();
        assert_eq!(config.polling.interval, Duration::from_secs(60));
        assert_eq!(config.polling.max_attempts, 12);
        assert_eq!(config.platform.request_timeout, Duration::from_secs(60));
        assert_eq!(config.simulation.unrun_tools, UnrunToolPolicy::PassThrough);
        assert_eq!(config.evaluators, vec!["Setup", "ToolCalling", "AgentProcedure"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_merges_over_defaults() {
        let file = write_config(
            r#"
evaluators = ["Safety", "Hallucination"]

[platform]
region_id = "eu"
project_id = "proj-7"
request_timeout = "15s"

[polling]
interval = "5s"

[simulation]
unrun_tools = "fail_closed"
"#,
        );

        let config = RepriseConfig::from_file(file.path()).unwrap();
        assert_eq!(config.platform.region_id, "eu");
        assert_eq!(config.platform.project_id, "proj-7");
        assert!(config.platform.api_key.is_none());
        assert_eq!(config.platform.request_timeout, Duration::from_secs(15));
        assert_eq!(config.polling.interval, Duration::from_secs(5));
        assert_eq!(config.polling.max_attempts, 12);
        assert_eq!(config.simulation.unrun_tools, UnrunToolPolicy::FailClosed);
        assert_eq!(config.evaluators, vec!["Safety", "Hallucination"]);
    }

    #[test]
    fn test_rejects_unknown_evaluator() {
        let file = write_config(r#"evaluators = ["Setup", "Vibes"]"#);
        match RepriseConfig::from_file(file.path()) {
            Err(RepriseError::Configuration(message)) => assert!(message.contains("Vibes")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_empty_polling_budget() {
        let file = write_config("[polling]\nmax_attempts = 0\n");
        assert!(RepriseConfig::from_file(file.path()).is_err());

        let mut config = RepriseConfig::default();
        config.polling.interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RepriseConfig::from_file(dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = PlatformConfig {
            api_key: Some("secret-key".to_string()),
            ..PlatformConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-key"));
        assert!(rendered.contains("<redacted>"));
    }
}
