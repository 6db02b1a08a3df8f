//! Reprise CLI - replay recorded agent conversations and compare the results

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reprise_core::comparison::Assessment;
use reprise_core::config::RepriseConfig;
use reprise_core::eval::list_available_evaluators;
use reprise_core::platform::{AgentPlatform, HttpPlatform};
use reprise_core::replay::{retrigger_failed_conversations, DEFAULT_RETRIGGER_PAUSE_SECS};
use reprise_core::runner::{TestCase, TestOutcome, TestRunner, TestSuite};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "reprise")]
#[command(about = "Record-and-replay regression testing for conversational agents", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file; defaults to reprise.toml plus REPRISE_* variables
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay one recorded conversation
    Run {
        /// Agent under test
        #[arg(short, long)]
        agent_id: String,
        /// Recorded conversation to replay
        #[arg(short = 'C', long)]
        conversation_id: String,
        /// Test name; defaults to sim_of_{conversation_id}
        #[arg(short, long)]
        name: Option<String>,
        /// Evaluator to run, repeatable; defaults to the configured list
        #[arg(short, long = "evaluator")]
        evaluators: Vec<String>,
        /// Exit with status 1 when the replay regressed
        #[arg(long)]
        fail_on_regression: bool,
    },
    /// Run every test of a YAML or JSON suite
    Suite {
        /// Suite file
        path: PathBuf,
        /// Exit with status 1 when any replay regressed
        #[arg(long)]
        fail_on_regression: bool,
    },
    /// Print the simulation config derived from a recorded conversation
    Simulate {
        /// Agent that owns the conversation
        #[arg(short, long)]
        agent_id: String,
        /// Recorded conversation
        #[arg(short = 'C', long)]
        conversation_id: String,
    },
    /// List an agent's failed conversations, optionally re-running them
    Failures {
        /// Agent to inspect
        #[arg(short, long)]
        agent_id: String,
        /// Only conversations where this tool failed
        #[arg(short, long)]
        tool_id: Option<String>,
        /// Regenerate each conversation from before its last failed tool run
        #[arg(long)]
        retrigger: bool,
        /// Seconds to wait between regenerate requests
        #[arg(long, default_value_t = DEFAULT_RETRIGGER_PAUSE_SECS)]
        pause_secs: u64,
    },
    /// List available evaluators
    Evaluators,
    /// Version information
    Version,
}

fn load_config(path: Option<&PathBuf>) -> Result<RepriseConfig> {
    let config = match path {
        Some(path) => RepriseConfig::from_file(path),
        None => RepriseConfig::load(),
    };
    config.context("failed to load configuration")
}

fn build_runner(config: &RepriseConfig) -> Result<(Arc<HttpPlatform>, TestRunner)> {
    let platform = Arc::new(
        HttpPlatform::from_config(&config.platform).context("failed to build platform client")?,
    );
    let runner = TestRunner::from_config(platform.clone(), config);
    Ok((platform, runner))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn regressed(outcomes: &[TestOutcome]) -> bool {
    outcomes
        .iter()
        .filter_map(TestOutcome::report)
        .any(|report| report.assessment() == Some(Assessment::Regression))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("reprise {}", env!("CARGO_PKG_VERSION"));
            println!("reprise-core {}", reprise_core::VERSION);
        }
        Commands::Evaluators => {
            for name in list_available_evaluators() {
                println!("{}", name);
            }
        }
        Commands::Run {
            agent_id,
            conversation_id,
            name,
            evaluators,
            fail_on_regression,
        } => {
            let config = load_config(cli.config.as_ref())?;
            let (_, runner) = build_runner(&config)?;

            let mut case = TestCase::new(agent_id, conversation_id).with_evaluators(evaluators);
            if let Some(name) = name {
                case = case.with_name(name);
            }

            let outcome = runner.run_test(&case).await?;
            print_json(&outcome)?;
            if fail_on_regression && regressed(std::slice::from_ref(&outcome)) {
                std::process::exit(1);
            }
        }
        Commands::Suite {
            path,
            fail_on_regression,
        } => {
            let config = load_config(cli.config.as_ref())?;
            let suite = TestSuite::load(&path)
                .with_context(|| format!("failed to load suite {}", path.display()))?;
            let (_, runner) = build_runner(&config)?;

            tracing::info!(suite = ?suite.name, tests = suite.tests.len(), "Running suite");
            let outcomes = runner.run_suite(&suite).await?;
            print_json(&outcomes)?;
            if fail_on_regression && regressed(&outcomes) {
                std::process::exit(1);
            }
        }
        Commands::Simulate {
            agent_id,
            conversation_id,
        } => {
            let config = load_config(cli.config.as_ref())?;
            let (_, runner) = build_runner(&config)?;

            let data = runner.get_data(&agent_id, &conversation_id).await?;
            let build = runner.build_simulation(&data, None);
            let skipped: Vec<_> = build
                .skipped
                .iter()
                .map(|run| json!({"item_id": run.item_id, "reason": run.reason}))
                .collect();

            print_json(&json!({
                "trigger_message": data.trigger_message.text,
                "simulation": build.config.to_value()?,
                "skipped_tool_runs": skipped,
            }))?;
        }
        Commands::Failures {
            agent_id,
            tool_id,
            retrigger,
            pause_secs,
        } => {
            let config = load_config(cli.config.as_ref())?;
            let (platform, _) = build_runner(&config)?;

            if retrigger {
                let outcomes = retrigger_failed_conversations(
                    &*platform,
                    &agent_id,
                    tool_id.as_deref(),
                    Duration::from_secs(pause_secs),
                )
                .await?;
                print_json(&outcomes)?;
            } else {
                let failed = match tool_id {
                    Some(tool_id) => {
                        platform
                            .failed_conversations_for_tool(&agent_id, &tool_id)
                            .await?
                    }
                    None => platform.failed_conversations(&agent_id).await?,
                };
                print_json(&failed)?;
            }
        }
    }

    Ok(())
}
