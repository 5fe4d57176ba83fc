//! # External Stage Runner
//!
//! Produces a facts document per scenario by running the project's two
//! external programs.
//!
//! ```text
//!   sh -c <instrumentation>          USERSIM_PATH / USERSIM_SCENARIO set
//!        │ stdout: metrics document   (validated)
//!        ▼
//!   sh -c <perceptions>              metrics on stdin
//!        │ stdout: facts document, or a bare facts object
//!        ▼
//!   FactsDocument
//! ```
//!
//! Scenarios run concurrently, at most `jobs` at a time. Each stage is
//! killed when it exceeds the timeout. A failing scenario yields an error
//! outcome and never stops the others. Outcomes come back sorted by
//! scenario name.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::{ProjectConfig, ScenarioSpec};
use crate::error::UsersimError;
use crate::schema::{FactsDocument, MetricsDocument};
use crate::Result;

/// Scenario name variable passed to both stages.
pub const PATH_VAR: &str = "USERSIM_PATH";

/// Alias of [`PATH_VAR`] for older instrumentation scripts.
pub const SCENARIO_VAR: &str = "USERSIM_SCENARIO";

/// Stderr kept in stage error messages.
const STDERR_EXCERPT: usize = 400;

/// Result of running one scenario's stages.
#[derive(Debug)]
pub struct ScenarioRun {
    pub name: String,
    pub outcome: Result<FactsDocument>,
}

/// Runs instrumentation and perceptions.
#[derive(Debug, Clone)]
pub struct PipelineRunner {
    instrumentation: String,
    perceptions: String,
    working_dir: PathBuf,
    timeout: Duration,
    jobs: usize,
}

impl PipelineRunner {
    pub fn new(instrumentation: impl Into<String>, perceptions: impl Into<String>) -> Self {
        Self {
            instrumentation: instrumentation.into(),
            perceptions: perceptions.into(),
            working_dir: PathBuf::from("."),
            timeout: Duration::from_secs(120),
            jobs: 4,
        }
    }

    /// Builds a runner from the project config.
    ///
    /// # Errors
    ///
    /// Returns a config error if either command is missing.
    pub fn from_config(config: &ProjectConfig) -> Result<Self> {
        let instrumentation = config
            .instrumentation
            .clone()
            .ok_or_else(|| UsersimError::Config("no instrumentation command in config".into()))?;
        let perceptions = config
            .perceptions
            .clone()
            .ok_or_else(|| UsersimError::Config("no perceptions command in config".into()))?;
        Ok(Self::new(instrumentation, perceptions)
            .with_working_dir(config.base_dir.clone())
            .with_timeout(Duration::from_secs(config.timeout_secs))
            .with_jobs(config.jobs))
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Runs every scenario, `jobs` at a time.
    pub async fn run_all(&self, scenarios: &[ScenarioSpec]) -> Vec<ScenarioRun> {
        let permits = Arc::new(Semaphore::new(self.jobs));
        let mut tasks = JoinSet::new();
        for (index, spec) in scenarios.iter().enumerate() {
            let runner = self.clone();
            let spec = spec.clone();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let name = spec.name().to_string();
                let outcome = match permits.acquire_owned().await {
                    Ok(_permit) => runner.run_scenario(&spec).await,
                    Err(e) => Err(UsersimError::Stage {
                        scenario: name.clone(),
                        stage: "scheduler",
                        message: e.to_string(),
                    }),
                };
                (index, ScenarioRun { name, outcome })
            });
        }

        let names: Vec<String> = scenarios.iter().map(|s| s.name().to_string()).collect();
        let mut runs = join_runs(tasks, &names).await;
        runs.sort_by(|a, b| a.name.cmp(&b.name));
        info!("Pipeline finished {} scenario(s)", runs.len());
        runs
    }

    /// Runs both stages for one scenario.
    pub async fn run_scenario(&self, spec: &ScenarioSpec) -> Result<FactsDocument> {
        let name = spec.name();
        debug!("Running scenario '{}'", name);

        let stdout = self
            .run_stage(name, "instrumentation", &self.instrumentation, spec, None)
            .await?;
        let metrics: Value = serde_json::from_slice(&stdout).map_err(|e| UsersimError::Stage {
            scenario: name.to_string(),
            stage: "instrumentation",
            message: format!("output is not JSON: {e}"),
        })?;
        let metrics = MetricsDocument::from_value(metrics, "metrics document")?;
        debug!("Scenario '{}': {} metric(s)", name, metrics.metrics.len());

        let input = serde_json::to_vec(&metrics)?;
        let stdout = self
            .run_stage(name, "perceptions", &self.perceptions, spec, Some(input))
            .await?;
        let facts: Value = serde_json::from_slice(&stdout).map_err(|e| UsersimError::Stage {
            scenario: name.to_string(),
            stage: "perceptions",
            message: format!("output is not JSON: {e}"),
        })?;
        let doc = FactsDocument::from_stage_output(facts, name, "perceptions output")?;
        debug!("Scenario '{}': {} fact(s)", name, doc.facts.len());
        Ok(doc)
    }

    async fn run_stage(
        &self,
        scenario: &str,
        stage: &'static str,
        command: &str,
        spec: &ScenarioSpec,
        input: Option<Vec<u8>>,
    ) -> Result<Vec<u8>> {
        let stage_error = |message: String| UsersimError::Stage {
            scenario: scenario.to_string(),
            stage,
            message,
        };

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(&self.working_dir)
            .env(PATH_VAR, scenario)
            .env(SCENARIO_VAR, scenario)
            .envs(spec.env())
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| stage_error(format!("could not start: {e}")))?;

        // Stdin is fed while stdout and stderr drain. A stage may exit
        // without reading all of its input.
        let stdin = child.stdin.take();
        let feed = async move {
            if let (Some(bytes), Some(mut stdin)) = (input, stdin) {
                match stdin.write_all(&bytes).await {
                    Err(e) if e.kind() != ErrorKind::BrokenPipe => return Err(e),
                    _ => {}
                }
            }
            Ok(())
        };
        let run = async move { tokio::join!(feed, child.wait_with_output()) };

        let output = match timeout(self.timeout, run).await {
            Ok((_, Err(e))) => return Err(stage_error(format!("failed: {e}"))),
            Ok((Err(e), Ok(_))) => return Err(stage_error(format!("could not write stdin: {e}"))),
            Ok((Ok(()), Ok(output))) => output,
            Err(_) => {
                return Err(stage_error(format!(
                    "timed out after {} seconds",
                    self.timeout.as_secs()
                )))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let excerpt: String = stderr.trim().chars().take(STDERR_EXCERPT).collect();
            return Err(stage_error(format!("{}: {}", output.status, excerpt)));
        }
        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Err(stage_error("produced no output".to_string()));
        }
        Ok(output.stdout)
    }
}

/// Collects finished scenario tasks in scenario order. A task that panicked
/// or was cancelled still yields a run, with a scheduler error.
async fn join_runs(
    mut tasks: JoinSet<(usize, ScenarioRun)>,
    names: &[String],
) -> Vec<ScenarioRun> {
    let mut slots: Vec<Option<ScenarioRun>> = names.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, run)) => {
                if let Some(slot) = slots.get_mut(index) {
                    *slot = Some(run);
                }
            }
            Err(e) => warn!("Scenario task aborted: {}", e),
        }
    }
    names
        .iter()
        .zip(slots)
        .map(|(name, slot)| {
            slot.unwrap_or_else(|| ScenarioRun {
                name: name.clone(),
                outcome: Err(UsersimError::Stage {
                    scenario: name.clone(),
                    stage: "scheduler",
                    message: "scenario task panicked or was cancelled".to_string(),
                }),
            })
        })
        .collect()
}
