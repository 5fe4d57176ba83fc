//! Project configuration (`usersim.yaml`).
//!
//! ```yaml
//! instrumentation: ./instrument.sh
//! perceptions: ./perceptions
//! users: [users/]
//! paths:
//!   - normal_run
//!   - name: high_load
//!     env: { LOAD: "500" }
//! timeout_secs: 120
//! jobs: 4
//! output:
//!   results: results.json
//! engine:
//!   sentinel: -1
//!   model_search: true
//!   search_budget: 4096
//!   effective_tests: { base: 4, max_arity: 8 }
//! ```
//!
//! Every field has a default. Relative paths resolve against the directory
//! holding the config file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use usersim_expr::{DEFAULT_SEARCH_BUDGET, DEFAULT_SENTINEL};
use usersim_judge::EffectiveTestWeights;

use crate::error::UsersimError;
use crate::Result;

/// Default config file name.
pub const CONFIG_FILE: &str = "usersim.yaml";

/// Top-level project configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Shell command producing a metrics document on stdout.
    pub instrumentation: Option<String>,

    /// Command reading metrics on stdin and writing facts on stdout.
    pub perceptions: Option<String>,

    /// Persona files or directories.
    pub users: Vec<PathBuf>,

    /// Scenarios to run.
    pub paths: Vec<ScenarioSpec>,

    /// Per-stage subprocess timeout.
    pub timeout_secs: u64,

    /// Scenarios run concurrently.
    pub jobs: usize,

    pub output: OutputConfig,

    pub engine: EngineConfig,

    /// Directory relative paths resolve against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            instrumentation: None,
            perceptions: None,
            users: Vec::new(),
            paths: vec![ScenarioSpec::Name("default".to_string())],
            timeout_secs: 120,
            jobs: 4,
            output: OutputConfig::default(),
            engine: EngineConfig::default(),
            base_dir: PathBuf::from("."),
        }
    }
}

impl ProjectConfig {
    /// Loads and validates a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| UsersimError::io(path, e))?;
        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        Self::from_yaml_str(&text, base_dir)
    }

    pub fn from_yaml_str(text: &str, base_dir: &Path) -> Result<Self> {
        // An empty file deserializes as null.
        let mut config: ProjectConfig = if text.trim().is_empty() {
            ProjectConfig::default()
        } else {
            serde_yaml::from_str(text)?
        };
        config.base_dir = base_dir.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.jobs == 0 {
            return Err(UsersimError::Config("jobs must be at least 1".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(UsersimError::Config(
                "timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.paths.iter().any(|p| p.name().is_empty()) {
            return Err(UsersimError::Config("scenario names must not be empty".to_string()));
        }
        Ok(())
    }

    /// Resolves `path` against the config directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Persona paths, resolved.
    pub fn user_paths(&self) -> Vec<PathBuf> {
        self.users.iter().map(|p| self.resolve(p)).collect()
    }

    /// Scenarios, optionally narrowed to the one named `only`. A name not in
    /// the config runs with no extra environment.
    pub fn scenarios(&self, only: Option<&str>) -> Vec<ScenarioSpec> {
        match only {
            None => self.paths.clone(),
            Some(name) => vec![self
                .paths
                .iter()
                .find(|p| p.name() == name)
                .cloned()
                .unwrap_or_else(|| ScenarioSpec::Name(name.to_string()))],
        }
    }
}

/// One scenario: a bare name, or a name with extra environment variables for
/// the instrumentation command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScenarioSpec {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        env: BTreeMap<String, String>,
    },
}

impl ScenarioSpec {
    pub fn name(&self) -> &str {
        match self {
            ScenarioSpec::Name(name) => name,
            ScenarioSpec::Detailed { name, .. } => name,
        }
    }

    pub fn env(&self) -> impl Iterator<Item = (&str, &str)> {
        let vars = match self {
            ScenarioSpec::Name(_) => None,
            ScenarioSpec::Detailed { env, .. } => Some(env),
        };
        vars.into_iter()
            .flatten()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where `run` writes the results document; stdout when unset.
    pub results: Option<PathBuf>,
}

/// Evaluation settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Value an unobserved fact takes in numeric context.
    pub sentinel: i64,

    /// Search for reassignment hints on failed constraints.
    pub model_search: bool,

    /// Evaluations allowed per hint search.
    pub search_budget: usize,

    pub effective_tests: EffectiveTestWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sentinel: DEFAULT_SENTINEL,
            model_search: true,
            search_budget: DEFAULT_SEARCH_BUDGET,
            effective_tests: EffectiveTestWeights::default(),
        }
    }
}
