//! The usersim engine facade.
//!
//! [`Engine`] owns the loaded personas and the evaluation settings, and
//! exposes the entry points the CLI needs: judge one facts document, judge a
//! directory into a matrix, run the external pipeline, and audit results.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};
use usersim_audit::{AuditAnalyzer, AuditReport};
use usersim_expr::{BoundarySearch, Number};
use usersim_judge::{
    load_personas, sort_results, Judge, MatrixAggregator, Persona, ScenarioInput,
};

use crate::config::{EngineConfig, ProjectConfig, ScenarioSpec};
use crate::loader::{read_facts_dir, LoadedFacts};
use crate::pipeline::{PipelineRunner, ScenarioRun};
use crate::schema::{MatrixDocument, ResultsDocument};
use crate::Result;

/// The usersim engine.
///
/// # Example
///
/// ```rust,ignore
/// let config = ProjectConfig::load(Path::new("usersim.yaml"))?;
/// let engine = Engine::from_project(&config)?;
///
/// let matrix = engine.judge_directory(Path::new("facts/"))?;
/// std::process::exit(if matrix.summary.score == 1.0 { 0 } else { 1 });
/// ```
pub struct Engine {
    config: EngineConfig,
    personas: Vec<Box<dyn Persona>>,
    aggregator: MatrixAggregator,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.personas.iter().map(|p| p.name()).collect();
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("personas", &names)
            .finish()
    }
}

impl Engine {
    /// Creates an engine over already-built personas.
    pub fn new(config: EngineConfig, personas: Vec<Box<dyn Persona>>) -> Self {
        let solver = BoundarySearch::new().with_budget(config.search_budget);
        let judge = Judge::new()
            .with_solver(Arc::new(solver))
            .with_model_search(config.model_search);
        let aggregator = MatrixAggregator::new(judge).with_weights(config.effective_tests);

        info!(
            "Engine initialized with {} persona(s), sentinel {}",
            personas.len(),
            config.sentinel
        );

        Self {
            config,
            personas,
            aggregator,
        }
    }

    /// Loads persona files and creates an engine.
    pub fn with_persona_files<P: AsRef<std::path::Path>>(
        config: EngineConfig,
        paths: &[P],
    ) -> Result<Self> {
        let personas = load_personas(paths)?
            .into_iter()
            .map(|p| Box::new(p) as Box<dyn Persona>)
            .collect();
        Ok(Self::new(config, personas))
    }

    /// Creates an engine from the project config's `users` and `engine`
    /// sections.
    pub fn from_project(config: &ProjectConfig) -> Result<Self> {
        Self::with_persona_files(config.engine, &config.user_paths())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn personas(&self) -> &[Box<dyn Persona>] {
        &self.personas
    }

    fn sentinel(&self) -> Number {
        Number::int(self.config.sentinel)
    }

    fn scenario_input(&self, loaded: &LoadedFacts) -> ScenarioInput {
        loaded.document.to_scenario(&loaded.scenario, self.sentinel())
    }

    /// Judges one facts document.
    pub fn judge_document(&self, loaded: &LoadedFacts) -> ResultsDocument {
        let scenario = self.scenario_input(loaded);
        let mut results = self.aggregator.run_scenario(&self.personas, &scenario);
        sort_results(&mut results);
        ResultsDocument::new(Some(loaded.scenario.clone()), results)
    }

    /// Judges many facts documents into a matrix.
    pub fn judge_many(&self, documents: &[LoadedFacts]) -> MatrixDocument {
        let scenarios: Vec<ScenarioInput> =
            documents.iter().map(|d| self.scenario_input(d)).collect();
        self.aggregator.run(&self.personas, &scenarios).into()
    }

    /// Judges every facts document in `dir`. Every document is validated
    /// before any is judged.
    pub fn judge_directory(&self, dir: &std::path::Path) -> Result<MatrixDocument> {
        let documents = read_facts_dir(dir)?;
        Ok(self.judge_many(&documents))
    }

    /// Runs the external stages for `scenarios` and judges what they
    /// produce. Failed scenarios become error results.
    pub async fn run_pipeline(
        &self,
        runner: &PipelineRunner,
        scenarios: &[ScenarioSpec],
    ) -> MatrixDocument {
        let runs = runner.run_all(scenarios).await;
        let inputs: Vec<ScenarioInput> = runs
            .into_iter()
            .map(|run| match run.outcome {
                Ok(document) => ScenarioInput::new(run.name, document.to_env(self.sentinel()))
                    .with_person(document.person),
                Err(e) => {
                    warn!("Scenario '{}' failed: {}", run.name, e);
                    ScenarioInput::failed(run.name, e.to_string())
                }
            })
            .collect();
        self.aggregator.run(&self.personas, &inputs).into()
    }

    /// Audits a results or matrix document.
    pub fn audit(document: &Value, known_facts: Option<BTreeSet<String>>) -> Result<AuditReport> {
        let analyzer = match known_facts {
            Some(facts) => AuditAnalyzer::new().with_known_facts(facts),
            None => AuditAnalyzer::new(),
        };
        Ok(analyzer.analyze_value(document)?)
    }
}

/// Facts produced per scenario, for tuning thresholds.
#[derive(Debug)]
pub struct Calibration {
    pub runs: Vec<ScenarioRun>,
}

impl Calibration {
    /// Runs the external stages without judging.
    pub async fn collect(runner: &PipelineRunner, scenarios: &[ScenarioSpec]) -> Self {
        Self {
            runs: runner.run_all(scenarios).await,
        }
    }

    pub fn failures(&self) -> usize {
        self.runs.iter().filter(|r| r.outcome.is_err()).count()
    }
}

impl fmt::Display for Calibration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for run in &self.runs {
            match &run.outcome {
                Ok(doc) => {
                    writeln!(f, "\n--- {} ---", run.name)?;
                    let mut facts: Vec<_> = doc.facts.iter().collect();
                    facts.sort_by(|a, b| a.0.cmp(b.0));
                    for (name, value) in facts {
                        writeln!(f, "  {name}: {value}")?;
                    }
                }
                Err(e) => writeln!(f, "\n--- {}: FAILED ({}) ---", run.name, e)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FactsDocument;
    use serde_json::json;
    use usersim_expr::parse_formula;
    use usersim_judge::{DeclaredPersona, PersonaProfile};

    fn engine(config: EngineConfig) -> Engine {
        let persona = |name: &str, formula: &str| -> Box<dyn Persona> {
            Box::new(DeclaredPersona::new(
                PersonaProfile::new(name),
                vec![parse_formula(formula).unwrap()],
            ))
        };
        Engine::new(
            config,
            vec![
                persona("zed", "Implies(latency_ms >= 0, latency_ms <= 500)"),
                persona("amy", "build_ok"),
            ],
        )
    }

    fn loaded(scenario: &str, person: &str, facts: Value) -> LoadedFacts {
        let mut document =
            FactsDocument::new(scenario, facts.as_object().cloned().unwrap_or_default());
        document.person = person.to_string();
        LoadedFacts {
            scenario: scenario.to_string(),
            document,
            source: None,
        }
    }

    #[test]
    fn test_judge_document_sorted_by_persona() {
        let doc = engine(EngineConfig::default())
            .judge_document(&loaded("s", "all", json!({"build_ok": true})));
        let names: Vec<&str> = doc.results.iter().map(|r| r.person.as_str()).collect();
        assert_eq!(names, vec!["amy", "zed"]);
        assert_eq!(doc.summary.satisfied, 2);
        assert_eq!(doc.summary.score, 1.0);
    }

    #[test]
    fn test_person_filter() {
        let doc = engine(EngineConfig::default())
            .judge_document(&loaded("s", "zed", json!({})));
        assert_eq!(doc.results.len(), 1);
        assert_eq!(doc.results[0].person, "zed");
    }

    #[test]
    fn test_sentinel_configurable() {
        // With a non-negative sentinel the guard fires for the absent fact
        // and the consequent holds.
        let config = EngineConfig {
            sentinel: 0,
            ..EngineConfig::default()
        };
        let doc = engine(config).judge_document(&loaded("s", "zed", json!({})));
        assert_eq!(doc.results[0].constraints[0].antecedent_fired, Some(true));
    }

    #[test]
    fn test_audit_with_known_facts() {
        let matrix = engine(EngineConfig::default()).judge_many(&[
            loaded("a", "all", json!({"build_ok": true})),
            loaded("b", "all", json!({"build_ok": true})),
        ]);
        let value = serde_json::to_value(&matrix).unwrap();
        let known = ["build_ok", "latency_ms", "cpu"].map(String::from).into();
        let report = Engine::audit(&value, Some(known)).unwrap();
        assert_eq!(report.dead_facts, vec!["cpu"]);
        assert_eq!(report.vacuous.len(), 1);
    }
}
