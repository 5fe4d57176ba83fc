//! # Matrix Aggregator
//!
//! Runs the judgement procedure over every (persona, scenario) pair and
//! summarizes the grid.
//!
//! ## Summary Fields
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `total` | number of (persona, scenario) results |
//! | `satisfied` | results with no failed constraint |
//! | `score` | mean of per-result scores (`0.0` for an empty grid) |
//! | `constraint_evals` | constraint evaluations across all results |
//! | `effective_tests` | sum of `base^k` per evaluation, `k` = distinct facts clamped to `[1, max_arity]` |
//! | `constraint_freq` | per-label evaluations, firings and failures |
//!
//! Results are ordered by scenario name, then persona name, whatever order
//! the scenarios arrived in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use usersim_expr::FactEnv;

use crate::judgement::{Judge, JudgementResult};
use crate::persona::Persona;

/// Default base of the effective test count.
pub const DEFAULT_EFFECTIVE_BASE: u64 = 4;

/// Default arity cap of the effective test count.
pub const DEFAULT_MAX_ARITY: u32 = 8;

/// Person filter value that selects every persona.
pub const ALL_PERSONAS: &str = "all";

/// Constants of the effective test count heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectiveTestWeights {
    pub base: u64,
    pub max_arity: u32,
}

impl Default for EffectiveTestWeights {
    fn default() -> Self {
        Self {
            base: DEFAULT_EFFECTIVE_BASE,
            max_arity: DEFAULT_MAX_ARITY,
        }
    }
}

impl EffectiveTestWeights {
    pub fn new(base: u64, max_arity: u32) -> Self {
        Self { base, max_arity }
    }

    /// Weight of one evaluation referencing `arity` distinct facts.
    pub fn weight(&self, arity: usize) -> u64 {
        let cap = self.max_arity.max(1);
        let k = u32::try_from(arity).unwrap_or(u32::MAX).clamp(1, cap);
        self.base.saturating_pow(k)
    }
}

/// Per-label counters across the grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelFrequency {
    pub evals: u64,
    pub fired: u64,
    pub failed: u64,
}

/// Summary of a judged grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixSummary {
    pub total: usize,
    pub satisfied: usize,
    pub score: f64,
    pub constraint_evals: u64,
    pub effective_tests: u64,
    pub constraint_freq: BTreeMap<String, LabelFrequency>,
}

impl MatrixSummary {
    /// Summarizes `results` with the given weights.
    pub fn from_results(results: &[JudgementResult], weights: &EffectiveTestWeights) -> Self {
        let mut constraint_evals = 0u64;
        let mut effective_tests = 0u64;
        let mut constraint_freq: BTreeMap<String, LabelFrequency> = BTreeMap::new();

        for result in results {
            for outcome in &result.constraints {
                constraint_evals += 1;
                effective_tests = effective_tests.saturating_add(weights.weight(outcome.arity()));

                let freq = constraint_freq.entry(outcome.label.clone()).or_default();
                freq.evals += 1;
                if outcome.fired() {
                    freq.fired += 1;
                }
                if !outcome.passed {
                    freq.failed += 1;
                }
            }
        }

        let total = results.len();
        let score = if total == 0 {
            0.0
        } else {
            results.iter().map(|r| r.score).sum::<f64>() / total as f64
        };

        Self {
            total,
            satisfied: results.iter().filter(|r| r.satisfied).count(),
            score,
            constraint_evals,
            effective_tests,
            constraint_freq,
        }
    }
}

/// One scenario to judge.
#[derive(Debug, Clone)]
pub struct ScenarioInput {
    pub name: String,
    /// Persona filter; `None` or `"all"` selects every persona.
    pub person: Option<String>,
    /// Grounded facts, or the reason the scenario produced none.
    pub facts: Result<FactEnv, String>,
}

impl ScenarioInput {
    pub fn new(name: impl Into<String>, facts: FactEnv) -> Self {
        Self {
            name: name.into(),
            person: None,
            facts: Ok(facts),
        }
    }

    /// A scenario whose external stages failed.
    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            person: None,
            facts: Err(message.into()),
        }
    }

    pub fn with_person(mut self, person: impl Into<String>) -> Self {
        self.person = Some(person.into());
        self
    }

    /// Whether this scenario judges `persona`.
    pub fn selects(&self, persona: &str) -> bool {
        match self.person.as_deref() {
            None | Some(ALL_PERSONAS) => true,
            Some(name) => name == persona,
        }
    }
}

/// A judged grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub results: Vec<JudgementResult>,
    pub summary: MatrixSummary,
}

impl Matrix {
    pub fn from_results(mut results: Vec<JudgementResult>, weights: &EffectiveTestWeights) -> Self {
        sort_results(&mut results);
        let summary = MatrixSummary::from_results(&results, weights);
        Self { results, summary }
    }

    /// Scenario names in result order, deduplicated.
    pub fn scenarios(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .results
            .iter()
            .filter_map(|r| r.path.as_deref())
            .collect();
        names.dedup();
        names
    }
}

/// Orders results by scenario name, then persona name.
pub fn sort_results(results: &mut [JudgementResult]) {
    results.sort_by(|a, b| {
        a.path
            .as_deref()
            .unwrap_or_default()
            .cmp(b.path.as_deref().unwrap_or_default())
            .then_with(|| a.person.cmp(&b.person))
    });
}

/// Judges personas × scenarios.
#[derive(Debug, Clone, Default)]
pub struct MatrixAggregator {
    judge: Judge,
    weights: EffectiveTestWeights,
}

impl MatrixAggregator {
    pub fn new(judge: Judge) -> Self {
        Self {
            judge,
            weights: EffectiveTestWeights::default(),
        }
    }

    pub fn with_weights(mut self, weights: EffectiveTestWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn judge(&self) -> &Judge {
        &self.judge
    }

    pub fn weights(&self) -> &EffectiveTestWeights {
        &self.weights
    }

    /// Judges one scenario against every selected persona.
    ///
    /// A failed scenario yields one error result per selected persona.
    pub fn run_scenario<P: Persona>(
        &self,
        personas: &[P],
        scenario: &ScenarioInput,
    ) -> Vec<JudgementResult> {
        let selected = personas.iter().filter(|p| scenario.selects(p.name()));
        match &scenario.facts {
            Ok(env) => selected
                .map(|p| self.judge.judge_scenario(p, env, &scenario.name))
                .collect(),
            Err(message) => {
                warn!("Scenario '{}' failed: {}", scenario.name, message);
                selected
                    .map(|p| {
                        JudgementResult::failure(p, format!("Scenario failed: {message}"))
                            .with_path(&scenario.name)
                    })
                    .collect()
            }
        }
    }

    /// Judges every scenario and summarizes the grid.
    pub fn run<P: Persona>(&self, personas: &[P], scenarios: &[ScenarioInput]) -> Matrix {
        let results: Vec<JudgementResult> = scenarios
            .iter()
            .flat_map(|scenario| self.run_scenario(personas, scenario))
            .collect();
        let matrix = Matrix::from_results(results, &self.weights);
        info!(
            "Matrix: {}/{} satisfied across {} scenario(s), score {:.4}",
            matrix.summary.satisfied,
            matrix.summary.total,
            scenarios.len(),
            matrix.summary.score
        );
        matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::{DeclaredPersona, PersonaProfile};
    use usersim_expr::parse_formula;

    fn persona(name: &str, formulas: &[&str]) -> DeclaredPersona {
        let constraints = formulas.iter().map(|f| parse_formula(f).unwrap()).collect();
        DeclaredPersona::new(PersonaProfile::new(name), constraints)
    }

    #[test]
    fn test_weight_defaults() {
        let w = EffectiveTestWeights::default();
        assert_eq!(w.weight(0), 4);
        assert_eq!(w.weight(1), 4);
        assert_eq!(w.weight(2), 16);
        assert_eq!(w.weight(8), 65_536);
        assert_eq!(w.weight(20), 65_536);
    }

    #[test]
    fn test_weight_configurable() {
        let w = EffectiveTestWeights::new(2, 3);
        assert_eq!(w.weight(2), 4);
        assert_eq!(w.weight(5), 8);
    }

    #[test]
    fn test_two_variable_constraint_counts_sixteen() {
        let p = persona("dev", &["error_total * 100 <= request_total"]);
        let env = FactEnv::new()
            .with_fact("error_total", 0)
            .with_fact("request_total", 10);
        let matrix = MatrixAggregator::default().run(&[p], &[ScenarioInput::new("smoke", env)]);
        assert_eq!(matrix.summary.effective_tests, 16);
        assert_eq!(matrix.summary.constraint_evals, 1);
    }

    #[test]
    fn test_results_sorted_by_scenario_then_persona() {
        let personas = vec![persona("zed", &[]), persona("amy", &[])];
        let scenarios = vec![
            ScenarioInput::new("beta", FactEnv::new()),
            ScenarioInput::new("alpha", FactEnv::new()),
        ];
        let matrix = MatrixAggregator::default().run(&personas, &scenarios);
        let order: Vec<(&str, &str)> = matrix
            .results
            .iter()
            .map(|r| (r.path.as_deref().unwrap(), r.person.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![("alpha", "amy"), ("alpha", "zed"), ("beta", "amy"), ("beta", "zed")]
        );
        assert_eq!(matrix.scenarios(), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_person_filter() {
        let personas = vec![persona("amy", &[]), persona("zed", &[])];
        let only_zed = ScenarioInput::new("s", FactEnv::new()).with_person("zed");
        let all = ScenarioInput::new("t", FactEnv::new()).with_person("all");
        let agg = MatrixAggregator::default();
        assert_eq!(agg.run_scenario(&personas, &only_zed).len(), 1);
        assert_eq!(agg.run_scenario(&personas, &all).len(), 2);
    }

    #[test]
    fn test_failed_scenario_yields_error_rows() {
        let personas = vec![persona("amy", &["ok"]), persona("zed", &["ok"])];
        let scenarios = vec![
            ScenarioInput::failed("broken", "instrumentation exited with status 3"),
            ScenarioInput::new("fine", FactEnv::new().with_fact("ok", true)),
        ];
        let matrix = MatrixAggregator::default().run(&personas, &scenarios);
        assert_eq!(matrix.summary.total, 4);
        assert_eq!(matrix.summary.satisfied, 2);
        let broken = &matrix.results[0];
        assert_eq!(broken.path.as_deref(), Some("broken"));
        assert!(broken.error.as_ref().unwrap().contains("status 3"));
        assert_eq!(matrix.summary.score, 0.5);
    }

    #[test]
    fn test_label_frequency() {
        let p = persona("dev", &["Implies(n >= 1, ok)"]);
        let scenarios = vec![
            ScenarioInput::new("a", FactEnv::new().with_fact("n", 0)),
            ScenarioInput::new("b", FactEnv::new().with_fact("n", 2).with_fact("ok", false)),
            ScenarioInput::new("c", FactEnv::new().with_fact("n", 3).with_fact("ok", true)),
        ];
        let matrix = MatrixAggregator::default().run(&[p], &scenarios);
        let freq = matrix.summary.constraint_freq["Implies(n >= 1, ok)"];
        assert_eq!(
            freq,
            LabelFrequency {
                evals: 3,
                fired: 2,
                failed: 1
            }
        );
    }

    #[test]
    fn test_empty_matrix() {
        let personas: Vec<DeclaredPersona> = Vec::new();
        let matrix = MatrixAggregator::default().run(&personas, &[]);
        assert_eq!(matrix.summary.total, 0);
        assert_eq!(matrix.summary.score, 0.0);
        assert_eq!(matrix.summary.effective_tests, 0);
    }
}
