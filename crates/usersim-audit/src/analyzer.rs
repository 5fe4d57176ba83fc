//! # Constraint Health Analysis
//!
//! A constraint set can look thorough and still ask nothing. The analyzer
//! reads completed results and reports where that happens.
//!
//! ## Checks
//!
//! | Check | Flags |
//! |-------|-------|
//! | Vacuous | (persona, label) whose antecedent was false in every scenario |
//! | Always-passing | (persona, label) that fired in every scenario and never failed |
//! | Counts per persona | average constraints per scenario, underweighted below half the mean |
//! | Density | labels referencing the most and fewest distinct facts |
//! | Dead facts | known fact names no constraint mentions |
//!
//! Only implications carry antecedent information. Rows without it count as
//! fired, and rows without an `expr` have zero density. The input is never
//! modified.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::debug;
use usersim_expr::tokens;

use crate::error::Result;
use crate::models::{
    AlwaysPassing, AuditInput, AuditReport, AuditSummary, Density, PersonaCount,
    VacuousConstraint,
};

/// Entries shown at each end of the density ranking.
pub const DEFAULT_DENSITY_LIMIT: usize = 10;

/// Runs the health checks.
#[derive(Debug, Clone)]
pub struct AuditAnalyzer {
    known_facts: Option<BTreeSet<String>>,
    density_limit: usize,
}

impl Default for AuditAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditAnalyzer {
    pub fn new() -> Self {
        Self {
            known_facts: None,
            density_limit: DEFAULT_DENSITY_LIMIT,
        }
    }

    /// Supplies the fact names the perception step produces, enabling the
    /// dead-fact check.
    pub fn with_known_facts<I, S>(mut self, facts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_facts = Some(facts.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_density_limit(mut self, limit: usize) -> Self {
        self.density_limit = limit;
        self
    }

    /// Parses a results or matrix document and analyzes it.
    pub fn analyze_value(&self, document: &serde_json::Value) -> Result<AuditReport> {
        let input = AuditInput::deserialize_from(document)?;
        Ok(self.analyze(&input))
    }

    /// Analyzes parsed results.
    pub fn analyze(&self, input: &AuditInput) -> AuditReport {
        let persons: Vec<String> = input
            .results
            .iter()
            .map(|r| r.person.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let paths: Vec<String> = input
            .results
            .iter()
            .map(|r| r.scenario().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let vacuous = find_vacuous(input);
        let always_passing = find_always_passing(input, paths.len() as u64);
        let counts_per_persona = count_per_persona(input, &persons);
        let (top_density, bottom_density) = self.rank_density(input);
        let (dead_facts, dead_facts_error) = self.find_dead_facts(input);

        debug!(
            "Audit: {} vacuous, {} always-passing, {} dead fact(s)",
            vacuous.len(),
            always_passing.len(),
            dead_facts.len()
        );

        let summary = AuditSummary {
            effective_tests: input.summary.effective_tests,
            constraint_evals: input.summary.constraint_evals,
            satisfied: input.summary.satisfied,
            total: input.summary.total,
            vacuous_count: vacuous.len(),
            always_passing_count: always_passing.len(),
            dead_facts_count: dead_facts.len(),
        };

        AuditReport {
            persons,
            paths,
            summary,
            vacuous,
            always_passing,
            counts_per_persona,
            top_density,
            bottom_density,
            dead_facts,
            dead_facts_error,
        }
    }

    fn rank_density(&self, input: &AuditInput) -> (Vec<Density>, Vec<Density>) {
        let mut seen = HashSet::new();
        let mut density = Vec::new();
        for row in &input.results {
            for c in &row.constraints {
                if c.antecedent_fired == Some(false) || !seen.insert(c.label.as_str()) {
                    continue;
                }
                density.push(Density {
                    label: c.label.clone(),
                    vars: tokens::identifier_count(&c.expr),
                });
            }
        }
        // Stable: equal densities keep first-seen order.
        density.sort_by_key(|d| d.vars);

        let limit = self.density_limit.min(density.len());
        let top = density[density.len() - limit..].iter().rev().cloned().collect();
        let bottom = density[..limit].to_vec();
        (top, bottom)
    }

    fn find_dead_facts(&self, input: &AuditInput) -> (Vec<String>, Option<String>) {
        let Some(known) = &self.known_facts else {
            return (
                Vec::new(),
                Some("no known fact names (pass --facts-dir)".to_string()),
            );
        };
        let referenced: BTreeSet<String> = input
            .results
            .iter()
            .flat_map(|r| r.constraints.iter())
            .flat_map(|c| tokens::identifiers(&c.expr))
            .collect();
        (known.difference(&referenced).cloned().collect(), None)
    }
}

impl AuditInput {
    /// Reads a results or matrix document.
    pub fn deserialize_from(document: &serde_json::Value) -> Result<Self> {
        Ok(<AuditInput as serde::Deserialize>::deserialize(document)?)
    }
}

fn find_vacuous(input: &AuditInput) -> Vec<VacuousConstraint> {
    let ever_fired: HashSet<(&str, &str)> = input
        .results
        .iter()
        .flat_map(|r| {
            r.constraints
                .iter()
                .filter(|c| c.antecedent_fired == Some(true))
                .map(move |c| (r.person.as_str(), c.label.as_str()))
        })
        .collect();

    let mut seen = HashSet::new();
    let mut vacuous = Vec::new();
    for row in &input.results {
        for c in &row.constraints {
            if c.antecedent_fired != Some(false) {
                continue;
            }
            let key = (row.person.as_str(), c.label.as_str());
            if !ever_fired.contains(&key) && seen.insert(key) {
                vacuous.push(VacuousConstraint {
                    person: row.person.clone(),
                    label: c.label.clone(),
                });
            }
        }
    }
    vacuous
}

fn find_always_passing(input: &AuditInput, scenario_count: u64) -> Vec<AlwaysPassing> {
    let mut order: Vec<(&str, &str)> = Vec::new();
    let mut stats: HashMap<(&str, &str), (u64, u64)> = HashMap::new();
    for row in &input.results {
        for c in &row.constraints {
            if c.antecedent_fired == Some(false) {
                continue;
            }
            let key = (row.person.as_str(), c.label.as_str());
            let entry = stats.entry(key).or_insert_with(|| {
                order.push(key);
                (0, 0)
            });
            entry.1 += 1;
            if c.passed {
                entry.0 += 1;
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| {
            let (pass, total) = stats[&key];
            (total >= scenario_count && pass == total).then(|| AlwaysPassing {
                person: key.0.to_string(),
                label: key.1.to_string(),
                pass,
                total,
            })
        })
        .collect()
}

fn count_per_persona(input: &AuditInput, persons: &[String]) -> Vec<PersonaCount> {
    let mut counts: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for row in &input.results {
        counts
            .entry(row.person.as_str())
            .or_default()
            .push(row.constraints.len());
    }

    let averages: Vec<(String, f64)> = persons
        .iter()
        .map(|person| {
            let rows = counts.get(person.as_str()).map(Vec::as_slice).unwrap_or_default();
            let avg = if rows.is_empty() {
                0.0
            } else {
                rows.iter().sum::<usize>() as f64 / rows.len() as f64
            };
            (person.clone(), (avg * 10.0).round() / 10.0)
        })
        .collect();

    let mean = if averages.is_empty() {
        0.0
    } else {
        averages.iter().map(|(_, avg)| avg).sum::<f64>() / averages.len() as f64
    };

    averages
        .into_iter()
        .map(|(person, avg_constraints)| PersonaCount {
            person,
            avg_constraints,
            underweighted: avg_constraints < mean / 2.0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConstraintRow, InputSummary, ResultRow};

    fn row(person: &str, path: &str, constraints: Vec<ConstraintRow>) -> ResultRow {
        ResultRow {
            person: person.to_string(),
            path: Some(path.to_string()),
            constraints,
        }
    }

    fn implication(label: &str, fired: bool, passed: bool) -> ConstraintRow {
        ConstraintRow {
            label: label.to_string(),
            expr: format!("Implies({label}_n >= 1, {label}_ok)"),
            passed,
            antecedent_fired: Some(fired),
        }
    }

    fn plain(label: &str, expr: &str, passed: bool) -> ConstraintRow {
        ConstraintRow {
            label: label.to_string(),
            expr: expr.to_string(),
            passed,
            antecedent_fired: None,
        }
    }

    #[test]
    fn test_vacuous_listed_once() {
        let input = AuditInput {
            results: vec![
                row("amy", "a", vec![implication("guard", false, true)]),
                row("amy", "b", vec![implication("guard", false, true)]),
                row("amy", "c", vec![implication("guard", false, true)]),
            ],
            summary: InputSummary::default(),
        };
        let report = AuditAnalyzer::new().analyze(&input);
        assert_eq!(
            report.vacuous,
            vec![VacuousConstraint {
                person: "amy".to_string(),
                label: "guard".to_string()
            }]
        );
        assert_eq!(report.summary.vacuous_count, 1);
    }

    #[test]
    fn test_fired_once_is_not_vacuous() {
        let input = AuditInput {
            results: vec![
                row("amy", "a", vec![implication("guard", false, true)]),
                row("amy", "b", vec![implication("guard", true, true)]),
            ],
            summary: InputSummary::default(),
        };
        assert!(AuditAnalyzer::new().analyze(&input).vacuous.is_empty());
    }

    #[test]
    fn test_vacuous_is_per_persona() {
        let input = AuditInput {
            results: vec![
                row("amy", "a", vec![implication("guard", true, true)]),
                row("zed", "a", vec![implication("guard", false, true)]),
            ],
            summary: InputSummary::default(),
        };
        let report = AuditAnalyzer::new().analyze(&input);
        assert_eq!(report.vacuous.len(), 1);
        assert_eq!(report.vacuous[0].person, "zed");
    }

    #[test]
    fn test_always_passing() {
        let input = AuditInput {
            results: vec![
                row("amy", "a", vec![plain("easy", "x >= 0", true), plain("hard", "y", false)]),
                row("amy", "b", vec![plain("easy", "x >= 0", true), plain("hard", "y", true)]),
            ],
            summary: InputSummary::default(),
        };
        let report = AuditAnalyzer::new().analyze(&input);
        assert_eq!(
            report.always_passing,
            vec![AlwaysPassing {
                person: "amy".to_string(),
                label: "easy".to_string(),
                pass: 2,
                total: 2,
            }]
        );
    }

    #[test]
    fn test_always_passing_requires_every_scenario() {
        let input = AuditInput {
            results: vec![
                row("amy", "a", vec![implication("guard", true, true)]),
                row("amy", "b", vec![implication("guard", false, true)]),
            ],
            summary: InputSummary::default(),
        };
        assert!(AuditAnalyzer::new().analyze(&input).always_passing.is_empty());
    }

    #[test]
    fn test_counts_and_imbalance() {
        let many = |p: &str| -> Vec<ConstraintRow> {
            (0..6).map(|i| plain(&format!("{p}{i}"), "x", true)).collect()
        };
        let input = AuditInput {
            results: vec![
                row("amy", "a", many("a")),
                row("bob", "a", many("b")),
                row("cat", "a", vec![plain("c0", "x", true)]),
            ],
            summary: InputSummary::default(),
        };
        let counts = AuditAnalyzer::new().analyze(&input).counts_per_persona;
        assert_eq!(counts.len(), 3);
        assert_eq!(counts[0].avg_constraints, 6.0);
        assert!(!counts[0].underweighted);
        assert_eq!(counts[2].person, "cat");
        assert!(counts[2].underweighted);
    }

    #[test]
    fn test_density_ranking() {
        let input = AuditInput {
            results: vec![row(
                "amy",
                "a",
                vec![
                    plain("one", "a >= 1", true),
                    plain("three", "a + b + c >= 1", true),
                    plain("two", "a >= b", true),
                    implication("skipped", false, true),
                ],
            )],
            summary: InputSummary::default(),
        };
        let report = AuditAnalyzer::new().with_density_limit(2).analyze(&input);
        let top: Vec<_> = report.top_density.iter().map(|d| d.label.as_str()).collect();
        let bottom: Vec<_> = report.bottom_density.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(top, vec!["three", "two"]);
        assert_eq!(bottom, vec!["one", "two"]);
    }

    #[test]
    fn test_dead_facts() {
        let input = AuditInput {
            results: vec![row("amy", "a", vec![plain("p", "latency_ms <= 500", true)])],
            summary: InputSummary::default(),
        };
        let report = AuditAnalyzer::new()
            .with_known_facts(["latency_ms", "cache_hits", "build_ok"])
            .analyze(&input);
        assert_eq!(report.dead_facts, vec!["build_ok", "cache_hits"]);
        assert_eq!(report.summary.dead_facts_count, 2);
        assert!(report.dead_facts_error.is_none());
    }

    #[test]
    fn test_mixed_case_facts_are_referenced() {
        let input = AuditInput {
            results: vec![row(
                "amy",
                "a",
                vec![
                    plain("fast", "Latency <= 5", true),
                    plain("cached", "And(cacheHits >= 1, _warm)", true),
                ],
            )],
            summary: InputSummary::default(),
        };
        let report = AuditAnalyzer::new()
            .with_known_facts(["Latency", "cacheHits", "_warm", "Unused"])
            .analyze(&input);
        assert_eq!(report.dead_facts, vec!["Unused"]);
        let cached = report.top_density.iter().find(|d| d.label == "cached").unwrap();
        assert_eq!(cached.vars, 2);
    }

    #[test]
    fn test_dead_facts_skipped_without_known_facts() {
        let report = AuditAnalyzer::new().analyze(&AuditInput::default());
        assert!(report.dead_facts.is_empty());
        assert!(report.dead_facts_error.is_some());
    }

    #[test]
    fn test_tolerates_missing_fields() {
        let doc = serde_json::json!({
            "results": [
                {"person": "amy", "constraints": [{"label": "x"}]},
                {"person": "bob"}
            ]
        });
        let report = AuditAnalyzer::new().analyze_value(&doc).unwrap();
        assert_eq!(report.persons, vec!["amy", "bob"]);
        assert_eq!(report.paths, vec![""]);
        assert_eq!(report.summary.total, 0);
    }

    #[test]
    fn test_rejects_non_document() {
        assert!(AuditAnalyzer::new()
            .analyze_value(&serde_json::json!({"results": 3}))
            .is_err());
    }

    #[test]
    fn test_copies_summary_totals() {
        let doc = serde_json::json!({
            "summary": {"total": 6, "satisfied": 5, "constraint_evals": 12, "effective_tests": 96}
        });
        let report = AuditAnalyzer::new().analyze_value(&doc).unwrap();
        assert_eq!(report.summary.total, 6);
        assert_eq!(report.summary.effective_tests, 96);
    }
}
