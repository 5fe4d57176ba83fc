//! # Interchange Documents
//!
//! Every JSON document crossing a stage boundary carries a `schema` tag.
//!
//! | Document | Tag | Produced by |
//! |----------|-----|-------------|
//! | metrics | `usersim.metrics.v1` | instrumentation |
//! | facts | `usersim.perceptions.v1` | perceptions |
//! | results | `usersim.results.v1` | judging one facts document |
//! | matrix | `usersim.matrix.v1` | judging many scenarios |
//!
//! Input documents are validated before anything is judged: a wrong or
//! missing tag, or a missing required key, is a hard failure.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use usersim_expr::{sanitize_fact_name, FactEnv, Number};
use usersim_judge::{JudgementResult, Matrix, MatrixSummary, ScenarioInput};

use crate::error::UsersimError;
use crate::Result;

pub const METRICS_SCHEMA: &str = "usersim.metrics.v1";
pub const PERCEPTIONS_SCHEMA: &str = "usersim.perceptions.v1";
pub const RESULTS_SCHEMA: &str = "usersim.results.v1";
pub const MATRIX_SCHEMA: &str = "usersim.matrix.v1";

fn expect_schema(doc: &Map<String, Value>, expected: &str, origin: &str) -> Result<()> {
    match doc.get("schema") {
        Some(Value::String(tag)) if tag == expected => Ok(()),
        Some(other) => Err(UsersimError::validation(
            origin,
            format!("expected schema '{expected}', got {other}"),
        )),
        None => Err(UsersimError::validation(
            origin,
            format!("missing schema tag (expected '{expected}')"),
        )),
    }
}

fn expect_object<'a>(value: &'a Value, origin: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| UsersimError::validation(origin, "document is not a JSON object"))
}

/// Output of the instrumentation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsDocument {
    pub schema: String,
    pub metrics: Map<String, Value>,
}

impl MetricsDocument {
    pub fn from_value(value: Value, origin: &str) -> Result<Self> {
        let doc = expect_object(&value, origin)?;
        expect_schema(doc, METRICS_SCHEMA, origin)?;
        if !doc.get("metrics").is_some_and(Value::is_object) {
            return Err(UsersimError::validation(
                origin,
                "must contain a 'metrics' object",
            ));
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// Facts for one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactsDocument {
    pub schema: String,
    /// Scenario name; older producers write `scenario`.
    #[serde(default, alias = "scenario", skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Persona filter; `"all"` judges every persona.
    pub person: String,
    pub facts: Map<String, Value>,
}

impl FactsDocument {
    pub fn new(scenario: impl Into<String>, facts: Map<String, Value>) -> Self {
        Self {
            schema: PERCEPTIONS_SCHEMA.to_string(),
            path: Some(scenario.into()),
            person: usersim_judge::ALL_PERSONAS.to_string(),
            facts,
        }
    }

    /// Validates and parses a facts document.
    pub fn from_value(value: Value, origin: &str) -> Result<Self> {
        let doc = expect_object(&value, origin)?;
        expect_schema(doc, PERCEPTIONS_SCHEMA, origin)?;
        if !doc.get("facts").is_some_and(Value::is_object) {
            return Err(UsersimError::validation(origin, "must contain a 'facts' object"));
        }
        if !doc.get("person").is_some_and(Value::is_string) {
            return Err(UsersimError::validation(origin, "must contain a 'person' field"));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Accepts either a full facts document or a bare facts object, which is
    /// wrapped with `scenario` and person `all`.
    pub fn from_stage_output(value: Value, scenario: &str, origin: &str) -> Result<Self> {
        match value {
            Value::Object(map) if !map.contains_key("facts") => Ok(Self::new(scenario, map)),
            value => {
                let mut doc = Self::from_value(value, origin)?;
                doc.path.get_or_insert_with(|| scenario.to_string());
                Ok(doc)
            }
        }
    }

    /// Scenario name, or `fallback` when the document has none.
    pub fn scenario_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.path.as_deref().unwrap_or(fallback)
    }

    /// Grounds the fact environment.
    pub fn to_env(&self, sentinel: Number) -> FactEnv {
        FactEnv::from_json(&self.facts).with_sentinel(sentinel)
    }

    /// Sanitized names of the facts this document carries.
    pub fn fact_names(&self) -> impl Iterator<Item = String> + '_ {
        self.facts.keys().map(|name| sanitize_fact_name(name))
    }

    pub fn to_scenario(&self, fallback: &str, sentinel: Number) -> ScenarioInput {
        ScenarioInput::new(self.scenario_or(fallback), self.to_env(sentinel))
            .with_person(self.person.clone())
    }
}

/// Totals over a results document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResultsSummary {
    pub total: usize,
    pub satisfied: usize,
    pub score: f64,
}

impl ResultsSummary {
    pub fn from_results(results: &[JudgementResult]) -> Self {
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
        }
    }
}

/// Judgement of one facts document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsDocument {
    pub schema: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub results: Vec<JudgementResult>,
    pub summary: ResultsSummary,
}

impl ResultsDocument {
    pub fn new(path: Option<String>, results: Vec<JudgementResult>) -> Self {
        let summary = ResultsSummary::from_results(&results);
        Self {
            schema: RESULTS_SCHEMA.to_string(),
            path,
            results,
            summary,
        }
    }
}

/// Judgement of many scenarios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixDocument {
    pub schema: String,
    pub results: Vec<JudgementResult>,
    pub summary: MatrixSummary,
}

impl From<Matrix> for MatrixDocument {
    fn from(matrix: Matrix) -> Self {
        Self {
            schema: MATRIX_SCHEMA.to_string(),
            results: matrix.results,
            summary: matrix.summary,
        }
    }
}

/// Either output document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Report {
    Results(ResultsDocument),
    Matrix(MatrixDocument),
}

impl Report {
    pub fn results(&self) -> &[JudgementResult] {
        match self {
            Report::Results(doc) => &doc.results,
            Report::Matrix(doc) => &doc.results,
        }
    }

    pub fn total(&self) -> usize {
        match self {
            Report::Results(doc) => doc.summary.total,
            Report::Matrix(doc) => doc.summary.total,
        }
    }

    pub fn satisfied(&self) -> usize {
        match self {
            Report::Results(doc) => doc.summary.satisfied,
            Report::Matrix(doc) => doc.summary.satisfied,
        }
    }

    pub fn score(&self) -> f64 {
        match self {
            Report::Results(doc) => doc.summary.score,
            Report::Matrix(doc) => doc.summary.score,
        }
    }

    /// Exactly 1.0, with no tolerance.
    #[allow(clippy::float_cmp)]
    pub fn is_perfect(&self) -> bool {
        self.score() == 1.0
    }
}

impl From<ResultsDocument> for Report {
    fn from(doc: ResultsDocument) -> Self {
        Report::Results(doc)
    }
}

impl From<MatrixDocument> for Report {
    fn from(doc: MatrixDocument) -> Self {
        Report::Matrix(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_facts_document_valid() {
        let doc = FactsDocument::from_value(
            json!({
                "schema": PERCEPTIONS_SCHEMA,
                "scenario": "cold-start",
                "person": "all",
                "facts": {"p99-ms": 120, "build.ok": true}
            }),
            "facts",
        )
        .unwrap();
        assert_eq!(doc.path.as_deref(), Some("cold-start"));
        let names: Vec<String> = doc.fact_names().collect();
        assert_eq!(names, vec!["build_ok", "p99_ms"]);
        let env = doc.to_env(Number::int(-1));
        assert!(env.contains("p99_ms"));
    }

    #[test]
    fn test_facts_document_wrong_schema() {
        let err = FactsDocument::from_value(
            json!({"schema": "usersim.results.v1", "person": "all", "facts": {}}),
            "facts",
        )
        .unwrap_err();
        assert!(err.to_string().contains("expected schema"));
    }

    #[test]
    fn test_facts_document_missing_keys() {
        let no_facts = json!({"schema": PERCEPTIONS_SCHEMA, "person": "all"});
        assert!(FactsDocument::from_value(no_facts, "f").is_err());
        let no_person = json!({"schema": PERCEPTIONS_SCHEMA, "facts": {}});
        assert!(FactsDocument::from_value(no_person, "f").is_err());
        let no_schema = json!({"person": "all", "facts": {}});
        assert!(FactsDocument::from_value(no_schema, "f")
            .unwrap_err()
            .to_string()
            .contains("missing schema"));
    }

    #[test]
    fn test_bare_facts_wrapped() {
        let doc = FactsDocument::from_stage_output(json!({"ok": true}), "smoke", "perceptions")
            .unwrap();
        assert_eq!(doc.schema, PERCEPTIONS_SCHEMA);
        assert_eq!(doc.path.as_deref(), Some("smoke"));
        assert_eq!(doc.person, "all");
    }

    #[test]
    fn test_full_stage_output_gets_scenario() {
        let doc = FactsDocument::from_stage_output(
            json!({"schema": PERCEPTIONS_SCHEMA, "person": "dev", "facts": {}}),
            "smoke",
            "perceptions",
        )
        .unwrap();
        assert_eq!(doc.path.as_deref(), Some("smoke"));
        assert_eq!(doc.person, "dev");
    }

    #[test]
    fn test_metrics_document() {
        assert!(MetricsDocument::from_value(
            json!({"schema": METRICS_SCHEMA, "metrics": {"n": 1}}),
            "metrics"
        )
        .is_ok());
        assert!(MetricsDocument::from_value(json!({"schema": METRICS_SCHEMA}), "metrics").is_err());
        assert!(MetricsDocument::from_value(json!([1, 2]), "metrics").is_err());
    }

    #[test]
    fn test_empty_results_summary() {
        let doc = ResultsDocument::new(None, Vec::new());
        assert_eq!(doc.summary.total, 0);
        assert_eq!(doc.summary.score, 0.0);
        assert!(!Report::from(doc).is_perfect());
    }
}
