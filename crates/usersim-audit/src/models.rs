//! Input and report types for the audit.
//!
//! Input types default every field, so results written by older tools or
//! trimmed by hand still load. Missing data is omitted from the analysis
//! rather than rejected.

use serde::{Deserialize, Serialize};

/// A results or matrix document, as far as the audit needs it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditInput {
    pub results: Vec<ResultRow>,
    pub summary: InputSummary,
}

/// One (persona, scenario) result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultRow {
    pub person: String,
    pub path: Option<String>,
    pub constraints: Vec<ConstraintRow>,
}

impl ResultRow {
    /// Scenario name; results without one share the empty scenario.
    pub fn scenario(&self) -> &str {
        self.path.as_deref().unwrap_or_default()
    }
}

/// One constraint outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintRow {
    pub label: String,
    pub expr: String,
    pub passed: bool,
    pub antecedent_fired: Option<bool>,
}

/// Totals copied through from the input summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSummary {
    pub total: u64,
    pub satisfied: u64,
    pub constraint_evals: u64,
    pub effective_tests: u64,
}

/// A (persona, label) pair whose antecedent never held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VacuousConstraint {
    pub person: String,
    pub label: String,
}

/// A (persona, label) pair that passed every time it fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlwaysPassing {
    pub person: String,
    pub label: String,
    pub pass: u64,
    pub total: u64,
}

/// Average constraints per scenario for one persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaCount {
    pub person: String,
    /// Rounded to one decimal.
    pub avg_constraints: f64,
    /// Below half the mean across personas.
    pub underweighted: bool,
}

/// Distinct facts referenced by one label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Density {
    pub label: String,
    pub vars: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSummary {
    pub effective_tests: u64,
    pub constraint_evals: u64,
    pub satisfied: u64,
    pub total: u64,
    pub vacuous_count: usize,
    pub always_passing_count: usize,
    pub dead_facts_count: usize,
}

/// The full health report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub persons: Vec<String>,
    pub paths: Vec<String>,
    pub summary: AuditSummary,
    pub vacuous: Vec<VacuousConstraint>,
    pub always_passing: Vec<AlwaysPassing>,
    pub counts_per_persona: Vec<PersonaCount>,
    pub top_density: Vec<Density>,
    pub bottom_density: Vec<Density>,
    pub dead_facts: Vec<String>,
    /// Why the dead-fact scan was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead_facts_error: Option<String>,
}
