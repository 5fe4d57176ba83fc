//! # Judgement Procedure
//!
//! Grounds one persona against one scenario's facts and classifies every
//! constraint.
//!
//! ## Procedure
//!
//! ```text
//!   FactEnv ──▶ persona.constraints(env)
//!                  │ Err ──▶ satisfied=false, score=0, one synthetic violation
//!                  ▼
//!        for each constraint, independently
//!           passed           = evaluate(constraint) is true
//!           antecedent_fired = evaluate(antecedent) for implications, else null
//!           target           = model search on failure (optional)
//!                  │
//!                  ▼
//!        score = passed / total   (1.0 when there are no constraints)
//!        satisfied = no failures
//! ```
//!
//! Search hints degrade silently: a solver that cannot search, or a search
//! that is inconclusive, simply leaves `target` out.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use usersim_expr::{BoundarySearch, Expr, FactEnv, FactValue, SearchOutcome, Solver};

use crate::persona::Persona;

/// Which way a fact would have to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increase,
    Decrease,
    /// Booleans, and facts that were not observed at all.
    Set,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Increase => write!(f, "increase"),
            Direction::Decrease => write!(f, "decrease"),
            Direction::Set => write!(f, "set"),
        }
    }
}

/// A suggested value for one fact that would make a failing constraint pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reassignment {
    pub fact: String,
    /// Observed value; `None` when the fact was not observed.
    pub current: Option<FactValue>,
    pub target: FactValue,
    pub direction: Direction,
}

impl Reassignment {
    fn new(fact: String, current: Option<FactValue>, target: FactValue) -> Self {
        let direction = match (current, target) {
            (Some(FactValue::Num(from)), FactValue::Num(to)) if to > from => Direction::Increase,
            (Some(FactValue::Num(from)), FactValue::Num(to)) if to < from => Direction::Decrease,
            _ => Direction::Set,
        };
        Self {
            fact,
            current,
            target,
            direction,
        }
    }
}

impl fmt::Display for Reassignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.current {
            Some(current) => write!(
                f,
                "{} {} {} -> {}",
                self.direction, self.fact, current, self.target
            ),
            None => write!(f, "set {} -> {}", self.fact, self.target),
        }
    }
}

/// Outcome of one constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintOutcome {
    pub label: String,
    /// Canonical rendering of the formula.
    pub expr: String,
    pub passed: bool,
    /// Whether an implication's antecedent held; `None` for other formulas.
    pub antecedent_fired: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target: Vec<Reassignment>,
    /// Distinct facts the formula references. Not serialized.
    #[serde(skip)]
    pub vars: BTreeSet<String>,
}

impl ConstraintOutcome {
    /// True unless this is an implication whose antecedent did not hold.
    pub fn fired(&self) -> bool {
        self.antecedent_fired != Some(false)
    }

    /// Number of distinct facts referenced.
    pub fn arity(&self) -> usize {
        if self.vars.is_empty() {
            usersim_expr::tokens::identifier_count(&self.expr)
        } else {
            self.vars.len()
        }
    }
}

/// Judgement of one persona against one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgementResult {
    pub person: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub pronoun: String,
    /// Scenario name, set when the result belongs to a named scenario.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub satisfied: bool,
    pub score: f64,
    #[serde(default)]
    pub constraints: Vec<ConstraintOutcome>,
    #[serde(default)]
    pub violations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JudgementResult {
    /// A failed judgement carrying a single synthetic violation.
    pub fn failure(persona: &dyn Persona, message: impl Into<String>) -> Self {
        let message = message.into();
        let profile = persona.profile();
        Self {
            person: profile.name.clone(),
            role: profile.role.clone(),
            goal: profile.goal.clone(),
            pronoun: profile.pronoun.clone(),
            path: None,
            satisfied: false,
            score: 0.0,
            constraints: Vec::new(),
            violations: vec![message.clone()],
            error: Some(message),
        }
    }

    /// Tags the result with its scenario name.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn passed(&self) -> usize {
        self.constraints.iter().filter(|c| c.passed).count()
    }
}

/// Runs the judgement procedure.
#[derive(Clone)]
pub struct Judge {
    solver: Arc<dyn Solver>,
    model_search: bool,
}

impl Default for Judge {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Judge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Judge")
            .field("solver", &self.solver.name())
            .field("model_search", &self.model_search)
            .finish()
    }
}

impl Judge {
    /// A judge using [`BoundarySearch`] with hints enabled.
    pub fn new() -> Self {
        Self {
            solver: Arc::new(BoundarySearch::new()),
            model_search: true,
        }
    }

    pub fn with_solver(mut self, solver: Arc<dyn Solver>) -> Self {
        self.solver = solver;
        self
    }

    /// Enables or disables reassignment hints for failed constraints.
    pub fn with_model_search(mut self, enabled: bool) -> Self {
        self.model_search = enabled;
        self
    }

    pub fn solver(&self) -> &dyn Solver {
        self.solver.as_ref()
    }

    /// Judges `persona` against `env`.
    pub fn judge(&self, persona: &dyn Persona, env: &FactEnv) -> JudgementResult {
        let profile = persona.profile();
        let constraints = match persona.constraints(env) {
            Ok(constraints) => constraints,
            Err(e) => {
                warn!("Persona '{}' failed to build constraints: {}", profile.name, e);
                return JudgementResult::failure(persona, format!("Authoring error: {e}"));
            }
        };

        let outcomes: Vec<ConstraintOutcome> =
            constraints.iter().map(|c| self.judge_constraint(c, env)).collect();

        let total = outcomes.len();
        let passed = outcomes.iter().filter(|o| o.passed).count();
        let violations: Vec<String> = outcomes
            .iter()
            .filter(|o| !o.passed)
            .map(|o| o.label.clone())
            .collect();
        let score = if total == 0 {
            1.0
        } else {
            passed as f64 / total as f64
        };

        debug!(
            "Persona '{}': {}/{} constraint(s) passed",
            profile.name, passed, total
        );

        JudgementResult {
            person: profile.name.clone(),
            role: profile.role.clone(),
            goal: profile.goal.clone(),
            pronoun: profile.pronoun.clone(),
            path: None,
            satisfied: violations.is_empty(),
            score,
            constraints: outcomes,
            violations,
            error: None,
        }
    }

    /// Judges `persona` and tags the result with `scenario`.
    pub fn judge_scenario(
        &self,
        persona: &dyn Persona,
        env: &FactEnv,
        scenario: &str,
    ) -> JudgementResult {
        self.judge(persona, env).with_path(scenario)
    }

    fn judge_constraint(&self, constraint: &Expr, env: &FactEnv) -> ConstraintOutcome {
        let passed = self.solver.evaluate(constraint, env).is_true();
        let antecedent_fired = constraint
            .antecedent()
            .map(|antecedent| self.solver.evaluate(antecedent, env).is_true());
        let target = if passed {
            Vec::new()
        } else {
            self.hint(constraint, env)
        };

        ConstraintOutcome {
            label: constraint.label(),
            expr: constraint.to_string(),
            passed,
            antecedent_fired,
            target,
            vars: constraint.variables(),
        }
    }

    fn hint(&self, constraint: &Expr, env: &FactEnv) -> Vec<Reassignment> {
        if !self.model_search || !self.solver.supports_search() {
            return Vec::new();
        }
        match self.solver.find_satisfying_assignment(constraint, env) {
            SearchOutcome::Satisfiable(assignment) => assignment
                .into_iter()
                .map(|(fact, target)| {
                    let current = env.get(&fact).copied();
                    Reassignment::new(fact, current, target)
                })
                .collect(),
            outcome => {
                debug!("No hint for '{}': {:?}", constraint.label(), outcome);
                Vec::new()
            }
        }
    }
}
