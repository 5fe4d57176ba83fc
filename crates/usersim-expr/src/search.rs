//! # Boundary Search
//!
//! A small, bounded model finder for the "what value would make this pass"
//! hint. It is not a decision procedure: it probes concrete candidate values
//! against the ordinary evaluator and reports the smallest change it finds.
//!
//! ## Strategy
//!
//! ```text
//!   holds already? ──yes──▶ Satisfiable({})
//!        │no
//!   one variable at a time, closest candidates first
//!        │  numeric hit ──▶ bisect back toward the current value
//!        │none
//!   pairs of variables over their closest candidates
//!        │none
//!   all variables boolean and few? ──▶ exhaustive enumeration
//!        │otherwise
//!   Inconclusive
//! ```
//!
//! Numeric candidates are the formula's own literals and their neighbours,
//! `0`, `1`, and the current value shifted by ±1, ±2, ±4, … up to ±2^62.
//! Bisection assumes the constraint is monotone between the current value and
//! the first passing candidate; the returned value is always re-checked.
//!
//! Every probe counts against a budget. `Unsatisfiable` is only reported when
//! it is proven: a variable-free formula that is false, or an exhaustive
//! boolean enumeration that found nothing.

use std::collections::BTreeSet;

use tracing::debug;

use crate::env::FactEnv;
use crate::expr::Expr;
use crate::number::Number;
use crate::solver::{Assignment, SearchOutcome, Solver};
use crate::value::{FactValue, Sort};

/// Default number of evaluations one search may spend.
pub const DEFAULT_SEARCH_BUDGET: usize = 4096;

/// Largest all-boolean variable set that is enumerated exhaustively.
const MAX_EXHAUSTIVE_BOOLS: usize = 12;

/// Candidates per variable considered in the pairwise phase.
const PAIR_CANDIDATES: usize = 16;

/// Largest power-of-two step tried around the current value.
const MAX_STEP_EXPONENT: u32 = 62;

/// Candidate-probing model finder.
#[derive(Debug, Clone)]
pub struct BoundarySearch {
    budget: usize,
}

impl Default for BoundarySearch {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundarySearch {
    pub fn new() -> Self {
        Self {
            budget: DEFAULT_SEARCH_BUDGET,
        }
    }

    /// Caps the number of evaluations per search.
    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = budget.max(1);
        self
    }

    pub fn budget(&self) -> usize {
        self.budget
    }
}

impl Solver for BoundarySearch {
    fn name(&self) -> &str {
        "boundary-search"
    }

    fn supports_search(&self) -> bool {
        true
    }

    fn find_satisfying_assignment(&self, expr: &Expr, env: &FactEnv) -> SearchOutcome {
        let mut probe = Probe {
            expr,
            env,
            evals: 0,
            budget: self.budget,
        };
        let outcome = probe.run();
        debug!(
            "Search over `{}` finished after {} evaluation(s): {:?}",
            expr, probe.evals, outcome
        );
        outcome
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Bool,
    Num,
    Either,
}

#[derive(Debug, Clone)]
struct Variable {
    name: String,
    kind: Kind,
    current_bool: bool,
    current_num: Number,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    value: FactValue,
    distance: Number,
}

struct Probe<'a> {
    expr: &'a Expr,
    env: &'a FactEnv,
    evals: usize,
    budget: usize,
}

/// Best repair found so far.
struct Repair {
    distance: Number,
    assignment: Assignment,
}

impl<'a> Probe<'a> {
    fn run(&mut self) -> SearchOutcome {
        if self.expr.holds(self.env) {
            return SearchOutcome::Satisfiable(Assignment::new());
        }
        let variables = self.variables();
        if variables.is_empty() {
            return SearchOutcome::Unsatisfiable;
        }
        let literals = self.expr.literals();
        let candidates: Vec<Vec<Candidate>> = variables
            .iter()
            .map(|v| candidates_for(v, &literals))
            .collect();

        if let Some(repair) = self.single_repairs(&variables, &candidates) {
            return SearchOutcome::Satisfiable(repair.assignment);
        }
        if self.exhausted() {
            return self.gave_up();
        }
        if let Some(repair) = self.pair_repairs(&variables, &candidates) {
            return SearchOutcome::Satisfiable(repair.assignment);
        }
        let all_bool = variables.iter().all(|v| v.kind == Kind::Bool);
        if all_bool && variables.len() <= MAX_EXHAUSTIVE_BOOLS {
            return self.enumerate_bools(&variables);
        }
        self.gave_up()
    }

    fn gave_up(&self) -> SearchOutcome {
        SearchOutcome::Inconclusive(format!(
            "no satisfying assignment found within {} evaluation(s)",
            self.evals
        ))
    }

    fn exhausted(&self) -> bool {
        self.evals >= self.budget
    }

    /// Evaluates with `overrides` layered over the environment. `None` once
    /// the budget is spent.
    fn passes(&mut self, overrides: &[(&str, FactValue)]) -> Option<bool> {
        if self.exhausted() {
            return None;
        }
        self.evals += 1;
        let env = self.env.overlay(overrides.iter().copied());
        Some(self.expr.holds(&env))
    }

    fn variables(&self) -> Vec<Variable> {
        let sorts = self.expr.variable_sorts();
        let sentinel = self.env.sentinel();
        self.expr
            .variables()
            .into_iter()
            .map(|name| {
                let (kind, current_bool, current_num) = match self.env.get(&name) {
                    Some(FactValue::Bool(b)) => (Kind::Bool, *b, sentinel),
                    Some(FactValue::Num(n)) => (Kind::Num, false, *n),
                    None => {
                        let kind = match sorts.get(&name) {
                            Some(Sort::Bool) => Kind::Bool,
                            Some(Sort::Num) => Kind::Num,
                            _ => Kind::Either,
                        };
                        (kind, false, sentinel)
                    }
                };
                Variable {
                    name,
                    kind,
                    current_bool,
                    current_num,
                }
            })
            .collect()
    }

    fn single_repairs(
        &mut self,
        variables: &[Variable],
        candidates: &[Vec<Candidate>],
    ) -> Option<Repair> {
        let mut best: Option<Repair> = None;
        'vars: for (var, cands) in variables.iter().zip(candidates) {
            for cand in cands {
                if best.as_ref().is_some_and(|b| cand.distance >= b.distance) {
                    break;
                }
                match self.passes(&[(var.name.as_str(), cand.value)]) {
                    None => break 'vars,
                    Some(false) => continue,
                    Some(true) => {
                        let (value, distance) = match cand.value {
                            FactValue::Num(target) if var.kind != Kind::Bool => {
                                let refined = self.bisect(&var.name, var.current_num, target);
                                let distance =
                                    abs_delta(var.current_num, refined).unwrap_or(cand.distance);
                                (FactValue::Num(refined), distance)
                            }
                            _ => (cand.value, cand.distance),
                        };
                        let mut assignment = Assignment::new();
                        assignment.insert(var.name.clone(), value);
                        best = Some(Repair {
                            distance,
                            assignment,
                        });
                        break;
                    }
                }
            }
        }
        best
    }

    fn pair_repairs(
        &mut self,
        variables: &[Variable],
        candidates: &[Vec<Candidate>],
    ) -> Option<Repair> {
        let mut best: Option<Repair> = None;
        for i in 0..variables.len() {
            for j in (i + 1)..variables.len() {
                let mut combos: Vec<(Number, Candidate, Candidate)> = Vec::new();
                for a in candidates[i].iter().take(PAIR_CANDIDATES) {
                    for b in candidates[j].iter().take(PAIR_CANDIDATES) {
                        if let Some(total) = a.distance.checked_add(b.distance) {
                            combos.push((total, *a, *b));
                        }
                    }
                }
                combos.sort_by(|x, y| x.0.cmp(&y.0));
                for (total, a, b) in combos {
                    if best.as_ref().is_some_and(|r| total >= r.distance) {
                        break;
                    }
                    let overrides = [
                        (variables[i].name.as_str(), a.value),
                        (variables[j].name.as_str(), b.value),
                    ];
                    match self.passes(&overrides) {
                        None => return best,
                        Some(false) => {}
                        Some(true) => {
                            let mut assignment = Assignment::new();
                            assignment.insert(variables[i].name.clone(), a.value);
                            assignment.insert(variables[j].name.clone(), b.value);
                            best = Some(Repair {
                                distance: total,
                                assignment,
                            });
                            break;
                        }
                    }
                }
            }
        }
        best
    }

    fn enumerate_bools(&mut self, variables: &[Variable]) -> SearchOutcome {
        for mask in 0u32..(1u32 << variables.len()) {
            let overrides: Vec<(&str, FactValue)> = variables
                .iter()
                .enumerate()
                .map(|(bit, v)| (v.name.as_str(), FactValue::Bool(mask & (1 << bit) != 0)))
                .collect();
            match self.passes(&overrides) {
                None => return self.gave_up(),
                Some(false) => {}
                Some(true) => {
                    let assignment = variables
                        .iter()
                        .zip(&overrides)
                        .filter(|(v, (_, value))| *value != FactValue::Bool(v.current_bool))
                        .map(|(v, (_, value))| (v.name.clone(), *value))
                        .collect();
                    return SearchOutcome::Satisfiable(assignment);
                }
            }
        }
        SearchOutcome::Unsatisfiable
    }

    /// Narrows toward `current` while the constraint still passes.
    fn bisect(&mut self, name: &str, current: Number, passing: Number) -> Number {
        if !current.is_integer() || !passing.is_integer() {
            return passing;
        }
        let (mut fail, mut pass) = (current.numer(), passing.numer());
        while pass.abs_diff(fail) > 1 {
            let mid = midpoint(fail, pass);
            match self.passes(&[(name, FactValue::Num(Number::from_i128(mid)))]) {
                Some(true) => pass = mid,
                Some(false) => fail = mid,
                None => break,
            }
        }
        Number::from_i128(pass)
    }
}

/// An integer within one half of `(a + b) / 2`, computed without overflowing.
fn midpoint(a: i128, b: i128) -> i128 {
    a / 2 + b / 2 + (a % 2 + b % 2) / 2
}

fn abs_delta(from: Number, to: Number) -> Option<Number> {
    let delta = to.checked_sub(from)?;
    if delta.is_negative() {
        delta.checked_neg()
    } else {
        Some(delta)
    }
}

fn candidates_for(var: &Variable, literals: &[Number]) -> Vec<Candidate> {
    let mut out = Vec::new();
    match var.kind {
        Kind::Bool => out.push(Candidate {
            value: FactValue::Bool(!var.current_bool),
            distance: Number::ONE,
        }),
        Kind::Num => out.extend(numeric_candidates(var.current_num, literals)),
        Kind::Either => {
            for b in [true, false] {
                out.push(Candidate {
                    value: FactValue::Bool(b),
                    distance: Number::ONE,
                });
            }
            out.extend(numeric_candidates(var.current_num, literals));
        }
    }
    out.sort_by(|a, b| {
        a.distance
            .cmp(&b.distance)
            .then_with(|| candidate_key(&a.value).cmp(&candidate_key(&b.value)))
    });
    out
}

/// Orders booleans before numbers, numbers ascending.
fn candidate_key(value: &FactValue) -> (u8, Number) {
    match value {
        FactValue::Bool(b) => (0, if *b { Number::ONE } else { Number::ZERO }),
        FactValue::Num(n) => (1, *n),
    }
}

fn numeric_candidates(current: Number, literals: &[Number]) -> Vec<Candidate> {
    let mut values: BTreeSet<Number> = BTreeSet::new();
    for &lit in literals {
        values.insert(lit);
        values.extend(lit.checked_add(Number::ONE));
        values.extend(lit.checked_sub(Number::ONE));
    }
    values.insert(Number::ZERO);
    values.insert(Number::ONE);
    for exp in 0..=MAX_STEP_EXPONENT {
        let step = Number::from_i128(1i128 << exp);
        values.extend(current.checked_add(step));
        values.extend(current.checked_sub(step));
    }
    values.remove(&current);

    values
        .into_iter()
        .filter_map(|value| {
            abs_delta(current, value).map(|distance| Candidate {
                value: FactValue::Num(value),
                distance,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{and, implies, or};
    use crate::parser::parse_formula;

    fn search(formula: &str, env: &FactEnv) -> SearchOutcome {
        let expr = parse_formula(formula).unwrap();
        BoundarySearch::new().find_satisfying_assignment(&expr, env)
    }

    #[test]
    fn test_percentage_repair_picks_smallest_change() {
        let env = FactEnv::new()
            .with_fact("request_total", 100)
            .with_fact("error_total", 2);
        let outcome = search("error_total * 100 <= request_total * 1", &env);
        let assignment = outcome.assignment().unwrap();
        assert_eq!(assignment.len(), 1);
        assert_eq!(assignment["error_total"], FactValue::from(1));
    }

    #[test]
    fn test_bisection_finds_threshold() {
        let env = FactEnv::new().with_fact("p99_ms", 900);
        let outcome = search("p99_ms <= 517", &env);
        assert_eq!(outcome.assignment().unwrap()["p99_ms"], FactValue::from(517));
    }

    #[test]
    fn test_bisection_across_full_range() {
        let expr = parse_formula("x <= 0").unwrap();
        let env = FactEnv::new();
        let mut probe = Probe {
            expr: &expr,
            env: &env,
            evals: 0,
            budget: DEFAULT_SEARCH_BUDGET,
        };
        let found = probe.bisect("x", Number::from_i128(i128::MAX), Number::from_i128(i128::MIN));
        assert_eq!(found, Number::ZERO);
        assert!(probe.evals <= 130);
    }

    #[test]
    fn test_midpoint_extremes() {
        assert!(midpoint(i128::MIN, i128::MAX).abs() <= 1);
        assert_eq!(midpoint(i128::MAX - 2, i128::MAX), i128::MAX - 1);
        assert_eq!(midpoint(-7, 3), -2);
    }

    #[test]
    fn test_lower_bound_threshold() {
        let env = FactEnv::new().with_fact("coverage", 40);
        let outcome = search("coverage >= 83", &env);
        assert_eq!(outcome.assignment().unwrap()["coverage"], FactValue::from(83));
    }

    #[test]
    fn test_bool_flip() {
        let env = FactEnv::new().with_fact("is_fast", false);
        let expr = Expr::var("is_fast");
        let outcome = BoundarySearch::new().find_satisfying_assignment(&expr, &env);
        assert_eq!(outcome.assignment().unwrap()["is_fast"], FactValue::Bool(true));
    }

    #[test]
    fn test_already_true_needs_nothing() {
        let env = FactEnv::new().with_fact("x", 5);
        assert_eq!(
            search("x > 1", &env),
            SearchOutcome::Satisfiable(Assignment::new())
        );
    }

    #[test]
    fn test_ground_false_is_unsatisfiable() {
        assert_eq!(search("1 > 2", &FactEnv::new()), SearchOutcome::Unsatisfiable);
    }

    #[test]
    fn test_contradictory_bools_are_unsatisfiable() {
        let env = FactEnv::new().with_fact("a", true);
        let expr = and([Expr::var("a"), Expr::var("a").not()]);
        assert_eq!(
            BoundarySearch::new().find_satisfying_assignment(&expr, &env),
            SearchOutcome::Unsatisfiable
        );
    }

    #[test]
    fn test_two_variable_repair() {
        let env = FactEnv::new().with_fact("a", false).with_fact("b", false);
        let expr = and([Expr::var("a"), Expr::var("b")]);
        let outcome = BoundarySearch::new().find_satisfying_assignment(&expr, &env);
        let assignment = outcome.assignment().unwrap();
        assert_eq!(assignment["a"], FactValue::Bool(true));
        assert_eq!(assignment["b"], FactValue::Bool(true));
    }

    #[test]
    fn test_numeric_contradiction_is_inconclusive() {
        let env = FactEnv::new().with_fact("x", 5);
        let outcome = search("x > 10 && x < 3", &env);
        assert!(matches!(outcome, SearchOutcome::Inconclusive(_)));
    }

    #[test]
    fn test_budget_is_respected() {
        let env = FactEnv::new().with_fact("x", 5);
        let expr = or([Expr::var("x").eq(1_000_000_007), Expr::var("x").eq(-999)]);
        let outcome = BoundarySearch::new()
            .with_budget(3)
            .find_satisfying_assignment(&expr, &env);
        assert!(matches!(outcome, SearchOutcome::Inconclusive(_)));
    }

    #[test]
    fn test_unobserved_guarded_fact() {
        let expr = implies(Expr::var("ok"), Expr::var("latency").le(200));
        let env = FactEnv::new().with_fact("ok", true).with_fact("latency", 250);
        let outcome = BoundarySearch::new().find_satisfying_assignment(&expr, &env);
        let assignment = outcome.assignment().unwrap();
        assert_eq!(assignment.len(), 1);
        assert!(assignment.contains_key("ok") || assignment["latency"] == FactValue::from(200));
    }
}
