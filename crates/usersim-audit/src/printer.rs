//! Human-readable audit report.

use std::fmt;

use crate::models::AuditReport;

/// Always-passing rows shown before the remainder is summarized.
const ALWAYS_PASSING_SHOWN: usize = 20;

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.summary;
        writeln!(f)?;
        writeln!(f, "=== usersim constraint audit ===")?;
        writeln!(
            f,
            "Persons: {}  Scenarios: {}",
            self.persons.len(),
            self.paths.len()
        )?;
        writeln!(f, "Effective tests:  {}", group_thousands(s.effective_tests))?;
        writeln!(f, "Constraint evals: {}", group_thousands(s.constraint_evals))?;
        writeln!(f, "Pass rate:        {}/{}", s.satisfied, s.total)?;

        writeln!(f)?;
        writeln!(f, "--- Vacuous constraints ({}) ---", s.vacuous_count)?;
        if self.vacuous.is_empty() {
            writeln!(f, "  none ✓")?;
        }
        for v in &self.vacuous {
            writeln!(f, "  {}: {}", v.person, v.label)?;
        }

        writeln!(f)?;
        writeln!(
            f,
            "--- Always-passing constraints ({}) ---",
            s.always_passing_count
        )?;
        writeln!(
            f,
            "    (100% pass rate: run a deliberately broken scenario to confirm these can fail)"
        )?;
        if self.always_passing.is_empty() {
            writeln!(f, "  none (every constraint has at least one failure path)")?;
        }
        for v in self.always_passing.iter().take(ALWAYS_PASSING_SHOWN) {
            writeln!(f, "  {}: {}  ({}/{})", v.person, v.label, v.pass, v.total)?;
        }
        if self.always_passing.len() > ALWAYS_PASSING_SHOWN {
            writeln!(
                f,
                "  ... and {} more",
                self.always_passing.len() - ALWAYS_PASSING_SHOWN
            )?;
        }

        writeln!(f)?;
        writeln!(f, "--- Constraint count per persona ---")?;
        for row in &self.counts_per_persona {
            let flag = if row.underweighted { "  (underweighted)" } else { "" };
            writeln!(
                f,
                "  {:<30} {:>5.1} constraints/path{}",
                row.person, row.avg_constraints, flag
            )?;
        }

        writeln!(f)?;
        writeln!(f, "--- Most variable coverage (top {}) ---", self.top_density.len())?;
        for row in &self.top_density {
            writeln!(f, "  {} vars  {}", row.vars, row.label)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "--- Least variable coverage (bottom {}) ---",
            self.bottom_density.len()
        )?;
        for row in &self.bottom_density {
            writeln!(f, "  {} vars  {}", row.vars, row.label)?;
        }

        writeln!(f)?;
        writeln!(f, "--- Dead facts ({}) ---", s.dead_facts_count)?;
        if let Some(reason) = &self.dead_facts_error {
            writeln!(f, "  (skipped: {reason})")?;
        } else if self.dead_facts.is_empty() {
            writeln!(f, "  none ✓")?;
        } else {
            for name in &self.dead_facts {
                writeln!(f, "  {name}")?;
            }
        }
        Ok(())
    }
}

/// `1234567` → `"1,234,567"`.
fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
