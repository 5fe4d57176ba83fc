//! Human-readable run summary, written to stderr.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};

use usersim_core::{JudgementResult, Report};

const PASS: &str = "✓";
const FAIL: &str = "✗";
const MISSING: &str = "─";

/// Writes per-person lines for a single document, or a persona × scenario
/// grid for a matrix, followed by the totals.
pub fn write_summary<W: Write>(out: &mut W, report: &Report) -> io::Result<()> {
    writeln!(out)?;
    match report {
        Report::Results(doc) => write_people(out, &doc.results)?,
        Report::Matrix(doc) => write_grid(out, &doc.results)?,
    }
    writeln!(out)?;
    writeln!(
        out,
        "  {}/{} satisfied  (score {:.1}%)",
        report.satisfied(),
        report.total(),
        report.score() * 100.0
    )?;
    writeln!(out)
}

fn mark(result: &JudgementResult) -> &'static str {
    if result.satisfied {
        PASS
    } else {
        FAIL
    }
}

fn write_people<W: Write>(out: &mut W, results: &[JudgementResult]) -> io::Result<()> {
    for r in results {
        let first = r
            .violations
            .first()
            .map(|v| format!(" - {v}"))
            .unwrap_or_default();
        writeln!(
            out,
            "  {} {:20} score={:.3}{}",
            mark(r),
            r.person,
            r.score,
            first
        )?;
    }
    Ok(())
}

fn write_grid<W: Write>(out: &mut W, results: &[JudgementResult]) -> io::Result<()> {
    let scenarios: BTreeSet<&str> = results.iter().filter_map(|r| r.path.as_deref()).collect();
    let persons: BTreeSet<&str> = results.iter().map(|r| r.person.as_str()).collect();
    let cells: BTreeMap<(&str, &str), &JudgementResult> = results
        .iter()
        .map(|r| ((r.person.as_str(), r.path.as_deref().unwrap_or_default()), r))
        .collect();

    write!(out, "{:20}", "")?;
    for s in &scenarios {
        let short: String = s.chars().take(12).collect();
        write!(out, "  {short:12}")?;
    }
    writeln!(out)?;
    writeln!(out, "{}", "─".repeat(20 + 14 * scenarios.len()))?;

    for p in &persons {
        write!(out, "  {p:18}")?;
        for s in &scenarios {
            let symbol = cells.get(&(*p, *s)).map(|r| mark(r)).unwrap_or(MISSING);
            write!(out, "  {symbol:>12}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use usersim_core::{MatrixDocument, ResultsDocument};

    fn result(person: &str, path: &str, satisfied: bool) -> JudgementResult {
        JudgementResult {
            person: person.to_string(),
            role: String::new(),
            goal: String::new(),
            pronoun: "they".to_string(),
            path: Some(path.to_string()),
            satisfied,
            score: if satisfied { 1.0 } else { 0.5 },
            constraints: Vec::new(),
            violations: if satisfied {
                Vec::new()
            } else {
                vec!["latency".to_string()]
            },
            error: None,
        }
    }

    fn render(report: &Report) -> String {
        let mut buf = Vec::new();
        write_summary(&mut buf, report).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_people_lines() {
        let doc = ResultsDocument::new(
            Some("s".to_string()),
            vec![result("amy", "s", true), result("zed", "s", false)],
        );
        let text = render(&Report::from(doc));
        assert!(text.contains("✓ amy"));
        assert!(text.contains("✗ zed"));
        assert!(text.contains("score=0.500 - latency"));
        assert!(text.contains("1/2 satisfied  (score 75.0%)"));
    }

    #[test]
    fn test_grid() {
        let results = vec![
            result("amy", "a", true),
            result("amy", "b", false),
            result("zed", "a", true),
        ];
        let doc = MatrixDocument {
            schema: usersim_core::MATRIX_SCHEMA.to_string(),
            summary: summarize(&results),
            results,
        };
        let text = render(&Report::from(doc));
        let zed_row = text.lines().find(|l| l.contains("zed")).unwrap();
        assert!(zed_row.contains(PASS));
        assert!(zed_row.contains(MISSING));
    }

    fn summarize(results: &[JudgementResult]) -> usersim_core::MatrixSummary {
        usersim_core::MatrixSummary::from_results(results, &Default::default())
    }
}
