//! Audit over a matrix produced by the judge.

use usersim_audit::AuditAnalyzer;
use usersim_expr::{parse_formula, FactEnv};
use usersim_judge::{DeclaredPersona, MatrixAggregator, PersonaProfile, ScenarioInput};

fn persona(name: &str, formulas: &[&str]) -> DeclaredPersona {
    let constraints = formulas.iter().map(|f| parse_formula(f).unwrap()).collect();
    DeclaredPersona::new(PersonaProfile::new(name), constraints)
}

// =============================================================================
// End to end
// =============================================================================

#[test]
fn test_matrix_audit() {
    let personas = vec![
        persona(
            "ops",
            &[
                "Implies(queue_depth >= 0, queue_depth <= 100)",
                "Implies(crash_count >= 1, restarted)",
            ],
        ),
        persona("dev", &["build_ok", "warnings <= 10"]),
    ];
    let base = || {
        FactEnv::new()
            .with_fact("queue_depth", 12)
            .with_fact("build_ok", true)
            .with_fact("warnings", 3)
            .with_fact("crash_count", 0)
    };
    let scenarios = vec![
        ScenarioInput::new("a", base()),
        ScenarioInput::new("b", base().with_fact("warnings", 40)),
        ScenarioInput::new("c", base()),
    ];
    let matrix = MatrixAggregator::default().run(&personas, &scenarios);
    let doc = serde_json::to_value(&matrix).unwrap();

    let report = AuditAnalyzer::new()
        .with_known_facts(["queue_depth", "build_ok", "warnings", "crash_count", "uptime_s"])
        .analyze_value(&doc)
        .unwrap();

    // The crash guard never fired in any scenario.
    assert_eq!(report.vacuous.len(), 1);
    assert_eq!(report.vacuous[0].person, "ops");
    assert_eq!(report.vacuous[0].label, "Implies(crash_count >= 1, restarted)");

    let always: Vec<_> = report
        .always_passing
        .iter()
        .map(|a| (a.person.as_str(), a.label.as_str()))
        .collect();
    assert_eq!(
        always,
        vec![
            ("dev", "build_ok"),
            ("ops", "Implies(queue_depth >= 0, queue_depth <= 100)"),
        ]
    );

    assert_eq!(report.dead_facts, vec!["uptime_s"]);
    assert_eq!(report.summary.total, 6);
    assert_eq!(report.summary.satisfied, 5);
    assert_eq!(report.paths, vec!["a", "b", "c"]);

    let text = report.to_string();
    assert!(text.contains("--- Vacuous constraints (1) ---"));
    assert!(text.contains("  uptime_s"));
}

#[test]
fn test_audit_does_not_modify_input() {
    let matrix = MatrixAggregator::default().run(
        &[persona("dev", &["ok"])],
        &[ScenarioInput::new("a", FactEnv::new())],
    );
    let doc = serde_json::to_value(&matrix).unwrap();
    let before = doc.clone();
    let _ = AuditAnalyzer::new().analyze_value(&doc).unwrap();
    assert_eq!(doc, before);
}
