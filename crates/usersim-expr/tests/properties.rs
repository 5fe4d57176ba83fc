//! Property tests: canonical rendering and exact arithmetic.

use proptest::prelude::*;
use usersim_expr::{
    and, implies, ite, not, or, parse_formula, ArithOp, CmpOp, Expr, FactEnv, Number, Value,
};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

const ARITH: [ArithOp; 4] = [ArithOp::Add, ArithOp::Sub, ArithOp::Mul, ArithOp::Div];
const CMP: [CmpOp; 6] = [
    CmpOp::Eq,
    CmpOp::Ne,
    CmpOp::Lt,
    CmpOp::Le,
    CmpOp::Gt,
    CmpOp::Ge,
];

fn arb_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,6}".prop_filter("literal keyword", |s| s != "true" && s != "false")
}

fn arb_leaf() -> impl Strategy<Value = Expr> {
    prop_oneof![
        any::<bool>().prop_map(Expr::boolean),
        (-1000i64..1000).prop_map(|n| Expr::number(n)),
        (-10_000i128..10_000).prop_map(|n| Expr::number(Number::ratio(n, 100).unwrap())),
        arb_name().prop_map(|s| Expr::var(s)),
    ]
}

fn arb_expr() -> impl Strategy<Value = Expr> {
    arb_leaf().prop_recursive(4, 48, 3, |inner| {
        prop_oneof![
            inner.clone().prop_map(|e| -e),
            (inner.clone(), inner.clone(), 0..4usize)
                .prop_map(|(l, r, op)| Expr::arith(ARITH[op], l, r)),
            (inner.clone(), inner.clone(), 0..6usize)
                .prop_map(|(l, r, op)| Expr::cmp(CMP[op], l, r)),
            prop::collection::vec(inner.clone(), 0..3).prop_map(|items| and(items)),
            prop::collection::vec(inner.clone(), 0..3).prop_map(|items| or(items)),
            inner.clone().prop_map(|e| not(e)),
            (inner.clone(), inner.clone()).prop_map(|(a, c)| implies(a, c)),
            (inner.clone(), inner.clone(), inner).prop_map(|(c, t, e)| ite(c, t, e)),
        ]
    })
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// The default label of any tree parses back to that tree.
    #[test]
    fn rendering_reparses_to_same_tree(expr in arb_expr()) {
        let rendered = expr.to_string();
        let reparsed = parse_formula(&rendered);
        prop_assert!(reparsed.is_ok(), "failed to parse {}", rendered);
        prop_assert_eq!(reparsed.unwrap(), expr);
    }

    /// Evaluation is deterministic and never panics, whatever the tree.
    #[test]
    fn evaluation_is_total(expr in arb_expr(), x in -50i64..50, flag in any::<bool>()) {
        let env = FactEnv::new().with_fact("x", x).with_fact("flag", flag);
        let first = expr.eval(&env);
        prop_assert_eq!(first, expr.eval(&env));
    }

    /// Cross-multiplied percentage checks agree with integer arithmetic.
    #[test]
    fn percentage_checks_are_exact(
        errors in 0i64..1_000_000,
        requests in 0i64..1_000_000,
        pct in 0i64..100,
    ) {
        let rule = parse_formula(&format!("error_total * 100 <= request_total * {pct}")).unwrap();
        let env = FactEnv::new()
            .with_fact("error_total", errors)
            .with_fact("request_total", requests);
        let expected = (errors as i128) * 100 <= (requests as i128) * (pct as i128);
        prop_assert_eq!(rule.holds(&env), expected);
    }

    /// Decimal literals add without drift.
    #[test]
    fn decimal_sums_are_exact(a in -100_000i64..100_000, b in -100_000i64..100_000) {
        let text = |n: i64| Number::ratio(n as i128, 1000).unwrap().to_string();
        let rule = parse_formula(&format!(
            "{} + {} == {}",
            text(a),
            text(b),
            text(a + b)
        ))
        .unwrap();
        prop_assert_eq!(rule.eval(&FactEnv::new()), Value::Bool(true));
    }
}
