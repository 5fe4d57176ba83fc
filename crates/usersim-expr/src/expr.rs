//! # Expression Algebra
//!
//! Immutable boolean and arithmetic expression trees with named, inspectable
//! structure.
//!
//! ## Overview
//!
//! An [`Expr`] is a shared [`Node`] plus an optional label. Cloning is cheap
//! (`Arc`), so personas can hand out the same sub-formula many times.
//!
//! | Node | Built with | Canonical text |
//! |------|------------|----------------|
//! | literal | `Expr::boolean`, `Expr::number`, `From` | `true`, `12`, `0.5` |
//! | variable | `Expr::var`, `FactEnv::fact` | `error_total` |
//! | arithmetic | `+ - * /`, unary `-` | `a * 100` |
//! | comparison | `eq ne lt le gt ge` | `a <= b` |
//! | connective | [`and`], [`or`], [`not`] | `And(a, b)` |
//! | implication | [`implies`] | `Implies(a, b)` |
//! | conditional | [`ite`] | `If(c, t, e)` |
//!
//! Implications keep their antecedent reachable through
//! [`Expr::antecedent`] so the judge can report whether a conditional
//! constraint actually fired.
//!
//! ## Evaluation
//!
//! [`Expr::eval`] is total. `And`, `Or`, `Implies` and `If` short-circuit
//! left to right, so a guard protects the operands behind it. Ill-sorted
//! operands, division by zero and overflow produce [`Value::Undefined`],
//! which never counts as `true`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops;
use std::sync::Arc;

use crate::env::FactEnv;
use crate::error::{ExprError, Result};
use crate::number::Number;
use crate::value::{Sort, Value};

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
        }
    }

    fn apply(self, lhs: Number, rhs: Number) -> Option<Number> {
        match self {
            ArithOp::Add => lhs.checked_add(rhs),
            ArithOp::Sub => lhs.checked_sub(rhs),
            ArithOp::Mul => lhs.checked_mul(rhs),
            ArithOp::Div => lhs.checked_div(rhs),
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    /// Equality-style operators accept either sort.
    pub fn is_equality(self) -> bool {
        matches!(self, CmpOp::Eq | CmpOp::Ne)
    }

    fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CmpOp::Eq => ordering == Equal,
            CmpOp::Ne => ordering != Equal,
            CmpOp::Lt => ordering == Less,
            CmpOp::Le => ordering != Greater,
            CmpOp::Gt => ordering == Greater,
            CmpOp::Ge => ordering != Less,
        }
    }
}

/// One node of an expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Bool(bool),
    Num(Number),
    Var(String),
    Neg(Expr),
    Arith(ArithOp, Expr, Expr),
    Cmp(CmpOp, Expr, Expr),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Expr),
    Implies(Expr, Expr),
    Ite(Expr, Expr, Expr),
}

/// An immutable expression with an optional explicit label.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    node: Arc<Node>,
    label: Option<Arc<str>>,
}

#[allow(clippy::should_implement_trait)]
impl Expr {
    fn from_node(node: Node) -> Self {
        Self {
            node: Arc::new(node),
            label: None,
        }
    }

    pub fn var(name: impl Into<String>) -> Self {
        Self::from_node(Node::Var(name.into()))
    }

    pub fn boolean(b: bool) -> Self {
        Self::from_node(Node::Bool(b))
    }

    pub fn number(n: impl Into<Number>) -> Self {
        Self::from_node(Node::Num(n.into()))
    }

    pub fn arith(op: ArithOp, lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Self::from_node(Node::Arith(op, lhs.into(), rhs.into()))
    }

    pub fn cmp(op: CmpOp, lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Self::from_node(Node::Cmp(op, lhs.into(), rhs.into()))
    }

    pub fn eq(self, other: impl Into<Expr>) -> Self {
        Self::cmp(CmpOp::Eq, self, other)
    }

    pub fn ne(self, other: impl Into<Expr>) -> Self {
        Self::cmp(CmpOp::Ne, self, other)
    }

    pub fn lt(self, other: impl Into<Expr>) -> Self {
        Self::cmp(CmpOp::Lt, self, other)
    }

    pub fn le(self, other: impl Into<Expr>) -> Self {
        Self::cmp(CmpOp::Le, self, other)
    }

    pub fn gt(self, other: impl Into<Expr>) -> Self {
        Self::cmp(CmpOp::Gt, self, other)
    }

    pub fn ge(self, other: impl Into<Expr>) -> Self {
        Self::cmp(CmpOp::Ge, self, other)
    }

    pub fn not(self) -> Self {
        not(self)
    }

    pub fn implies(self, consequent: impl Into<Expr>) -> Self {
        implies(self, consequent)
    }

    /// Attaches an explicit label, replacing any previous one.
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        let label: String = label.into();
        self.label = Some(Arc::from(label.as_str()));
        self
    }

    /// The explicit label, or the canonical rendering when none was set.
    pub fn label(&self) -> String {
        match &self.label {
            Some(label) => label.to_string(),
            None => self.to_string(),
        }
    }

    pub fn explicit_label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn is_implication(&self) -> bool {
        matches!(*self.node, Node::Implies(..))
    }

    /// The retained antecedent of an implication.
    pub fn antecedent(&self) -> Option<&Expr> {
        match &*self.node {
            Node::Implies(antecedent, _) => Some(antecedent),
            _ => None,
        }
    }

    pub fn consequent(&self) -> Option<&Expr> {
        match &*self.node {
            Node::Implies(_, consequent) => Some(consequent),
            _ => None,
        }
    }

    /// Direct children, left to right.
    pub fn children(&self) -> Vec<&Expr> {
        match &*self.node {
            Node::Bool(_) | Node::Num(_) | Node::Var(_) => Vec::new(),
            Node::Neg(e) | Node::Not(e) => vec![e],
            Node::Arith(_, l, r) | Node::Cmp(_, l, r) | Node::Implies(l, r) => vec![l, r],
            Node::And(items) | Node::Or(items) => items.iter().collect(),
            Node::Ite(c, t, e) => vec![c, t, e],
        }
    }

    /// Distinct variable names referenced anywhere in the tree.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut BTreeSet<String>) {
        if let Node::Var(name) = &*self.node {
            out.insert(name.clone());
        }
        for child in self.children() {
            child.collect_variables(out);
        }
    }

    /// Numeric literals in the tree, deduplicated and sorted.
    pub fn literals(&self) -> Vec<Number> {
        let mut out = BTreeSet::new();
        self.collect_literals(&mut out);
        out.into_iter().collect()
    }

    fn collect_literals(&self, out: &mut BTreeSet<Number>) {
        if let Node::Num(n) = &*self.node {
            out.insert(*n);
        }
        for child in self.children() {
            child.collect_literals(out);
        }
    }

    /// The sort each variable is used at, judged from its context alone.
    ///
    /// Variables compared for equality against another variable come back as
    /// [`Sort::Any`].
    pub fn variable_sorts(&self) -> BTreeMap<String, Sort> {
        let mut out = BTreeMap::new();
        self.collect_sorts(Sort::Bool, &mut out);
        out
    }

    fn collect_sorts(&self, expected: Sort, out: &mut BTreeMap<String, Sort>) {
        match &*self.node {
            Node::Bool(_) | Node::Num(_) => {}
            Node::Var(name) => {
                let entry = out.entry(name.clone()).or_insert(expected);
                if let Some(unified) = entry.unify(expected) {
                    *entry = unified;
                }
            }
            Node::Neg(e) => e.collect_sorts(Sort::Num, out),
            Node::Arith(_, l, r) => {
                l.collect_sorts(Sort::Num, out);
                r.collect_sorts(Sort::Num, out);
            }
            Node::Cmp(op, l, r) if op.is_equality() => {
                let shared = l.shape_sort().unify(r.shape_sort()).unwrap_or(Sort::Any);
                l.collect_sorts(shared, out);
                r.collect_sorts(shared, out);
            }
            Node::Cmp(_, l, r) => {
                l.collect_sorts(Sort::Num, out);
                r.collect_sorts(Sort::Num, out);
            }
            Node::And(items) | Node::Or(items) => {
                for item in items {
                    item.collect_sorts(Sort::Bool, out);
                }
            }
            Node::Not(e) => e.collect_sorts(Sort::Bool, out),
            Node::Implies(a, c) => {
                a.collect_sorts(Sort::Bool, out);
                c.collect_sorts(Sort::Bool, out);
            }
            Node::Ite(c, t, e) => {
                c.collect_sorts(Sort::Bool, out);
                t.collect_sorts(expected, out);
                e.collect_sorts(expected, out);
            }
        }
    }

    /// Sort implied by the node kind, without consulting any facts.
    fn shape_sort(&self) -> Sort {
        match &*self.node {
            Node::Bool(_) | Node::Cmp(..) | Node::And(_) | Node::Or(_) | Node::Not(_) => Sort::Bool,
            Node::Implies(..) => Sort::Bool,
            Node::Num(_) | Node::Neg(_) | Node::Arith(..) => Sort::Num,
            Node::Var(_) => Sort::Any,
            Node::Ite(_, t, e) => t.shape_sort().unify(e.shape_sort()).unwrap_or(Sort::Any),
        }
    }

    /// Infers the sort of this expression given the observed facts.
    ///
    /// Unobserved variables take whatever sort their context needs.
    pub fn check_sort(&self, env: &FactEnv) -> Result<Sort> {
        match &*self.node {
            Node::Bool(_) => Ok(Sort::Bool),
            Node::Num(_) => Ok(Sort::Num),
            Node::Var(name) => Ok(env.get(name).map(|v| v.sort()).unwrap_or(Sort::Any)),
            Node::Neg(e) => {
                e.expect_sort(env, Sort::Num)?;
                Ok(Sort::Num)
            }
            Node::Arith(_, l, r) => {
                l.expect_sort(env, Sort::Num)?;
                r.expect_sort(env, Sort::Num)?;
                Ok(Sort::Num)
            }
            Node::Cmp(op, l, r) if op.is_equality() => {
                let ls = l.check_sort(env)?;
                let rs = r.check_sort(env)?;
                if ls.unify(rs).is_none() {
                    return Err(ExprError::Sort {
                        expr: self.to_string(),
                        expected: ls,
                        found: rs,
                    });
                }
                Ok(Sort::Bool)
            }
            Node::Cmp(_, l, r) => {
                l.expect_sort(env, Sort::Num)?;
                r.expect_sort(env, Sort::Num)?;
                Ok(Sort::Bool)
            }
            Node::And(items) | Node::Or(items) => {
                for item in items {
                    item.expect_sort(env, Sort::Bool)?;
                }
                Ok(Sort::Bool)
            }
            Node::Not(e) => {
                e.expect_sort(env, Sort::Bool)?;
                Ok(Sort::Bool)
            }
            Node::Implies(a, c) => {
                a.expect_sort(env, Sort::Bool)?;
                c.expect_sort(env, Sort::Bool)?;
                Ok(Sort::Bool)
            }
            Node::Ite(c, t, e) => {
                c.expect_sort(env, Sort::Bool)?;
                let ts = t.check_sort(env)?;
                let es = e.check_sort(env)?;
                ts.unify(es).ok_or_else(|| ExprError::Sort {
                    expr: self.to_string(),
                    expected: ts,
                    found: es,
                })
            }
        }
    }

    fn expect_sort(&self, env: &FactEnv, expected: Sort) -> Result<()> {
        let found = self.check_sort(env)?;
        if found.fits(expected) {
            Ok(())
        } else {
            Err(ExprError::Sort {
                expr: self.to_string(),
                expected,
                found,
            })
        }
    }

    /// Checks that this expression can stand as a constraint.
    pub fn check_proposition(&self, env: &FactEnv) -> Result<()> {
        self.expect_sort(env, Sort::Bool)
    }

    /// Evaluates against a grounded environment. Never fails.
    pub fn eval(&self, env: &FactEnv) -> Value {
        let sentinel = env.sentinel();
        match &*self.node {
            Node::Bool(b) => Value::Bool(*b),
            Node::Num(n) => Value::Num(*n),
            Node::Var(name) => env.lookup(name),
            Node::Neg(e) => match e.eval(env).as_num(sentinel).and_then(Number::checked_neg) {
                Some(n) => Value::Num(n),
                None => Value::Undefined,
            },
            Node::Arith(op, l, r) => {
                let lhs = l.eval(env).as_num(sentinel);
                let rhs = r.eval(env).as_num(sentinel);
                match (lhs, rhs) {
                    (Some(a), Some(b)) => op.apply(a, b).map_or(Value::Undefined, Value::Num),
                    _ => Value::Undefined,
                }
            }
            Node::Cmp(op, l, r) => compare(*op, l.eval(env), r.eval(env), sentinel),
            Node::And(items) => {
                for item in items {
                    match item.eval(env).as_bool() {
                        Some(true) => {}
                        Some(false) => return Value::Bool(false),
                        None => return Value::Undefined,
                    }
                }
                Value::Bool(true)
            }
            Node::Or(items) => {
                for item in items {
                    match item.eval(env).as_bool() {
                        Some(false) => {}
                        Some(true) => return Value::Bool(true),
                        None => return Value::Undefined,
                    }
                }
                Value::Bool(false)
            }
            Node::Not(e) => e.eval(env).as_bool().map_or(Value::Undefined, |b| Value::Bool(!b)),
            Node::Implies(a, c) => match a.eval(env).as_bool() {
                Some(false) => Value::Bool(true),
                Some(true) => c
                    .eval(env)
                    .as_bool()
                    .map_or(Value::Undefined, Value::Bool),
                None => Value::Undefined,
            },
            Node::Ite(c, t, e) => match c.eval(env).as_bool() {
                Some(true) => t.eval(env),
                Some(false) => e.eval(env),
                None => Value::Undefined,
            },
        }
    }

    /// True iff the expression evaluates to a definite `true`.
    pub fn holds(&self, env: &FactEnv) -> bool {
        self.eval(env).as_bool() == Some(true)
    }

    /// Binding strength used by the canonical rendering.
    fn precedence(&self) -> u8 {
        match &*self.node {
            Node::Cmp(..) => PREC_CMP,
            Node::Arith(ArithOp::Add | ArithOp::Sub, ..) => PREC_SUM,
            Node::Arith(ArithOp::Mul | ArithOp::Div, ..) => PREC_PRODUCT,
            Node::Neg(_) => PREC_UNARY,
            Node::Num(n) if n.is_negative() => PREC_UNARY,
            _ => PREC_ATOM,
        }
    }

    fn fmt_at(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        if self.precedence() < min {
            write!(f, "(")?;
            self.fmt_node(f)?;
            write!(f, ")")
        } else {
            self.fmt_node(f)
        }
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.node {
            Node::Bool(b) => write!(f, "{b}"),
            Node::Num(n) if n.is_integer() => write!(f, "{n}"),
            Node::Num(n) => {
                let text = n.to_string();
                if text.contains('/') {
                    write!(f, "({} / {})", n.numer(), n.denom())
                } else {
                    f.write_str(&text)
                }
            }
            Node::Var(name) => f.write_str(name),
            Node::Neg(e) => {
                write!(f, "-")?;
                // `-3` would read back as a literal, so keep the operand apart.
                if matches!(e.node(), Node::Num(n) if !n.is_negative()) {
                    write!(f, "({e})")
                } else {
                    e.fmt_at(f, PREC_UNARY)
                }
            }
            Node::Arith(op, l, r) => {
                let prec = self.precedence();
                l.fmt_at(f, prec)?;
                write!(f, " {} ", op.symbol())?;
                r.fmt_at(f, prec + 1)
            }
            Node::Cmp(op, l, r) => {
                l.fmt_at(f, PREC_SUM)?;
                write!(f, " {} ", op.symbol())?;
                r.fmt_at(f, PREC_SUM)
            }
            Node::And(items) => fmt_call(f, "And", items.iter()),
            Node::Or(items) => fmt_call(f, "Or", items.iter()),
            Node::Not(e) => fmt_call(f, "Not", [e]),
            Node::Implies(a, c) => fmt_call(f, "Implies", [a, c]),
            Node::Ite(c, t, e) => fmt_call(f, "If", [c, t, e]),
        }
    }
}

const PREC_CMP: u8 = 1;
const PREC_SUM: u8 = 2;
const PREC_PRODUCT: u8 = 3;
const PREC_UNARY: u8 = 4;
const PREC_ATOM: u8 = 5;

fn fmt_call<'a>(
    f: &mut fmt::Formatter<'_>,
    name: &str,
    args: impl IntoIterator<Item = &'a Expr>,
) -> fmt::Result {
    write!(f, "{name}(")?;
    for (i, arg) in args.into_iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        arg.fmt_node(f)?;
    }
    write!(f, ")")
}

fn compare(op: CmpOp, lhs: Value, rhs: Value, sentinel: Number) -> Value {
    if lhs == Value::Undefined || rhs == Value::Undefined {
        return Value::Undefined;
    }
    if op.is_equality() {
        let bools = match (lhs, rhs) {
            (Value::Bool(a), other) | (other, Value::Bool(a)) => Some((a, other.as_bool())),
            _ => None,
        };
        if let Some((a, b)) = bools {
            return match b {
                Some(b) => Value::Bool(op.holds(a.cmp(&b))),
                None => Value::Undefined,
            };
        }
    }
    match (lhs.as_num(sentinel), rhs.as_num(sentinel)) {
        (Some(a), Some(b)) => Value::Bool(op.holds(a.cmp(&b))),
        _ => Value::Undefined,
    }
}

impl fmt::Display for Expr {
    /// Canonical rendering. Formulas read by the parser render back to text
    /// that parses to the same tree.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(f)
    }
}

/// Conjunction of any number of expressions. Empty means `true`.
pub fn and<I>(items: I) -> Expr
where
    I: IntoIterator,
    I::Item: Into<Expr>,
{
    Expr::from_node(Node::And(items.into_iter().map(Into::into).collect()))
}

/// Disjunction of any number of expressions. Empty means `false`.
pub fn or<I>(items: I) -> Expr
where
    I: IntoIterator,
    I::Item: Into<Expr>,
{
    Expr::from_node(Node::Or(items.into_iter().map(Into::into).collect()))
}

pub fn not(expr: impl Into<Expr>) -> Expr {
    Expr::from_node(Node::Not(expr.into()))
}

/// `antecedent => consequent`, keeping the antecedent inspectable.
pub fn implies(antecedent: impl Into<Expr>, consequent: impl Into<Expr>) -> Expr {
    Expr::from_node(Node::Implies(antecedent.into(), consequent.into()))
}

/// `If(cond, then, else)`.
pub fn ite(cond: impl Into<Expr>, then: impl Into<Expr>, otherwise: impl Into<Expr>) -> Expr {
    Expr::from_node(Node::Ite(cond.into(), then.into(), otherwise.into()))
}

/// Attaches a stable label to an expression.
pub fn named(label: impl Into<String>, expr: impl Into<Expr>) -> Expr {
    expr.into().labeled(label)
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::boolean(b)
    }
}

impl From<Number> for Expr {
    fn from(n: Number) -> Self {
        Expr::number(n)
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Expr::number(n)
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        Expr::number(n)
    }
}

impl From<&Expr> for Expr {
    fn from(e: &Expr) -> Self {
        e.clone()
    }
}

macro_rules! arith_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<T: Into<Expr>> ops::$trait<T> for Expr {
            type Output = Expr;

            fn $method(self, rhs: T) -> Expr {
                Expr::arith($op, self, rhs)
            }
        }

        impl<T: Into<Expr>> ops::$trait<T> for &Expr {
            type Output = Expr;

            fn $method(self, rhs: T) -> Expr {
                Expr::arith($op, self.clone(), rhs)
            }
        }
    };
}

arith_op!(Add, add, ArithOp::Add);
arith_op!(Sub, sub, ArithOp::Sub);
arith_op!(Mul, mul, ArithOp::Mul);
arith_op!(Div, div, ArithOp::Div);

impl ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::from_node(Node::Neg(self))
    }
}

impl ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        not(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> FactEnv {
        FactEnv::new()
            .with_fact("request_total", 100)
            .with_fact("error_total", 2)
            .with_fact("is_fast", true)
    }

    #[test]
    fn test_cross_multiplied_percentage() {
        let e = (Expr::var("error_total") * 100).le(Expr::var("request_total") * 1);
        assert!(!e.holds(&env()));
        let ok = env().with_fact("error_total", 1);
        assert!(e.holds(&ok));
    }

    #[test]
    fn test_implication_retains_antecedent() {
        let guard = Expr::var("p99_ms").ge(0);
        let e = implies(guard.clone(), Expr::var("p99_ms").le(500));
        assert_eq!(e.antecedent(), Some(&guard));
        assert!(e.is_implication());
        assert!(Expr::var("x").antecedent().is_none());
    }

    #[test]
    fn test_unobserved_guard_is_vacuous() {
        let e = implies(Expr::var("p99_ms").ge(0), Expr::var("p99_ms").le(500));
        let empty = FactEnv::new();
        assert!(e.holds(&empty));
        assert!(!e.antecedent().unwrap().holds(&empty));
    }

    #[test]
    fn test_and_or_flatten_iterables() {
        let checks = vec![Expr::var("is_fast"), Expr::var("request_total").gt(10)];
        assert!(and(checks.clone()).holds(&env()));
        assert!(or([Expr::boolean(false), Expr::var("is_fast")]).holds(&env()));
        assert!(and(Vec::<Expr>::new()).holds(&env()));
        assert!(!or(Vec::<Expr>::new()).holds(&env()));
    }

    #[test]
    fn test_guard_short_circuits_division() {
        let e = implies(
            Expr::var("n").gt(0),
            (Expr::var("total") / Expr::var("n")).le(10),
        );
        let env = FactEnv::new().with_fact("n", 0).with_fact("total", 5);
        assert!(e.holds(&env));
    }

    #[test]
    fn test_division_by_zero_is_undefined() {
        let e = (Expr::number(1) / Expr::number(0)).eq(1);
        assert_eq!(e.eval(&FactEnv::new()), Value::Undefined);
        assert!(!e.holds(&FactEnv::new()));
        assert!(!not(e).holds(&FactEnv::new()));
    }

    #[test]
    fn test_bool_equality() {
        assert!(Expr::var("is_fast").eq(true).holds(&env()));
        assert!(Expr::var("missing").eq(false).holds(&env()));
    }

    #[test]
    fn test_ite_selects_branch() {
        let e = ite(Expr::var("is_fast"), Expr::number(1), Expr::number(2)).eq(1);
        assert!(e.holds(&env()));
    }

    #[test]
    fn test_default_label_is_rendering() {
        let e = implies(
            Expr::var("request_total").ge(1),
            (Expr::var("error_total") * 10).le(Expr::var("request_total")),
        );
        assert_eq!(
            e.label(),
            "Implies(request_total >= 1, error_total * 10 <= request_total)"
        );
        assert!(e.explicit_label().is_none());
        let named = named("reliability/errors", e);
        assert_eq!(named.label(), "reliability/errors");
    }

    #[test]
    fn test_rendering_parenthesizes() {
        let e = (Expr::var("a") - (Expr::var("b") - Expr::var("c"))) * 2;
        assert_eq!(e.to_string(), "(a - (b - c)) * 2");
        assert_eq!((-Expr::number(3)).to_string(), "-(3)");
        assert_eq!(Expr::number(Number::int(-3)).to_string(), "-3");
    }

    #[test]
    fn test_variables_and_literals() {
        let e = and([
            Expr::var("b").gt(Expr::number(Number::parse_decimal("0.5").unwrap())),
            Expr::var("a").le(Expr::var("b") + 3),
        ]);
        let vars: Vec<_> = e.variables().into_iter().collect();
        assert_eq!(vars, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(e.literals().len(), 2);
    }

    #[test]
    fn test_variable_sorts_from_context() {
        let e = and([Expr::var("flag"), Expr::var("count").ge(1), Expr::var("x").eq(Expr::var("y"))]);
        let sorts = e.variable_sorts();
        assert_eq!(sorts["flag"], Sort::Bool);
        assert_eq!(sorts["count"], Sort::Num);
        assert_eq!(sorts["x"], Sort::Any);
    }

    #[test]
    fn test_check_sort_flags_bool_in_arithmetic() {
        let e = (Expr::var("is_fast") + 1).gt(0);
        let err = e.check_proposition(&env()).unwrap_err();
        assert!(matches!(err, ExprError::Sort { expected: Sort::Num, found: Sort::Bool, .. }));
        assert!(Expr::var("request_total").check_proposition(&env()).is_err());
        assert!(Expr::var("unknown").check_proposition(&env()).is_ok());
    }
}
