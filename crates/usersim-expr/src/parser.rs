//! Text formulas to [`Expr`] trees.
//!
//! The grammar lives in `formula.pest`. Binary chains of `&&` and `||`
//! become a single variadic `And`/`Or`; a unary minus written directly in
//! front of a number folds into a negative literal.

use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;

use crate::error::{ExprError, Result};
use crate::expr::{self, ArithOp, CmpOp, Expr};
use crate::number::Number;

#[derive(Parser)]
#[grammar = "formula.pest"]
struct FormulaParser;

/// Parses a formula such as `Implies(p99_ms >= 0, p99_ms <= 500)`.
pub fn parse_formula(source: &str) -> Result<Expr> {
    let mut pairs = FormulaParser::parse(Rule::formula, source).map_err(|e| {
        let (line, column) = match e.line_col {
            pest::error::LineColLocation::Pos(pos) => pos,
            pest::error::LineColLocation::Span(start, _) => start,
        };
        ExprError::Parse {
            formula: source.to_string(),
            message: e.variant.message().to_string(),
            line,
            column,
        }
    })?;

    let formula = next(&mut pairs, source)?;
    let mut inner = formula.into_inner();
    build(next(&mut inner, source)?, source)
}

fn next<'a>(pairs: &mut Pairs<'a, Rule>, source: &str) -> Result<Pair<'a, Rule>> {
    pairs.next().ok_or_else(|| malformed(source, "unexpected end of formula"))
}

fn malformed(source: &str, message: &str) -> ExprError {
    ExprError::Parse {
        formula: source.to_string(),
        message: message.to_string(),
        line: 1,
        column: 1,
    }
}

fn build(pair: Pair<'_, Rule>, source: &str) -> Result<Expr> {
    match pair.as_rule() {
        Rule::expr => {
            let mut inner = pair.into_inner();
            let lhs = build(next(&mut inner, source)?, source)?;
            match inner.next() {
                Some(rhs) => Ok(expr::implies(lhs, build(rhs, source)?)),
                None => Ok(lhs),
            }
        }
        Rule::disjunction | Rule::conjunction => {
            let rule = pair.as_rule();
            let mut items = pair
                .into_inner()
                .map(|p| build(p, source))
                .collect::<Result<Vec<_>>>()?;
            if items.len() == 1 {
                return Ok(items.remove(0));
            }
            Ok(if rule == Rule::disjunction {
                expr::or(items)
            } else {
                expr::and(items)
            })
        }
        Rule::negation => {
            let mut inner = pair.into_inner();
            let first = next(&mut inner, source)?;
            if first.as_rule() == Rule::not_op {
                Ok(expr::not(build(next(&mut inner, source)?, source)?))
            } else {
                build(first, source)
            }
        }
        Rule::comparison => {
            let mut inner = pair.into_inner();
            let lhs = build(next(&mut inner, source)?, source)?;
            match inner.next() {
                Some(op) => {
                    let op = cmp_op(op.as_str(), source)?;
                    let rhs = build(next(&mut inner, source)?, source)?;
                    Ok(Expr::cmp(op, lhs, rhs))
                }
                None => Ok(lhs),
            }
        }
        Rule::sum | Rule::product => {
            let mut inner = pair.into_inner();
            let mut acc = build(next(&mut inner, source)?, source)?;
            while let Some(op) = inner.next() {
                let op = arith_op(op.as_str(), source)?;
                let rhs = build(next(&mut inner, source)?, source)?;
                acc = Expr::arith(op, acc, rhs);
            }
            Ok(acc)
        }
        Rule::unary => {
            let mut inner = pair.into_inner();
            let first = next(&mut inner, source)?;
            if first.as_rule() != Rule::neg_op {
                return build(first, source);
            }
            let operand = next(&mut inner, source)?;
            if let Some(literal) = bare_number(&operand) {
                let n = parse_number(literal)?;
                let negated = n
                    .checked_neg()
                    .ok_or_else(|| ExprError::Literal(format!("-{literal}")))?;
                return Ok(Expr::number(negated));
            }
            Ok(-build(operand, source)?)
        }
        Rule::primary => build(next(&mut pair.into_inner(), source)?, source),
        Rule::number => Ok(Expr::number(parse_number(pair.as_str())?)),
        Rule::boolean => Ok(Expr::boolean(pair.as_str().eq_ignore_ascii_case("true"))),
        Rule::ident => {
            let name = pair.as_str();
            Ok(Expr::var(name.strip_prefix("P.").unwrap_or(name)))
        }
        Rule::call => build_call(pair, source),
        _ => Err(malformed(source, &format!("unexpected {:?}", pair.as_rule()))),
    }
}

/// The literal text when `unary` is exactly a number with nothing around it.
fn bare_number<'a>(unary: &Pair<'a, Rule>) -> Option<&'a str> {
    let primary = unary.clone().into_inner().next()?;
    if primary.as_rule() != Rule::primary {
        return None;
    }
    let atom = primary.into_inner().next()?;
    (atom.as_rule() == Rule::number).then(|| atom.as_str())
}

fn parse_number(text: &str) -> Result<Number> {
    Number::parse_decimal(text).ok_or_else(|| ExprError::Literal(text.to_string()))
}

fn build_call(pair: Pair<'_, Rule>, source: &str) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let name = next(&mut inner, source)?.as_str().to_string();
    let mut args = match inner.next() {
        Some(args) => args
            .into_inner()
            .map(|p| build(p, source))
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    let arity = |expected: usize, found: usize| -> Result<()> {
        if expected == found {
            Ok(())
        } else {
            Err(ExprError::Arity {
                call: name.clone(),
                expected,
                found,
            })
        }
    };

    match name.as_str() {
        "And" => Ok(expr::and(args)),
        "Or" => Ok(expr::or(args)),
        "Not" => {
            arity(1, args.len())?;
            Ok(expr::not(args.remove(0)))
        }
        "Implies" => {
            arity(2, args.len())?;
            let consequent = args.remove(1);
            Ok(expr::implies(args.remove(0), consequent))
        }
        "If" => {
            arity(3, args.len())?;
            let otherwise = args.remove(2);
            let then = args.remove(1);
            Ok(expr::ite(args.remove(0), then, otherwise))
        }
        other => Err(malformed(source, &format!("unknown call {other}"))),
    }
}

fn cmp_op(text: &str, source: &str) -> Result<CmpOp> {
    match text {
        "==" => Ok(CmpOp::Eq),
        "!=" => Ok(CmpOp::Ne),
        "<" => Ok(CmpOp::Lt),
        "<=" | "≤" => Ok(CmpOp::Le),
        ">" => Ok(CmpOp::Gt),
        ">=" | "≥" => Ok(CmpOp::Ge),
        other => Err(malformed(source, &format!("unknown comparison {other}"))),
    }
}

fn arith_op(text: &str, source: &str) -> Result<ArithOp> {
    match text {
        "+" => Ok(ArithOp::Add),
        "-" => Ok(ArithOp::Sub),
        "*" => Ok(ArithOp::Mul),
        "/" => Ok(ArithOp::Div),
        other => Err(malformed(source, &format!("unknown operator {other}"))),
    }
}
