use std::collections::HashMap;

use valuation_core::ParsedInputs;

use crate::ast::{BinaryOp, Expr};
use crate::FormulaError;

/// The only variables a formula can see. `None` values are bound but missing.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    vars: HashMap<String, Option<f64>>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_inputs(inputs: &ParsedInputs) -> Self {
        Self {
            vars: inputs.iter().map(|(k, v)| (k.to_string(), v)).collect(),
        }
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Option<f64>) {
        self.vars.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn lookup(&self, name: &str) -> Result<Option<f64>, FormulaError> {
        self.vars
            .get(name)
            .copied()
            .ok_or_else(|| FormulaError::UnknownVariable(name.to_string()))
    }
}

fn truthy(v: Option<f64>) -> bool {
    matches!(v, Some(x) if x != 0.0 && !x.is_nan())
}

fn flag(b: bool) -> Option<f64> {
    Some(if b { 1.0 } else { 0.0 })
}

/// Evaluate an expression.
///
/// Arithmetic over a missing operand is missing. `==` and `!=` treat missing
/// as a value of its own, ordering comparisons against missing are false, and
/// only the taken branch of a guard is evaluated.
pub fn evaluate(expr: &Expr, ns: &Namespace) -> Result<Option<f64>, FormulaError> {
    match expr {
        Expr::Number(n) => Ok(Some(*n)),
        Expr::Missing => Ok(None),
        Expr::Variable(name) => ns.lookup(name),
        Expr::Neg(inner) => Ok(evaluate(inner, ns)?.map(|v| -v)),
        Expr::Not(inner) => Ok(flag(!truthy(evaluate(inner, ns)?))),
        Expr::Guard {
            cond,
            then,
            otherwise,
        } => {
            if truthy(evaluate(cond, ns)?) {
                evaluate(then, ns)
            } else {
                evaluate(otherwise, ns)
            }
        }
        Expr::Binary { op, left, right } => match op {
            BinaryOp::And => {
                if !truthy(evaluate(left, ns)?) {
                    return Ok(flag(false));
                }
                Ok(flag(truthy(evaluate(right, ns)?)))
            }
            BinaryOp::Or => {
                if truthy(evaluate(left, ns)?) {
                    return Ok(flag(true));
                }
                Ok(flag(truthy(evaluate(right, ns)?)))
            }
            _ => {
                let l = evaluate(left, ns)?;
                let r = evaluate(right, ns)?;
                apply(*op, l, r)
            }
        },
    }
}

fn apply(op: BinaryOp, l: Option<f64>, r: Option<f64>) -> Result<Option<f64>, FormulaError> {
    Ok(match (op, l, r) {
        (BinaryOp::Eq, l, r) => flag(l == r),
        (BinaryOp::Ne, l, r) => flag(l != r),
        (BinaryOp::Div, Some(_), Some(b)) if b == 0.0 => return Err(FormulaError::DivisionByZero),
        (_, Some(a), Some(b)) => match op {
            BinaryOp::Add => Some(a + b),
            BinaryOp::Sub => Some(a - b),
            BinaryOp::Mul => Some(a * b),
            BinaryOp::Div => Some(a / b),
            BinaryOp::Lt => flag(a < b),
            BinaryOp::Le => flag(a <= b),
            BinaryOp::Gt => flag(a > b),
            BinaryOp::Ge => flag(a >= b),
            BinaryOp::Eq => flag(a == b),
            BinaryOp::Ne => flag(a != b),
            BinaryOp::And => flag(truthy(l) && truthy(r)),
            BinaryOp::Or => flag(truthy(l) || truthy(r)),
        },
        (BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge, _, _) => flag(false),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    fn ns() -> Namespace {
        let mut ns = Namespace::new();
        ns.bind("price", Some(100.0));
        ns.bind("shares", Some(1_000_000.0));
        ns.bind("zero", Some(0.0));
        ns.bind("blank", None);
        ns
    }

    fn eval(src: &str) -> Result<Option<f64>, FormulaError> {
        evaluate(&parse(src).unwrap(), &ns())
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("price * shares"), Ok(Some(100_000_000.0)));
        assert_eq!(eval("(price + 20) / 4 - -1"), Ok(Some(31.0)));
        assert_eq!(eval("1e2 * 2"), Ok(Some(200.0)));
    }

    #[test]
    fn test_missing_propagates() {
        assert_eq!(eval("price + blank"), Ok(None));
        assert_eq!(eval("-blank"), Ok(None));
        assert_eq!(eval("blank / zero"), Ok(None));
        assert_eq!(eval("none"), Ok(None));
    }

    #[test]
    fn test_guards_withhold_division() {
        assert_eq!(eval("zero != 0 ? price / zero : none"), Ok(None));
        assert_eq!(eval("shares != 0 ? price / shares : none"), Ok(Some(0.0001)));
        assert_eq!(eval("blank != 0 ? price / blank : none"), Ok(None));
        assert_eq!(eval("blank == none ? 1 : 2"), Ok(Some(1.0)));
    }

    #[test]
    fn test_unguarded_division_by_zero_is_error() {
        assert_eq!(eval("price / zero"), Err(FormulaError::DivisionByZero));
    }

    #[test]
    fn test_unknown_variable() {
        assert_eq!(
            eval("price * later_result"),
            Err(FormulaError::UnknownVariable("later_result".to_string()))
        );
    }

    #[test]
    fn test_comparisons_and_logic() {
        assert_eq!(eval("price > 50 && shares >= 1000000"), Ok(Some(1.0)));
        assert_eq!(eval("price < 50 || zero"), Ok(Some(0.0)));
        assert_eq!(eval("blank > 0"), Ok(Some(0.0)));
        assert_eq!(eval("blank <= 0"), Ok(Some(0.0)));
        assert_eq!(eval("!zero"), Ok(Some(1.0)));
        assert_eq!(eval("!blank"), Ok(Some(1.0)));
    }

    #[test]
    fn test_short_circuit_skips_errors() {
        assert_eq!(eval("zero && price / zero"), Ok(Some(0.0)));
        assert_eq!(eval("price || undefined_name"), Ok(Some(1.0)));
    }
}
