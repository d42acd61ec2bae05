//! Postfix stack reduction
//!
//! The item stack is reduced from its end: an operator pops its right
//! operand first, then its left. A missing variable makes the whole
//! formula evaluate to "no value" rather than an error.

use std::collections::HashMap;

use tracing::trace;

use crate::error::{CalcError, Result};
use crate::lexer::tokenize;
use crate::parser::{parse, BinaryOp, Item};

/// Resolves `$name` and `$name.property` references
pub trait VariableSource {
    fn resolve(&self, name: &str, property: Option<&str>) -> Option<f64>;
}

/// Plain values; `$name.property` looks up the key `name.property`
impl VariableSource for HashMap<String, f64> {
    fn resolve(&self, name: &str, property: Option<&str>) -> Option<f64> {
        match property {
            None => self.get(name).copied(),
            Some(property) => self.get(&format!("{}.{}", name, property)).copied(),
        }
    }
}

/// A parsed formula, reusable across cycles
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    postfix: Vec<Item>,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = tokenize(source)?;
        let postfix = parse(&tokens, source.len())?;
        Ok(Self {
            source: source.to_string(),
            postfix,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Names referenced through `$name`
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.postfix.iter().filter_map(|item| match item {
            Item::Variable { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn evaluate(&self, vars: &dyn VariableSource) -> Result<Option<f64>> {
        let mut stack = self.postfix.clone();
        let value = reduce(&mut stack, vars)?;
        trace!("Formula '{}' = {:?}", self.source, value);
        Ok(value)
    }
}

/// Parse and evaluate in one step
pub fn evaluate(source: &str, vars: &dyn VariableSource) -> Result<Option<f64>> {
    Formula::parse(source)?.evaluate(vars)
}

fn reduce(stack: &mut Vec<Item>, vars: &dyn VariableSource) -> Result<Option<f64>> {
    let item = stack
        .pop()
        .ok_or_else(|| CalcError::syntax(0, "operand stack underflow"))?;

    match item {
        Item::Number(n) => Ok(Some(n)),
        Item::Variable { name, property } => Ok(vars.resolve(&name, property.as_deref())),
        Item::Negate => Ok(reduce(stack, vars)?.map(|v| -v)),
        Item::Call(function) => match reduce(stack, vars)? {
            Some(x) => function.apply(x).map(Some),
            None => Ok(None),
        },
        Item::Binary(op) => {
            let rhs = reduce(stack, vars)?;
            let lhs = reduce(stack, vars)?;
            match (lhs, rhs) {
                (Some(a), Some(b)) => apply_binary(op, a, b).map(Some),
                _ => Ok(None),
            }
        },
    }
}

fn truth(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn apply_binary(op: BinaryOp, a: f64, b: f64) -> Result<f64> {
    let value = match op {
        BinaryOp::Eq => truth(a == b),
        BinaryOp::Ne => truth(a != b),
        BinaryOp::Ge => truth(a >= b),
        BinaryOp::Gt => truth(a > b),
        BinaryOp::Le => truth(a <= b),
        BinaryOp::Lt => truth(a < b),
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(CalcError::math("division by zero"));
            }
            a / b
        },
        BinaryOp::Pow => {
            let p = a.powf(b);
            if !p.is_finite() {
                return Err(CalcError::math(format!("{}^{} is undefined", a, b)));
            }
            p
        },
        BinaryOp::And => ((a as i64) & (b as i64)) as f64,
        BinaryOp::Or => ((a as i64) | (b as i64)) as f64,
        BinaryOp::Xor => ((a as i64) ^ (b as i64)) as f64,
        BinaryOp::Shl | BinaryOp::Shr => {
            let shift = u32::try_from(b as i64)
                .ok()
                .filter(|s| *s < 64)
                .ok_or_else(|| CalcError::math(format!("invalid shift count {}", b)))?;
            let base = a as i64;
            if op == BinaryOp::Shl {
                base.wrapping_shl(shift) as f64
            } else {
                (base >> shift) as f64
            }
        },
    };
    Ok(value)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn eval(source: &str) -> f64 {
        evaluate(source, &HashMap::<String, f64>::new())
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_precedence_and_associativity() {
        assert_eq!(eval("2+3*4"), 14.0);
        assert_eq!(eval("2^3^2"), 512.0);
        assert_eq!(eval("-2^2"), 4.0);
        assert_eq!(eval("10-4-3"), 3.0);
        assert_eq!(eval("(1+2)*3"), 9.0);
    }

    #[test]
    fn test_integer_operators() {
        assert_eq!(eval("1<<4"), 16.0);
        assert_eq!(eval("256>>4"), 16.0);
        assert_eq!(eval("6 and 3"), 2.0);
        assert_eq!(eval("6 or 3"), 7.0);
        assert_eq!(eval("6 xor 3"), 5.0);
        assert_eq!(eval("1 and not(0)"), 1.0);
    }

    #[test]
    fn test_relations_yield_truth_values() {
        assert_eq!(eval("5-3>5-3"), 0.0);
        assert_eq!(eval("5-3>=5-3"), 1.0);
        assert_eq!(eval("1+1==2"), 1.0);
    }

    #[test]
    fn test_constants_and_functions() {
        assert!((eval("cos(PI)") + 1.0).abs() < 1e-12);
        assert!((eval("log(E)") - 1.0).abs() < 1e-12);
        assert!((eval("Log(1000)") - 3.0).abs() < 1e-12);
        assert_eq!(eval("sqrt(16)+abs(-2)"), 6.0);
    }

    #[test]
    fn test_variables() {
        let v = vars(&[("A", 10.0), ("B", 100.0), ("A.old_value", 4.0)]);
        let result = evaluate("$A+$B/3", &v).unwrap().unwrap();
        assert!((result - 43.333_333_333_333_336).abs() < 1e-9);
        assert_eq!(evaluate("$A-$A.old_value", &v).unwrap(), Some(6.0));
    }

    #[test]
    fn test_missing_variable_is_no_value() {
        let v = vars(&[("A", 1.0)]);
        assert_eq!(evaluate("$A+$MISSING*2", &v).unwrap(), None);
        assert_eq!(evaluate("sin($MISSING)", &v).unwrap(), None);
    }

    #[test]
    fn test_math_errors() {
        let empty: HashMap<String, f64> = HashMap::new();
        assert!(matches!(evaluate("1/0", &empty), Err(CalcError::Math(_))));
        assert!(matches!(evaluate("1<<-1", &empty), Err(CalcError::Math(_))));
    }

    #[test]
    fn test_formula_lists_variables() {
        let formula = Formula::parse("$A*2+$B.time").unwrap();
        assert_eq!(formula.variables().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(formula.source(), "$A*2+$B.time");
    }
}
