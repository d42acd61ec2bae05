//! Built-in single-argument functions

use std::fmt;

use crate::error::{CalcError, Result};

/// Values closer to zero than this have no sign
pub const SIGN_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sqrt,
    Abs,
    Trunc,
    Round,
    Exp,
    Ln,
    Log2,
    Log10,
    Sgn,
    Not,
}

impl Function {
    /// Function names are case-sensitive: `log` is natural, `Log` is base 10
    pub fn from_name(name: &str) -> Option<Self> {
        let function = match name {
            "sin" => Self::Sin,
            "cos" => Self::Cos,
            "tan" => Self::Tan,
            "asin" => Self::Asin,
            "acos" => Self::Acos,
            "atan" => Self::Atan,
            "sqrt" => Self::Sqrt,
            "abs" => Self::Abs,
            "trunc" => Self::Trunc,
            "round" => Self::Round,
            "exp" => Self::Exp,
            "log" => Self::Ln,
            "log2" => Self::Log2,
            "log10" | "Log" => Self::Log10,
            "sgn" => Self::Sgn,
            "not" => Self::Not,
            _ => return None,
        };
        Some(function)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Asin => "asin",
            Self::Acos => "acos",
            Self::Atan => "atan",
            Self::Sqrt => "sqrt",
            Self::Abs => "abs",
            Self::Trunc => "trunc",
            Self::Round => "round",
            Self::Exp => "exp",
            Self::Ln => "log",
            Self::Log2 => "log2",
            Self::Log10 => "log10",
            Self::Sgn => "sgn",
            Self::Not => "not",
        }
    }

    /// Apply to a finite argument; domain errors surface as `Math`
    pub fn apply(&self, x: f64) -> Result<f64> {
        let y = match self {
            Self::Sin => x.sin(),
            Self::Cos => x.cos(),
            Self::Tan => x.tan(),
            Self::Asin => x.asin(),
            Self::Acos => x.acos(),
            Self::Atan => x.atan(),
            Self::Sqrt => x.sqrt(),
            Self::Abs => x.abs(),
            Self::Trunc => x.trunc(),
            Self::Round => x.round_ties_even(),
            Self::Exp => x.exp(),
            Self::Ln => x.ln(),
            Self::Log2 => x.log2(),
            Self::Log10 => x.log10(),
            Self::Sgn => {
                if x.abs() < SIGN_EPSILON {
                    0.0
                } else {
                    x.signum()
                }
            },
            Self::Not => {
                if x.trunc() == 0.0 {
                    1.0
                } else {
                    0.0
                }
            },
        };
        if y.is_finite() {
            Ok(y)
        } else {
            Err(CalcError::math(format!("{}({}) is undefined", self.name(), x)))
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_sensitive() {
        assert_eq!(Function::from_name("log"), Some(Function::Ln));
        assert_eq!(Function::from_name("Log"), Some(Function::Log10));
        assert_eq!(Function::from_name("SIN"), None);
    }

    #[test]
    fn test_sgn_dead_zone() {
        assert_eq!(Function::Sgn.apply(1e-13).unwrap(), 0.0);
        assert_eq!(Function::Sgn.apply(-0.5).unwrap(), -1.0);
    }

    #[test]
    fn test_round_half_to_even() {
        assert_eq!(Function::Round.apply(2.5).unwrap(), 2.0);
        assert_eq!(Function::Round.apply(3.5).unwrap(), 4.0);
    }

    #[test]
    fn test_not_truncates() {
        assert_eq!(Function::Not.apply(0.4).unwrap(), 1.0);
        assert_eq!(Function::Not.apply(-2.0).unwrap(), 0.0);
    }

    #[test]
    fn test_domain_errors() {
        assert!(matches!(Function::Sqrt.apply(-1.0), Err(CalcError::Math(_))));
        assert!(matches!(Function::Ln.apply(0.0), Err(CalcError::Math(_))));
    }
}
