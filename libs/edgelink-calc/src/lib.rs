//! edgelink-calc - formula evaluator for derived measurements
//!
//! Formulas reference other measurements as `$name` or `$name.property`
//! and are evaluated against a [`VariableSource`].
//!
//! ```rust
//! use std::collections::HashMap;
//! use edgelink_calc::evaluate;
//!
//! let mut vars = HashMap::new();
//! vars.insert("P".to_string(), 1000.0);
//! vars.insert("U".to_string(), 230.0);
//!
//! let current = evaluate("$P / $U", &vars).unwrap_or_default();
//! assert!(current.is_some());
//! ```

pub mod error;
pub mod evaluator;
pub mod functions;
pub mod lexer;
pub mod parser;

pub use error::{CalcError, Result};
pub use evaluator::{evaluate, Formula, VariableSource};
pub use functions::Function;
