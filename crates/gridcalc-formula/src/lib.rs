//! # gridcalc-formula
//!
//! Formula evaluator for gridcalc.
//!
//! This crate provides:
//! - Formula evaluation straight from text (no syntax tree)
//! - Built-in functions (SUM, AVERAGE, IF, CONCATENATE, NOW, ...)
//! - Cycle detection across referenced formula cells
//!
//! Cells are read through a [`Resolver`], so the evaluator works against any grid.
//!
//! ## Example
//!
//! ```rust
//! use gridcalc_formula::{evaluate, EvaluationContext, FormulaValue};
//!
//! let cells = |addr: &str| match addr {
//!     "A1" => Some("2".to_string()),
//!     "A2" => Some("=A1*10".to_string()),
//!     _ => None,
//! };
//! let ctx = EvaluationContext::new(&cells);
//!
//! assert_eq!(evaluate("=SUM(A1:A2)", &ctx).unwrap(), FormulaValue::Number(22.0));
//! assert_eq!(evaluate("=1+2*3", &ctx).unwrap(), FormulaValue::Number(9.0));
//! ```

pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod resolver;

#[cfg(test)]
mod testing;

pub use error::{FormulaError, FormulaResult};
pub use evaluator::{
    evaluate, evaluate_at, EvaluationContext, EvaluationOptions, Evaluator, FormulaValue,
    OperatorPrecedence,
};
pub use functions::{is_volatile, FunctionDef, FunctionRegistry};
pub use parser::{normalize, parse_value};
pub use resolver::{Clock, FixedClock, NoCells, Resolver, SystemClock, TEXT_PREFIX};
