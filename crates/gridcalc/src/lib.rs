//! # gridcalc
//!
//! A Rust library for evaluating spreadsheet formulas over a sparse cell grid.
//!
//! ## Features
//!
//! - Sparse [`Sheet`] with row/column insertion and deletion, search and change listeners
//! - A1 cell reference codec (`A1` ⇄ `(0, 0)`)
//! - Formula evaluation with cell references, ranges, nested functions and arithmetic
//! - Whole-sheet recalculation that turns failing formulas into `#ERROR!` cells
//!
//! ## Example
//!
//! ```rust
//! use gridcalc::prelude::*;
//!
//! let mut sheet = Sheet::new();
//!
//! // Enter values and formulas the way an editor would
//! sheet.set_input(0, 0, "1").unwrap();
//! sheet.set_input(1, 0, "2").unwrap();
//! sheet.set_input(2, 0, "=SUM(A1:A2)").unwrap();
//! sheet.set_input(3, 0, "=FOO(A1)").unwrap();
//!
//! let stats = sheet.calculate();
//! assert_eq!(stats.errors, 1);
//! assert_eq!(sheet.get_cell(2, 0).display(), "3");
//! assert_eq!(sheet.get_cell(3, 0).display(), "#ERROR!");
//! ```

pub mod calculation;
pub mod prelude;

// Re-export calculation types
pub use calculation::{CalculationOptions, CalculationStats, SheetCalculationExt, SheetResolver};

// Re-export core types
pub use gridcalc_core::{
    // Cell reference codec
    column_to_letters,
    format_address,
    letters_to_column,
    parse_address,
    // Cell types
    Cell,
    CellAddress,
    CellKind,
    CellRange,
    CellValue,
    // Error types
    Error,
    ListenerId,
    Result,
    // Main types
    Sheet,
    // Constants
    DEFAULT_COLS,
    DEFAULT_ROWS,
    ERROR_SENTINEL,
    FORMULA_MARKER,
};

// Re-export formula types
pub use gridcalc_formula::{
    evaluate, evaluate_at, is_volatile, parse_value, Clock, EvaluationContext, EvaluationOptions,
    Evaluator, FixedClock, FormulaError, FormulaResult, FormulaValue, OperatorPrecedence, Resolver,
    SystemClock, TEXT_PREFIX,
};
