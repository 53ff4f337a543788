//! Prelude module - common imports for gridcalc users
//!
//! ```rust
//! use gridcalc::prelude::*;
//! ```

pub use crate::{
    // Calculation types
    CalculationOptions,
    CalculationStats,
    // Cell types
    Cell,
    CellAddress,
    CellKind,
    CellRange,
    CellValue,
    // Error types
    Error,
    FormulaError,
    // Formula types
    EvaluationContext,
    FormulaValue,
    Result,
    // Main types
    Sheet,
    // Extension traits
    SheetCalculationExt,
};
