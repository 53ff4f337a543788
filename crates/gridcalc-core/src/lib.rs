//! # gridcalc-core
//!
//! Core data structures for the gridcalc spreadsheet engine.
//!
//! This crate provides the fundamental types used throughout gridcalc:
//! - [`Cell`], [`CellValue`], [`CellKind`] - A cell and what it holds
//! - [`CellAddress`] and [`CellRange`] - Cell addressing, ranges and the column letter codec
//! - [`Sheet`] - The sparse cell grid with structural edits and change listeners
//!
//! ## Example
//!
//! ```rust
//! use gridcalc_core::{CellValue, Sheet};
//!
//! let mut sheet = Sheet::new();
//!
//! // Using typed values
//! sheet.set_cell(0, 0, 42.0, None).unwrap();
//!
//! // Or raw editor input; a leading '=' makes a formula
//! sheet.set_input(1, 0, "=A1*2").unwrap();
//!
//! assert_eq!(sheet.get_cell(0, 0).value(), &CellValue::Number(42.0));
//! assert_eq!(sheet.formula_at(1, 0), Some("=A1*2"));
//! ```

pub mod cell;
pub mod error;
pub mod sheet;

// Re-exports for convenience
pub use cell::{
    column_to_letters, format_address, format_number, letters_to_column, parse_address, Cell,
    CellAddress, CellKind, CellRange, CellValue, ERROR_SENTINEL, FORMULA_MARKER,
};
pub use error::{Error, Result};
pub use sheet::{ListenerId, Sheet};

/// Default number of rows in a new sheet
pub const DEFAULT_ROWS: u32 = 1000;

/// Default number of columns in a new sheet
pub const DEFAULT_COLS: u32 = 26;
