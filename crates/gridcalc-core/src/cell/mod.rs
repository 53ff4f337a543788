//! Cell-related types and utilities
//!
//! This module contains:
//! - [`Cell`] and [`CellValue`] - A cell and the value stored in it
//! - [`CellAddress`] - A cell's location (e.g., "A1") and the column letter codec
//! - [`CellRange`] - A range of cells (e.g., "A1:B10")

pub mod address;
mod value;

pub use address::{
    column_to_letters, format_address, letters_to_column, parse_address, CellAddress, CellRange,
    CellRangeIterator,
};
pub use value::{format_number, Cell, CellKind, CellValue, ERROR_SENTINEL, FORMULA_MARKER};
