//! Formula error types

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during formula parsing or evaluation
///
/// Every variant surfaces in a cell as [`FormulaError::SENTINEL`]; the `Display` text is the
/// message meant for status reporting.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// Malformed formula text
    #[error("Parse error: {0}")]
    Parse(String),

    /// Formula evaluation error
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Malformed cell reference
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Unknown function
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// A cell depends on itself, or evaluation nested deeper than allowed
    #[error("Circular reference: {0}")]
    CircularReference(String),
}

impl FormulaError {
    /// Value displayed in a cell whose formula failed
    pub const SENTINEL: &'static str = gridcalc_core::ERROR_SENTINEL;
}

impl From<gridcalc_core::Error> for FormulaError {
    fn from(err: gridcalc_core::Error) -> Self {
        FormulaError::InvalidAddress(err.to_string())
    }
}
