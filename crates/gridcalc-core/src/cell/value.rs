//! Cell value types

use chrono::NaiveDate;
use std::borrow::Cow;
use std::fmt;

/// Marker displayed in place of a value that failed to compute
pub const ERROR_SENTINEL: &str = "#ERROR!";

/// Marker that introduces a formula in raw cell input
pub const FORMULA_MARKER: char = '=';

/// Represents the value stored in a cell
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellValue {
    /// Empty cell (no value)
    #[default]
    Empty,

    /// Text value
    Text(String),

    /// Numeric value
    Number(f64),

    /// Boolean value (TRUE/FALSE)
    Boolean(bool),

    /// Calendar date
    Date(NaiveDate),

    /// Failed computation, carrying the message for status reporting
    Error(String),
}

impl CellValue {
    /// Create a new text value
    pub fn text<S: Into<String>>(s: S) -> Self {
        CellValue::Text(s.into())
    }

    /// Infer a value from raw (non-formula) editor input
    ///
    /// Numbers, `TRUE`/`FALSE` and `YYYY-MM-DD` dates are recognized; everything else is
    /// kept as text. Blank input is [`CellValue::Empty`].
    pub fn from_input(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        if let Ok(n) = trimmed.parse::<f64>() {
            if n.is_finite() {
                return CellValue::Number(n);
            }
        }
        if trimmed.eq_ignore_ascii_case("TRUE") {
            return CellValue::Boolean(true);
        }
        if trimmed.eq_ignore_ascii_case("FALSE") {
            return CellValue::Boolean(false);
        }
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return CellValue::Date(date);
        }
        CellValue::Text(input.to_string())
    }

    /// Check if the cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Kind derived from the value alone
    pub fn kind(&self) -> CellKind {
        match self {
            CellValue::Empty | CellValue::Text(_) => CellKind::Text,
            CellValue::Number(_) => CellKind::Number,
            CellValue::Boolean(_) => CellKind::Boolean,
            CellValue::Date(_) => CellKind::Date,
            CellValue::Error(_) => CellKind::Error,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Number(n) => write!(f, "{}", format_number(*n)),
            CellValue::Boolean(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            CellValue::Error(_) => f.write_str(ERROR_SENTINEL),
        }
    }
}

/// Format a number for display: whole numbers without a fractional part
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(d: NaiveDate) -> Self {
        CellValue::Date(d)
    }
}

/// Type tag of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellKind {
    #[default]
    Text,
    Number,
    Formula,
    Date,
    Boolean,
    Error,
}

/// A single addressable cell
///
/// `formula` is the source of truth for formula cells; `raw_value` then holds the last
/// computed result. The display string is cached and dropped on every write.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cell {
    raw_value: Option<CellValue>,
    formula: Option<String>,
    kind: CellKind,
    #[cfg_attr(feature = "serde", serde(skip))]
    display_cache: Option<String>,
}

impl Cell {
    /// Create an empty cell
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a cell holding a literal value
    pub fn with_value(value: CellValue) -> Self {
        let mut cell = Self::empty();
        cell.assign(value, None);
        cell
    }

    /// Create a formula cell; the formula marker is added if missing
    pub fn with_formula(formula: &str) -> Self {
        let mut cell = Self::empty();
        cell.assign(CellValue::Empty, Some(formula));
        cell
    }

    /// Stored value (the last result for formula cells)
    pub fn raw_value(&self) -> Option<&CellValue> {
        self.raw_value.as_ref()
    }

    /// Stored value, or [`CellValue::Empty`]
    pub fn value(&self) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.raw_value.as_ref().unwrap_or(&EMPTY)
    }

    /// Formula text including the leading marker
    pub fn formula(&self) -> Option<&str> {
        self.formula.as_deref()
    }

    pub fn kind(&self) -> CellKind {
        self.kind
    }

    /// Check if the cell holds a formula
    pub fn is_formula(&self) -> bool {
        self.formula.is_some()
    }

    /// Check if the cell holds neither a value nor a formula
    pub fn is_empty(&self) -> bool {
        self.formula.is_none() && self.value().is_empty()
    }

    /// Whether the display string has to be recomputed
    pub fn is_dirty(&self) -> bool {
        self.display_cache.is_none()
    }

    /// Display text of the cell
    ///
    /// A formula cell that was never evaluated displays its formula text.
    pub fn display(&self) -> Cow<'_, str> {
        if let Some(cached) = &self.display_cache {
            return Cow::Borrowed(cached);
        }
        match (&self.formula, &self.raw_value) {
            (Some(formula), None) => Cow::Borrowed(formula),
            (_, Some(value)) => Cow::Owned(value.to_string()),
            (None, None) => Cow::Borrowed(""),
        }
    }

    /// Recompute the display cache if it is dirty
    pub fn refresh_display(&mut self) -> &str {
        if self.display_cache.is_none() {
            self.display_cache = Some(self.display().into_owned());
        }
        self.display_cache.as_deref().unwrap_or_default()
    }

    /// Replace value and formula, re-deriving the kind
    pub(crate) fn assign(&mut self, value: CellValue, formula: Option<&str>) {
        self.formula = formula.map(normalize_formula);
        self.kind = if self.formula.is_some() {
            CellKind::Formula
        } else {
            value.kind()
        };
        self.raw_value = if value.is_empty() { None } else { Some(value) };
        self.display_cache = None;
    }

    /// Store an evaluation result without touching the formula
    pub(crate) fn store_result(&mut self, value: CellValue) {
        self.display_cache = Some(value.to_string());
        self.raw_value = Some(value);
    }

    /// Reset to an empty cell
    pub fn clear(&mut self) {
        self.assign(CellValue::Empty, None);
    }
}

fn normalize_formula(formula: &str) -> String {
    let trimmed = formula.trim();
    if trimmed.starts_with(FORMULA_MARKER) {
        trimmed.to_string()
    } else {
        format!("{}{}", FORMULA_MARKER, trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_input() {
        assert_eq!(CellValue::from_input(""), CellValue::Empty);
        assert_eq!(CellValue::from_input("  "), CellValue::Empty);
        assert_eq!(CellValue::from_input("42"), CellValue::Number(42.0));
        assert_eq!(CellValue::from_input("-1.5"), CellValue::Number(-1.5));
        assert_eq!(CellValue::from_input("true"), CellValue::Boolean(true));
        assert_eq!(CellValue::from_input("FALSE"), CellValue::Boolean(false));
        assert_eq!(
            CellValue::from_input("2024-02-29"),
            CellValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        assert_eq!(CellValue::from_input("hello"), CellValue::text("hello"));
        assert_eq!(CellValue::from_input("inf"), CellValue::text("inf"));
    }

    #[test]
    fn test_display() {
        assert_eq!(CellValue::Number(3.0).to_string(), "3");
        assert_eq!(CellValue::Number(2.5).to_string(), "2.5");
        assert_eq!(CellValue::Boolean(true).to_string(), "TRUE");
        assert_eq!(CellValue::Error("boom".into()).to_string(), ERROR_SENTINEL);
        assert_eq!(CellValue::Empty.to_string(), "");
    }

    #[test]
    fn test_kind_follows_value() {
        assert_eq!(Cell::with_value(CellValue::Number(1.0)).kind(), CellKind::Number);
        assert_eq!(Cell::with_value(CellValue::Boolean(true)).kind(), CellKind::Boolean);
        assert_eq!(Cell::with_value(CellValue::text("x")).kind(), CellKind::Text);
        assert_eq!(Cell::empty().kind(), CellKind::Text);
    }

    #[test]
    fn test_formula_cell() {
        let mut cell = Cell::with_formula("A1+1");
        assert_eq!(cell.kind(), CellKind::Formula);
        assert_eq!(cell.formula(), Some("=A1+1"));
        assert_eq!(cell.display(), "=A1+1");
        assert!(cell.is_dirty());

        cell.store_result(CellValue::Number(2.0));
        assert_eq!(cell.formula(), Some("=A1+1"));
        assert_eq!(cell.kind(), CellKind::Formula);
        assert_eq!(cell.display(), "2");
        assert!(!cell.is_dirty());
    }

    #[test]
    fn test_write_invalidates_display() {
        let mut cell = Cell::with_value(CellValue::Number(1.0));
        assert_eq!(cell.refresh_display(), "1");
        assert!(!cell.is_dirty());

        cell.assign(CellValue::Number(7.0), None);
        assert!(cell.is_dirty());
        assert_eq!(cell.display(), "7");

        cell.clear();
        assert!(cell.is_empty());
        assert_eq!(cell.display(), "");
    }
}
