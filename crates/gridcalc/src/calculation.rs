//! Sheet calculation engine
//!
//! Evaluates every formula cell of a [`Sheet`] and writes the results back as the cells'
//! cached values. Formula cells referenced by other formulas are computed on demand
//! through [`SheetResolver`], so the order in which cells are visited does not affect the
//! results. One recalculation computes each formula cell at most once.
//!
//! # Example
//!
//! ```rust
//! use gridcalc::prelude::*;
//!
//! let mut sheet = Sheet::new();
//! sheet.set_input(0, 0, "10").unwrap();
//! sheet.set_input(1, 0, "20").unwrap();
//! sheet.set_input(2, 0, "=A1+A2").unwrap();
//!
//! // Calculate all formulas
//! let stats = sheet.calculate();
//! assert_eq!(stats.cells_calculated, 1);
//! assert_eq!(sheet.get_cell(2, 0).display(), "30");
//! ```

use crate::{
    evaluate, evaluate_at, is_volatile, parse_address, CellValue, Clock, EvaluationContext,
    EvaluationOptions, Evaluator, FormulaError, FormulaResult, FormulaValue, Resolver, Result,
    Sheet, SystemClock, FORMULA_MARKER, TEXT_PREFIX,
};
use gridcalc_core::format_address;
use tracing::{debug, warn};

/// Options for sheet calculation
#[derive(Debug, Clone)]
pub struct CalculationOptions {
    /// Options passed to every formula evaluation
    pub evaluation: EvaluationOptions,
    /// Include volatile functions in calculation (NOW)
    ///
    /// When false, cells calling a volatile function keep their previous result.
    pub calculate_volatile: bool,
}

impl Default for CalculationOptions {
    fn default() -> Self {
        Self {
            evaluation: EvaluationOptions::default(),
            calculate_volatile: true,
        }
    }
}

/// Statistics from a calculation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalculationStats {
    /// Total number of formula cells
    pub formula_count: usize,
    /// Number of cells calculated
    pub cells_calculated: usize,
    /// Number of cells calling a volatile function
    pub volatile_cells: usize,
    /// Number of cells whose formula failed
    pub errors: usize,
}

/// Resolves A1 addresses against a [`Sheet`]
///
/// Formula cells resolve to their formula text so the evaluator recomputes them;
/// other cells resolve to their display text, with a [`TEXT_PREFIX`] when that text
/// would otherwise read as a formula. Empty, unknown and out-of-bounds addresses resolve
/// to nothing. Ranges are clamped to the sheet bounds.
#[derive(Debug, Clone, Copy)]
pub struct SheetResolver<'a> {
    sheet: &'a Sheet,
}

impl<'a> SheetResolver<'a> {
    pub fn new(sheet: &'a Sheet) -> Self {
        Self { sheet }
    }
}

impl Resolver for SheetResolver<'_> {
    fn resolve(&self, address: &str) -> Option<String> {
        let (row, col) = parse_address(address).ok()?;
        if !self.sheet.in_bounds(row, col) {
            return None;
        }
        if let Some(formula) = self.sheet.formula_at(row, col) {
            return Some(formula.to_string());
        }
        let cell = self.sheet.cell_at(row, col)?;
        if cell.is_empty() {
            return None;
        }
        let display = cell.display();
        let start = display.trim_start();
        if start.starts_with(FORMULA_MARKER) || start.starts_with(TEXT_PREFIX) {
            return Some(format!("{}{}", TEXT_PREFIX, display));
        }
        Some(display.into_owned())
    }

    fn bounds(&self) -> Option<(u32, u32)> {
        Some((self.sheet.rows(), self.sheet.cols()))
    }
}

/// Extension trait for Sheet to add calculation methods
pub trait SheetCalculationExt {
    /// Calculate all formulas in the sheet with default options
    fn calculate(&mut self) -> CalculationStats;

    /// Calculate all formulas with custom options
    fn calculate_with_options(&mut self, options: &CalculationOptions) -> CalculationStats;

    /// Calculate all formulas with custom options and a specific clock for `NOW()`
    fn calculate_with_clock(
        &mut self,
        options: &CalculationOptions,
        clock: &dyn Clock,
    ) -> CalculationStats;

    /// Evaluate formula text against the sheet without storing anything
    fn evaluate_formula(&self, formula: &str) -> FormulaResult<FormulaValue>;

    /// Re-evaluate one formula cell and store its result
    ///
    /// Returns `None` if there is no formula at the coordinate.
    fn recalculate_cell(&mut self, row: u32, col: u32) -> Option<CellValue>;

    /// Write raw editor text and, for a formula, evaluate it right away
    ///
    /// Returns the cell's resulting value.
    fn enter(&mut self, row: u32, col: u32, text: &str) -> Result<CellValue>;
}

impl SheetCalculationExt for Sheet {
    fn calculate(&mut self) -> CalculationStats {
        self.calculate_with_options(&CalculationOptions::default())
    }

    fn calculate_with_options(&mut self, options: &CalculationOptions) -> CalculationStats {
        self.calculate_with_clock(options, &SystemClock)
    }

    fn calculate_with_clock(
        &mut self,
        options: &CalculationOptions,
        clock: &dyn Clock,
    ) -> CalculationStats {
        let engine = CalculationEngine { options, clock };
        engine.calculate_all(self)
    }

    fn evaluate_formula(&self, formula: &str) -> FormulaResult<FormulaValue> {
        let resolver = SheetResolver::new(self);
        let ctx = EvaluationContext::new(&resolver);
        evaluate(formula, &ctx)
    }

    fn recalculate_cell(&mut self, row: u32, col: u32) -> Option<CellValue> {
        let formula = self.formula_at(row, col)?.to_string();
        let options = CalculationOptions::default();
        let engine = CalculationEngine {
            options: &options,
            clock: &SystemClock,
        };

        let value = match engine.evaluate_cell(self, row, col, &formula) {
            Ok(value) => value.into(),
            Err(err) => error_value(row, col, &err),
        };
        self.set_result(row, col, value.clone());
        Some(value)
    }

    fn enter(&mut self, row: u32, col: u32, text: &str) -> Result<CellValue> {
        self.set_input(row, col, text)?;
        match self.recalculate_cell(row, col) {
            Some(value) => Ok(value),
            None => Ok(self.get_cell(row, col).value().clone()),
        }
    }
}

/// The calculation engine
struct CalculationEngine<'a> {
    options: &'a CalculationOptions,
    clock: &'a dyn Clock,
}

impl CalculationEngine<'_> {
    /// Calculate all formulas in the sheet
    fn calculate_all(&self, sheet: &mut Sheet) -> CalculationStats {
        let mut stats = CalculationStats {
            formula_count: sheet.formula_count(),
            ..Default::default()
        };

        if stats.formula_count == 0 {
            return stats;
        }

        // Phase 1: evaluate against the unchanged sheet, sharing computed cells
        let mut results = Vec::with_capacity(stats.formula_count);
        {
            let resolver = SheetResolver::new(sheet);
            let ctx = self.context(&resolver);
            let mut evaluator = Evaluator::new(&ctx);
            for (row, col, formula) in sheet.formula_cells() {
                if is_volatile(formula) {
                    stats.volatile_cells += 1;
                    if !self.options.calculate_volatile {
                        continue;
                    }
                }

                let value = match evaluator.evaluate_cell(&format_address(row, col), formula) {
                    Ok(value) => value.into(),
                    Err(err) => {
                        stats.errors += 1;
                        error_value(row, col, &err)
                    }
                };
                results.push((row, col, value));
            }
        }

        // Phase 2: store the results
        for (row, col, value) in results {
            sheet.set_result(row, col, value);
            stats.cells_calculated += 1;
        }

        debug!(
            formulas = stats.formula_count,
            calculated = stats.cells_calculated,
            volatile = stats.volatile_cells,
            errors = stats.errors,
            "sheet calculated"
        );
        stats
    }

    fn evaluate_cell(
        &self,
        sheet: &Sheet,
        row: u32,
        col: u32,
        formula: &str,
    ) -> FormulaResult<FormulaValue> {
        let resolver = SheetResolver::new(sheet);
        evaluate_at(formula, &format_address(row, col), &self.context(&resolver))
    }

    fn context<'r>(&'r self, resolver: &'r SheetResolver<'_>) -> EvaluationContext<'r> {
        EvaluationContext::new(resolver)
            .with_clock(self.clock)
            .with_options(self.options.evaluation)
    }
}

fn error_value(row: u32, col: u32, err: &FormulaError) -> CellValue {
    warn!(
        cell = %format_address(row, col),
        error = %err,
        "formula evaluated to {}",
        FormulaError::SENTINEL
    );
    CellValue::Error(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_formula::FixedClock;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_resolver_reads_sheet() {
        let mut sheet = Sheet::new();
        sheet.set_input(0, 0, "12").unwrap();
        sheet.set_input(0, 1, "=A1*2").unwrap();
        sheet.set_input(1, 0, "2024-05-01").unwrap();

        let resolver = SheetResolver::new(&sheet);
        assert_eq!(resolver.resolve("A1").as_deref(), Some("12"));
        assert_eq!(resolver.resolve("B1").as_deref(), Some("=A1*2"));
        assert_eq!(resolver.resolve("A2").as_deref(), Some("2024-05-01"));
        assert_eq!(resolver.resolve("C9"), None);
        assert_eq!(resolver.resolve("AAA1"), None);
        assert_eq!(resolver.resolve("not an address"), None);
        assert_eq!(resolver.bounds(), Some((1000, 26)));
    }

    #[test]
    fn test_text_that_looks_like_a_formula() {
        let mut sheet = Sheet::new();
        sheet.set_cell(0, 0, "=B1", None).unwrap();
        sheet.set_input(0, 1, "5").unwrap();
        sheet.set_input(0, 2, "=A1").unwrap();
        sheet.set_input(0, 3, "=CONCATENATE(A1, \"?\")").unwrap();

        let resolver = SheetResolver::new(&sheet);
        assert_eq!(resolver.resolve("A1").as_deref(), Some("'=B1"));

        sheet.calculate();
        assert_eq!(sheet.get_cell(0, 2).display(), "=B1");
        assert_eq!(sheet.get_cell(0, 3).display(), "=B1?");
    }

    #[test]
    fn test_volatile_cells_can_be_skipped() {
        let mut sheet = Sheet::new();
        sheet.set_input(0, 0, "=NOW()").unwrap();
        sheet.set_input(0, 1, "=1+1").unwrap();

        let options = CalculationOptions {
            calculate_volatile: false,
            ..Default::default()
        };
        let stats = sheet.calculate_with_options(&options);
        assert_eq!(stats.formula_count, 2);
        assert_eq!(stats.volatile_cells, 1);
        assert_eq!(stats.cells_calculated, 1);
        assert_eq!(sheet.get_cell(0, 0).display(), "=NOW()");
        assert_eq!(sheet.get_cell(0, 1).display(), "2");
    }

    #[test]
    fn test_clock_is_used() {
        let mut sheet = Sheet::new();
        sheet.set_input(0, 0, "=NOW()").unwrap();

        let clock = FixedClock(
            chrono::NaiveDate::from_ymd_opt(2030, 12, 31)
                .unwrap()
                .and_hms_opt(23, 59, 58)
                .unwrap(),
        );
        sheet.calculate_with_clock(&CalculationOptions::default(), &clock);
        assert_eq!(sheet.get_cell(0, 0).display(), "2030-12-31 23:59:58");
    }

    #[test]
    fn test_enter() {
        let mut sheet = Sheet::new();
        assert_eq!(sheet.enter(0, 0, "4").unwrap(), CellValue::Number(4.0));
        assert_eq!(sheet.enter(0, 1, "=A1^2").unwrap(), CellValue::Number(16.0));
        assert!(sheet.enter(5000, 0, "1").is_err());
    }
}
