//! Helpers shared by unit tests

use crate::error::FormulaResult;
use crate::evaluator::{evaluate, EvaluationContext, EvaluationOptions, FormulaValue};

/// Evaluate `formula` against a fixed set of `(address, text)` cells
pub(crate) fn eval_cells(cells: &[(&str, &str)], formula: &str) -> FormulaResult<FormulaValue> {
    eval_cells_with(cells, formula, EvaluationOptions::default())
}

pub(crate) fn eval_cells_with(
    cells: &[(&str, &str)],
    formula: &str,
    options: EvaluationOptions,
) -> FormulaResult<FormulaValue> {
    let resolver = |addr: &str| {
        cells
            .iter()
            .find(|(a, _)| *a == addr)
            .map(|(_, text)| text.to_string())
    };
    let ctx = EvaluationContext::new(&resolver).with_options(options);
    evaluate(formula, &ctx)
}
