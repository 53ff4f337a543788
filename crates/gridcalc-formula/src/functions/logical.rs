//! Logical functions

use crate::error::FormulaResult;
use crate::evaluator::{Evaluator, FormulaValue};

/// IF(logical_test, value_if_true, [value_if_false])
///
/// Only the selected branch is evaluated. A missing false branch yields empty text.
pub fn fn_if(args: &[&str], ev: &mut Evaluator<'_>) -> FormulaResult<FormulaValue> {
    let condition = ev.evaluate_expr(args[0])?.is_truthy();

    if condition {
        ev.evaluate_expr(args[1])
    } else {
        match args.get(2) {
            Some(branch) => ev.evaluate_expr(branch),
            None => Ok(FormulaValue::Text(String::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::evaluator::FormulaValue;
    use crate::testing::eval_cells;
    use crate::{FormulaError, FormulaResult};
    use pretty_assertions::assert_eq;

    fn eval_a1(a1: &str, formula: &str) -> FormulaResult<FormulaValue> {
        eval_cells(&[("A1", a1)], formula)
    }

    fn text(s: &str) -> FormulaValue {
        FormulaValue::Text(s.to_string())
    }

    #[test]
    fn test_if_branches() {
        assert_eq!(eval_a1("5", "=IF(A1>0,\"yes\",\"no\")").unwrap(), text("yes"));
        assert_eq!(eval_a1("-5", "=IF(A1>0,\"yes\",\"no\")").unwrap(), text("no"));
        assert_eq!(eval_a1("0", "=IF(A1>0,\"yes\",\"no\")").unwrap(), text("no"));
    }

    #[test]
    fn test_if_without_false_branch() {
        assert_eq!(eval_a1("1", "=IF(TRUE,\"only\")").unwrap(), text("only"));
        assert_eq!(eval_a1("1", "=IF(FALSE,\"only\")").unwrap(), text(""));
    }

    #[test]
    fn test_if_truthiness() {
        assert_eq!(
            eval_a1("hello", "=IF(A1,1,2)").unwrap(),
            FormulaValue::Number(1.0)
        );
        assert_eq!(
            eval_a1("FALSE", "=IF(A1,1,2)").unwrap(),
            FormulaValue::Number(2.0)
        );
        assert_eq!(
            eval_a1("", "=IF(A1,1,2)").unwrap(),
            FormulaValue::Number(2.0)
        );
    }

    #[test]
    fn test_if_is_lazy() {
        // The untaken branch would fail if it were evaluated
        assert_eq!(
            eval_a1("1", "=IF(A1=1,10,1/0)").unwrap(),
            FormulaValue::Number(10.0)
        );
        assert_eq!(
            eval_a1("1", "=IF(A1=1,NOPE(1),2)").unwrap_err(),
            FormulaError::UnknownFunction("NOPE".into())
        );
    }

    #[test]
    fn test_if_needs_two_arguments() {
        assert!(matches!(
            eval_a1("1", "=IF(A1)"),
            Err(FormulaError::ArgumentCount { .. })
        ));
    }

    #[test]
    fn test_nested_if() {
        assert_eq!(
            eval_a1("15", "=IF(A1>10,IF(A1>20,\"big\",\"medium\"),\"small\")").unwrap(),
            text("medium")
        );
    }
}
