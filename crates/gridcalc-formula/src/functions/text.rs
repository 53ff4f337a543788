//! Text functions

use crate::error::FormulaResult;
use crate::evaluator::{Evaluator, FormulaValue};

/// CONCATENATE(text1, [text2], ...)
///
/// Range arguments contribute every cell in row-major order.
pub fn fn_concatenate(args: &[&str], ev: &mut Evaluator<'_>) -> FormulaResult<FormulaValue> {
    let mut result = String::new();
    for arg in args {
        for value in ev.expand(arg)? {
            result.push_str(&value.to_string());
        }
    }
    Ok(FormulaValue::Text(result))
}

#[cfg(test)]
mod tests {
    use crate::evaluator::{evaluate, EvaluationContext, FormulaValue};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_concatenate() {
        let resolver = |addr: &str| match addr {
            "A1" => Some("Hello".to_string()),
            "B1" => Some("World".to_string()),
            "A2" => Some("2".to_string()),
            _ => None,
        };
        let ctx = EvaluationContext::new(&resolver);
        let eval = |formula: &str| evaluate(formula, &ctx).unwrap();

        assert_eq!(
            eval("=CONCATENATE(A1, \" \", B1)"),
            FormulaValue::Text("Hello World".into())
        );
        assert_eq!(
            eval("=concatenate(\"Mixed Case\", \"!\")"),
            FormulaValue::Text("Mixed Case!".into())
        );
        assert_eq!(
            eval("=CONCATENATE(A1:B2)"),
            FormulaValue::Text("HelloWorld2".into())
        );
        assert_eq!(
            eval("=CONCATENATE(\"n=\", A2*2.5, \", ok=\", A2>1)"),
            FormulaValue::Text("n=5, ok=TRUE".into())
        );
    }
}
