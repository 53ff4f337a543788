//! Math functions

use crate::error::FormulaResult;
use crate::evaluator::{Evaluator, FormulaValue};

/// Every value of every argument, ranges expanded row-major
fn expand_all(args: &[&str], ev: &mut Evaluator<'_>) -> FormulaResult<Vec<FormulaValue>> {
    let mut values = Vec::new();
    for arg in args {
        values.extend(ev.expand(arg)?);
    }
    Ok(values)
}

/// Numbers of the non-empty values among the arguments
fn collect_numbers(args: &[&str], ev: &mut Evaluator<'_>) -> FormulaResult<Vec<f64>> {
    Ok(expand_all(args, ev)?
        .iter()
        .filter_map(FormulaValue::numeric)
        .collect())
}

/// SUM(value1, [value2], ...)
pub fn fn_sum(args: &[&str], ev: &mut Evaluator<'_>) -> FormulaResult<FormulaValue> {
    let total: f64 = expand_all(args, ev)?.iter().map(FormulaValue::to_number).sum();
    Ok(FormulaValue::Number(total))
}

/// AVERAGE(value1, [value2], ...)
pub fn fn_average(args: &[&str], ev: &mut Evaluator<'_>) -> FormulaResult<FormulaValue> {
    let numbers = collect_numbers(args, ev)?;
    if numbers.is_empty() {
        return Ok(FormulaValue::Number(0.0));
    }
    let sum: f64 = numbers.iter().sum();
    Ok(FormulaValue::Number(sum / numbers.len() as f64))
}

/// COUNT(value1, [value2], ...)
pub fn fn_count(args: &[&str], ev: &mut Evaluator<'_>) -> FormulaResult<FormulaValue> {
    let count = expand_all(args, ev)?
        .iter()
        .filter(|v| !v.is_empty())
        .count();
    Ok(FormulaValue::Number(count as f64))
}

/// MAX(value1, [value2], ...)
pub fn fn_max(args: &[&str], ev: &mut Evaluator<'_>) -> FormulaResult<FormulaValue> {
    let numbers = collect_numbers(args, ev)?;
    let max = numbers.into_iter().reduce(f64::max).unwrap_or(0.0);
    Ok(FormulaValue::Number(max))
}

/// MIN(value1, [value2], ...)
pub fn fn_min(args: &[&str], ev: &mut Evaluator<'_>) -> FormulaResult<FormulaValue> {
    let numbers = collect_numbers(args, ev)?;
    let min = numbers.into_iter().reduce(f64::min).unwrap_or(0.0);
    Ok(FormulaValue::Number(min))
}

/// ROUND(number, [num_digits])
pub fn fn_round(args: &[&str], ev: &mut Evaluator<'_>) -> FormulaResult<FormulaValue> {
    let number = ev.number(args[0])?;
    let num_digits = match args.get(1) {
        Some(arg) => ev.number(arg)? as i32,
        None => 0,
    };

    // Negative digits round to the left of the decimal point
    let multiplier = 10_f64.powi(num_digits);

    // Round half away from zero: 2.5 -> 3, -2.5 -> -3
    let result = if number >= 0.0 {
        (number * multiplier + 0.5).floor() / multiplier
    } else {
        (number * multiplier - 0.5).ceil() / multiplier
    };

    Ok(FormulaValue::Number(result))
}

/// ABS(number)
pub fn fn_abs(args: &[&str], ev: &mut Evaluator<'_>) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(ev.number(args[0])?.abs()))
}

/// SQRT(number); negative input gives NaN
pub fn fn_sqrt(args: &[&str], ev: &mut Evaluator<'_>) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(ev.number(args[0])?.sqrt()))
}

/// POWER(number, power)
pub fn fn_power(args: &[&str], ev: &mut Evaluator<'_>) -> FormulaResult<FormulaValue> {
    let base = ev.number(args[0])?;
    let exponent = ev.number(args[1])?;
    Ok(FormulaValue::Number(base.powf(exponent)))
}
