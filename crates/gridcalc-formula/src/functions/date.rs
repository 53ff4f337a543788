//! Date and time functions
//!
//! Dates are produced as ISO text (`YYYY-MM-DD`), the same form the grid recognizes as a
//! date on input.

use crate::error::FormulaResult;
use crate::evaluator::{Evaluator, FormulaValue};
use crate::parser::parse_number;
use chrono::NaiveDate;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// NOW() - current date and time from the evaluation clock
pub fn fn_now(_args: &[&str], ev: &mut Evaluator<'_>) -> FormulaResult<FormulaValue> {
    let now = ev.clock().now();
    Ok(FormulaValue::Text(now.format(DATETIME_FORMAT).to_string()))
}

/// DATE(year, month, day)
///
/// Non-numeric parts or a date that does not exist give empty text.
pub fn fn_date(args: &[&str], ev: &mut Evaluator<'_>) -> FormulaResult<FormulaValue> {
    let mut parts = [0_i64; 3];
    for (part, arg) in parts.iter_mut().zip(args) {
        match date_part(ev.evaluate_expr(arg)?) {
            Some(n) => *part = n,
            None => return Ok(FormulaValue::Text(String::new())),
        }
    }

    let [year, month, day] = parts;
    let date = i32::try_from(year).ok().and_then(|year| {
        let month = u32::try_from(month).ok()?;
        let day = u32::try_from(day).ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    });

    Ok(FormulaValue::Text(
        date.map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_default(),
    ))
}

/// Integer part of a numeric argument
fn date_part(value: FormulaValue) -> Option<i64> {
    let n = match value {
        FormulaValue::Number(n) => n,
        FormulaValue::Text(s) => parse_number(&s)?,
        FormulaValue::Boolean(_) | FormulaValue::Empty => return None,
    };
    n.is_finite().then(|| n.trunc() as i64)
}
