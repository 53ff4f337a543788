//! Formula text helpers
//!
//! Formulas are not compiled to a syntax tree. The evaluator classifies each (sub-)expression
//! by its shape (function call, grouped expression, comparison, arithmetic chain, address,
//! literal) and recurses on the pieces. This module holds the lexical pieces it needs: all
//! of them only look at characters outside double-quoted strings and at parenthesis depth
//! zero.

use crate::error::{FormulaError, FormulaResult};
use gridcalc_core::FORMULA_MARKER;
use lazy_regex::{regex_captures, regex_is_match};
use std::cmp::Ordering;

/// Prepare formula text for evaluation
///
/// Strips one leading formula marker, trims, and uppercases everything outside
/// double-quoted string literals so function names and addresses are case-insensitive
/// while literals keep their case.
pub fn normalize(formula: &str) -> String {
    let trimmed = formula.trim();
    let body = trimmed.strip_prefix(FORMULA_MARKER).unwrap_or(trimmed).trim();

    let mut out = String::with_capacity(body.len());
    let mut in_quotes = false;
    for c in body.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
            out.push(c);
        } else if in_quotes {
            out.push(c);
        } else {
            out.extend(c.to_uppercase());
        }
    }
    out
}

/// Lenient numeric coercion
///
/// Strips one leading `$`, a trailing `%` and surrounding whitespace, reads a decimal comma
/// as a decimal point, and parses the rest. Absent, empty or unparseable text is `0.0`.
pub fn parse_value(text: Option<&str>) -> f64 {
    text.and_then(parse_number).unwrap_or(0.0)
}

/// Strict variant of [`parse_value`]: `None` when the text is not a number
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    let text = text.strip_prefix('$').unwrap_or(text);
    let text = text.trim_end_matches('%').trim();
    if text.is_empty() {
        return None;
    }
    let n: f64 = text.replace(',', ".").parse().ok()?;
    n.is_finite().then_some(n)
}

/// Content of an expression that is exactly one double-quoted literal
///
/// `""` inside the literal stands for one quote character.
pub fn unquote(expr: &str) -> Option<String> {
    let inner = expr.strip_prefix('"')?.strip_suffix('"')?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            // A lone quote would end the literal early, so this is not one literal
            if chars.next_if_eq(&'"').is_none() {
                return None;
            }
        }
        out.push(c);
    }
    Some(out)
}

/// Characters of `expr` that sit outside quotes and parentheses, with byte offsets
///
/// The parentheses at depth zero themselves are not yielded.
fn top_level(expr: &str) -> impl Iterator<Item = (usize, char)> + '_ {
    let mut depth: i32 = 0;
    let mut in_quotes = false;
    expr.char_indices().filter(move |&(_, c)| {
        if c == '"' {
            in_quotes = !in_quotes;
            return false;
        }
        if in_quotes {
            return false;
        }
        match c {
            '(' => {
                depth += 1;
                false
            }
            ')' => {
                depth -= 1;
                false
            }
            _ => depth == 0,
        }
    })
}

/// Byte offset of the parenthesis closing the one at `open`, if any
fn matching_paren(expr: &str, open: usize) -> Option<usize> {
    let mut depth = 0;
    let mut in_quotes = false;
    for (i, c) in expr[open..].char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split `NAME(args)` spanning the whole expression into name and argument text
///
/// `SUM(A1)+SUM(A2)` is not a single call: the first parenthesis must close at the end.
pub fn split_function_call(expr: &str) -> Option<(&str, &str)> {
    let (head, name) = regex_captures!(r"^([A-Z][A-Z0-9_.]*)\(", expr)?;
    let open = head.len() - 1;
    let close = matching_paren(expr, open)?;
    if close != expr.len() - 1 {
        return None;
    }
    Some((name, &expr[open + 1..close]))
}

/// Inside of an expression wrapped in one pair of matching parentheses
pub fn strip_parens(expr: &str) -> Option<&str> {
    if !expr.starts_with('(') {
        return None;
    }
    let close = matching_paren(expr, 0)?;
    (close == expr.len() - 1).then(|| expr[1..close].trim())
}

/// Split a function's argument text on top-level commas
///
/// Blank argument text means no arguments. Arguments are trimmed.
pub fn split_args(args: &str) -> Vec<&str> {
    if args.trim().is_empty() {
        return Vec::new();
    }

    let mut parts = Vec::new();
    let mut start = 0;
    for (i, c) in top_level(args) {
        if c == ',' {
            parts.push(args[start..i].trim());
            start = i + 1;
        }
    }
    parts.push(args[start..].trim());
    parts
}

/// Comparison operators usable in conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl Comparison {
    /// Whether an ordering of left against right satisfies the operator
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            Comparison::Equal => ordering == Ordering::Equal,
            Comparison::NotEqual => ordering != Ordering::Equal,
            Comparison::Less => ordering == Ordering::Less,
            Comparison::LessEqual => ordering != Ordering::Greater,
            Comparison::Greater => ordering == Ordering::Greater,
            Comparison::GreaterEqual => ordering != Ordering::Less,
        }
    }
}

/// Split at the first top-level comparison operator
///
/// Returns `None` when there is none, or when nothing precedes it.
pub fn split_comparison(expr: &str) -> Option<(&str, Comparison, &str)> {
    let (i, c) = top_level(expr).find(|&(_, c)| matches!(c, '<' | '>' | '='))?;
    let next = expr[i + 1..].chars().next();

    let (op, len) = match (c, next) {
        ('<', Some('=')) => (Comparison::LessEqual, 2),
        ('<', Some('>')) => (Comparison::NotEqual, 2),
        ('<', _) => (Comparison::Less, 1),
        ('>', Some('=')) => (Comparison::GreaterEqual, 2),
        ('>', _) => (Comparison::Greater, 1),
        _ => (Comparison::Equal, 1),
    };

    let left = expr[..i].trim();
    if left.is_empty() {
        return None;
    }
    Some((left, op, expr[i + len..].trim()))
}

/// Binary arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
}

impl ArithmeticOp {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(ArithmeticOp::Add),
            '-' => Some(ArithmeticOp::Subtract),
            '*' => Some(ArithmeticOp::Multiply),
            '/' => Some(ArithmeticOp::Divide),
            '^' => Some(ArithmeticOp::Power),
            _ => None,
        }
    }

    /// Binding strength under standard precedence
    pub fn precedence(self) -> u8 {
        match self {
            ArithmeticOp::Add | ArithmeticOp::Subtract => 1,
            ArithmeticOp::Multiply | ArithmeticOp::Divide => 2,
            ArithmeticOp::Power => 3,
        }
    }

    pub fn is_right_associative(self) -> bool {
        self == ArithmeticOp::Power
    }
}

/// Operands and operators of an arithmetic chain, in source order
#[derive(Debug, Clone, PartialEq)]
pub struct ArithmeticChain<'a> {
    pub operands: Vec<&'a str>,
    pub operators: Vec<ArithmeticOp>,
}

/// Split an expression on top-level arithmetic operators
///
/// A `+`/`-` at the start of an operand is a sign and stays with the operand, as does the
/// exponent sign of a literal like `1E-5`. Returns `Ok(None)` when the expression has no
/// binary operator.
pub fn split_arithmetic(expr: &str) -> FormulaResult<Option<ArithmeticChain<'_>>> {
    let mut operands = Vec::new();
    let mut operators = Vec::new();
    let mut start = 0;

    for (i, c) in top_level(expr) {
        let Some(op) = ArithmeticOp::from_char(c) else {
            continue;
        };
        let pending = expr[start..i].trim();
        if matches!(op, ArithmeticOp::Add | ArithmeticOp::Subtract)
            && (pending.is_empty() || is_exponent_prefix(pending))
        {
            continue;
        }
        if pending.is_empty() {
            return Err(FormulaError::Parse(format!(
                "missing operand before '{}' in '{}'",
                c, expr
            )));
        }
        operands.push(pending);
        operators.push(op);
        start = i + c.len_utf8();
    }

    if operators.is_empty() {
        return Ok(None);
    }

    let last = expr[start..].trim();
    if last.is_empty() {
        return Err(FormulaError::Parse(format!(
            "missing operand at end of '{}'",
            expr
        )));
    }
    operands.push(last);

    Ok(Some(ArithmeticChain {
        operands,
        operators,
    }))
}

/// Mantissa of a number literal awaiting its exponent sign, e.g. `1.5E`
fn is_exponent_prefix(pending: &str) -> bool {
    regex_is_match!(r"^[0-9]*\.?[0-9]+E$", pending)
}

/// Whether the expression is a bare cell address such as `AB12`
pub fn is_address(expr: &str) -> bool {
    regex_is_match!(r"^[A-Z]+[0-9]+$", expr)
}

/// Whether the expression is a rectangular range such as `A1:C10`
pub fn is_range(expr: &str) -> bool {
    regex_is_match!(r"^[A-Z]+[0-9]+\s*:\s*[A-Z]+[0-9]+$", expr)
}
