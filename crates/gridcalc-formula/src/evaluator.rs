//! Formula evaluator
//!
//! Evaluates formula text directly: each expression is classified by shape and the pieces
//! are evaluated recursively. Cell references go through a [`Resolver`], so a formula cell
//! referenced by another formula is computed on demand. Each [`Evaluator`] remembers the
//! values of the formula cells it has computed, so a cell is evaluated once per evaluator
//! no matter how often it is referenced.

use crate::error::{FormulaError, FormulaResult};
use crate::functions::FunctionRegistry;
use crate::parser::{
    is_address, is_range, normalize, parse_number, parse_value, split_args, split_arithmetic,
    split_comparison, split_function_call, strip_parens, unquote, ArithmeticChain, ArithmeticOp,
    Comparison,
};
use crate::resolver::{Clock, NoCells, Resolver, SystemClock, TEXT_PREFIX};
use ahash::AHashMap;
use gridcalc_core::{format_number, CellAddress, CellRange, CellValue, FORMULA_MARKER};
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;
use tracing::trace;

/// Global function registry (lazily initialized)
static FUNCTION_REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

pub(crate) fn get_function_registry() -> &'static FunctionRegistry {
    FUNCTION_REGISTRY.get_or_init(FunctionRegistry::new)
}

static SYSTEM_CLOCK: SystemClock = SystemClock;
static NO_CELLS: NoCells = NoCells;

/// Nesting limit for parentheses and function calls within one formula
const MAX_EXPRESSION_DEPTH: usize = 128;

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValue {
    Number(f64),
    Text(String),
    Boolean(bool),
    Empty,
}

impl FormulaValue {
    /// Numeric coercion; text goes through [`parse_value`], so this never fails
    pub fn to_number(&self) -> f64 {
        match self {
            FormulaValue::Number(n) => *n,
            FormulaValue::Boolean(true) => 1.0,
            FormulaValue::Boolean(false) => 0.0,
            FormulaValue::Text(s) => parse_value(Some(s)),
            FormulaValue::Empty => 0.0,
        }
    }

    /// Numeric value for aggregates; empty values and non-numeric text are skipped
    pub fn numeric(&self) -> Option<f64> {
        match self {
            FormulaValue::Empty => None,
            FormulaValue::Text(s) => parse_number(s),
            other => Some(other.to_number()),
        }
    }

    /// Truthiness used by conditions
    pub fn is_truthy(&self) -> bool {
        match self {
            FormulaValue::Boolean(b) => *b,
            FormulaValue::Number(n) => *n != 0.0,
            FormulaValue::Text(s) => {
                let s = s.trim();
                !s.is_empty() && !s.eq_ignore_ascii_case("FALSE") && s != "0"
            }
            FormulaValue::Empty => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FormulaValue::Empty)
    }

    pub fn is_text(&self) -> bool {
        matches!(self, FormulaValue::Text(_))
    }
}

impl fmt::Display for FormulaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaValue::Number(n) => f.write_str(&format_number(*n)),
            FormulaValue::Text(s) => f.write_str(s),
            FormulaValue::Boolean(true) => f.write_str("TRUE"),
            FormulaValue::Boolean(false) => f.write_str("FALSE"),
            FormulaValue::Empty => Ok(()),
        }
    }
}

impl From<FormulaValue> for CellValue {
    fn from(value: FormulaValue) -> Self {
        match value {
            FormulaValue::Empty => CellValue::Empty,
            FormulaValue::Number(n) => CellValue::Number(n),
            FormulaValue::Text(s) => CellValue::Text(s),
            FormulaValue::Boolean(b) => CellValue::Boolean(b),
        }
    }
}

/// How chains of arithmetic operators are folded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperatorPrecedence {
    /// Strictly left to right: `1+2*3` is 9
    #[default]
    LeftToRight,
    /// `^` (right-associative) over `*` `/` over `+` `-`: `1+2*3` is 7
    Standard,
}

/// Options for formula evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationOptions {
    pub precedence: OperatorPrecedence,
    /// Maximum number of formula cells evaluated inside one another
    pub max_depth: usize,
    /// Maximum number of cells a range argument may expand to, after clamping to the grid
    pub max_range_cells: u64,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            precedence: OperatorPrecedence::LeftToRight,
            max_depth: 256,
            max_range_cells: 1_000_000,
        }
    }
}

/// Context for formula evaluation
#[derive(Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// Source of referenced cell text
    pub resolver: &'a dyn Resolver,
    /// Time source for `NOW()`
    pub clock: &'a dyn Clock,
    pub options: EvaluationOptions,
}

impl<'a> EvaluationContext<'a> {
    /// Create a context reading cells through `resolver`, using the system clock
    pub fn new(resolver: &'a dyn Resolver) -> Self {
        Self {
            resolver,
            clock: &SYSTEM_CLOCK,
            options: EvaluationOptions::default(),
        }
    }

    /// Create a simple context without cells (for testing)
    pub fn simple() -> EvaluationContext<'static> {
        EvaluationContext::new(&NO_CELLS)
    }

    pub fn with_clock(mut self, clock: &'a dyn Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_options(mut self, options: EvaluationOptions) -> Self {
        self.options = options;
        self
    }
}

impl fmt::Debug for EvaluationContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationContext")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Evaluation state shared by one or more top-level formulas
///
/// Tracks the addresses whose formulas are being evaluated (to detect cycles), the
/// expression nesting of the current formula, and the values of formula cells computed so
/// far. Function implementations receive it to evaluate their arguments.
///
/// The cell values are only valid while the cells behind the resolver do not change.
pub struct Evaluator<'a> {
    ctx: &'a EvaluationContext<'a>,
    stack: Vec<String>,
    depth: usize,
    cache: AHashMap<String, FormulaValue>,
}

impl<'a> Evaluator<'a> {
    pub fn new(ctx: &'a EvaluationContext<'a>) -> Self {
        Self {
            ctx,
            stack: Vec::new(),
            depth: 0,
            cache: AHashMap::new(),
        }
    }

    pub fn options(&self) -> &EvaluationOptions {
        &self.ctx.options
    }

    pub fn clock(&self) -> &dyn Clock {
        self.ctx.clock
    }

    /// Evaluate formula text; the leading `=` is optional
    pub fn evaluate_formula(&mut self, formula: &str) -> FormulaResult<FormulaValue> {
        let expr = normalize(formula);
        self.evaluate_expr(&expr)
    }

    /// Evaluate the formula stored at `address`
    ///
    /// A reference back to `address` while it is evaluated is a circular reference.
    /// Successful results are remembered by address.
    pub fn evaluate_cell(&mut self, address: &str, formula: &str) -> FormulaResult<FormulaValue> {
        let address = address.trim().to_uppercase();
        if let Some(value) = self.cache.get(&address) {
            return Ok(value.clone());
        }
        if self.stack.contains(&address) {
            return Err(FormulaError::CircularReference(format!(
                "{} -> {}",
                self.stack.join(" -> "),
                address
            )));
        }
        let max_depth = self.ctx.options.max_depth;
        if self.stack.len() >= max_depth {
            return Err(FormulaError::CircularReference(format!(
                "more than {} formula cells nested while evaluating {}",
                max_depth, address
            )));
        }

        self.stack.push(address.clone());
        let outer_depth = std::mem::take(&mut self.depth);
        let result = self.evaluate_formula(formula);
        self.depth = outer_depth;
        self.stack.pop();

        if let Ok(value) = &result {
            self.cache.insert(address, value.clone());
        }
        result
    }

    /// Evaluate an already normalized (sub-)expression
    pub fn evaluate_expr(&mut self, expr: &str) -> FormulaResult<FormulaValue> {
        if self.depth >= MAX_EXPRESSION_DEPTH {
            return Err(FormulaError::Parse(format!(
                "expression nested deeper than {} levels: '{}'",
                MAX_EXPRESSION_DEPTH, expr
            )));
        }

        self.depth += 1;
        let result = self.dispatch(expr.trim());
        self.depth -= 1;
        result
    }

    /// Evaluate an expression and coerce the result to a number
    pub fn number(&mut self, expr: &str) -> FormulaResult<f64> {
        Ok(self.evaluate_expr(expr)?.to_number())
    }

    /// Values of a function argument: every cell of a range in row-major order, or the
    /// single value of any other expression
    ///
    /// Ranges are clamped to the resolver's bounds, then checked against
    /// [`EvaluationOptions::max_range_cells`].
    pub fn expand(&mut self, arg: &str) -> FormulaResult<Vec<FormulaValue>> {
        let arg = arg.trim();
        if !is_range(arg) {
            return Ok(vec![self.evaluate_expr(arg)?]);
        }

        let mut range = CellRange::parse(arg)?;
        if let Some((rows, cols)) = self.ctx.resolver.bounds() {
            match clamp_range(range, rows, cols) {
                Some(clamped) => range = clamped,
                None => return Ok(Vec::new()),
            }
        }

        let limit = self.ctx.options.max_range_cells;
        if range.cell_count() > limit {
            return Err(FormulaError::Evaluation(format!(
                "range {} spans {} cells, more than the limit of {}",
                arg,
                range.cell_count(),
                limit
            )));
        }

        range
            .cells()
            .map(|addr| self.resolve_cell(&addr.to_a1_string()))
            .collect()
    }

    fn dispatch(&mut self, expr: &str) -> FormulaResult<FormulaValue> {
        if expr.is_empty() {
            return Ok(FormulaValue::Empty);
        }
        if let Some(text) = unquote(expr) {
            return Ok(FormulaValue::Text(text));
        }
        if let Some((name, args)) = split_function_call(expr) {
            return self.call_function(name, args);
        }
        if let Some(inner) = strip_parens(expr) {
            return self.evaluate_expr(inner);
        }
        if let Some((left, op, right)) = split_comparison(expr) {
            return self.compare(left, op, right);
        }
        if let Some(chain) = split_arithmetic(expr)? {
            return self.arithmetic(&chain);
        }
        if is_range(expr) {
            return Err(FormulaError::Evaluation(format!(
                "range {} can only be used as a function argument",
                expr
            )));
        }
        if is_address(expr) {
            return self.resolve_cell(expr);
        }

        match expr {
            "TRUE" => return Ok(FormulaValue::Boolean(true)),
            "FALSE" => return Ok(FormulaValue::Boolean(false)),
            _ => {}
        }

        // Signed operand left over from an arithmetic split, e.g. `-A1` or `-(1+2)`
        if let Some(operand) = expr.strip_prefix('-') {
            if parse_number(expr).is_none() {
                return Ok(FormulaValue::Number(-self.number(operand)?));
            }
        }
        if let Some(operand) = expr.strip_prefix('+') {
            return Ok(FormulaValue::Number(self.number(operand)?));
        }

        Ok(FormulaValue::Number(parse_value(Some(expr))))
    }

    fn call_function(&mut self, name: &str, args: &str) -> FormulaResult<FormulaValue> {
        let registry = get_function_registry();
        let def = registry
            .get(name)
            .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;

        let args = split_args(args);
        def.check_arity(args.len())?;

        trace!(function = def.name, args = args.len(), "calling function");
        (def.implementation)(&args, self)
    }

    fn compare(&mut self, left: &str, op: Comparison, right: &str) -> FormulaResult<FormulaValue> {
        let lhs = self.evaluate_expr(left)?;
        let rhs = self.evaluate_expr(right)?;

        let ordering = if lhs.is_text() || rhs.is_text() {
            Some(
                lhs.to_string()
                    .to_uppercase()
                    .cmp(&rhs.to_string().to_uppercase()),
            )
        } else {
            lhs.to_number().partial_cmp(&rhs.to_number())
        };

        // NaN compares unequal to everything
        let result = ordering.map_or(op == Comparison::NotEqual, |o| op.holds(o));
        Ok(FormulaValue::Boolean(result))
    }

    fn arithmetic(&mut self, chain: &ArithmeticChain<'_>) -> FormulaResult<FormulaValue> {
        let values = chain
            .operands
            .iter()
            .map(|operand| self.number(operand))
            .collect::<FormulaResult<Vec<f64>>>()?;

        let result = match self.ctx.options.precedence {
            OperatorPrecedence::LeftToRight => fold_left_to_right(&values, &chain.operators)?,
            OperatorPrecedence::Standard => fold_standard(&values, &chain.operators)?,
        };
        Ok(FormulaValue::Number(result))
    }

    /// Value of the cell at `address`
    fn resolve_cell(&mut self, address: &str) -> FormulaResult<FormulaValue> {
        if let Some(value) = self.cache.get(address) {
            return Ok(value.clone());
        }

        let Some(text) = self.ctx.resolver.resolve(address) else {
            return Ok(FormulaValue::Empty);
        };
        let trimmed = text.trim();

        if let Some(literal) = trimmed.strip_prefix(TEXT_PREFIX) {
            return Ok(FormulaValue::Text(literal.to_string()));
        }
        if trimmed.starts_with(FORMULA_MARKER) {
            return self.evaluate_cell(address, trimmed);
        }

        Ok(literal_value(&text))
    }
}

/// Part of `range` inside a grid of `rows` x `cols`, or `None` if it lies outside
fn clamp_range(range: CellRange, rows: u32, cols: u32) -> Option<CellRange> {
    if range.start.row >= rows || range.start.col >= cols {
        return None;
    }
    let end = CellAddress::new(range.end.row.min(rows - 1), range.end.col.min(cols - 1));
    Some(CellRange::new(range.start, end))
}

/// Interpret raw literal cell text
fn literal_value(text: &str) -> FormulaValue {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return FormulaValue::Empty;
    }
    if let Some(n) = parse_number(trimmed) {
        return FormulaValue::Number(n);
    }
    if trimmed.eq_ignore_ascii_case("TRUE") {
        return FormulaValue::Boolean(true);
    }
    if trimmed.eq_ignore_ascii_case("FALSE") {
        return FormulaValue::Boolean(false);
    }
    FormulaValue::Text(text.to_string())
}

fn apply(op: ArithmeticOp, lhs: f64, rhs: f64) -> FormulaResult<f64> {
    Ok(match op {
        ArithmeticOp::Add => lhs + rhs,
        ArithmeticOp::Subtract => lhs - rhs,
        ArithmeticOp::Multiply => lhs * rhs,
        ArithmeticOp::Divide => {
            if rhs == 0.0 {
                return Err(FormulaError::Evaluation("division by zero".to_string()));
            }
            lhs / rhs
        }
        ArithmeticOp::Power => lhs.powf(rhs),
    })
}

fn fold_left_to_right(values: &[f64], ops: &[ArithmeticOp]) -> FormulaResult<f64> {
    let (&first, rest) = values
        .split_first()
        .ok_or_else(|| FormulaError::Parse("empty arithmetic expression".to_string()))?;
    ops.iter()
        .zip(rest)
        .try_fold(first, |acc, (&op, &value)| apply(op, acc, value))
}

fn fold_standard(values: &[f64], ops: &[ArithmeticOp]) -> FormulaResult<f64> {
    let (&first, rest) = values
        .split_first()
        .ok_or_else(|| FormulaError::Parse("empty arithmetic expression".to_string()))?;

    let mut output = vec![first];
    let mut pending: Vec<ArithmeticOp> = Vec::new();

    for (&op, &value) in ops.iter().zip(rest) {
        while let Some(&top) = pending.last() {
            let binds_first = top.precedence() > op.precedence()
                || (top.precedence() == op.precedence() && !op.is_right_associative());
            if !binds_first {
                break;
            }
            pending.pop();
            reduce(&mut output, top)?;
        }
        pending.push(op);
        output.push(value);
    }
    while let Some(op) = pending.pop() {
        reduce(&mut output, op)?;
    }

    output
        .pop()
        .ok_or_else(|| FormulaError::Parse("empty arithmetic expression".to_string()))
}

fn reduce(output: &mut Vec<f64>, op: ArithmeticOp) -> FormulaResult<()> {
    let (Some(rhs), Some(lhs)) = (output.pop(), output.pop()) else {
        return Err(FormulaError::Parse("missing operand".to_string()));
    };
    output.push(apply(op, lhs, rhs)?);
    Ok(())
}

/// Evaluate a formula
pub fn evaluate(formula: &str, ctx: &EvaluationContext<'_>) -> FormulaResult<FormulaValue> {
    let result = Evaluator::new(ctx).evaluate_formula(formula);
    trace!(formula, ?result, "evaluated");
    result
}

/// Evaluate the formula stored at `address`
///
/// Same as [`evaluate`], except that a reference back to `address` is reported as a
/// circular reference.
pub fn evaluate_at(
    formula: &str,
    address: &str,
    ctx: &EvaluationContext<'_>,
) -> FormulaResult<FormulaValue> {
    let result = Evaluator::new(ctx).evaluate_cell(address, formula);
    trace!(formula, address, ?result, "evaluated");
    result
}
