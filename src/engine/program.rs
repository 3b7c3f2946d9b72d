//! Row program definition.
//!
//! A row program is the executable form of a natural-language instruction:
//! a JSON document describing an ordered list of steps applied to each row.
//! It is a closed DSL — a program can only read its inputs (the row, the row
//! index, and the original row set) and produce a value. No loops, no I/O,
//! no ambient state, so a program always terminates and needs no timeout.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use super::ops::Operation;

/// A complete row program.
///
/// Evaluates as a routine `(row, index, all_rows) -> Option<row>`; returning
/// `None` drops the row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowProgram {
    /// Steps applied in order to each row.
    pub steps: Vec<RowStep>,
}

/// One step of a row program.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RowStep {
    /// Rename a column, preserving its position.
    RenameColumn { from: String, to: String },

    /// Remove the listed columns.
    DropColumns { columns: Vec<String> },

    /// Keep only the listed columns, in the listed order.
    SelectColumns { columns: Vec<String> },

    /// Add or overwrite a column with a computed value.
    SetColumn { column: String, value: ValueExpr },

    /// Apply a chain of cell operations to an existing column.
    UpdateColumn { column: String, ops: Vec<Operation> },

    /// Keep only rows for which the condition holds.
    Filter { when: Condition },
}

/// A value expression, evaluated against the row being transformed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueExpr {
    /// Current value of a column (null if absent).
    Column { name: String },

    /// A literal value.
    Constant { value: Value },

    /// Concatenation of sub-expressions, skipping empty parts.
    Concat {
        parts: Vec<ValueExpr>,
        #[serde(default = "default_concat_separator")]
        separator: String,
    },

    /// Zero-based index of the current row.
    RowIndex,

    /// Total number of rows in the pass.
    RowCount,

    /// Aggregate over a column of the original, unmodified row set.
    Aggregate {
        column: String,
        func: AggregateFunc,
    },

    /// A sub-expression with a chain of cell operations applied.
    Apply {
        input: Box<ValueExpr>,
        ops: Vec<Operation>,
    },
}

fn default_concat_separator() -> String {
    " ".to_string()
}

/// Aggregate functions over a column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunc {
    Average,
    Sum,
    Min,
    Max,
    Count,
}

/// A boolean condition over the row being transformed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    Equals { left: ValueExpr, right: ValueExpr },
    NotEquals { left: ValueExpr, right: ValueExpr },
    GreaterThan { left: ValueExpr, right: ValueExpr },
    LessThan { left: ValueExpr, right: ValueExpr },
    /// Literal substring match.
    Contains { value: ValueExpr, pattern: String },
    /// Regex match.
    Matches { value: ValueExpr, pattern: String },
    IsEmpty { value: ValueExpr },
    Not { of: Box<Condition> },
    All { of: Vec<Condition> },
    Any { of: Vec<Condition> },
}

// =============================================================================
// Compilation
// =============================================================================

/// Program compilation errors.
#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    /// The logic JSON does not describe a row program.
    #[error("Cannot parse row program: {0}")]
    Parse(#[from] serde_json::Error),

    /// A regex pattern in the program is invalid.
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// A per-row evaluation fault.
///
/// Recovered by the executor (the row falls back to its original value);
/// never surfaced to the user as a step failure.
#[derive(Debug, Clone)]
pub struct EvalError {
    pub message: String,
}

impl EvalError {
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// A compiled row program, ready to run over a row set.
///
/// Compilation happens exactly once per command application: the logic JSON
/// is deserialized and every regex pattern is validated and cached.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    program: RowProgram,
    regexes: HashMap<String, regex::Regex>,
}

impl RowProgram {
    /// Parse a program from its JSON source.
    pub fn from_logic(logic: &Value) -> Result<Self, ProgramError> {
        Ok(serde_json::from_value(logic.clone())?)
    }

    /// Compile the program: validate and cache all regex patterns.
    pub fn compile(self) -> Result<CompiledProgram, ProgramError> {
        let mut regexes = HashMap::new();
        for pattern in self.collect_patterns() {
            if !regexes.contains_key(&pattern) {
                let re = regex::Regex::new(&pattern).map_err(|e| ProgramError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
                regexes.insert(pattern, re);
            }
        }
        Ok(CompiledProgram { program: self, regexes })
    }

    fn collect_patterns(&self) -> Vec<String> {
        let mut patterns = Vec::new();
        for step in &self.steps {
            match step {
                RowStep::UpdateColumn { ops, .. } => {
                    for op in ops {
                        patterns.extend(op.patterns().into_iter().map(String::from));
                    }
                }
                RowStep::SetColumn { value, .. } => collect_expr_patterns(value, &mut patterns),
                RowStep::Filter { when } => collect_condition_patterns(when, &mut patterns),
                _ => {}
            }
        }
        patterns
    }
}

fn collect_expr_patterns(expr: &ValueExpr, out: &mut Vec<String>) {
    match expr {
        ValueExpr::Concat { parts, .. } => {
            for p in parts {
                collect_expr_patterns(p, out);
            }
        }
        ValueExpr::Apply { input, ops } => {
            collect_expr_patterns(input, out);
            for op in ops {
                out.extend(op.patterns().into_iter().map(String::from));
            }
        }
        _ => {}
    }
}

fn collect_condition_patterns(cond: &Condition, out: &mut Vec<String>) {
    match cond {
        Condition::Matches { value, pattern } => {
            collect_expr_patterns(value, out);
            out.push(pattern.clone());
        }
        Condition::Contains { value, .. } | Condition::IsEmpty { value } => {
            collect_expr_patterns(value, out);
        }
        Condition::Equals { left, right }
        | Condition::NotEquals { left, right }
        | Condition::GreaterThan { left, right }
        | Condition::LessThan { left, right } => {
            collect_expr_patterns(left, out);
            collect_expr_patterns(right, out);
        }
        Condition::Not { of } => collect_condition_patterns(of, out),
        Condition::All { of } | Condition::Any { of } => {
            for c in of {
                collect_condition_patterns(c, out);
            }
        }
    }
}

// =============================================================================
// Evaluation
// =============================================================================

/// Read-only inputs of one routine invocation.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    /// Zero-based row index.
    pub index: usize,
    /// The original, unmodified row set of the pass.
    pub all_rows: &'a [Value],
}

impl CompiledProgram {
    /// Run the routine on one row.
    ///
    /// `Ok(None)` drops the row (filter); `Err` is a per-row fault that the
    /// executor recovers by keeping the original row.
    pub fn apply(&self, row: &Value, ctx: EvalContext<'_>) -> Result<Option<Value>, EvalError> {
        let obj = row
            .as_object()
            .ok_or_else(|| EvalError::new("input row is not an object"))?;

        let mut out = obj.clone();
        for step in &self.program.steps {
            match step {
                RowStep::RenameColumn { from, to } => {
                    if out.contains_key(from) {
                        let mut renamed = Map::with_capacity(out.len());
                        for (k, v) in out {
                            if &k == from {
                                renamed.insert(to.clone(), v);
                            } else {
                                renamed.insert(k, v);
                            }
                        }
                        out = renamed;
                    }
                }

                RowStep::DropColumns { columns } => {
                    for c in columns {
                        out.remove(c);
                    }
                }

                RowStep::SelectColumns { columns } => {
                    let mut selected = Map::with_capacity(columns.len());
                    for c in columns {
                        if let Some(v) = out.get(c) {
                            selected.insert(c.clone(), v.clone());
                        }
                    }
                    out = selected;
                }

                RowStep::SetColumn { column, value } => {
                    let v = self.eval_expr(value, &out, ctx)?;
                    out.insert(column.clone(), v);
                }

                RowStep::UpdateColumn { column, ops } => {
                    if let Some(v) = out.get(column) {
                        let mut v = v.clone();
                        for op in ops {
                            v = op.apply(&v);
                        }
                        out.insert(column.clone(), v);
                    }
                }

                RowStep::Filter { when } => {
                    if !self.eval_condition(when, &out, ctx)? {
                        return Ok(None);
                    }
                }
            }
        }

        Ok(Some(Value::Object(out)))
    }

    fn eval_expr(
        &self,
        expr: &ValueExpr,
        row: &Map<String, Value>,
        ctx: EvalContext<'_>,
    ) -> Result<Value, EvalError> {
        match expr {
            ValueExpr::Column { name } => Ok(row.get(name).cloned().unwrap_or(Value::Null)),

            ValueExpr::Constant { value } => Ok(value.clone()),

            ValueExpr::Concat { parts, separator } => {
                let mut pieces = Vec::with_capacity(parts.len());
                for p in parts {
                    let v = self.eval_expr(p, row, ctx)?;
                    if let Some(s) = coerce_string(&v) {
                        let trimmed = s.trim().to_string();
                        if !trimmed.is_empty() {
                            pieces.push(trimmed);
                        }
                    }
                }
                Ok(Value::String(pieces.join(separator)))
            }

            ValueExpr::RowIndex => Ok(Value::Number((ctx.index as u64).into())),

            ValueExpr::RowCount => Ok(Value::Number((ctx.all_rows.len() as u64).into())),

            ValueExpr::Aggregate { column, func } => aggregate(ctx.all_rows, column, *func),

            ValueExpr::Apply { input, ops } => {
                let mut v = self.eval_expr(input, row, ctx)?;
                for op in ops {
                    v = op.apply(&v);
                }
                Ok(v)
            }
        }
    }

    fn eval_condition(
        &self,
        cond: &Condition,
        row: &Map<String, Value>,
        ctx: EvalContext<'_>,
    ) -> Result<bool, EvalError> {
        match cond {
            Condition::Equals { left, right } => {
                let (l, r) = (self.eval_expr(left, row, ctx)?, self.eval_expr(right, row, ctx)?);
                Ok(loose_eq(&l, &r))
            }
            Condition::NotEquals { left, right } => {
                let (l, r) = (self.eval_expr(left, row, ctx)?, self.eval_expr(right, row, ctx)?);
                Ok(!loose_eq(&l, &r))
            }
            Condition::GreaterThan { left, right } => {
                let (l, r) = (self.eval_expr(left, row, ctx)?, self.eval_expr(right, row, ctx)?);
                Ok(coerce_number(&l).ok_or_else(|| non_numeric(&l))?
                    > coerce_number(&r).ok_or_else(|| non_numeric(&r))?)
            }
            Condition::LessThan { left, right } => {
                let (l, r) = (self.eval_expr(left, row, ctx)?, self.eval_expr(right, row, ctx)?);
                Ok(coerce_number(&l).ok_or_else(|| non_numeric(&l))?
                    < coerce_number(&r).ok_or_else(|| non_numeric(&r))?)
            }
            Condition::Contains { value, pattern } => {
                let v = self.eval_expr(value, row, ctx)?;
                Ok(coerce_string(&v).map(|s| s.contains(pattern.as_str())).unwrap_or(false))
            }
            Condition::Matches { value, pattern } => {
                let v = self.eval_expr(value, row, ctx)?;
                // patterns are validated and cached at compile time
                let re = self
                    .regexes
                    .get(pattern)
                    .ok_or_else(|| EvalError::new(format!("unknown pattern '{}'", pattern)))?;
                Ok(coerce_string(&v).map(|s| re.is_match(&s)).unwrap_or(false))
            }
            Condition::IsEmpty { value } => {
                let v = self.eval_expr(value, row, ctx)?;
                Ok(is_empty(&v))
            }
            Condition::Not { of } => Ok(!self.eval_condition(of, row, ctx)?),
            Condition::All { of } => {
                for c in of {
                    if !self.eval_condition(c, row, ctx)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Condition::Any { of } => {
                for c in of {
                    if self.eval_condition(c, row, ctx)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

fn non_numeric(v: &Value) -> EvalError {
    EvalError::new(format!("cannot compare non-numeric value {}", v))
}

fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    if left == right {
        return true;
    }
    if let (Some(l), Some(r)) = (coerce_number(left), coerce_number(right)) {
        return l == r;
    }
    match (coerce_string(left), coerce_string(right)) {
        (Some(l), Some(r)) => l == r,
        _ => false,
    }
}

fn aggregate(rows: &[Value], column: &str, func: AggregateFunc) -> Result<Value, EvalError> {
    let values: Vec<&Value> = rows
        .iter()
        .filter_map(|r| r.as_object().and_then(|o| o.get(column)))
        .collect();

    if let AggregateFunc::Count = func {
        let count = values.iter().filter(|v| !is_empty(v)).count();
        return Ok(Value::Number((count as u64).into()));
    }

    let numbers: Vec<f64> = values.iter().filter_map(|v| coerce_number(v)).collect();
    if numbers.is_empty() {
        return Err(EvalError::new(format!(
            "column '{}' has no numeric values to aggregate",
            column
        )));
    }

    let result = match func {
        AggregateFunc::Sum => numbers.iter().sum(),
        AggregateFunc::Average => numbers.iter().sum::<f64>() / numbers.len() as f64,
        AggregateFunc::Min => numbers.iter().cloned().fold(f64::INFINITY, f64::min),
        AggregateFunc::Max => numbers.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        AggregateFunc::Count => unreachable!(),
    };

    serde_json::Number::from_f64(result)
        .map(Value::Number)
        .ok_or_else(|| EvalError::new("aggregate produced a non-finite number"))
}

/// An example program for documentation and interpreter prompts.
pub fn example_program() -> RowProgram {
    RowProgram {
        steps: vec![
            RowStep::RenameColumn {
                from: "e-mail".into(),
                to: "email".into(),
            },
            RowStep::UpdateColumn {
                column: "name".into(),
                ops: vec![Operation::Trim, Operation::Uppercase],
            },
            RowStep::SetColumn {
                column: "price".into(),
                value: ValueExpr::Apply {
                    input: Box::new(ValueExpr::Column { name: "price".into() }),
                    ops: vec![
                        Operation::Replace {
                            pattern: "[$,]".into(),
                            value: String::new(),
                        },
                        Operation::ToNumber,
                    ],
                },
            },
            RowStep::Filter {
                when: Condition::Not {
                    of: Box::new(Condition::IsEmpty {
                        value: ValueExpr::Column { name: "email".into() },
                    }),
                },
            },
        ],
    }
}
