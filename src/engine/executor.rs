//! Row executor.
//!
//! Compiles a transformation descriptor's logic into a row routine and
//! applies it across a dataset. Robust against partially-invalid generated
//! programs: compile failures and per-row faults both degrade to keeping the
//! affected rows unchanged, and only the empty-result guard fails the whole
//! step.

use serde_json::Value;

use crate::error::{ExecutorError, ExecutorResult};
use crate::models::{Dataset, TransformationDescriptor};

use super::program::{EvalContext, RowProgram};

/// Result of executing one transformation over a dataset.
#[derive(Debug)]
pub struct ExecutionReport {
    /// The transformed dataset (new value; the input is never mutated).
    pub dataset: Dataset,
    /// Per-row faults, recovered by falling back to the original row.
    pub faults: Vec<RowFault>,
    /// Compile failure of the program, if any (every row then passed
    /// through unchanged).
    pub compile_fault: Option<String>,
    /// Number of rows dropped by filter logic.
    pub dropped: usize,
}

impl ExecutionReport {
    /// Summary line for logs.
    pub fn summary(&self) -> String {
        format!(
            "{} rows out, {} dropped, {} row faults",
            self.dataset.rows.len(),
            self.dropped,
            self.faults.len()
        )
    }
}

/// A fault on a single row.
#[derive(Debug, Clone)]
pub struct RowFault {
    /// Zero-based index of the faulting input row.
    pub row: usize,
    pub message: String,
}

/// Execute a transformation descriptor over a dataset.
///
/// The logic is compiled exactly once per call. Rows are visited in order;
/// every routine invocation sees the original, unmodified row vector as its
/// third input, so aggregates are stable within the pass. Rows mapped to
/// `None` are dropped. A non-empty input producing zero rows fails with
/// [`ExecutorError::EmptyResult`].
pub fn execute(
    dataset: &Dataset,
    descriptor: &TransformationDescriptor,
) -> ExecutorResult<ExecutionReport> {
    let compiled = RowProgram::from_logic(&descriptor.logic)
        .and_then(RowProgram::compile);

    let (routine, compile_fault) = match compiled {
        Ok(p) => (Some(p), None),
        Err(e) => (None, Some(e.to_string())),
    };

    let all_rows = &dataset.rows;
    let mut out_rows = Vec::with_capacity(all_rows.len());
    let mut faults = Vec::new();
    let mut dropped = 0usize;

    for (index, row) in all_rows.iter().enumerate() {
        let Some(ref routine) = routine else {
            // malformed program: every row falls back to itself
            out_rows.push(row.clone());
            continue;
        };

        match routine.apply(row, EvalContext { index, all_rows }) {
            Ok(Some(new_row)) => out_rows.push(new_row),
            Ok(None) => dropped += 1,
            Err(e) => {
                faults.push(RowFault { row: index, message: e.to_string() });
                out_rows.push(row.clone());
            }
        }
    }

    if out_rows.is_empty() && !all_rows.is_empty() {
        return Err(ExecutorError::EmptyResult { input_rows: all_rows.len() });
    }

    let headers = if out_rows.is_empty() {
        dataset.headers.clone()
    } else {
        recompute_headers(&out_rows)
    };

    Ok(ExecutionReport {
        dataset: Dataset::new(dataset.name.clone(), headers, out_rows),
        faults,
        compile_fault,
        dropped,
    })
}

/// Headers after a pass: the first row's keys, extended in encounter order
/// with keys that only later rows carry.
fn recompute_headers(rows: &[Value]) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for row in rows {
        if let Some(obj) = row.as_object() {
            for key in obj.keys() {
                if !headers.iter().any(|h| h == key) {
                    headers.push(key.clone());
                }
            }
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransformationKind;
    use serde_json::json;

    fn dataset(rows: Vec<Value>) -> Dataset {
        let headers = rows
            .first()
            .and_then(|r| r.as_object())
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default();
        Dataset::new("test.csv", headers, rows)
    }

    fn descriptor(logic: Value) -> TransformationDescriptor {
        TransformationDescriptor {
            kind: TransformationKind::Custom,
            description: "test".into(),
            logic,
        }
    }

    #[test]
    fn test_headers_follow_first_result_row() {
        let ds = dataset(vec![json!({"old": "a"}), json!({"old": "b"})]);
        let d = descriptor(json!({
            "steps": [{"type": "rename_column", "from": "old", "to": "new"}]
        }));
        let report = execute(&ds, &d).unwrap();
        assert_eq!(report.dataset.headers, vec!["new"]);
        assert_eq!(report.dataset.rows[0]["new"], "a");
    }

    #[test]
    fn test_all_rows_filtered_fails_step() {
        let ds = dataset(vec![json!({"x": 1}), json!({"x": 2})]);
        let d = descriptor(json!({
            "steps": [{"type": "filter", "when": {"type": "equals",
                "left": {"type": "column", "name": "x"},
                "right": {"type": "constant", "value": 99}}}]
        }));
        let err = execute(&ds, &d).unwrap_err();
        assert!(matches!(err, ExecutorError::EmptyResult { input_rows: 2 }));
    }

    #[test]
    fn test_faulting_row_falls_back_unchanged() {
        // row 3 of 5 carries a non-numeric age; the comparison faults there only
        let rows = vec![
            json!({"age": 21}),
            json!({"age": 30}),
            json!({"age": "??"}),
            json!({"age": 45}),
            json!({"age": 19}),
        ];
        let ds = dataset(rows.clone());
        let d = descriptor(json!({
            "steps": [{"type": "set_column", "column": "adult", "value": {
                "type": "constant", "value": true
            }}, {"type": "filter", "when": {"type": "greater_than",
                "left": {"type": "column", "name": "age"},
                "right": {"type": "constant", "value": 0}}}]
        }));
        let report = execute(&ds, &d).unwrap();
        assert_eq!(report.dataset.rows.len(), 5);
        assert_eq!(report.faults.len(), 1);
        assert_eq!(report.faults[0].row, 2);
        // the faulting row is the original, without the added column
        assert_eq!(report.dataset.rows[2], rows[2]);
        assert_eq!(report.dataset.rows[0]["adult"], json!(true));
    }

    #[test]
    fn test_malformed_program_degrades_to_identity() {
        let rows = vec![json!({"a": 1}), json!({"a": 2})];
        let ds = dataset(rows.clone());
        let d = descriptor(json!({"not_steps": true}));
        let report = execute(&ds, &d).unwrap();
        assert_eq!(report.dataset.rows, rows);
        assert!(report.compile_fault.is_some());
    }

    #[test]
    fn test_aggregates_stable_across_pass() {
        // each row is rewritten to v=0, but the average still sees originals
        let rows = vec![json!({"v": 10}), json!({"v": 20}), json!({"v": 30})];
        let ds = dataset(rows);
        let d = descriptor(json!({
            "steps": [
                {"type": "set_column", "column": "avg", "value": {
                    "type": "aggregate", "column": "v", "func": "average"}},
                {"type": "set_column", "column": "v", "value": {
                    "type": "constant", "value": 0}}
            ]
        }));
        let report = execute(&ds, &d).unwrap();
        for row in &report.dataset.rows {
            assert_eq!(row["avg"], json!(20.0));
        }
    }

    #[test]
    fn test_input_dataset_not_mutated() {
        let rows = vec![json!({"a": " x "})];
        let ds = dataset(rows.clone());
        let d = descriptor(json!({
            "steps": [{"type": "update_column", "column": "a", "ops": [{"type": "trim"}]}]
        }));
        let report = execute(&ds, &d).unwrap();
        assert_eq!(ds.rows, rows);
        assert_eq!(report.dataset.rows[0]["a"], "x");
    }

    #[test]
    fn test_header_union_covers_later_keys() {
        // filter drops the wide row first, set_column only touches row 0's shape
        let rows = vec![json!({"a": 1}), json!({"a": 2, "b": 3})];
        let ds = dataset(rows);
        let d = descriptor(json!({"steps": []}));
        let report = execute(&ds, &d).unwrap();
        assert_eq!(report.dataset.headers, vec!["a", "b"]);
    }

    #[test]
    fn test_empty_input_passes_through() {
        let ds = Dataset::new("empty.csv", vec!["a".into()], vec![]);
        let d = descriptor(json!({"steps": []}));
        let report = execute(&ds, &d).unwrap();
        assert!(report.dataset.rows.is_empty());
        assert_eq!(report.dataset.headers, vec!["a"]);
    }
}
