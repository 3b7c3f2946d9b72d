//! High-level pipeline API for headless dataset editing.
//!
//! Combines all the steps the server exposes interactively: parse a file,
//! queue a list of instructions, run them sequentially, and optionally
//! export the result.
//!
//! # Example
//!
//! ```rust,ignore
//! use rowlab::pipeline::{apply_instructions, ApplyOptions};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let outcome = apply_instructions(
//!         Path::new("people.csv"),
//!         &["trim all names".into(), "drop the notes column".into()],
//!         ApplyOptions::default(),
//!     ).await?;
//!
//!     println!("{} rows after editing", outcome.dataset.row_count());
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};

use crate::api::logs::{log_error, log_info, log_success};
use crate::error::{PipelineError, PipelineResult};
use crate::export;
use crate::interpreter::{AiInterpreter, CommandInterpreter};
use crate::models::Dataset;
use crate::parser;
use crate::session::{RunState, Session};

/// Options for a headless apply.
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Write the edited dataset to this `.xlsx` path.
    pub output: Option<PathBuf>,

    /// Override the interpreter model.
    pub model: Option<String>,
}

/// Result of a headless apply.
#[derive(Debug)]
pub struct ApplyOutcome {
    /// The dataset after all instructions applied.
    pub dataset: Dataset,
    /// Number of instructions applied.
    pub applied: usize,
}

/// Parse a file, run a list of instructions against it, optionally export.
///
/// Stops on the first failing instruction, like an interactive run; the
/// partial result is not exported and the error names the instruction that
/// failed.
pub async fn apply_instructions(
    path: &Path,
    instructions: &[String],
    options: ApplyOptions,
) -> PipelineResult<ApplyOutcome> {
    let mut interpreter = AiInterpreter::from_env();
    if let Some(model) = &options.model {
        interpreter = interpreter.with_model(model);
    }
    apply_instructions_with(&interpreter, path, instructions, options).await
}

/// Like [`apply_instructions`], with an explicit interpreter.
pub async fn apply_instructions_with<I: CommandInterpreter>(
    interpreter: &I,
    path: &Path,
    instructions: &[String],
    options: ApplyOptions,
) -> PipelineResult<ApplyOutcome> {
    let dataset = parser::parse_path(path)?;
    log_info(format!(
        "Loaded {} ({} rows, {} columns)",
        dataset.name,
        dataset.row_count(),
        dataset.headers.len()
    ));

    let mut session = Session::new();
    session.load_dataset(dataset);

    for instruction in instructions {
        session.enqueue(instruction)?;
    }
    log_info(format!("Queued {} instructions", instructions.len()));

    let report = session.run(interpreter).await?;

    if let RunState::Interrupted { message } = report.state {
        log_error(format!(
            "Stopped after {} of {} instructions: {}",
            report.applied, report.attempted, message
        ));
        return Err(PipelineError::Interrupted(message));
    }

    let dataset = session.dataset()?.clone();
    log_success(format!(
        "Applied {} instructions, {} rows remain",
        report.applied,
        dataset.row_count()
    ));

    if let Some(output) = &options.output {
        export::export_to_path(&dataset, output)?;
        log_success(format!("Exported to {}", output.display()));
    }

    Ok(ApplyOutcome {
        dataset,
        applied: report.applied,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InterpreterResult;
    use crate::models::{TransformationDescriptor, TransformationKind};
    use serde_json::{json, Value};
    use std::io::Write;

    /// Always answers with the same trim program.
    struct TrimEverything;

    impl CommandInterpreter for TrimEverything {
        async fn interpret(
            &self,
            _instruction: &str,
            headers: &[String],
            _sample_rows: &[Value],
        ) -> InterpreterResult<TransformationDescriptor> {
            let ops = json!([{"type": "trim"}]);
            let steps: Vec<Value> = headers
                .iter()
                .map(|h| json!({"type": "update_column", "column": h, "ops": ops}))
                .collect();
            Ok(TransformationDescriptor {
                kind: TransformationKind::Format,
                description: "Trims every column".into(),
                logic: json!({ "steps": steps }),
            })
        }
    }

    #[tokio::test]
    async fn test_apply_roundtrip_with_export() {
        let mut input = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(input, "name,city\n alice ,paris\n bob , lyon ").unwrap();

        let out_dir = tempfile::tempdir().unwrap();
        let out_path = out_dir.path().join("edited.xlsx");

        let outcome = apply_instructions_with(
            &TrimEverything,
            input.path(),
            &["clean whitespace".into()],
            ApplyOptions {
                output: Some(out_path.clone()),
                model: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.dataset.rows[0]["name"], "alice");
        assert_eq!(outcome.dataset.rows[1]["city"], "lyon");
        assert!(out_path.exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_parse_error() {
        let err = apply_instructions_with(
            &TrimEverything,
            Path::new("/nonexistent/nope.csv"),
            &[],
            ApplyOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));
    }
}
