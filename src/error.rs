//! Error types for the rowlab command pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`ParseError`] - file input errors (CSV/Excel)
//! - [`InterpreterError`] - remote interpretation errors
//! - [`ExecutorError`] - whole-transformation errors
//! - [`SessionError`] - queue/history/session errors
//! - [`ExportError`] - workbook export errors
//! - [`PipelineError`] - top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.
//!
//! Per-row execution faults are deliberately NOT errors: a row whose
//! routine misbehaves falls back to the original row and the fault is
//! recorded on the execution report instead (see [`crate::engine::executor`]).

use thiserror::Error;

// =============================================================================
// File Input Errors
// =============================================================================

/// Errors while parsing an uploaded file.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Failed to read the file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to decode the file's text encoding.
    #[error("Failed to decode content: {0}")]
    Encoding(String),

    /// Invalid CSV content.
    #[error("Invalid CSV: {0}")]
    Csv(String),

    /// Invalid Excel workbook.
    #[error("Invalid Excel workbook: {0}")]
    Excel(String),

    /// File extension not recognized.
    #[error("Unsupported file format: '{0}' (expected .csv, .xlsx or .xls)")]
    UnsupportedFormat(String),

    /// The file contained no data rows.
    #[error("File is empty")]
    EmptyFile,

    /// No header row found.
    #[error("No headers found")]
    NoHeaders,
}

// =============================================================================
// Interpreter Errors
// =============================================================================

/// Errors from the remote transformation interpreter.
#[derive(Debug, Error)]
pub enum InterpreterError {
    /// Missing or empty credential.
    #[error("Missing AI configuration: set the ANTHROPIC_API_KEY environment variable (a .env file works too)")]
    MissingApiKey,

    /// HTTP request failed.
    #[error("Interpreter request failed: {0}")]
    RequestFailed(String),

    /// The service returned an error.
    #[error("Interpreter service error: {0}")]
    Api(String),

    /// The response could not be parsed into a transformation descriptor.
    #[error("Invalid interpreter response: {0}")]
    InvalidResponse(String),

    /// The generated logic was missing or empty.
    #[error("Generated logic was empty; try rephrasing the instruction")]
    EmptyLogic,
}

// =============================================================================
// Executor Errors
// =============================================================================

/// Whole-transformation failures from the row executor.
///
/// Per-row faults never surface here; they are recovered by falling back
/// to the original row.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// A non-empty input produced zero rows. Guards against runaway
    /// filter logic silently emptying the dataset.
    #[error("Transformation produced an empty result ({input_rows} input rows, 0 output rows)")]
    EmptyResult { input_rows: usize },
}

// =============================================================================
// Session Errors
// =============================================================================

/// Errors from the command queue / dataset history / session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No dataset has been loaded yet.
    #[error("No dataset loaded")]
    NoDataset,

    /// Instruction was empty or whitespace-only.
    #[error("Instruction must not be empty")]
    EmptyInstruction,

    /// Unknown command id.
    #[error("Command not found: {0}")]
    CommandNotFound(uuid::Uuid),

    /// A command may only be removed while pending or errored.
    #[error("Cannot remove a {status} command")]
    IllegalRemoval { status: String },

    /// Illegal command status transition.
    #[error("Illegal status transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while serializing the dataset to a workbook.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Workbook construction or serialization failed.
    #[error("Failed to build workbook: {0}")]
    Workbook(String),

    /// Failed to write the output file.
    #[error("Failed to write export file: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the main error type returned by [`crate::pipeline::apply_instructions`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// File input error.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Interpreter error.
    #[error("Interpreter error: {0}")]
    Interpreter(#[from] InterpreterError),

    /// Executor error.
    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),

    /// Session error.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Export error.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The run stopped on a failing command.
    #[error("Interrupted: {0}")]
    Interrupted(String),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for file input operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type for interpreter operations.
pub type InterpreterResult<T> = Result<T, InterpreterError>;

/// Result type for executor operations.
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // ParseError -> PipelineError
        let parse_err = ParseError::EmptyFile;
        let pipeline_err: PipelineError = parse_err.into();
        assert!(pipeline_err.to_string().contains("empty"));

        // ExecutorError -> PipelineError
        let exec_err = ExecutorError::EmptyResult { input_rows: 12 };
        let pipeline_err: PipelineError = exec_err.into();
        assert!(pipeline_err.to_string().contains("12 input rows"));
    }

    #[test]
    fn test_missing_key_message_is_actionable() {
        let err = InterpreterError::MissingApiKey;
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_illegal_transition_format() {
        let err = SessionError::IllegalTransition {
            from: "applied".into(),
            to: "processing".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("applied"));
        assert!(msg.contains("processing"));
    }
}
