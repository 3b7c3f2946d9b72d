//! # Rowlab - natural-language tabular data editing
//!
//! Rowlab loads a CSV or Excel file, turns plain-English edit instructions
//! into row programs via the Anthropic API, applies them sequentially with
//! per-command status tracking and undo, and exports the result.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV/Excel  │────▶│  Instruction │────▶│ Row Program │────▶│  Dataset    │
//! │  (auto-enc) │     │  (AI → DSL)  │     │  Executor   │     │  History    │
//! └─────────────┘     └──────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rowlab::pipeline::{apply_instructions, ApplyOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let outcome = apply_instructions(
//!         "people.csv".as_ref(),
//!         &["trim all names".into()],
//!         ApplyOptions::default(),
//!     ).await.unwrap();
//!     println!("{} rows", outcome.dataset.row_count());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Domain models (Dataset, Command, TransformationDescriptor)
//! - [`parser`] - CSV/Excel parsing with auto-detection
//! - [`engine`] - Row-program DSL and executor
//! - [`interpreter`] - AI-powered instruction interpretation
//! - [`session`] - Command queue, dataset history, run orchestration
//! - [`pipeline`] - Headless end-to-end API
//! - [`export`] - Excel export
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod engine;

// AI
pub mod interpreter;

// Session state
pub mod session;

// End-to-end
pub mod pipeline;

// Export
pub mod export;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ExecutorError, ExportError, InterpreterError, ParseError, PipelineError, ServerError,
    SessionError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    Command, CommandStatus, Dataset, HistoryEntry, TransformationDescriptor, TransformationKind,
};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_csv_bytes, parse_csv_str,
    parse_path, parse_upload, ParsedTable,
};

// =============================================================================
// Re-exports - Engine
// =============================================================================

pub use engine::{
    example_program, execute, operations_description, CompiledProgram, Condition, ExecutionReport,
    Operation, RowFault, RowProgram, RowStep, ValueExpr,
};

// =============================================================================
// Re-exports - Interpreter
// =============================================================================

pub use interpreter::{AiInterpreter, CommandInterpreter};

// =============================================================================
// Re-exports - Session
// =============================================================================

pub use session::{CommandQueue, DatasetHistory, RunReport, RunState, Session, SAMPLE_ROWS};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use pipeline::{apply_instructions, apply_instructions_with, ApplyOptions, ApplyOutcome};

// =============================================================================
// Re-exports - Export
// =============================================================================

pub use export::{export_to_buffer, export_to_path, timestamped_filename};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, CommandView, DatasetView, RunResponse, UploadResponse};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
