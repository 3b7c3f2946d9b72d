//! REST API types for frontend integration.
//!
//! Everything crossing the wire is camelCase; internal models are converted
//! at this boundary and nowhere else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::{Command, Dataset};
use crate::session::{RunReport, RunState};

/// The current dataset as the frontend sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetView {
    /// Name of the uploaded file.
    pub name: String,

    /// Ordered column names.
    pub headers: Vec<String>,

    /// All data rows.
    pub rows: Vec<Value>,

    /// Number of data rows.
    pub row_count: usize,

    /// How many applied steps can be undone.
    pub undoable_steps: usize,
}

impl DatasetView {
    pub fn from_dataset(dataset: &Dataset, undoable_steps: usize) -> Self {
        Self {
            name: dataset.name.clone(),
            headers: dataset.headers.clone(),
            rows: dataset.rows.clone(),
            row_count: dataset.rows.len(),
            undoable_steps,
        }
    }
}

/// One queued command as the frontend sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandView {
    pub id: Uuid,
    pub instruction: String,
    /// "pending" | "processing" | "applied" | "error"
    pub status: String,
    pub created_at: DateTime<Utc>,
    /// Transformation description on success, failure reason on error.
    pub explanation: Option<String>,
}

impl From<&Command> for CommandView {
    fn from(command: &Command) -> Self {
        Self {
            id: command.id,
            instruction: command.instruction.clone(),
            status: command.status.to_string(),
            created_at: command.created_at,
            explanation: command.explanation.clone(),
        }
    }
}

/// Response after a file upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub dataset: DatasetView,
    /// Detected text encoding, when the input was CSV.
    pub encoding: Option<String>,
}

/// Request body for submitting an instruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitCommandRequest {
    pub instruction: String,
}

/// Response after a run over the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    /// "completed" | "interrupted"
    pub status: String,

    /// Commands picked up by the run.
    pub attempted: usize,

    /// Commands that applied.
    pub applied: usize,

    /// Failure message when interrupted.
    pub message: Option<String>,

    pub dataset: DatasetView,
    pub commands: Vec<CommandView>,
}

impl RunResponse {
    pub fn new(report: RunReport, dataset: DatasetView, commands: Vec<CommandView>) -> Self {
        let (status, message) = match report.state {
            RunState::Completed => ("completed".to_string(), None),
            RunState::Interrupted { message } => ("interrupted".to_string(), Some(message)),
        };
        Self {
            status,
            attempted: report.attempted,
            applied: report.applied,
            message,
            dataset,
            commands,
        }
    }
}

/// Response after an undo.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoResponse {
    /// Whether a step was actually undone.
    pub undone: bool,

    /// Id of the command whose step was reverted.
    pub command_id: Option<Uuid>,

    pub dataset: DatasetView,
    pub commands: Vec<CommandView>,
}

/// Create an error response body.
pub fn error_response(error: &str) -> Value {
    json!({ "error": error })
}
