//! Domain models for the rowlab command pipeline.
//!
//! This module contains the core data structures used throughout the crate:
//!
//! - [`Dataset`] - the in-memory tabular dataset (headers + rows)
//! - [`Command`] - one natural-language instruction with lifecycle status
//! - [`CommandStatus`] - validated status state machine
//! - [`TransformationKind`] - category of a generated transformation
//! - [`TransformationDescriptor`] - the resolved, executable form of an instruction
//! - [`HistoryEntry`] - one dataset snapshot in the undo stack

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::SessionError;

// =============================================================================
// Dataset
// =============================================================================

/// An in-memory tabular dataset.
///
/// `headers` is the ordered, unique column list; each row is a JSON object
/// whose key set is expected to align with `headers`. Headers are recomputed
/// after any transformation that changes row shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Name of the uploaded file.
    pub name: String,
    /// Ordered column names.
    pub headers: Vec<String>,
    /// Data rows, each a JSON object keyed by header name.
    pub rows: Vec<Value>,
}

impl Dataset {
    /// Create a dataset from headers and rows.
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows,
        }
    }

    /// Number of data rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// First `n` rows, used as the interpreter sample.
    pub fn sample(&self, n: usize) -> &[Value] {
        &self.rows[..n.min(self.rows.len())]
    }
}

// =============================================================================
// Command Status
// =============================================================================

/// Lifecycle status of a command.
///
/// Transitions are validated: `pending|error -> processing -> applied|error`,
/// plus `applied -> pending` when the producing step is undone. Anything else
/// is rejected with [`SessionError::IllegalTransition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Pending,
    Processing,
    Applied,
    Error,
}

impl CommandStatus {
    /// Whether a transition from `self` to `to` is legal.
    pub fn can_transition_to(self, to: CommandStatus) -> bool {
        use CommandStatus::{Applied, Error, Pending, Processing};
        matches!(
            (self, to),
            (Pending, Processing)
                | (Error, Processing)
                | (Processing, Applied)
                | (Processing, Error)
                | (Applied, Pending)
        )
    }

    /// Commands in this status may be picked up by a run.
    pub fn is_runnable(self) -> bool {
        matches!(self, CommandStatus::Pending | CommandStatus::Error)
    }
}

impl std::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CommandStatus::Pending => "pending",
            CommandStatus::Processing => "processing",
            CommandStatus::Applied => "applied",
            CommandStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// Command
// =============================================================================

/// One natural-language edit instruction submitted by the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    /// Unique identifier.
    pub id: Uuid,
    /// The instruction text as entered.
    pub instruction: String,
    /// Current lifecycle status.
    pub status: CommandStatus,
    /// Submission timestamp.
    pub created_at: DateTime<Utc>,
    /// Human-readable outcome: the transformation description on success,
    /// the failure reason on error.
    pub explanation: Option<String>,
}

impl Command {
    /// Create a fresh pending command.
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            instruction: instruction.into(),
            status: CommandStatus::Pending,
            created_at: Utc::now(),
            explanation: None,
        }
    }

    /// Transition to a new status, validating legality.
    pub fn transition(&mut self, to: CommandStatus) -> Result<(), SessionError> {
        if !self.status.can_transition_to(to) {
            return Err(SessionError::IllegalTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }
}

// =============================================================================
// Transformation Descriptor
// =============================================================================

/// Category of a generated transformation.
///
/// Unknown categories returned by the interpreter fold into `Custom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationKind {
    #[serde(alias = "RENAME_COLUMN")]
    Rename,
    #[serde(alias = "MAP_VALUES")]
    MapValues,
    #[serde(alias = "FILTER")]
    Filter,
    #[serde(alias = "EXTRACT")]
    Extract,
    #[serde(alias = "FORMAT")]
    Format,
    #[serde(other)]
    Custom,
}

/// The resolved, executable form of an instruction.
///
/// Produced once per command execution by the interpreter; `logic` is the
/// JSON source of a row program (see [`crate::engine::RowProgram`]) and is
/// compiled exactly once per application, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationDescriptor {
    /// Transformation category.
    #[serde(rename = "type")]
    pub kind: TransformationKind,
    /// Human-readable explanation of what the routine does.
    pub description: String,
    /// Row program source (JSON).
    pub logic: Value,
}

// =============================================================================
// History Entry
// =============================================================================

/// One snapshot in the dataset history (undo stack).
///
/// History exclusively owns its snapshots; callers receive clones, never
/// aliases into the stack.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// The dataset as it stood after the producing step.
    pub dataset: Dataset,
    /// Id of the command that produced this snapshot; `None` for the
    /// as-uploaded seed entry.
    pub produced_by: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_legal_transitions() {
        let mut cmd = Command::new("trim all names");
        assert!(cmd.transition(CommandStatus::Processing).is_ok());
        assert!(cmd.transition(CommandStatus::Applied).is_ok());
        assert!(cmd.transition(CommandStatus::Pending).is_ok()); // undo
        assert!(cmd.transition(CommandStatus::Processing).is_ok());
        assert!(cmd.transition(CommandStatus::Error).is_ok());
        assert!(cmd.transition(CommandStatus::Processing).is_ok()); // retry
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut cmd = Command::new("whatever");
        // pending -> applied skips processing
        let err = cmd.transition(CommandStatus::Applied).unwrap_err();
        assert!(err.to_string().contains("pending"));
        assert_eq!(cmd.status, CommandStatus::Pending);

        cmd.transition(CommandStatus::Processing).unwrap();
        cmd.transition(CommandStatus::Applied).unwrap();
        // applied -> processing is not a thing; applied commands re-run only after undo
        assert!(cmd.transition(CommandStatus::Processing).is_err());
    }

    #[test]
    fn test_sample_is_capped() {
        let rows: Vec<Value> = (0..25).map(|i| json!({ "n": i })).collect();
        let ds = Dataset::new("t.csv", vec!["n".into()], rows);
        assert_eq!(ds.sample(10).len(), 10);
        assert_eq!(ds.sample(100).len(), 25);
    }

    #[test]
    fn test_kind_aliases() {
        let k: TransformationKind = serde_json::from_str("\"RENAME_COLUMN\"").unwrap();
        assert_eq!(k, TransformationKind::Rename);
        let k: TransformationKind = serde_json::from_str("\"filter\"").unwrap();
        assert_eq!(k, TransformationKind::Filter);
        // unknown kinds fold to custom
        let k: TransformationKind = serde_json::from_str("\"something_else\"").unwrap();
        assert_eq!(k, TransformationKind::Custom);
    }

    #[test]
    fn test_descriptor_roundtrip() {
        let d = TransformationDescriptor {
            kind: TransformationKind::Filter,
            description: "Keep rows with a non-empty email".into(),
            logic: json!({ "steps": [] }),
        };
        let s = serde_json::to_string(&d).unwrap();
        assert!(s.contains("\"type\":\"filter\""));
        let back: TransformationDescriptor = serde_json::from_str(&s).unwrap();
        assert_eq!(back.kind, TransformationKind::Filter);
    }
}
