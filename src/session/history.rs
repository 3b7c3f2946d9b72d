//! Dataset history (undo stack).
//!
//! A stack of dataset snapshots. The bottom entry is the dataset as
//! uploaded; every applied command pushes one entry on top. Undo pops the
//! top entry but never the seed.

use uuid::Uuid;

use crate::models::{Dataset, HistoryEntry};

/// The dataset undo stack.
#[derive(Debug, Default)]
pub struct DatasetHistory {
    entries: Vec<HistoryEntry>,
}

impl DatasetHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole stack with a fresh seed snapshot.
    pub fn seed(&mut self, dataset: Dataset) {
        self.entries = vec![HistoryEntry {
            dataset,
            produced_by: None,
        }];
    }

    /// Push a snapshot produced by `command_id`.
    pub fn push(&mut self, dataset: Dataset, produced_by: Uuid) {
        self.entries.push(HistoryEntry {
            dataset,
            produced_by: Some(produced_by),
        });
    }

    /// The current (topmost) dataset, if any has been seeded.
    pub fn current(&self) -> Option<&Dataset> {
        self.entries.last().map(|e| &e.dataset)
    }

    /// Pop the topmost snapshot, returning the id of the command that
    /// produced it.
    ///
    /// Returns `None` when there is nothing to undo: the stack holds only
    /// the seed (or nothing at all). Undo at the seed is a silent no-op.
    pub fn undo(&mut self) -> Option<Option<Uuid>> {
        if self.entries.len() <= 1 {
            return None;
        }
        self.entries.pop().map(|e| e.produced_by)
    }

    /// Number of snapshots, the seed included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of undoable steps (snapshots above the seed).
    pub fn undoable_steps(&self) -> usize {
        self.entries.len().saturating_sub(1)
    }
}
