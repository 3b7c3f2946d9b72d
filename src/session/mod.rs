//! Session: a loaded dataset, its command queue and its history.
//!
//! The session owns the full editing state and orchestrates a run: each
//! runnable command is interpreted, executed against the current dataset,
//! and on success pushes a new history snapshot. A failing command stops
//! the run; everything after it stays pending for the next pass.

pub mod history;
pub mod queue;

use serde_json::Value;
use uuid::Uuid;

use crate::engine;
use crate::error::{SessionError, SessionResult};
use crate::interpreter::CommandInterpreter;
use crate::models::{Command, CommandStatus, Dataset};

pub use history::DatasetHistory;
pub use queue::CommandQueue;

/// Rows shown to the interpreter per instruction.
pub const SAMPLE_ROWS: usize = 10;

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    /// Every runnable command applied.
    Completed,
    /// A command failed; later commands were left pending.
    Interrupted { message: String },
}

/// Outcome of one run over the queue.
#[derive(Debug)]
pub struct RunReport {
    /// Commands picked up by this run.
    pub attempted: usize,
    /// Commands that applied successfully.
    pub applied: usize,
    pub state: RunState,
}

/// The full editing state for one loaded dataset.
#[derive(Debug, Default)]
pub struct Session {
    queue: CommandQueue,
    history: DatasetHistory,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a dataset, replacing any previous session state.
    ///
    /// The queue is cleared: old commands were written against the old
    /// data and silently re-running them would be misleading.
    pub fn load_dataset(&mut self, dataset: Dataset) {
        self.queue.clear();
        self.history.seed(dataset);
    }

    /// Drop the dataset and all commands.
    pub fn reset(&mut self) {
        self.queue = CommandQueue::new();
        self.history = DatasetHistory::new();
    }

    /// The current dataset.
    pub fn dataset(&self) -> SessionResult<&Dataset> {
        self.history.current().ok_or(SessionError::NoDataset)
    }

    pub fn has_dataset(&self) -> bool {
        self.history.current().is_some()
    }

    /// Submit a new instruction.
    pub fn enqueue(&mut self, instruction: &str) -> SessionResult<Command> {
        if !self.has_dataset() {
            return Err(SessionError::NoDataset);
        }
        self.queue.enqueue(instruction).map(Clone::clone)
    }

    /// Remove a pending or errored command.
    pub fn remove_command(&mut self, id: Uuid) -> SessionResult<Command> {
        self.queue.remove(id)
    }

    pub fn commands(&self) -> &[Command] {
        self.queue.all()
    }

    pub fn has_runnable(&self) -> bool {
        self.queue.has_runnable()
    }

    /// Undoable steps above the seed snapshot.
    pub fn undoable_steps(&self) -> usize {
        self.history.undoable_steps()
    }

    /// Undo the most recent applied step.
    ///
    /// The producing command reverts to pending so the next run picks it up
    /// again. Undo with nothing applied is a no-op and returns `None`.
    pub fn undo(&mut self) -> SessionResult<Option<Uuid>> {
        let Some(produced_by) = self.history.undo() else {
            return Ok(None);
        };
        if let Some(id) = produced_by {
            self.queue.mark(id, CommandStatus::Pending)?;
            if let Some(command) = self.queue.get_mut(id) {
                command.explanation = None;
            }
        }
        Ok(produced_by)
    }

    /// Run every runnable command, in submission order, against the current
    /// dataset.
    ///
    /// Each command is interpreted with a fresh sample of the current data,
    /// then executed as a whole-dataset pass. Success pushes a history
    /// snapshot; failure marks the command errored and stops the run. A
    /// final sweep guarantees no command is left in `processing`.
    pub async fn run<I: CommandInterpreter>(
        &mut self,
        interpreter: &I,
    ) -> SessionResult<RunReport> {
        if !self.has_dataset() {
            return Err(SessionError::NoDataset);
        }

        let ids = self.queue.runnable_ids();
        let attempted = ids.len();
        let mut applied = 0usize;
        let mut state = RunState::Completed;

        for id in ids {
            self.queue.mark(id, CommandStatus::Processing)?;
            if let Some(command) = self.queue.get_mut(id) {
                command.explanation = None;
            }

            match self.apply_one(interpreter, id).await {
                Ok(description) => {
                    self.queue.mark(id, CommandStatus::Applied)?;
                    if let Some(command) = self.queue.get_mut(id) {
                        command.explanation = Some(description);
                    }
                    applied += 1;
                }
                Err(message) => {
                    self.queue.mark(id, CommandStatus::Error)?;
                    if let Some(command) = self.queue.get_mut(id) {
                        command.explanation = Some(message.clone());
                    }
                    state = RunState::Interrupted { message };
                    break;
                }
            }
        }

        self.sweep_processing();

        Ok(RunReport {
            attempted,
            applied,
            state,
        })
    }

    /// Interpret and execute a single command against the current dataset.
    ///
    /// Returns the transformation description on success, or a message
    /// suitable for the command's explanation on failure.
    async fn apply_one<I: CommandInterpreter>(
        &mut self,
        interpreter: &I,
        id: Uuid,
    ) -> Result<String, String> {
        let (instruction, headers, sample) = {
            let command = self.queue.get(id).ok_or("command disappeared")?;
            let dataset = self.history.current().ok_or("no dataset")?;
            let sample: Vec<Value> = dataset.sample(SAMPLE_ROWS).to_vec();
            (
                command.instruction.clone(),
                dataset.headers.clone(),
                sample,
            )
        };

        let descriptor = interpreter
            .interpret(&instruction, &headers, &sample)
            .await
            .map_err(|e| e.to_string())?;

        let dataset = self.history.current().ok_or("no dataset")?;
        let report = engine::execute(dataset, &descriptor).map_err(|e| e.to_string())?;

        self.history.push(report.dataset, id);
        Ok(descriptor.description)
    }

    /// Any command still marked processing after a run is stranded; move it
    /// to error so the queue never shows a phantom in-flight command.
    fn sweep_processing(&mut self) {
        let stranded: Vec<Uuid> = self
            .queue
            .all()
            .iter()
            .filter(|c| c.status == CommandStatus::Processing)
            .map(|c| c.id)
            .collect();
        for id in stranded {
            if self.queue.mark(id, CommandStatus::Error).is_ok() {
                if let Some(command) = self.queue.get_mut(id) {
                    command.explanation = Some("Run interrupted".to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{InterpreterError, InterpreterResult};
    use crate::models::{TransformationDescriptor, TransformationKind};
    use serde_json::json;
    use std::collections::HashMap;

    /// Maps instruction text to a canned descriptor or failure.
    struct MockInterpreter {
        responses: HashMap<String, Result<TransformationDescriptor, String>>,
    }

    impl MockInterpreter {
        fn new() -> Self {
            Self {
                responses: HashMap::new(),
            }
        }

        fn on_ok(mut self, instruction: &str, logic: Value) -> Self {
            self.responses.insert(
                instruction.to_string(),
                Ok(TransformationDescriptor {
                    kind: TransformationKind::Custom,
                    description: format!("does: {}", instruction),
                    logic,
                }),
            );
            self
        }

        fn on_err(mut self, instruction: &str, message: &str) -> Self {
            self.responses
                .insert(instruction.to_string(), Err(message.to_string()));
            self
        }
    }

    impl CommandInterpreter for MockInterpreter {
        async fn interpret(
            &self,
            instruction: &str,
            _headers: &[String],
            _sample_rows: &[Value],
        ) -> InterpreterResult<TransformationDescriptor> {
            match self.responses.get(instruction) {
                Some(Ok(d)) => Ok(d.clone()),
                Some(Err(m)) => Err(InterpreterError::Api(m.clone())),
                None => Err(InterpreterError::Api("unexpected instruction".into())),
            }
        }
    }

    fn people() -> Dataset {
        Dataset::new(
            "people.csv",
            vec!["name".into(), "age".into()],
            vec![
                json!({"name": " alice ", "age": "30"}),
                json!({"name": "bob", "age": "17"}),
                json!({"name": "carol", "age": "45"}),
            ],
        )
    }

    fn trim_logic() -> Value {
        json!({"steps": [{"type": "update_column", "column": "name",
                          "ops": [{"type": "trim"}]}]})
    }

    fn upper_logic() -> Value {
        json!({"steps": [{"type": "update_column", "column": "name",
                          "ops": [{"type": "uppercase"}]}]})
    }

    #[tokio::test]
    async fn test_run_applies_in_order() {
        let mut session = Session::new();
        session.load_dataset(people());
        session.enqueue("trim names").unwrap();
        session.enqueue("uppercase names").unwrap();

        let interpreter = MockInterpreter::new()
            .on_ok("trim names", trim_logic())
            .on_ok("uppercase names", upper_logic());

        let report = session.run(&interpreter).await.unwrap();
        assert_eq!(report.applied, 2);
        assert_eq!(report.state, RunState::Completed);

        let ds = session.dataset().unwrap();
        assert_eq!(ds.rows[0]["name"], "ALICE");
        // seed + 2 snapshots
        assert_eq!(session.undoable_steps(), 2);
        for cmd in session.commands() {
            assert_eq!(cmd.status, CommandStatus::Applied);
            assert!(cmd.explanation.as_deref().unwrap().starts_with("does:"));
        }
    }

    #[tokio::test]
    async fn test_failure_stops_run_and_leaves_rest_pending() {
        // A valid, B invalid, C valid: A applies, B errors, C stays pending
        let mut session = Session::new();
        session.load_dataset(people());
        session.enqueue("a").unwrap();
        session.enqueue("b").unwrap();
        session.enqueue("c").unwrap();

        let interpreter = MockInterpreter::new()
            .on_ok("a", trim_logic())
            .on_err("b", "could not interpret")
            .on_ok("c", upper_logic());

        let report = session.run(&interpreter).await.unwrap();
        assert_eq!(report.attempted, 3);
        assert_eq!(report.applied, 1);
        assert!(matches!(report.state, RunState::Interrupted { .. }));

        let statuses: Vec<CommandStatus> =
            session.commands().iter().map(|c| c.status).collect();
        assert_eq!(
            statuses,
            vec![
                CommandStatus::Applied,
                CommandStatus::Error,
                CommandStatus::Pending
            ]
        );
        // only A's snapshot landed
        assert_eq!(session.undoable_steps(), 1);
        let errored = &session.commands()[1];
        assert!(errored
            .explanation
            .as_deref()
            .unwrap()
            .contains("could not interpret"));
    }

    #[tokio::test]
    async fn test_rerun_retries_errored() {
        let mut session = Session::new();
        session.load_dataset(people());
        session.enqueue("flaky").unwrap();

        let failing = MockInterpreter::new().on_err("flaky", "timeout");
        session.run(&failing).await.unwrap();
        assert_eq!(session.commands()[0].status, CommandStatus::Error);

        let working = MockInterpreter::new().on_ok("flaky", trim_logic());
        let report = session.run(&working).await.unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(session.commands()[0].status, CommandStatus::Applied);
    }

    #[tokio::test]
    async fn test_undo_reverts_command_to_pending() {
        let mut session = Session::new();
        session.load_dataset(people());
        let id = session.enqueue("trim names").unwrap().id;

        let interpreter = MockInterpreter::new().on_ok("trim names", trim_logic());
        session.run(&interpreter).await.unwrap();
        assert_eq!(session.dataset().unwrap().rows[0]["name"], "alice");

        let undone = session.undo().unwrap();
        assert_eq!(undone, Some(id));
        assert_eq!(session.dataset().unwrap().rows[0]["name"], " alice ");
        assert_eq!(session.commands()[0].status, CommandStatus::Pending);
        assert!(session.commands()[0].explanation.is_none());

        // at the seed now: undo is a no-op
        assert_eq!(session.undo().unwrap(), None);
    }

    #[tokio::test]
    async fn test_executor_failure_surfaces_as_command_error() {
        let mut session = Session::new();
        session.load_dataset(people());
        session.enqueue("drop everyone").unwrap();

        let drop_all = json!({"steps": [{"type": "filter", "when": {
            "type": "equals",
            "left": {"type": "column", "name": "name"},
            "right": {"type": "constant", "value": "nobody"}}}]});
        let interpreter = MockInterpreter::new().on_ok("drop everyone", drop_all);

        let report = session.run(&interpreter).await.unwrap();
        assert_eq!(report.applied, 0);
        assert_eq!(session.commands()[0].status, CommandStatus::Error);
        assert!(session.commands()[0]
            .explanation
            .as_deref()
            .unwrap()
            .contains("empty result"));
        // dataset untouched
        assert_eq!(session.dataset().unwrap().rows.len(), 3);
    }

    #[test]
    fn test_load_dataset_clears_queue() {
        let mut session = Session::new();
        session.load_dataset(people());
        session.enqueue("something").unwrap();
        session.load_dataset(people());
        assert!(session.commands().is_empty());
        assert_eq!(session.undoable_steps(), 0);
    }

    #[test]
    fn test_enqueue_without_dataset() {
        let mut session = Session::new();
        assert!(matches!(
            session.enqueue("x"),
            Err(SessionError::NoDataset)
        ));
    }

    #[test]
    fn test_reset_drops_everything() {
        let mut session = Session::new();
        session.load_dataset(people());
        session.enqueue("x").unwrap();
        session.reset();
        assert!(!session.has_dataset());
        assert!(session.commands().is_empty());
    }
}
