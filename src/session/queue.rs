//! Command queue.
//!
//! An ordered list of submitted instructions with lifecycle status. Order is
//! submission order and never changes; a run walks runnable commands in that
//! order.

use uuid::Uuid;

use crate::error::{SessionError, SessionResult};
use crate::models::{Command, CommandStatus};

/// The ordered command queue.
#[derive(Debug, Default)]
pub struct CommandQueue {
    commands: Vec<Command>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new pending command for `instruction`.
    ///
    /// Whitespace-only instructions are rejected.
    pub fn enqueue(&mut self, instruction: &str) -> SessionResult<&Command> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(SessionError::EmptyInstruction);
        }
        self.commands.push(Command::new(instruction));
        Ok(&self.commands[self.commands.len() - 1])
    }

    /// Remove a command by id.
    ///
    /// Only pending and errored commands may be removed; applied commands are
    /// part of the history and processing ones are owned by the running pass.
    pub fn remove(&mut self, id: Uuid) -> SessionResult<Command> {
        let pos = self
            .commands
            .iter()
            .position(|c| c.id == id)
            .ok_or(SessionError::CommandNotFound(id))?;

        let status = self.commands[pos].status;
        if !status.is_runnable() {
            return Err(SessionError::IllegalRemoval {
                status: status.to_string(),
            });
        }
        Ok(self.commands.remove(pos))
    }

    pub fn get(&self, id: Uuid) -> Option<&Command> {
        self.commands.iter().find(|c| c.id == id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut Command> {
        self.commands.iter_mut().find(|c| c.id == id)
    }

    /// All commands in submission order.
    pub fn all(&self) -> &[Command] {
        &self.commands
    }

    /// Ids of commands a run would pick up, in submission order.
    pub fn runnable_ids(&self) -> Vec<Uuid> {
        self.commands
            .iter()
            .filter(|c| c.status.is_runnable())
            .map(|c| c.id)
            .collect()
    }

    pub fn has_runnable(&self) -> bool {
        self.commands.iter().any(|c| c.status.is_runnable())
    }

    /// Transition a command's status, validating legality.
    pub fn mark(&mut self, id: Uuid, to: CommandStatus) -> SessionResult<()> {
        let command = self
            .commands
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(SessionError::CommandNotFound(id))?;
        command.transition(to)
    }

    /// Drop every command. Used when a new dataset replaces the session.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_preserves_order() {
        let mut q = CommandQueue::new();
        q.enqueue("first").unwrap();
        q.enqueue("second").unwrap();
        q.enqueue("third").unwrap();
        let texts: Vec<&str> = q.all().iter().map(|c| c.instruction.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_enqueue_returns_the_new_command() {
        let mut q = CommandQueue::new();
        q.enqueue("first").unwrap();
        let returned = q.enqueue("  second  ").unwrap();
        assert_eq!(returned.instruction, "second");
        assert_eq!(returned.status, CommandStatus::Pending);
        let returned_id = returned.id;
        assert_eq!(q.all().last().map(|c| c.id), Some(returned_id));
    }

    #[test]
    fn test_empty_instruction_rejected() {
        let mut q = CommandQueue::new();
        assert!(matches!(
            q.enqueue("   "),
            Err(SessionError::EmptyInstruction)
        ));
        assert!(q.is_empty());
    }

    #[test]
    fn test_remove_only_runnable() {
        let mut q = CommandQueue::new();
        let id = q.enqueue("drop column x").unwrap().id;
        q.mark(id, CommandStatus::Processing).unwrap();
        assert!(matches!(
            q.remove(id),
            Err(SessionError::IllegalRemoval { .. })
        ));

        q.mark(id, CommandStatus::Error).unwrap();
        assert!(q.remove(id).is_ok());
        assert!(q.is_empty());
    }

    #[test]
    fn test_runnable_ids_skip_applied() {
        let mut q = CommandQueue::new();
        let a = q.enqueue("a").unwrap().id;
        let b = q.enqueue("b").unwrap().id;
        let c = q.enqueue("c").unwrap().id;

        q.mark(a, CommandStatus::Processing).unwrap();
        q.mark(a, CommandStatus::Applied).unwrap();
        q.mark(b, CommandStatus::Processing).unwrap();
        q.mark(b, CommandStatus::Error).unwrap();

        // errored commands are retried, applied ones are not
        assert_eq!(q.runnable_ids(), vec![b, c]);
    }

    #[test]
    fn test_mark_unknown_id() {
        let mut q = CommandQueue::new();
        let err = q.mark(Uuid::new_v4(), CommandStatus::Processing).unwrap_err();
        assert!(matches!(err, SessionError::CommandNotFound(_)));
    }
}
