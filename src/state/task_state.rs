/// Task state definitions for the persistent request queue
///
/// This module defines every state a queued task can be in across runs.
use std::fmt;

/// Represents the current state of a task in the request queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    // ===== Active States =====
    /// Task is waiting to be picked up
    Pending,

    /// Task has been handed to a worker
    InProgress,

    // ===== Terminal States =====
    /// Task finished, with or without a record
    Handled,

    /// Task failed on every allowed attempt
    Failed,
}

impl TaskState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Handled | Self::Failed)
    }

    /// Returns true if this is an active state (task may still be processed)
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Converts the task state to a database string representation
    ///
    /// This is used for storing the state in the SQLite database.
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Handled => "handled",
            Self::Failed => "failed",
        }
    }

    /// Parses a task state from a database string representation
    ///
    /// Returns None if the string doesn't match any known state.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "handled" => Some(Self::Handled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible task states
    pub fn all_states() -> Vec<Self> {
        vec![Self::Pending, Self::InProgress, Self::Handled, Self::Failed]
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::InProgress.is_terminal());

        assert!(TaskState::Handled.is_terminal());
        assert!(TaskState::Failed.is_terminal());
    }

    #[test]
    fn test_is_active() {
        assert!(TaskState::Pending.is_active());
        assert!(TaskState::InProgress.is_active());
        assert!(!TaskState::Handled.is_active());
    }

    #[test]
    fn test_from_db_string() {
        assert_eq!(TaskState::from_db_string("pending"), Some(TaskState::Pending));
        assert_eq!(
            TaskState::from_db_string("in_progress"),
            Some(TaskState::InProgress)
        );
        assert_eq!(TaskState::from_db_string("invalid"), None);
    }

    #[test]
    fn test_roundtrip_db_string() {
        for state in TaskState::all_states() {
            let db_str = state.to_db_string();
            let parsed = TaskState::from_db_string(db_str);
            assert_eq!(Some(state), parsed, "Failed roundtrip for {:?}", state);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", TaskState::InProgress), "in_progress");
        assert_eq!(format!("{}", TaskState::Handled), "handled");
    }
}
