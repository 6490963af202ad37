//! Run state machine and progress payloads.
//!
//! ```text
//! SUBMITTED -> PREPARING -> CLEANING -> PERSISTING -> ANALYZING -> FORMATTING -> COMPLETE
//!     \____________\____________\____________\____________\____________\--> FAILED
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::common::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Submitted,
    Preparing,
    Cleaning,
    Persisting,
    Analyzing,
    Formatting,
    Complete,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Submitted => "SUBMITTED",
            PipelineState::Preparing => "PREPARING",
            PipelineState::Cleaning => "CLEANING",
            PipelineState::Persisting => "PERSISTING",
            PipelineState::Analyzing => "ANALYZING",
            PipelineState::Formatting => "FORMATTING",
            PipelineState::Complete => "COMPLETE",
            PipelineState::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Complete | PipelineState::Failed)
    }

    /// The forward successor on the success path.
    pub fn next(&self) -> Option<PipelineState> {
        match self {
            PipelineState::Submitted => Some(PipelineState::Preparing),
            PipelineState::Preparing => Some(PipelineState::Cleaning),
            PipelineState::Cleaning => Some(PipelineState::Persisting),
            PipelineState::Persisting => Some(PipelineState::Analyzing),
            PipelineState::Analyzing => Some(PipelineState::Formatting),
            PipelineState::Formatting => Some(PipelineState::Complete),
            PipelineState::Complete | PipelineState::Failed => None,
        }
    }

    pub fn can_transition_to(&self, to: PipelineState) -> bool {
        !self.is_terminal() && (to == PipelineState::Failed || self.next() == Some(to))
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress payload pushed to the queue's status channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    pub state: String,
    pub current: u32,
    pub total: u32,
    pub status: String,
    pub subtasks: Vec<String>,
}

/// Transient state of one pipeline run. Lives only as long as the run.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskState {
    pub stage: PipelineState,
    pub current: u32,
    pub total: u32,
    pub status_message: String,
    pub subtask_ids: Vec<String>,
}

impl Default for TaskState {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskState {
    pub fn new() -> Self {
        Self {
            stage: PipelineState::Submitted,
            current: 0,
            total: 0,
            status_message: String::new(),
            subtask_ids: Vec::new(),
        }
    }

    pub fn transition(&mut self, to: PipelineState) -> Result<(), PipelineError> {
        if !self.stage.can_transition_to(to) {
            return Err(PipelineError::IllegalTransition {
                from: self.stage.to_string(),
                to: to.to_string(),
            });
        }
        self.stage = to;
        Ok(())
    }

    pub fn set_progress(&mut self, current: u32, total: u32, status: impl Into<String>) {
        self.current = current;
        self.total = total;
        self.status_message = status.into();
    }

    pub fn payload(&self) -> ProgressState {
        ProgressState {
            state: self.stage.to_string(),
            current: self.current,
            total: self.total,
            status: self.status_message.clone(),
            subtasks: self.subtask_ids.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_path_walks_every_state() {
        let mut state = TaskState::new();
        let mut visited = vec![state.stage];
        while let Some(next) = state.stage.next() {
            state.transition(next).unwrap();
            visited.push(next);
        }
        assert_eq!(visited.len(), 7);
        assert_eq!(state.stage, PipelineState::Complete);
    }

    #[test]
    fn test_failed_reachable_from_non_terminal_only() {
        let mut state = TaskState::new();
        state.transition(PipelineState::Preparing).unwrap();
        state.transition(PipelineState::Failed).unwrap();
        assert!(state.transition(PipelineState::Cleaning).is_err());
        assert!(state.transition(PipelineState::Failed).is_err());
    }

    #[test]
    fn test_no_skipping_states() {
        let mut state = TaskState::new();
        let err = state.transition(PipelineState::Analyzing).unwrap_err();
        assert!(matches!(err, PipelineError::IllegalTransition { .. }));
    }

    #[test]
    fn test_payload_shape() {
        let mut state = TaskState::new();
        state.transition(PipelineState::Preparing).unwrap();
        state.transition(PipelineState::Cleaning).unwrap();
        state.set_progress(1, 10, "Cleaning data");
        state.subtask_ids.push("job-1".into());

        let json = serde_json::to_value(state.payload()).unwrap();
        assert_eq!(json["state"], "CLEANING");
        assert_eq!(json["current"], 1);
        assert_eq!(json["total"], 10);
        assert_eq!(json["subtasks"][0], "job-1");
    }
}
