use serde::Serialize;

use crate::error::{AppError, Result};

/// Phases of a single run, in the order they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    DevicePrepared,
    Running,
    StreamErrorDetected,
    ProcessExited,
    VerdictResolved,
    NotificationSent,
    CleanedUp,
    Done,
}

impl RunState {
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, DevicePrepared)
                | (DevicePrepared, Running)
                | (Running, StreamErrorDetected)
                | (Running, ProcessExited)
                | (StreamErrorDetected, VerdictResolved)
                | (ProcessExited, VerdictResolved)
                | (VerdictResolved, NotificationSent)
                | (NotificationSent, CleanedUp)
                | (CleanedUp, Done)
        )
    }
}

/// Tracks the current state and every state entered so far.
#[derive(Debug)]
pub struct RunStateMachine {
    current: RunState,
    trace: Vec<RunState>,
}

impl RunStateMachine {
    pub fn new() -> Self {
        Self {
            current: RunState::Idle,
            trace: vec![RunState::Idle],
        }
    }

    pub fn advance(&mut self, next: RunState) -> Result<()> {
        if !self.current.can_transition_to(next) {
            return Err(AppError::Internal(format!(
                "Invalid run state transition {:?} -> {next:?}",
                self.current
            )));
        }
        tracing::debug!(from = ?self.current, to = ?next, "Run state transition");
        self.current = next;
        self.trace.push(next);
        Ok(())
    }

    pub fn into_trace(self) -> Vec<RunState> {
        self.trace
    }
}

impl Default for RunStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::RunState::*;
    use super::*;

    #[test]
    fn test_happy_path_trace() {
        let mut machine = RunStateMachine::new();
        for next in [
            DevicePrepared,
            Running,
            ProcessExited,
            VerdictResolved,
            NotificationSent,
            CleanedUp,
            Done,
        ] {
            machine.advance(next).unwrap();
        }
        let trace = machine.into_trace();
        assert_eq!(trace.len(), 8);
        assert_eq!(trace.last(), Some(&Done));
    }

    #[test]
    fn test_stream_error_branch() {
        assert!(Running.can_transition_to(StreamErrorDetected));
        assert!(StreamErrorDetected.can_transition_to(VerdictResolved));
        assert!(!StreamErrorDetected.can_transition_to(ProcessExited));
    }

    #[test]
    fn test_no_state_can_be_skipped() {
        let mut machine = RunStateMachine::new();
        assert!(machine.advance(Running).is_err());
        machine.advance(DevicePrepared).unwrap();
        machine.advance(Running).unwrap();
        machine.advance(ProcessExited).unwrap();
        // Notification needs a resolved verdict first
        assert!(machine.advance(NotificationSent).is_err());
        assert_eq!(machine.into_trace().last(), Some(&ProcessExited));
    }

    #[test]
    fn test_done_is_terminal() {
        for next in [
            Idle,
            DevicePrepared,
            Running,
            StreamErrorDetected,
            ProcessExited,
            VerdictResolved,
            NotificationSent,
            CleanedUp,
            Done,
        ] {
            assert!(!Done.can_transition_to(next));
        }
    }
}
