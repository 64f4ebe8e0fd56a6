use super::types::{ProcessOutcome, RunOutcome};
use crate::report::Verdict;

pub const NON_ZERO_EXIT: &str = "non-zero exit status";

/// Reconcile the report with the exit status.
///
/// Failing tests in a parsed report win over the exit code. An escalated build
/// error is reported on its own and never decides the outcome.
pub fn decide(verdict: Option<&Verdict>, process: &ProcessOutcome) -> RunOutcome {
    if let Some(verdict) = verdict.filter(|v| v.failures > 0) {
        return RunOutcome::TestsFailed {
            failures: verdict.failures,
        };
    }
    if process.exit_code != 0 {
        return RunOutcome::ExecutionFailed {
            exit_code: process.exit_code,
            reason: NON_ZERO_EXIT.to_string(),
        };
    }
    RunOutcome::Success
}
