//! Drives one test run from device preparation to the final outcome.
//!
//! The run always walks the full state sequence in [`state::RunState`]:
//! notification and log collection happen on every path, exactly once, and
//! the outcome is decided only after both the exit status and the report are
//! known.

pub mod build_error;
pub mod decision;
pub mod state;
pub mod types;

use std::collections::VecDeque;
use std::sync::Arc;

use crate::classifier::{self, ERROR, TESTS_EXECUTED};
use crate::device::{DevicePreparer, LogCollector};
use crate::error::{AppError, Result};
use crate::notify::{Notification, Notifier};
use crate::presenter::OutputPresenter;
use crate::process::ProcessExecutor;
use crate::report::{clear_report, read_report, ResultAggregator, Verdict};
use crate::viewer::ReportViewer;

use build_error::{BuildError, BuildErrorHandler};
use state::{RunState, RunStateMachine};
use types::{ProcessOutcome, RunReport, RunRequest, StreamError};

/// Exit code recorded when the test command could not be started at all.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = -1;

/// The external pieces a run talks to.
pub struct Collaborators {
    pub executor: Arc<dyn ProcessExecutor>,
    pub device_preparer: Arc<dyn DevicePreparer>,
    pub log_collector: Arc<dyn LogCollector>,
    pub aggregator: Arc<dyn ResultAggregator>,
    pub error_handler: Arc<dyn BuildErrorHandler>,
    pub notifier: Arc<dyn Notifier>,
    pub viewer: Arc<dyn ReportViewer>,
    pub presenter: Arc<dyn OutputPresenter>,
}

pub struct Orchestrator {
    request: RunRequest,
    collaborators: Collaborators,
}

impl Orchestrator {
    pub fn new(request: RunRequest, collaborators: Collaborators) -> Self {
        Self {
            request,
            collaborators,
        }
    }

    pub fn request(&self) -> &RunRequest {
        &self.request
    }

    /// Run the tests and resolve the outcome.
    ///
    /// Only an internal state machine violation is returned as `Err`; every
    /// failure of the tests or of a collaborator ends up in the [`RunReport`].
    pub async fn run(&self) -> Result<RunReport> {
        let mut machine = RunStateMachine::new();

        self.prepare_device().await;
        machine.advance(RunState::DevicePrepared)?;

        self.clear_previous_report().await;
        machine.advance(RunState::Running)?;
        let process = self.execute().await;

        let build_error = match &process.stream_error {
            Some(stream_error) => {
                machine.advance(RunState::StreamErrorDetected)?;
                self.escalate(stream_error, process.exit_code).await
            }
            None => {
                machine.advance(RunState::ProcessExited)?;
                None
            }
        };

        let verdict = self.resolve_verdict().await;
        machine.advance(RunState::VerdictResolved)?;

        let notification_error = self.notify_summary(verdict.as_ref()).await;
        machine.advance(RunState::NotificationSent)?;

        let cleanup_failures = self.collect_logs().await;
        machine.advance(RunState::CleanedUp)?;

        let outcome = decision::decide(verdict.as_ref(), &process);
        machine.advance(RunState::Done)?;
        tracing::info!(outcome = ?outcome, "Run finished");

        self.open_report().await;

        Ok(RunReport {
            outcome,
            process,
            verdict,
            build_error,
            notification_error,
            cleanup_failures,
            trace: machine.into_trace(),
        })
    }

    async fn prepare_device(&self) {
        if !self.request.explicit_open_device {
            tracing::debug!("Device preparation not requested");
            return;
        }
        // Only the first device is exercised per run
        let Some(device) = self.request.devices.first() else {
            tracing::debug!("No devices configured, skipping preparation");
            return;
        };

        if let Err(e) = self.collaborators.device_preparer.prepare(device).await {
            tracing::warn!(device = %device.name, error = %e, "Failed to prepare device");
        }
    }

    /// A report left at the same path by an earlier run must never be read
    /// as this run's result.
    async fn clear_previous_report(&self) {
        let path = &self.request.report_path;
        if let Err(e) = clear_report(path).await {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove previous test report");
        }
    }

    async fn execute(&self) -> ProcessOutcome {
        let rules = &self.request.rules;
        let presenter = self.collaborators.presenter.as_ref();
        let context_limit = self.request.error_context_lines;

        let mut context: VecDeque<String> = VecDeque::with_capacity(context_limit);
        let mut error_lines: Vec<String> = Vec::new();
        let mut tests_executed = false;

        let result = {
            let mut on_line = |line: crate::process::OutputLine| {
                let labels = classifier::classify(&line.text, rules);
                presenter.on_line(&line, &labels);

                if labels.contains(TESTS_EXECUTED) {
                    tests_executed = true;
                }
                if labels.contains(ERROR) && error_lines.len() < context_limit {
                    error_lines.push(line.text.clone());
                }
                if context.len() == context_limit {
                    context.pop_front();
                }
                context.push_back(line.text);
            };

            self.collaborators
                .executor
                .execute(&self.request.command, &mut on_line)
                .await
        };
        presenter.finish();

        let exit_code = match result {
            Ok(code) => code,
            Err(e) => {
                tracing::error!(error = %e, "Test command could not be run");
                error_lines.push(e.to_string());
                context.push_back(e.to_string());
                SPAWN_FAILURE_EXIT_CODE
            }
        };

        let stream_error = if error_lines.is_empty() {
            None
        } else {
            Some(StreamError {
                error_lines,
                context: context.into_iter().collect(),
                tests_executed,
            })
        };

        ProcessOutcome {
            exit_code,
            stream_error,
        }
    }

    /// Hand the captured error to the build error handler. A genuine build
    /// failure is announced on its own before the run carries on.
    async fn escalate(&self, stream_error: &StreamError, exit_code: i32) -> Option<BuildError> {
        tracing::warn!(
            exit_code,
            first_error = stream_error.first_error_line().unwrap_or_default(),
            "Error output detected"
        );

        let build_error = self.collaborators.error_handler.handle(stream_error).err()?;
        tracing::error!(error = %build_error, exit_code, "Build error");

        let notification = Notification::BuildError {
            message: build_error.to_string(),
        };
        if let Err(e) = self.collaborators.notifier.notify(&notification).await {
            tracing::warn!(error = %e, "Failed to send build error notification");
        }

        Some(build_error)
    }

    /// The parsed report, or `None` if it is missing or unreadable.
    async fn resolve_verdict(&self) -> Option<Verdict> {
        let path = &self.request.report_path;
        let raw = match read_report(path).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::warn!(path = %path.display(), "No test report produced");
                return None;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read test report");
                return None;
            }
        };

        match self.collaborators.aggregator.aggregate(&raw) {
            Ok(verdict) => {
                tracing::info!(
                    tests = verdict.tests_run,
                    failures = verdict.failures,
                    "Parsed test report"
                );
                Some(verdict)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to parse test report");
                None
            }
        }
    }

    async fn notify_summary(&self, verdict: Option<&Verdict>) -> Option<String> {
        let notification = Notification::Summary {
            tests: verdict.map_or(0, |v| v.tests_run),
            failures: verdict.map_or(0, |v| v.failures),
        };

        match self.collaborators.notifier.notify(&notification).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to send run summary");
                Some(e.to_string())
            }
        }
    }

    /// Collect logs for every device concurrently. Returns one message per failure.
    async fn collect_logs(&self) -> Vec<String> {
        if !self.request.collect_simulator_logs || self.request.devices.is_empty() {
            return Vec::new();
        }

        tracing::info!(count = self.request.devices.len(), "Collecting system logs");
        let collector = self.collaborators.log_collector.as_ref();
        let log_dir = self.request.log_dir.as_path();

        let results = futures::future::join_all(self.request.devices.iter().map(|device| async move {
            let identity = device.log_identity();
            let result = collector.collect_logs(device, &identity, log_dir).await;
            result.map_err(|e| (identity, e))
        }))
        .await;

        results
            .into_iter()
            .filter_map(|result| result.err())
            .map(|(identity, e)| {
                tracing::warn!(device = %identity, error = %e, "Failed to collect system logs");
                AppError::Cleanup(format!("{identity}: {e}")).to_string()
            })
            .collect()
    }

    async fn open_report(&self) {
        if self.request.is_ci {
            return;
        }
        let Some(path) = &self.request.open_report_path else {
            return;
        };
        if let Err(e) = self.collaborators.viewer.open(path).await {
            tracing::debug!(path = %path.display(), error = %e, "Could not open report");
        }
    }
}
