use std::path::PathBuf;

use serde::Serialize;

use super::build_error::BuildError;
use super::state::RunState;
use crate::classifier::{rules::build_rules, ClassificationRule};
use crate::config::AppConfig;
use crate::device::Device;
use crate::error::{AppError, Result};
use crate::process::TestCommand;
use crate::report::Verdict;

/// Everything one run needs. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub devices: Vec<Device>,
    pub command: TestCommand,
    pub rules: Vec<ClassificationRule>,
    pub report_path: PathBuf,
    pub log_dir: PathBuf,
    pub collect_simulator_logs: bool,
    pub open_report_path: Option<PathBuf>,
    pub is_ci: bool,
    /// Kill and relaunch the first device before the run.
    pub explicit_open_device: bool,
    /// Trailing output lines kept for build error handling.
    pub error_context_lines: usize,
}

impl RunRequest {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let command = config
            .run
            .command
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AppError::Config("No test command configured (run.command)".to_string()))?;

        let mut test_command = TestCommand::new(command);
        test_command.working_dir = config.run.working_dir.clone();

        Ok(Self {
            devices: config.devices.clone(),
            command: test_command,
            rules: build_rules(&config.rules)?,
            report_path: config.report_path(),
            log_dir: config.output_directory().to_path_buf(),
            collect_simulator_logs: config.run.include_simulator_logs,
            open_report_path: config.run.open_report_path.clone(),
            is_ci: config.is_ci(),
            explicit_open_device: config.explicit_open_device(),
            error_context_lines: config.output.error_context_lines.max(1),
        })
    }
}

/// Error-level output seen while the command ran.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamError {
    /// Lines labelled as errors, in order.
    pub error_lines: Vec<String>,
    /// The most recent output lines, oldest first.
    pub context: Vec<String>,
    /// Whether the tool reported that tests ran.
    pub tests_executed: bool,
}

impl StreamError {
    pub fn text(&self) -> String {
        self.context.join("\n")
    }

    pub fn first_error_line(&self) -> Option<&str> {
        self.error_lines.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessOutcome {
    pub exit_code: i32,
    pub stream_error: Option<StreamError>,
}

/// The single terminal result of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    TestsFailed { failures: u32 },
    ExecutionFailed { exit_code: i32, reason: String },
}

impl RunOutcome {
    /// The error a failed run ends with, `None` on success.
    pub fn error(&self) -> Option<AppError> {
        match self {
            RunOutcome::Success => None,
            RunOutcome::TestsFailed { failures } => Some(AppError::TestFailure {
                failures: *failures,
            }),
            RunOutcome::ExecutionFailed { exit_code, .. } => Some(AppError::ExecutionFailure {
                exit_code: *exit_code,
            }),
        }
    }
}

/// Everything that happened during a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub process: ProcessOutcome,
    pub verdict: Option<Verdict>,
    pub build_error: Option<BuildError>,
    pub notification_error: Option<String>,
    pub cleanup_failures: Vec<String>,
    pub trace: Vec<RunState>,
}

impl RunReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// One message per failure condition that fired. Test failures and a bad
    /// exit status are reported separately.
    pub fn failure_messages(&self) -> Vec<String> {
        let mut messages = Vec::new();
        if let Some(verdict) = self.verdict.filter(|v| v.failures > 0) {
            messages.push(
                AppError::TestFailure {
                    failures: verdict.failures,
                }
                .to_string(),
            );
        }
        if self.process.exit_code != 0 {
            messages.push(
                AppError::ExecutionFailure {
                    exit_code: self.process.exit_code,
                }
                .to_string(),
            );
        }
        if let Some(build_error) = &self.build_error {
            messages.push(AppError::StreamBuild(build_error.to_string()).to_string());
        }
        messages
    }
}
