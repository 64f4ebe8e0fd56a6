pub mod shell;

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;

pub use shell::ShellExecutor;

/// The fully built test tool invocation.
#[derive(Debug, Clone)]
pub struct TestCommand {
    /// Passed verbatim to `sh -c`.
    pub command: String,
    pub working_dir: Option<PathBuf>,
    pub envs: HashMap<String, String>,
}

impl TestCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            working_dir: None,
            envs: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One complete line of child output, without its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    /// Run `command` to completion and return its exit code.
    ///
    /// `on_line` is called for every output line before this returns. Lines are
    /// never split. Order is kept within stdout and within stderr, but the
    /// interleaving between the two streams is not guaranteed.
    async fn execute(
        &self,
        command: &TestCommand,
        on_line: &mut (dyn FnMut(OutputLine) + Send),
    ) -> Result<i32>;
}

/// Map an exit status to a single code; signals become `128 + signal`.
pub fn normalize_exit(status: std::process::ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(code) = status.code() {
            code
        } else if let Some(sig) = status.signal() {
            128 + sig
        } else {
            1
        }
    }
    #[cfg(not(unix))]
    {
        status.code().unwrap_or(1)
    }
}
