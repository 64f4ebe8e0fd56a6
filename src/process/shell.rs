use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use super::{normalize_exit, OutputLine, OutputStream, ProcessExecutor, TestCommand};
use crate::error::{AppError, Result};

/// Runs the test command through `sh -c`, streaming stdout and stderr.
pub struct ShellExecutor {
    channel_capacity: usize,
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self {
            channel_capacity: 100,
        }
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Read `reader` line by line and forward each line to `tx`.
///
/// Non-UTF-8 bytes are decoded lossily so a garbled line never ends the stream.
async fn forward_lines<R>(reader: R, stream: OutputStream, tx: mpsc::Sender<OutputLine>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                while matches!(buf.last(), Some(b'\n' | b'\r')) {
                    buf.pop();
                }
                let line = OutputLine {
                    stream,
                    text: String::from_utf8_lossy(&buf).into_owned(),
                };
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(stream = ?stream, error = %e, "Failed to read process output");
                break;
            }
        }
    }
}

#[async_trait]
impl ProcessExecutor for ShellExecutor {
    async fn execute(
        &self,
        command: &TestCommand,
        on_line: &mut (dyn FnMut(OutputLine) + Send),
    ) -> Result<i32> {
        if command.command.trim().is_empty() {
            return Err(AppError::Process("Empty command".to_string()));
        }

        tracing::info!(command = %command.command, "Running test command");

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&command.command)
            .envs(&command.envs)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| AppError::Process(format!("Failed to spawn test command: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Process("Failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::Process("Failed to capture stderr".to_string()))?;

        let (tx, mut rx) = mpsc::channel(self.channel_capacity);
        let stdout_task = tokio::spawn(forward_lines(stdout, OutputStream::Stdout, tx.clone()));
        let stderr_task = tokio::spawn(forward_lines(stderr, OutputStream::Stderr, tx));

        // Closes once both readers hit EOF and drop their senders
        while let Some(line) = rx.recv().await {
            on_line(line);
        }

        let _ = stdout_task.await;
        let _ = stderr_task.await;

        let status = child
            .wait()
            .await
            .map_err(|e| AppError::Process(format!("Failed to wait on test command: {e}")))?;
        let code = normalize_exit(status);

        tracing::debug!(exit_code = code, "Test command exited");
        Ok(code)
    }
}
