use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;

use crate::error::{AppError, Result};

/// Opens a finished report for the local user.
#[async_trait]
pub trait ReportViewer: Send + Sync {
    async fn open(&self, path: &Path) -> Result<()>;
}

/// Uses `open --hide` on macOS and `xdg-open` elsewhere.
pub struct SystemViewer;

#[async_trait]
impl ReportViewer for SystemViewer {
    async fn open(&self, path: &Path) -> Result<()> {
        let mut cmd = if cfg!(target_os = "macos") {
            let mut cmd = tokio::process::Command::new("open");
            cmd.arg("--hide");
            cmd
        } else {
            tokio::process::Command::new("xdg-open")
        };

        let status = cmd
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        if !status.success() {
            return Err(AppError::Internal(format!(
                "Opening {} exited with {status}",
                path.display()
            )));
        }
        Ok(())
    }
}
