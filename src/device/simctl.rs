use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use async_trait::async_trait;

use super::{Device, DevicePreparer, LogCollector};
use crate::error::{AppError, Result};

/// First OS major version whose logs are pulled with `log collect`.
const UNIFIED_LOGGING_MAJOR: u32 = 10;

/// Simulator control through `xcrun simctl`.
pub struct SimctlDevices {
    home_dir: Option<PathBuf>,
}

impl SimctlDevices {
    pub fn new() -> Self {
        Self {
            home_dir: std::env::var_os("HOME").map(PathBuf::from),
        }
    }

    /// Where CoreSimulator writes `system.log` for devices predating unified logging.
    fn legacy_log_path(&self, device: &Device) -> Result<PathBuf> {
        let home = self
            .home_dir
            .as_ref()
            .ok_or_else(|| AppError::Device("HOME is not set".to_string()))?;
        Ok(home
            .join("Library/Logs/CoreSimulator")
            .join(&device.udid)
            .join("system.log"))
    }
}

impl Default for SimctlDevices {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_tool(program: &str, args: &[&str]) -> Result<Output> {
    tracing::debug!(program, args = ?args, "Running device tool");
    tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| AppError::Device(format!("Failed to run {program}: {e}")))
}

fn check(program: &str, output: Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    Err(AppError::Device(format!(
        "{program} exited with {}: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
    )))
}

#[async_trait]
impl DevicePreparer for SimctlDevices {
    async fn prepare(&self, device: &Device) -> Result<()> {
        tracing::info!("Killing all running simulators");
        // Fails when nothing is running, which is fine
        let _ = run_tool("killall", &["Simulator"]).await;

        tracing::info!(device = %device.name, udid = %device.udid, "Launching simulator");
        if let Err(e) = check("xcrun", run_tool("xcrun", &["simctl", "boot", &device.udid]).await?) {
            // Already booted devices refuse a second boot
            tracing::debug!(error = %e, "simctl boot did not succeed");
        }

        let output = run_tool(
            "open",
            &["-a", "Simulator", "--args", "-CurrentDeviceUDID", &device.udid],
        )
        .await?;
        check("open", output)
    }
}

#[async_trait]
impl LogCollector for SimctlDevices {
    async fn collect_logs(&self, device: &Device, identity: &str, output_dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(output_dir).await?;

        match device.os_major_version() {
            Some(major) if major >= UNIFIED_LOGGING_MAJOR => {
                let target = output_dir.join(format!("{identity}.logarchive"));
                if target.exists() {
                    tokio::fs::remove_dir_all(&target).await?;
                }
                let target = target.to_string_lossy().into_owned();
                let output = run_tool(
                    "xcrun",
                    &["simctl", "spawn", &device.udid, "log", "collect", "--output", &target],
                )
                .await?;
                check("xcrun", output)?;
                tracing::info!(device = %device.name, path = %target, "Collected system logs");
            }
            _ => {
                let source = self.legacy_log_path(device)?;
                let target = output_dir.join(format!("{identity}.system.log"));
                tokio::fs::copy(&source, &target).await.map_err(|e| {
                    AppError::Device(format!(
                        "Failed to copy {} for {}: {e}",
                        source.display(),
                        device.name
                    ))
                })?;
                tracing::info!(device = %device.name, path = %target.display(), "Copied system log");
            }
        }

        Ok(())
    }
}
