pub mod simctl;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use simctl::SimctlDevices;

/// A target execution environment, usually a simulator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    pub os_type: String,
    pub os_version: String,
    pub udid: String,
}

impl Device {
    /// Name used for this device's collected log files.
    pub fn log_identity(&self) -> String {
        format!("{}_{}_{}", self.name, self.os_type, self.os_version)
    }

    /// Major component of `os_version`, if it parses.
    pub fn os_major_version(&self) -> Option<u32> {
        self.os_version.split('.').next()?.trim().parse().ok()
    }
}

#[async_trait]
pub trait DevicePreparer: Send + Sync {
    /// Kill any running instance and launch a clean one for `device`.
    async fn prepare(&self, device: &Device) -> Result<()>;
}

#[async_trait]
pub trait LogCollector: Send + Sync {
    /// Persist `device`'s system logs under `output_dir`, named after `identity`.
    async fn collect_logs(&self, device: &Device, identity: &str, output_dir: &Path) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(version: &str) -> Device {
        Device {
            name: "iPhone 15".to_string(),
            os_type: "iOS".to_string(),
            os_version: version.to_string(),
            udid: "UDID-1".to_string(),
        }
    }

    #[test]
    fn test_log_identity() {
        assert_eq!(device("17.2").log_identity(), "iPhone 15_iOS_17.2");
    }

    #[test]
    fn test_os_major_version() {
        assert_eq!(device("17.2").os_major_version(), Some(17));
        assert_eq!(device("9").os_major_version(), Some(9));
        assert_eq!(device("beta").os_major_version(), None);
        assert_eq!(device("").os_major_version(), None);
    }
}
