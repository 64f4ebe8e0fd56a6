pub mod junit;

use std::path::Path;

use serde::Serialize;

use crate::error::Result;

pub use junit::JUnitAggregator;

/// Test totals taken from the report artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub tests_run: u32,
    pub failures: u32,
}

/// Turns raw report bytes into a [`Verdict`].
pub trait ResultAggregator: Send + Sync {
    fn aggregate(&self, raw: &[u8]) -> Result<Verdict>;
}

/// Read the report at `path`. A missing file is `Ok(None)`, not an error.
pub async fn read_report(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Remove a report left behind by an earlier run. A missing file is fine.
pub async fn clear_report(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Removed previous test report");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_missing_report() {
        let tmp = tempfile::tempdir().unwrap();
        let result = read_report(&tmp.path().join("nope.junit")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_read_existing_report() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("report.junit");
        std::fs::write(&path, b"<testsuites/>").unwrap();
        let result = read_report(&path).await.unwrap();
        assert_eq!(result.as_deref(), Some(&b"<testsuites/>"[..]));
    }

    #[tokio::test]
    async fn test_read_directory_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(read_report(tmp.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_clear_report() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("report.junit");
        std::fs::write(&path, b"<testsuites/>").unwrap();

        clear_report(&path).await.unwrap();
        assert!(!path.exists());
        // Already gone
        clear_report(&path).await.unwrap();
    }
}
