use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::classifier::RuleConfig;
use crate::device::Device;
use crate::error::{AppError, Result};

/// Environment variable that opts in to killing and relaunching the simulator
/// before the run.
pub const EXPLICIT_OPEN_DEVICE_ENV: &str = "SCANRUN_EXPLICIT_OPEN_SIMULATOR";

/// Variables set by the CI services we know about.
const CI_ENV_VARS: &[&str] = &[
    "CI",
    "JENKINS_URL",
    "JENKINS_HOME",
    "TRAVIS",
    "CIRCLECI",
    "GITLAB_CI",
    "GITHUB_ACTIONS",
    "BUILDKITE",
    "TF_BUILD",
    "TEAMCITY_VERSION",
    "BITRISE_IO",
];

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RunConfig {
    /// Shell command that builds and runs the tests.
    pub command: Option<String>,
    /// Directory the command runs in. Defaults to the current directory.
    pub working_dir: Option<PathBuf>,
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,
    /// JUnit report written by the test tool. Defaults to `<output_directory>/report.junit`.
    pub report_path: Option<PathBuf>,
    #[serde(default)]
    pub include_simulator_logs: bool,
    /// Report to open locally once the run is done (ignored on CI).
    pub open_report_path: Option<PathBuf>,
    /// Force CI mode on or off instead of sniffing the environment.
    pub ci: Option<bool>,
    #[serde(default)]
    pub explicit_open_device: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            command: None,
            working_dir: None,
            output_directory: default_output_directory(),
            report_path: None,
            include_simulator_logs: false,
            open_report_path: None,
            ci: None,
            explicit_open_device: false,
        }
    }
}

#[derive(Deserialize, Clone)]
pub struct SlackConfig {
    pub url: Option<String>,
    pub channel: Option<String>,
    #[serde(default)]
    pub only_on_failure: bool,
    #[serde(default)]
    pub skip: bool,
    /// Upper bound for one webhook request.
    #[serde(default = "default_slack_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            url: None,
            channel: None,
            only_on_failure: false,
            skip: false,
            timeout_secs: default_slack_timeout_secs(),
        }
    }
}

// Manual Debug impl to avoid leaking the webhook URL
impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("url", &self.url.as_ref().map(|_| "[REDACTED]"))
            .field("channel", &self.channel)
            .field("only_on_failure", &self.only_on_failure)
            .field("skip", &self.skip)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default)]
    pub quiet: bool,
    /// Number of trailing output lines kept as context for build error handling.
    #[serde(default = "default_error_context_lines")]
    pub error_context_lines: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            quiet: false,
            error_context_lines: default_error_context_lines(),
        }
    }
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("test_output")
}

fn default_slack_timeout_secs() -> u64 {
    30
}

fn default_error_context_lines() -> usize {
    200
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("scanrun").required(false));
        }

        // Environment variable overrides, e.g. SCANRUN__RUN__COMMAND
        builder = builder.add_source(
            config::Environment::with_prefix("SCANRUN")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))
    }

    pub fn report_path(&self) -> PathBuf {
        self.run
            .report_path
            .clone()
            .unwrap_or_else(|| self.run.output_directory.join("report.junit"))
    }

    pub fn output_directory(&self) -> &Path {
        &self.run.output_directory
    }

    pub fn is_ci(&self) -> bool {
        self.run
            .ci
            .unwrap_or_else(|| detect_ci(|key| std::env::var(key).ok()))
    }

    pub fn explicit_open_device(&self) -> bool {
        self.run.explicit_open_device
            || std::env::var(EXPLICIT_OPEN_DEVICE_ENV)
                .map(|v| is_truthy(&v))
                .unwrap_or(false)
    }
}

/// Whether any known CI variable is set to a truthy value.
pub fn detect_ci<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    CI_ENV_VARS
        .iter()
        .any(|key| lookup(key).map(|v| is_truthy(&v)).unwrap_or(false))
}

pub fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty()
        && !matches!(
            value.to_ascii_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_truthy_values() {
        assert!(is_truthy("1"));
        assert!(is_truthy("true"));
        assert!(is_truthy("YES"));
        assert!(!is_truthy(""));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("False"));
        assert!(!is_truthy(" off "));
    }

    #[test]
    fn test_detect_ci_from_any_known_var() {
        let env: HashMap<&str, &str> = [("GITLAB_CI", "true")].into_iter().collect();
        assert!(detect_ci(|k| env.get(k).map(|v| v.to_string())));

        let env: HashMap<&str, &str> = [("CI", "false")].into_iter().collect();
        assert!(!detect_ci(|k| env.get(k).map(|v| v.to_string())));

        assert!(!detect_ci(|_| None));
    }

    #[test]
    fn test_default_report_path_under_output_directory() {
        let config = AppConfig::default();
        assert_eq!(
            config.report_path(),
            PathBuf::from("test_output").join("report.junit")
        );
    }

    #[test]
    fn test_forced_ci_flag_wins() {
        let mut config = AppConfig::default();
        config.run.ci = Some(true);
        assert!(config.is_ci());
        config.run.ci = Some(false);
        assert!(!config.is_ci());
    }

    #[test]
    fn test_load_from_toml_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("scanrun.toml");
        std::fs::write(
            &path,
            r#"
[run]
command = "xcodebuild test -scheme App"
include_simulator_logs = true
report_path = "out/report.junit"

[[devices]]
name = "iPhone 15"
os_type = "iOS"
os_version = "17.2"
udid = "ABCD-1234"

[[rules]]
label = "error"
contains = "fatal:"

[slack]
url = "https://hooks.slack.com/services/T/B/X"
only_on_failure = true
"#,
        )
        .unwrap();

        let config = AppConfig::load(path.to_str()).unwrap();
        assert_eq!(
            config.run.command.as_deref(),
            Some("xcodebuild test -scheme App")
        );
        assert!(config.run.include_simulator_logs);
        assert_eq!(config.report_path(), PathBuf::from("out/report.junit"));
        assert_eq!(config.devices.len(), 1);
        assert_eq!(config.devices[0].name, "iPhone 15");
        assert_eq!(config.rules.len(), 1);
        assert!(config.slack.only_on_failure);
        assert_eq!(config.slack.timeout_secs, 30);
        assert_eq!(config.output.error_context_lines, 200);
    }

    #[test]
    fn test_slack_debug_redacts_url() {
        let slack = SlackConfig {
            url: Some("https://hooks.slack.com/services/secret".to_string()),
            ..Default::default()
        };
        let rendered = format!("{slack:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
