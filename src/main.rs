use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use scanrun::config::AppConfig;
use scanrun::device::SimctlDevices;
use scanrun::notify::notifier_from_config;
use scanrun::orchestrator::build_error::PatternErrorHandler;
use scanrun::orchestrator::types::{RunReport, RunRequest};
use scanrun::orchestrator::{Collaborators, Orchestrator};
use scanrun::presenter::{render_summary, ConsolePresenter};
use scanrun::process::ShellExecutor;
use scanrun::report::JUnitAggregator;
use scanrun::shutdown::{wait_for_shutdown, INTERRUPTED_EXIT_CODE};
use scanrun::viewer::SystemViewer;

const STARTUP_FAILURE_EXIT_CODE: u8 = 2;

#[derive(Parser)]
#[command(
    name = "scanrun",
    about = "Run a test suite and reconcile exit status, errors and the JUnit report"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Shell command that builds and runs the tests
    #[arg(long)]
    command: Option<String>,

    /// JUnit report written by the test command
    #[arg(long)]
    report: Option<PathBuf>,

    /// Directory for reports and collected logs
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Collect simulator system logs after the run
    #[arg(long)]
    include_simulator_logs: bool,

    /// Report to open once the run is done (ignored on CI)
    #[arg(long)]
    open_report: Option<PathBuf>,

    /// Treat this run as a CI run
    #[arg(long, env = "SCANRUN_CI")]
    ci: bool,

    /// Only show the progress indicator, not the raw output
    #[arg(short, long)]
    quiet: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Print the run report as JSON instead of the results table
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(command) = &self.command {
            config.run.command = Some(command.clone());
        }
        if let Some(report) = &self.report {
            config.run.report_path = Some(report.clone());
        }
        if let Some(dir) = &self.output_dir {
            config.run.output_directory = dir.clone();
        }
        if let Some(path) = &self.open_report {
            config.run.open_report_path = Some(path.clone());
        }
        if self.include_simulator_logs {
            config.run.include_simulator_logs = true;
        }
        if self.ci {
            config.run.ci = Some(true);
        }
        if self.quiet {
            config.output.quiet = true;
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn build_orchestrator(config: &AppConfig) -> anyhow::Result<Orchestrator> {
    let request = RunRequest::from_config(config)?;
    let devices = Arc::new(SimctlDevices::new());

    let collaborators = Collaborators {
        executor: Arc::new(ShellExecutor::default()),
        device_preparer: devices.clone(),
        log_collector: devices,
        aggregator: Arc::new(JUnitAggregator::new()),
        error_handler: Arc::new(PatternErrorHandler),
        notifier: notifier_from_config(&config.slack)?,
        viewer: Arc::new(SystemViewer),
        presenter: Arc::new(ConsolePresenter::new(config.output.quiet)),
    };

    Ok(Orchestrator::new(request, collaborators))
}

fn print_report(report: &RunReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", report.to_json()?);
        return Ok(());
    }

    println!("{}", render_summary(report.verdict.as_ref()));
    for message in report.failure_messages() {
        eprintln!("{message}");
    }
    if let Some(error) = &report.notification_error {
        eprintln!("Notification could not be delivered: {error}");
    }
    for failure in &report.cleanup_failures {
        eprintln!("{failure}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let orchestrator = match AppConfig::load(cli.config.as_deref())
        .map(|mut config| {
            cli.apply(&mut config);
            config
        })
        .map_err(anyhow::Error::from)
        .and_then(|config| build_orchestrator(&config))
    {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start test run");
            eprintln!("Error: {e:#}");
            return ExitCode::from(STARTUP_FAILURE_EXIT_CODE);
        }
    };

    tracing::info!(
        command = %orchestrator.request().command.command,
        devices = orchestrator.request().devices.len(),
        ci = orchestrator.request().is_ci,
        "Starting test run"
    );

    let result = tokio::select! {
        result = orchestrator.run() => result,
        interrupt = wait_for_shutdown() => {
            tracing::warn!(signal = ?interrupt, "Test run interrupted, no results reported");
            return ExitCode::from(INTERRUPTED_EXIT_CODE as u8);
        }
    };

    match result {
        Ok(report) => {
            if let Err(e) = print_report(&report, cli.json) {
                tracing::error!(error = %e, "Failed to print run report");
            }
            match report.outcome.error() {
                Some(e) if e.is_user_fatal() => {
                    tracing::error!(error = %e, "Test run failed");
                    ExitCode::FAILURE
                }
                _ => ExitCode::SUCCESS,
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Test run aborted");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
