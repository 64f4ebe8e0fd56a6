use std::collections::BTreeSet;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::classifier::PROGRESS;
use crate::process::OutputLine;
use crate::report::Verdict;

/// Receives every classified output line while the test command runs.
pub trait OutputPresenter: Send + Sync {
    fn on_line(&self, line: &OutputLine, labels: &BTreeSet<String>);
    fn finish(&self);
}

/// Echoes output to the terminal under a "Loading..." spinner.
pub struct ConsolePresenter {
    spinner: ProgressBar,
    quiet: bool,
}

impl ConsolePresenter {
    pub fn new(quiet: bool) -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message("Loading...");
        spinner.enable_steady_tick(Duration::from_millis(120));
        Self { spinner, quiet }
    }
}

impl OutputPresenter for ConsolePresenter {
    fn on_line(&self, line: &OutputLine, labels: &BTreeSet<String>) {
        if labels.contains(PROGRESS) {
            self.spinner
                .set_message(format!("Running Tests: {}", truncate(&line.text, 80)));
        }
        if !self.quiet {
            self.spinner.println(&line.text);
        }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

/// Discards everything.
pub struct NullPresenter;

impl OutputPresenter for NullPresenter {
    fn on_line(&self, _line: &OutputLine, _labels: &BTreeSet<String>) {}
    fn finish(&self) {}
}

fn truncate(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(max_chars).collect();
    out.push('…');
    out
}

/// The "Test Results" table printed after a run.
pub fn render_summary(verdict: Option<&Verdict>) -> String {
    let (tests, failures) = match verdict {
        Some(v) => (v.tests_run.to_string(), v.failures.to_string()),
        None => ("unknown".to_string(), "unknown".to_string()),
    };
    let rows = [("Number of tests", tests), ("Number of failures", failures)];

    let key_width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    let value_width = rows.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
    let inner = key_width + value_width + 5;
    let border = format!("+{}+", "-".repeat(inner));

    let mut out = String::new();
    out.push_str(&border);
    out.push('\n');
    out.push_str(&format!("|{:^inner$}|\n", "Test Results"));
    out.push_str(&border);
    out.push('\n');
    for (key, value) in &rows {
        out.push_str(&format!(
            "| {key:<key_width$} | {value:<value_width$} |\n"
        ));
    }
    out.push_str(&border);
    out
}
