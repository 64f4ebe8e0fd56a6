use regex::Regex;

use super::{ResultAggregator, Verdict};
use crate::error::{AppError, Result};

/// Reads totals from a JUnit XML report.
///
/// The root `<testsuites>` element's counters win. Reports without one are
/// summed over their `<testsuite>` elements. JUnit `errors` count as failures.
pub struct JUnitAggregator {
    suites_root: Regex,
    suite: Regex,
    attribute: Regex,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    tests: Option<u32>,
    failures: u32,
    errors: u32,
}

impl JUnitAggregator {
    pub fn new() -> Self {
        Self {
            suites_root: Regex::new(r"<testsuites\b([^<>]*)>").expect("literal regex"),
            suite: Regex::new(r"<testsuite\b([^<>]*)>").expect("literal regex"),
            attribute: Regex::new(r#"\b(tests|failures|errors)\s*=\s*["'](\d+)["']"#)
                .expect("literal regex"),
        }
    }

    fn counters(&self, attrs: &str) -> Counters {
        let mut counters = Counters::default();
        for cap in self.attribute.captures_iter(attrs) {
            let Ok(value) = cap[2].parse::<u32>() else {
                continue;
            };
            match &cap[1] {
                "tests" => counters.tests = Some(value),
                "failures" => counters.failures = value,
                "errors" => counters.errors = value,
                _ => {}
            }
        }
        counters
    }
}

impl Default for JUnitAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultAggregator for JUnitAggregator {
    fn aggregate(&self, raw: &[u8]) -> Result<Verdict> {
        let text = String::from_utf8_lossy(raw);

        let roots: Vec<_> = self.suites_root.captures_iter(&text).collect();
        if roots.len() > 1 {
            return Err(AppError::ReportUnavailable(
                "Report has more than one <testsuites> element".to_string(),
            ));
        }
        if let Some(root) = roots.first() {
            let counters = self.counters(&root[1]);
            if let Some(tests) = counters.tests {
                return Ok(Verdict {
                    tests_run: tests,
                    failures: counters.failures.saturating_add(counters.errors),
                });
            }
        }

        let mut found = false;
        let mut verdict = Verdict {
            tests_run: 0,
            failures: 0,
        };
        for cap in self.suite.captures_iter(&text) {
            let counters = self.counters(&cap[1]);
            let Some(tests) = counters.tests else {
                continue;
            };
            found = true;
            verdict.tests_run = verdict.tests_run.saturating_add(tests);
            verdict.failures = verdict
                .failures
                .saturating_add(counters.failures)
                .saturating_add(counters.errors);
        }

        if found {
            Ok(verdict)
        } else {
            Err(AppError::ReportUnavailable(
                "Couldn't parse the number of tests from the report".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregate(xml: &str) -> Result<Verdict> {
        JUnitAggregator::new().aggregate(xml.as_bytes())
    }

    #[test]
    fn test_root_totals_single_quotes() {
        let xml = "<?xml version='1.0' encoding='UTF-8'?>\n<testsuites name='AppTests.xctest' tests='10' failures='2'>\n<testsuite name='A' tests='10' failures='2'></testsuite>\n</testsuites>";
        assert_eq!(
            aggregate(xml).unwrap(),
            Verdict {
                tests_run: 10,
                failures: 2
            }
        );
    }

    #[test]
    fn test_root_totals_double_quotes_any_order() {
        let xml = r#"<testsuites failures="0" tests="5" time="1.2"></testsuites>"#;
        assert_eq!(
            aggregate(xml).unwrap(),
            Verdict {
                tests_run: 5,
                failures: 0
            }
        );
    }

    #[test]
    fn test_errors_count_as_failures() {
        let xml = r#"<testsuites tests="4" failures="1" errors="2"></testsuites>"#;
        assert_eq!(aggregate(xml).unwrap().failures, 3);
    }

    #[test]
    fn test_sums_suites_without_root() {
        let xml = r#"
<testsuite name="A" tests="3" failures="1"></testsuite>
<testsuite name="B" tests="2" failures="0" errors="1"></testsuite>"#;
        assert_eq!(
            aggregate(xml).unwrap(),
            Verdict {
                tests_run: 5,
                failures: 2
            }
        );
    }

    #[test]
    fn test_root_without_counts_falls_back_to_suites() {
        let xml = r#"<testsuites name="all"><testsuite tests="7" failures="0"/></testsuites>"#;
        assert_eq!(aggregate(xml).unwrap().tests_run, 7);
    }

    #[test]
    fn test_unparseable_reports() {
        assert!(aggregate("").is_err());
        assert!(aggregate("not xml at all").is_err());
        assert!(aggregate("<testsuites name='x'></testsuites>").is_err());
        assert!(JUnitAggregator::new().aggregate(&[0xff, 0x00, 0xfe]).is_err());
    }

    #[test]
    fn test_multiple_roots_rejected() {
        let xml = r#"<testsuites tests="1" failures="0"></testsuites><testsuites tests="2" failures="1"></testsuites>"#;
        assert!(aggregate(xml).is_err());
    }
}
