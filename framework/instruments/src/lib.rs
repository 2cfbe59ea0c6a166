mod report;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub use report::{
    CheckTotals, MetricValue, ReportCollector, ReportConfig, ReportMetric, Reporter,
    SummaryReportCollector,
};

/// Timing of a single operation, usually one request against the system under test.
///
/// Create the record just before the operation starts and call [OperationRecord::finish] with the
/// operation's result once it completes.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub operation_id: String,
    started: Instant,
    pub elapsed: Option<Duration>,
    pub is_error: bool,
    pub attr: BTreeMap<String, String>,
}

impl OperationRecord {
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            started: Instant::now(),
            elapsed: None,
            is_error: false,
            attr: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.attr.insert(key.into(), value.to_string());
        self
    }

    pub fn finish<T, E>(mut self, response: &Result<T, E>) -> Self {
        self.elapsed = Some(self.started.elapsed());
        self.is_error = response.is_err();
        self
    }

    /// The measured duration, or `None` if the record was never finished.
    pub fn duration(&self) -> Option<Duration> {
        self.elapsed
    }
}

/// Outcome of a named assertion made against a response.
///
/// Checks never stop an iteration. They are aggregated by name and reported at the end of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRecord {
    pub name: String,
    pub passed: bool,
}

impl CheckRecord {
    pub fn new(name: impl Into<String>, passed: bool) -> Self {
        Self {
            name: name.into(),
            passed,
        }
    }
}

/// Record a check against the reporter and hand the outcome back to the caller.
pub fn check(reporter: &Reporter, name: &str, passed: bool) -> bool {
    if !passed {
        log::debug!("Check failed: {name}");
    }
    reporter.add_check(CheckRecord::new(name, passed));
    passed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_records_elapsed_and_error_flag() {
        let ok = OperationRecord::new("op").finish(&Ok::<(), ()>(()));
        assert!(ok.duration().is_some());
        assert!(!ok.is_error);

        let failed = OperationRecord::new("op").finish(&Err::<(), _>("boom"));
        assert!(failed.is_error);
    }

    #[test]
    fn unfinished_record_has_no_duration() {
        let record = OperationRecord::new("op").with_attr("status", 200);
        assert!(record.duration().is_none());
        assert_eq!(record.attr.get("status").map(String::as_str), Some("200"));
    }

    #[test]
    fn check_returns_outcome_and_counts_it() {
        let reporter = ReportConfig::default().init();

        assert!(check(&reporter, "Workflow Started", true));
        assert!(!check(&reporter, "Workflow Started", false));

        let totals = reporter.check_totals();
        let started = totals.get("Workflow Started").unwrap();
        assert_eq!(started.passes, 1);
        assert_eq!(started.fails, 1);
    }
}
