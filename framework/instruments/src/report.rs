mod summary_report;

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::{CheckRecord, OperationRecord};

pub use summary_report::SummaryReportCollector;

/// Value of a field on a [ReportMetric].
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Bool(bool),
    F64(f64),
    I64(i64),
    U64(u64),
    String(String),
}

impl Display for MetricValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Bool(b) => write!(f, "{b}"),
            MetricValue::F64(v) => write!(f, "{v:.3}"),
            MetricValue::I64(v) => write!(f, "{v}"),
            MetricValue::U64(v) => write!(f, "{v}"),
            MetricValue::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for MetricValue {
    fn from(value: bool) -> Self {
        MetricValue::Bool(value)
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::F64(value)
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        MetricValue::I64(value)
    }
}

impl From<u64> for MetricValue {
    fn from(value: u64) -> Self {
        MetricValue::U64(value)
    }
}

impl From<usize> for MetricValue {
    fn from(value: usize) -> Self {
        MetricValue::U64(value as u64)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        MetricValue::String(value.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        MetricValue::String(value)
    }
}

/// A custom metric reported alongside the operation timings.
///
/// The reported timestamp for the metric will be the current time when the metric is created.
/// The name you choose will be transformed into `cl.custom.<name>`.
#[derive(Debug, Clone)]
pub struct ReportMetric {
    pub name: String,
    pub timestamp: SystemTime,
    pub fields: Vec<(String, MetricValue)>,
    pub tags: Vec<(String, String)>,
}

impl ReportMetric {
    pub fn new(name: &str) -> Self {
        Self {
            name: format!("cl.custom.{name}"),
            timestamp: SystemTime::now(),
            fields: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_field<N, V>(mut self, name: N, value: V) -> Self
    where
        N: Into<String>,
        V: Into<MetricValue>,
    {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn with_tag<N, V>(mut self, name: N, value: V) -> Self
    where
        N: Into<String>,
        V: ToString,
    {
        self.tags.push((name.into(), value.to_string()));
        self
    }
}

/// Aggregate pass and fail counts for one named check.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CheckTotals {
    pub passes: u64,
    pub fails: u64,
}

impl CheckTotals {
    pub fn total(&self) -> u64 {
        self.passes + self.fails
    }

    /// Fraction of passing checks, `0.0` when nothing was recorded.
    pub fn pass_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.passes as f64 / total as f64,
        }
    }

    pub(crate) fn record(&mut self, passed: bool) {
        if passed {
            self.passes += 1;
        } else {
            self.fails += 1;
        }
    }
}

pub trait ReportCollector {
    fn add_operation(&mut self, operation_record: &OperationRecord);

    fn add_check(&mut self, check: &CheckRecord);

    /// Record a custom metric that is not tied to an operation.
    fn add_custom(&mut self, metric: ReportMetric);

    fn finalize(&self);
}

/// Entry point for recording results during a run.
///
/// The reporter is shared between all agents, so every collector sits behind its own lock.
pub struct Reporter {
    collectors: Vec<Mutex<Box<dyn ReportCollector + Send>>>,
    check_totals: Mutex<BTreeMap<String, CheckTotals>>,
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("collectors", &self.collectors.len())
            .finish()
    }
}

impl Reporter {
    pub fn add_operation(&self, operation_record: &OperationRecord) {
        for collector in &self.collectors {
            collector.lock().add_operation(operation_record);
        }
    }

    pub fn add_check(&self, check: CheckRecord) {
        self.check_totals
            .lock()
            .entry(check.name.clone())
            .or_default()
            .record(check.passed);

        for collector in &self.collectors {
            collector.lock().add_check(&check);
        }
    }

    pub fn add_custom(&self, metric: ReportMetric) {
        for collector in &self.collectors {
            collector.lock().add_custom(metric.clone());
        }
    }

    /// Snapshot of the check counts recorded so far, keyed by check name.
    pub fn check_totals(&self) -> BTreeMap<String, CheckTotals> {
        self.check_totals.lock().clone()
    }

    pub fn finalize(&self) {
        for collector in &self.collectors {
            collector.lock().finalize();
        }
    }
}

#[derive(Default)]
pub struct ReportConfig {
    enable_summary: bool,
    extra: Vec<Box<dyn ReportCollector + Send>>,
}

impl ReportConfig {
    /// Print summary tables of operations, checks and custom metrics when the run finishes.
    pub fn enable_summary(mut self) -> Self {
        self.enable_summary = true;
        self
    }

    pub fn with_collector(mut self, collector: Box<dyn ReportCollector + Send>) -> Self {
        self.extra.push(collector);
        self
    }

    pub fn init(self) -> Reporter {
        let mut collectors: Vec<Mutex<Box<dyn ReportCollector + Send>>> = Vec::new();
        if self.enable_summary {
            collectors.push(Mutex::new(Box::new(SummaryReportCollector::new())));
        }
        collectors.extend(self.extra.into_iter().map(Mutex::new));

        Reporter {
            collectors,
            check_totals: Mutex::new(BTreeMap::new()),
        }
    }
}
