mod tables;

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use tabled::settings::Style;
use tabled::Table;

use crate::report::summary_report::tables::{CheckRow, MetricRow, OperationRow};
use crate::report::{CheckTotals, ReportCollector, ReportMetric};
use crate::{CheckRecord, OperationRecord};

#[derive(Default)]
struct OperationStats {
    durations: Vec<Duration>,
    errors: usize,
}

/// Keeps results in memory and prints a summary of the run when it is finalized.
#[derive(Default)]
pub struct SummaryReportCollector {
    operations: HashMap<String, OperationStats>,
    checks: BTreeMap<String, CheckTotals>,
    custom_metrics: Vec<ReportMetric>,
}

impl SummaryReportCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn operation_rows(&self) -> Vec<OperationRow> {
        let mut rows = self
            .operations
            .iter()
            .map(|(operation_id, stats)| {
                let mut sorted = stats.durations.clone();
                sorted.sort();

                let total_micro = sorted.iter().map(Duration::as_micros).sum::<u128>();
                let avg_time_ms = match sorted.len() {
                    0 => 0.0,
                    n => (total_micro as f64 / n as f64) / 1000.0,
                };

                OperationRow {
                    operation_id: operation_id.clone(),
                    total_operations: sorted.len(),
                    errors: stats.errors,
                    avg_time_ms,
                    min_time_ms: sorted.first().map(as_ms).unwrap_or_default(),
                    p90_time_ms: percentile(&sorted, 90.0).map(as_ms).unwrap_or_default(),
                    p95_time_ms: percentile(&sorted, 95.0).map(as_ms).unwrap_or_default(),
                    max_time_ms: sorted.last().map(as_ms).unwrap_or_default(),
                }
            })
            .collect::<Vec<_>>();

        rows.sort_by(|a, b| a.operation_id.cmp(&b.operation_id));
        rows
    }

    fn check_rows(&self) -> Vec<CheckRow> {
        self.checks
            .iter()
            .map(|(name, totals)| CheckRow {
                mark: if totals.fails == 0 { "✓" } else { "✗" }.to_string(),
                name: name.clone(),
                passes: totals.passes,
                fails: totals.fails,
                pass_rate: totals.pass_rate() * 100.0,
            })
            .collect()
    }

    fn metric_rows(&self) -> Vec<MetricRow> {
        self.custom_metrics
            .iter()
            .enumerate()
            .map(|(i, metric)| MetricRow {
                index: i + 1,
                name: metric.name.clone(),
                timestamp: format_timestamp(metric),
                fields: metric
                    .fields
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect::<Vec<_>>()
                    .join(", "),
                tags: metric
                    .tags
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect::<Vec<_>>()
                    .join(", "),
            })
            .collect()
    }
}

impl ReportCollector for SummaryReportCollector {
    fn add_operation(&mut self, operation_record: &OperationRecord) {
        let Some(elapsed) = operation_record.duration() else {
            log::warn!(
                "Ignoring unfinished operation record: {}",
                operation_record.operation_id
            );
            return;
        };

        let stats = self
            .operations
            .entry(operation_record.operation_id.clone())
            .or_default();
        stats.durations.push(elapsed);
        if operation_record.is_error {
            stats.errors += 1;
        }
    }

    fn add_check(&mut self, check: &CheckRecord) {
        self.checks
            .entry(check.name.clone())
            .or_default()
            .record(check.passed);
    }

    fn add_custom(&mut self, metric: ReportMetric) {
        self.custom_metrics.push(metric);
    }

    fn finalize(&self) {
        println!("\nSummary of operations");
        let mut table = Table::new(self.operation_rows());
        table.with(Style::modern());
        println!("{table}");

        if !self.checks.is_empty() {
            println!("\nChecks");
            let mut table = Table::new(self.check_rows());
            table.with(Style::modern());
            println!("{table}");
        }

        if !self.custom_metrics.is_empty() {
            println!("\nCustom metrics");
            let mut table = Table::new(self.metric_rows());
            table.with(Style::modern());
            println!("{table}");
        }
    }
}

/// Nearest-rank percentile over an already sorted slice.
fn percentile(sorted: &[Duration], pct: f64) -> Option<&Duration> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (pct * sorted.len() as f64 / 100.0).ceil() as usize;
    sorted.get(rank.clamp(1, sorted.len()) - 1)
}

fn as_ms(d: &Duration) -> f64 {
    d.as_micros() as f64 / 1000.0
}

fn format_timestamp(metric: &ReportMetric) -> String {
    chrono::DateTime::<chrono::Utc>::from(metric.timestamp)
        .format("%H:%M:%S")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn finished(id: &str, ms: u64, is_error: bool) -> OperationRecord {
        let mut record = OperationRecord::new(id);
        record.elapsed = Some(Duration::from_millis(ms));
        record.is_error = is_error;
        record
    }

    #[test]
    fn percentile_uses_nearest_rank() {
        let sorted = (1..=20).map(Duration::from_millis).collect::<Vec<_>>();
        assert_eq!(percentile(&sorted, 95.0), Some(&Duration::from_millis(19)));
        assert_eq!(percentile(&sorted, 90.0), Some(&Duration::from_millis(18)));
        assert_eq!(percentile(&[], 95.0), None);
    }

    #[test]
    fn operation_rows_include_errors() {
        let mut collector = SummaryReportCollector::new();
        collector.add_operation(&finished("conductor_signal_task", 10, false));
        collector.add_operation(&finished("conductor_signal_task", 30, true));
        collector.add_operation(&finished("conductor_execute_workflow", 5, false));

        let rows = collector.operation_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].operation_id, "conductor_execute_workflow");

        let signal = &rows[1];
        assert_eq!(signal.total_operations, 2);
        assert_eq!(signal.errors, 1);
        assert_eq!(signal.min_time_ms, 10.0);
        assert_eq!(signal.max_time_ms, 30.0);
        assert_eq!(signal.avg_time_ms, 20.0);
    }

    #[test]
    fn all_failed_operations_do_not_panic() {
        let mut collector = SummaryReportCollector::new();
        collector.add_operation(&finished("conductor_signal_task", 7, true));
        collector.finalize();
    }

    #[test]
    fn unfinished_operations_are_ignored() {
        let mut collector = SummaryReportCollector::new();
        collector.add_operation(&OperationRecord::new("never_finished"));
        assert!(collector.operation_rows().is_empty());
    }

    #[test]
    fn checks_are_grouped_by_name() {
        let mut collector = SummaryReportCollector::new();
        collector.add_check(&CheckRecord::new("Checkout", true));
        collector.add_check(&CheckRecord::new("Checkout", false));
        collector.add_check(&CheckRecord::new("AddItem call #1", true));

        let rows = collector.check_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "AddItem call #1");
        assert_eq!(rows[0].mark, "✓");
        assert_eq!(rows[1].name, "Checkout");
        assert_eq!(rows[1].mark, "✗");
        assert_eq!(rows[1].pass_rate, 50.0);
    }
}
