//! Reports of scans and commits.
//!
//! Planning updates a [`ScanMetrics`] shared by every manifest task of one
//! scan, a [`ScanReport`] is built from it once the caller stops pulling
//! tasks. Commits produce a [`CommitReport`]. Both are handed to the
//! [`MetricsReporter`] of the table.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::info;

#[cfg(feature = "prometheus")]
mod prometheus;
#[cfg(feature = "prometheus")]
pub use self::prometheus::PrometheusMetricsReporter;

/// Counters of one scan planning.
///
/// All counters can be bumped concurrently.
#[derive(Debug, Default)]
pub struct ScanMetrics {
    total_data_manifests: AtomicU64,
    skipped_data_manifests: AtomicU64,
    result_data_files: AtomicU64,
    skipped_data_files: AtomicU64,
    total_delete_manifests: AtomicU64,
    skipped_delete_manifests: AtomicU64,
    indexed_delete_files: AtomicU64,
    equality_delete_files: AtomicU64,
    positional_delete_files: AtomicU64,
    skipped_delete_files: AtomicU64,
    total_planning_nanos: AtomicU64,
}

macro_rules! counter {
    ($($name:ident),* $(,)?) => {
        $(
            pub(crate) fn $name(&self, n: u64) {
                self.$name.fetch_add(n, Ordering::Relaxed);
            }
        )*
    };
}

impl ScanMetrics {
    counter!(
        total_data_manifests,
        skipped_data_manifests,
        result_data_files,
        skipped_data_files,
        total_delete_manifests,
        skipped_delete_manifests,
        indexed_delete_files,
        equality_delete_files,
        positional_delete_files,
        skipped_delete_files,
    );

    pub(crate) fn planning_duration(&self, d: Duration) {
        self.total_planning_nanos
            .fetch_add(d.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Snapshot of the counters.
    pub fn result(&self) -> ScanMetricsResult {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        ScanMetricsResult {
            total_data_manifests: get(&self.total_data_manifests),
            skipped_data_manifests: get(&self.skipped_data_manifests),
            result_data_files: get(&self.result_data_files),
            skipped_data_files: get(&self.skipped_data_files),
            total_delete_manifests: get(&self.total_delete_manifests),
            skipped_delete_manifests: get(&self.skipped_delete_manifests),
            indexed_delete_files: get(&self.indexed_delete_files),
            equality_delete_files: get(&self.equality_delete_files),
            positional_delete_files: get(&self.positional_delete_files),
            skipped_delete_files: get(&self.skipped_delete_files),
            total_planning_duration: Duration::from_nanos(get(&self.total_planning_nanos)),
        }
    }
}

/// Values of [`ScanMetrics`] at the end of a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanMetricsResult {
    /// Data manifests listed by the snapshot.
    pub total_data_manifests: u64,
    /// Data manifests pruned with their partition summaries.
    pub skipped_data_manifests: u64,
    /// Data files returned as tasks.
    pub result_data_files: u64,
    /// Data files pruned by partition or column stats.
    pub skipped_data_files: u64,
    /// Delete manifests listed by the snapshot.
    pub total_delete_manifests: u64,
    /// Delete manifests pruned with their partition summaries.
    pub skipped_delete_manifests: u64,
    /// Delete files kept in the delete index.
    pub indexed_delete_files: u64,
    /// Equality delete files kept in the delete index.
    pub equality_delete_files: u64,
    /// Positional delete files kept in the delete index.
    pub positional_delete_files: u64,
    /// Delete files pruned by partition or column stats.
    pub skipped_delete_files: u64,
    /// Time spent producing tasks.
    pub total_planning_duration: Duration,
}

/// Report of one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanReport {
    /// Table name.
    pub table_name: String,
    /// Snapshot the scan planned.
    pub snapshot_id: i64,
    /// Filter of the scan.
    pub filter: String,
    /// Counters.
    pub metrics: ScanMetricsResult,
}

/// Report of one successful commit.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReport {
    /// Table name.
    pub table_name: String,
    /// Snapshot created by the commit, `None` for metadata only updates.
    pub snapshot_id: Option<i64>,
    /// Sequence number of that snapshot.
    pub sequence_number: Option<i64>,
    /// Operation name, e.g. `append`.
    pub operation: String,
    /// Attempts it took, the first one included.
    pub attempts: u32,
    /// Wall time of the whole commit.
    pub duration: Duration,
}

/// A report sent to [`MetricsReporter`].
#[derive(Debug, Clone, PartialEq)]
pub enum MetricsReport {
    /// See [`ScanReport`].
    Scan(ScanReport),
    /// See [`CommitReport`].
    Commit(CommitReport),
}

/// Reference to [`MetricsReporter`].
pub type MetricsReporterRef = Arc<dyn MetricsReporter>;

/// Sink of metrics reports.
///
/// Reports are sent from planning and commit tasks, implementations must not
/// block.
pub trait MetricsReporter: Send + Sync + Debug {
    /// Consume one report.
    fn report(&self, report: MetricsReport);
}

/// Logs reports at info level. This is the reporter of tables by default.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMetricsReporter;

impl MetricsReporter for LoggingMetricsReporter {
    fn report(&self, report: MetricsReport) {
        match report {
            MetricsReport::Scan(r) => info!(
                "Scan of {} at snapshot {} with filter {}: {:?}",
                r.table_name, r.snapshot_id, r.filter, r.metrics
            ),
            MetricsReport::Commit(r) => info!(
                "Committed {} to {}: snapshot {:?}, sequence number {:?}, {} attempts in {:?}",
                r.operation, r.table_name, r.snapshot_id, r.sequence_number, r.attempts, r.duration
            ),
        }
    }
}

/// Keeps reports in memory.
#[derive(Debug, Default)]
pub struct InMemoryMetricsReporter {
    reports: Mutex<Vec<MetricsReport>>,
}

impl InMemoryMetricsReporter {
    /// Create an empty reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// All reports received so far.
    pub fn reports(&self) -> Vec<MetricsReport> {
        self.reports
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Last scan report.
    pub fn scan_report(&self) -> Option<ScanReport> {
        self.reports().into_iter().rev().find_map(|r| match r {
            MetricsReport::Scan(r) => Some(r),
            MetricsReport::Commit(_) => None,
        })
    }

    /// Commit reports in the order they were received.
    pub fn commit_reports(&self) -> Vec<CommitReport> {
        self.reports()
            .into_iter()
            .filter_map(|r| match r {
                MetricsReport::Commit(r) => Some(r),
                MetricsReport::Scan(_) => None,
            })
            .collect()
    }
}

impl MetricsReporter for InMemoryMetricsReporter {
    fn report(&self, report: MetricsReport) {
        match self.reports.lock() {
            Ok(mut reports) => reports.push(report),
            Err(poisoned) => poisoned.into_inner().push(report),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_metrics_result() {
        let metrics = ScanMetrics::default();
        metrics.total_delete_manifests(2);
        metrics.skipped_delete_manifests(1);
        metrics.equality_delete_files(1);
        metrics.skipped_delete_files(1);
        metrics.planning_duration(Duration::from_millis(3));

        let result = metrics.result();
        assert_eq!(result.total_delete_manifests, 2);
        assert_eq!(result.skipped_delete_manifests, 1);
        assert_eq!(result.equality_delete_files, 1);
        assert_eq!(result.skipped_delete_files, 1);
        assert_eq!(result.result_data_files, 0);
        assert_eq!(result.total_planning_duration, Duration::from_millis(3));
    }

    #[test]
    fn test_in_memory_reporter() {
        let reporter = InMemoryMetricsReporter::new();
        assert!(reporter.scan_report().is_none());

        let commit = CommitReport {
            table_name: "db.t".to_string(),
            snapshot_id: Some(1),
            sequence_number: Some(1),
            operation: "append".to_string(),
            attempts: 2,
            duration: Duration::from_millis(5),
        };
        reporter.report(MetricsReport::Commit(commit.clone()));
        for snapshot_id in [1, 2] {
            reporter.report(MetricsReport::Scan(ScanReport {
                table_name: "db.t".to_string(),
                snapshot_id,
                filter: "true".to_string(),
                metrics: ScanMetricsResult::default(),
            }));
        }

        assert_eq!(reporter.reports().len(), 3);
        assert_eq!(reporter.commit_reports(), vec![commit]);
        assert_eq!(reporter.scan_report().map(|r| r.snapshot_id), Some(2));
    }
}
