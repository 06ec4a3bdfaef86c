use prometheus::{
    histogram_opts, opts, register_histogram_vec_with_registry,
    register_int_counter_vec_with_registry, HistogramVec, IntCounterVec, Registry,
    DEFAULT_BUCKETS,
};

use super::{MetricsReport, MetricsReporter};
use crate::{Error, ErrorKind, Result};

const TABLE_LABEL_NAMES: &[&str] = &["table"];

/// Exports reports as prometheus metrics labelled by table name.
#[derive(Clone, Debug)]
pub struct PrometheusMetricsReporter {
    scan_qps: IntCounterVec,
    scan_result_data_files: IntCounterVec,
    scan_skipped_data_files: IntCounterVec,
    scan_skipped_delete_files: IntCounterVec,
    scan_planning_latency: HistogramVec,
    commit_qps: IntCounterVec,
    commit_attempts: HistogramVec,
    commit_latency: HistogramVec,
}

fn registry_error(e: prometheus::Error) -> Error {
    Error::new(ErrorKind::Unexpected, "Failed to register metrics").set_source(e)
}

impl PrometheusMetricsReporter {
    /// Register all metrics in `registry`.
    pub fn new(registry: &Registry) -> Result<Self> {
        let scan_qps = register_int_counter_vec_with_registry!(
            opts!("icefloe_scan_qps", "Number of planned scans"),
            TABLE_LABEL_NAMES,
            registry,
        )
        .map_err(registry_error)?;

        let scan_result_data_files = register_int_counter_vec_with_registry!(
            opts!(
                "icefloe_scan_result_data_files",
                "Data files returned by scan planning"
            ),
            TABLE_LABEL_NAMES,
            registry,
        )
        .map_err(registry_error)?;

        let scan_skipped_data_files = register_int_counter_vec_with_registry!(
            opts!(
                "icefloe_scan_skipped_data_files",
                "Data files pruned by scan planning"
            ),
            TABLE_LABEL_NAMES,
            registry,
        )
        .map_err(registry_error)?;

        let scan_skipped_delete_files = register_int_counter_vec_with_registry!(
            opts!(
                "icefloe_scan_skipped_delete_files",
                "Delete files pruned by scan planning"
            ),
            TABLE_LABEL_NAMES,
            registry,
        )
        .map_err(registry_error)?;

        let scan_planning_latency = register_histogram_vec_with_registry!(
            histogram_opts!(
                "icefloe_scan_planning_latency",
                "Time spent planning a scan",
                DEFAULT_BUCKETS.to_vec()
            ),
            TABLE_LABEL_NAMES,
            registry,
        )
        .map_err(registry_error)?;

        let commit_qps = register_int_counter_vec_with_registry!(
            opts!("icefloe_commit_qps", "Number of successful commits"),
            TABLE_LABEL_NAMES,
            registry,
        )
        .map_err(registry_error)?;

        let commit_attempts = register_histogram_vec_with_registry!(
            histogram_opts!(
                "icefloe_commit_attempts",
                "Attempts needed by a successful commit",
                vec![1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 21.0]
            ),
            TABLE_LABEL_NAMES,
            registry,
        )
        .map_err(registry_error)?;

        let commit_latency = register_histogram_vec_with_registry!(
            histogram_opts!(
                "icefloe_commit_latency",
                "Time spent committing, retries included",
                DEFAULT_BUCKETS.to_vec()
            ),
            TABLE_LABEL_NAMES,
            registry,
        )
        .map_err(registry_error)?;

        Ok(Self {
            scan_qps,
            scan_result_data_files,
            scan_skipped_data_files,
            scan_skipped_delete_files,
            scan_planning_latency,
            commit_qps,
            commit_attempts,
            commit_latency,
        })
    }
}

impl MetricsReporter for PrometheusMetricsReporter {
    fn report(&self, report: MetricsReport) {
        match report {
            MetricsReport::Scan(r) => {
                let labels = [r.table_name.as_str()];
                self.scan_qps.with_label_values(&labels).inc();
                self.scan_result_data_files
                    .with_label_values(&labels)
                    .inc_by(r.metrics.result_data_files);
                self.scan_skipped_data_files
                    .with_label_values(&labels)
                    .inc_by(r.metrics.skipped_data_files);
                self.scan_skipped_delete_files
                    .with_label_values(&labels)
                    .inc_by(r.metrics.skipped_delete_files);
                self.scan_planning_latency
                    .with_label_values(&labels)
                    .observe(r.metrics.total_planning_duration.as_secs_f64());
            }
            MetricsReport::Commit(r) => {
                let labels = [r.table_name.as_str()];
                self.commit_qps.with_label_values(&labels).inc();
                self.commit_attempts
                    .with_label_values(&labels)
                    .observe(r.attempts as f64);
                self.commit_latency
                    .with_label_values(&labels)
                    .observe(r.duration.as_secs_f64());
            }
        }
    }
}
