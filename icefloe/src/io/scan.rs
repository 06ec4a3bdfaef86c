//! Scan planning.
//!
//! Planning turns a snapshot and a filter into [`FileScanTask`]s. Delete
//! manifests are read first to build a [`DeleteFileIndex`], data manifests
//! are then read lazily, one at a time, while the caller pulls tasks.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use derive_builder::Builder;
use futures::future::ready;
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt, TryStreamExt};
use log::debug;

use super::{DeleteFileIndex, ManifestIndex};
use crate::catalog::FileIO;
use crate::expr::{
    inclusive_projection, BoundPredicate, InclusiveMetricsEvaluator, ManifestEvaluator,
    PartitionEvaluator, Predicate, ResidualEvaluator, StrictMetricsEvaluator,
};
use crate::metrics::{MetricsReport, MetricsReporterRef, ScanMetrics, ScanReport};
use crate::types::{
    DataContentType, DataFile, ManifestEntry, ManifestListEntry, Schema, Struct, StructValue,
    TableMetadata,
};
use crate::{Error, ErrorKind, Result, Table};

/// Delete manifests read at the same time.
const DELETE_MANIFEST_CONCURRENCY: usize = 8;

/// Lazy stream of scan tasks.
pub type FileScanTaskStream = BoxStream<'static, Result<FileScanTask>>;

/// A data file to read, with the delete files to apply to its rows.
#[derive(Debug, Clone, PartialEq)]
pub struct FileScanTask {
    /// Data file, its partition and spec id included.
    pub data_file: DataFile,
    /// Offset of the first byte to read.
    pub start: u64,
    /// Number of bytes to read.
    pub length: u64,
    /// Deletes that may strike rows of the file: equality deletes first,
    /// then positional deletes.
    pub deletes: Vec<Arc<DataFile>>,
    /// Filter rows still have to pass, `AlwaysTrue` when every row of the
    /// file is known to match.
    pub residual: BoundPredicate,
}

impl FileScanTask {
    /// Location of the data file.
    pub fn file_path(&self) -> &str {
        &self.data_file.file_path
    }

    /// Partition tuple of the data file.
    pub fn partition(&self) -> &StructValue {
        &self.data_file.partition
    }

    /// Partition spec the tuple was produced with.
    pub fn spec_id(&self) -> i32 {
        self.data_file.spec_id
    }
}

/// A scan of one snapshot of a table.
#[derive(Builder)]
#[builder(pattern = "owned", setter(prefix = "with"), build_fn(error = "Error"))]
pub struct TableScan {
    /// Table to scan.
    table: Table,
    /// Snapshot to scan, the current one by default.
    #[builder(setter(strip_option), default)]
    snapshot_id: Option<i64>,
    /// Row filter.
    #[builder(default = "Predicate::AlwaysTrue")]
    filter: Predicate,
    /// Whether column names of the filter are matched case sensitively.
    #[builder(default = "true")]
    case_sensitive: bool,
    /// Keep every delete file the partition filter lets through, and always
    /// return `AlwaysTrue` residuals. Set by readers that won't evaluate
    /// the filter on rows.
    #[builder(default)]
    ignore_residuals: bool,
    /// Receives the scan report, the table's reporter by default.
    #[builder(setter(strip_option), default)]
    metrics_reporter: Option<MetricsReporterRef>,
}

impl TableScan {
    /// Plan the tasks of this scan.
    ///
    /// Delete manifests are read before this returns. Data manifests are
    /// read while the stream is polled, dropping the stream stops reading
    /// and sends the scan report.
    pub async fn plan_files(&self) -> Result<FileScanTaskStream> {
        let started = Instant::now();
        let metadata = self.table.metadata();

        let snapshot = match self.snapshot_id {
            Some(snapshot_id) => metadata.snapshot(snapshot_id).ok_or_else(|| {
                Error::new(
                    ErrorKind::DataInvalid,
                    format!("Snapshot {snapshot_id} not found"),
                )
                .with_context("table", self.table.identifier().to_string())
            })?,
            None => match metadata.current_snapshot()? {
                Some(snapshot) => snapshot,
                None => return Ok(stream::empty().boxed()),
            },
        };

        let schema = match snapshot.schema_id.and_then(|id| metadata.schema(id as i32)) {
            Some(schema) => schema,
            None => metadata.current_schema()?,
        };
        let filter = self.filter.bind(schema.as_struct(), self.case_sensitive)?;

        let ctx = Arc::new(PlanContext::new(
            self.table.file_io().clone(),
            metadata,
            schema,
            filter,
            self.ignore_residuals,
        )?);

        let manifests = ManifestIndex::for_snapshot(self.table.file_io(), snapshot);
        let deletes = Arc::new(ctx.load_delete_index(&manifests).await?);
        debug!(
            "Indexed {} delete files for scan of {} at snapshot {}",
            deletes.len(),
            self.table.identifier(),
            snapshot.snapshot_id
        );

        let reporter = ScanReporter {
            reporter: self
                .metrics_reporter
                .clone()
                .unwrap_or_else(|| self.table.metrics_reporter()),
            metrics: ctx.metrics.clone(),
            table_name: self.table.identifier().to_string(),
            snapshot_id: snapshot.snapshot_id,
            filter: self.filter.to_string(),
            started,
        };

        let tasks = manifests
            .data_manifests()
            .map_ok(move |manifest| ctx.clone().plan_manifest(manifest, deletes.clone()))
            .try_flatten()
            .boxed();

        Ok(ReportedStream {
            inner: tasks,
            _reporter: reporter,
        }
        .boxed())
    }
}

struct SpecFilter {
    partition_type: Struct,
    unpartitioned: bool,
    manifest_evaluator: ManifestEvaluator,
    partition_evaluator: PartitionEvaluator,
    residual_evaluator: ResidualEvaluator,
}

/// State shared by every manifest of one planning.
struct PlanContext {
    io: FileIO,
    filter: BoundPredicate,
    ignore_residuals: bool,
    specs: HashMap<i32, SpecFilter>,
    inclusive: InclusiveMetricsEvaluator,
    strict: StrictMetricsEvaluator,
    metrics: Arc<ScanMetrics>,
}

impl PlanContext {
    fn new(
        io: FileIO,
        metadata: &TableMetadata,
        schema: &Schema,
        filter: BoundPredicate,
        ignore_residuals: bool,
    ) -> Result<Self> {
        let mut specs = HashMap::with_capacity(metadata.partition_specs.len());
        for spec in &metadata.partition_specs {
            let partition_type = spec.partition_type(schema)?;
            let projected = inclusive_projection(spec, &partition_type, &filter)?;
            specs.insert(
                spec.spec_id,
                SpecFilter {
                    manifest_evaluator: ManifestEvaluator::new(projected.clone(), &partition_type),
                    partition_evaluator: PartitionEvaluator::new(projected, &partition_type),
                    residual_evaluator: ResidualEvaluator::new(spec, filter.clone()),
                    unpartitioned: spec.is_unpartitioned(),
                    partition_type,
                },
            );
        }

        Ok(Self {
            io,
            inclusive: InclusiveMetricsEvaluator::new(filter.clone()),
            strict: StrictMetricsEvaluator::new(filter.clone()),
            filter,
            ignore_residuals,
            specs,
            metrics: Arc::new(ScanMetrics::default()),
        })
    }

    fn spec(&self, manifest: &ManifestListEntry) -> Result<&SpecFilter> {
        self.specs.get(&manifest.partition_spec_id).ok_or_else(|| {
            Error::new(
                ErrorKind::MalformedManifest,
                format!(
                    "manifest {} uses unknown partition spec {}",
                    manifest.manifest_path, manifest.partition_spec_id
                ),
            )
        })
    }

    async fn load_delete_index(&self, manifests: &ManifestIndex) -> Result<DeleteFileIndex> {
        let delete_manifests: Vec<ManifestListEntry> =
            manifests.delete_manifests().try_collect().await?;
        self.metrics
            .total_delete_manifests(delete_manifests.len() as u64);

        let mut candidates = Vec::with_capacity(delete_manifests.len());
        for manifest in delete_manifests {
            if self.spec(&manifest)?.manifest_evaluator.eval(&manifest) {
                candidates.push(manifest);
            } else {
                self.metrics.skipped_delete_manifests(1);
            }
        }

        let entries: Vec<Vec<ManifestEntry>> = stream::iter(candidates)
            .map(|manifest| self.load_delete_manifest(manifest))
            .buffer_unordered(DELETE_MANIFEST_CONCURRENCY)
            .try_collect()
            .await?;
        let entries: Vec<ManifestEntry> = entries.into_iter().flatten().collect();

        let equality = entries
            .iter()
            .filter(|e| e.data_file.content == DataContentType::EqualityDeletes)
            .count() as u64;
        self.metrics.equality_delete_files(equality);
        self.metrics
            .positional_delete_files(entries.len() as u64 - equality);
        self.metrics.indexed_delete_files(entries.len() as u64);

        DeleteFileIndex::new(entries, |spec_id| {
            self.specs
                .get(&spec_id)
                .map_or(false, |spec| spec.unpartitioned)
        })
    }

    async fn load_delete_manifest(&self, manifest: ManifestListEntry) -> Result<Vec<ManifestEntry>> {
        let spec = self.spec(&manifest)?;
        manifest
            .live_entries(&self.io, spec.partition_type.clone())
            .try_filter(|entry| ready(self.keep_delete(spec, &entry.data_file)))
            .try_collect()
            .await
    }

    fn keep_delete(&self, spec: &SpecFilter, file: &DataFile) -> bool {
        let keep = spec.partition_evaluator.eval(&file.partition)
            && (self.ignore_residuals || self.inclusive.eval(file));
        if !keep {
            self.metrics.skipped_delete_files(1);
        }
        keep
    }

    fn plan_manifest(
        self: Arc<Self>,
        manifest: ManifestListEntry,
        deletes: Arc<DeleteFileIndex>,
    ) -> FileScanTaskStream {
        self.metrics.total_data_manifests(1);
        let spec = match self.spec(&manifest) {
            Ok(spec) => spec,
            Err(e) => return stream::once(ready(Err(e))).boxed(),
        };
        if !spec.manifest_evaluator.eval(&manifest) {
            self.metrics.skipped_data_manifests(1);
            return stream::empty().boxed();
        }

        manifest
            .live_entries(&self.io, spec.partition_type.clone())
            .try_filter_map(move |entry| ready(Ok(self.plan_file(entry, &deletes))))
            .boxed()
    }

    fn plan_file(&self, entry: ManifestEntry, deletes: &DeleteFileIndex) -> Option<FileScanTask> {
        let data_seq = entry.data_sequence_number();
        let file = entry.data_file;

        let spec = self.specs.get(&file.spec_id);
        let partition_match =
            spec.map_or(true, |spec| spec.partition_evaluator.eval(&file.partition));
        if !partition_match || !self.inclusive.eval(&file) {
            self.metrics.skipped_data_files(1);
            return None;
        }

        let residual = if self.ignore_residuals || self.strict.eval(&file) {
            BoundPredicate::AlwaysTrue
        } else {
            spec.map_or_else(
                || self.filter.clone(),
                |spec| spec.residual_evaluator.residual_for(&file.partition),
            )
        };
        self.metrics.result_data_files(1);

        Some(FileScanTask {
            deletes: deletes.for_data_file(data_seq, &file),
            start: 0,
            length: file.file_size_in_bytes.max(0) as u64,
            data_file: file,
            residual,
        })
    }
}

/// Sends the scan report when dropped.
struct ScanReporter {
    reporter: MetricsReporterRef,
    metrics: Arc<ScanMetrics>,
    table_name: String,
    snapshot_id: i64,
    filter: String,
    started: Instant,
}

impl Drop for ScanReporter {
    fn drop(&mut self) {
        self.metrics.planning_duration(self.started.elapsed());
        self.reporter.report(MetricsReport::Scan(ScanReport {
            table_name: std::mem::take(&mut self.table_name),
            snapshot_id: self.snapshot_id,
            filter: std::mem::take(&mut self.filter),
            metrics: self.metrics.result(),
        }));
    }
}

struct ReportedStream {
    inner: FileScanTaskStream,
    _reporter: ScanReporter,
}

impl Stream for ReportedStream {
    type Item = Result<FileScanTask>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}
