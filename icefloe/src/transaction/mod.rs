//! Changes to a table, committed with optimistic concurrency.
//!
//! Every change is a [`PendingUpdate`]: it validates its preconditions
//! and produces new table metadata from a base version. The commit loop
//! writes that metadata and swaps the catalog pointer. When another writer
//! got there first, the change is validated and applied again on top of
//! the new version, with a jittered exponential backoff between attempts.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use backon::{BackoffBuilder, ExponentialBuilder};
use enum_display::EnumDisplay;
use log::{debug, info, warn};

use crate::catalog::{FileIO, MetadataPointer};
use crate::error::{Error, ErrorKind, Result};
use crate::metrics::{CommitReport, MetricsReport};
use crate::types::{MetadataLog, TableMetadata};
use crate::Table;

mod snapshot_producer;
use snapshot_producer::SnapshotProducer;
mod append;
pub use append::FastAppend;
mod overwrite;
pub use overwrite::Overwrite;
mod row_delta;
pub use row_delta::RowDelta;
mod update_spec;
pub use update_spec::UpdatePartitionSpec;
mod update_properties;
pub use update_properties::UpdateProperties;

/// A change that can be applied to any version of a table.
#[async_trait]
pub(crate) trait PendingUpdate: Send + Sync {
    /// Name used in logs and commit reports.
    fn operation(&self) -> &'static str;

    /// Check the preconditions of the change.
    ///
    /// `starting` is the version the change was created from, `current` is
    /// the version it's about to be applied to.
    async fn validate(&self, _starting: &Table, _current: &Table) -> Result<()> {
        Ok(())
    }

    /// New metadata with the change applied to `base`.
    ///
    /// Locations of files written on the way are pushed to `written`, they
    /// are deleted if this attempt doesn't make it.
    async fn apply(&self, base: &Table, written: &mut Vec<String>) -> Result<TableMetadata>;
}

/// States of one commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumDisplay)]
pub(crate) enum CommitState {
    /// Validate and apply the change on the base, write the new metadata.
    Preparing,
    /// Check the base is still the current version.
    Validating,
    /// Swap the catalog pointer to the new metadata.
    Swapping,
    /// The pointer was swapped.
    Committed,
    /// Gave up, the error is returned to the caller.
    Failed,
}

struct Commit<'a> {
    starting: &'a Table,
    update: &'a dyn PendingUpdate,
    base: Table,
    rebased: bool,
    attempts: u32,
    backoff: <ExponentialBuilder as BackoffBuilder>::Backoff,
    max_wait: Duration,
    written: Vec<String>,
    candidate: Option<(String, TableMetadata)>,
    lost_swap: Option<Error>,
    failure: Option<Error>,
}

/// Commit `update` on top of `table`, returns the committed version.
pub(crate) async fn commit(table: &Table, update: &dyn PendingUpdate) -> Result<Table> {
    let started = Instant::now();
    let retry = &table.config().commit_retry;
    let mut commit = Commit {
        starting: table,
        update,
        base: table.clone(),
        rebased: false,
        attempts: 1,
        backoff: ExponentialBuilder::default()
            .with_min_delay(retry.min_wait)
            .with_max_delay(retry.max_wait)
            .with_max_times(retry.num_retries)
            .with_jitter()
            .build(),
        max_wait: retry.max_wait,
        written: vec![],
        candidate: None,
        lost_swap: None,
        failure: None,
    };

    let mut state = CommitState::Preparing;
    loop {
        debug!(
            "Commit of {} to {}: {state}, attempt {}",
            update.operation(),
            table.identifier(),
            commit.attempts
        );
        state = match state {
            CommitState::Preparing => commit.prepare().await,
            CommitState::Validating => commit.validate().await,
            CommitState::Swapping => commit.swap().await,
            CommitState::Committed => return commit.finish(started),
            CommitState::Failed => return Err(commit.abort().await),
        };
    }
}

impl Commit<'_> {
    fn fail(&mut self, e: Error) -> CommitState {
        self.failure = Some(e);
        CommitState::Failed
    }

    async fn prepare(&mut self) -> CommitState {
        self.cleanup().await;
        match self.write_candidate().await {
            Ok(candidate) => {
                self.candidate = Some(candidate);
                CommitState::Validating
            }
            Err(e) if self.rebased && e.kind() == ErrorKind::ValidationFailed => self.fail(
                Error::new(
                    ErrorKind::CommitFailed,
                    format!(
                        "{} no longer holds after concurrent commits",
                        self.update.operation()
                    ),
                )
                .set_source(e),
            ),
            Err(e) => self.fail(e),
        }
    }

    async fn write_candidate(&mut self) -> Result<(String, TableMetadata)> {
        self.update.validate(self.starting, &self.base).await?;
        let mut metadata = self.update.apply(&self.base, &mut self.written).await?;

        let base_metadata = self.base.metadata();
        metadata.last_updated_ms = metadata
            .last_updated_ms
            .max(chrono::Utc::now().timestamp_millis());
        metadata.metadata_log.push(MetadataLog {
            timestamp_ms: base_metadata.last_updated_ms,
            metadata_file: self.base.metadata_location().to_string(),
        });
        let max_logs = self.base.config().metadata.previous_versions_max;
        if metadata.metadata_log.len() > max_logs {
            let excess = metadata.metadata_log.len() - max_logs;
            metadata.metadata_log.drain(..excess);
        }

        let location =
            Table::write_metadata(self.base.file_io(), &metadata, self.base.version() + 1).await?;
        self.written.push(location.clone());
        Ok((location, metadata))
    }

    async fn validate(&mut self) -> CommitState {
        let catalog = self.base.catalog();
        match catalog.current_pointer(self.base.identifier()).await {
            Ok(pointer) if pointer.version == self.base.version() => match self.lost_swap.take() {
                // The catalog rejected the swap without moving the pointer.
                Some(conflict) => self.retry(conflict).await,
                None => CommitState::Swapping,
            },
            Ok(pointer) => {
                self.lost_swap = None;
                let conflict = Error::new(
                    ErrorKind::CommitConflict,
                    format!(
                        "{} moved from version {} to {}",
                        self.base.identifier(),
                        self.base.version(),
                        pointer.version
                    ),
                );
                self.retry(conflict).await
            }
            Err(e) => self.fail(e),
        }
    }

    /// Wait for the next backoff delay and rebase on the current version,
    /// fail once retries are exhausted.
    async fn retry(&mut self, conflict: Error) -> CommitState {
        let Some(delay) = self.backoff.next() else {
            let attempts = self.attempts;
            return self.fail(
                Error::new(
                    ErrorKind::CommitFailed,
                    format!("Commit still conflicting after {attempts} attempts"),
                )
                .with_context("table", self.base.identifier().to_string())
                .set_source(conflict),
            );
        };

        let delay = delay.min(self.max_wait);
        warn!(
            "Commit of {} conflicted on attempt {}, retrying in {delay:?}: {conflict}",
            self.update.operation(),
            self.attempts
        );
        tokio::time::sleep(delay).await;

        match self.base.refresh().await {
            Ok(current) => {
                self.base = current;
                self.rebased = true;
                self.attempts += 1;
                CommitState::Preparing
            }
            Err(e) => self.fail(e),
        }
    }

    async fn swap(&mut self) -> CommitState {
        let Some((location, _)) = &self.candidate else {
            return self.fail(Error::new(
                ErrorKind::Unexpected,
                "no metadata was prepared before swapping",
            ));
        };

        let catalog = self.base.catalog();
        match catalog
            .swap(self.base.identifier(), self.base.version(), location)
            .await
        {
            Ok(()) => CommitState::Committed,
            // Validating decides whether to retry.
            Err(e) if e.is_retryable() => {
                debug!("Swap of {} lost: {e}", self.base.identifier());
                self.lost_swap = Some(e);
                CommitState::Validating
            }
            Err(e) => self.fail(e),
        }
    }

    fn finish(mut self, started: Instant) -> Result<Table> {
        let Some((location, metadata)) = self.candidate.take() else {
            return Err(Error::new(
                ErrorKind::Unexpected,
                "committed without prepared metadata",
            ));
        };

        let snapshot = metadata
            .current_snapshot()?
            .filter(|s| Some(s.snapshot_id) != self.base.metadata().current_snapshot_id)
            .map(|s| (s.snapshot_id, s.sequence_number));
        let reporter = self.starting.metrics_reporter();
        let committed = Table::from_parts(
            self.base.identifier().clone(),
            self.base.catalog(),
            self.base.file_io().clone(),
            MetadataPointer {
                location,
                version: self.base.version() + 1,
            },
            metadata,
            reporter.clone(),
        )?;

        info!(
            "Committed {} to {} at version {} after {} attempts",
            self.update.operation(),
            committed.identifier(),
            committed.version(),
            self.attempts
        );
        reporter.report(MetricsReport::Commit(CommitReport {
            table_name: committed.identifier().to_string(),
            snapshot_id: snapshot.map(|(id, _)| id),
            sequence_number: snapshot.map(|(_, seq)| seq),
            operation: self.update.operation().to_string(),
            attempts: self.attempts,
            duration: started.elapsed(),
        }));
        Ok(committed)
    }

    async fn abort(mut self) -> Error {
        self.cleanup().await;
        self.failure
            .take()
            .unwrap_or_else(|| Error::new(ErrorKind::Unexpected, "commit failed without cause"))
    }

    /// Delete the files of the previous attempt.
    async fn cleanup(&mut self) {
        delete_files(self.base.file_io(), std::mem::take(&mut self.written)).await;
        self.candidate = None;
    }
}

async fn delete_files(io: &FileIO, paths: Vec<String>) {
    for path in paths {
        if let Err(e) = io.delete(&path).await {
            warn!("Failed to delete {path} of an abandoned commit: {e}");
        }
    }
}
