use std::collections::HashSet;

use async_trait::async_trait;
use futures::TryStreamExt;

use super::{commit, PendingUpdate, SnapshotProducer};
use crate::error::{Error, ErrorKind, Result};
use crate::types::{
    DataContentType, DataFile, ManifestContentType, ManifestStatus, SnapshotOperation,
    TableMetadata,
};
use crate::Table;

/// Replace data files: remove some by path and add others, atomically.
///
/// Manifests holding a removed file are rewritten, the removed entries are
/// kept as deleted and the others as existing. Every removed path has to
/// be live in the version the overwrite is applied to.
pub struct Overwrite {
    table: Table,
    added: Vec<DataFile>,
    deleted: Vec<String>,
}

impl Overwrite {
    pub(crate) fn new(table: Table) -> Self {
        Self {
            table,
            added: vec![],
            deleted: vec![],
        }
    }

    /// Add a data file.
    pub fn add_file(&mut self, file: DataFile) -> &mut Self {
        self.added.push(file);
        self
    }

    /// Remove the data file at `path`.
    pub fn delete_file(&mut self, path: impl Into<String>) -> &mut Self {
        self.deleted.push(path.into());
        self
    }

    /// Commit the overwrite, returns the new version of the table.
    pub async fn commit(&self) -> Result<Table> {
        commit(&self.table, self).await
    }
}

#[async_trait]
impl PendingUpdate for Overwrite {
    fn operation(&self) -> &'static str {
        "overwrite"
    }

    async fn validate(&self, _starting: &Table, _current: &Table) -> Result<()> {
        if let Some(file) = self.added.iter().find(|f| f.is_delete()) {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!("{} is a delete file, use a row delta", file.file_path),
            ));
        }
        Ok(())
    }

    async fn apply(&self, base: &Table, written: &mut Vec<String>) -> Result<TableMetadata> {
        let mut producer = SnapshotProducer::new(base, written);
        let snapshot_id = producer.snapshot_id();
        let targets: HashSet<&str> = self.deleted.iter().map(String::as_str).collect();
        let mut matched: HashSet<&str> = HashSet::with_capacity(targets.len());

        producer
            .add_files(ManifestContentType::Data, &self.added)
            .await?;

        for manifest in producer.base_manifests().await? {
            if manifest.content != ManifestContentType::Data || targets.is_empty() {
                producer.keep_manifest(manifest);
                continue;
            }

            let partition_type = base.metadata().partition_type(manifest.partition_spec_id)?;
            let entries: Vec<_> = manifest
                .entries(base.file_io(), partition_type)
                .try_collect()
                .await?;
            if !entries
                .iter()
                .any(|e| e.is_alive() && targets.contains(e.data_file.file_path.as_str()))
            {
                producer.keep_manifest(manifest);
                continue;
            }

            // Every live copy of a removed path is deleted, appends may
            // have added the same path more than once.
            let mut rewritten = Vec::with_capacity(entries.len());
            for mut entry in entries {
                if !entry.is_alive() {
                    continue;
                }
                if let Some(path) = targets.get(entry.data_file.file_path.as_str()) {
                    matched.insert(path);
                    producer.record_removal(&entry.data_file);
                    entry.status = ManifestStatus::Deleted;
                    entry.snapshot_id = Some(snapshot_id);
                } else {
                    entry.status = ManifestStatus::Existing;
                }
                rewritten.push(entry);
            }
            producer
                .write_manifest(
                    manifest.partition_spec_id,
                    ManifestContentType::Data,
                    &rewritten,
                )
                .await?;
        }

        let mut missing: Vec<_> = targets.difference(&matched).copied().collect();
        if !missing.is_empty() {
            missing.sort_unstable();
            return Err(Error::new(
                ErrorKind::ValidationFailed,
                format!("cannot remove files missing from the table: {}", missing.join(", ")),
            ));
        }

        let operation = if self.added.is_empty() {
            SnapshotOperation::Delete
        } else {
            SnapshotOperation::Overwrite
        };
        producer.commit(operation).await
    }
}
