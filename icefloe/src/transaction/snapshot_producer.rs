use chrono::Utc;
use futures::TryStreamExt;
use log::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::io::ManifestIndex;
use crate::table::META_ROOT_PATH;
use crate::types::{
    DataFile, ManifestContentType, ManifestEntry, ManifestListEntry, ManifestListMetadata,
    ManifestListWriter, ManifestMetadata, ManifestStatus, ManifestWriter, Snapshot,
    SnapshotOperation, SnapshotSummaryBuilder, TableMetadata,
};
use crate::Table;

/// Builds the next snapshot of a base version: writes its manifests and
/// manifest list, then adds it to a copy of the base metadata.
pub(crate) struct SnapshotProducer<'a> {
    base: &'a Table,
    written: &'a mut Vec<String>,
    commit_uuid: Uuid,
    manifest_count: usize,
    snapshot_id: i64,
    sequence_number: i64,
    new_manifests: Vec<ManifestListEntry>,
    kept_manifests: Vec<ManifestListEntry>,
    summary: SnapshotSummaryBuilder,
}

impl<'a> SnapshotProducer<'a> {
    pub(crate) fn new(base: &'a Table, written: &'a mut Vec<String>) -> Self {
        let metadata = base.metadata();
        let snapshot_id = metadata
            .snapshots()
            .iter()
            .map(|s| s.snapshot_id)
            .max()
            .map_or(1, |id| id + 1);

        Self {
            base,
            written,
            commit_uuid: Uuid::new_v4(),
            manifest_count: 0,
            snapshot_id,
            sequence_number: metadata.last_sequence_number + 1,
            new_manifests: vec![],
            kept_manifests: vec![],
            summary: SnapshotSummaryBuilder::new(),
        }
    }

    pub(crate) fn snapshot_id(&self) -> i64 {
        self.snapshot_id
    }

    /// Manifests of the current snapshot of the base, all contents.
    pub(crate) async fn base_manifests(&self) -> Result<Vec<ManifestListEntry>> {
        match self.base.current_snapshot()? {
            Some(snapshot) => {
                ManifestIndex::for_snapshot(self.base.file_io(), snapshot)
                    .manifests()
                    .try_collect()
                    .await
            }
            None => Ok(vec![]),
        }
    }

    /// Carry a manifest of the base into the new snapshot unchanged.
    pub(crate) fn keep_manifest(&mut self, manifest: ManifestListEntry) {
        self.kept_manifests.push(manifest);
    }

    /// Record the removal of a data file in the summary.
    pub(crate) fn record_removal(&mut self, file: &DataFile) {
        self.summary.remove(file);
    }

    /// Write new files into one manifest of the default spec.
    pub(crate) async fn add_files(
        &mut self,
        content: ManifestContentType,
        files: &[DataFile],
    ) -> Result<()> {
        if files.is_empty() {
            return Ok(());
        }

        let spec_id = self.base.metadata().default_spec_id;
        let entries = files
            .iter()
            .map(|file| {
                self.summary.add(file);
                let mut data_file = file.clone();
                data_file.spec_id = spec_id;
                ManifestEntry {
                    status: ManifestStatus::Added,
                    snapshot_id: Some(self.snapshot_id),
                    sequence_number: None,
                    file_sequence_number: None,
                    data_file,
                }
            })
            .collect::<Vec<_>>();
        self.write_manifest(spec_id, content, &entries).await
    }

    /// Write `entries` into a new manifest of the spec `spec_id`.
    pub(crate) async fn write_manifest(
        &mut self,
        spec_id: i32,
        content: ManifestContentType,
        entries: &[ManifestEntry],
    ) -> Result<()> {
        let metadata = self.base.metadata();
        let spec = metadata.partition_spec(spec_id).ok_or_else(|| {
            crate::Error::new(
                crate::ErrorKind::DataInvalid,
                format!("Partition spec id {spec_id} not found!"),
            )
        })?;

        self.manifest_count += 1;
        let path = format!(
            "{}/{META_ROOT_PATH}/{}-m{}.json",
            metadata.location, self.commit_uuid, self.manifest_count
        );
        let mut writer = ManifestWriter::new(
            ManifestMetadata {
                schema: metadata.current_schema()?.clone(),
                partition_spec: spec.clone(),
                format_version: metadata.format_version,
                content,
            },
            self.base.file_io().clone(),
            path.clone(),
            self.snapshot_id,
            self.sequence_number,
        )?;
        for entry in entries {
            writer.add_entry(entry)?;
        }

        // Registered before writing so a partial file is cleaned up too.
        self.written.push(path.clone());
        let manifest = writer.finish().await?;
        debug!("Wrote manifest {path} with {} entries", entries.len());
        self.new_manifests.push(manifest);
        Ok(())
    }

    /// Write the manifest list and return the base metadata with the new
    /// snapshot as current snapshot.
    pub(crate) async fn commit(self, operation: SnapshotOperation) -> Result<TableMetadata> {
        let base_metadata = self.base.metadata();
        let parent = base_metadata.current_snapshot()?;

        let manifest_list = format!(
            "{}/{META_ROOT_PATH}/snap-{}-{}.json",
            base_metadata.location, self.snapshot_id, self.commit_uuid
        );
        let mut writer = ManifestListWriter::new(
            self.base.file_io().clone(),
            manifest_list.clone(),
            &ManifestListMetadata {
                format_version: 2,
                snapshot_id: self.snapshot_id,
                parent_snapshot_id: parent.map(|p| p.snapshot_id),
                sequence_number: self.sequence_number,
            },
        )?;
        for manifest in self.new_manifests.iter().chain(&self.kept_manifests) {
            writer.add_entry(manifest)?;
        }
        self.written.push(manifest_list.clone());
        writer.finish().await?;

        let snapshot = Snapshot {
            snapshot_id: self.snapshot_id,
            parent_snapshot_id: parent.map(|p| p.snapshot_id),
            sequence_number: self.sequence_number,
            timestamp_ms: Utc::now()
                .timestamp_millis()
                .max(base_metadata.last_updated_ms),
            manifest_list,
            summary: self
                .summary
                .merge(operation, parent.map(|p| &p.summary))?,
            schema_id: Some(base_metadata.current_schema_id as i64),
        };

        let mut metadata = base_metadata.clone();
        metadata.add_snapshot(snapshot)?;
        metadata.set_current_snapshot(self.snapshot_id)?;
        Ok(metadata)
    }
}
