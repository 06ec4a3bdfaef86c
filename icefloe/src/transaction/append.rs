use async_trait::async_trait;

use super::{commit, PendingUpdate, SnapshotProducer};
use crate::error::{Error, ErrorKind, Result};
use crate::types::{DataContentType, DataFile, ManifestContentType, SnapshotOperation, TableMetadata};
use crate::Table;

/// Append data files in a new manifest.
///
/// Manifests of the base snapshot are kept as they are, so appending never
/// conflicts with concurrent changes: on conflict the new manifest is
/// simply added on top of the new current snapshot.
pub struct FastAppend {
    table: Table,
    files: Vec<DataFile>,
}

impl FastAppend {
    pub(crate) fn new(table: Table) -> Self {
        Self {
            table,
            files: vec![],
        }
    }

    /// Add a data file.
    pub fn append_file(&mut self, file: DataFile) -> &mut Self {
        self.files.push(file);
        self
    }

    /// Add several data files.
    pub fn append_files(&mut self, files: impl IntoIterator<Item = DataFile>) -> &mut Self {
        self.files.extend(files);
        self
    }

    /// Commit the append, returns the new version of the table.
    pub async fn commit(&self) -> Result<Table> {
        commit(&self.table, self).await
    }
}

#[async_trait]
impl PendingUpdate for FastAppend {
    fn operation(&self) -> &'static str {
        "append"
    }

    async fn validate(&self, _starting: &Table, _current: &Table) -> Result<()> {
        match self.files.iter().find(|f| f.content != DataContentType::Data) {
            Some(file) => Err(Error::new(
                ErrorKind::DataInvalid,
                format!("{} is a delete file, use a row delta", file.file_path),
            )),
            None => Ok(()),
        }
    }

    async fn apply(&self, base: &Table, written: &mut Vec<String>) -> Result<TableMetadata> {
        let mut producer = SnapshotProducer::new(base, written);
        producer
            .add_files(ManifestContentType::Data, &self.files)
            .await?;
        for manifest in producer.base_manifests().await? {
            producer.keep_manifest(manifest);
        }
        producer.commit(SnapshotOperation::Append).await
    }
}
