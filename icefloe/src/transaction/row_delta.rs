use std::collections::HashSet;

use async_trait::async_trait;
use futures::TryStreamExt;
use log::debug;

use super::{commit, PendingUpdate, SnapshotProducer};
use crate::error::{Error, ErrorKind, Result};
use crate::io::ManifestIndex;
use crate::types::{DataFile, ManifestContentType, SnapshotOperation, TableMetadata};
use crate::Table;

/// Add data files and delete files in one snapshot.
///
/// Deletes written against a given set of data files can ask the commit
/// to check those files are still there, and that no data was appended
/// concurrently that the deletes would miss.
pub struct RowDelta {
    table: Table,
    rows: Vec<DataFile>,
    deletes: Vec<DataFile>,
    referenced: Vec<String>,
    fail_on_concurrent_appends: bool,
}

impl RowDelta {
    pub(crate) fn new(table: Table) -> Self {
        Self {
            table,
            rows: vec![],
            deletes: vec![],
            referenced: vec![],
            fail_on_concurrent_appends: false,
        }
    }

    /// Add a data file.
    pub fn add_rows(&mut self, file: DataFile) -> &mut Self {
        self.rows.push(file);
        self
    }

    /// Add a position or equality delete file.
    pub fn add_deletes(&mut self, file: DataFile) -> &mut Self {
        self.deletes.push(file);
        self
    }

    /// Fail the commit if one of `paths` is no longer a live data file.
    pub fn validate_data_files_exist(
        &mut self,
        paths: impl IntoIterator<Item = impl Into<String>>,
    ) -> &mut Self {
        self.referenced.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Fail the commit if data files were appended since this row delta
    /// was created.
    pub fn validate_no_conflicting_appends(&mut self) -> &mut Self {
        self.fail_on_concurrent_appends = true;
        self
    }

    /// Commit the row delta, returns the new version of the table.
    pub async fn commit(&self) -> Result<Table> {
        commit(&self.table, self).await
    }

    async fn check_referenced_files(&self, current: &Table) -> Result<()> {
        let Some(snapshot) = current.current_snapshot()? else {
            return Err(missing_files(self.referenced.iter()));
        };

        let mut missing: HashSet<&str> = self.referenced.iter().map(String::as_str).collect();
        let mut manifests =
            ManifestIndex::for_snapshot(current.file_io(), snapshot).data_manifests();
        while let Some(manifest) = manifests.try_next().await? {
            let partition_type = current
                .metadata()
                .partition_type(manifest.partition_spec_id)?;
            let mut entries = manifest.live_entries(current.file_io(), partition_type);
            while let Some(entry) = entries.try_next().await? {
                missing.remove(entry.data_file.file_path.as_str());
            }
            if missing.is_empty() {
                return Ok(());
            }
        }
        Err(missing_files(missing.into_iter()))
    }

    fn check_concurrent_appends(&self, starting: &Table, current: &Table) -> Result<()> {
        let Some(current_id) = current.metadata().current_snapshot_id else {
            return Ok(());
        };
        let starting_id = starting.metadata().current_snapshot_id;

        let appended = current
            .metadata()
            .ancestors_of(current_id)
            .take_while(|s| Some(s.snapshot_id) != starting_id)
            .find(|s| s.added_data_files() > 0);
        match appended {
            Some(snapshot) => Err(Error::new(
                ErrorKind::ValidationFailed,
                format!(
                    "snapshot {} added data files concurrently",
                    snapshot.snapshot_id
                ),
            )),
            None => Ok(()),
        }
    }
}

fn missing_files<S: AsRef<str>>(paths: impl Iterator<Item = S>) -> Error {
    let mut paths: Vec<String> = paths.map(|p| p.as_ref().to_string()).collect();
    paths.sort_unstable();
    Error::new(
        ErrorKind::ValidationFailed,
        format!("data files no longer exist: {}", paths.join(", ")),
    )
}

#[async_trait]
impl PendingUpdate for RowDelta {
    fn operation(&self) -> &'static str {
        "row-delta"
    }

    async fn validate(&self, starting: &Table, current: &Table) -> Result<()> {
        if let Some(file) = self.rows.iter().find(|f| f.is_delete()) {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!("{} is a delete file, add it with add_deletes", file.file_path),
            ));
        }
        if let Some(file) = self.deletes.iter().find(|f| !f.is_delete()) {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!("{} is a data file, add it with add_rows", file.file_path),
            ));
        }

        if self.fail_on_concurrent_appends {
            self.check_concurrent_appends(starting, current)?;
        }
        if !self.referenced.is_empty() {
            self.check_referenced_files(current).await?;
        }
        debug!(
            "Row delta on {} validated against version {}",
            current.identifier(),
            current.version()
        );
        Ok(())
    }

    async fn apply(&self, base: &Table, written: &mut Vec<String>) -> Result<TableMetadata> {
        let mut producer = SnapshotProducer::new(base, written);
        producer
            .add_files(ManifestContentType::Data, &self.rows)
            .await?;
        producer
            .add_files(ManifestContentType::Deletes, &self.deletes)
            .await?;
        for manifest in producer.base_manifests().await? {
            producer.keep_manifest(manifest);
        }

        let operation = match (self.rows.is_empty(), self.deletes.is_empty()) {
            (false, true) => SnapshotOperation::Append,
            (true, false) => SnapshotOperation::Delete,
            _ => SnapshotOperation::Overwrite,
        };
        producer.commit(operation).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::catalog::{Catalog, MemoryCatalog, TableIdentifier};
    use crate::types::{DataContentType, Field, PartitionSpec, Primitive, Schema, Struct};

    async fn table() -> Result<Table> {
        let catalog = Arc::new(MemoryCatalog::new("memory", "memory://wh")?);
        catalog
            .create_table(
                &TableIdentifier::new(["t"])?,
                &Schema::new(
                    0,
                    None,
                    Struct::new(vec![Field::required(1, "id", Primitive::Long).into()]),
                ),
                &PartitionSpec::unpartitioned(),
                HashMap::from([
                    ("commit.retry.min-wait-ms".to_string(), "1".to_string()),
                    ("commit.retry.max-wait-ms".to_string(), "2".to_string()),
                ]),
            )
            .await
    }

    fn file(content: DataContentType, name: &str) -> DataFile {
        DataFile::builder()
            .with_content(content)
            .with_file_path(format!("memory://wh/t/data/{name}"))
            .with_record_count(1)
            .with_file_size_in_bytes(10)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_row_delta_operations() -> Result<()> {
        let table = table().await?;
        let table = table
            .new_row_delta()
            .add_rows(file(DataContentType::Data, "a"))
            .commit()
            .await?;
        assert_eq!(table.current_snapshot()?.unwrap().operation(), Some("append"));

        let table = table
            .new_row_delta()
            .add_deletes(file(DataContentType::PositionDeletes, "d"))
            .validate_data_files_exist(["memory://wh/t/data/a"])
            .commit()
            .await?;
        let snapshot = table.current_snapshot()?.unwrap();
        assert_eq!(snapshot.operation(), Some("delete"));
        assert_eq!(snapshot.summary["total-delete-files"], "1");
        Ok(())
    }

    #[tokio::test]
    async fn test_removed_data_file_fails_commit() -> Result<()> {
        let table = table()
            .await?
            .new_fast_append()
            .append_file(file(DataContentType::Data, "a"))
            .commit()
            .await?;

        let mut delta = table.new_row_delta();
        delta
            .add_deletes(file(DataContentType::EqualityDeletes, "d"))
            .validate_data_files_exist(["memory://wh/t/data/a"]);

        table
            .new_overwrite()
            .delete_file("memory://wh/t/data/a")
            .commit()
            .await?;

        let err = delta.commit().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommitFailed);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_append_fails_commit() -> Result<()> {
        let table = table().await?;
        let mut delta = table.new_row_delta();
        delta
            .add_deletes(file(DataContentType::EqualityDeletes, "d"))
            .validate_no_conflicting_appends();

        table
            .new_fast_append()
            .append_file(file(DataContentType::Data, "a"))
            .commit()
            .await?;

        let err = delta.commit().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommitFailed);
        Ok(())
    }
}
