use std::sync::Arc;

use uuid::Uuid;

use crate::catalog::{CatalogRef, FileIO, MetadataPointer, TableIdentifier};
use crate::config::{TableConfig, TableConfigRef};
use crate::error::Result;
use crate::io::TableScanBuilder;
use crate::metrics::{LoggingMetricsReporter, MetricsReporterRef};
use crate::transaction::{
    FastAppend, Overwrite, RowDelta, UpdatePartitionSpec, UpdateProperties,
};
use crate::types::{parse_table_metadata, serialize_table_meta, Snapshot, TableMetadata};

pub(crate) const META_ROOT_PATH: &str = "metadata";
pub(crate) const METADATA_FILE_EXTENSION: &str = ".metadata.json";

/// One version of a table.
///
/// A `Table` never changes: commits return the new version and leave this
/// one untouched. Use [`Table::refresh`] to see what other writers
/// committed.
#[derive(Clone)]
pub struct Table {
    ident: TableIdentifier,
    catalog: CatalogRef,
    io: FileIO,
    pointer: MetadataPointer,
    metadata: Arc<TableMetadata>,
    config: TableConfigRef,
    reporter: MetricsReporterRef,
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("ident", &self.ident)
            .field("catalog", &self.catalog.name())
            .field("pointer", &self.pointer)
            .finish_non_exhaustive()
    }
}

impl Table {
    /// Load the version the catalog currently points at.
    ///
    /// Catalogs implement [`Catalog::load_table`](crate::catalog::Catalog::load_table)
    /// with this, the loaded table commits through `catalog`.
    pub async fn load(catalog: CatalogRef, ident: TableIdentifier) -> Result<Table> {
        let pointer = catalog.clone().current_pointer(&ident).await?;
        let io = catalog.file_io();
        let metadata = parse_table_metadata(&io.read(&pointer.location).await?)?;
        Table::from_parts(
            ident,
            catalog,
            io,
            pointer,
            metadata,
            Arc::new(LoggingMetricsReporter),
        )
    }

    pub(crate) fn from_parts(
        ident: TableIdentifier,
        catalog: CatalogRef,
        io: FileIO,
        pointer: MetadataPointer,
        metadata: TableMetadata,
        reporter: MetricsReporterRef,
    ) -> Result<Table> {
        let config = Arc::new(TableConfig::try_from(&metadata.properties)?);
        Ok(Table {
            ident,
            catalog,
            io,
            pointer,
            metadata: Arc::new(metadata),
            config,
            reporter,
        })
    }

    /// Send scan and commit reports of this table, and of the versions
    /// committed from it, to `reporter`.
    pub fn with_metrics_reporter(mut self, reporter: MetricsReporterRef) -> Self {
        self.reporter = reporter;
        self
    }

    /// Load the latest version of this table.
    pub async fn refresh(&self) -> Result<Table> {
        Ok(Table::load(self.catalog.clone(), self.ident.clone())
            .await?
            .with_metrics_reporter(self.reporter.clone()))
    }

    /// Name of the table.
    pub fn identifier(&self) -> &TableIdentifier {
        &self.ident
    }

    /// Metadata of this version.
    pub fn metadata(&self) -> &TableMetadata {
        &self.metadata
    }

    /// Location of the metadata file of this version.
    pub fn metadata_location(&self) -> &str {
        &self.pointer.location
    }

    /// Pointer version of this table version in the catalog.
    pub fn version(&self) -> u64 {
        self.pointer.version
    }

    /// Configuration parsed from the table properties.
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Storage of the table files.
    pub fn file_io(&self) -> &FileIO {
        &self.io
    }

    /// Current snapshot, `None` before the first commit.
    pub fn current_snapshot(&self) -> Result<Option<&Snapshot>> {
        self.metadata.current_snapshot()
    }

    pub(crate) fn catalog(&self) -> CatalogRef {
        self.catalog.clone()
    }

    pub(crate) fn metrics_reporter(&self) -> MetricsReporterRef {
        self.reporter.clone()
    }

    /// Plan a scan of this version.
    pub fn new_scan(&self) -> TableScanBuilder {
        TableScanBuilder::default().with_table(self.clone())
    }

    /// Append data files, keeping existing manifests as they are.
    pub fn new_fast_append(&self) -> FastAppend {
        FastAppend::new(self.clone())
    }

    /// Same as [`Table::new_fast_append`].
    pub fn new_append(&self) -> FastAppend {
        self.new_fast_append()
    }

    /// Replace data files.
    pub fn new_overwrite(&self) -> Overwrite {
        Overwrite::new(self.clone())
    }

    /// Add data and delete files together.
    pub fn new_row_delta(&self) -> RowDelta {
        RowDelta::new(self.clone())
    }

    /// Change the partition spec of new data.
    pub fn update_spec(&self) -> UpdatePartitionSpec {
        UpdatePartitionSpec::new(self.clone())
    }

    /// Set or remove table properties.
    pub fn update_properties(&self) -> UpdateProperties {
        UpdateProperties::new(self.clone())
    }

    /// Location of the metadata file of `version`, unique per call.
    pub(crate) fn new_metadata_location(table_location: &str, version: u64) -> String {
        format!(
            "{}/{META_ROOT_PATH}/{version:05}-{}{METADATA_FILE_EXTENSION}",
            table_location.trim_end_matches('/'),
            Uuid::new_v4()
        )
    }

    /// Write `metadata` as the metadata file of `version`, returns its
    /// location.
    pub(crate) async fn write_metadata(
        io: &FileIO,
        metadata: &TableMetadata,
        version: u64,
    ) -> Result<String> {
        let location = Table::new_metadata_location(&metadata.location, version);
        io.write(&location, serialize_table_meta(metadata)?.into_bytes())
            .await?;
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::catalog::{Catalog, MemoryCatalog};
    use crate::types::{Field, PartitionSpec, Primitive, Schema, Struct};

    fn schema() -> Schema {
        Schema::new(
            0,
            None,
            Struct::new(vec![Field::required(1, "id", Primitive::Long).into()]),
        )
    }

    #[test]
    fn test_metadata_location() {
        let location = Table::new_metadata_location("memory://wh/db/t/", 7);
        assert!(location.starts_with("memory://wh/db/t/metadata/00007-"));
        assert!(location.ends_with(".metadata.json"));
        assert_ne!(location, Table::new_metadata_location("memory://wh/db/t", 7));
    }

    #[tokio::test]
    async fn test_table_load() -> Result<()> {
        let catalog = Arc::new(MemoryCatalog::new("memory", "memory://wh")?);
        let ident = TableIdentifier::new(["db", "t"])?;
        let created = catalog
            .clone()
            .create_table(
                &ident,
                &schema(),
                &PartitionSpec::unpartitioned(),
                HashMap::from([(TableConfig::COMMIT_NUM_RETRIES.to_string(), "7".to_string())]),
            )
            .await?;

        assert_eq!(created.version(), 0);
        assert_eq!(created.metadata().location, "memory://wh/db/t");
        assert_eq!(created.config().commit_retry.num_retries, 7);
        assert!(created.current_snapshot()?.is_none());

        let loaded = catalog.clone().load_table(&ident).await?;
        assert_eq!(loaded.metadata(), created.metadata());
        assert_eq!(loaded.metadata_location(), created.metadata_location());

        let refreshed = loaded.refresh().await?;
        assert_eq!(refreshed.version(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_table_load_from_fs() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let warehouse = dir.path().to_str().unwrap().to_string();
        let catalog = Arc::new(MemoryCatalog::new("fs", &warehouse)?);
        let ident = TableIdentifier::new(["t"])?;
        let created = catalog
            .clone()
            .create_table(
                &ident,
                &schema(),
                &PartitionSpec::unpartitioned(),
                HashMap::new(),
            )
            .await?;

        let relative = created
            .file_io()
            .relative_path(created.metadata_location())?
            .to_string();
        assert!(dir.path().join(relative).exists());
        Ok(())
    }
}
