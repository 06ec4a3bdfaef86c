//! Catalog keeping metadata pointers in process memory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use log::{debug, info};

use super::{Catalog, FileIO, MetadataPointer, TableIdentifier};
use crate::error::{Error, ErrorKind, Result};
use crate::types::{parse_table_metadata, PartitionSpec, Schema, TableMetadata};
use crate::Table;

/// Catalog whose pointers live in a map guarded by a mutex.
///
/// Metadata files are stored through [`FileIO`] under
/// `{warehouse}/{namespace}/{table}`. Tables created through one catalog
/// share its storage, so several handles on the same table only see each
/// other's commits through the same `MemoryCatalog`.
pub struct MemoryCatalog {
    name: String,
    io: FileIO,
    tables: Mutex<HashMap<TableIdentifier, MetadataPointer>>,
}

impl MemoryCatalog {
    /// Create a catalog storing tables under `warehouse`.
    pub fn new(name: impl Into<String>, warehouse: &str) -> Result<Self> {
        Ok(Self::with_file_io(name, FileIO::from_path(warehouse)?))
    }

    /// Create a catalog storing tables through `io`.
    pub fn with_file_io(name: impl Into<String>, io: FileIO) -> Self {
        Self {
            name: name.into(),
            io,
            tables: Mutex::new(HashMap::new()),
        }
    }

    fn tables(&self) -> MutexGuard<'_, HashMap<TableIdentifier, MetadataPointer>> {
        self.tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn no_such_table(table_name: &TableIdentifier) -> Error {
        Error::new(
            ErrorKind::NoSuchTable,
            format!("Table {table_name} doesn't exist"),
        )
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    fn file_io(&self) -> FileIO {
        self.io.clone()
    }

    async fn current_pointer(
        self: Arc<Self>,
        table_name: &TableIdentifier,
    ) -> Result<MetadataPointer> {
        self.tables()
            .get(table_name)
            .cloned()
            .ok_or_else(|| Self::no_such_table(table_name))
    }

    async fn swap(
        self: Arc<Self>,
        table_name: &TableIdentifier,
        expected_version: u64,
        new_location: &str,
    ) -> Result<()> {
        let mut tables = self.tables();
        let pointer = tables
            .get_mut(table_name)
            .ok_or_else(|| Self::no_such_table(table_name))?;

        if pointer.version != expected_version {
            return Err(Error::new(
                ErrorKind::CommitConflict,
                format!(
                    "Table {table_name} is at version {}, expected {expected_version}",
                    pointer.version
                ),
            ));
        }

        debug!(
            "Swapping {table_name} from {} to {new_location}",
            pointer.location
        );
        *pointer = MetadataPointer {
            location: new_location.to_string(),
            version: expected_version + 1,
        };
        Ok(())
    }

    async fn create_table(
        self: Arc<Self>,
        table_name: &TableIdentifier,
        schema: &Schema,
        spec: &PartitionSpec,
        props: HashMap<String, String>,
    ) -> Result<Table> {
        if self.tables().contains_key(table_name) {
            return Err(Error::new(
                ErrorKind::TableAlreadyExists,
                format!("Table {table_name} already exists"),
            ));
        }

        let location = self.io.absolute_path(&table_name.to_path());
        let metadata = TableMetadata::new(location, schema.clone(), spec.clone(), props)?;
        let metadata_location = Table::write_metadata(&self.io, &metadata, 0).await?;

        // Another creation may have won while the metadata was written.
        let inserted = {
            let mut tables = self.tables();
            if tables.contains_key(table_name) {
                false
            } else {
                tables.insert(
                    table_name.clone(),
                    MetadataPointer {
                        location: metadata_location.clone(),
                        version: 0,
                    },
                );
                true
            }
        };
        if !inserted {
            self.io.delete(&metadata_location).await?;
            return Err(Error::new(
                ErrorKind::TableAlreadyExists,
                format!("Table {table_name} already exists"),
            ));
        }

        info!("Created table {table_name} at {}", metadata.location);
        Table::load(self, table_name.clone()).await
    }

    async fn table_exists(self: Arc<Self>, table_name: &TableIdentifier) -> Result<bool> {
        Ok(self.tables().contains_key(table_name))
    }

    async fn drop_table(self: Arc<Self>, table_name: &TableIdentifier, purge: bool) -> Result<()> {
        let pointer = self
            .tables()
            .remove(table_name)
            .ok_or_else(|| Self::no_such_table(table_name))?;

        if purge {
            let metadata = parse_table_metadata(&self.io.read(&pointer.location).await?)?;
            self.io.delete_dir(&metadata.location).await?;
        }
        info!("Dropped table {table_name}");
        Ok(())
    }

    async fn load_table(self: Arc<Self>, table_name: &TableIdentifier) -> Result<Table> {
        Table::load(self, table_name.clone()).await
    }
}
