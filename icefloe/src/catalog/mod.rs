//! Catalogs keep the pointer to the current metadata file of each table.
//!
//! The pointer is the only mutable state of a table. Commits swap it with a
//! compare-and-swap on its version, see [`Catalog::swap`].

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, ErrorKind, Result};
use crate::types::{PartitionSpec, Schema};
use crate::Table;

mod io;
pub use io::*;
mod memory;
pub use memory::MemoryCatalog;
mod layer;
pub use layer::CatalogLayer;
#[cfg(feature = "prometheus")]
mod prometheus;
#[cfg(feature = "prometheus")]
pub use self::prometheus::{CatalogMetrics, CatalogPrometheusLayer, PrometheusLayeredCatalog};

/// Namespace of tables
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Namespace {
    /// Levels in namespace.
    pub levels: Vec<String>,
}

impl Namespace {
    /// Creates namespace
    pub fn new(levels: impl IntoIterator<Item = impl ToString>) -> Self {
        Self {
            levels: levels.into_iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.levels.join("."))
    }
}

/// Full qualified name of table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableIdentifier {
    /// Namespace
    pub namespace: Namespace,
    /// Table name
    pub name: String,
}

impl TableIdentifier {
    /// Creates a full qualified table identifier from a list of names, the
    /// last one is the table name.
    pub fn new(names: impl IntoIterator<Item = impl ToString>) -> Result<Self> {
        let mut levels: Vec<String> = names.into_iter().map(|s| s.to_string()).collect();
        let name = levels.pop().ok_or_else(|| {
            Error::new(ErrorKind::DataInvalid, "Table identifier can't be empty!")
        })?;

        Ok(Self {
            namespace: Namespace { levels },
            name,
        })
    }

    /// Location of the table relative to the warehouse root.
    pub fn to_path(&self) -> String {
        self.namespace
            .levels
            .iter()
            .chain(std::iter::once(&self.name))
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl Display for TableIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.namespace.levels.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.namespace, self.name)
        }
    }
}

/// Current metadata file of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataPointer {
    /// Absolute location of the metadata file.
    pub location: String,
    /// Bumped by one on every successful swap.
    pub version: u64,
}

/// Reference to catalog.
pub type CatalogRef = Arc<dyn Catalog>;

/// Catalog definition.
///
/// Implementations must make [`Catalog::swap`] linearizable per table, it's
/// the only synchronisation commits rely on.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Return catalog's name.
    fn name(&self) -> &str;

    /// Storage holding the metadata files of the tables of this catalog.
    fn file_io(&self) -> FileIO;

    /// Read the metadata pointer of a table.
    async fn current_pointer(self: Arc<Self>, table_name: &TableIdentifier)
        -> Result<MetadataPointer>;

    /// Point the table at `new_location` if its pointer is still at
    /// `expected_version`.
    ///
    /// Fails with [`ErrorKind::CommitConflict`] when the pointer moved.
    async fn swap(
        self: Arc<Self>,
        table_name: &TableIdentifier,
        expected_version: u64,
        new_location: &str,
    ) -> Result<()>;

    /// Creates a table.
    async fn create_table(
        self: Arc<Self>,
        _table_name: &TableIdentifier,
        _schema: &Schema,
        _spec: &PartitionSpec,
        _props: HashMap<String, String>,
    ) -> Result<Table> {
        Err(Error::new(
            ErrorKind::FeatureUnsupported,
            format!("create_table is not supported by {}", self.name()),
        ))
    }

    /// Check table exists.
    async fn table_exists(self: Arc<Self>, _table_name: &TableIdentifier) -> Result<bool> {
        Err(Error::new(
            ErrorKind::FeatureUnsupported,
            format!("table_exists is not supported by {}", self.name()),
        ))
    }

    /// Drop table, `purge` also deletes its files.
    async fn drop_table(
        self: Arc<Self>,
        _table_name: &TableIdentifier,
        _purge: bool,
    ) -> Result<()> {
        Err(Error::new(
            ErrorKind::FeatureUnsupported,
            format!("drop_table is not supported by {}", self.name()),
        ))
    }

    /// Load table.
    async fn load_table(self: Arc<Self>, _table_name: &TableIdentifier) -> Result<Table> {
        Err(Error::new(
            ErrorKind::FeatureUnsupported,
            format!("load_table is not supported by {}", self.name()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_identifier() {
        let ident = TableIdentifier::new(["db", "schema", "t"]).unwrap();
        assert_eq!(ident.namespace, Namespace::new(["db", "schema"]));
        assert_eq!(ident.to_string(), "db.schema.t");
        assert_eq!(ident.to_path(), "db/schema/t");

        let bare = TableIdentifier::new(["t"]).unwrap();
        assert_eq!(bare.to_string(), "t");
        assert_eq!(bare.to_path(), "t");

        let err = TableIdentifier::new(Vec::<String>::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataInvalid);
    }
}
