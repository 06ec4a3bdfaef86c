//! Catalog layer.

use std::sync::Arc;

use super::{Catalog, CatalogRef};

/// Wraps a catalog into another one, e.g. to export metrics.
///
/// Layered catalogs should load tables through themselves, tables then
/// commit through the layer.
pub trait CatalogLayer {
    /// Result of layering a catalog.
    type LayeredCatalog: Catalog;

    /// Layering a catalog.
    fn layer(&self, catalog: CatalogRef) -> Arc<Self::LayeredCatalog>;
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::catalog::{FileIO, MemoryCatalog, MetadataPointer, TableIdentifier};
    use crate::types::{DataFile, Field, PartitionSpec, Primitive, Schema, Struct};
    use crate::{Result, Table};

    struct SwapCountingLayer;

    struct SwapCountingCatalog {
        inner: CatalogRef,
        swaps: AtomicUsize,
    }

    impl CatalogLayer for SwapCountingLayer {
        type LayeredCatalog = SwapCountingCatalog;

        fn layer(&self, catalog: CatalogRef) -> Arc<SwapCountingCatalog> {
            Arc::new(SwapCountingCatalog {
                inner: catalog,
                swaps: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Catalog for SwapCountingCatalog {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn file_io(&self) -> FileIO {
            self.inner.file_io()
        }

        async fn current_pointer(
            self: Arc<Self>,
            table_name: &TableIdentifier,
        ) -> Result<MetadataPointer> {
            self.inner.clone().current_pointer(table_name).await
        }

        async fn swap(
            self: Arc<Self>,
            table_name: &TableIdentifier,
            expected_version: u64,
            new_location: &str,
        ) -> Result<()> {
            self.swaps.fetch_add(1, Ordering::SeqCst);
            self.inner
                .clone()
                .swap(table_name, expected_version, new_location)
                .await
        }

        async fn load_table(self: Arc<Self>, table_name: &TableIdentifier) -> Result<Table> {
            Table::load(self, table_name.clone()).await
        }
    }

    #[tokio::test]
    async fn test_tables_commit_through_layer() -> Result<()> {
        let inner = Arc::new(MemoryCatalog::new("memory", "memory://wh")?);
        let ident = TableIdentifier::new(["t"])?;
        inner
            .clone()
            .create_table(
                &ident,
                &Schema::new(
                    0,
                    None,
                    Struct::new(vec![Field::required(1, "id", Primitive::Long).into()]),
                ),
                &PartitionSpec::unpartitioned(),
                HashMap::new(),
            )
            .await?;

        let layered = SwapCountingLayer.layer(inner);
        let table = layered.clone().load_table(&ident).await?;
        table
            .new_fast_append()
            .append_file(
                DataFile::builder()
                    .with_file_path("memory://wh/t/data/a.parquet")
                    .with_record_count(1)
                    .with_file_size_in_bytes(10)
                    .build()?,
            )
            .commit()
            .await?;

        assert_eq!(layered.swaps.load(Ordering::SeqCst), 1);
        Ok(())
    }
}
