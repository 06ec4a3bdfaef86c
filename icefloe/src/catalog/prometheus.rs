//! Catalog wrapper exporting prometheus metrics.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use prometheus::core::{AtomicU64, GenericCounter};
use prometheus::{
    histogram_opts, opts, register_histogram_with_registry,
    register_int_counter_with_registry, Histogram, Registry,
};

use super::{Catalog, CatalogLayer, CatalogRef, FileIO, MetadataPointer};
use crate::error::{Error, ErrorKind, Result};
use crate::types::{PartitionSpec, Schema};
use crate::{Table, TableIdentifier};

/// Metrics of catalog calls.
#[derive(Clone)]
pub struct CatalogMetrics {
    /// Table loads.
    pub load_table_qps: GenericCounter<AtomicU64>,
    /// Latency of table loads.
    pub load_table_latency: Histogram,
    /// Pointer swaps.
    pub swap_qps: GenericCounter<AtomicU64>,
    /// Pointer swaps rejected because the pointer moved.
    pub swap_conflicts: GenericCounter<AtomicU64>,
    /// Latency of pointer swaps.
    pub swap_latency: Histogram,
}

impl CatalogMetrics {
    /// Register catalog metrics in `registry`.
    pub fn new(registry: &Registry) -> Result<Self> {
        let registry_error = |e: prometheus::Error| {
            Error::new(ErrorKind::Unexpected, "Failed to register catalog metrics").set_source(e)
        };

        Ok(Self {
            load_table_qps: register_int_counter_with_registry!(
                opts!("icefloe_catalog_load_table_qps", "Number of table loads"),
                registry
            )
            .map_err(registry_error)?,
            load_table_latency: register_histogram_with_registry!(
                histogram_opts!(
                    "icefloe_catalog_load_table_latency",
                    "Latency of table loads in seconds"
                ),
                registry
            )
            .map_err(registry_error)?,
            swap_qps: register_int_counter_with_registry!(
                opts!("icefloe_catalog_swap_qps", "Number of pointer swaps"),
                registry
            )
            .map_err(registry_error)?,
            swap_conflicts: register_int_counter_with_registry!(
                opts!(
                    "icefloe_catalog_swap_conflicts",
                    "Pointer swaps lost to another writer"
                ),
                registry
            )
            .map_err(registry_error)?,
            swap_latency: register_histogram_with_registry!(
                histogram_opts!(
                    "icefloe_catalog_swap_latency",
                    "Latency of pointer swaps in seconds"
                ),
                registry
            )
            .map_err(registry_error)?,
        })
    }
}

/// Layer exporting [`CatalogMetrics`] of the wrapped catalog.
#[derive(Clone)]
pub struct CatalogPrometheusLayer {
    metrics: CatalogMetrics,
}

impl CatalogPrometheusLayer {
    /// Create the layer.
    pub fn new(metrics: CatalogMetrics) -> Self {
        Self { metrics }
    }
}

impl CatalogLayer for CatalogPrometheusLayer {
    type LayeredCatalog = PrometheusLayeredCatalog;

    fn layer(&self, catalog: CatalogRef) -> Arc<Self::LayeredCatalog> {
        Arc::new(PrometheusLayeredCatalog {
            inner: catalog,
            metrics: self.metrics.clone(),
        })
    }
}

/// Catalog wrapped by [`CatalogPrometheusLayer`].
pub struct PrometheusLayeredCatalog {
    inner: CatalogRef,
    metrics: CatalogMetrics,
}

#[async_trait]
impl Catalog for PrometheusLayeredCatalog {
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
        self.metrics.swap_qps.inc();
        let _timer = self.metrics.swap_latency.start_timer();
        let res = self
            .inner
            .clone()
            .swap(table_name, expected_version, new_location)
            .await;
        if matches!(&res, Err(e) if e.kind() == ErrorKind::CommitConflict) {
            self.metrics.swap_conflicts.inc();
        }
        res
    }

    async fn create_table(
        self: Arc<Self>,
        table_name: &TableIdentifier,
        schema: &Schema,
        spec: &PartitionSpec,
        props: HashMap<String, String>,
    ) -> Result<Table> {
        self.inner
            .clone()
            .create_table(table_name, schema, spec, props)
            .await?;
        Table::load(self, table_name.clone()).await
    }

    async fn table_exists(self: Arc<Self>, table_name: &TableIdentifier) -> Result<bool> {
        self.inner.clone().table_exists(table_name).await
    }

    async fn drop_table(self: Arc<Self>, table_name: &TableIdentifier, purge: bool) -> Result<()> {
        self.inner.clone().drop_table(table_name, purge).await
    }

    async fn load_table(self: Arc<Self>, table_name: &TableIdentifier) -> Result<Table> {
        self.metrics.load_table_qps.inc();
        let _timer = self.metrics.load_table_latency.start_timer();
        Table::load(self.clone(), table_name.clone()).await
    }
}
