use std::collections::HashMap;

use async_trait::async_trait;

use super::{commit, PendingUpdate};
use crate::config::TableConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::types::TableMetadata;
use crate::Table;

/// Set and remove table properties.
pub struct UpdateProperties {
    table: Table,
    updates: HashMap<String, String>,
    removals: Vec<String>,
}

impl UpdateProperties {
    pub(crate) fn new(table: Table) -> Self {
        Self {
            table,
            updates: HashMap::new(),
            removals: vec![],
        }
    }

    /// Set `key` to `value`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.updates.insert(key.into(), value.into());
        self
    }

    /// Remove `key`.
    pub fn remove(&mut self, key: impl Into<String>) -> &mut Self {
        self.removals.push(key.into());
        self
    }

    /// Commit the properties, returns the new version of the table.
    pub async fn commit(&self) -> Result<Table> {
        commit(&self.table, self).await
    }
}

#[async_trait]
impl PendingUpdate for UpdateProperties {
    fn operation(&self) -> &'static str {
        "update-properties"
    }

    async fn validate(&self, _starting: &Table, _current: &Table) -> Result<()> {
        if let Some(key) = self.removals.iter().find(|k| self.updates.contains_key(*k)) {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!("property {key} is both set and removed"),
            ));
        }
        Ok(())
    }

    async fn apply(&self, base: &Table, _written: &mut Vec<String>) -> Result<TableMetadata> {
        let mut metadata = base.metadata().clone();
        metadata.remove_properties(&self.removals);
        metadata.set_properties(self.updates.clone());
        // Reject properties the new version couldn't be loaded with.
        TableConfig::try_from(&metadata.properties)?;
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::{Catalog, MemoryCatalog, TableIdentifier};
    use crate::types::{Field, PartitionSpec, Primitive, Schema, Struct};

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
                HashMap::from([("owner".to_string(), "etl".to_string())]),
            )
            .await
    }

    #[tokio::test]
    async fn test_update_properties() -> Result<()> {
        let table = table()
            .await?
            .update_properties()
            .set(TableConfig::COMMIT_NUM_RETRIES, "9")
            .remove("owner")
            .commit()
            .await?;

        assert_eq!(table.version(), 1);
        assert_eq!(table.config().commit_retry.num_retries, 9);
        assert!(!table.metadata().properties.contains_key("owner"));
        assert_eq!(table.metadata().metadata_log.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_conflicting_property_changes() -> Result<()> {
        let table = table().await?;
        let err = table
            .update_properties()
            .set("owner", "bi")
            .remove("owner")
            .commit()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataInvalid);

        let err = table
            .update_properties()
            .set(TableConfig::COMMIT_NUM_RETRIES, "lots")
            .commit()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataInvalid);
        Ok(())
    }
}
