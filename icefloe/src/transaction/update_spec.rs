use async_trait::async_trait;

use super::{commit, PendingUpdate};
use crate::error::{Error, ErrorKind, Result};
use crate::types::{PartitionField, Schema, TableMetadata, Transform};
use crate::Table;

enum SpecChange {
    Add {
        source: String,
        transform: Transform,
        name: Option<String>,
    },
    Remove(String),
    Clear,
}

/// Evolve the partition spec new data is written with.
///
/// Files already written keep the spec they were written with. Changes are
/// replayed on the default spec of the version they are committed to.
pub struct UpdatePartitionSpec {
    table: Table,
    case_sensitive: bool,
    changes: Vec<SpecChange>,
}

impl UpdatePartitionSpec {
    pub(crate) fn new(table: Table) -> Self {
        Self {
            table,
            case_sensitive: true,
            changes: vec![],
        }
    }

    /// Whether column names are matched case sensitively, `true` by default.
    pub fn case_sensitive(&mut self, case_sensitive: bool) -> &mut Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Partition by `transform` of the column `source`.
    pub fn add_field(&mut self, source: impl Into<String>, transform: Transform) -> &mut Self {
        self.changes.push(SpecChange::Add {
            source: source.into(),
            transform,
            name: None,
        });
        self
    }

    /// Same as [`UpdatePartitionSpec::add_field`], naming the partition
    /// field `name`.
    pub fn add_named_field(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
        transform: Transform,
    ) -> &mut Self {
        self.changes.push(SpecChange::Add {
            source: source.into(),
            transform,
            name: Some(name.into()),
        });
        self
    }

    /// Stop partitioning by the partition field `name`.
    pub fn remove_field(&mut self, name: impl Into<String>) -> &mut Self {
        self.changes.push(SpecChange::Remove(name.into()));
        self
    }

    /// Drop every partition field.
    pub fn unpartitioned(&mut self) -> &mut Self {
        self.changes.push(SpecChange::Clear);
        self
    }

    /// Commit the new spec, returns the new version of the table.
    pub async fn commit(&self) -> Result<Table> {
        commit(&self.table, self).await
    }

    fn new_fields(&self, metadata: &TableMetadata) -> Result<Vec<PartitionField>> {
        let schema = metadata.current_schema()?;
        let mut fields = metadata.current_partition_spec()?.fields.clone();
        let mut last_partition_id = metadata.last_partition_id;

        for change in &self.changes {
            match change {
                SpecChange::Add {
                    source,
                    transform,
                    name,
                } => {
                    let source_column_id = self.column_id(schema, source)?;
                    if fields
                        .iter()
                        .any(|f| f.source_column_id == source_column_id && f.transform == *transform)
                    {
                        return Err(Error::new(
                            ErrorKind::DataInvalid,
                            format!("already partitioned by {transform} of {source}"),
                        ));
                    }
                    let name = name
                        .clone()
                        .unwrap_or_else(|| default_field_name(source, transform));
                    if fields.iter().any(|f| f.name == name) {
                        return Err(Error::new(
                            ErrorKind::DataInvalid,
                            format!("partition field {name} already exists"),
                        ));
                    }

                    // Fields partitioned the same way before keep their id.
                    let partition_field_id = metadata
                        .partition_specs
                        .iter()
                        .flat_map(|s| &s.fields)
                        .find(|f| f.source_column_id == source_column_id && f.transform == *transform)
                        .map(|f| f.partition_field_id)
                        .unwrap_or_else(|| {
                            last_partition_id += 1;
                            last_partition_id
                        });
                    fields.push(PartitionField {
                        source_column_id,
                        partition_field_id,
                        transform: *transform,
                        name,
                    });
                }
                SpecChange::Remove(name) => {
                    let len = fields.len();
                    fields.retain(|f| &f.name != name);
                    if fields.len() == len {
                        return Err(Error::new(
                            ErrorKind::DataInvalid,
                            format!("partition field {name} doesn't exist"),
                        ));
                    }
                }
                SpecChange::Clear => fields.clear(),
            }
        }
        Ok(fields)
    }

    fn column_id(&self, schema: &Schema, name: &str) -> Result<i32> {
        schema
            .look_up_field_by_name(name, self.case_sensitive)
            .map(|f| f.id)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::DataInvalid,
                    format!("column {name} not found in schema"),
                )
            })
    }
}

fn default_field_name(source: &str, transform: &Transform) -> String {
    match transform {
        Transform::Identity => source.to_string(),
        Transform::Bucket(n) => format!("{source}_bucket_{n}"),
        Transform::Truncate(w) => format!("{source}_trunc_{w}"),
        Transform::Year => format!("{source}_year"),
        Transform::Month => format!("{source}_month"),
        Transform::Day => format!("{source}_day"),
        Transform::Hour => format!("{source}_hour"),
        Transform::Void => format!("{source}_null"),
    }
}

#[async_trait]
impl PendingUpdate for UpdatePartitionSpec {
    fn operation(&self) -> &'static str {
        "update-spec"
    }

    async fn apply(&self, base: &Table, _written: &mut Vec<String>) -> Result<TableMetadata> {
        let mut metadata = base.metadata().clone();
        let fields = self.new_fields(&metadata)?;
        let spec_id = metadata.add_partition_spec(fields)?;
        metadata.set_default_spec(spec_id)?;
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::catalog::{Catalog, MemoryCatalog, TableIdentifier};
    use crate::types::{Field, PartitionSpec, Primitive, Struct, PARTITION_FIELD_ID_START};

    async fn table() -> Result<Table> {
        let catalog = Arc::new(MemoryCatalog::new("memory", "memory://wh")?);
        catalog
            .create_table(
                &TableIdentifier::new(["t"])?,
                &Schema::new(
                    0,
                    None,
                    Struct::new(vec![
                        Field::required(1, "id", Primitive::Long).into(),
                        Field::optional(2, "ts", Primitive::Timestamp).into(),
                    ]),
                ),
                &PartitionSpec::unpartitioned(),
                HashMap::new(),
            )
            .await
    }

    #[tokio::test]
    async fn test_evolve_spec() -> Result<()> {
        let table = table()
            .await?
            .update_spec()
            .add_field("id", Transform::Bucket(16))
            .add_field("ts", Transform::Day)
            .commit()
            .await?;

        let spec = table.metadata().current_partition_spec()?;
        assert_eq!(spec.spec_id, 1);
        assert_eq!(spec.fields[0].name, "id_bucket_16");
        assert_eq!(spec.fields[0].partition_field_id, PARTITION_FIELD_ID_START);
        assert_eq!(spec.fields[1].name, "ts_day");
        assert!(table.current_snapshot()?.is_none());

        let table = table
            .update_spec()
            .remove_field("ts_day")
            .add_field("ts", Transform::Hour)
            .commit()
            .await?;
        let spec = table.metadata().current_partition_spec()?;
        assert_eq!(spec.spec_id, 2);
        assert_eq!(spec.fields[0].partition_field_id, PARTITION_FIELD_ID_START);
        assert_eq!(spec.fields[1].partition_field_id, PARTITION_FIELD_ID_START + 2);
        assert_eq!(table.metadata().partition_specs.len(), 3);

        let table = table.update_spec().unpartitioned().commit().await?;
        assert_eq!(table.metadata().default_spec_id, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_spec_changes() -> Result<()> {
        let table = table().await?;
        let err = table
            .update_spec()
            .add_field("missing", Transform::Identity)
            .commit()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataInvalid);

        let err = table
            .update_spec()
            .remove_field("id")
            .commit()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataInvalid);

        for transform in [Transform::Bucket(0), Transform::Truncate(0)] {
            let err = table
                .update_spec()
                .add_field("id", transform)
                .commit()
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::DataInvalid);
        }
        assert_eq!(table.refresh().await?.metadata().partition_specs.len(), 1);
        Ok(())
    }
}
