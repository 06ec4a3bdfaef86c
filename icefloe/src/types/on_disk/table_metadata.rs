use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::partition_spec::PartitionSpec;
use super::schema::Schema;
use super::snapshot::Snapshot;
use crate::types;
use crate::Error;
use crate::ErrorKind;
use crate::Result;

/// Parse table metadata from json bytes.
pub fn parse_table_metadata(bs: &[u8]) -> Result<types::TableMetadata> {
    let v: TableMetadata = serde_json::from_slice(bs)?;
    v.try_into()
}

/// Serialize table meta to json format.
pub fn serialize_table_meta(table_meta: &types::TableMetadata) -> Result<String> {
    Ok(serde_json::to_string(&TableMetadata::from(table_meta))?)
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct TableMetadata {
    format_version: i32,
    table_uuid: String,
    location: String,
    #[serde(default)]
    last_sequence_number: i64,
    last_updated_ms: i64,
    last_column_id: i32,
    schemas: Vec<Schema>,
    current_schema_id: i32,
    partition_specs: Vec<PartitionSpec>,
    default_spec_id: i32,
    last_partition_id: i32,
    #[serde(default)]
    properties: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_snapshot_id: Option<i64>,
    #[serde(default)]
    snapshots: Vec<Snapshot>,
    #[serde(default)]
    snapshot_log: Vec<SnapshotLog>,
    #[serde(default)]
    metadata_log: Vec<MetadataLog>,
    #[serde(default)]
    refs: HashMap<String, SnapshotReference>,
}

impl TryFrom<TableMetadata> for types::TableMetadata {
    type Error = Error;

    fn try_from(v: TableMetadata) -> Result<Self> {
        let format_version: types::TableFormatVersion = u8::try_from(v.format_version)
            .map_err(|_| {
                Error::new(
                    ErrorKind::DataInvalid,
                    format!("invalid table format version {}", v.format_version),
                )
            })?
            .try_into()?;

        let mut schemas = Vec::with_capacity(v.schemas.len());
        for schema in v.schemas {
            schemas.push(schema.try_into()?);
        }

        let mut partition_specs = Vec::with_capacity(v.partition_specs.len());
        for partition_spec in v.partition_specs {
            partition_specs.push(partition_spec.try_into()?);
        }

        let mut refs = HashMap::with_capacity(v.refs.len());
        for (k, r) in v.refs {
            refs.insert(k, r.try_into()?);
        }

        let metadata = types::TableMetadata {
            format_version,
            table_uuid: v.table_uuid,
            location: v.location,
            last_sequence_number: v.last_sequence_number,
            last_updated_ms: v.last_updated_ms,
            last_column_id: v.last_column_id,
            schemas,
            current_schema_id: v.current_schema_id,
            partition_specs,
            default_spec_id: v.default_spec_id,
            last_partition_id: v.last_partition_id,
            properties: v.properties,
            // -1 is written by some writers for tables without snapshot.
            current_snapshot_id: v.current_snapshot_id.filter(|id| *id != -1),
            snapshots: v.snapshots.into_iter().map(Into::into).collect(),
            snapshot_log: v.snapshot_log.into_iter().map(Into::into).collect(),
            metadata_log: v.metadata_log.into_iter().map(Into::into).collect(),
            refs,
        };

        metadata.current_schema()?;
        metadata.current_partition_spec()?;
        metadata.current_snapshot()?;
        Ok(metadata)
    }
}

impl From<&types::TableMetadata> for TableMetadata {
    fn from(value: &types::TableMetadata) -> Self {
        Self {
            format_version: value.format_version as i32,
            table_uuid: value.table_uuid.clone(),
            location: value.location.clone(),
            last_sequence_number: value.last_sequence_number,
            last_updated_ms: value.last_updated_ms,
            last_column_id: value.last_column_id,
            schemas: value.schemas.iter().map(Schema::from).collect(),
            current_schema_id: value.current_schema_id,
            partition_specs: value
                .partition_specs
                .iter()
                .map(PartitionSpec::from)
                .collect(),
            default_spec_id: value.default_spec_id,
            last_partition_id: value.last_partition_id,
            properties: value.properties.clone(),
            current_snapshot_id: value.current_snapshot_id,
            snapshots: value.snapshots.iter().map(Snapshot::from).collect(),
            snapshot_log: value.snapshot_log.iter().map(SnapshotLog::from).collect(),
            metadata_log: value.metadata_log.iter().map(MetadataLog::from).collect(),
            refs: value
                .refs
                .iter()
                .map(|(k, v)| (k.clone(), SnapshotReference::from(v)))
                .collect(),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SnapshotLog {
    timestamp_ms: i64,
    snapshot_id: i64,
}

impl From<SnapshotLog> for types::SnapshotLog {
    fn from(v: SnapshotLog) -> Self {
        types::SnapshotLog {
            timestamp_ms: v.timestamp_ms,
            snapshot_id: v.snapshot_id,
        }
    }
}

impl From<&types::SnapshotLog> for SnapshotLog {
    fn from(v: &types::SnapshotLog) -> Self {
        Self {
            timestamp_ms: v.timestamp_ms,
            snapshot_id: v.snapshot_id,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct MetadataLog {
    timestamp_ms: i64,
    metadata_file: String,
}

impl From<MetadataLog> for types::MetadataLog {
    fn from(v: MetadataLog) -> Self {
        types::MetadataLog {
            timestamp_ms: v.timestamp_ms,
            metadata_file: v.metadata_file,
        }
    }
}

impl From<&types::MetadataLog> for MetadataLog {
    fn from(v: &types::MetadataLog) -> Self {
        Self {
            timestamp_ms: v.timestamp_ms,
            metadata_file: v.metadata_file.clone(),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SnapshotReference {
    snapshot_id: i64,
    #[serde(rename = "type")]
    typ: String,
}

impl TryFrom<SnapshotReference> for types::SnapshotReference {
    type Error = Error;

    fn try_from(v: SnapshotReference) -> Result<Self> {
        Ok(types::SnapshotReference {
            snapshot_id: v.snapshot_id,
            typ: v.typ.as_str().parse()?,
        })
    }
}

impl From<&types::SnapshotReference> for SnapshotReference {
    fn from(v: &types::SnapshotReference) -> Self {
        Self {
            snapshot_id: v.snapshot_id,
            typ: v.typ.to_string(),
        }
    }
}
