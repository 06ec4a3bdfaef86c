use serde::{Deserialize, Serialize};

use super::value::Value;
use crate::catalog::FileIO;
use crate::types;
use crate::Error;
use crate::Result;

/// First line of a manifest list file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ManifestListMetadata {
    /// Table format version the list was written with.
    pub format_version: i32,
    /// Snapshot owning the list.
    pub snapshot_id: i64,
    /// Parent of that snapshot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_snapshot_id: Option<i64>,
    /// Sequence number of that snapshot.
    pub sequence_number: i64,
}

/// Parse the header line of a manifest list.
pub fn parse_manifest_list_metadata(bs: &[u8]) -> Result<ManifestListMetadata> {
    Ok(serde_json::from_slice(bs)?)
}

/// Serialize the header line of a manifest list.
pub fn serialize_manifest_list_metadata(v: &ManifestListMetadata) -> Result<String> {
    Ok(serde_json::to_string(v)?)
}

/// Parse one entry line of a manifest list.
pub fn parse_manifest_list_entry(bs: &[u8]) -> Result<types::ManifestListEntry> {
    let v: ManifestListEntry = serde_json::from_slice(bs)?;
    v.try_into()
}

/// Serialize one entry line of a manifest list.
pub fn serialize_manifest_list_entry(v: &types::ManifestListEntry) -> Result<String> {
    Ok(serde_json::to_string(&ManifestListEntry::from(v))?)
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ManifestListEntry {
    manifest_path: String,
    manifest_length: i64,
    partition_spec_id: i32,
    #[serde(default)]
    content: u8,
    #[serde(default)]
    sequence_number: i64,
    #[serde(default)]
    min_sequence_number: i64,
    added_snapshot_id: i64,
    #[serde(default)]
    added_files_count: i32,
    #[serde(default)]
    existing_files_count: i32,
    #[serde(default)]
    deleted_files_count: i32,
    #[serde(default)]
    added_rows_count: i64,
    #[serde(default)]
    existing_rows_count: i64,
    #[serde(default)]
    deleted_rows_count: i64,
    #[serde(default)]
    partitions: Vec<FieldSummary>,
}

impl TryFrom<ManifestListEntry> for types::ManifestListEntry {
    type Error = Error;

    fn try_from(v: ManifestListEntry) -> Result<Self> {
        let partitions = v
            .partitions
            .into_iter()
            .map(types::FieldSummary::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(types::ManifestListEntry {
            manifest_path: v.manifest_path,
            manifest_length: v.manifest_length,
            partition_spec_id: v.partition_spec_id,
            content: v.content.try_into()?,
            sequence_number: v.sequence_number,
            min_sequence_number: v.min_sequence_number,
            added_snapshot_id: v.added_snapshot_id,
            added_data_files_count: v.added_files_count,
            existing_data_files_count: v.existing_files_count,
            deleted_data_files_count: v.deleted_files_count,
            added_rows_count: v.added_rows_count,
            existing_rows_count: v.existing_rows_count,
            deleted_rows_count: v.deleted_rows_count,
            partitions,
        })
    }
}

impl From<&types::ManifestListEntry> for ManifestListEntry {
    fn from(v: &types::ManifestListEntry) -> Self {
        Self {
            manifest_path: v.manifest_path.clone(),
            manifest_length: v.manifest_length,
            partition_spec_id: v.partition_spec_id,
            content: v.content as u8,
            sequence_number: v.sequence_number,
            min_sequence_number: v.min_sequence_number,
            added_snapshot_id: v.added_snapshot_id,
            added_files_count: v.added_data_files_count,
            existing_files_count: v.existing_data_files_count,
            deleted_files_count: v.deleted_data_files_count,
            added_rows_count: v.added_rows_count,
            existing_rows_count: v.existing_rows_count,
            deleted_rows_count: v.deleted_rows_count,
            partitions: v.partitions.iter().map(FieldSummary::from).collect(),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct FieldSummary {
    contains_null: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    contains_nan: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lower_bound: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    upper_bound: Option<Value>,
}

impl TryFrom<FieldSummary> for types::FieldSummary {
    type Error = Error;

    fn try_from(v: FieldSummary) -> Result<Self> {
        Ok(types::FieldSummary {
            contains_null: v.contains_null,
            contains_nan: v.contains_nan,
            lower_bound: v.lower_bound.map(TryInto::try_into).transpose()?,
            upper_bound: v.upper_bound.map(TryInto::try_into).transpose()?,
        })
    }
}

impl From<&types::FieldSummary> for FieldSummary {
    fn from(v: &types::FieldSummary) -> Self {
        Self {
            contains_null: v.contains_null,
            contains_nan: v.contains_nan,
            lower_bound: v.lower_bound.as_ref().map(Value::from),
            upper_bound: v.upper_bound.as_ref().map(Value::from),
        }
    }
}

/// Writes a manifest list as one header line followed by one line per
/// manifest.
pub(crate) struct ManifestListWriter {
    io: FileIO,
    output_path: String,
    buf: Vec<u8>,
}

impl ManifestListWriter {
    pub(crate) fn new(
        io: FileIO,
        output_path: impl Into<String>,
        metadata: &ManifestListMetadata,
    ) -> Result<Self> {
        let mut buf = serialize_manifest_list_metadata(metadata)?.into_bytes();
        buf.push(b'\n');
        Ok(Self {
            io,
            output_path: output_path.into(),
            buf,
        })
    }

    pub(crate) fn add_entry(&mut self, entry: &types::ManifestListEntry) -> Result<()> {
        self.buf
            .extend_from_slice(serialize_manifest_list_entry(entry)?.as_bytes());
        self.buf.push(b'\n');
        Ok(())
    }

    /// Write the file and return its location.
    pub(crate) async fn finish(self) -> Result<String> {
        self.io.write(&self.output_path, self.buf).await?;
        Ok(self.output_path)
    }
}
