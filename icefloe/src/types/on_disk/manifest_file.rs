use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use super::partition_spec::PartitionSpec;
use super::schema::Schema;
use super::value::{parse_struct_value, parse_values, serialize_struct_value, serialize_values};
use super::value::Value;
use crate::catalog::FileIO;
use crate::types::{self, FieldSummary, ManifestListEntry, ManifestStatus, TableFormatVersion};
use crate::Error;
use crate::ErrorKind;
use crate::Result;

/// Parse the header line of a manifest.
pub fn parse_manifest_metadata(bs: &[u8]) -> Result<types::ManifestMetadata> {
    let v: ManifestMetadata = serde_json::from_slice(bs).map_err(malformed)?;
    v.try_into()
}

/// Serialize the header line of a manifest.
pub fn serialize_manifest_metadata(v: &types::ManifestMetadata) -> Result<String> {
    Ok(serde_json::to_string(&ManifestMetadata::from(v))?)
}

/// Parse one entry line of a manifest.
///
/// The partition tuple must conform to `partition_type`, the partition type
/// of the spec that wrote the manifest.
pub fn parse_manifest_entry(
    bs: &[u8],
    partition_type: &types::Struct,
) -> Result<types::ManifestEntry> {
    let v: ManifestEntry = serde_json::from_slice(bs).map_err(malformed)?;
    let entry = types::ManifestEntry::try_from(v)?;
    if !entry.data_file.partition.conforms_to(partition_type) {
        return Err(Error::new(
            ErrorKind::MalformedManifest,
            format!(
                "partition {} of {} doesn't match the partition spec of its manifest",
                entry.data_file.partition, entry.data_file.file_path
            ),
        ));
    }
    Ok(entry)
}

/// Serialize one entry line of a manifest.
pub fn serialize_manifest_entry(v: &types::ManifestEntry) -> Result<String> {
    Ok(serde_json::to_string(&ManifestEntry::from(v))?)
}

fn malformed(e: serde_json::Error) -> Error {
    Error::new(ErrorKind::MalformedManifest, "manifest line can't be parsed").set_source(e)
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ManifestMetadata {
    schema: Schema,
    partition_spec: PartitionSpec,
    format_version: u8,
    content: String,
}

impl TryFrom<ManifestMetadata> for types::ManifestMetadata {
    type Error = Error;

    fn try_from(v: ManifestMetadata) -> Result<Self> {
        Ok(types::ManifestMetadata {
            schema: v.schema.try_into()?,
            partition_spec: v.partition_spec.try_into()?,
            format_version: TableFormatVersion::try_from(v.format_version)?,
            content: types::ManifestContentType::from_str(&v.content)?,
        })
    }
}

impl From<&types::ManifestMetadata> for ManifestMetadata {
    fn from(v: &types::ManifestMetadata) -> Self {
        Self {
            schema: Schema::from(&v.schema),
            partition_spec: PartitionSpec::from(&v.partition_spec),
            format_version: v.format_version as u8,
            content: v.content.to_string(),
        }
    }
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ManifestEntry {
    status: u8,
    snapshot_id: Option<i64>,
    sequence_number: Option<i64>,
    file_sequence_number: Option<i64>,
    data_file: DataFile,
}

impl TryFrom<ManifestEntry> for types::ManifestEntry {
    type Error = Error;

    fn try_from(v: ManifestEntry) -> Result<Self> {
        Ok(types::ManifestEntry {
            status: ManifestStatus::try_from(v.status)?,
            snapshot_id: v.snapshot_id,
            sequence_number: v.sequence_number,
            file_sequence_number: v.file_sequence_number,
            data_file: v.data_file.try_into()?,
        })
    }
}

impl From<&types::ManifestEntry> for ManifestEntry {
    fn from(v: &types::ManifestEntry) -> Self {
        Self {
            status: v.status as u8,
            snapshot_id: v.snapshot_id,
            sequence_number: v.sequence_number,
            file_sequence_number: v.file_sequence_number,
            data_file: DataFile::from(&v.data_file),
        }
    }
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DataFile {
    #[serde(default)]
    content: u8,
    file_path: String,
    file_format: String,
    #[serde(default)]
    partition: Vec<Option<Value>>,
    record_count: i64,
    file_size_in_bytes: i64,
    column_sizes: Option<HashMap<i32, i64>>,
    value_counts: Option<HashMap<i32, i64>>,
    null_value_counts: Option<HashMap<i32, i64>>,
    nan_value_counts: Option<HashMap<i32, i64>>,
    lower_bounds: Option<HashMap<i32, Value>>,
    upper_bounds: Option<HashMap<i32, Value>>,
    split_offsets: Option<Vec<i64>>,
    equality_ids: Option<Vec<i32>>,
    sort_order_id: Option<i32>,
}

impl TryFrom<DataFile> for types::DataFile {
    type Error = Error;

    fn try_from(v: DataFile) -> Result<Self> {
        Ok(types::DataFile {
            content: v.content.try_into()?,
            file_path: v.file_path,
            file_format: v.file_format.parse()?,
            partition: parse_struct_value(v.partition)?,
            // Owned by the manifest, filled on read.
            spec_id: 0,
            record_count: v.record_count,
            file_size_in_bytes: v.file_size_in_bytes,
            column_sizes: v.column_sizes,
            value_counts: v.value_counts,
            null_value_counts: v.null_value_counts,
            nan_value_counts: v.nan_value_counts,
            lower_bounds: v.lower_bounds.map(parse_values).transpose()?,
            upper_bounds: v.upper_bounds.map(parse_values).transpose()?,
            split_offsets: v.split_offsets,
            equality_ids: v.equality_ids,
            sort_order_id: v.sort_order_id,
        })
    }
}

impl From<&types::DataFile> for DataFile {
    fn from(v: &types::DataFile) -> Self {
        Self {
            content: v.content as u8,
            file_path: v.file_path.clone(),
            file_format: v.file_format.to_string(),
            partition: serialize_struct_value(&v.partition),
            record_count: v.record_count,
            file_size_in_bytes: v.file_size_in_bytes,
            column_sizes: v.column_sizes.clone(),
            value_counts: v.value_counts.clone(),
            null_value_counts: v.null_value_counts.clone(),
            nan_value_counts: v.nan_value_counts.clone(),
            lower_bounds: v.lower_bounds.as_ref().map(serialize_values),
            upper_bounds: v.upper_bounds.as_ref().map(serialize_values),
            split_offsets: v.split_offsets.clone(),
            equality_ids: v.equality_ids.clone(),
            sort_order_id: v.sort_order_id,
        }
    }
}

/// Manifest writer to write manifest to file.
///
/// Entries are buffered as lines, the file is written at once by
/// [`ManifestWriter::finish`] which also returns the entry describing the
/// manifest in a manifest list.
pub(crate) struct ManifestWriter {
    metadata: types::ManifestMetadata,
    partition_type: types::Struct,
    io: FileIO,
    output_path: String,
    snapshot_id: i64,
    buf: Vec<u8>,

    added_files: i32,
    added_rows: i64,
    existing_files: i32,
    existing_rows: i64,
    deleted_files: i32,
    deleted_rows: i64,
    seq_num: i64,
    min_seq_num: Option<i64>,
    partitions: Vec<FieldSummary>,
}

impl ManifestWriter {
    /// `output_path` is an absolute location, `seq_num` the sequence number
    /// of the snapshot adding the manifest.
    pub(crate) fn new(
        metadata: types::ManifestMetadata,
        io: FileIO,
        output_path: impl Into<String>,
        snapshot_id: i64,
        seq_num: i64,
    ) -> Result<Self> {
        let partition_type = metadata.partition_spec.partition_type(&metadata.schema)?;
        let mut buf = serialize_manifest_metadata(&metadata)?.into_bytes();
        buf.push(b'\n');

        Ok(Self {
            partitions: vec![FieldSummary::default(); partition_type.len()],
            metadata,
            partition_type,
            io,
            output_path: output_path.into(),
            snapshot_id,
            buf,

            added_files: 0,
            added_rows: 0,
            existing_files: 0,
            existing_rows: 0,
            deleted_files: 0,
            deleted_rows: 0,
            seq_num,
            min_seq_num: None,
        })
    }

    pub(crate) fn add_entry(&mut self, entry: &types::ManifestEntry) -> Result<()> {
        if !entry.data_file.partition.conforms_to(&self.partition_type) {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!(
                    "partition {} of {} doesn't match partition spec {}",
                    entry.data_file.partition,
                    entry.data_file.file_path,
                    self.metadata.partition_spec.spec_id
                ),
            ));
        }

        match entry.status {
            ManifestStatus::Added => {
                self.added_files += 1;
                self.added_rows += entry.data_file.record_count;
            }
            ManifestStatus::Deleted => {
                self.deleted_files += 1;
                self.deleted_rows += entry.data_file.record_count;
            }
            ManifestStatus::Existing => {
                self.existing_files += 1;
                self.existing_rows += entry.data_file.record_count;
            }
        }

        if entry.is_alive() {
            let seq = entry.sequence_number.unwrap_or(self.seq_num);
            self.min_seq_num = Some(self.min_seq_num.map_or(seq, |cur| cur.min(seq)));
        }

        for (summary, value) in self
            .partitions
            .iter_mut()
            .zip(entry.data_file.partition.fields())
        {
            summary.update(value.as_ref());
        }

        self.buf
            .extend_from_slice(serialize_manifest_entry(entry)?.as_bytes());
        self.buf.push(b'\n');
        Ok(())
    }

    pub(crate) async fn finish(self) -> Result<ManifestListEntry> {
        let length = self.buf.len() as i64;
        self.io.write(&self.output_path, self.buf).await?;

        Ok(ManifestListEntry {
            manifest_path: self.output_path,
            manifest_length: length,
            partition_spec_id: self.metadata.partition_spec.spec_id,
            content: self.metadata.content,
            sequence_number: self.seq_num,
            min_sequence_number: self.min_seq_num.unwrap_or(self.seq_num),
            added_snapshot_id: self.snapshot_id,
            added_data_files_count: self.added_files,
            existing_data_files_count: self.existing_files,
            deleted_data_files_count: self.deleted_files,
            added_rows_count: self.added_rows,
            existing_rows_count: self.existing_rows,
            deleted_rows_count: self.deleted_rows,
            partitions: self.partitions,
        })
    }
}
