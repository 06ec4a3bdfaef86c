use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};

use super::line_reader::{read_lines, DEFAULT_CHUNK_SIZE};
use crate::catalog::FileIO;
use crate::types::{
    parse_manifest_entry, parse_manifest_list_entry, parse_manifest_list_metadata,
    parse_manifest_metadata, ManifestContentType, ManifestEntry, ManifestListEntry, Snapshot,
    Struct,
};
use crate::{Error, ErrorKind, Result};

/// Lazy stream of manifest list entries.
pub type ManifestListEntryStream = BoxStream<'static, Result<ManifestListEntry>>;
/// Lazy stream of manifest entries.
pub type ManifestEntryStream = BoxStream<'static, Result<ManifestEntry>>;

/// Reader of manifest list files.
pub struct ManifestList;

impl ManifestList {
    /// Stream the manifests listed in the manifest list at `path`.
    ///
    /// The header line is checked but not returned.
    pub fn entries(io: &FileIO, path: &str) -> ManifestListEntryStream {
        read_lines(io.clone(), path, DEFAULT_CHUNK_SIZE)
            .enumerate()
            .filter_map(|(idx, line)| async move {
                match line {
                    Err(e) => Some(Err(e)),
                    Ok(line) if idx == 0 => parse_manifest_list_metadata(&line)
                        .map_err(|e| {
                            Error::new(ErrorKind::MalformedManifest, "invalid manifest list header")
                                .set_source(e)
                        })
                        .err()
                        .map(Err),
                    Ok(line) => Some(parse_manifest_list_entry(&line).map_err(|e| {
                        Error::new(ErrorKind::MalformedManifest, "invalid manifest list entry")
                            .set_source(e)
                    })),
                }
            })
            .boxed()
    }
}

impl ManifestListEntry {
    /// Stream every entry of this manifest, deleted ones included.
    ///
    /// Snapshot ids and sequence numbers missing from added entries are
    /// inherited from this manifest. `partition_type` is the partition type
    /// of the spec `self.partition_spec_id`.
    pub fn entries(&self, io: &FileIO, partition_type: Struct) -> ManifestEntryStream {
        let manifest = self.clone();
        read_lines(io.clone(), &self.manifest_path, DEFAULT_CHUNK_SIZE)
            .enumerate()
            .filter_map(move |(idx, line)| {
                let manifest = manifest.clone();
                let partition_type = partition_type.clone();
                async move {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => return Some(Err(e)),
                    };
                    if idx == 0 {
                        return check_header(&manifest, &line).err().map(Err);
                    }
                    Some(parse_manifest_entry(&line, &partition_type).map(|mut entry| {
                        entry.inherit(&manifest);
                        entry
                    }))
                }
            })
            .boxed()
    }

    /// Stream the live entries of this manifest.
    pub fn live_entries(&self, io: &FileIO, partition_type: Struct) -> ManifestEntryStream {
        self.entries(io, partition_type)
            .try_filter(|entry| futures::future::ready(entry.is_alive()))
            .boxed()
    }
}

fn check_header(manifest: &ManifestListEntry, line: &[u8]) -> Result<()> {
    let metadata = parse_manifest_metadata(line)?;
    if metadata.partition_spec.spec_id != manifest.partition_spec_id
        || metadata.content != manifest.content
    {
        return Err(Error::new(
            ErrorKind::MalformedManifest,
            format!(
                "manifest {} is listed with spec {} and content {} but was written with spec {} and content {}",
                manifest.manifest_path,
                manifest.partition_spec_id,
                manifest.content,
                metadata.partition_spec.spec_id,
                metadata.content
            ),
        ));
    }
    Ok(())
}

/// Manifests of one snapshot, split by content.
///
/// Nothing is read until one of the streams is polled.
#[derive(Clone, Debug)]
pub struct ManifestIndex {
    io: FileIO,
    manifest_list: String,
}

impl ManifestIndex {
    /// Index of the manifests listed by `snapshot`.
    pub fn for_snapshot(io: &FileIO, snapshot: &Snapshot) -> Self {
        Self {
            io: io.clone(),
            manifest_list: snapshot.manifest_list.clone(),
        }
    }

    /// All manifests of the snapshot.
    pub fn manifests(&self) -> ManifestListEntryStream {
        ManifestList::entries(&self.io, &self.manifest_list)
    }

    /// Manifests tracking data files.
    pub fn data_manifests(&self) -> ManifestListEntryStream {
        self.manifests_of(ManifestContentType::Data)
    }

    /// Manifests tracking delete files.
    pub fn delete_manifests(&self) -> ManifestListEntryStream {
        self.manifests_of(ManifestContentType::Deletes)
    }

    fn manifests_of(&self, content: ManifestContentType) -> ManifestListEntryStream {
        self.manifests()
            .try_filter(move |m| futures::future::ready(m.content == content))
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::types::{
        DataFile, Field, ManifestListMetadata, ManifestMetadata, ManifestStatus, PartitionField,
        PartitionSpec, Primitive, Schema, StructValue, TableFormatVersion, Transform,
    };
    use crate::types::{ManifestListWriter, ManifestWriter};

    fn schema() -> Schema {
        Schema::new(
            0,
            None,
            Struct::new(vec![
                Field::required(1, "id", Primitive::Long).into(),
                Field::required(2, "category", Primitive::String).into(),
            ]),
        )
    }

    fn spec() -> PartitionSpec {
        PartitionSpec {
            spec_id: 1,
            fields: vec![PartitionField {
                source_column_id: 2,
                partition_field_id: 1000,
                transform: Transform::Identity,
                name: "category".to_string(),
            }],
        }
    }

    fn entry(status: ManifestStatus, path: &str) -> ManifestEntry {
        ManifestEntry {
            status,
            snapshot_id: None,
            sequence_number: None,
            file_sequence_number: None,
            data_file: DataFile::builder()
                .with_file_path(path)
                .with_partition(StructValue::new(vec![Some("odd".into())]))
                .with_record_count(1)
                .with_file_size_in_bytes(10)
                .build()
                .unwrap(),
        }
    }

    async fn write_manifest(
        io: &FileIO,
        name: &str,
        content: ManifestContentType,
        entries: &[ManifestEntry],
    ) -> ManifestListEntry {
        let metadata = ManifestMetadata {
            schema: schema(),
            partition_spec: spec(),
            format_version: TableFormatVersion::V2,
            content,
        };
        let mut writer =
            ManifestWriter::new(metadata, io.clone(), io.absolute_path(name), 3, 5).unwrap();
        for e in entries {
            writer.add_entry(e).unwrap();
        }
        writer.finish().await.unwrap()
    }

    #[tokio::test]
    async fn test_entries_inherit_from_manifest() {
        let io = FileIO::from_path("memory://wh").unwrap();
        let mut existing = entry(ManifestStatus::Existing, "b.parquet");
        existing.snapshot_id = Some(1);
        existing.sequence_number = Some(2);
        let manifest = write_manifest(
            &io,
            "m.json",
            ManifestContentType::Data,
            &[
                entry(ManifestStatus::Added, "a.parquet"),
                existing,
                entry(ManifestStatus::Deleted, "c.parquet"),
            ],
        )
        .await;

        let partition_type = spec().partition_type(&schema()).unwrap();
        let all: Vec<ManifestEntry> = manifest
            .entries(&io, partition_type.clone())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].snapshot_id, Some(3));
        assert_eq!(all[0].data_sequence_number(), 5);
        assert_eq!(all[0].data_file.spec_id, 1);
        assert_eq!(all[1].data_sequence_number(), 2);

        let live: Vec<String> = manifest
            .live_entries(&io, partition_type)
            .map_ok(|e| e.data_file.file_path)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(live, vec!["a.parquet", "b.parquet"]);
    }

    #[tokio::test]
    async fn test_mismatched_partition_type() {
        let io = FileIO::from_path("memory://wh").unwrap();
        let manifest = write_manifest(
            &io,
            "m.json",
            ManifestContentType::Data,
            &[entry(ManifestStatus::Added, "a.parquet")],
        )
        .await;

        let err = manifest
            .entries(&io, Struct::new(vec![]))
            .try_collect::<Vec<_>>()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedManifest);

        let mut relisted = manifest.clone();
        relisted.partition_spec_id = 0;
        let err = relisted
            .entries(&io, spec().partition_type(&schema()).unwrap())
            .try_collect::<Vec<_>>()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedManifest);
    }

    #[tokio::test]
    async fn test_manifest_index() {
        let io = FileIO::from_path("memory://wh").unwrap();
        let data = write_manifest(
            &io,
            "data.json",
            ManifestContentType::Data,
            &[entry(ManifestStatus::Added, "a.parquet")],
        )
        .await;
        let deletes = write_manifest(&io, "deletes.json", ManifestContentType::Deletes, &[]).await;

        let list_path = io.absolute_path("snap-3.json");
        let mut writer = ManifestListWriter::new(
            io.clone(),
            &list_path,
            &ManifestListMetadata {
                format_version: 2,
                snapshot_id: 3,
                parent_snapshot_id: None,
                sequence_number: 5,
            },
        )
        .unwrap();
        writer.add_entry(&data).unwrap();
        writer.add_entry(&deletes).unwrap();
        writer.finish().await.unwrap();

        let snapshot = Snapshot {
            snapshot_id: 3,
            parent_snapshot_id: None,
            sequence_number: 5,
            timestamp_ms: 0,
            manifest_list: list_path,
            summary: HashMap::new(),
            schema_id: Some(0),
        };
        let index = ManifestIndex::for_snapshot(&io, &snapshot);
        let data_manifests: Vec<_> = index.data_manifests().try_collect().await.unwrap();
        let delete_manifests: Vec<_> = index.delete_manifests().try_collect().await.unwrap();
        assert_eq!(data_manifests, vec![data]);
        assert_eq!(delete_manifests, vec![deletes]);
    }

    #[tokio::test]
    async fn test_missing_manifest_list() {
        let io = FileIO::from_path("memory://wh").unwrap();
        let err = ManifestList::entries(&io, &io.absolute_path("missing.json"))
            .try_collect::<Vec<_>>()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PlanningIoFailure);
    }
}
