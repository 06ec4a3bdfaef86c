use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{
    DataContentType, DataFile, ManifestEntry, PrimitiveValue, StructValue,
    DELETE_FILE_PATH_FIELD_ID,
};
use crate::{Error, ErrorKind, Result};

/// A delete file and the highest data sequence number it applies to.
#[derive(Debug, Clone)]
struct IndexedDelete {
    applicable_seq: i64,
    file: Arc<DataFile>,
}

impl IndexedDelete {
    fn new(entry: ManifestEntry) -> Self {
        let seq = entry.data_sequence_number();
        // Equality deletes only strike rows written strictly before them.
        let applicable_seq = match entry.data_file.content {
            DataContentType::EqualityDeletes => seq - 1,
            _ => seq,
        };
        Self {
            applicable_seq,
            file: Arc::new(entry.data_file),
        }
    }
}

/// Deletes sorted by applicable sequence number.
#[derive(Debug, Default)]
struct DeleteGroup(Vec<IndexedDelete>);

impl DeleteGroup {
    fn sort(&mut self) {
        // Ties are broken by path, deletes may be loaded in any order.
        self.0.sort_by(|l, r| {
            l.applicable_seq
                .cmp(&r.applicable_seq)
                .then_with(|| l.file.file_path.cmp(&r.file.file_path))
        });
    }

    /// Deletes applying to data written at `data_seq`, in ascending order.
    fn applicable(&self, data_seq: i64) -> impl Iterator<Item = &IndexedDelete> {
        let start = self.0.partition_point(|d| d.applicable_seq < data_seq);
        self.0[start..].iter()
    }
}

type PartitionKey = (i32, StructValue);

/// Index of the delete files of a snapshot.
///
/// Deletes are looked up per data file by [`DeleteFileIndex::for_data_file`].
/// The result lists equality deletes before positional deletes: global
/// equality deletes, then equality deletes of the same partition, then
/// positional deletes naming the data file, then positional deletes of the
/// same partition. Each group is ordered by sequence number.
#[derive(Debug, Default)]
pub struct DeleteFileIndex {
    global_eq_deletes: DeleteGroup,
    eq_deletes_by_partition: HashMap<PartitionKey, DeleteGroup>,
    pos_deletes_by_path: HashMap<String, DeleteGroup>,
    pos_deletes_by_partition: HashMap<PartitionKey, DeleteGroup>,
    len: usize,
}

impl DeleteFileIndex {
    /// Build an index from live delete entries. Sequence numbers must have
    /// been inherited already.
    ///
    /// `is_unpartitioned` tells whether a spec id has no partition field,
    /// equality deletes of such specs apply to every data file.
    pub fn new(
        entries: impl IntoIterator<Item = ManifestEntry>,
        is_unpartitioned: impl Fn(i32) -> bool,
    ) -> Result<Self> {
        let mut index = Self::default();
        for entry in entries {
            index.add(entry, &is_unpartitioned)?;
        }

        index.global_eq_deletes.sort();
        index
            .eq_deletes_by_partition
            .values_mut()
            .chain(index.pos_deletes_by_path.values_mut())
            .chain(index.pos_deletes_by_partition.values_mut())
            .for_each(DeleteGroup::sort);
        Ok(index)
    }

    fn add(&mut self, entry: ManifestEntry, is_unpartitioned: &impl Fn(i32) -> bool) -> Result<()> {
        if !entry.is_alive() {
            return Ok(());
        }

        let file = &entry.data_file;
        match file.content {
            DataContentType::Data => {
                return Err(Error::new(
                    ErrorKind::DataInvalid,
                    format!("{} is a data file listed as a delete file", file.file_path),
                ));
            }
            DataContentType::EqualityDeletes => {
                if is_unpartitioned(file.spec_id) {
                    self.global_eq_deletes.0.push(IndexedDelete::new(entry));
                } else {
                    let key = (file.spec_id, file.partition.clone());
                    self.eq_deletes_by_partition
                        .entry(key)
                        .or_default()
                        .0
                        .push(IndexedDelete::new(entry));
                }
            }
            DataContentType::PositionDeletes => match file.referenced_data_file() {
                Some(path) => {
                    let path = path.to_string();
                    self.pos_deletes_by_path
                        .entry(path)
                        .or_default()
                        .0
                        .push(IndexedDelete::new(entry));
                }
                None => {
                    let key = (file.spec_id, file.partition.clone());
                    self.pos_deletes_by_partition
                        .entry(key)
                        .or_default()
                        .0
                        .push(IndexedDelete::new(entry));
                }
            },
        }
        self.len += 1;
        Ok(())
    }

    /// Number of indexed delete files.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no delete file is indexed.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Delete files that may strike rows of `data_file`, written with data
    /// sequence number `data_seq`.
    pub fn for_data_file(&self, data_seq: i64, data_file: &DataFile) -> Vec<Arc<DataFile>> {
        if self.is_empty() {
            return vec![];
        }

        let key = (data_file.spec_id, data_file.partition.clone());
        let mut deletes = vec![];

        let eq_deletes = self
            .global_eq_deletes
            .applicable(data_seq)
            .chain(
                self.eq_deletes_by_partition
                    .get(&key)
                    .into_iter()
                    .flat_map(|g| g.applicable(data_seq)),
            )
            .filter(|d| can_contain_eq_deletes(data_file, &d.file));
        deletes.extend(eq_deletes.map(|d| d.file.clone()));

        if let Some(group) = self.pos_deletes_by_path.get(&data_file.file_path) {
            deletes.extend(group.applicable(data_seq).map(|d| d.file.clone()));
        }
        if let Some(group) = self.pos_deletes_by_partition.get(&key) {
            deletes.extend(
                group
                    .applicable(data_seq)
                    .filter(|d| can_contain_pos_deletes(data_file, &d.file))
                    .map(|d| d.file.clone()),
            );
        }

        deletes
    }
}

/// Whether the `file_path` bounds of a positional delete file include the
/// path of `data_file`.
fn can_contain_pos_deletes(data_file: &DataFile, delete_file: &DataFile) -> bool {
    let path = data_file.file_path.as_str();
    let lower = delete_file.lower_bound(DELETE_FILE_PATH_FIELD_ID);
    let upper = delete_file.upper_bound(DELETE_FILE_PATH_FIELD_ID);
    let above_lower = match lower {
        Some(PrimitiveValue::String(lower)) => lower.as_str() <= path,
        _ => true,
    };
    let below_upper = match upper {
        Some(PrimitiveValue::String(upper)) => path <= upper.as_str(),
        _ => true,
    };
    above_lower && below_upper
}

/// Whether the rows of an equality delete file may match rows of
/// `data_file`, judging from the stats of both files.
///
/// Every equality column must be able to match for a delete row to match.
fn can_contain_eq_deletes(data_file: &DataFile, delete_file: &DataFile) -> bool {
    if data_file.lower_bounds.is_none()
        || data_file.upper_bounds.is_none()
        || data_file.null_value_counts.is_none()
        || data_file.value_counts.is_none()
    {
        return true;
    }

    let Some(equality_ids) = delete_file.equality_ids.as_ref() else {
        return true;
    };

    for id in equality_ids.iter().copied() {
        let data_nulls = data_file.null_count(id);
        let delete_nulls = delete_file.null_count(id);

        if contains_null(data_nulls) && contains_null(delete_nulls) {
            continue;
        }
        if all_null(data_nulls, data_file.value_count(id)) && all_non_null(delete_nulls) {
            return false;
        }
        if all_null(delete_nulls, delete_file.value_count(id)) && all_non_null(data_nulls) {
            return false;
        }

        let (Some(data_lower), Some(data_upper), Some(delete_lower), Some(delete_upper)) = (
            data_file.lower_bound(id),
            data_file.upper_bound(id),
            delete_file.lower_bound(id),
            delete_file.upper_bound(id),
        ) else {
            continue;
        };

        if !ranges_overlap(data_lower, data_upper, delete_lower, delete_upper) {
            return false;
        }
    }

    true
}

fn contains_null(null_count: Option<i64>) -> bool {
    null_count.map_or(false, |n| n > 0)
}

fn all_null(null_count: Option<i64>, value_count: Option<i64>) -> bool {
    matches!((null_count, value_count), (Some(n), Some(v)) if n == v)
}

fn all_non_null(null_count: Option<i64>) -> bool {
    null_count == Some(0)
}

fn ranges_overlap(
    data_lower: &PrimitiveValue,
    data_upper: &PrimitiveValue,
    delete_lower: &PrimitiveValue,
    delete_upper: &PrimitiveValue,
) -> bool {
    data_lower.compare(delete_upper) != Some(Ordering::Greater)
        && delete_lower.compare(data_upper) != Some(Ordering::Greater)
}
