#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Once};

use futures::TryStreamExt;
use icefloe::catalog::{Catalog, MemoryCatalog};
use icefloe::io::FileScanTask;
use icefloe::types::{
    DataContentType, DataFile, Field, PartitionField, PartitionSpec, Primitive, PrimitiveValue,
    Schema, Struct, StructValue, Transform, DELETE_FILE_PATH_FIELD_ID, PARTITION_FIELD_ID_START,
};
use icefloe::{Result, Table, TableIdentifier};

static INIT: Once = Once::new();

pub fn set_up() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub const ID: i32 = 1;
pub const DATA: i32 = 2;
pub const CATEGORY: i32 = 3;

/// `id int, data string, category string not null`
pub fn schema() -> Schema {
    Schema::new(
        0,
        None,
        Struct::new(vec![
            Field::optional(ID, "id", Primitive::Int).into(),
            Field::optional(DATA, "data", Primitive::String).into(),
            Field::required(CATEGORY, "category", Primitive::String).into(),
        ]),
    )
}

pub fn partitioned_by_category() -> PartitionSpec {
    PartitionSpec {
        spec_id: 0,
        fields: vec![PartitionField {
            source_column_id: CATEGORY,
            partition_field_id: PARTITION_FIELD_ID_START,
            transform: Transform::Identity,
            name: "category".to_string(),
        }],
    }
}

pub fn category(value: &str) -> StructValue {
    StructValue::new(vec![Some(PrimitiveValue::String(value.to_string()))])
}

pub fn memory_catalog() -> Result<Arc<MemoryCatalog>> {
    set_up();
    Ok(Arc::new(MemoryCatalog::new("memory", "memory://wh")?))
}

pub async fn create_table(
    catalog: &Arc<MemoryCatalog>,
    name: &str,
    spec: PartitionSpec,
    props: &[(&str, &str)],
) -> Result<Table> {
    catalog
        .clone()
        .create_table(
            &TableIdentifier::new(["db", name])?,
            &schema(),
            &spec,
            props
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
        .await
}

pub fn path(name: &str) -> String {
    format!("memory://wh/db/data/{name}.parquet")
}

fn string_bounds(lower: &str, upper: &str) -> (HashMap<i32, PrimitiveValue>, HashMap<i32, PrimitiveValue>) {
    (
        HashMap::from([(DATA, PrimitiveValue::String(lower.to_string()))]),
        HashMap::from([(DATA, PrimitiveValue::String(upper.to_string()))]),
    )
}

/// Data file of 8 rows, `data` spanning `a` to `g` with one null.
pub fn data_file(name: &str, partition: StructValue) -> DataFile {
    let (lower, upper) = string_bounds("a", "g");
    DataFile::builder()
        .with_file_path(path(name))
        .with_partition(partition)
        .with_record_count(8)
        .with_file_size_in_bytes(1024)
        .with_value_counts(HashMap::from([(DATA, 8)]))
        .with_null_value_counts(HashMap::from([(DATA, 1)]))
        .with_lower_bounds(lower)
        .with_upper_bounds(upper)
        .build()
        .unwrap()
}

/// Same as [`data_file`] without any null.
pub fn non_null_data_file(name: &str, partition: StructValue) -> DataFile {
    let mut file = data_file(name, partition);
    file.null_value_counts = Some(HashMap::from([(DATA, 0)]));
    file
}

/// Position delete file, referencing `data_path` only when given.
pub fn pos_delete(name: &str, data_path: Option<&str>, partition: StructValue) -> DataFile {
    let mut builder = DataFile::builder();
    builder
        .with_content(DataContentType::PositionDeletes)
        .with_file_path(path(name))
        .with_partition(partition)
        .with_record_count(2)
        .with_file_size_in_bytes(128);
    if let Some(data_path) = data_path {
        let bound = HashMap::from([(
            DELETE_FILE_PATH_FIELD_ID,
            PrimitiveValue::String(data_path.to_string()),
        )]);
        builder
            .with_lower_bounds(bound.clone())
            .with_upper_bounds(bound);
    }
    builder.build().unwrap()
}

/// Equality delete file on `data`, its values spanning `lower` to `upper`.
pub fn eq_delete(name: &str, lower: &str, upper: &str, partition: StructValue) -> DataFile {
    let (lower, upper) = string_bounds(lower, upper);
    DataFile::builder()
        .with_content(DataContentType::EqualityDeletes)
        .with_file_path(path(name))
        .with_partition(partition)
        .with_record_count(2)
        .with_file_size_in_bytes(128)
        .with_equality_ids(vec![DATA])
        .with_value_counts(HashMap::from([(DATA, 2)]))
        .with_null_value_counts(HashMap::from([(DATA, 0)]))
        .with_lower_bounds(lower)
        .with_upper_bounds(upper)
        .build()
        .unwrap()
}

/// Equality delete file on `data` deleting only nulls.
pub fn null_eq_delete(name: &str, partition: StructValue) -> DataFile {
    DataFile::builder()
        .with_content(DataContentType::EqualityDeletes)
        .with_file_path(path(name))
        .with_partition(partition)
        .with_record_count(1)
        .with_file_size_in_bytes(64)
        .with_equality_ids(vec![DATA])
        .with_value_counts(HashMap::from([(DATA, 1)]))
        .with_null_value_counts(HashMap::from([(DATA, 1)]))
        .build()
        .unwrap()
}

pub async fn plan(table: &Table) -> Result<Vec<FileScanTask>> {
    table.new_scan().build()?.plan_files().await?.try_collect().await
}

pub fn task<'a>(tasks: &'a [FileScanTask], name: &str) -> &'a FileScanTask {
    let path = path(name);
    tasks
        .iter()
        .find(|t| t.file_path() == path)
        .unwrap_or_else(|| panic!("no task for {path}"))
}

pub fn delete_paths(task: &FileScanTask) -> Vec<String> {
    task.deletes.iter().map(|d| d.file_path.clone()).collect()
}
