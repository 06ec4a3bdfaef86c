mod utils;

use std::sync::Arc;

use futures::{StreamExt, TryStreamExt};
use icefloe::catalog::{Catalog, MemoryCatalog};
use icefloe::expr::{BoundPredicate, Reference};
use icefloe::metrics::InMemoryMetricsReporter;
use icefloe::types::{PartitionSpec, StructValue};
use icefloe::{ErrorKind, Result, TableIdentifier};
pub use utils::*;

#[tokio::test]
async fn test_scan_of_empty_table() -> Result<()> {
    let catalog = memory_catalog()?;
    let table = create_table(&catalog, "t", PartitionSpec::unpartitioned(), &[]).await?;
    assert!(plan(&table).await?.is_empty());

    let err = table
        .new_scan()
        .with_snapshot_id(42)
        .build()?
        .plan_files()
        .await
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::DataInvalid);
    Ok(())
}

#[tokio::test]
async fn test_planning_is_repeatable() -> Result<()> {
    let catalog = memory_catalog()?;
    let table = create_table(&catalog, "t", partitioned_by_category(), &[]).await?
        .new_fast_append()
        .append_files((0..5).map(|i| data_file(&format!("f{i}"), category("x"))))
        .commit()
        .await?
        .new_row_delta()
        .add_deletes(eq_delete("eq", "c", "e", category("x")))
        .commit()
        .await?;

    let paths = |tasks: Vec<icefloe::io::FileScanTask>| {
        let mut paths: Vec<_> = tasks
            .iter()
            .map(|t| (t.file_path().to_string(), delete_paths(t)))
            .collect();
        paths.sort();
        paths
    };
    let first = paths(plan(&table).await?);
    let second = paths(plan(&table).await?);
    assert_eq!(first.len(), 5);
    assert_eq!(first, second);
    assert!(first.iter().all(|(_, deletes)| deletes == &vec![path("eq")]));
    Ok(())
}

#[tokio::test]
async fn test_scan_of_older_snapshot() -> Result<()> {
    let catalog = memory_catalog()?;
    let first = create_table(&catalog, "t", PartitionSpec::unpartitioned(), &[]).await?
        .new_fast_append()
        .append_file(data_file("a", StructValue::empty()))
        .commit()
        .await?;
    let second = first
        .new_overwrite()
        .delete_file(path("a"))
        .add_file(data_file("b", StructValue::empty()))
        .commit()
        .await?;

    let current = plan(&second).await?;
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].file_path(), path("b"));

    let old_snapshot = first.current_snapshot()?.unwrap().snapshot_id;
    let old: Vec<_> = second
        .new_scan()
        .with_snapshot_id(old_snapshot)
        .build()?
        .plan_files()
        .await?
        .try_collect()
        .await?;
    assert_eq!(old.len(), 1);
    assert_eq!(old[0].file_path(), path("a"));
    Ok(())
}

#[tokio::test]
async fn test_scan_report_on_early_stop() -> Result<()> {
    let catalog = memory_catalog()?;
    let mut table = create_table(&catalog, "t", PartitionSpec::unpartitioned(), &[]).await?;
    for i in 0..3 {
        table = table
            .new_fast_append()
            .append_file(data_file(&format!("f{i}"), StructValue::empty()))
            .commit()
            .await?;
    }

    let reporter = Arc::new(InMemoryMetricsReporter::new());
    let mut tasks = table
        .new_scan()
        .with_metrics_reporter(reporter.clone())
        .build()?
        .plan_files()
        .await?;
    assert!(tasks.next().await.transpose()?.is_some());
    assert!(reporter.scan_report().is_none());
    drop(tasks);

    let report = reporter.scan_report().unwrap();
    assert_eq!(report.table_name, "db.t");
    assert_eq!(report.snapshot_id, table.current_snapshot()?.unwrap().snapshot_id);
    assert!(report.metrics.result_data_files >= 1);
    assert!(report.metrics.result_data_files < 3);
    Ok(())
}

#[tokio::test]
async fn test_data_files_pruned_by_filter() -> Result<()> {
    let catalog = memory_catalog()?;
    let table = create_table(&catalog, "t", partitioned_by_category(), &[]).await?
        .new_fast_append()
        .append_files([data_file("x", category("x")), data_file("y", category("y"))])
        .commit()
        .await?
        .new_fast_append()
        .append_file(data_file("z", category("z")))
        .commit()
        .await?;

    let reporter = Arc::new(InMemoryMetricsReporter::new());
    let tasks: Vec<_> = table
        .new_scan()
        .with_filter(Reference::new("category").equal_to("y"))
        .with_metrics_reporter(reporter.clone())
        .build()?
        .plan_files()
        .await?
        .try_collect()
        .await?;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].file_path(), path("y"));
    assert_eq!(tasks[0].start, 0);
    assert_eq!(tasks[0].length, 1024);
    // The partition value alone decides the filter.
    assert_eq!(tasks[0].residual, BoundPredicate::AlwaysTrue);

    let metrics = reporter.scan_report().unwrap().metrics;
    assert_eq!(metrics.total_data_manifests, 2);
    assert_eq!(metrics.skipped_data_manifests, 1);
    assert_eq!(metrics.skipped_data_files, 1);

    let tasks: Vec<_> = table
        .new_scan()
        .with_filter(
            Reference::new("category")
                .equal_to("y")
                .and(Reference::new("data").less_than("c")),
        )
        .build()?
        .plan_files()
        .await?
        .try_collect()
        .await?;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].residual.to_string(), r#"data < "c""#);

    let err = table
        .new_scan()
        .with_filter(Reference::new("missing").equal_to("y"))
        .build()?
        .plan_files()
        .await
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::DataInvalid);
    Ok(())
}

#[tokio::test]
async fn test_table_on_local_fs() -> Result<()> {
    set_up();
    let dir = tempfile::tempdir().unwrap();
    let catalog = Arc::new(MemoryCatalog::new("fs", dir.path().to_str().unwrap())?);
    let ident = TableIdentifier::new(["db", "t"])?;
    let table = catalog
        .clone()
        .create_table(&ident, &schema(), &PartitionSpec::unpartitioned(), Default::default())
        .await?
        .new_fast_append()
        .append_file(data_file("a", StructValue::empty()))
        .commit()
        .await?;

    let loaded = catalog.clone().load_table(&ident).await?;
    assert_eq!(loaded.version(), table.version());
    assert_eq!(plan(&loaded).await?.len(), 1);
    assert!(dir.path().join("db/t/metadata").read_dir().unwrap().count() >= 4);
    Ok(())
}
