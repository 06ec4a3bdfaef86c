mod utils;

use std::sync::Arc;

use futures::TryStreamExt;
use icefloe::expr::{BoundPredicate, Reference};
use icefloe::metrics::InMemoryMetricsReporter;
use icefloe::types::{PartitionSpec, StructValue, Transform};
use icefloe::Result;
pub use utils::*;

#[tokio::test]
async fn test_positional_deletes_match_referenced_path() -> Result<()> {
    let catalog = memory_catalog()?;
    let table = create_table(&catalog, "t", PartitionSpec::unpartitioned(), &[]).await?
        .new_fast_append()
        .append_files([
            data_file("a", StructValue::empty()),
            data_file("b", StructValue::empty()),
        ])
        .commit()
        .await?
        .new_row_delta()
        .add_deletes(pos_delete("del-a", Some(&path("a")), StructValue::empty()))
        .add_deletes(pos_delete("del-any", None, StructValue::empty()))
        .validate_data_files_exist([path("a")])
        .commit()
        .await?;

    let tasks = plan(&table).await?;
    assert_eq!(tasks.len(), 2);
    assert_eq!(
        delete_paths(task(&tasks, "a")),
        vec![path("del-a"), path("del-any")]
    );
    assert_eq!(delete_paths(task(&tasks, "b")), vec![path("del-any")]);
    Ok(())
}

#[tokio::test]
async fn test_deletes_only_apply_to_older_data() -> Result<()> {
    let catalog = memory_catalog()?;
    let table = create_table(&catalog, "t", PartitionSpec::unpartitioned(), &[]).await?
        .new_row_delta()
        .add_deletes(eq_delete("eq-before", "a", "z", StructValue::empty()))
        .commit()
        .await?
        .new_row_delta()
        .add_rows(data_file("a", StructValue::empty()))
        .add_deletes(eq_delete("eq-same", "a", "z", StructValue::empty()))
        .add_deletes(pos_delete("pos-same", Some(&path("a")), StructValue::empty()))
        .commit()
        .await?;

    let tasks = plan(&table).await?;
    // Equality deletes of the same commit don't apply, positional ones do.
    assert_eq!(delete_paths(task(&tasks, "a")), vec![path("pos-same")]);

    let table = table
        .new_row_delta()
        .add_deletes(eq_delete("eq-after", "a", "z", StructValue::empty()))
        .commit()
        .await?;
    let tasks = plan(&table).await?;
    assert_eq!(
        delete_paths(task(&tasks, "a")),
        vec![path("eq-after"), path("pos-same")]
    );
    Ok(())
}

#[tokio::test]
async fn test_equality_deletes_pruned_by_bounds() -> Result<()> {
    let catalog = memory_catalog()?;
    let table = create_table(&catalog, "t", PartitionSpec::unpartitioned(), &[]).await?
        .new_fast_append()
        .append_file(data_file("a", StructValue::empty()))
        .commit()
        .await?
        .new_row_delta()
        .add_deletes(eq_delete("eq-d", "d", "d", StructValue::empty()))
        .add_deletes(eq_delete("eq-x", "x", "x", StructValue::empty()))
        .commit()
        .await?;

    let tasks = plan(&table).await?;
    assert_eq!(delete_paths(task(&tasks, "a")), vec![path("eq-d")]);
    Ok(())
}

#[tokio::test]
async fn test_equality_deletes_of_nulls() -> Result<()> {
    let catalog = memory_catalog()?;
    let table = create_table(&catalog, "t", PartitionSpec::unpartitioned(), &[]).await?
        .new_fast_append()
        .append_files([
            data_file("with-nulls", StructValue::empty()),
            non_null_data_file("without-nulls", StructValue::empty()),
        ])
        .commit()
        .await?
        .new_row_delta()
        .add_deletes(null_eq_delete("eq-null", StructValue::empty()))
        .commit()
        .await?;

    let tasks = plan(&table).await?;
    assert_eq!(
        delete_paths(task(&tasks, "with-nulls")),
        vec![path("eq-null")]
    );
    assert!(task(&tasks, "without-nulls").deletes.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_filter_prunes_deletes_unless_residuals_ignored() -> Result<()> {
    let catalog = memory_catalog()?;
    let table = create_table(&catalog, "t", PartitionSpec::unpartitioned(), &[]).await?
        .new_fast_append()
        .append_file(data_file("a", StructValue::empty()))
        .commit()
        .await?
        .new_row_delta()
        .add_deletes(eq_delete("eq-a-c", "a", "c", StructValue::empty()))
        .commit()
        .await?;

    let filter = Reference::new("data").greater_than_or_equal_to("d");
    let tasks: Vec<_> = table
        .new_scan()
        .with_filter(filter.clone())
        .build()?
        .plan_files()
        .await?
        .try_collect()
        .await?;
    assert_eq!(tasks.len(), 1);
    assert!(tasks[0].deletes.is_empty());
    assert_ne!(tasks[0].residual, BoundPredicate::AlwaysTrue);

    let tasks: Vec<_> = table
        .new_scan()
        .with_filter(filter)
        .with_ignore_residuals(true)
        .build()?
        .plan_files()
        .await?
        .try_collect()
        .await?;
    assert_eq!(delete_paths(&tasks[0]), vec![path("eq-a-c")]);
    assert_eq!(tasks[0].residual, BoundPredicate::AlwaysTrue);
    Ok(())
}

#[tokio::test]
async fn test_partition_pruning_of_deletes() -> Result<()> {
    let catalog = memory_catalog()?;
    let table = create_table(&catalog, "t", partitioned_by_category(), &[]).await?
        .new_fast_append()
        .append_files([data_file("x", category("x")), data_file("y", category("y"))])
        .commit()
        .await?
        .new_row_delta()
        .add_deletes(eq_delete("eq-x", "a", "z", category("x")))
        .add_deletes(pos_delete("pos-z", None, category("z")))
        .commit()
        .await?
        .new_row_delta()
        .add_deletes(eq_delete("eq-y", "a", "z", category("y")))
        .commit()
        .await?;

    let reporter = Arc::new(InMemoryMetricsReporter::new());
    let tasks: Vec<_> = table
        .new_scan()
        .with_filter(Reference::new("category").equal_to("x"))
        .with_metrics_reporter(reporter.clone())
        .build()?
        .plan_files()
        .await?
        .try_collect()
        .await?;
    assert_eq!(tasks.len(), 1);
    assert_eq!(delete_paths(task(&tasks, "x")), vec![path("eq-x")]);

    let metrics = reporter.scan_report().unwrap().metrics;
    assert_eq!(metrics.total_delete_manifests, 2);
    assert_eq!(metrics.skipped_delete_manifests, 1);
    assert_eq!(metrics.equality_delete_files, 1);
    assert_eq!(metrics.positional_delete_files, 0);
    assert_eq!(metrics.skipped_delete_files, 1);
    assert_eq!(metrics.total_data_manifests, 1);
    assert_eq!(metrics.result_data_files, 1);
    assert_eq!(metrics.skipped_data_files, 1);
    Ok(())
}

#[tokio::test]
async fn test_deletes_across_partition_specs() -> Result<()> {
    let catalog = memory_catalog()?;
    let table = create_table(&catalog, "t", PartitionSpec::unpartitioned(), &[]).await?
        .new_fast_append()
        .append_file(data_file("old", StructValue::empty()))
        .commit()
        .await?
        .update_spec()
        .add_field("category", Transform::Identity)
        .commit()
        .await?
        .new_fast_append()
        .append_file(data_file("new", category("x")))
        .commit()
        .await?
        .update_spec()
        .unpartitioned()
        .commit()
        .await?
        .new_row_delta()
        .add_deletes(eq_delete("eq-global", "a", "z", StructValue::empty()))
        .commit()
        .await?
        .update_spec()
        .add_field("category", Transform::Identity)
        .commit()
        .await?;
    assert_eq!(table.metadata().default_spec_id, 1);

    let table = table
        .new_row_delta()
        .add_deletes(eq_delete("eq-x", "a", "z", category("x")))
        .commit()
        .await?;

    let tasks = plan(&table).await?;
    assert_eq!(task(&tasks, "old").spec_id(), 0);
    assert_eq!(task(&tasks, "new").spec_id(), 1);
    // Unpartitioned equality deletes apply to every spec.
    assert_eq!(delete_paths(task(&tasks, "old")), vec![path("eq-global")]);
    assert_eq!(
        delete_paths(task(&tasks, "new")),
        vec![path("eq-global"), path("eq-x")]
    );
    Ok(())
}
