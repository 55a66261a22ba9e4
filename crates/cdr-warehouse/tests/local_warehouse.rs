//! Tests for the file-backed local warehouse.

use std::fs;

use cdr_model::WriteDisposition;
use cdr_warehouse::{
    DatasetOptions, LocalWarehouse, QueryJob, TableRef, Warehouse, WarehouseError, run_and_wait,
};
use tempfile::TempDir;

const PROJECT: &str = "curation";

fn warehouse_with_observation() -> (TempDir, LocalWarehouse) {
    let dir = TempDir::new().unwrap();
    let warehouse = LocalWarehouse::open(dir.path()).unwrap();
    warehouse
        .create_dataset(PROJECT, "combined", &DatasetOptions::new())
        .unwrap();
    fs::write(
        dir.path().join(PROJECT).join("combined").join("observation.csv"),
        "observation_id,person_id,value\n1,10,5\n2,11,0\n3,12,7\n",
    )
    .unwrap();
    (dir, warehouse)
}

#[test]
fn create_and_list_datasets() {
    let (_dir, warehouse) = warehouse_with_observation();
    warehouse
        .create_dataset(
            PROJECT,
            "combined_sandbox",
            &DatasetOptions::new().with_label("phase", "sandbox"),
        )
        .unwrap();

    let datasets = warehouse.list_datasets(PROJECT).unwrap();
    assert_eq!(datasets, vec!["combined", "combined_sandbox"]);

    let info = warehouse.dataset_info(PROJECT, "combined_sandbox").unwrap();
    assert_eq!(info.labels.get("phase").map(String::as_str), Some("sandbox"));
}

#[test]
fn create_existing_dataset_requires_exists_ok() {
    let (_dir, warehouse) = warehouse_with_observation();
    let err = warehouse
        .create_dataset(PROJECT, "combined", &DatasetOptions::new())
        .unwrap_err();
    assert!(matches!(err, WarehouseError::DatasetExists { .. }));

    warehouse
        .create_dataset(PROJECT, "combined", &DatasetOptions::new().exists_ok(true))
        .unwrap();
}

#[test]
fn query_materializes_into_destination() {
    let (_dir, warehouse) = warehouse_with_observation();
    let job = QueryJob::new("SELECT * FROM observation WHERE value > 0")
        .with_default_dataset("combined")
        .with_destination(TableRef::new("combined", "observation"), WriteDisposition::Overwrite);

    let stats = run_and_wait(&warehouse, PROJECT, &job).unwrap();
    assert_eq!(stats.rows_written, Some(2));

    let table = warehouse
        .read_table(PROJECT, &TableRef::new("combined", "observation"))
        .unwrap();
    assert_eq!(table.height(), 2);
}

#[test]
fn fail_if_exists_rejects_populated_destination() {
    let (_dir, warehouse) = warehouse_with_observation();
    let job = QueryJob::new("SELECT * FROM observation")
        .with_default_dataset("combined")
        .with_destination(
            TableRef::new("combined", "observation"),
            WriteDisposition::FailIfExists,
        );

    let err = run_and_wait(&warehouse, PROJECT, &job).unwrap_err();
    assert_eq!(err.reason(), "duplicate");
    assert!(err.job_id().is_some_and(|id| id.starts_with("curation_job_")));
}

#[test]
fn append_adds_rows() {
    let (_dir, warehouse) = warehouse_with_observation();
    let job = QueryJob::new("SELECT * FROM observation WHERE value = 0")
        .with_default_dataset("combined")
        .with_destination(TableRef::new("combined", "observation"), WriteDisposition::Append);

    run_and_wait(&warehouse, PROJECT, &job).unwrap();

    let table = warehouse
        .read_table(PROJECT, &TableRef::new("combined", "observation"))
        .unwrap();
    assert_eq!(table.height(), 4);
}

#[test]
fn invalid_sql_reports_job_error() {
    let (_dir, warehouse) = warehouse_with_observation();
    let job = QueryJob::new("SELECT * FROM missing_table").with_default_dataset("combined");

    let err = run_and_wait(&warehouse, PROJECT, &job).unwrap_err();
    assert!(matches!(err, WarehouseError::Job(_)));
}

#[test]
fn count_rows_does_not_write() {
    let (_dir, warehouse) = warehouse_with_observation();
    let job = QueryJob::new("SELECT * FROM observation WHERE value = 0")
        .with_default_dataset("combined");

    assert_eq!(warehouse.count_rows(PROJECT, &job).unwrap(), 1);
    let table = warehouse
        .read_table(PROJECT, &TableRef::new("combined", "observation"))
        .unwrap();
    assert_eq!(table.height(), 3);
}

#[test]
fn delete_dataset_requires_delete_contents() {
    let (_dir, warehouse) = warehouse_with_observation();
    let err = warehouse
        .delete_dataset(PROJECT, "combined", false)
        .unwrap_err();
    assert!(matches!(err, WarehouseError::DatasetNotEmpty { tables: 1, .. }));

    warehouse.delete_dataset(PROJECT, "combined", true).unwrap();
    assert!(warehouse.list_datasets(PROJECT).unwrap().is_empty());
}
