//! The shipped rule catalog.

use std::fs;
use std::path::PathBuf;

use cdr_core::cleaning_rules::{DropZeroConceptIds, RemoveNonExistingPids};
use cdr_core::{
    CleanError, Engine, EngineOptions, FunctionRule, Registry, RuleContext,
    build_default_registry,
};
use cdr_model::{QuerySpec, RuleDescriptor, RuleId, RuleStatus, Tier};
use cdr_warehouse::testing::{MockWarehouse, WarehouseCall};
use cdr_warehouse::{DatasetOptions, LocalWarehouse, TableRef, Warehouse};
use tempfile::TempDir;

fn planned(tier: Tier) -> Vec<String> {
    let registry = build_default_registry().unwrap();
    let options = EngineOptions::new();
    let warehouse = MockWarehouse::new();
    let engine = Engine::new(&registry, &warehouse, options);
    engine
        .plan(tier)
        .unwrap()
        .rule_ids()
        .into_iter()
        .map(ToString::to_string)
        .collect()
}

#[test]
fn every_tier_has_a_valid_plan() {
    for tier in Tier::ALL {
        let registry = build_default_registry().unwrap();
        let warehouse = MockWarehouse::new();
        let engine = Engine::new(&registry, &warehouse, EngineOptions::new());
        assert!(engine.plan(tier).is_ok(), "tier {tier} failed to plan");
    }
}

#[test]
fn tier_plans_follow_dependencies() {
    assert_eq!(
        planned(Tier::Combined),
        [
            "drop_zero_concept_ids",
            "no_data_after_death",
            "null_invalid_foreign_keys"
        ]
    );
    assert_eq!(
        planned(Tier::Unioned),
        ["drop_zero_concept_ids", "remove_non_existing_pids"]
    );
    assert_eq!(planned(Tier::Ehr), ["remove_non_existing_pids"]);
    assert_eq!(planned(Tier::Rdr), ["truncate_rdr_data"]);
    assert_eq!(
        planned(Tier::ControlledTierDeid),
        ["suppress_identifying_concepts"]
    );
    assert_eq!(
        planned(Tier::RegisteredTierFitbit),
        ["deduplicate_fitbit_rows"]
    );
    assert!(planned(Tier::Synthetic).is_empty());
}

#[test]
fn combined_queries_render_without_warehouse() {
    let registry = build_default_registry().unwrap();
    let warehouse = MockWarehouse::new();
    let engine = Engine::new(&registry, &warehouse, EngineOptions::new());

    let plan = engine.plan(Tier::Combined).unwrap();
    let rendered = engine.render_queries(&plan, "curation", "combined").unwrap();

    let foreign_keys = rendered
        .iter()
        .find(|rule| rule.rule_id.as_str() == "null_invalid_foreign_keys")
        .unwrap();
    assert!(
        foreign_keys
            .queries
            .iter()
            .any(|q| q.query_text().contains("REPLACE"))
    );
    let after_death = rendered
        .iter()
        .find(|rule| rule.rule_id.as_str() == "no_data_after_death")
        .unwrap();
    assert!(after_death.queries[0].query_text().contains("INTERVAL 30 DAY"));
    assert!(
        rendered
            .iter()
            .flat_map(|rule| &rule.queries)
            .all(|q| !q.query_text().contains("{{"))
    );
    assert!(warehouse.calls().is_empty());
}

#[test]
fn truncate_requires_cutoff_date() {
    let registry = build_default_registry().unwrap();
    let warehouse = MockWarehouse::new();
    let engine = Engine::new(&registry, &warehouse, EngineOptions::new());

    let report = engine.run("curation", "rdr", Tier::Rdr, None).unwrap();

    assert_eq!(report.status_of("truncate_rdr_data"), Some(RuleStatus::Failed));
    let error = report.outcomes[0].error.as_ref().unwrap();
    assert!(matches!(error, CleanError::RuleSetup { .. }));
    assert!(error.to_string().contains("cutoff_date"));
    assert!(warehouse.queries().is_empty());
}

#[test]
fn truncate_rejects_malformed_cutoff() {
    let registry = build_default_registry().unwrap();
    let warehouse = MockWarehouse::new();
    let options = EngineOptions::new().with_param("cutoff_date", "01/02/2024");
    let engine = Engine::new(&registry, &warehouse, options);

    let report = engine.run("curation", "rdr", Tier::Rdr, None).unwrap();

    let error = report.outcomes[0].error.as_ref().unwrap();
    assert!(error.to_string().contains("YYYY-MM-DD"));
}

#[test]
fn truncate_uses_cutoff_in_queries() {
    let registry = build_default_registry().unwrap();
    let warehouse = MockWarehouse::new();
    let options = EngineOptions::new().with_param("cutoff_date", "2024-01-01");
    let engine = Engine::new(&registry, &warehouse, options);

    let report = engine.run("curation", "rdr", Tier::Rdr, None).unwrap();

    assert!(report.is_success());
    assert_eq!(report.outcomes[0].queries_executed, 12);
    assert!(
        warehouse
            .queries()
            .iter()
            .all(|q| q.contains("CAST('2024-01-01' AS DATE)"))
    );
}

#[test]
fn suppression_builds_lookup_and_validates() {
    let registry = build_default_registry().unwrap();
    let warehouse = MockWarehouse::new();
    let engine = Engine::new(&registry, &warehouse, EngineOptions::new());

    let report = engine
        .run("curation", "deid", Tier::RegisteredTierDeid, None)
        .unwrap();
    assert!(report.is_success());

    let destinations: Vec<TableRef> = warehouse
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            WarehouseCall::RunQuery { destination, .. } => destination,
            _ => None,
        })
        .collect();
    assert_eq!(
        destinations[0],
        TableRef::new("deid_sandbox", "suppress_identifying_concepts_lookup")
    );
    assert!(
        warehouse
            .calls()
            .iter()
            .any(|call| matches!(call, WarehouseCall::CountRows { .. }))
    );
}

#[test]
fn suppression_reports_remaining_rows() {
    let registry = build_default_registry().unwrap();
    let warehouse = MockWarehouse::new().with_row_count(3);
    let engine = Engine::new(&registry, &warehouse, EngineOptions::new());

    let report = engine
        .run("curation", "deid", Tier::ControlledTierDeid, None)
        .unwrap();

    assert_eq!(
        report.status_of("suppress_identifying_concepts"),
        Some(RuleStatus::ValidationFailed)
    );
    let failures = report.validation_failures();
    assert!(
        failures[0]
            .error
            .as_ref()
            .is_some_and(|e| e.to_string().contains("3 observation rows"))
    );
}

#[test]
fn drop_zero_concept_ids_cleans_local_tables() {
    let dir = TempDir::new().unwrap();
    let warehouse = LocalWarehouse::open(dir.path()).unwrap();
    warehouse
        .create_dataset("curation", "unioned", &DatasetOptions::new())
        .unwrap();
    let dataset_dir = dir.path().join("curation").join("unioned");
    for (table, concept, source) in [
        ("condition_occurrence", "condition_concept_id", "condition_source_concept_id"),
        ("device_exposure", "device_concept_id", "device_source_concept_id"),
        ("drug_exposure", "drug_concept_id", "drug_source_concept_id"),
        ("measurement", "measurement_concept_id", "measurement_source_concept_id"),
        ("procedure_occurrence", "procedure_concept_id", "procedure_source_concept_id"),
        ("visit_occurrence", "visit_concept_id", "visit_source_concept_id"),
    ] {
        fs::write(
            dataset_dir.join(format!("{table}.csv")),
            format!("id,person_id,{concept},{source}\n1,10,3000,0\n"),
        )
        .unwrap();
    }
    fs::write(
        dataset_dir.join("observation.csv"),
        "id,person_id,observation_concept_id,observation_source_concept_id\n\
         1,10,0,0\n2,10,4000,0\n3,11,0,1585248\n4,12,0,0\n",
    )
    .unwrap();

    let mut registry = Registry::new();
    registry.register(DropZeroConceptIds::new().unwrap()).unwrap();
    let engine = Engine::new(&registry, &warehouse, EngineOptions::new());

    let report = engine.run("curation", "unioned", Tier::Unioned, None).unwrap();
    assert!(report.is_success(), "{report:?}");

    let observation = warehouse
        .read_table("curation", &TableRef::new("unioned", "observation"))
        .unwrap();
    assert_eq!(observation.height(), 2);
    let sandboxed = warehouse
        .read_table(
            "curation",
            &TableRef::new("unioned_sandbox", "drop_zero_concept_ids_observation"),
        )
        .unwrap();
    assert_eq!(sandboxed.height(), 2);
    let measurement = warehouse
        .read_table("curation", &TableRef::new("unioned", "measurement"))
        .unwrap();
    assert_eq!(measurement.height(), 1);
}

/// Local warehouse with an empty `curation.<dataset>` and the dataset's directory.
fn local_dataset(dataset: &str) -> (TempDir, LocalWarehouse, PathBuf) {
    let dir = TempDir::new().unwrap();
    let warehouse = LocalWarehouse::open(dir.path()).unwrap();
    warehouse
        .create_dataset("curation", dataset, &DatasetOptions::new())
        .unwrap();
    let dataset_dir = dir.path().join("curation").join(dataset);
    (dir, warehouse, dataset_dir)
}

fn rows(warehouse: &LocalWarehouse, dataset: &str, table: &str) -> usize {
    warehouse
        .read_table("curation", &TableRef::new(dataset, table))
        .unwrap()
        .height()
}

#[test]
fn null_conditions_keep_the_row_in_the_target() {
    fn drop_negative(ctx: &RuleContext) -> anyhow::Result<Vec<QuerySpec>> {
        ctx.sandbox_and_drop("measurement", "value_as_number < 0")
    }

    let (_dir, warehouse, dataset_dir) = local_dataset("combined");
    fs::write(
        dataset_dir.join("measurement.csv"),
        "measurement_id,value_as_number\n1,5.0\n2,-1.0\n3,\n",
    )
    .unwrap();
    let descriptor = RuleDescriptor::new(RuleId::new("drop_negative").unwrap(), "test")
        .with_tiers([Tier::Combined])
        .with_tables(["measurement"]);
    let mut registry = Registry::new();
    registry
        .register(FunctionRule::new(descriptor, drop_negative))
        .unwrap();
    let engine = Engine::new(&registry, &warehouse, EngineOptions::new());

    let report = engine.run("curation", "combined", Tier::Combined, None).unwrap();
    assert!(report.is_success(), "{report:?}");

    let kept = rows(&warehouse, "combined", "measurement");
    let sandboxed = rows(&warehouse, "combined_sandbox", "drop_negative_measurement");
    assert_eq!(kept, 2);
    assert_eq!(sandboxed, 1);
    assert_eq!(kept + sandboxed, 3);
}

#[test]
fn drop_zero_concept_ids_accounts_for_null_concepts() {
    let (_dir, warehouse, dataset_dir) = local_dataset("unioned");
    for (table, concept, source) in [
        ("condition_occurrence", "condition_concept_id", "condition_source_concept_id"),
        ("device_exposure", "device_concept_id", "device_source_concept_id"),
        ("drug_exposure", "drug_concept_id", "drug_source_concept_id"),
        ("measurement", "measurement_concept_id", "measurement_source_concept_id"),
        ("procedure_occurrence", "procedure_concept_id", "procedure_source_concept_id"),
        ("visit_occurrence", "visit_concept_id", "visit_source_concept_id"),
    ] {
        fs::write(
            dataset_dir.join(format!("{table}.csv")),
            format!("id,person_id,{concept},{source}\n1,10,3000,0\n"),
        )
        .unwrap();
    }
    fs::write(
        dataset_dir.join("observation.csv"),
        "id,person_id,observation_concept_id,observation_source_concept_id\n\
         1,10,,0\n2,10,4000,\n3,11,,\n4,12,0,1585248\n",
    )
    .unwrap();

    let mut registry = Registry::new();
    registry.register(DropZeroConceptIds::new().unwrap()).unwrap();
    let engine = Engine::new(&registry, &warehouse, EngineOptions::new());

    let report = engine.run("curation", "unioned", Tier::Unioned, None).unwrap();
    assert!(report.is_success(), "{report:?}");

    let kept = rows(&warehouse, "unioned", "observation");
    let sandboxed = rows(
        &warehouse,
        "unioned_sandbox",
        "drop_zero_concept_ids_observation",
    );
    assert_eq!(kept, 2);
    assert_eq!(sandboxed, 2);
    assert_eq!(kept + sandboxed, 4);
}

#[test]
fn remove_non_existing_pids_ignores_null_person_ids() {
    let (_dir, warehouse, dataset_dir) = local_dataset("ehr");
    fs::write(
        dataset_dir.join("person.csv"),
        "person_id,gender_concept_id\n10,8507\n,8532\n",
    )
    .unwrap();
    for table in [
        "condition_occurrence",
        "drug_exposure",
        "measurement",
        "procedure_occurrence",
        "visit_occurrence",
    ] {
        fs::write(dataset_dir.join(format!("{table}.csv")), "id,person_id\n1,10\n").unwrap();
    }
    fs::write(
        dataset_dir.join("observation.csv"),
        "id,person_id\n1,10\n2,11\n3,\n",
    )
    .unwrap();

    let mut registry = Registry::new();
    registry
        .register(RemoveNonExistingPids::new().unwrap())
        .unwrap();
    let engine = Engine::new(&registry, &warehouse, EngineOptions::new());

    let report = engine.run("curation", "ehr", Tier::Ehr, None).unwrap();
    assert!(report.is_success(), "{report:?}");

    let kept = rows(&warehouse, "ehr", "observation");
    let sandboxed = rows(
        &warehouse,
        "ehr_sandbox",
        "remove_non_existing_pids_observation",
    );
    assert_eq!(kept, 1);
    assert_eq!(sandboxed, 2);
    assert_eq!(rows(&warehouse, "ehr", "measurement"), 1);
}
