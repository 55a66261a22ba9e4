//! Integration tests for the CLI workflow helpers.

use std::fs;
use std::time::Duration;

use cdr_cli::workflow::{
    EXIT_FAILED, EXIT_VALIDATION_FAILED, engine_options, exit_code, load_registry,
    overrides_from, parse_param, parse_params, write_report_json,
};
use cdr_core::{CleanError, RuleOutcome, RunReport};
use cdr_model::{RuleId, Tier};
use tempfile::TempDir;

fn id(value: &str) -> RuleId {
    RuleId::new(value).unwrap()
}

fn report() -> RunReport {
    let mut report = RunReport::new("curation", "combined", "combined_sandbox", Tier::Combined);
    report.push(RuleOutcome::completed(id("a"), 2, Duration::from_millis(5)));
    report
}

#[test]
fn test_parse_param_splits_on_first_equals() {
    assert_eq!(
        parse_param("cutoff_date=2024-01-01").unwrap(),
        ("cutoff_date".to_string(), "2024-01-01".to_string())
    );
    assert_eq!(
        parse_param("filter=a=b").unwrap(),
        ("filter".to_string(), "a=b".to_string())
    );
    assert!(parse_param("cutoff_date").is_err());
    assert!(parse_param(" =x").is_err());
}

#[test]
fn test_parse_params_last_value_wins() {
    let params = parse_params(&["a=1".to_string(), "a=2".to_string()]).unwrap();
    assert_eq!(params.len(), 1);
    assert_eq!(params["a"], "2");
}

#[test]
fn test_engine_options_from_flags() {
    let options = engine_options(&["cutoff_date=2024-01-01".to_string()], Some("q1"), false)
        .unwrap();
    assert!(!options.run_validation);
    assert_eq!(options.params["cutoff_date"], "2024-01-01");
    assert_eq!(options.namer_for(&id("r1")), "q1_r1");
}

#[test]
fn test_overrides_absent_without_flags() {
    assert!(overrides_from(&[], &[]).is_none());
    let overrides = overrides_from(&[], &[id("b")]).unwrap();
    assert!(overrides.excludes(&id("b")));
    assert!(!overrides.excludes(&id("a")));
}

#[test]
fn test_load_registry_with_manifest() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rules.json");
    fs::write(
        &path,
        r#"{"rules": [{
            "rule_id": "drop_test_people",
            "description": "Remove synthetic test participants",
            "tiers": ["rdr"],
            "queries": [{"sql": "SELECT * FROM person WHERE person_id > 0",
                         "destination_table": "person",
                         "write_disposition": "overwrite"}]
        }]}"#,
    )
    .unwrap();

    let base = load_registry(None).unwrap();
    let extended = load_registry(Some(&path)).unwrap();
    assert_eq!(extended.len(), base.len() + 1);
    assert!(extended.contains("drop_test_people"));
}

#[test]
fn test_load_registry_reports_missing_manifest() {
    let dir = TempDir::new().unwrap();
    let err = load_registry(Some(&dir.path().join("absent.json"))).unwrap_err();
    assert!(format!("{err:#}").contains("absent.json"));
}

#[test]
fn test_exit_codes() {
    assert_eq!(exit_code(&report()), 0);

    let mut validation = report();
    validation.push(RuleOutcome::validation_failed(
        id("b"),
        1,
        Duration::ZERO,
        CleanError::Validation {
            rule_id: id("b"),
            source: anyhow::anyhow!("rows remain"),
        },
    ));
    assert_eq!(exit_code(&validation), EXIT_VALIDATION_FAILED);

    let mut failed = validation;
    failed.push(RuleOutcome::failed(
        id("c"),
        0,
        Duration::ZERO,
        CleanError::configuration("c", "broken"),
    ));
    failed.push(RuleOutcome::skipped(id("d")));
    assert_eq!(exit_code(&failed), EXIT_FAILED);
}

#[test]
fn test_write_report_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.json");
    let mut report = report();
    report.push(RuleOutcome::skipped(id("b")));

    write_report_json(&report, &path, 100).unwrap();

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["tier"], "combined");
    assert_eq!(json["success"], true);
    assert_eq!(json["rules"][0]["rule_id"], "a");
    assert_eq!(json["rules"][0]["queries_executed"], 2);
    assert_eq!(json["rules"][1]["status"], "skipped");
    assert!(json["rules"][1].get("error").is_none());
}
