mod common;

use cdr_core::{CleanError, FunctionRule, Registry, build_default_registry};
use cdr_model::{RuleDescriptor, Tier};

use common::{TableRule, descriptor, id};

fn no_queries(_ctx: &cdr_core::RuleContext) -> anyhow::Result<Vec<cdr_model::QuerySpec>> {
    Ok(Vec::new())
}

#[test]
fn rules_are_listed_per_tier() {
    let mut registry = Registry::new();
    registry.register(TableRule::new("b", &[], &["person"])).unwrap();
    registry.register(TableRule::new("a", &[], &["person"])).unwrap();
    registry
        .register(FunctionRule::new(
            RuleDescriptor::new(id("rdr_only"), "rdr rule").with_tiers([Tier::Rdr]),
            no_queries,
        ))
        .unwrap();

    let combined: Vec<&str> = registry
        .rules_for_tier(Tier::Combined)
        .iter()
        .map(|d| d.rule_id.as_str())
        .collect();
    assert_eq!(combined, ["a", "b"]);
    assert_eq!(registry.rules_for_tier(Tier::Rdr).len(), 1);
    assert!(registry.rules_for_tier(Tier::Fitbit).is_empty());
    assert_eq!(registry.len(), 3);
    assert!(registry.get("rdr_only").is_some());
    assert!(registry.get("missing").is_none());
}

#[test]
fn duplicate_ids_are_rejected() {
    let mut registry = Registry::new();
    registry.register(TableRule::new("a", &[], &["person"])).unwrap();
    let err = registry
        .register(TableRule::new("a", &[], &["observation"]))
        .unwrap_err();
    assert!(matches!(err, CleanError::Configuration { rule_id, .. } if rule_id == "a"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn malformed_descriptors_are_rejected() {
    let mut registry = Registry::new();

    let no_tiers = RuleDescriptor::new(id("no_tiers"), "has no tiers");
    assert!(registry.register(FunctionRule::new(no_tiers, no_queries)).is_err());

    let blank = RuleDescriptor::new(id("blank"), "  ").with_tiers([Tier::Combined]);
    assert!(registry.register(FunctionRule::new(blank, no_queries)).is_err());

    let self_dependent = descriptor("loop", &["loop"]);
    assert!(registry.register(FunctionRule::new(self_dependent, no_queries)).is_err());

    assert!(registry.is_empty());
}

#[test]
fn default_registry_contains_catalog() {
    let registry = build_default_registry().unwrap();
    assert_eq!(registry.len(), 7);
    for rule_id in [
        "deduplicate_fitbit_rows",
        "drop_zero_concept_ids",
        "no_data_after_death",
        "null_invalid_foreign_keys",
        "remove_non_existing_pids",
        "suppress_identifying_concepts",
        "truncate_rdr_data",
    ] {
        assert!(registry.contains(rule_id), "missing {rule_id}");
    }
}
