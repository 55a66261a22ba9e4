use std::collections::BTreeSet;

use cdr_model::{ModelError, QuerySpec, RuleDescriptor, RuleId, RuleStatus, Tier, WriteDisposition};

#[test]
fn descriptor_reads_minimal_json() {
    let json = r#"{
        "rule_id": " no_data_after_death ",
        "description": "Remove events after death",
        "affected_tiers": ["combined"],
        "depends_on": ["drop_zero_concept_ids"]
    }"#;
    let descriptor: RuleDescriptor = serde_json::from_str(json).unwrap();

    assert_eq!(descriptor.rule_id.as_str(), "no_data_after_death");
    assert!(descriptor.applies_to(Tier::Combined));
    assert!(!descriptor.applies_to(Tier::Rdr));
    assert!(descriptor.affected_tables.is_empty());
    assert!(!descriptor.depends_on_itself());
}

#[test]
fn rule_ids_order_lexically() {
    let ids: BTreeSet<RuleId> = ["r3", "R1", "r2"]
        .into_iter()
        .map(|id| RuleId::new(id).unwrap())
        .collect();
    let ordered: Vec<&str> = ids.iter().map(RuleId::as_str).collect();
    assert_eq!(ordered, ["R1", "r2", "r3"]);
}

#[test]
fn tier_names_parse_loosely() {
    assert_eq!("Registered-Tier-Deid".parse::<Tier>(), Ok(Tier::RegisteredTierDeid));
    assert!(matches!("bronze".parse::<Tier>(), Err(ModelError::UnknownTier(_))));
    assert_eq!(Tier::ALL.len(), 14);
}

#[test]
fn query_spec_serializes_disposition() {
    let spec = QuerySpec::new("SELECT DISTINCT * FROM steps_intraday")
        .unwrap()
        .into_table("steps_intraday")
        .overwrite();
    let json = serde_json::to_value(&spec).unwrap();
    assert_eq!(json["write_disposition"], "overwrite");
    assert_eq!(json["destination_table"], "steps_intraday");

    let back: QuerySpec = serde_json::from_value(json).unwrap();
    assert_eq!(back.write_disposition(), WriteDisposition::Overwrite);
}

#[test]
fn statuses_display_snake_case() {
    assert_eq!(RuleStatus::ValidationFailed.to_string(), "validation_failed");
    assert_eq!(
        serde_json::to_string(&RuleStatus::Skipped).unwrap(),
        "\"skipped\""
    );
}
