use anyhow::Result;
use cdr_model::{QuerySpec, RuleDescriptor, Tier};

use super::descriptor;
use crate::rule::{CleaningRule, RuleContext};

pub const RULE_ID: &str = "drop_zero_concept_ids";

/// Table, standard concept column, source concept column.
const CONCEPT_COLUMNS: [(&str, &str, &str); 7] = [
    ("condition_occurrence", "condition_concept_id", "condition_source_concept_id"),
    ("device_exposure", "device_concept_id", "device_source_concept_id"),
    ("drug_exposure", "drug_concept_id", "drug_source_concept_id"),
    ("measurement", "measurement_concept_id", "measurement_source_concept_id"),
    ("observation", "observation_concept_id", "observation_source_concept_id"),
    ("procedure_occurrence", "procedure_concept_id", "procedure_source_concept_id"),
    ("visit_occurrence", "visit_concept_id", "visit_source_concept_id"),
];

/// Removes rows that carry no concept at all.
pub struct DropZeroConceptIds {
    descriptor: RuleDescriptor,
}

impl DropZeroConceptIds {
    pub fn new() -> cdr_model::Result<Self> {
        let tables: Vec<&str> = CONCEPT_COLUMNS.iter().map(|(table, _, _)| *table).collect();
        Ok(Self {
            descriptor: descriptor(
                RULE_ID,
                "Sandbox and remove rows whose standard and source concept ids are both 0 or NULL",
                &[Tier::Unioned, Tier::Combined],
                &tables,
            )?,
        })
    }
}

impl CleaningRule for DropZeroConceptIds {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn get_queries(&self, ctx: &RuleContext) -> Result<Vec<QuerySpec>> {
        let mut queries = Vec::with_capacity(CONCEPT_COLUMNS.len() * 2);
        for (table, concept, source_concept) in CONCEPT_COLUMNS {
            let condition =
                format!("COALESCE({concept}, 0) = 0 AND COALESCE({source_concept}, 0) = 0");
            queries.extend(ctx.sandbox_and_drop(table, &condition)?);
        }
        Ok(queries)
    }
}
