use anyhow::Result;
use cdr_model::{QuerySpec, RuleDescriptor, Tier};

use super::descriptor;
use crate::rule::{CleaningRule, RuleContext};

pub const RULE_ID: &str = "remove_non_existing_pids";

const TABLES: [&str; 6] = [
    "condition_occurrence",
    "drug_exposure",
    "measurement",
    "observation",
    "procedure_occurrence",
    "visit_occurrence",
];

const ORPHANED: &str = "person_id IS NULL \
    OR person_id NOT IN (SELECT person_id FROM person WHERE person_id IS NOT NULL)";

/// Drops clinical rows whose participant is missing from `person`.
pub struct RemoveNonExistingPids {
    descriptor: RuleDescriptor,
}

impl RemoveNonExistingPids {
    pub fn new() -> cdr_model::Result<Self> {
        Ok(Self {
            descriptor: descriptor(
                RULE_ID,
                "Sandbox and remove clinical rows whose person_id does not exist in the person table",
                &[Tier::Ehr, Tier::Unioned],
                &TABLES,
            )?,
        })
    }
}

impl CleaningRule for RemoveNonExistingPids {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn get_queries(&self, ctx: &RuleContext) -> Result<Vec<QuerySpec>> {
        let mut queries = Vec::with_capacity(TABLES.len() * 2);
        for table in TABLES {
            queries.extend(ctx.sandbox_and_drop(table, ORPHANED)?);
        }
        Ok(queries)
    }
}
