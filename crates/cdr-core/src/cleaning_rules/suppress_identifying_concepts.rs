use anyhow::{Result, bail};
use cdr_model::{QuerySpec, RuleDescriptor, Tier, WriteDisposition};
use cdr_warehouse::{QueryJob, TableRef, Warehouse, run_and_wait};
use tracing::debug;

use super::{descriptor, sql_id_list};
use crate::rule::{CleaningRule, RuleContext};

pub const RULE_ID: &str = "suppress_identifying_concepts";

/// Survey answers that directly identify a participant: street address,
/// city, zip code, phone number, and email.
const SUPPRESSED_CONCEPT_IDS: [i64; 5] = [1585246, 1585247, 1585248, 1585250, 1585252];

const LOOKUP_TABLE: &str = "lookup";

/// Removes observations about directly identifying survey answers.
///
/// Setup materializes the suppressed concepts in the sandbox so the
/// suppression list is kept next to the removed rows. Validation checks
/// that no observation still references them.
pub struct SuppressIdentifyingConcepts {
    descriptor: RuleDescriptor,
}

impl SuppressIdentifyingConcepts {
    pub fn new() -> cdr_model::Result<Self> {
        Ok(Self {
            descriptor: descriptor(
                RULE_ID,
                "Suppress observations that record directly identifying survey answers",
                &[Tier::RegisteredTierDeid, Tier::ControlledTierDeid],
                &["observation"],
            )?,
        })
    }
}

fn suppressed_condition() -> String {
    let ids = sql_id_list(&SUPPRESSED_CONCEPT_IDS);
    format!(
        "COALESCE(observation_concept_id, 0) IN ({ids}) \
         OR COALESCE(observation_source_concept_id, 0) IN ({ids})"
    )
}

impl CleaningRule for SuppressIdentifyingConcepts {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn setup(&self, ctx: &RuleContext, warehouse: &dyn Warehouse) -> Result<()> {
        let lookup = TableRef::new(&ctx.sandbox_dataset_id, ctx.sandbox_table_for(LOOKUP_TABLE));
        let query = format!(
            "SELECT concept_id, concept_name, vocabulary_id FROM concept WHERE concept_id IN ({})",
            sql_id_list(&SUPPRESSED_CONCEPT_IDS)
        );
        let job = QueryJob::new(query)
            .with_default_dataset(&ctx.dataset_id)
            .with_destination(lookup.clone(), WriteDisposition::Overwrite);
        let stats = run_and_wait(warehouse, &ctx.project_id, &job)?;
        debug!(lookup = %lookup, job_id = %stats.job_id, "materialized suppressed concept lookup");
        Ok(())
    }

    fn get_queries(&self, ctx: &RuleContext) -> Result<Vec<QuerySpec>> {
        ctx.sandbox_and_drop("observation", &suppressed_condition())
    }

    fn validate(&self, ctx: &RuleContext, warehouse: &dyn Warehouse) -> Result<()> {
        let job = QueryJob::new(format!(
            "SELECT observation_id FROM observation WHERE {}",
            suppressed_condition()
        ))
        .with_default_dataset(&ctx.dataset_id);
        let remaining = warehouse.count_rows(&ctx.project_id, &job)?;
        if remaining > 0 {
            bail!("{remaining} observation rows still reference suppressed concepts");
        }
        Ok(())
    }
}
