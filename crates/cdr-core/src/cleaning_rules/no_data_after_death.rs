use std::collections::BTreeMap;

use anyhow::Result;
use cdr_model::{QuerySpec, RuleDescriptor, RuleId, Tier};

use super::descriptor;
use super::drop_zero_concept_ids;
use crate::rule::{CleaningRule, RuleContext};
use crate::template::render;

pub const RULE_ID: &str = "no_data_after_death";

/// Days after death during which records are still accepted.
const GRACE_DAYS: u32 = 30;

const DATE_COLUMNS: [(&str, &str); 6] = [
    ("condition_occurrence", "condition_start_date"),
    ("drug_exposure", "drug_exposure_start_date"),
    ("measurement", "measurement_date"),
    ("observation", "observation_date"),
    ("procedure_occurrence", "procedure_date"),
    ("visit_occurrence", "visit_start_date"),
];

const AFTER_DEATH: &str = "EXISTS (
    SELECT 1 FROM death AS d
    WHERE d.person_id = {{ table }}.person_id
      AND {{ table }}.{{ date_column }} > DATE_ADD(d.death_date, INTERVAL {{ grace_days }} DAY)
)";

/// Removes events recorded well after a participant's death.
pub struct NoDataAfterDeath {
    descriptor: RuleDescriptor,
}

impl NoDataAfterDeath {
    pub fn new() -> cdr_model::Result<Self> {
        let tables: Vec<&str> = DATE_COLUMNS.iter().map(|(table, _)| *table).collect();
        let descriptor = descriptor(
            RULE_ID,
            "Sandbox and remove events dated more than 30 days after the participant's death",
            &[Tier::Combined],
            &tables,
        )?
        .depends_on([RuleId::new(drop_zero_concept_ids::RULE_ID)?]);
        Ok(Self { descriptor })
    }
}

impl CleaningRule for NoDataAfterDeath {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn get_queries(&self, ctx: &RuleContext) -> Result<Vec<QuerySpec>> {
        let mut queries = Vec::with_capacity(DATE_COLUMNS.len() * 2);
        for (table, date_column) in DATE_COLUMNS {
            let vars = BTreeMap::from([
                ("table".to_string(), table.to_string()),
                ("date_column".to_string(), date_column.to_string()),
                ("grace_days".to_string(), GRACE_DAYS.to_string()),
            ]);
            let condition = render(AFTER_DEATH, &vars)?;
            queries.extend(ctx.sandbox_and_drop(table, &condition)?);
        }
        Ok(queries)
    }
}
