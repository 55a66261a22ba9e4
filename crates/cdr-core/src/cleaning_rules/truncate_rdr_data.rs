use anyhow::{Context, Result};
use cdr_model::{QuerySpec, RuleDescriptor, Tier};
use cdr_warehouse::Warehouse;
use chrono::NaiveDate;
use tracing::info;

use super::descriptor;
use crate::rule::{CleaningRule, RuleContext};

pub const RULE_ID: &str = "truncate_rdr_data";

/// Run parameter holding the last date to keep, as `YYYY-MM-DD`.
pub const CUTOFF_PARAM: &str = "cutoff_date";

const DATE_COLUMNS: [(&str, &str); 6] = [
    ("condition_occurrence", "condition_start_date"),
    ("drug_exposure", "drug_exposure_start_date"),
    ("measurement", "measurement_date"),
    ("observation", "observation_date"),
    ("procedure_occurrence", "procedure_date"),
    ("visit_occurrence", "visit_start_date"),
];

/// Removes participant-provided records dated after the export cutoff.
pub struct TruncateRdrData {
    descriptor: RuleDescriptor,
}

impl TruncateRdrData {
    pub fn new() -> cdr_model::Result<Self> {
        let tables: Vec<&str> = DATE_COLUMNS.iter().map(|(table, _)| *table).collect();
        Ok(Self {
            descriptor: descriptor(
                RULE_ID,
                "Sandbox and remove RDR records dated after the cutoff_date run parameter",
                &[Tier::Rdr],
                &tables,
            )?,
        })
    }
}

fn cutoff(ctx: &RuleContext) -> Result<NaiveDate> {
    let raw = ctx.require_param(CUTOFF_PARAM)?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("`{CUTOFF_PARAM}` must be a YYYY-MM-DD date, got `{raw}`"))
}

impl CleaningRule for TruncateRdrData {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn setup(&self, ctx: &RuleContext, _warehouse: &dyn Warehouse) -> Result<()> {
        let cutoff = cutoff(ctx)?;
        info!(cutoff = %cutoff, "truncating RDR data after cutoff");
        Ok(())
    }

    fn get_queries(&self, ctx: &RuleContext) -> Result<Vec<QuerySpec>> {
        let cutoff = cutoff(ctx)?;
        let mut queries = Vec::with_capacity(DATE_COLUMNS.len() * 2);
        for (table, date_column) in DATE_COLUMNS {
            let condition = format!(
                "{date_column} IS NOT NULL AND {date_column} > CAST('{cutoff}' AS DATE)"
            );
            queries.extend(ctx.sandbox_and_drop(table, &condition)?);
        }
        Ok(queries)
    }
}
