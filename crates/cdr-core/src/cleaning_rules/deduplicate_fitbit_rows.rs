use anyhow::Result;
use cdr_model::{QuerySpec, Tier};

use super::descriptor;
use crate::rule::{FunctionRule, RuleContext};

pub const RULE_ID: &str = "deduplicate_fitbit_rows";

const FITBIT_TABLES: [&str; 6] = [
    "activity_summary",
    "heart_rate_minute_level",
    "heart_rate_summary",
    "sleep_daily_summary",
    "sleep_level",
    "steps_intraday",
];

/// Function rule that rewrites each wearables table without duplicate rows.
pub fn deduplicate_fitbit_rows() -> cdr_model::Result<FunctionRule> {
    let descriptor = descriptor(
        RULE_ID,
        "Remove exact duplicate rows from wearables tables",
        &[
            Tier::Fitbit,
            Tier::RegisteredTierFitbit,
            Tier::ControlledTierFitbit,
        ],
        &FITBIT_TABLES,
    )?;
    Ok(FunctionRule::new(descriptor, distinct_rows))
}

fn distinct_rows(_ctx: &RuleContext) -> Result<Vec<QuerySpec>> {
    FITBIT_TABLES
        .iter()
        .map(|table| {
            Ok(QuerySpec::new(format!("SELECT DISTINCT * FROM {table}"))?
                .into_table(*table)
                .overwrite())
        })
        .collect()
}
