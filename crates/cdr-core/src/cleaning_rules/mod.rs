//! Cleaning rules shipped with the cleaner.
//!
//! Each rule lives in its own module and is registered by
//! [`build_default_registry`]. Rules are keyed by descriptive snake_case ids
//! and scoped to the tiers they clean.

mod deduplicate_fitbit_rows;
mod drop_zero_concept_ids;
mod no_data_after_death;
mod null_invalid_foreign_keys;
mod remove_non_existing_pids;
mod suppress_identifying_concepts;
mod truncate_rdr_data;

pub use deduplicate_fitbit_rows::deduplicate_fitbit_rows;
pub use drop_zero_concept_ids::DropZeroConceptIds;
pub use no_data_after_death::NoDataAfterDeath;
pub use null_invalid_foreign_keys::NullInvalidForeignKeys;
pub use remove_non_existing_pids::RemoveNonExistingPids;
pub use suppress_identifying_concepts::SuppressIdentifyingConcepts;
pub use truncate_rdr_data::TruncateRdrData;

use cdr_model::{RuleDescriptor, RuleId, Tier};

use crate::error::Result;
use crate::registry::Registry;

/// Registry holding every shipped rule.
pub fn build_default_registry() -> Result<Registry> {
    let mut registry = Registry::new();
    registry.register(RemoveNonExistingPids::new()?)?;
    registry.register(DropZeroConceptIds::new()?)?;
    registry.register(NoDataAfterDeath::new()?)?;
    registry.register(NullInvalidForeignKeys::new()?)?;
    registry.register(TruncateRdrData::new()?)?;
    registry.register(SuppressIdentifyingConcepts::new()?)?;
    registry.register(deduplicate_fitbit_rows()?)?;
    Ok(registry)
}

/// Descriptor with the id, tiers, and tables of a shipped rule.
fn descriptor(
    rule_id: &str,
    description: &str,
    tiers: &[Tier],
    tables: &[&str],
) -> cdr_model::Result<RuleDescriptor> {
    Ok(RuleDescriptor::new(RuleId::new(rule_id)?, description)
        .with_tiers(tiers.iter().copied())
        .with_tables(tables.iter().copied()))
}

/// Comma-separated SQL list of integer ids.
fn sql_id_list(ids: &[i64]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
