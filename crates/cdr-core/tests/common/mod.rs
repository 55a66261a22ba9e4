//! Rules and helpers shared by the integration tests.

#![allow(dead_code)]

use anyhow::{Result, bail};
use cdr_core::{CleaningRule, RuleContext};
use cdr_model::{QuerySpec, RuleDescriptor, RuleId, Tier};
use cdr_warehouse::Warehouse;

pub const PROJECT: &str = "curation";
pub const DATASET: &str = "combined";

pub fn id(value: &str) -> RuleId {
    RuleId::new(value).unwrap()
}

pub fn descriptor(rule_id: &str, depends_on: &[&str]) -> RuleDescriptor {
    RuleDescriptor::new(id(rule_id), format!("test rule {rule_id}"))
        .with_tiers([Tier::Combined])
        .depends_on(depends_on.iter().map(|dep| id(dep)))
}

/// Rule that copies each affected table onto itself.
pub struct TableRule {
    descriptor: RuleDescriptor,
    fail_setup: bool,
    fail_validation: bool,
}

impl TableRule {
    pub fn new(rule_id: &str, depends_on: &[&str], tables: &[&str]) -> Self {
        Self {
            descriptor: descriptor(rule_id, depends_on).with_tables(tables.iter().copied()),
            fail_setup: false,
            fail_validation: false,
        }
    }

    pub fn failing_setup(mut self) -> Self {
        self.fail_setup = true;
        self
    }

    pub fn failing_validation(mut self) -> Self {
        self.fail_validation = true;
        self
    }
}

impl CleaningRule for TableRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn setup(&self, _ctx: &RuleContext, _warehouse: &dyn Warehouse) -> Result<()> {
        if self.fail_setup {
            bail!("lookup table could not be built");
        }
        Ok(())
    }

    fn get_queries(&self, ctx: &RuleContext) -> Result<Vec<QuerySpec>> {
        let mut queries = Vec::new();
        for table in &self.descriptor.affected_tables {
            queries.push(ctx.sandbox_rows(table, "person_id < 0")?);
            queries.push(
                QuerySpec::new(format!("SELECT * FROM {table}"))?
                    .into_table(table.as_str())
                    .overwrite(),
            );
        }
        Ok(queries)
    }

    fn validate(&self, _ctx: &RuleContext, _warehouse: &dyn Warehouse) -> Result<()> {
        if self.fail_validation {
            bail!("rows remain after cleaning");
        }
        Ok(())
    }
}
