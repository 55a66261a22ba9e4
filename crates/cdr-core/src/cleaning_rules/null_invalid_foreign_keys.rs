use std::collections::BTreeMap;

use anyhow::Result;
use cdr_model::{QuerySpec, RuleDescriptor, RuleId, Tier};

use super::descriptor;
use super::no_data_after_death;
use crate::rule::{CleaningRule, RuleContext};
use crate::template::render;

pub const RULE_ID: &str = "null_invalid_foreign_keys";

/// Foreign key column and the table that defines its values.
const VISIT: (&str, &str) = ("visit_occurrence_id", "visit_occurrence");
const PROVIDER: (&str, &str) = ("provider_id", "provider");
const CARE_SITE: (&str, &str) = ("care_site_id", "care_site");
const LOCATION: (&str, &str) = ("location_id", "location");

const FOREIGN_KEYS: [(&str, &[(&str, &str)]); 7] = [
    ("condition_occurrence", &[VISIT, PROVIDER]),
    ("drug_exposure", &[VISIT, PROVIDER]),
    ("measurement", &[VISIT, PROVIDER]),
    ("observation", &[VISIT, PROVIDER]),
    ("person", &[LOCATION, PROVIDER, CARE_SITE]),
    ("procedure_occurrence", &[VISIT, PROVIDER]),
    ("visit_occurrence", &[PROVIDER, CARE_SITE]),
];

const INVALID_KEY: &str =
    "({{ column }} IS NOT NULL AND {{ column }} NOT IN (SELECT {{ column }} FROM {{ reference }}))";

const VALID_KEY_OR_NULL: &str = "CASE WHEN {{ column }} IN (SELECT {{ column }} FROM {{ reference }}) \
     THEN {{ column }} ELSE NULL END AS {{ column }}";

const NULL_INVALID_KEYS: &str = "SELECT * REPLACE ({{ replacements }}) FROM {{ table }}";

/// Nulls foreign keys that do not resolve to a row of the referenced table.
///
/// The rows are kept; only the dangling key values are cleared. Rows with at
/// least one dangling key are copied to the sandbox first.
pub struct NullInvalidForeignKeys {
    descriptor: RuleDescriptor,
}

impl NullInvalidForeignKeys {
    pub fn new() -> cdr_model::Result<Self> {
        let tables: Vec<&str> = FOREIGN_KEYS.iter().map(|(table, _)| *table).collect();
        let descriptor = descriptor(
            RULE_ID,
            "Set foreign keys that do not resolve to an existing row to NULL",
            &[Tier::Combined],
            &tables,
        )?
        .depends_on([RuleId::new(no_data_after_death::RULE_ID)?]);
        Ok(Self { descriptor })
    }
}

fn key_vars(column: &str, reference: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("column".to_string(), column.to_string()),
        ("reference".to_string(), reference.to_string()),
    ])
}

impl CleaningRule for NullInvalidForeignKeys {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn get_queries(&self, ctx: &RuleContext) -> Result<Vec<QuerySpec>> {
        let mut queries = Vec::with_capacity(FOREIGN_KEYS.len() * 2);
        for (table, keys) in FOREIGN_KEYS {
            let mut invalid = Vec::with_capacity(keys.len());
            let mut replacements = Vec::with_capacity(keys.len());
            for (column, reference) in keys {
                let vars = key_vars(column, reference);
                invalid.push(render(INVALID_KEY, &vars)?);
                replacements.push(render(VALID_KEY_OR_NULL, &vars)?);
            }
            queries.push(ctx.sandbox_rows(table, &invalid.join(" OR "))?);

            let vars = BTreeMap::from([
                ("replacements".to_string(), replacements.join(",\n    ")),
                ("table".to_string(), table.to_string()),
            ]);
            let rewrite = QuerySpec::new(render(NULL_INVALID_KEYS, &vars)?)?
                .into_table(table)
                .overwrite();
            queries.push(rewrite);
        }
        Ok(queries)
    }
}
