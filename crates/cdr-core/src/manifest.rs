//! JSON rule manifests: cleaning rules defined as data.
//!
//! ```json
//! {
//!   "rules": [
//!     {
//!       "rule_id": "drop_negative_measurements",
//!       "description": "Remove measurements with negative values",
//!       "tiers": ["combined"],
//!       "tables": ["measurement"],
//!       "depends_on": [],
//!       "queries": [
//!         {
//!           "sql": "SELECT * FROM measurement WHERE value_as_number < 0",
//!           "destination": "sandbox",
//!           "destination_table": "{{ sandbox.measurement }}",
//!           "write_disposition": "overwrite"
//!         }
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use cdr_model::{RuleDescriptor, RuleId, Tier};
use serde::Deserialize;
use tracing::info;

use crate::error::{CleanError, Result};
use crate::registry::Registry;
use crate::template::{QueryTemplate, TemplateRule};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
    rules: Vec<ManifestRule>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestRule {
    rule_id: RuleId,
    description: String,
    tiers: BTreeSet<Tier>,
    #[serde(default)]
    tables: Vec<String>,
    #[serde(default)]
    depends_on: BTreeSet<RuleId>,
    queries: Vec<QueryTemplate>,
}

impl ManifestRule {
    fn into_rule(self, origin: &str) -> Result<TemplateRule> {
        if self.queries.is_empty() {
            return Err(manifest_error(
                origin,
                format!("rule {} defines no queries", self.rule_id),
            ));
        }
        if let Some(i) = self.queries.iter().position(|q| q.sql.trim().is_empty()) {
            return Err(manifest_error(
                origin,
                format!("query {i} of rule {} has empty sql", self.rule_id),
            ));
        }
        let descriptor = RuleDescriptor::new(self.rule_id, self.description)
            .with_tiers(self.tiers)
            .with_tables(self.tables)
            .depends_on(self.depends_on);
        Ok(TemplateRule::new(descriptor, self.queries))
    }
}

fn manifest_error(origin: &str, message: impl Into<String>) -> CleanError {
    CleanError::Manifest {
        origin: origin.to_string(),
        message: message.into(),
    }
}

/// Parse manifest JSON into template rules.
pub fn parse_manifest(json: &str) -> Result<Vec<TemplateRule>> {
    parse_with_origin(json, "<inline>")
}

/// Read and parse a manifest file.
pub fn load_manifest(path: &Path) -> Result<Vec<TemplateRule>> {
    let origin = path.display().to_string();
    let contents =
        fs::read_to_string(path).map_err(|e| manifest_error(&origin, format!("cannot read: {e}")))?;
    let rules = parse_with_origin(&contents, &origin)?;
    info!(manifest = %origin, rules = rules.len(), "loaded rule manifest");
    Ok(rules)
}

/// Register every rule of a manifest file into `registry`.
pub fn register_manifest(registry: &mut Registry, path: &Path) -> Result<usize> {
    let rules = load_manifest(path)?;
    let count = rules.len();
    for rule in rules {
        registry.register(rule)?;
    }
    Ok(count)
}

fn parse_with_origin(json: &str, origin: &str) -> Result<Vec<TemplateRule>> {
    let file: ManifestFile =
        serde_json::from_str(json).map_err(|e| manifest_error(origin, e.to_string()))?;
    file.rules
        .into_iter()
        .map(|rule| rule.into_rule(origin))
        .collect()
}
