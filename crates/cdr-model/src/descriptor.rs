//! Static metadata describing one cleaning rule.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ids::RuleId;
use crate::tier::Tier;

/// Metadata for a cleaning rule: identity, rationale, scope, and ordering
/// constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDescriptor {
    /// Stable identifier, unique within a registry.
    pub rule_id: RuleId,
    /// Free-text rationale for the rule.
    pub description: String,
    /// Dataset tiers the rule applies to.
    #[serde(default)]
    pub affected_tiers: BTreeSet<Tier>,
    /// Tables the rule reads or writes, in the order the rule touches them.
    #[serde(default)]
    pub affected_tables: Vec<String>,
    /// Rules that must complete before this rule runs.
    #[serde(default)]
    pub depends_on: BTreeSet<RuleId>,
}

impl RuleDescriptor {
    pub fn new(rule_id: RuleId, description: impl Into<String>) -> Self {
        Self {
            rule_id,
            description: description.into(),
            affected_tiers: BTreeSet::new(),
            affected_tables: Vec::new(),
            depends_on: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_tiers(mut self, tiers: impl IntoIterator<Item = Tier>) -> Self {
        self.affected_tiers.extend(tiers);
        self
    }

    #[must_use]
    pub fn with_tables<S: Into<String>>(mut self, tables: impl IntoIterator<Item = S>) -> Self {
        self.affected_tables.extend(tables.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn depends_on(mut self, rules: impl IntoIterator<Item = RuleId>) -> Self {
        self.depends_on.extend(rules);
        self
    }

    /// Returns true if the rule is registered for `tier`.
    pub fn applies_to(&self, tier: Tier) -> bool {
        self.affected_tiers.contains(&tier)
    }

    /// Returns true if the descriptor lists itself as a dependency.
    pub fn depends_on_itself(&self) -> bool {
        self.depends_on.contains(&self.rule_id)
    }
}
