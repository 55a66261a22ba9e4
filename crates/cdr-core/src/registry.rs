//! Explicit registry of cleaning rules.

use std::collections::BTreeMap;

use cdr_model::{RuleDescriptor, Tier};
use tracing::debug;

use crate::error::{CleanError, Result};
use crate::rule::CleaningRule;

/// All cleaning rules known to a run, keyed by rule id.
#[derive(Default)]
pub struct Registry {
    rules: BTreeMap<String, Box<dyn CleaningRule>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule.
    ///
    /// # Errors
    ///
    /// Returns [`CleanError::Configuration`] when the id is already
    /// registered, the descriptor names no tiers, has an empty description,
    /// or lists itself as a dependency.
    pub fn register<R: CleaningRule + 'static>(&mut self, rule: R) -> Result<()> {
        self.register_boxed(Box::new(rule))
    }

    pub fn register_boxed(&mut self, rule: Box<dyn CleaningRule>) -> Result<()> {
        let descriptor = rule.descriptor();
        let rule_id = descriptor.rule_id.as_str();
        if self.rules.contains_key(rule_id) {
            return Err(CleanError::configuration(rule_id, "rule id is already registered"));
        }
        if descriptor.affected_tiers.is_empty() {
            return Err(CleanError::configuration(rule_id, "rule applies to no tiers"));
        }
        if descriptor.description.trim().is_empty() {
            return Err(CleanError::configuration(rule_id, "description is empty"));
        }
        if descriptor.depends_on_itself() {
            return Err(CleanError::configuration(rule_id, "rule depends on itself"));
        }
        debug!(
            rule_id,
            tiers = descriptor.affected_tiers.len(),
            depends_on = descriptor.depends_on.len(),
            "registered cleaning rule"
        );
        self.rules.insert(rule_id.to_string(), rule);
        Ok(())
    }

    /// Descriptors of the rules registered for `tier`, in id order.
    pub fn rules_for_tier(&self, tier: Tier) -> Vec<&RuleDescriptor> {
        self.descriptors()
            .filter(|descriptor| descriptor.applies_to(tier))
            .collect()
    }

    pub fn get(&self, rule_id: &str) -> Option<&dyn CleaningRule> {
        self.rules.get(rule_id).map(|rule| rule.as_ref())
    }

    pub fn contains(&self, rule_id: &str) -> bool {
        self.rules.contains_key(rule_id)
    }

    /// All descriptors, in id order.
    pub fn descriptors(&self) -> impl Iterator<Item = &RuleDescriptor> {
        self.rules.values().map(|rule| rule.descriptor())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("rules", &self.rules.keys().collect::<Vec<_>>())
            .finish()
    }
}
