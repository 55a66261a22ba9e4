//! Run configuration for the engine.

use std::collections::{BTreeMap, BTreeSet};

use cdr_model::RuleId;
use serde::{Deserialize, Serialize};

use crate::error::{CleanError, Result};
use crate::resolver::ExecutionPlan;

/// Default number of characters of a failing query shown in reports.
pub const DEFAULT_QUERY_PREVIEW_CHARS: usize = 500;

/// Options applied to every rule of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Prefix combined with each rule id when naming sandbox tables.
    pub table_namer: Option<String>,
    /// Named parameters passed to every rule, e.g. `cutoff_date`.
    pub params: BTreeMap<String, String>,
    /// Run each rule's validation hook after it completes.
    pub run_validation: bool,
    pub query_preview_chars: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            table_namer: None,
            params: BTreeMap::new(),
            run_validation: true,
            query_preview_chars: DEFAULT_QUERY_PREVIEW_CHARS,
        }
    }
}

impl EngineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_table_namer(mut self, namer: impl Into<String>) -> Self {
        self.table_namer = Some(namer.into());
        self
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_params(mut self, params: impl IntoIterator<Item = (String, String)>) -> Self {
        self.params.extend(params);
        self
    }

    #[must_use]
    pub fn with_validation(mut self, run_validation: bool) -> Self {
        self.run_validation = run_validation;
        self
    }

    #[must_use]
    pub fn with_query_preview_chars(mut self, chars: usize) -> Self {
        self.query_preview_chars = chars;
        self
    }

    /// Sandbox table prefix for `rule_id`.
    ///
    /// The rule id is always part of the prefix so two rules never share a
    /// sandbox table.
    pub fn namer_for(&self, rule_id: &RuleId) -> String {
        match self.table_namer.as_deref().map(str::trim) {
            Some(namer) if !namer.is_empty() => format!("{namer}_{rule_id}"),
            _ => rule_id.to_string(),
        }
    }
}

/// Operator selection of rules within a tier.
///
/// The whole tier is still planned; excluded rules are reported as skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleOverrides {
    /// When non-empty, run only these rules.
    pub only: BTreeSet<RuleId>,
    pub skip: BTreeSet<RuleId>,
}

impl RuleOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn only(mut self, rules: impl IntoIterator<Item = RuleId>) -> Self {
        self.only.extend(rules);
        self
    }

    #[must_use]
    pub fn skip(mut self, rules: impl IntoIterator<Item = RuleId>) -> Self {
        self.skip.extend(rules);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.only.is_empty() && self.skip.is_empty()
    }

    /// Returns true when `rule_id` must not run.
    pub fn excludes(&self, rule_id: &RuleId) -> bool {
        (!self.only.is_empty() && !self.only.contains(rule_id)) || self.skip.contains(rule_id)
    }

    /// Every named rule must be part of `plan`.
    pub fn check_against(&self, plan: &ExecutionPlan) -> Result<()> {
        for (flag, ids) in [("only", &self.only), ("skip", &self.skip)] {
            if let Some(unknown) = ids.iter().find(|id| !plan.contains(id.as_str())) {
                let reason = format!(
                    "--{flag} names a rule that is not planned for tier {}",
                    plan.tier()
                );
                return Err(CleanError::configuration(unknown.as_str(), reason));
            }
        }
        Ok(())
    }
}
