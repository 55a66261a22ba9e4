use std::fmt;

use serde::{Deserialize, Serialize};

/// Final status of one rule in a run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    /// Every query of the rule succeeded (and validation, when run, passed).
    Completed,
    /// Setup or a query failed; the run stopped at this rule.
    Failed,
    /// Queries succeeded but the post-condition check failed.
    ValidationFailed,
    /// Never attempted, either after a failure or because of an override.
    Skipped,
}

impl RuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleStatus::Completed => "completed",
            RuleStatus::Failed => "failed",
            RuleStatus::ValidationFailed => "validation_failed",
            RuleStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
