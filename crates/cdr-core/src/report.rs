//! Outcome of a cleaning run.

use std::time::Duration;

use cdr_model::{RuleId, RuleStatus, Tier};
use serde::Serialize;

use crate::error::CleanError;

/// What happened to one planned rule.
#[derive(Debug)]
pub struct RuleOutcome {
    pub rule_id: RuleId,
    pub status: RuleStatus,
    /// Queries that finished successfully before the rule ended.
    pub queries_executed: usize,
    pub duration_ms: u64,
    pub error: Option<CleanError>,
}

impl RuleOutcome {
    pub fn completed(rule_id: RuleId, queries_executed: usize, elapsed: Duration) -> Self {
        Self {
            rule_id,
            status: RuleStatus::Completed,
            queries_executed,
            duration_ms: millis(elapsed),
            error: None,
        }
    }

    pub fn failed(
        rule_id: RuleId,
        queries_executed: usize,
        elapsed: Duration,
        error: CleanError,
    ) -> Self {
        Self {
            rule_id,
            status: RuleStatus::Failed,
            queries_executed,
            duration_ms: millis(elapsed),
            error: Some(error),
        }
    }

    pub fn validation_failed(
        rule_id: RuleId,
        queries_executed: usize,
        elapsed: Duration,
        error: CleanError,
    ) -> Self {
        Self {
            status: RuleStatus::ValidationFailed,
            ..Self::failed(rule_id, queries_executed, elapsed, error)
        }
    }

    pub fn skipped(rule_id: RuleId) -> Self {
        Self {
            rule_id,
            status: RuleStatus::Skipped,
            queries_executed: 0,
            duration_ms: 0,
            error: None,
        }
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Per-rule outcomes of a run, in plan order.
#[derive(Debug)]
pub struct RunReport {
    pub project_id: String,
    pub dataset_id: String,
    pub sandbox_dataset_id: String,
    pub tier: Tier,
    pub outcomes: Vec<RuleOutcome>,
}

impl RunReport {
    pub fn new(
        project_id: impl Into<String>,
        dataset_id: impl Into<String>,
        sandbox_dataset_id: impl Into<String>,
        tier: Tier,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
            sandbox_dataset_id: sandbox_dataset_id.into(),
            tier,
            outcomes: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: RuleOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcome(&self, rule_id: &str) -> Option<&RuleOutcome> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.rule_id.as_str() == rule_id)
    }

    pub fn status_of(&self, rule_id: &str) -> Option<RuleStatus> {
        self.outcome(rule_id).map(|outcome| outcome.status)
    }

    pub fn count(&self, status: RuleStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == status)
            .count()
    }

    /// Returns true when some rule failed and halted the run.
    pub fn has_failures(&self) -> bool {
        self.count(RuleStatus::Failed) > 0
    }

    /// The rule that halted the run, if any.
    pub fn first_failure(&self) -> Option<&RuleOutcome> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.status == RuleStatus::Failed)
    }

    pub fn validation_failures(&self) -> Vec<&RuleOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == RuleStatus::ValidationFailed)
            .collect()
    }

    /// No rule failed and every validation passed.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|outcome| {
            matches!(outcome.status, RuleStatus::Completed | RuleStatus::Skipped)
        })
    }

    pub fn total_queries(&self) -> usize {
        self.outcomes.iter().map(|o| o.queries_executed).sum()
    }

    /// Serializable view of the report; errors are rendered as text.
    pub fn summary(&self, query_preview_chars: usize) -> RunSummary {
        RunSummary {
            project_id: self.project_id.clone(),
            dataset_id: self.dataset_id.clone(),
            sandbox_dataset_id: self.sandbox_dataset_id.clone(),
            tier: self.tier,
            success: self.is_success(),
            rules: self
                .outcomes
                .iter()
                .map(|outcome| RuleSummary {
                    rule_id: outcome.rule_id.clone(),
                    status: outcome.status,
                    queries_executed: outcome.queries_executed,
                    duration_ms: outcome.duration_ms,
                    error: outcome.error.as_ref().map(ToString::to_string),
                    job_id: outcome
                        .error
                        .as_ref()
                        .and_then(|e| e.job_id().map(str::to_string)),
                    query: outcome
                        .error
                        .as_ref()
                        .and_then(|e| e.query_preview(query_preview_chars)),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub project_id: String,
    pub dataset_id: String,
    pub sandbox_dataset_id: String,
    pub tier: Tier,
    pub success: bool,
    pub rules: Vec<RuleSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleSummary {
    pub rule_id: RuleId,
    pub status: RuleStatus,
    pub queries_executed: usize,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}
