//! Error taxonomy for planning and running cleaning rules.
//!
//! Planning-time errors (`Configuration`, `UnresolvedDependency`,
//! `CyclicDependency`) are raised before anything touches the warehouse.
//! Execution-time errors are recorded against the rule that raised them and
//! keep the underlying warehouse error as their source.

use cdr_model::{ModelError, RuleId};
use cdr_warehouse::WarehouseError;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CleanError {
    /// Malformed rule metadata or run configuration.
    #[error("invalid configuration for rule {rule_id}: {reason}")]
    Configuration { rule_id: String, reason: String },

    #[error("rule {rule_id} depends on {missing}, which is not registered for this tier")]
    UnresolvedDependency { rule_id: RuleId, missing: RuleId },

    #[error("cyclic dependency involving rule {rule_id}: {}", format_cycle(.cycle))]
    CyclicDependency { rule_id: RuleId, cycle: Vec<RuleId> },

    #[error("setup failed for rule {rule_id}: {source:#}")]
    RuleSetup {
        rule_id: RuleId,
        #[source]
        source: anyhow::Error,
    },

    #[error("could not generate queries for rule {rule_id}: {source:#}")]
    QueryGeneration {
        rule_id: RuleId,
        #[source]
        source: anyhow::Error,
    },

    /// A submitted query failed; `source` keeps the warehouse job error.
    #[error("query {query_index} of rule {rule_id} failed: {source}")]
    QueryExecution {
        rule_id: RuleId,
        query_index: usize,
        query: String,
        #[source]
        source: WarehouseError,
    },

    #[error("validation failed for rule {rule_id}: {source:#}")]
    Validation {
        rule_id: RuleId,
        #[source]
        source: anyhow::Error,
    },

    #[error("warehouse error: {0}")]
    Warehouse(#[from] WarehouseError),

    #[error("invalid rule manifest {origin}: {message}")]
    Manifest { origin: String, message: String },

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl CleanError {
    pub fn configuration(rule_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            rule_id: rule_id.into(),
            reason: reason.into(),
        }
    }

    /// The rule the error is attributed to, if any.
    pub fn rule_id(&self) -> Option<&str> {
        match self {
            Self::Configuration { rule_id, .. } => Some(rule_id.as_str()),
            Self::UnresolvedDependency { rule_id, .. }
            | Self::CyclicDependency { rule_id, .. }
            | Self::RuleSetup { rule_id, .. }
            | Self::QueryGeneration { rule_id, .. }
            | Self::QueryExecution { rule_id, .. }
            | Self::Validation { rule_id, .. } => Some(rule_id.as_str()),
            Self::Warehouse(_) | Self::Manifest { .. } | Self::Model(_) => None,
        }
    }

    /// Returns true for errors raised while planning, before any mutation.
    pub fn is_planning_error(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. }
                | Self::UnresolvedDependency { .. }
                | Self::CyclicDependency { .. }
                | Self::Manifest { .. }
        )
    }

    /// The failing query, truncated to `max_chars` characters.
    pub fn query_preview(&self, max_chars: usize) -> Option<String> {
        let Self::QueryExecution { query, .. } = self else {
            return None;
        };
        let trimmed = query.trim();
        if trimmed.chars().count() <= max_chars {
            return Some(trimmed.to_string());
        }
        let mut preview: String = trimmed.chars().take(max_chars).collect();
        preview.push_str("...");
        Some(preview)
    }

    /// The warehouse job id behind a failed query.
    pub fn job_id(&self) -> Option<&str> {
        match self {
            Self::QueryExecution { source, .. } | Self::Warehouse(source) => source.job_id(),
            _ => None,
        }
    }
}

fn format_cycle(cycle: &[RuleId]) -> String {
    let mut names: Vec<&str> = cycle.iter().map(RuleId::as_str).collect();
    if let Some(first) = cycle.first() {
        names.push(first.as_str());
    }
    names.join(" -> ")
}

pub type Result<T> = std::result::Result<T, CleanError>;
