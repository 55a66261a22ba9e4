//! Cleaning rule trait, per-run rule context, and the function adapter.
//!
//! Every rule, however it is authored, is driven through [`CleaningRule`]:
//!
//! - struct rules implement the trait directly
//! - [`FunctionRule`] wraps a descriptor and a plain query function
//! - [`TemplateRule`](crate::template::TemplateRule) renders SQL templates
//!   from a rule manifest

use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use cdr_model::{QuerySpec, RuleDescriptor, RuleId};
use cdr_warehouse::Warehouse;

use crate::sandbox::{sandbox_dataset_id, sandbox_table_for};

/// A unit of data cleaning.
///
/// The engine calls, in order, [`setup`](Self::setup),
/// [`get_queries`](Self::get_queries), runs each returned query, and then
/// [`validate`](Self::validate) when validation is enabled.
///
/// # Example
///
/// ```ignore
/// struct DropTestPeople(RuleDescriptor);
///
/// impl CleaningRule for DropTestPeople {
///     fn descriptor(&self) -> &RuleDescriptor {
///         &self.0
///     }
///
///     fn get_queries(&self, ctx: &RuleContext) -> anyhow::Result<Vec<QuerySpec>> {
///         Ok(vec![
///             QuerySpec::new("SELECT * FROM person WHERE person_id > 0")?
///                 .into_table("person")
///                 .overwrite(),
///         ])
///     }
/// }
/// ```
pub trait CleaningRule: Send + Sync {
    fn descriptor(&self) -> &RuleDescriptor;

    /// Prepare anything the queries need, such as lookup tables.
    ///
    /// # Errors
    ///
    /// An error here fails the rule and halts the run.
    fn setup(&self, _ctx: &RuleContext, _warehouse: &dyn Warehouse) -> Result<()> {
        Ok(())
    }

    /// The ordered queries that implement the rule.
    ///
    /// Must not touch the warehouse: plans are rendered from this method
    /// during dry runs.
    fn get_queries(&self, ctx: &RuleContext) -> Result<Vec<QuerySpec>>;

    /// Check the rule's postconditions after its queries completed.
    fn validate(&self, _ctx: &RuleContext, _warehouse: &dyn Warehouse) -> Result<()> {
        Ok(())
    }

    fn rule_id(&self) -> &RuleId {
        &self.descriptor().rule_id
    }
}

/// Everything a rule knows about the run it is part of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleContext {
    pub project_id: String,
    pub dataset_id: String,
    pub sandbox_dataset_id: String,
    table_namer: String,
    params: BTreeMap<String, String>,
}

impl RuleContext {
    pub fn new(
        project_id: impl Into<String>,
        dataset_id: impl Into<String>,
        table_namer: impl Into<String>,
    ) -> Self {
        let dataset_id = dataset_id.into();
        Self {
            project_id: project_id.into(),
            sandbox_dataset_id: sandbox_dataset_id(&dataset_id),
            dataset_id,
            table_namer: table_namer.into(),
            params: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Prefix used for this rule's sandbox tables.
    pub fn table_namer(&self) -> &str {
        &self.table_namer
    }

    /// Sandbox table that keeps the rows this rule removes from `table`.
    pub fn sandbox_table_for(&self, table: &str) -> String {
        sandbox_table_for(&self.table_namer, table)
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// A run parameter the rule cannot do without.
    ///
    /// # Errors
    ///
    /// Fails when the parameter was not supplied or is blank.
    pub fn require_param(&self, name: &str) -> Result<&str> {
        self.param(name)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("missing required parameter `{name}`"))
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Copy the rows of `table` matching `condition` into the sandbox.
    pub fn sandbox_rows(&self, table: &str, condition: &str) -> Result<QuerySpec> {
        let spec = QuerySpec::new(format!("SELECT * FROM {table} WHERE {condition}"))
            .with_context(|| format!("sandbox query for {table}"))?;
        Ok(spec
            .into_dataset_table(&self.sandbox_dataset_id, self.sandbox_table_for(table))
            .overwrite())
    }

    /// Rewrite `table` without the rows matching `condition`.
    ///
    /// Keeps exactly the rows [`sandbox_rows`](Self::sandbox_rows) leaves
    /// behind: a condition that evaluates to NULL keeps the row.
    pub fn drop_rows(&self, table: &str, condition: &str) -> Result<QuerySpec> {
        let keep = format!("NOT COALESCE(({condition}), FALSE)");
        let spec = QuerySpec::new(format!("SELECT * FROM {table} WHERE {keep}"))
            .with_context(|| format!("cleaning query for {table}"))?;
        Ok(spec.into_table(table).overwrite())
    }

    /// Sandbox then drop the rows of `table` matching `condition`.
    pub fn sandbox_and_drop(&self, table: &str, condition: &str) -> Result<Vec<QuerySpec>> {
        Ok(vec![
            self.sandbox_rows(table, condition)?,
            self.drop_rows(table, condition)?,
        ])
    }
}

/// Signature of a query-generating function.
pub type QueryFn = fn(&RuleContext) -> Result<Vec<QuerySpec>>;

/// Adapter for rules written as a plain function.
///
/// The rule has no setup and no validation.
pub struct FunctionRule {
    descriptor: RuleDescriptor,
    queries: QueryFn,
}

impl FunctionRule {
    pub fn new(descriptor: RuleDescriptor, queries: QueryFn) -> Self {
        Self {
            descriptor,
            queries,
        }
    }
}

impl CleaningRule for FunctionRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn get_queries(&self, ctx: &RuleContext) -> Result<Vec<QuerySpec>> {
        (self.queries)(ctx)
    }
}

/// Lifecycle state of one rule within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleState {
    Created,
    SetupRun,
    QueriesGenerated,
    Executing,
    Completed,
    Failed,
}

impl RuleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleState::Created => "created",
            RuleState::SetupRun => "setup_run",
            RuleState::QueriesGenerated => "queries_generated",
            RuleState::Executing => "executing",
            RuleState::Completed => "completed",
            RuleState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RuleState::Completed | RuleState::Failed)
    }
}

impl std::fmt::Display for RuleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdr_model::{Tier, WriteDisposition};

    fn context() -> RuleContext {
        RuleContext::new("curation", "combined", "my_rule").with_param("cutoff_date", "2024-01-01")
    }

    #[test]
    fn context_derives_sandbox_names() {
        let ctx = context();
        assert_eq!(ctx.sandbox_dataset_id, "combined_sandbox");
        assert_eq!(ctx.sandbox_table_for("person"), "my_rule_person");
    }

    #[test]
    fn required_params() {
        let ctx = context();
        assert_eq!(ctx.require_param("cutoff_date").unwrap(), "2024-01-01");
        let err = ctx.require_param("ehr_dataset").unwrap_err();
        assert!(err.to_string().contains("ehr_dataset"));
    }

    #[test]
    fn sandbox_and_drop_pairs_queries() {
        let ctx = context();
        let queries = ctx.sandbox_and_drop("observation", "value_as_number < 0").unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].destination_dataset(), Some("combined_sandbox"));
        assert_eq!(queries[0].destination_table(), Some("my_rule_observation"));
        assert!(
            queries[1]
                .query_text()
                .ends_with("WHERE NOT COALESCE((value_as_number < 0), FALSE)")
        );
        assert_eq!(queries[1].destination_table(), Some("observation"));
        assert_eq!(queries[1].write_disposition(), WriteDisposition::Overwrite);
    }

    #[test]
    fn function_rule_delegates() {
        fn queries(ctx: &RuleContext) -> Result<Vec<QuerySpec>> {
            Ok(vec![QuerySpec::new(format!("SELECT '{}'", ctx.dataset_id))?])
        }
        let descriptor = RuleDescriptor::new(RuleId::new("fn_rule").unwrap(), "test")
            .with_tiers([Tier::Combined]);
        let rule = FunctionRule::new(descriptor, queries);
        assert_eq!(rule.rule_id().as_str(), "fn_rule");
        let generated = rule.get_queries(&context()).unwrap();
        assert_eq!(generated[0].query_text(), "SELECT 'combined'");
    }
}
