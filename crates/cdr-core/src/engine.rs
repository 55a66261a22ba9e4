//! Plans and runs the cleaning rules of one tier against one dataset.
//!
//! A run is strictly sequential: each rule goes through setup, query
//! generation, and execution before the next starts, and each query is
//! waited on before the next is submitted. The first setup or query failure
//! halts the run; every later rule is reported as skipped. Validation
//! failures are recorded and the run continues.

use std::time::Instant;

use cdr_model::{QuerySpec, RuleId, RuleStatus, Tier};
use cdr_warehouse::{QueryJob, TableRef, Warehouse, run_and_wait};
use tracing::{debug, error, info, info_span, warn};

use crate::error::{CleanError, Result};
use crate::options::{EngineOptions, RuleOverrides};
use crate::registry::Registry;
use crate::report::{RuleOutcome, RunReport};
use crate::resolver::{ExecutionPlan, resolve};
use crate::rule::{CleaningRule, RuleContext, RuleState};
use crate::sandbox::ensure_sandbox;

/// Queries a rule would run, rendered without touching the warehouse.
#[derive(Debug, Clone)]
pub struct RenderedRule {
    pub rule_id: RuleId,
    pub description: String,
    pub queries: Vec<QuerySpec>,
}

/// Planning and dry-run rendering; never talks to a warehouse.
#[derive(Debug, Clone, Copy)]
pub struct Planner<'a> {
    registry: &'a Registry,
    options: &'a EngineOptions,
}

impl<'a> Planner<'a> {
    pub fn new(registry: &'a Registry, options: &'a EngineOptions) -> Self {
        Self { registry, options }
    }

    /// Execution order of the rules registered for `tier`.
    pub fn plan(&self, tier: Tier) -> Result<ExecutionPlan> {
        resolve(tier, self.registry.rules_for_tier(tier))
    }

    /// Context handed to `rule_id` for a run against `dataset_id`.
    pub fn context_for(
        &self,
        rule_id: &RuleId,
        project_id: &str,
        dataset_id: &str,
    ) -> RuleContext {
        RuleContext::new(project_id, dataset_id, self.options.namer_for(rule_id))
            .with_params(self.options.params.clone())
    }

    /// Generate every rule's queries in plan order.
    ///
    /// Only `get_queries` is called; setup hooks and the warehouse are not.
    pub fn render_queries(
        &self,
        plan: &ExecutionPlan,
        project_id: &str,
        dataset_id: &str,
    ) -> Result<Vec<RenderedRule>> {
        plan.rules()
            .iter()
            .map(|descriptor| {
                let rule = self.rule(&descriptor.rule_id)?;
                let ctx = self.context_for(&descriptor.rule_id, project_id, dataset_id);
                let queries = rule
                    .get_queries(&ctx)
                    .map_err(|source| CleanError::QueryGeneration {
                        rule_id: descriptor.rule_id.clone(),
                        source,
                    })?;
                Ok(RenderedRule {
                    rule_id: descriptor.rule_id.clone(),
                    description: descriptor.description.clone(),
                    queries,
                })
            })
            .collect()
    }

    fn rule(&self, rule_id: &RuleId) -> Result<&'a dyn CleaningRule> {
        self.registry
            .get(rule_id.as_str())
            .ok_or_else(|| CleanError::configuration(rule_id.as_str(), "rule is not registered"))
    }
}

/// One rule bound to one run, tracking its lifecycle state.
pub struct RuleInstance<'a> {
    rule: &'a dyn CleaningRule,
    context: RuleContext,
    state: RuleState,
    queries_executed: usize,
}

impl<'a> RuleInstance<'a> {
    pub fn new(rule: &'a dyn CleaningRule, context: RuleContext) -> Self {
        Self {
            rule,
            context,
            state: RuleState::Created,
            queries_executed: 0,
        }
    }

    pub fn rule_id(&self) -> &RuleId {
        self.rule.rule_id()
    }

    pub fn state(&self) -> RuleState {
        self.state
    }

    pub fn context(&self) -> &RuleContext {
        &self.context
    }

    pub fn queries_executed(&self) -> usize {
        self.queries_executed
    }

    /// Drive the rule from `Created` to `Completed` or `Failed`.
    pub fn execute(&mut self, warehouse: &dyn Warehouse) -> Result<()> {
        let result = self.try_execute(warehouse);
        self.state = if result.is_ok() {
            RuleState::Completed
        } else {
            RuleState::Failed
        };
        result
    }

    fn try_execute(&mut self, warehouse: &dyn Warehouse) -> Result<()> {
        let rule_id = self.rule_id().clone();

        self.rule
            .setup(&self.context, warehouse)
            .map_err(|source| CleanError::RuleSetup {
                rule_id: rule_id.clone(),
                source,
            })?;
        self.state = RuleState::SetupRun;

        let queries = self
            .rule
            .get_queries(&self.context)
            .map_err(|source| CleanError::QueryGeneration {
                rule_id: rule_id.clone(),
                source,
            })?;
        self.state = RuleState::QueriesGenerated;
        if queries.is_empty() {
            warn!(rule_id = %rule_id, "rule generated no queries");
        }

        self.state = RuleState::Executing;
        for (query_index, spec) in queries.iter().enumerate() {
            let job = self.query_job(spec);
            debug!(
                rule_id = %rule_id,
                query_index,
                destination = ?job.destination.as_ref().map(ToString::to_string),
                write_disposition = %job.write_disposition,
                sql = %spec.query_text(),
                "submitting query"
            );
            let stats = run_and_wait(warehouse, &self.context.project_id, &job).map_err(
                |source| CleanError::QueryExecution {
                    rule_id: rule_id.clone(),
                    query_index,
                    query: spec.query_text().to_string(),
                    source,
                },
            )?;
            self.queries_executed += 1;
            debug!(
                rule_id = %rule_id,
                query_index,
                job_id = %stats.job_id,
                rows_written = ?stats.rows_written,
                "query finished"
            );
        }
        Ok(())
    }

    /// Run the rule's validation hook.
    pub fn validate(&self, warehouse: &dyn Warehouse) -> Result<()> {
        self.rule
            .validate(&self.context, warehouse)
            .map_err(|source| CleanError::Validation {
                rule_id: self.rule_id().clone(),
                source,
            })
    }

    fn query_job(&self, spec: &QuerySpec) -> QueryJob {
        let job = QueryJob::new(spec.query_text()).with_default_dataset(&self.context.dataset_id);
        match spec.destination_table() {
            Some(table) => {
                let dataset = spec.resolved_destination_dataset(&self.context.dataset_id);
                job.with_destination(TableRef::new(dataset, table), spec.write_disposition())
            }
            None => job,
        }
    }
}

/// Runs cleaning rules from a registry against a warehouse.
pub struct Engine<'a> {
    registry: &'a Registry,
    warehouse: &'a dyn Warehouse,
    options: EngineOptions,
}

impl<'a> Engine<'a> {
    pub fn new(
        registry: &'a Registry,
        warehouse: &'a dyn Warehouse,
        options: EngineOptions,
    ) -> Self {
        Self {
            registry,
            warehouse,
            options,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn planner(&self) -> Planner<'_> {
        Planner::new(self.registry, &self.options)
    }

    pub fn plan(&self, tier: Tier) -> Result<ExecutionPlan> {
        self.planner().plan(tier)
    }

    pub fn render_queries(
        &self,
        plan: &ExecutionPlan,
        project_id: &str,
        dataset_id: &str,
    ) -> Result<Vec<RenderedRule>> {
        self.planner().render_queries(plan, project_id, dataset_id)
    }

    /// Plan and run every rule of `tier` against `project_id.dataset_id`.
    ///
    /// # Errors
    ///
    /// Planning errors, unknown override ids, and sandbox failures are
    /// returned before any rule runs. Rule failures are recorded in the
    /// returned [`RunReport`] instead.
    pub fn run(
        &self,
        project_id: &str,
        dataset_id: &str,
        tier: Tier,
        overrides: Option<&RuleOverrides>,
    ) -> Result<RunReport> {
        let span = info_span!("run", project = project_id, dataset = dataset_id, tier = %tier);
        let _guard = span.enter();

        let planner = self.planner();
        let plan = planner.plan(tier)?;
        if let Some(overrides) = overrides {
            overrides.check_against(&plan)?;
        }
        info!(rules = plan.len(), "execution plan resolved");

        let sandbox_dataset_id = ensure_sandbox(self.warehouse, project_id, dataset_id)?;
        let mut report = RunReport::new(project_id, dataset_id, sandbox_dataset_id, tier);

        let mut halted_by: Option<RuleId> = None;
        for descriptor in plan.rules() {
            let rule_id = &descriptor.rule_id;
            if let Some(failed) = &halted_by {
                debug!(rule_id = %rule_id, failed_rule = %failed, "skipping rule after failure");
                report.push(RuleOutcome::skipped(rule_id.clone()));
                continue;
            }
            if overrides.is_some_and(|o| o.excludes(rule_id)) {
                info!(rule_id = %rule_id, "rule excluded by overrides");
                report.push(RuleOutcome::skipped(rule_id.clone()));
                continue;
            }

            let outcome = self.run_rule(&planner, rule_id, project_id, dataset_id)?;
            if outcome.status == RuleStatus::Failed {
                halted_by = Some(rule_id.clone());
            }
            report.push(outcome);
        }

        info!(
            completed = report.count(RuleStatus::Completed),
            failed = report.count(RuleStatus::Failed),
            validation_failed = report.count(RuleStatus::ValidationFailed),
            skipped = report.count(RuleStatus::Skipped),
            queries = report.total_queries(),
            "run finished"
        );
        Ok(report)
    }

    fn run_rule(
        &self,
        planner: &Planner<'_>,
        rule_id: &RuleId,
        project_id: &str,
        dataset_id: &str,
    ) -> Result<RuleOutcome> {
        let span = info_span!("rule", rule_id = %rule_id);
        let _guard = span.enter();

        let rule = planner.rule(rule_id)?;
        let context = planner.context_for(rule_id, project_id, dataset_id);
        let mut instance = RuleInstance::new(rule, context);
        let start = Instant::now();

        info!("running rule");
        if let Err(err) = instance.execute(self.warehouse) {
            error!(
                error = %err,
                job_id = err.job_id().unwrap_or_default(),
                queries_executed = instance.queries_executed(),
                "rule failed; halting run"
            );
            return Ok(RuleOutcome::failed(
                rule_id.clone(),
                instance.queries_executed(),
                start.elapsed(),
                err,
            ));
        }

        if self.options.run_validation
            && let Err(err) = instance.validate(self.warehouse)
        {
            error!(error = %err, "rule validation failed");
            return Ok(RuleOutcome::validation_failed(
                rule_id.clone(),
                instance.queries_executed(),
                start.elapsed(),
                err,
            ));
        }

        let elapsed = start.elapsed();
        info!(
            queries = instance.queries_executed(),
            duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "rule completed"
        );
        Ok(RuleOutcome::completed(
            rule_id.clone(),
            instance.queries_executed(),
            elapsed,
        ))
    }
}
