//! Orchestration core for CDR cleaning rules.
//!
//! - [`Registry`]: the rules known to a run
//! - [`resolve`]: dependency-ordered [`ExecutionPlan`] for a tier
//! - [`sandbox`]: sandbox datasets and table names
//! - [`Engine`]: runs a plan against a warehouse and returns a [`RunReport`]
//! - [`cleaning_rules`]: the shipped rule catalog
//! - [`manifest`]: rules defined as JSON and SQL templates

pub mod cleaning_rules;
pub mod engine;
pub mod error;
pub mod manifest;
pub mod options;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod rule;
pub mod sandbox;
pub mod template;

pub use cleaning_rules::build_default_registry;
pub use engine::{Engine, Planner, RenderedRule, RuleInstance};
pub use error::{CleanError, Result};
pub use manifest::{load_manifest, parse_manifest, register_manifest};
pub use options::{EngineOptions, RuleOverrides};
pub use registry::Registry;
pub use report::{RuleOutcome, RunReport, RunSummary};
pub use resolver::{ExecutionPlan, resolve};
pub use rule::{CleaningRule, FunctionRule, QueryFn, RuleContext, RuleState};
pub use sandbox::{ensure_sandbox, sandbox_dataset_id, sandbox_table_for};
pub use template::{Destination, QueryTemplate, TemplateRule};
