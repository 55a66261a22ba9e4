//! CLI argument definitions for the cleaning rule runner.

use std::path::PathBuf;

use cdr_model::{RuleId, Tier};
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "cdr-cleaner",
    version,
    about = "Run CDR cleaning rules against a warehouse dataset",
    long_about = "Resolve the cleaning rules registered for a data tier into a \
                  dependency-ordered plan and run them against a dataset.\n\n\
                  Rows removed or rewritten by a rule are copied into the \
                  dataset's sandbox first."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Clean a dataset with every rule of a tier.
    Run(RunArgs),

    /// Show the execution plan of a tier without touching the warehouse.
    Plan(PlanArgs),

    /// List registered cleaning rules.
    Rules(RulesArgs),

    /// Create the sandbox dataset for a dataset if it is missing.
    Sandbox(SandboxArgs),
}

/// Rule sources shared by every subcommand that builds a registry.
#[derive(Args, Clone, Default)]
pub struct RegistryArgs {
    /// JSON manifest of additional template rules.
    #[arg(long = "manifest", value_name = "PATH")]
    pub manifest: Option<PathBuf>,
}

#[derive(Args)]
pub struct RunArgs {
    /// Project that owns the dataset.
    #[arg(long = "project", value_name = "PROJECT")]
    pub project: String,

    /// Dataset to clean.
    #[arg(long = "dataset", value_name = "DATASET")]
    pub dataset: String,

    /// Data tier whose rules are run.
    #[arg(long = "tier", value_name = "TIER")]
    pub tier: Tier,

    /// Root directory of the local warehouse.
    #[arg(long = "warehouse-root", value_name = "DIR", default_value = "warehouse")]
    pub warehouse_root: PathBuf,

    #[command(flatten)]
    pub registry: RegistryArgs,

    /// Run only these rules (repeatable).
    #[arg(long = "only", value_name = "RULE_ID")]
    pub only: Vec<RuleId>,

    /// Skip these rules (repeatable).
    #[arg(long = "skip", value_name = "RULE_ID")]
    pub skip: Vec<RuleId>,

    /// Rule parameter as NAME=VALUE (repeatable).
    #[arg(long = "param", value_name = "NAME=VALUE")]
    pub params: Vec<String>,

    /// Prefix for sandbox table names.
    #[arg(long = "table-namer", value_name = "PREFIX")]
    pub table_namer: Option<String>,

    /// Skip the validation hook of every rule.
    #[arg(long = "no-validate")]
    pub no_validate: bool,

    /// Also write the run report as JSON.
    #[arg(long = "report-json", value_name = "PATH")]
    pub report_json: Option<PathBuf>,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Data tier to plan.
    #[arg(long = "tier", value_name = "TIER")]
    pub tier: Tier,

    /// Project used when rendering queries.
    #[arg(long = "project", value_name = "PROJECT", default_value = "project")]
    pub project: String,

    /// Dataset used when rendering queries.
    #[arg(long = "dataset", value_name = "DATASET", default_value = "dataset")]
    pub dataset: String,

    #[command(flatten)]
    pub registry: RegistryArgs,

    /// Rule parameter as NAME=VALUE (repeatable).
    #[arg(long = "param", value_name = "NAME=VALUE")]
    pub params: Vec<String>,

    /// Prefix for sandbox table names.
    #[arg(long = "table-namer", value_name = "PREFIX")]
    pub table_namer: Option<String>,

    /// Print the SQL every rule would submit.
    #[arg(long = "show-queries")]
    pub show_queries: bool,
}

#[derive(Args)]
pub struct RulesArgs {
    /// Only list rules registered for this tier.
    #[arg(long = "tier", value_name = "TIER")]
    pub tier: Option<Tier>,

    #[command(flatten)]
    pub registry: RegistryArgs,
}

#[derive(Args)]
pub struct SandboxArgs {
    #[arg(long = "project", value_name = "PROJECT")]
    pub project: String,

    #[arg(long = "dataset", value_name = "DATASET")]
    pub dataset: String,

    /// Root directory of the local warehouse.
    #[arg(long = "warehouse-root", value_name = "DIR", default_value = "warehouse")]
    pub warehouse_root: PathBuf,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
