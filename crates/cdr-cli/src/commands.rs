use anyhow::{Context, Result};
use cdr_core::{Engine, Planner, RunReport, ensure_sandbox};
use cdr_model::RuleDescriptor;
use cdr_warehouse::LocalWarehouse;
use tracing::{info, info_span};

use cdr_cli::workflow::{engine_options, load_registry, overrides_from, write_report_json};

use crate::cli::{PlanArgs, RulesArgs, RunArgs, SandboxArgs};
use crate::summary::{print_plan, print_rules};

/// A finished run and the preview length its failures are reported with.
pub struct CleanRun {
    pub report: RunReport,
    pub query_preview_chars: usize,
}

pub fn run_clean(args: &RunArgs) -> Result<CleanRun> {
    let span = info_span!("clean", dataset = %args.dataset);
    let _guard = span.enter();

    let registry = load_registry(args.registry.manifest.as_deref())?;
    let options = engine_options(
        &args.params,
        args.table_namer.as_deref(),
        !args.no_validate,
    )?;
    let preview = options.query_preview_chars;
    let overrides = overrides_from(&args.only, &args.skip);

    let warehouse = LocalWarehouse::open(&args.warehouse_root).with_context(|| {
        format!("open warehouse at {}", args.warehouse_root.display())
    })?;
    let engine = Engine::new(&registry, &warehouse, options);
    let report = engine
        .run(&args.project, &args.dataset, args.tier, overrides.as_ref())
        .with_context(|| format!("clean {}.{}", args.project, args.dataset))?;

    if let Some(path) = &args.report_json {
        write_report_json(&report, path, preview)?;
    }
    Ok(CleanRun {
        report,
        query_preview_chars: preview,
    })
}

pub fn run_plan(args: &PlanArgs) -> Result<()> {
    let registry = load_registry(args.registry.manifest.as_deref())?;
    let options = engine_options(&args.params, args.table_namer.as_deref(), true)?;
    let planner = Planner::new(&registry, &options);
    let plan = planner
        .plan(args.tier)
        .with_context(|| format!("plan tier {}", args.tier))?;
    info!(tier = %args.tier, rules = plan.len(), "resolved execution plan");

    let rendered = if args.show_queries {
        Some(
            planner
                .render_queries(&plan, &args.project, &args.dataset)
                .context("render queries")?,
        )
    } else {
        None
    };
    print_plan(&plan, rendered.as_deref());
    Ok(())
}

pub fn run_rules(args: &RulesArgs) -> Result<()> {
    let registry = load_registry(args.registry.manifest.as_deref())?;
    let descriptors: Vec<&RuleDescriptor> = match args.tier {
        Some(tier) => registry.rules_for_tier(tier),
        None => registry.descriptors().collect(),
    };
    print_rules(&descriptors);
    Ok(())
}

pub fn run_sandbox(args: &SandboxArgs) -> Result<String> {
    let warehouse = LocalWarehouse::open(&args.warehouse_root).with_context(|| {
        format!("open warehouse at {}", args.warehouse_root.display())
    })?;
    ensure_sandbox(&warehouse, &args.project, &args.dataset)
        .with_context(|| format!("create sandbox for {}.{}", args.project, args.dataset))
}
