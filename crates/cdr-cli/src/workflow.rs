//! Glue between parsed CLI arguments and the cleaning engine.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use cdr_core::{
    EngineOptions, Registry, RuleOverrides, RunReport, build_default_registry, register_manifest,
};
use cdr_model::RuleId;
use tracing::info;

/// Exit code of a run where some rule failed and halted the run.
pub const EXIT_FAILED: i32 = 1;
/// Exit code of a run that completed with validation failures only.
pub const EXIT_VALIDATION_FAILED: i32 = 2;

/// Split a `NAME=VALUE` rule parameter.
pub fn parse_param(raw: &str) -> Result<(String, String)> {
    let Some((name, value)) = raw.split_once('=') else {
        bail!("invalid parameter `{raw}`: expected NAME=VALUE");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("invalid parameter `{raw}`: name is empty");
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Parse repeated `--param` values; later values win.
pub fn parse_params(raw: &[String]) -> Result<BTreeMap<String, String>> {
    raw.iter().map(|param| parse_param(param)).collect()
}

/// Shipped rules plus the rules of an optional manifest.
pub fn load_registry(manifest: Option<&Path>) -> Result<Registry> {
    let mut registry = build_default_registry().context("build default rule registry")?;
    if let Some(path) = manifest {
        let added = register_manifest(&mut registry, path)
            .with_context(|| format!("register manifest {}", path.display()))?;
        info!(manifest = %path.display(), rules = added, "registered manifest rules");
    }
    Ok(registry)
}

/// `None` when neither list names a rule.
pub fn overrides_from(only: &[RuleId], skip: &[RuleId]) -> Option<RuleOverrides> {
    let overrides = RuleOverrides::new()
        .only(only.iter().cloned())
        .skip(skip.iter().cloned());
    (!overrides.is_empty()).then_some(overrides)
}

pub fn engine_options(
    params: &[String],
    table_namer: Option<&str>,
    run_validation: bool,
) -> Result<EngineOptions> {
    let mut options = EngineOptions::new()
        .with_params(parse_params(params)?)
        .with_validation(run_validation);
    if let Some(namer) = table_namer {
        options = options.with_table_namer(namer);
    }
    Ok(options)
}

/// Process exit code for a finished run.
pub fn exit_code(report: &RunReport) -> i32 {
    if report.has_failures() {
        EXIT_FAILED
    } else if report.validation_failures().is_empty() {
        0
    } else {
        EXIT_VALIDATION_FAILED
    }
}

pub fn write_report_json(report: &RunReport, path: &Path, query_preview_chars: usize) -> Result<()> {
    let summary = report.summary(query_preview_chars);
    let json = serde_json::to_string_pretty(&summary).context("serialize run report")?;
    fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    info!(path = %path.display(), "wrote run report");
    Ok(())
}
