//! SQL templates with `{{ name }}` placeholders, and the rule type built on
//! them.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use anyhow::Context;
use cdr_model::{QuerySpec, RuleDescriptor, WriteDisposition};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rule::{CleaningRule, RuleContext};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.]*)\s*\}\}").expect("placeholder pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unknown placeholder `{{{{ {0} }}}}`")]
    UnknownPlaceholder(String),
}

/// Substitute every `{{ name }}` in `template` from `vars`.
///
/// # Errors
///
/// Returns [`TemplateError::UnknownPlaceholder`] for the first placeholder
/// with no value.
pub fn render(template: &str, vars: &BTreeMap<String, String>) -> Result<String, TemplateError> {
    if let Some(unknown) = PLACEHOLDER
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .find(|name| !vars.contains_key(name))
    {
        return Err(TemplateError::UnknownPlaceholder(unknown));
    }
    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        vars.get(&caps[1]).cloned().unwrap_or_default()
    });
    Ok(rendered.into_owned())
}

/// Variables available to a rule's templates in `ctx`.
pub fn template_vars(ctx: &RuleContext, tables: &[String]) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    vars.insert("project".to_string(), ctx.project_id.clone());
    vars.insert("dataset".to_string(), ctx.dataset_id.clone());
    vars.insert("sandbox_dataset".to_string(), ctx.sandbox_dataset_id.clone());
    vars.insert("table_namer".to_string(), ctx.table_namer().to_string());
    for table in tables {
        vars.insert(format!("sandbox.{table}"), ctx.sandbox_table_for(table));
    }
    for (name, value) in ctx.params() {
        vars.insert(format!("param.{name}"), value.clone());
    }
    vars
}

/// Which dataset a templated query writes into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    /// The dataset being cleaned.
    #[default]
    Target,
    Sandbox,
}

/// One query of a [`TemplateRule`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryTemplate {
    pub sql: String,
    /// Destination table name; may itself contain placeholders.
    #[serde(default)]
    pub destination_table: Option<String>,
    #[serde(default)]
    pub destination: Destination,
    #[serde(default)]
    pub write_disposition: Option<WriteDisposition>,
}

impl QueryTemplate {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            destination_table: None,
            destination: Destination::Target,
            write_disposition: None,
        }
    }

    #[must_use]
    pub fn into_table(mut self, destination: Destination, table: impl Into<String>) -> Self {
        self.destination = destination;
        self.destination_table = Some(table.into());
        self
    }

    #[must_use]
    pub fn with_write_disposition(mut self, disposition: WriteDisposition) -> Self {
        self.write_disposition = Some(disposition);
        self
    }

    fn render(
        &self,
        ctx: &RuleContext,
        vars: &BTreeMap<String, String>,
    ) -> anyhow::Result<QuerySpec> {
        let mut spec = QuerySpec::new(render(&self.sql, vars)?)?;
        if let Some(table) = &self.destination_table {
            let table = render(table, vars)?;
            let dataset = match self.destination {
                Destination::Target => &ctx.dataset_id,
                Destination::Sandbox => &ctx.sandbox_dataset_id,
            };
            spec = spec
                .into_dataset_table(dataset.as_str(), table)
                .with_write_disposition(self.write_disposition.unwrap_or_default());
        }
        Ok(spec)
    }
}

/// A rule whose queries are SQL templates.
#[derive(Debug, Clone)]
pub struct TemplateRule {
    descriptor: RuleDescriptor,
    queries: Vec<QueryTemplate>,
}

impl TemplateRule {
    pub fn new(descriptor: RuleDescriptor, queries: Vec<QueryTemplate>) -> Self {
        Self {
            descriptor,
            queries,
        }
    }

    pub fn templates(&self) -> &[QueryTemplate] {
        &self.queries
    }
}

impl CleaningRule for TemplateRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn get_queries(&self, ctx: &RuleContext) -> anyhow::Result<Vec<QuerySpec>> {
        let vars = template_vars(ctx, &self.descriptor.affected_tables);
        self.queries
            .iter()
            .enumerate()
            .map(|(i, query)| {
                query
                    .render(ctx, &vars)
                    .with_context(|| format!("rendering query {i}"))
            })
            .collect()
    }
}
