use std::collections::BTreeMap;
use std::fmt;

use cdr_model::WriteDisposition;
use serde::{Deserialize, Serialize};

/// A table within a dataset of the current project.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn new(dataset: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.dataset, self.table)
    }
}

/// Options for dataset creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetOptions {
    pub description: Option<String>,
    pub labels: BTreeMap<String, String>,
    /// Succeed without changes when the dataset already exists.
    pub exists_ok: bool,
}

impl DatasetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn exists_ok(mut self, exists_ok: bool) -> Self {
        self.exists_ok = exists_ok;
        self
    }
}

/// Metadata of an existing dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub project: String,
    pub dataset: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// A query submission: SQL text plus job configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryJob {
    pub query: String,
    /// Dataset used to resolve unqualified table names.
    pub default_dataset: Option<String>,
    pub destination: Option<TableRef>,
    pub write_disposition: WriteDisposition,
}

impl QueryJob {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            default_dataset: None,
            destination: None,
            write_disposition: WriteDisposition::default(),
        }
    }

    #[must_use]
    pub fn with_default_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.default_dataset = Some(dataset.into());
        self
    }

    #[must_use]
    pub fn with_destination(mut self, destination: TableRef, disposition: WriteDisposition) -> Self {
        self.destination = Some(destination);
        self.write_disposition = disposition;
        self
    }
}

/// Statistics of a completed job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobStats {
    pub job_id: String,
    /// Rows materialized into the destination table, if any.
    pub rows_written: Option<u64>,
}
