//! Error types for warehouse operations.

use std::path::PathBuf;

use thiserror::Error;

/// A query job that the warehouse accepted but could not complete.
///
/// The job id and the warehouse's own reason and message are preserved so
/// that operators can trace the failure back to the job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("job {job_id} failed ({reason}): {message}")]
pub struct JobError {
    pub job_id: String,
    /// Short machine-readable reason (e.g. `invalidQuery`, `notFound`).
    pub reason: String,
    pub message: String,
}

impl JobError {
    pub fn new(
        job_id: impl Into<String>,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            reason: reason.into(),
            message: message.into(),
        }
    }
}

/// Errors returned by [`Warehouse`](crate::Warehouse) implementations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WarehouseError {
    /// Dataset already exists and the caller did not allow it.
    #[error("dataset {project}.{dataset} already exists")]
    DatasetExists { project: String, dataset: String },

    #[error("dataset {project}.{dataset} not found")]
    DatasetNotFound { project: String, dataset: String },

    /// Deleting a dataset that still holds tables requires `delete_contents`.
    #[error("dataset {project}.{dataset} still contains {tables} table(s)")]
    DatasetNotEmpty {
        project: String,
        dataset: String,
        tables: usize,
    },

    #[error("table {dataset}.{table} not found")]
    TableNotFound { dataset: String, table: String },

    /// Project, dataset, or table names must be plain identifiers.
    #[error("invalid {kind} name: {name:?}")]
    InvalidName { kind: &'static str, name: String },

    #[error(transparent)]
    Job(#[from] JobError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("DataFrame error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("metadata error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WarehouseError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The job id, when the error came from a submitted job.
    pub fn job_id(&self) -> Option<&str> {
        match self {
            Self::Job(job) => Some(job.job_id.as_str()),
            _ => None,
        }
    }

    /// Short reason code in the warehouse's vocabulary.
    pub fn reason(&self) -> &str {
        match self {
            Self::Job(job) => job.reason.as_str(),
            Self::DatasetExists { .. } => "duplicate",
            Self::DatasetNotFound { .. } | Self::TableNotFound { .. } => "notFound",
            Self::DatasetNotEmpty { .. } | Self::InvalidName { .. } => "invalid",
            Self::Polars(_) => "invalidQuery",
            Self::Io { .. } | Self::Json(_) => "internalError",
        }
    }
}

/// Result type for warehouse operations.
pub type Result<T> = std::result::Result<T, WarehouseError>;
