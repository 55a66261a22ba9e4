//! Query specifications produced by cleaning rules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// How a query result is written into its destination table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteDisposition {
    /// Replace the destination table contents (WRITE_TRUNCATE).
    Overwrite,
    /// Append rows to the destination table (WRITE_APPEND).
    Append,
    /// Fail when the destination table already holds data (WRITE_EMPTY).
    #[default]
    FailIfExists,
}

impl WriteDisposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteDisposition::Overwrite => "overwrite",
            WriteDisposition::Append => "append",
            WriteDisposition::FailIfExists => "fail_if_exists",
        }
    }

    /// The warehouse job configuration name for this disposition.
    pub fn job_name(&self) -> &'static str {
        match self {
            WriteDisposition::Overwrite => "WRITE_TRUNCATE",
            WriteDisposition::Append => "WRITE_APPEND",
            WriteDisposition::FailIfExists => "WRITE_EMPTY",
        }
    }
}

impl fmt::Display for WriteDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WriteDisposition {
    type Err = ModelError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "OVERWRITE" | "WRITE_TRUNCATE" => Ok(Self::Overwrite),
            "APPEND" | "WRITE_APPEND" => Ok(Self::Append),
            "FAIL_IF_EXISTS" | "WRITE_EMPTY" => Ok(Self::FailIfExists),
            _ => Err(ModelError::UnknownWriteDisposition(s.to_string())),
        }
    }
}

/// One SQL statement a rule asks the engine to run.
///
/// A destination without an explicit disposition writes with
/// [`WriteDisposition::FailIfExists`]; replacing data requires calling
/// [`QuerySpec::overwrite`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    query_text: String,
    destination_table: Option<String>,
    destination_dataset: Option<String>,
    write_disposition: WriteDisposition,
}

impl QuerySpec {
    pub fn new(query_text: impl Into<String>) -> Result<Self> {
        let query_text = query_text.into();
        if query_text.trim().is_empty() {
            return Err(ModelError::EmptyQuery);
        }
        Ok(Self {
            query_text,
            destination_table: None,
            destination_dataset: None,
            write_disposition: WriteDisposition::default(),
        })
    }

    /// Materialize the result into `table` of the rule's bound dataset.
    #[must_use]
    pub fn into_table(mut self, table: impl Into<String>) -> Self {
        self.destination_table = Some(table.into());
        self
    }

    /// Materialize the result into `table` of `dataset`.
    #[must_use]
    pub fn into_dataset_table(mut self, dataset: impl Into<String>, table: impl Into<String>) -> Self {
        self.destination_dataset = Some(dataset.into());
        self.destination_table = Some(table.into());
        self
    }

    #[must_use]
    pub fn overwrite(self) -> Self {
        self.with_write_disposition(WriteDisposition::Overwrite)
    }

    #[must_use]
    pub fn append(self) -> Self {
        self.with_write_disposition(WriteDisposition::Append)
    }

    #[must_use]
    pub fn with_write_disposition(mut self, disposition: WriteDisposition) -> Self {
        self.write_disposition = disposition;
        self
    }

    pub fn query_text(&self) -> &str {
        &self.query_text
    }

    pub fn destination_table(&self) -> Option<&str> {
        self.destination_table.as_deref()
    }

    pub fn destination_dataset(&self) -> Option<&str> {
        self.destination_dataset.as_deref()
    }

    /// Destination dataset, falling back to `default_dataset`.
    pub fn resolved_destination_dataset<'a>(&'a self, default_dataset: &'a str) -> &'a str {
        self.destination_dataset.as_deref().unwrap_or(default_dataset)
    }

    pub fn write_disposition(&self) -> WriteDisposition {
        self.write_disposition
    }
}
