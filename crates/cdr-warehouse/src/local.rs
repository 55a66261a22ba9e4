//! File-backed warehouse for local runs.
//!
//! Layout: `<root>/<project>/<dataset>/<table>.csv`, with dataset metadata in
//! `<dataset>/_dataset.json`. Queries run through the Polars SQL engine with
//! every table of the job's default dataset registered under its bare name,
//! so statements reference tables unqualified. Results are persisted only
//! through a job's destination table.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use cdr_model::WriteDisposition;
use polars::prelude::*;
use polars::sql::SQLContext;
use tracing::{debug, info};

use crate::client::{Job, Warehouse};
use crate::error::{JobError, Result, WarehouseError};
use crate::types::{DatasetInfo, DatasetOptions, JobStats, QueryJob, TableRef};

const METADATA_FILE: &str = "_dataset.json";
const TABLE_EXTENSION: &str = "csv";

/// Warehouse stored as CSV files under a root directory.
#[derive(Debug)]
pub struct LocalWarehouse {
    root: PathBuf,
    next_job: AtomicU64,
}

impl LocalWarehouse {
    /// Open (creating if needed) a warehouse rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| WarehouseError::io(&root, e))?;
        Ok(Self {
            root,
            next_job: AtomicU64::new(1),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn project_dir(&self, project: &str) -> Result<PathBuf> {
        check_name("project", project)?;
        Ok(self.root.join(project))
    }

    fn dataset_dir(&self, project: &str, dataset: &str) -> Result<PathBuf> {
        check_name("dataset", dataset)?;
        Ok(self.project_dir(project)?.join(dataset))
    }

    fn table_path(&self, project: &str, table: &TableRef) -> Result<PathBuf> {
        check_name("table", &table.table)?;
        Ok(self
            .dataset_dir(project, &table.dataset)?
            .join(format!("{}.{TABLE_EXTENSION}", table.table)))
    }

    fn existing_dataset_dir(&self, project: &str, dataset: &str) -> Result<PathBuf> {
        let dir = self.dataset_dir(project, dataset)?;
        if !dir.is_dir() {
            return Err(WarehouseError::DatasetNotFound {
                project: project.to_string(),
                dataset: dataset.to_string(),
            });
        }
        Ok(dir)
    }

    /// Table names of a dataset, sorted.
    pub fn table_names(&self, project: &str, dataset: &str) -> Result<Vec<String>> {
        let dir = self.existing_dataset_dir(project, dataset)?;
        let entries = fs::read_dir(&dir).map_err(|e| WarehouseError::io(&dir, e))?;
        let mut tables = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| WarehouseError::io(&dir, e))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(TABLE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                tables.push(stem.to_string());
            }
        }
        tables.sort();
        Ok(tables)
    }

    /// Read a table into memory.
    pub fn read_table(&self, project: &str, table: &TableRef) -> Result<DataFrame> {
        let path = self.table_path(project, table)?;
        if !path.is_file() {
            return Err(WarehouseError::TableNotFound {
                dataset: table.dataset.clone(),
                table: table.table.clone(),
            });
        }
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(100))
            .try_into_reader_with_file_path(Some(path))?
            .finish()?;
        Ok(df)
    }

    /// Write a table, replacing any existing contents.
    pub fn write_table(&self, project: &str, table: &TableRef, df: &mut DataFrame) -> Result<()> {
        self.existing_dataset_dir(project, &table.dataset)?;
        let path = self.table_path(project, table)?;
        let mut file = File::create(&path).map_err(|e| WarehouseError::io(&path, e))?;
        CsvWriter::new(&mut file).include_header(true).finish(df)?;
        Ok(())
    }

    /// Read dataset metadata.
    pub fn dataset_info(&self, project: &str, dataset: &str) -> Result<DatasetInfo> {
        let dir = self.existing_dataset_dir(project, dataset)?;
        let path = dir.join(METADATA_FILE);
        if !path.is_file() {
            return Ok(DatasetInfo {
                project: project.to_string(),
                dataset: dataset.to_string(),
                description: None,
                labels: Default::default(),
            });
        }
        let contents = fs::read_to_string(&path).map_err(|e| WarehouseError::io(&path, e))?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn execute(&self, project: &str, job: &QueryJob) -> Result<DataFrame> {
        let mut ctx = SQLContext::new();
        if let Some(dataset) = &job.default_dataset {
            for table in self.table_names(project, dataset)? {
                let table_ref = TableRef::new(dataset.as_str(), table.as_str());
                let df = self.read_table(project, &table_ref)?;
                ctx.register(&table, df.lazy());
            }
        }
        let df = ctx.execute(&job.query)?.collect()?;
        Ok(df)
    }

    fn materialize(&self, project: &str, job: &QueryJob) -> Result<Option<u64>> {
        let mut result = self.execute(project, job)?;
        let Some(destination) = &job.destination else {
            return Ok(None);
        };
        let path = self.table_path(project, destination)?;
        let rows = result.height() as u64;
        match job.write_disposition {
            WriteDisposition::Overwrite => self.write_table(project, destination, &mut result)?,
            WriteDisposition::Append => {
                if path.is_file() {
                    let mut existing = self.read_table(project, destination)?;
                    existing.vstack_mut(&result)?;
                    self.write_table(project, destination, &mut existing)?;
                } else {
                    self.write_table(project, destination, &mut result)?;
                }
            }
            WriteDisposition::FailIfExists => {
                if path.is_file() && self.read_table(project, destination)?.height() > 0 {
                    return Err(JobError::new(
                        "",
                        "duplicate",
                        format!("destination table {destination} already contains data"),
                    )
                    .into());
                }
                self.write_table(project, destination, &mut result)?;
            }
        }
        Ok(Some(rows))
    }
}

impl Warehouse for LocalWarehouse {
    fn create_dataset(
        &self,
        project: &str,
        dataset: &str,
        options: &DatasetOptions,
    ) -> Result<DatasetInfo> {
        let dir = self.dataset_dir(project, dataset)?;
        if dir.is_dir() {
            if options.exists_ok {
                return self.dataset_info(project, dataset);
            }
            return Err(WarehouseError::DatasetExists {
                project: project.to_string(),
                dataset: dataset.to_string(),
            });
        }
        fs::create_dir_all(&dir).map_err(|e| WarehouseError::io(&dir, e))?;
        let info = DatasetInfo {
            project: project.to_string(),
            dataset: dataset.to_string(),
            description: options.description.clone(),
            labels: options.labels.clone(),
        };
        let path = dir.join(METADATA_FILE);
        let contents = serde_json::to_string_pretty(&info)?;
        fs::write(&path, contents).map_err(|e| WarehouseError::io(&path, e))?;
        info!(project, dataset, "created dataset");
        Ok(info)
    }

    fn list_datasets(&self, project: &str) -> Result<Vec<String>> {
        let dir = self.project_dir(project)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir).map_err(|e| WarehouseError::io(&dir, e))?;
        let mut datasets = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| WarehouseError::io(&dir, e))?;
            if entry.path().is_dir()
                && let Some(name) = entry.file_name().to_str()
            {
                datasets.push(name.to_string());
            }
        }
        datasets.sort();
        Ok(datasets)
    }

    fn run_query(&self, project: &str, job: &QueryJob) -> Result<Box<dyn Job + '_>> {
        check_name("project", project)?;
        let job_number = self.next_job.fetch_add(1, Ordering::Relaxed);
        let job_id = format!("{project}_job_{job_number:06}");
        debug!(job_id = %job_id, query = %job.query, "submitted local job");
        Ok(Box::new(LocalJob {
            warehouse: self,
            project: project.to_string(),
            job: job.clone(),
            job_id,
        }))
    }

    fn delete_dataset(&self, project: &str, dataset: &str, delete_contents: bool) -> Result<()> {
        let dir = self.existing_dataset_dir(project, dataset)?;
        let tables = self.table_names(project, dataset)?.len();
        if tables > 0 && !delete_contents {
            return Err(WarehouseError::DatasetNotEmpty {
                project: project.to_string(),
                dataset: dataset.to_string(),
                tables,
            });
        }
        fs::remove_dir_all(&dir).map_err(|e| WarehouseError::io(&dir, e))?;
        info!(project, dataset, tables, "deleted dataset");
        Ok(())
    }

    fn count_rows(&self, project: &str, job: &QueryJob) -> Result<u64> {
        Ok(self.execute(project, job)?.height() as u64)
    }
}

struct LocalJob<'a> {
    warehouse: &'a LocalWarehouse,
    project: String,
    job: QueryJob,
    job_id: String,
}

impl Job for LocalJob<'_> {
    fn job_id(&self) -> &str {
        &self.job_id
    }

    fn wait(&mut self) -> std::result::Result<JobStats, JobError> {
        match self.warehouse.materialize(&self.project, &self.job) {
            Ok(rows_written) => Ok(JobStats {
                job_id: self.job_id.clone(),
                rows_written,
            }),
            Err(WarehouseError::Job(job)) => Err(JobError {
                job_id: self.job_id.clone(),
                ..job
            }),
            Err(error) => Err(JobError::new(
                self.job_id.as_str(),
                error.reason(),
                error.to_string(),
            )),
        }
    }
}

fn check_name(kind: &'static str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(WarehouseError::InvalidName {
            kind,
            name: name.to_string(),
        })
    }
}
