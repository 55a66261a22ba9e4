//! Recording warehouse for tests and dry runs.
//!
//! [`MockWarehouse`] keeps datasets in memory, records every call, and fails
//! queries that match a configured predicate.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use cdr_model::WriteDisposition;

use crate::client::{Job, Warehouse};
use crate::error::{JobError, Result, WarehouseError};
use crate::types::{DatasetInfo, DatasetOptions, JobStats, QueryJob, TableRef};

/// A call made against a [`MockWarehouse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarehouseCall {
    CreateDataset {
        project: String,
        dataset: String,
    },
    ListDatasets {
        project: String,
    },
    RunQuery {
        project: String,
        query: String,
        default_dataset: Option<String>,
        destination: Option<TableRef>,
        write_disposition: WriteDisposition,
    },
    DeleteDataset {
        project: String,
        dataset: String,
    },
    CountRows {
        project: String,
        query: String,
    },
}

impl WarehouseCall {
    /// Returns true for calls that can change warehouse state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            WarehouseCall::CreateDataset { .. }
                | WarehouseCall::RunQuery { .. }
                | WarehouseCall::DeleteDataset { .. }
        )
    }
}

type FailurePredicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// In-memory warehouse that records calls.
pub struct MockWarehouse {
    calls: Mutex<Vec<WarehouseCall>>,
    datasets: Mutex<BTreeMap<String, BTreeSet<String>>>,
    fail_when: Option<FailurePredicate>,
    row_count: u64,
    next_job: AtomicU64,
}

impl Default for MockWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWarehouse {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            datasets: Mutex::new(BTreeMap::new()),
            fail_when: None,
            row_count: 0,
            next_job: AtomicU64::new(1),
        }
    }

    /// Seed an existing dataset.
    #[must_use]
    pub fn with_dataset(self, project: &str, dataset: &str) -> Self {
        lock(&self.datasets)
            .entry(project.to_string())
            .or_default()
            .insert(dataset.to_string());
        self
    }

    /// Fail every query whose text contains `needle`.
    #[must_use]
    pub fn fail_queries_containing(self, needle: impl Into<String>) -> Self {
        let needle = needle.into();
        self.fail_queries_when(move |query| query.contains(&needle))
    }

    #[must_use]
    pub fn fail_queries_when(mut self, predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.fail_when = Some(Box::new(predicate));
        self
    }

    /// Row count returned by [`Warehouse::count_rows`].
    #[must_use]
    pub fn with_row_count(mut self, rows: u64) -> Self {
        self.row_count = rows;
        self
    }

    pub fn calls(&self) -> Vec<WarehouseCall> {
        lock(&self.calls).clone()
    }

    /// Query texts submitted through `run_query`, in order.
    pub fn queries(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                WarehouseCall::RunQuery { query, .. } => Some(query.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn mutation_count(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| call.is_mutation())
            .count()
    }

    pub fn has_dataset(&self, project: &str, dataset: &str) -> bool {
        lock(&self.datasets)
            .get(project)
            .is_some_and(|datasets| datasets.contains(dataset))
    }

    fn record(&self, call: WarehouseCall) {
        lock(&self.calls).push(call);
    }
}

impl Warehouse for MockWarehouse {
    fn create_dataset(
        &self,
        project: &str,
        dataset: &str,
        options: &DatasetOptions,
    ) -> Result<DatasetInfo> {
        self.record(WarehouseCall::CreateDataset {
            project: project.to_string(),
            dataset: dataset.to_string(),
        });
        let inserted = lock(&self.datasets)
            .entry(project.to_string())
            .or_default()
            .insert(dataset.to_string());
        if !inserted && !options.exists_ok {
            return Err(WarehouseError::DatasetExists {
                project: project.to_string(),
                dataset: dataset.to_string(),
            });
        }
        Ok(DatasetInfo {
            project: project.to_string(),
            dataset: dataset.to_string(),
            description: options.description.clone(),
            labels: options.labels.clone(),
        })
    }

    fn list_datasets(&self, project: &str) -> Result<Vec<String>> {
        self.record(WarehouseCall::ListDatasets {
            project: project.to_string(),
        });
        Ok(lock(&self.datasets)
            .get(project)
            .map(|datasets| datasets.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn run_query(&self, project: &str, job: &QueryJob) -> Result<Box<dyn Job + '_>> {
        self.record(WarehouseCall::RunQuery {
            project: project.to_string(),
            query: job.query.clone(),
            default_dataset: job.default_dataset.clone(),
            destination: job.destination.clone(),
            write_disposition: job.write_disposition,
        });
        let job_id = format!("mock_job_{}", self.next_job.fetch_add(1, Ordering::Relaxed));
        let error = self
            .fail_when
            .as_ref()
            .filter(|predicate| predicate(job.query.as_str()))
            .map(|_| JobError::new(job_id.as_str(), "invalidQuery", "query rejected by mock warehouse"));
        Ok(Box::new(MockJob { job_id, error }))
    }

    fn delete_dataset(&self, project: &str, dataset: &str, _delete_contents: bool) -> Result<()> {
        self.record(WarehouseCall::DeleteDataset {
            project: project.to_string(),
            dataset: dataset.to_string(),
        });
        let removed = lock(&self.datasets)
            .get_mut(project)
            .is_some_and(|datasets| datasets.remove(dataset));
        if removed {
            Ok(())
        } else {
            Err(WarehouseError::DatasetNotFound {
                project: project.to_string(),
                dataset: dataset.to_string(),
            })
        }
    }

    fn count_rows(&self, project: &str, job: &QueryJob) -> Result<u64> {
        self.record(WarehouseCall::CountRows {
            project: project.to_string(),
            query: job.query.clone(),
        });
        Ok(self.row_count)
    }
}

struct MockJob {
    job_id: String,
    error: Option<JobError>,
}

impl Job for MockJob {
    fn job_id(&self) -> &str {
        &self.job_id
    }

    fn wait(&mut self) -> std::result::Result<JobStats, JobError> {
        match self.error.take() {
            Some(error) => Err(error),
            None => Ok(JobStats {
                job_id: self.job_id.clone(),
                rows_written: None,
            }),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
