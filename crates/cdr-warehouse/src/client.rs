//! The warehouse interface the cleaning engine depends on.
//!
//! The warehouse stores all table data and executes all SQL. Implementations
//! are blocking: [`Job::wait`] returns only once the job has finished.

use crate::error::{JobError, Result};
use crate::types::{DatasetInfo, DatasetOptions, JobStats, QueryJob};

/// Handle to a submitted query job.
pub trait Job {
    fn job_id(&self) -> &str;

    /// Block until the job completes.
    ///
    /// # Errors
    ///
    /// Returns the warehouse's job error when the query failed.
    fn wait(&mut self) -> std::result::Result<JobStats, JobError>;
}

/// Client for an external SQL warehouse.
pub trait Warehouse {
    /// Create a dataset.
    ///
    /// # Errors
    ///
    /// Fails with [`WarehouseError::DatasetExists`](crate::WarehouseError::DatasetExists)
    /// when the dataset exists and `options.exists_ok` is false.
    fn create_dataset(
        &self,
        project: &str,
        dataset: &str,
        options: &DatasetOptions,
    ) -> Result<DatasetInfo>;

    /// List dataset identifiers in a project.
    fn list_datasets(&self, project: &str) -> Result<Vec<String>>;

    /// Submit a query job.
    fn run_query(&self, project: &str, job: &QueryJob) -> Result<Box<dyn Job + '_>>;

    /// Delete a dataset; non-empty datasets require `delete_contents`.
    fn delete_dataset(&self, project: &str, dataset: &str, delete_contents: bool) -> Result<()>;

    /// Run a read-only query and return the number of result rows.
    fn count_rows(&self, project: &str, job: &QueryJob) -> Result<u64>;
}

/// Submit `job` and block until it finishes.
///
/// Submission and job failures both surface as
/// [`WarehouseError`](crate::WarehouseError); job failures keep their job id.
pub fn run_and_wait(warehouse: &dyn Warehouse, project: &str, job: &QueryJob) -> Result<JobStats> {
    let mut handle = warehouse.run_query(project, job)?;
    Ok(handle.wait()?)
}
