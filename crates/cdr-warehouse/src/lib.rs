//! SQL warehouse interface used by the cleaning engine.
//!
//! - [`Warehouse`] / [`Job`]: the blocking client interface
//! - [`LocalWarehouse`]: CSV files queried with the Polars SQL engine
//! - [`testing::MockWarehouse`]: in-memory recorder for tests

pub mod client;
pub mod error;
pub mod local;
pub mod testing;
pub mod types;

pub use client::{Job, Warehouse, run_and_wait};
pub use error::{JobError, Result, WarehouseError};
pub use local::LocalWarehouse;
pub use types::{DatasetInfo, DatasetOptions, JobStats, QueryJob, TableRef};
