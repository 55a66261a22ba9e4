//! Library side of the `cdr-cleaner` binary.

pub mod logging;
pub mod workflow;
