//! Data model for CDR cleaning rules: tiers, rule metadata, and query
//! specifications.

pub mod descriptor;
pub mod error;
pub mod ids;
pub mod query;
pub mod status;
pub mod tier;

pub use descriptor::RuleDescriptor;
pub use error::{ModelError, Result};
pub use ids::RuleId;
pub use query::{QuerySpec, WriteDisposition};
pub use status::RuleStatus;
pub use tier::Tier;
