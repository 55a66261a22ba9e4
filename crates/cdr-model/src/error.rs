use thiserror::Error;

/// Errors raised while constructing model values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ModelError {
    /// Rule identifiers must contain at least one non-whitespace character.
    #[error("invalid rule id: {0:?}")]
    InvalidRuleId(String),

    /// The tier name does not match any known dataset tier.
    #[error("unknown dataset tier: {0}")]
    UnknownTier(String),

    /// Query specifications require SQL text.
    #[error("query text must not be empty")]
    EmptyQuery,

    /// The write disposition name is not recognised.
    #[error("unknown write disposition: {0}")]
    UnknownWriteDisposition(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
