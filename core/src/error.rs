use thiserror::Error;

/// Errors raised while answering a single query. They never touch the index.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Wildcard patterns must contain exactly one `*`.
    #[error("invalid wildcard pattern {pattern:?}: expected exactly one '*', found {wildcards}")]
    InvalidPattern { pattern: String, wildcards: usize },

    #[error("malformed boolean query: {0}")]
    MalformedQuery(String),

    #[error("wildcard pattern {pattern:?} used on an index built without permuterm support")]
    WildcardsDisabled { pattern: String },
}

pub type Result<T> = std::result::Result<T, QueryError>;
