//! Store errors

use thiserror::Error;

/// Persistence errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLx error (connection, statement, or constraint failure)
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Unique-constraint violation on a natural key
    #[error("duplicate {entity} key: {key}")]
    Duplicate {
        /// Entity whose key collided
        entity: &'static str,
        /// The colliding key value
        key: String,
    },

    /// A stored value could not be decoded into its domain type
    #[error("corrupt record: {0}")]
    Decode(String),

    /// Record not found
    #[error("record not found")]
    NotFound,
}

impl StoreError {
    /// Whether this error is a natural-key collision
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

/// Convenience alias for store results
pub type StoreResult<T> = Result<T, StoreError>;
