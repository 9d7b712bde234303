use thiserror::Error;

use crate::model::Id;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy shared by repositories, the resolver, traversal and the gate.
///
/// `Validation`, `NotFound` and `Alignment` are recoverable at the calling boundary and
/// stay distinct so the caller can pick an empty or error state. `Unauthenticated` is
/// raised before any store access. `Store` is never retried here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Id },

    #[error("alignment error: {tokens} tokens but {values} activation values")]
    Alignment { tokens: usize, values: usize },

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("store error: {0}")]
    Store(String),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: Id) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::Store(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::not_found("dataset", 4).to_string(),
            "dataset 4 not found"
        );
        assert_eq!(
            Error::Alignment { tokens: 3, values: 2 }.to_string(),
            "alignment error: 3 tokens but 2 activation values"
        );
        assert_eq!(
            Error::validation("id must be numeric").to_string(),
            "validation error: id must be numeric"
        );
    }

    #[test]
    fn test_sqlx_error_becomes_store_error() {
        let err: Error = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, Error::Store(_)));
    }
}
