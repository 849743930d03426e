use crate::catalog::CatalogError;
use crate::storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("operator is not open")]
    NotOpen,

    #[error("operator is already open")]
    AlreadyOpen,

    #[error("unsupported aggregate: {0}")]
    UnsupportedAggregate(String),

    #[error("transaction aborted")]
    TransactionAborted,
}

pub type QueryResult<T> = Result<T, QueryError>;
