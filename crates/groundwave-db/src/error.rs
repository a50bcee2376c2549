//! error types for groundwave-db

use thiserror::Error;

/// errors from the database layer.
#[derive(Debug, Error)]
pub enum Error {
    /// could not reach or configure the database
    #[error("database connection error: {0}")]
    Connection(String),

    /// schema migration failed
    #[error("database migration failed: {0}")]
    Migration(String),

    /// a query failed
    #[error("database error: {0}")]
    Query(#[from] sea_orm::DbErr),

    /// a stored value could not be decoded
    #[error("invalid stored data: {0}")]
    InvalidData(String),

    /// the row the operation targets does not exist
    #[error("{0} not found")]
    NotFound(&'static str),

    /// the operation conflicts with the current state
    #[error("{0}")]
    Conflict(String),
}
