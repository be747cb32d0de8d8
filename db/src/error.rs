use miette::Diagnostic;
use thiserror::Error;

/// Errors from any database interaction, wrapping `diesel::result::Error` and widened to
/// also cover pool/connection failure.
#[derive(Debug, Error, Diagnostic)]
pub enum QueryError {
    #[error(transparent)]
    Diesel(#[from] diesel::result::Error),

    #[error("could not acquire a pooled connection")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("could not establish a database connection")]
    Connection(#[from] diesel::ConnectionError),
}

pub type QueryResult<T> = Result<T, QueryError>;
