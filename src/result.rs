use super::errors::PoolError;

/// Crate-wide result alias.
pub type PoolResult<T> = Result<T, PoolError>;
