use std::future::Future;
use std::time::Duration;

use crate::{Error, Result};

/// Bound an external call by `limit`, folding the elapsed case into
/// [`Error::Timeout`] so every call site reports through one error type.
pub async fn with_timeout<T, F>(operation: &'static str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            operation,
            elapsed: limit,
        }),
    }
}
