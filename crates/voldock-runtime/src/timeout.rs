use crate::error::{Result, RuntimeError};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Run a backend call, failing with `RuntimeError::Timeout` once `limit`
/// elapses. The call's future is dropped on expiry.
pub async fn bounded<T, F>(operation: &str, target: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!("{} of {} timed out after {:?}", operation, target, limit);
            Err(RuntimeError::timeout(operation, target, limit))
        }
    }
}
