//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::SyncError;

/// Wrap a future with a timeout; expiry is reported as [`SyncError::Timeout`].
pub async fn with_timeout<T, E>(
    duration: Duration,
    future: impl Future<Output = Result<T, E>>,
) -> Result<T, E>
where
    E: From<SyncError>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::Timeout(duration.as_millis() as u64).into()),
    }
}
