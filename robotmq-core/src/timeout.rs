//! Timeout utilities for async operations
//!
//! Wraps compio's timer so callers get an `io::ErrorKind::TimedOut` error
//! instead of an `Elapsed` marker.

use compio::time::timeout;
use std::future::Future;
use std::io;
use std::time::Duration;

/// Run `fut` with an optional deadline.
///
/// # Arguments
///
/// * `duration` - Maximum time to wait
///    - `None`: Block indefinitely (no timeout)
///    - `Some(duration)`: Wait up to duration
///
/// # Returns
///
/// * The future's own result if it completed in time
/// * `Err(io::ErrorKind::TimedOut)` if the deadline elapsed first
pub async fn with_timeout<T, F>(duration: Option<Duration>, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match duration {
        None => fut.await,
        Some(d) => match timeout(d, fut).await {
            Ok(result) => result,
            Err(_elapsed) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("Operation timed out after {:?}", d),
            )),
        },
    }
}
