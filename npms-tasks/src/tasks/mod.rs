//! Task entry points and shared teardown

pub mod enqueue_missing;
pub mod normalize;

use crate::error::TaskError;
use crate::queue::WorkQueue;
use std::time::Duration;
use tracing::info;

/// Close the queue client within `timeout`
///
/// Runs whether or not the task succeeded, so the process never exits with an
/// unbounded wait on transport handles.
pub async fn teardown<Q>(queue: &Q, timeout: Duration) -> Result<(), TaskError>
where
    Q: WorkQueue + ?Sized,
{
    match tokio::time::timeout(timeout, queue.close()).await {
        Ok(result) => {
            result?;
            info!("Queue client closed");
            Ok(())
        }
        Err(_) => Err(TaskError::ShutdownTimeout(timeout)),
    }
}
