//! Bounded Dispatcher
//!
//! Pushes every missing id onto the work queue with at most `concurrency`
//! pushes in flight. The cap is the only backpressure in the system: without
//! it a run would open 10^5 concurrent requests against the queue transport.
//!
//! A failed push is fatal to the whole dispatch. No new pushes start after the
//! first failure; pushes already in flight are allowed to settle before the
//! error is returned. There is no checkpoint: re-running the task recomputes
//! the missing set, and pushing an already queued id is harmless.

use crate::error::{DispatchError, QueueError};
use crate::reconciler::MissingSet;
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use tracing::{debug, error, info, warn};

pub const DEFAULT_CONCURRENCY: usize = 15;
pub const DEFAULT_PROGRESS_EVERY: usize = 1000;

/// Progress callback, invoked with the cumulative number of completed pushes
pub type ProgressCallback = dyn Fn(usize) + Send + Sync;

/// Dispatch options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Maximum number of in-flight pushes (0 is treated as 1)
    pub concurrency: usize,
    /// Inspection mode: compute everything, write nothing
    pub dry_run: bool,
    /// Report progress every N completed pushes (0 disables progress reports)
    pub progress_every: usize,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            dry_run: false,
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }
}

/// Push every id of `missing` through `push`
///
/// Returns the number of ids pushed: 0 for an empty set or a dry run, the
/// size of the set otherwise. Each id is pushed exactly once, in no
/// particular order.
pub async fn dispatch<F, Fut>(
    missing: MissingSet,
    push: F,
    options: &DispatchOptions,
    on_progress: Option<&ProgressCallback>,
) -> Result<usize, DispatchError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<(), QueueError>>,
{
    if missing.is_empty() || options.dry_run {
        debug!(
            missing = missing.len(),
            dry_run = options.dry_run,
            "Nothing to dispatch"
        );
        return Ok(0);
    }

    let concurrency = if options.concurrency == 0 {
        warn!("Dispatch concurrency of 0 requested, using 1");
        1
    } else {
        options.concurrency
    };

    let total = missing.len();
    let mut pending = missing.into_iter();
    let mut in_flight = FuturesUnordered::new();
    let mut completed = 0usize;
    let mut failure: Option<DispatchError> = None;

    loop {
        // Top up the window; stop starting new pushes once one has failed
        while failure.is_none() && in_flight.len() < concurrency {
            let Some(id) = pending.next() else {
                break;
            };
            let push_fut = push(id.clone());
            in_flight.push(async move { (id, push_fut.await) });
        }

        let Some((id, result)) = in_flight.next().await else {
            break;
        };

        match result {
            Ok(()) => {
                completed += 1;
                if options.progress_every > 0 && completed % options.progress_every == 0 {
                    info!(count = completed, total, "Enqueued {} packages", completed);
                    if let Some(callback) = on_progress {
                        callback(completed);
                    }
                }
            }
            Err(source) => {
                error!(package = %id, error = %source, "Failed to enqueue package");
                if failure.is_none() {
                    failure = Some(DispatchError { id, source });
                }
            }
        }
    }

    match failure {
        Some(err) => Err(err),
        None => Ok(completed),
    }
}
