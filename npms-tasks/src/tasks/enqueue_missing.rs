//! enqueue-missing task
//!
//! Finds packages that were not analyzed and enqueues them. Useful when
//! packages were lost due to repeated transient errors, e.g. the network
//! connection dropped or GitHub was down.

use crate::dispatcher::{dispatch, DispatchOptions};
use crate::error::TaskError;
use crate::fetcher::{fetch_analyzed_ids, fetch_registry_ids, Denylist, KeyListing};
use crate::queue::WorkQueue;
use crate::reconciler::reconcile;
use tracing::{debug, info};

/// Outcome of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueMissingReport {
    pub registry_count: usize,
    pub analyzed_count: usize,
    pub missing_count: usize,
    pub enqueued: usize,
    pub dry_run: bool,
}

/// Reconcile the registry against the analysis store and enqueue the difference
///
/// Both listings run concurrently; either failing aborts the run before any
/// difference is computed. In dry-run mode the queue is never written to.
pub async fn run<R, A, Q>(
    registry: &R,
    analysis: &A,
    queue: &Q,
    denylist: &Denylist,
    options: &DispatchOptions,
) -> Result<EnqueueMissingReport, TaskError>
where
    R: KeyListing + ?Sized,
    A: KeyListing + ?Sized,
    Q: WorkQueue + ?Sized,
{
    info!("Fetching npm & npms packages, this might take a while..");

    let (registry_ids, analyzed_ids) = tokio::try_join!(
        fetch_registry_ids(registry, denylist),
        fetch_analyzed_ids(analysis),
    )?;

    let registry_count = registry_ids.len();
    let analyzed_count = analyzed_ids.len();
    let missing = reconcile(registry_ids, &analyzed_ids);
    drop(analyzed_ids);

    info!(
        registry = registry_count,
        analyzed = analyzed_count,
        missing = missing.len(),
        "There's a total of {} missing packages",
        missing.len()
    );
    for id in missing.to_sorted_vec() {
        debug!(package = %id, "Missing package");
    }

    let mut report = EnqueueMissingReport {
        registry_count,
        analyzed_count,
        missing_count: missing.len(),
        enqueued: 0,
        dry_run: options.dry_run,
    };

    if missing.is_empty() || options.dry_run {
        info!(dry_run = options.dry_run, "Exiting..");
        return Ok(report);
    }

    report.enqueued = dispatch(
        missing,
        move |id: String| async move { queue.push(&id).await },
        options,
        None,
    )
    .await?;

    info!(count = report.enqueued, "Missing packages were enqueued!");
    Ok(report)
}
