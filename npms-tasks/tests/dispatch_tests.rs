//! Concurrency and completeness of the bounded dispatcher

mod helpers;

use helpers::FakeQueue;
use npms_tasks::dispatcher::{dispatch, DispatchOptions};
use npms_tasks::{MissingSet, WorkQueue};
use std::time::Duration;

fn missing(n: usize) -> MissingSet {
    (0..n).map(|i| format!("pkg-{:04}", i)).collect()
}

fn options(concurrency: usize) -> DispatchOptions {
    DispatchOptions {
        concurrency,
        dry_run: false,
        progress_every: 50,
    }
}

#[tokio::test]
async fn test_in_flight_pushes_never_exceed_concurrency() {
    for concurrency in [1, 3, 15] {
        let queue = FakeQueue::new();
        let queue_ref = &queue;

        let count = dispatch(
            missing(120),
            move |id: String| async move { queue_ref.push(&id).await },
            &options(concurrency),
            None,
        )
        .await
        .unwrap();

        assert_eq!(count, 120);
        assert!(
            queue.max_in_flight() <= concurrency,
            "max in flight {} exceeded {}",
            queue.max_in_flight(),
            concurrency
        );
    }
}

#[tokio::test]
async fn test_window_is_filled_up_to_concurrency() {
    let queue = FakeQueue::new().with_delay(Duration::from_millis(10));
    let queue_ref = &queue;

    dispatch(
        missing(40),
        move |id: String| async move { queue_ref.push(&id).await },
        &options(8),
        None,
    )
    .await
    .unwrap();

    assert_eq!(queue.max_in_flight(), 8);
}

#[tokio::test]
async fn test_every_id_is_pushed_exactly_once() {
    let queue = FakeQueue::new();
    let queue_ref = &queue;
    let set = missing(250);
    let expected: Vec<String> = set.to_sorted_vec().into_iter().map(String::from).collect();

    dispatch(
        set,
        move |id: String| async move { queue_ref.push(&id).await },
        &options(15),
        None,
    )
    .await
    .unwrap();

    assert_eq!(queue.pushed(), expected);
    assert_eq!(queue.started(), 250);
}

#[tokio::test]
async fn test_failure_settles_in_flight_pushes_before_returning() {
    let queue = FakeQueue::failing_on("pkg-0005").with_delay(Duration::from_millis(5));
    let queue_ref = &queue;

    let err = dispatch(
        missing(200),
        move |id: String| async move { queue_ref.push(&id).await },
        &options(10),
        None,
    )
    .await
    .unwrap_err();

    assert_eq!(err.id, "pkg-0005");
    // Nothing is left running once dispatch resolves
    assert_eq!(queue.in_flight(), 0);
    assert_eq!(queue.pushed().len() + 1, queue.started());
}
