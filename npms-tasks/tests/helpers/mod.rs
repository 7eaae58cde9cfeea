//! In-memory sources and queues for driving the tasks without CouchDB or RabbitMQ

#![allow(dead_code)]

use async_trait::async_trait;
use npms_tasks::{KeyListing, KeyRange, QueueError, SourceError, WorkQueue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;

/// Key listing backed by a fixed list of keys, honoring the requested range
pub struct FakeSource {
    keys: Vec<String>,
    fail: bool,
    barrier: Option<Arc<Barrier>>,
    pub calls: AtomicUsize,
}

impl FakeSource {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            fail: false,
            barrier: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// A source whose listing always fails
    pub fn failing() -> Self {
        Self {
            keys: Vec::new(),
            fail: true,
            barrier: None,
            calls: AtomicUsize::new(0),
        }
    }
}

impl FakeSource {
    /// Wait on `barrier` before answering, so the listing only completes once
    /// every party sharing the barrier is listing at the same time
    pub fn with_barrier(mut self, barrier: Arc<Barrier>) -> Self {
        self.barrier = Some(barrier);
        self
    }
}

#[async_trait]
impl KeyListing for FakeSource {
    async fn list_keys(&self, range: Option<&KeyRange>) -> Result<Vec<String>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        if self.fail {
            return Err(SourceError::Timeout(Duration::from_secs(15)));
        }

        Ok(self
            .keys
            .iter()
            .filter(|key| range.map_or(true, |r| r.contains(key)))
            .cloned()
            .collect())
    }
}

/// Work queue recording pushed ids and the peak number of concurrent pushes
pub struct FakeQueue {
    pushed: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    started: AtomicUsize,
    closed: AtomicUsize,
    fail_on: Option<String>,
    delay: Duration,
}

impl FakeQueue {
    pub fn new() -> Self {
        Self {
            pushed: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
            fail_on: None,
            delay: Duration::from_millis(2),
        }
    }

    /// Fail the push of `id`
    pub fn failing_on(id: &str) -> Self {
        Self {
            fail_on: Some(id.to_string()),
            ..Self::new()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Ids that were pushed successfully, sorted
    pub fn pushed(&self) -> Vec<String> {
        let mut ids = self.pushed.lock().unwrap().clone();
        ids.sort();
        ids
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkQueue for FakeQueue {
    async fn push(&self, id: &str) -> Result<(), QueueError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.fail_on.as_deref() == Some(id) {
            return Err(QueueError::Nacked(id.to_string()));
        }
        self.pushed.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn close(&self) -> Result<(), QueueError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Queue whose close never completes, for teardown timeout tests
pub struct HangingQueue;

#[async_trait]
impl WorkQueue for HangingQueue {
    async fn push(&self, _id: &str) -> Result<(), QueueError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), QueueError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Analysis store keys for the given package names
pub fn analysis_keys(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| format!("module!{}", name)).collect()
}
