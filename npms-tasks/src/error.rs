//! Error types for npms-tasks
//!
//! Every failure in a task run is fatal to that run. Errors propagate to
//! `main`, which maps them to a process exit code after teardown.

use npms_common::NormalizeError;
use std::time::Duration;
use thiserror::Error;

/// Failures of a key-listing source (CouchDB)
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Invalid source address {0:?}: {1}")]
    InvalidAddress(String, String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Source error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Failures of the work queue transport
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Invalid queue address {0:?}: {1}")]
    InvalidAddress(String, String),

    #[error("AMQP error: {0}")]
    Amqp(String),

    #[error("Queue operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Queue client is not connected")]
    NotConnected,

    #[error("Broker refused the message for {0:?}")]
    Nacked(String),

    #[error("Message for {0:?} was not routed to any queue")]
    NotRouted(String),
}

impl From<lapin::Error> for QueueError {
    fn from(e: lapin::Error) -> Self {
        QueueError::Amqp(e.to_string())
    }
}

/// A single failed push, fatal to the whole dispatch
#[derive(Debug, Error)]
#[error("Failed to enqueue {id:?}: {source}")]
pub struct DispatchError {
    pub id: String,
    #[source]
    pub source: QueueError,
}

/// Top-level task error
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Configuration error: {0}")]
    Config(#[from] npms_common::Error),

    #[error("Fetch failed: {0}")]
    Source(#[from] SourceError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Shutdown timed out after {0:?}")]
    ShutdownTimeout(Duration),
}

impl TaskError {
    /// Process exit code for this error
    ///
    /// - 1: fetch, dispatch and other runtime failures (re-run to recover)
    /// - 2: configuration errors
    /// - 3: unrecoverable normalization failures (do not retry as-is)
    pub fn exit_code(&self) -> u8 {
        match self {
            TaskError::Config(_) => 2,
            TaskError::Normalize(e) if e.is_unrecoverable() => 3,
            _ => 1,
        }
    }
}
