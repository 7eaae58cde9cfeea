//! npms-tasks library interface
//!
//! Maintenance tasks for the npms analysis pipeline:
//! - `enqueue-missing`: find registry packages without an analysis record and
//!   push them onto the analysis queue
//! - `normalize`: sanitize a raw package.json the way the analyzer does
//!
//! The library half exposes every building block so integration tests can
//! drive the tasks against in-memory sources and queues.

pub mod couchdb;
pub mod dispatcher;
pub mod error;
pub mod fetcher;
pub mod queue;
pub mod reconciler;
pub mod stats;
pub mod tasks;

pub use crate::error::{DispatchError, QueueError, SourceError, TaskError};
pub use crate::fetcher::{Denylist, IdSet, KeyListing, KeyRange};
pub use crate::queue::WorkQueue;
pub use crate::reconciler::{reconcile, MissingSet};
