//! Redis-backed priority job queue: an ordered set of pending jobs plus a
//! short-TTL status map, as specified for the orchestration core's
//! durable handoff point between submission and dispatch.

pub mod config;
pub mod error;
pub mod queue;

pub use config::{QueueConfig, DEFAULT_STATUS_TTL_SECS};
pub use error::{QueueError, QueueResult};
pub use queue::PriorityQueue;
