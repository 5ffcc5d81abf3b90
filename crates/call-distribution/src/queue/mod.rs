//! Wait queue module
//!
//! Handling requests that find no eligible agent wait here in strict arrival
//! order until the queue processor can bind them.

pub mod manager;
pub mod types;

pub use manager::WaitQueue;
pub use types::{HandlingRequest, QueueEntry, QueueStats, RequestId};
