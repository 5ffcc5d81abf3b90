//! Distribution orchestration
//!
//! [`CallDistributionEngine`] owns the agent registry and the wait queue and
//! is the only component that mutates them.
//!
//! - [`core`]: engine construction, lifecycle, queries and drain scheduling
//! - [`assignment`]: `assign` and `complete`
//! - [`agents`]: agent status changes
//! - [`processor`]: single-flight queue drain

pub mod agents;
pub mod assignment;
pub mod core;
pub mod processor;
pub mod types;

pub use self::core::CallDistributionEngine;
pub use types::{AssignmentResult, DrainOutcome, EngineStats, NewRequest};
