//! # Call Distribution Engine for RVOIP
//!
//! This crate decides *who* handles a call once a handling request has been
//! raised. It matches requests to available human agents, holds unmatched
//! requests in a FIFO wait queue, and redrives that queue whenever an agent
//! becomes available.
//!
//! ## Guarantees
//!
//! - **Exclusive binding**: an agent is busy exactly when it holds one
//!   request, and a call is bound to at most one agent.
//! - **Strict FIFO**: the queue drains head first and never skips past an
//!   unmatched head.
//! - **Single-flight drain**: concurrent availability changes collapse into
//!   one drain pass at a time.
//! - **Recoverable failures**: a store failure during a drain puts the entry
//!   back at the head and retries after a backoff.
//!
//! ## Architecture
//!
//! - [`orchestrator`]: the engine; assignment, completion, status changes, drain
//! - [`agent`]: agent types and the in-memory agent registry
//! - [`routing`]: the stateless matcher
//! - [`queue`]: the wait queue
//! - [`store`]: agent store and notifier traits plus SQLite/broadcast adapters
//! - [`api`]: HTTP surface
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rvoip_call_distribution::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = DistributionConfig::default();
//!     let store = SqliteAgentStore::connect(&config.database).await?;
//!     let notifier = BroadcastNotifier::default();
//!
//!     let engine = CallDistributionEngine::new(config, Arc::new(store), Arc::new(notifier));
//!     engine.start().await?;
//!
//!     let result = engine
//!         .assign(NewRequest::new("call-42", "spring-campaign").with_skills(["sales"]))
//!         .await?;
//!     println!("assigned: {} (position {:?})", result.success, result.queue_position);
//!
//!     engine.shutdown();
//!     Ok(())
//! }
//! ```

// Core modules
pub mod config;
pub mod error;
pub mod logging;

// Distribution modules
pub mod agent;
pub mod orchestrator;
pub mod queue;
pub mod routing;

// Collaborators and external interfaces
pub mod api;
pub mod store;

// Re-exports for convenience
pub use config::DistributionConfig;
pub use error::{DistributionError, Result};
pub use orchestrator::CallDistributionEngine;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{CallDistributionEngine, DistributionConfig, DistributionError, Result};

    pub use crate::config::{AgentConfig, ApiConfig, DatabaseConfig, GeneralConfig, QueueConfig};

    pub use crate::orchestrator::{AssignmentResult, DrainOutcome, EngineStats, NewRequest};

    pub use crate::agent::{Agent, AgentId, AgentRegistry, AgentStats, AgentStatus, Priority, SkillSet, SkillTag};

    pub use crate::queue::{HandlingRequest, QueueEntry, QueueStats, RequestId};

    pub use crate::routing::select_agent;

    pub use crate::store::{
        AgentRecord, AgentStore, AssignmentOutcome, BroadcastNotifier, DistributionEvent, Notifier,
        SqliteAgentStore, StoredAssignment,
    };

    pub use chrono::{DateTime, Utc};
}
