//! External collaborators consumed by the engine
//!
//! The engine never owns durable state. It talks to an [`AgentStore`] for
//! agent records and audit trails and to a [`Notifier`] for user-facing
//! notifications. Both are injected at construction time.
//!
//! - [`sqlite`]: sqlx-backed [`AgentStore`] on SQLite
//! - [`notifier`]: [`Notifier`] fanning events out over a broadcast channel

pub mod notifier;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::agent::{AgentId, AgentStatus};
use crate::error::{NotifyError, StoreError};
use crate::queue::{HandlingRequest, RequestId};

pub use notifier::{BroadcastNotifier, DistributionEvent};
pub use sqlite::SqliteAgentStore;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Agent row as read from the store, before validation
#[derive(Debug, Clone)]
pub struct AgentRecord {
    pub agent_id: String,
    pub display_name: String,
    pub status: String,
    /// Encoded skill list (JSON array text)
    pub skills: Option<String>,
    pub priority: i64,
    pub max_concurrent_calls: i64,
    /// Open assignment, if the agent was bound when last persisted
    pub current_assignment: Option<StoredAssignment>,
}

/// Open assignment restored from the store
#[derive(Debug, Clone)]
pub struct StoredAssignment {
    pub request_id: String,
    pub call_id: String,
    pub campaign_id: String,
    pub required_skills: Option<String>,
    pub started_at: DateTime<Utc>,
}

/// Completion data recorded against an assignment
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentOutcome {
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: i64,
    pub disposition: Option<String>,
    pub notes: Option<String>,
}

/// Durable agent state and audit trail
#[async_trait]
pub trait AgentStore: Send + Sync {
    /// Load every active agent
    async fn load_active_agents(&self) -> StoreResult<Vec<AgentRecord>>;

    /// Record a status change and its audit entry
    async fn persist_status(&self, agent_id: &AgentId, status: AgentStatus, reason: &str) -> StoreResult<()>;

    /// Record the start of an assignment
    async fn persist_assignment_start(
        &self,
        agent_id: &AgentId,
        request: &HandlingRequest,
        started_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Close the assignment opened by `persist_assignment_start`
    async fn persist_assignment_end(
        &self,
        agent_id: &AgentId,
        request_id: &RequestId,
        outcome: &AssignmentOutcome,
    ) -> StoreResult<()>;
}

/// Fire-and-forget notifications towards user interfaces
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_queued(&self, request_id: &RequestId, queue_position: usize) -> Result<(), NotifyError>;

    async fn notify_assigned(&self, request_id: &RequestId, agent_id: &AgentId) -> Result<(), NotifyError>;
}
